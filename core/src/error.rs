use thiserror::Error;

/// Error taxonomy for the core. Every variant is local to a single
/// operation; nothing is retried and nothing is fatal to the process.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing input. No state change.
    #[error("{0}")]
    Validation(String),

    /// No record for the requested window. No state change.
    #[error("{0}")]
    NotFound(String),

    /// A reflection already exists for this (user, week). The stored
    /// reflection is never overwritten or re-scored.
    #[error("Reflection already submitted for this week")]
    DuplicateSubmission,

    #[error("database error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }
}
