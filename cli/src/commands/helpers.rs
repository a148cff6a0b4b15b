use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;

use tally_core::models::UserIdentity;
use tally_core::service::TallyService;

use crate::config::generate_token;

/// Email of the lazily-provisioned default user that local commands (and the
/// server's --no-auth mode) act as.
pub(crate) const LOCAL_USER_EMAIL: &str = "local@tally";

/// Resolve the acting user: an explicit email, or the local default user.
pub(crate) fn resolve_identity(
    service: &TallyService,
    user: Option<&str>,
) -> Result<UserIdentity> {
    match user {
        Some(email) => {
            let user = service.user_by_email(email)?.with_context(|| {
                format!("No user with email '{email}'. Add one with `tally user add`")
            })?;
            Ok(UserIdentity::from(&user))
        }
        None => local_identity(service),
    }
}

/// The local default user, created on first use.
pub(crate) fn local_identity(service: &TallyService) -> Result<UserIdentity> {
    if let Some(user) = service.user_by_email(LOCAL_USER_EMAIL)? {
        return Ok(UserIdentity::from(&user));
    }
    let name = std::env::var("USER").unwrap_or_else(|_| "local".to_string());
    let user = service.create_user(&name, LOCAL_USER_EMAIL, &generate_token())?;
    Ok(UserIdentity::from(&user))
}

/// Parse a comma-separated list of 1-based goal numbers ("1,3") into 0-based
/// indices, validating against the goal count.
pub(crate) fn parse_index_list(s: &str, count: usize) -> Result<Vec<usize>> {
    let mut indices = Vec::new();
    for part in s.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let n: usize = part
            .parse()
            .with_context(|| format!("Invalid goal number '{part}'"))?;
        if n < 1 || n > count {
            bail!("Goal number {n} out of range (1-{count})");
        }
        indices.push(n - 1);
    }
    Ok(indices)
}

pub(crate) fn format_window(start: NaiveDateTime, end: NaiveDateTime) -> String {
    format!("{} → {}", start.date(), end.date())
}
