pub mod db;
pub mod error;
pub mod models;
pub mod scoring;
pub mod service;
pub mod week;
