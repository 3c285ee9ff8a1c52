//! Error types for the lunacal binary

use thiserror::Error;

use crate::config::ConfigError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid date: '{0}' (expected YYYY-MM-DD, today, yesterday or tomorrow)")]
    InvalidDate(String),

    #[error("invalid month: '{0}' (expected YYYY-MM)")]
    InvalidMonth(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidDate(_) | Error::InvalidMonth(_) => 2,
            Error::Config(_) => 3,
            Error::Storage(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
