//! Error types for the conpanion_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for conpanion_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Food catalog validation error
    #[error("Catalog validation error: {0}")]
    CatalogValidation(String),

    /// Store or lock state could not be used
    #[error("State error: {0}")]
    State(String),

    /// Expected document, food, plan or selection is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// No active user identity
    #[error("No authenticated user")]
    Unauthenticated,

    /// User-entered value failed validation (e.g. non-numeric reps)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Workout operation called outside the state it is valid in
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Coarse classification used by front ends to pick an inline message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unauthenticated,
    InvalidInput,
    InvalidState,
    Storage,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Unauthenticated => ErrorKind::Unauthenticated,
            Error::InvalidInput(_) | Error::Config(_) | Error::CatalogValidation(_) => {
                ErrorKind::InvalidInput
            }
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::Io(_)
            | Error::Json(_)
            | Error::Csv(_)
            | Error::Toml(_)
            | Error::State(_)
            | Error::Other(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }
}
