//! Error types shared across the workspace.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Malformed client input: a bad grid or a non-positive bound.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A storage operation failed. Runs abort on the first one.
    #[error("Database error: {0}")]
    Database(String),

    /// A run was stopped by its caller before reaching an outcome.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Client-facing message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Error::Io(err) => err.to_string(),
            Error::Serialization(msg)
            | Error::Validation(msg)
            | Error::NotFound(msg)
            | Error::AlreadyExists(msg)
            | Error::InvalidState(msg)
            | Error::Database(msg)
            | Error::Cancelled(msg)
            | Error::Other(msg) => msg.clone(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_strips_prefix() {
        let err = Error::Validation("State must be an array".to_string());
        assert_eq!(err.to_string(), "Validation error: State must be an array");
        assert_eq!(err.message(), "State must be an array");
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let err: Error = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
