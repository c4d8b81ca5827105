use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptimizeError {
    // Resolution errors
    #[error("Unknown package/constraint: {name}@{constraint}")]
    ResolutionNotFound { name: String, constraint: String },

    #[error("Invalid version constraint: {0}")]
    InvalidConstraint(String),

    #[error("Invalid version {version} for {name}")]
    InvalidVersion { name: String, version: String },

    // Request errors
    #[error("Invalid payload: {message}")]
    InvalidPayload { message: String },

    // Registry errors
    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    // JSON/parsing errors
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OptimizeError {
    /// Errors caused by the caller's input rather than the registry or host.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            OptimizeError::ResolutionNotFound { .. }
                | OptimizeError::InvalidConstraint(_)
                | OptimizeError::InvalidPayload { .. }
                | OptimizeError::JsonParse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, OptimizeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_not_found_message() {
        let err = OptimizeError::ResolutionNotFound {
            name: "x/bad".to_string(),
            constraint: "^9.9".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown package/constraint: x/bad@^9.9");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_registry_errors_are_internal() {
        assert!(!OptimizeError::Registry("boom".to_string()).is_client_error());
        assert!(!OptimizeError::Database(rusqlite::Error::InvalidQuery).is_client_error());
    }
}
