use thiserror::Error;

/// Storage-specific error types for persisted device options.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection or query execution failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration execution failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Stored row does not describe valid options
    #[error("Invalid options block {block}[{index}]: {reason}")]
    InvalidRow {
        block: String,
        index: u8,
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for egm_core::Error {
    fn from(error: StorageError) -> Self {
        egm_core::Error::Storage(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_into_domain_error() {
        let error: egm_core::Error = StorageError::Configuration("bad path".to_string()).into();
        assert!(matches!(error, egm_core::Error::Storage(_)));
        assert_eq!(
            error.to_string(),
            "Storage error: Configuration error: bad path"
        );
    }
}
