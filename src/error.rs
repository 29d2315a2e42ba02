use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Source unavailable ({source_name}): {message}")]
    SourceUnavailable {
        source_name: String,
        message: String,
    },

    #[error("Join key {column} missing from {table} table")]
    JoinKeyMissing { table: String, column: String },

    #[error("Required column {column} missing from {table} table")]
    MissingColumn { table: String, column: String },

    #[error("Cannot normalize {table}.{column} at row {row}: {value:?} ({reason})")]
    NormalizationFailed {
        table: String,
        column: String,
        row: usize,
        value: String,
        reason: String,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("DataFusion error: {0}")]
    DataFusionError(#[from] datafusion::error::DataFusionError),

    #[error("Arrow error: {0}")]
    ArrowError(#[from] datafusion::arrow::error::ArrowError),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Internal server error: {message}")]
    InternalError { message: String },
}

impl AnalysisError {
    pub fn source_unavailable(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        AnalysisError::SourceUnavailable {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, AnalysisError::SourceUnavailable { .. })
    }
}

impl From<std::io::Error> for AnalysisError {
    fn from(err: std::io::Error) -> Self {
        AnalysisError::SourceUnavailable {
            source_name: "io".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<diesel::result::Error> for AnalysisError {
    fn from(err: diesel::result::Error) -> Self {
        AnalysisError::SourceUnavailable {
            source_name: "database".to_string(),
            message: format!("Database error: {}", err),
        }
    }
}

impl From<tokio::task::JoinError> for AnalysisError {
    fn from(err: tokio::task::JoinError) -> Self {
        AnalysisError::InternalError {
            message: format!("Background task failed: {}", err),
        }
    }
}
