use thiserror::Error;

use crate::records::EntityId;

/// Errors raised by the feature engine.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// Malformed or missing required dates/ids in an input feed. Fatal for the run.
    #[error("validation failed for {feed}: {message}")]
    Validation { feed: &'static str, message: String },

    /// Point-query asked for an entity that neither feed knows about.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The manifest names a feature this engine does not produce.
    #[error("manifest feature `{0}` is not produced by the feature engine")]
    UnknownFeature(String),

    #[error("training matrix has no rows")]
    EmptyMatrix,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

impl FeatureError {
    pub fn validation(feed: &'static str, message: impl Into<String>) -> Self {
        FeatureError::Validation {
            feed,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FeatureError>;
