//! Error types for the housing AutoML pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, AutomlError>;

/// Everything that can go wrong between reading listings and writing predictions
#[derive(Error, Debug)]
pub enum AutomlError {
    /// Unreadable, malformed or missing input data
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Column not found: {0}")]
    FeatureNotFound(String),

    /// Processed train and test tables ended up with different columns
    #[error("Train/test column mismatch: missing {missing:?}, unexpected {unexpected:?}")]
    ColumnMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter {name} = {value}: {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    /// A search candidate failed on one cross-validation fold; the search stops
    #[error("Candidate {candidate} failed on fold {fold}: {source}")]
    FoldFailed {
        candidate: usize,
        fold: usize,
        #[source]
        source: Box<AutomlError>,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Numerical error: {0}")]
    ComputationError(String),
}

impl From<polars::error::PolarsError> for AutomlError {
    fn from(err: polars::error::PolarsError) -> Self {
        match err {
            polars::error::PolarsError::ColumnNotFound(name) => AutomlError::FeatureNotFound(name.to_string()),
            other => AutomlError::DataError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AutomlError {
    fn from(err: serde_json::Error) -> Self {
        AutomlError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for AutomlError {
    fn from(err: ndarray::ShapeError) -> Self {
        AutomlError::ShapeError {
            expected: "a rectangular feature matrix".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<regex::Error> for AutomlError {
    fn from(err: regex::Error) -> Self {
        AutomlError::ConfigError(format!("bad text pattern: {}", err))
    }
}
