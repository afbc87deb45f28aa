//! Error types for the challenge-analytics crate.

use thiserror::Error;

use crate::llm::LlmError;

/// Errors returned by dataset and query operations.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The dataset could not be read or is malformed.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// I/O failure while reading the dataset file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be decoded from JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filters could not be applied to the dataset.
    #[error("Query error: {0}")]
    Query(String),

    /// Invalid parameters provided by the caller.
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// The completion service failed.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}
