use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<rusqlite::Error> for DomainError {
    fn from(e: rusqlite::Error) -> Self {
        DomainError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::Parse(e.to_string())
    }
}

/// A source adapter could not produce a reading. Degrades that source to absent.
#[derive(Debug, Error)]
pub enum SourceFetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("No usable data: {0}")]
    NoData(String),
}

/// The language-model call failed. The combined score stays valid.
#[derive(Debug, Error)]
pub enum ModelCallError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Model provider is disabled")]
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CombineError {
    #[error("Insufficient data: no source produced a usable reading")]
    InsufficientData,
}

