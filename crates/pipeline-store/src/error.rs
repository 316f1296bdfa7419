//! Store errors

use pipeline_core::preferences::PreferenceError;
use pipeline_core::provider::ProviderError;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown resource: {0}")]
    UnknownResource(String),
    #[error("unknown column {column} on {resource}")]
    UnknownColumn { resource: String, column: String },
    #[error("{resource}#{id} not found")]
    NotFound { resource: String, id: u32 },
    #[error("invalid data: {0}")]
    Invalid(String),
}

impl From<StoreError> for ProviderError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UnknownResource(r) => ProviderError::UnknownResource(r),
            StoreError::NotFound { resource, id } => ProviderError::NotFound { resource, id },
            StoreError::UnknownColumn { .. } | StoreError::Invalid(_) => ProviderError::Rejected(e.to_string()),
            other => ProviderError::Storage(other.to_string()),
        }
    }
}

impl From<StoreError> for PreferenceError {
    fn from(e: StoreError) -> Self {
        PreferenceError::Unavailable(e.to_string())
    }
}
