use memento_core::error::{EngineError, IntoEngineError};
use memento_storage::RepoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommitError {
    #[error(transparent)]
    Storage(#[from] RepoError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("link endpoint not found: {0}")]
    LinkEndpointNotFound(String),
}

impl IntoEngineError for CommitError {
    fn into_engine_error(self) -> EngineError {
        match self {
            CommitError::Storage(err) => err.into_engine_error(),
            CommitError::Database(err) => EngineError::internal(err.to_string()),
            CommitError::Validation(msg) => EngineError::validation(msg),
            CommitError::LinkEndpointNotFound(msg) => EngineError::not_found(msg),
        }
    }
}
