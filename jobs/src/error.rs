use memento_core::error::{EngineError, IntoEngineError};
use memento_embed::EmbedError;
use memento_storage::RepoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Storage(#[from] RepoError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Embed(#[from] EmbedError),
    #[error("embedder dispatch failed: {0}")]
    Dispatch(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unknown outbox event type")]
    UnknownEventType,
}

impl IntoEngineError for JobError {
    fn into_engine_error(self) -> EngineError {
        match self {
            JobError::Storage(err) => err.into_engine_error(),
            JobError::Database(err) => EngineError::internal(err.to_string()),
            JobError::Embed(err) => EngineError::unavailable(err.to_string()),
            JobError::Dispatch(msg) => EngineError::validation(msg),
            JobError::Validation(msg) => EngineError::validation(msg),
            JobError::UnknownEventType => EngineError::validation("unknown outbox event type"),
        }
    }
}
