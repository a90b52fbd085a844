use memento_core::error::{EngineError, IntoEngineError};
use memento_storage::RepoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Storage(#[from] RepoError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("embedder dispatch failed: {0}")]
    Dispatch(String),
    #[error("embedder error: {0}")]
    Embed(#[from] memento_embed::EmbedError),
    #[error("query embedding dimensions mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl IntoEngineError for SearchError {
    fn into_engine_error(self) -> EngineError {
        match self {
            SearchError::Storage(err) => err.into_engine_error(),
            SearchError::Database(err) => EngineError::internal(err.to_string()),
            SearchError::Dispatch(msg) => EngineError::validation(msg),
            SearchError::Embed(err) => EngineError::unavailable(err.to_string()),
            SearchError::DimensionMismatch { expected, actual } => EngineError::internal(format!(
                "query embedding dimensions mismatch: expected {expected}, got {actual}"
            )),
        }
    }
}
