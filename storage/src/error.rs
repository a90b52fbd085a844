use memento_core::error::{EngineError, ErrorKind, IntoEngineError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation failed: {0}")]
    Validation(String),
}

impl IntoEngineError for RepoError {
    fn into_engine_error(self) -> EngineError {
        match self {
            RepoError::NotFound(msg) => EngineError::not_found(msg),
            RepoError::Conflict(msg) => EngineError::conflict(msg),
            RepoError::Validation(msg) => EngineError::validation(msg),
            RepoError::Database(err) => EngineError::new(ErrorKind::Unavailable, err.to_string()),
            RepoError::Migration(err) => EngineError::internal(err.to_string()),
        }
    }
}
