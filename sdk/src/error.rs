use memento_commit::CommitError;
use memento_core::error::{EngineError, IntoEngineError};
use memento_jobs::JobError;
use memento_search::SearchError;
use memento_storage::RepoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error(transparent)]
    Storage(#[from] RepoError),
    #[error(transparent)]
    Commit(#[from] CommitError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("validation failed: {0}")]
    Validation(String),
}

impl IntoEngineError for SdkError {
    fn into_engine_error(self) -> EngineError {
        match self {
            SdkError::Storage(err) => err.into_engine_error(),
            SdkError::Commit(err) => err.into_engine_error(),
            SdkError::Search(err) => err.into_engine_error(),
            SdkError::Job(err) => err.into_engine_error(),
            SdkError::Database(err) => EngineError::internal(err.to_string()),
            SdkError::Validation(msg) => EngineError::validation(msg),
        }
    }
}
