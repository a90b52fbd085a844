use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of error kinds the engine ever surfaces to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Unauthorized,
    Forbidden,
    RateLimited,
    Unavailable,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::Unavailable => "UNAVAILABLE",
            ErrorKind::Internal => "INTERNAL",
        };
        write!(f, "{s}")
    }
}

/// The error type every engine-facing operation returns.
///
/// Leaf crates define their own `thiserror` enums for internal failure modes and convert into
/// this type at the crate boundary via [`IntoEngineError`].
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct EngineError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default)]
    pub detail: BTreeMap<String, String>,
}

impl EngineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.detail.insert(key.into(), value.into());
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }
}

/// Implemented by leaf-crate error enums so they can be folded into an [`EngineError`]
/// without every caller hand-matching variants.
pub trait IntoEngineError {
    fn into_engine_error(self) -> EngineError;
}

impl IntoEngineError for EngineError {
    fn into_engine_error(self) -> EngineError {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_screaming_snake_case() {
        assert_eq!(ErrorKind::NotFound.to_string(), "NOT_FOUND");
        assert_eq!(ErrorKind::RateLimited.to_string(), "RATE_LIMITED");
    }

    #[test]
    fn with_detail_is_additive() {
        let err = EngineError::validation("bad input")
            .with_detail("field", "title")
            .with_detail("reason", "empty");
        assert_eq!(err.detail.get("field").map(String::as_str), Some("title"));
        assert_eq!(err.detail.len(), 2);
    }
}
