use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    Query,
    Passage,
}

#[derive(Debug, Clone)]
pub struct EmbedRequest {
    pub texts: Vec<String>,
    pub input_type: InputType,
}

#[derive(Debug, Clone)]
pub struct EmbedResponse {
    pub vectors: Vec<Vec<f32>>,
    pub dimensions: usize,
    pub provider: String,
    pub model: String,
    pub tokens_used: Option<u64>,
}

/// A chunk passed to the contextual embedding endpoint: retains enough of the surrounding
/// document for providers that condition each chunk's vector on its neighbors.
#[derive(Debug, Clone)]
pub struct ContextualChunk {
    pub chunk_id: uuid::Uuid,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedder http error: {0}")]
    Http(String),
    #[error("embedder returned non-ok status {status}: {body}")]
    BadStatus { status: u16, body: String },
    #[error("embedder response shape was unexpected: {0}")]
    InvalidResponse(String),
    #[error("embedder dimensions mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedder configuration missing: {0}")]
    MissingConfig(String),
    #[error("contextual embedding is not supported by this provider")]
    ContextualUnsupported,
}

/// The uniform contract every embedding provider implements: plain embedding, a health probe,
/// and an optional contextual-embedding capability.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, request: EmbedRequest) -> Result<EmbedResponse, EmbedError>;

    async fn health_probe(&self) -> Result<(), EmbedError>;

    fn supports_contextual(&self) -> bool {
        false
    }

    async fn embed_document_chunks_contextual(
        &self,
        _chunks: &[ContextualChunk],
    ) -> Result<EmbedResponse, EmbedError> {
        Err(EmbedError::ContextualUnsupported)
    }

    fn provider_name(&self) -> &str;

    fn model_name(&self) -> &str;
}
