use async_trait::async_trait;
use memento_core::embedding::deterministic_embedding;

use crate::provider::{EmbedError, EmbedRequest, EmbedResponse, Embedder};

/// Deterministic embedder used by tests and the `EMBEDDER_USE_FAKE` configuration switch.
pub struct FakeEmbedder {
    pub dims: usize,
    pub model: String,
}

impl FakeEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            model: "fake-v1".to_string(),
        }
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, request: EmbedRequest) -> Result<EmbedResponse, EmbedError> {
        let vectors = request
            .texts
            .iter()
            .map(|t| deterministic_embedding(t, self.dims))
            .collect();
        Ok(EmbedResponse {
            vectors,
            dimensions: self.dims,
            provider: "fake".to_string(),
            model: self.model.clone(),
            tokens_used: None,
        })
    }

    async fn health_probe(&self) -> Result<(), EmbedError> {
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "fake"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InputType;

    #[tokio::test]
    async fn fake_embedder_returns_requested_dims() {
        let embedder = FakeEmbedder::new(16);
        let response = embedder
            .embed(EmbedRequest {
                texts: vec!["hello".into(), "world".into()],
                input_type: InputType::Passage,
            })
            .await
            .unwrap();
        assert_eq!(response.dimensions, 16);
        assert_eq!(response.vectors.len(), 2);
        assert!(response.vectors.iter().all(|v| v.len() == 16));
    }

    #[tokio::test]
    async fn fake_embedder_is_deterministic() {
        let embedder = FakeEmbedder::new(8);
        let req = || EmbedRequest {
            texts: vec!["ECONNRESET_42".into()],
            input_type: InputType::Passage,
        };
        let a = embedder.embed(req()).await.unwrap();
        let b = embedder.embed(req()).await.unwrap();
        assert_eq!(a.vectors, b.vectors);
    }
}
