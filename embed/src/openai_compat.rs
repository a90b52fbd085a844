use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::provider::{EmbedError, EmbedRequest, EmbedResponse, Embedder};
use crate::retry::send_with_retry;

pub struct OpenAiCompatEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: Option<usize>,
}

impl OpenAiCompatEmbedder {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            dimensions: None,
        }
    }

    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = Some(dims);
        self
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiDatum>,
}

#[derive(Debug, Deserialize)]
struct OpenAiDatum {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OpenAiCompatEmbedder {
    async fn embed(&self, request: EmbedRequest) -> Result<EmbedResponse, EmbedError> {
        let mut body = json!({
            "input": request.texts,
            "model": self.model,
        });
        if let Some(dims) = self.dimensions {
            body["dimensions"] = json!(dims);
        }

        let url = format!("{}/embeddings", self.base_url);
        let response = send_with_retry(|| {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
        })
        .await?;

        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::InvalidResponse(e.to_string()))?;

        let mut sorted = parsed.data;
        sorted.sort_by_key(|d| d.index);
        let vectors: Vec<Vec<f32>> = sorted.into_iter().map(|d| d.embedding).collect();
        let dimensions = vectors.first().map(|v| v.len()).unwrap_or(0);

        Ok(EmbedResponse {
            vectors,
            dimensions,
            provider: "openai_compat".to_string(),
            model: self.model.clone(),
            tokens_used: None,
        })
    }

    async fn health_probe(&self) -> Result<(), EmbedError> {
        if self.api_key.is_empty() {
            return Err(EmbedError::MissingConfig("openai-compatible api key".into()));
        }
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "openai_compat"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
