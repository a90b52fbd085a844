use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::provider::{
    ContextualChunk, EmbedError, EmbedRequest, EmbedResponse, Embedder, InputType,
};
use crate::retry::send_with_retry;

pub struct JinaEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: Option<usize>,
}

impl JinaEmbedder {
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

fn task_str(t: InputType) -> &'static str {
    match t {
        InputType::Query => "retrieval.query",
        InputType::Passage => "retrieval.passage",
    }
}

#[derive(Debug, Deserialize)]
struct JinaResponse {
    data: Vec<JinaDatum>,
}

#[derive(Debug, Deserialize)]
struct JinaDatum {
    index: usize,
    embedding: Vec<f32>,
}

async fn call(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    body: serde_json::Value,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    let url = format!("{base_url}/v1/embeddings");
    let response = send_with_retry(|| client.post(&url).bearer_auth(api_key).json(&body).send()).await?;
    let parsed: JinaResponse = response
        .json()
        .await
        .map_err(|e| EmbedError::InvalidResponse(e.to_string()))?;
    let mut sorted = parsed.data;
    sorted.sort_by_key(|d| d.index);
    Ok(sorted.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl Embedder for JinaEmbedder {
    async fn embed(&self, request: EmbedRequest) -> Result<EmbedResponse, EmbedError> {
        let mut body = json!({
            "input": request.texts,
            "model": self.model,
            "task": task_str(request.input_type),
        });
        if let Some(dims) = self.dimensions {
            body["dimensions"] = json!(dims);
        }

        let vectors = call(&self.client, &self.base_url, &self.api_key, body).await?;
        let dimensions = vectors.first().map(|v| v.len()).unwrap_or(0);
        Ok(EmbedResponse {
            vectors,
            dimensions,
            provider: "jina".to_string(),
            model: self.model.clone(),
            tokens_used: None,
        })
    }

    async fn health_probe(&self) -> Result<(), EmbedError> {
        if self.api_key.is_empty() {
            return Err(EmbedError::MissingConfig("jina api key".into()));
        }
        Ok(())
    }

    fn supports_contextual(&self) -> bool {
        true
    }

    async fn embed_document_chunks_contextual(
        &self,
        chunks: &[ContextualChunk],
    ) -> Result<EmbedResponse, EmbedError> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let mut body = json!({
            "input": texts,
            "model": self.model,
            "task": "retrieval.passage",
            "late_chunking": true,
        });
        if let Some(dims) = self.dimensions {
            body["dimensions"] = json!(dims);
        }

        let vectors = call(&self.client, &self.base_url, &self.api_key, body).await?;
        let dimensions = vectors.first().map(|v| v.len()).unwrap_or(0);
        Ok(EmbedResponse {
            vectors,
            dimensions,
            provider: "jina".to_string(),
            model: self.model.clone(),
            tokens_used: None,
        })
    }

    fn provider_name(&self) -> &str {
        "jina"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
