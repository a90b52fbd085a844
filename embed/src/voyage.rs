use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::provider::{
    ContextualChunk, EmbedError, EmbedRequest, EmbedResponse, Embedder, InputType,
};
use crate::retry::send_with_retry;

pub struct VoyageEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    output_dimension: Option<usize>,
}

impl VoyageEmbedder {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            output_dimension: None,
        }
    }

    pub fn with_output_dimension(mut self, dims: usize) -> Self {
        self.output_dimension = Some(dims);
        self
    }

    fn is_contextual_model(&self) -> bool {
        self.model.starts_with("voyage-context-")
    }
}

fn input_type_str(t: InputType) -> &'static str {
    match t {
        InputType::Query => "query",
        InputType::Passage => "document",
    }
}

#[derive(Debug, Deserialize)]
struct FlatEmbeddingsResponse {
    data: Vec<FlatDatum>,
}

#[derive(Debug, Deserialize)]
struct FlatDatum {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ContextualResponse {
    #[serde(default)]
    results: Vec<ContextualResult>,
    #[serde(default)]
    data: Vec<ContextualGroup>,
}

#[derive(Debug, Deserialize)]
struct ContextualResult {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct ContextualGroup {
    data: Vec<ContextualGroupDatum>,
}

#[derive(Debug, Deserialize)]
struct ContextualGroupDatum {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for VoyageEmbedder {
    async fn embed(&self, request: EmbedRequest) -> Result<EmbedResponse, EmbedError> {
        let mut body = json!({
            "input": request.texts,
            "model": self.model,
            "input_type": input_type_str(request.input_type),
        });
        if let Some(dims) = self.output_dimension {
            body["output_dimension"] = json!(dims);
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let response = send_with_retry(|| {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
        })
        .await?;

        let parsed: FlatEmbeddingsResponse = response
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
            provider: "voyage".to_string(),
            model: self.model.clone(),
            tokens_used: None,
        })
    }

    async fn health_probe(&self) -> Result<(), EmbedError> {
        if self.api_key.is_empty() {
            return Err(EmbedError::MissingConfig("voyage api key".into()));
        }
        Ok(())
    }

    fn supports_contextual(&self) -> bool {
        self.is_contextual_model()
    }

    async fn embed_document_chunks_contextual(
        &self,
        chunks: &[ContextualChunk],
    ) -> Result<EmbedResponse, EmbedError> {
        if !self.is_contextual_model() {
            return Err(EmbedError::ContextualUnsupported);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let mut body = json!({
            "inputs": [texts],
            "model": self.model,
            "input_type": "document",
        });
        if let Some(dims) = self.output_dimension {
            body["output_dimension"] = json!(dims);
        }

        let url = format!("{}/v1/contextualizedembeddings", self.base_url);
        let response = send_with_retry(|| {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
        })
        .await?;

        let parsed: ContextualResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::InvalidResponse(e.to_string()))?;

        let vectors = if let Some(first) = parsed.results.into_iter().next() {
            first.embeddings
        } else if let Some(group) = parsed.data.into_iter().next() {
            let mut sorted = group.data;
            sorted.sort_by_key(|d| d.index);
            sorted.into_iter().map(|d| d.embedding).collect()
        } else {
            return Err(EmbedError::InvalidResponse(
                "contextual response had neither results nor data".into(),
            ));
        };

        let dimensions = vectors.first().map(|v| v.len()).unwrap_or(0);
        Ok(EmbedResponse {
            vectors,
            dimensions,
            provider: "voyage".to_string(),
            model: self.model.clone(),
            tokens_used: None,
        })
    }

    fn provider_name(&self) -> &str {
        "voyage"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_contextual_models_by_prefix() {
        let e = VoyageEmbedder::new("https://api.voyageai.com", "key", "voyage-context-3");
        assert!(e.is_contextual_model());
        let e2 = VoyageEmbedder::new("https://api.voyageai.com", "key", "voyage-3");
        assert!(!e2.is_contextual_model());
    }
}
