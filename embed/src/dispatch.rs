use std::sync::Arc;

use thiserror::Error;

use crate::fake::FakeEmbedder;
use crate::jina::JinaEmbedder;
use crate::openai_compat::OpenAiCompatEmbedder;
use crate::provider::Embedder;
use crate::voyage::VoyageEmbedder;

/// The closed provider set the embedder is polymorphic over (spec: "dynamic provider
/// dispatch... model as a tagged variant plus a capability set").
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Voyage,
    Jina,
    OpenAiCompat,
    Fake,
}

impl std::str::FromStr for ProviderKind {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "voyage" => Ok(Self::Voyage),
            "jina" => Ok(Self::Jina),
            "openai_compat" => Ok(Self::OpenAiCompat),
            "fake" => Ok(Self::Fake),
            other => Err(DispatchError::UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown embedder provider: {0}")]
    UnknownProvider(String),
    #[error("provider_config missing required key: {0}")]
    MissingConfigKey(String),
}

/// An explicit struct with enumerated recognized keys, matching the spec's requirement that
/// provider configuration not be an untyped bag.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub output_dimension: Option<usize>,
}

/// Builds the concrete embedder for a profile's `(provider, model, provider_config)`.
/// `use_fake` short-circuits to the deterministic embedder regardless of the stored provider,
/// matching the `EMBEDDER_USE_FAKE` override.
pub fn build_embedder(
    provider: ProviderKind,
    model: &str,
    dims: usize,
    config: &ProviderConfig,
    use_fake: bool,
) -> Result<Arc<dyn Embedder>, DispatchError> {
    if use_fake || provider == ProviderKind::Fake {
        return Ok(Arc::new(FakeEmbedder::new(dims)));
    }

    let base_url = config
        .base_url
        .clone()
        .ok_or_else(|| DispatchError::MissingConfigKey("base_url".into()))?;
    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| DispatchError::MissingConfigKey("api_key".into()))?;

    let embedder: Arc<dyn Embedder> = match provider {
        ProviderKind::Voyage => {
            let mut client = VoyageEmbedder::new(base_url, api_key, model);
            if let Some(d) = config.output_dimension {
                client = client.with_output_dimension(d);
            }
            Arc::new(client)
        }
        ProviderKind::Jina => {
            let mut client = JinaEmbedder::new(base_url, api_key, model);
            if let Some(d) = config.output_dimension {
                client = client.with_dimensions(d);
            }
            Arc::new(client)
        }
        ProviderKind::OpenAiCompat => {
            let mut client = OpenAiCompatEmbedder::new(base_url, api_key, model);
            if let Some(d) = config.output_dimension {
                client = client.with_dimensions(d);
            }
            Arc::new(client)
        }
        ProviderKind::Fake => unreachable!("handled above"),
    };

    Ok(embedder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parses_known_provider_names() {
        assert_eq!(ProviderKind::from_str("voyage").unwrap(), ProviderKind::Voyage);
        assert_eq!(ProviderKind::from_str("jina").unwrap(), ProviderKind::Jina);
        assert_eq!(
            ProviderKind::from_str("openai_compat").unwrap(),
            ProviderKind::OpenAiCompat
        );
        assert!(ProviderKind::from_str("unknown").is_err());
    }

    #[test]
    fn use_fake_short_circuits_regardless_of_provider() {
        let embedder = build_embedder(
            ProviderKind::Voyage,
            "voyage-3",
            8,
            &ProviderConfig::default(),
            true,
        )
        .unwrap();
        assert_eq!(embedder.provider_name(), "fake");
    }

    #[test]
    fn missing_config_key_is_reported() {
        let result = build_embedder(
            ProviderKind::Jina,
            "jina-embeddings-v3",
            8,
            &ProviderConfig::default(),
            false,
        );
        match result {
            Err(err) => assert!(matches!(err, DispatchError::MissingConfigKey(_))),
            Ok(_) => panic!("expected MissingConfigKey error"),
        }
    }
}
