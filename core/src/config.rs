use std::env;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_pool_max")]
    pub pool_max: u32,
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

const fn default_pool_max() -> u32 {
    10
}
const fn default_idle_timeout_ms() -> u64 {
    30_000
}
const fn default_connect_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutboxConfig {
    #[serde(default = "default_lease_seconds")]
    pub lease_seconds: u64,
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,
    #[serde(default = "default_retry_max_delay_seconds")]
    pub retry_max_delay_seconds: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

const fn default_lease_seconds() -> u64 {
    120
}
const fn default_retry_delay_seconds() -> u64 {
    5
}
const fn default_retry_max_delay_seconds() -> u64 {
    600
}
const fn default_max_attempts() -> u32 {
    5
}
const fn default_batch_size() -> u32 {
    5
}
const fn default_poll_interval_ms() -> u64 {
    2_000
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            lease_seconds: default_lease_seconds(),
            retry_delay_seconds: default_retry_delay_seconds(),
            retry_max_delay_seconds: default_retry_max_delay_seconds(),
            max_attempts: default_max_attempts(),
            batch_size: default_batch_size(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbedConfig {
    #[serde(default)]
    pub use_fake: bool,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_embed_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embed_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_contextual_max_chars")]
    pub contextual_max_chars: usize,
    #[serde(default = "default_contextual_max_chunks")]
    pub contextual_max_chunks: usize,
}

const fn default_embed_batch_size() -> usize {
    32
}
const fn default_embed_concurrency() -> usize {
    2
}
const fn default_contextual_max_chars() -> usize {
    60_000
}
const fn default_contextual_max_chunks() -> usize {
    200
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            use_fake: false,
            base_url: None,
            api_key: None,
            batch_size: default_embed_batch_size(),
            concurrency: default_embed_concurrency(),
            contextual_max_chars: default_contextual_max_chars(),
            contextual_max_chunks: default_contextual_max_chunks(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_bm25_caps_ttl_seconds")]
    pub bm25_caps_ttl_seconds: u64,
    #[serde(default)]
    pub skip_index_build: bool,
}

const fn default_bm25_caps_ttl_seconds() -> u64 {
    300
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            bm25_caps_ttl_seconds: default_bm25_caps_ttl_seconds(),
            skip_index_build: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub outbox: OutboxConfig,
    #[serde(default)]
    pub embed: EmbedConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

impl AppConfig {
    /// Layered load: a base file, a run-mode file, then environment overrides under
    /// the literal variable names spec.md documents (`DATABASE_URL`, `OUTBOX_*`,
    /// `EMBED_*`/`EMBEDDER_*`, `CONTEXTUAL_*`) rather than one blanket prefix.
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .add_source(Environment::with_prefix("OUTBOX").separator("_"))
            .add_source(Environment::with_prefix("EMBED").separator("_"))
            .add_source(Environment::with_prefix("EMBEDDER").separator("_"))
            .add_source(Environment::with_prefix("CONTEXTUAL").separator("_"))
            .add_source(Environment::with_prefix("SEARCH").separator("_"));

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbox_defaults_match_spec() {
        let cfg = OutboxConfig::default();
        assert_eq!(cfg.lease_seconds, 120);
        assert_eq!(cfg.retry_delay_seconds, 5);
        assert_eq!(cfg.retry_max_delay_seconds, 600);
        assert_eq!(cfg.max_attempts, 5);
        assert_eq!(cfg.batch_size, 5);
        assert_eq!(cfg.poll_interval_ms, 2_000);
    }

    #[test]
    fn embed_defaults_match_spec() {
        let cfg = EmbedConfig::default();
        assert_eq!(cfg.batch_size, 32);
        assert_eq!(cfg.concurrency, 2);
        assert_eq!(cfg.contextual_max_chars, 60_000);
    }
}
