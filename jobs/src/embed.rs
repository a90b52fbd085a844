use std::str::FromStr;

use futures::stream::{self, StreamExt};
use memento_core::config::EmbedConfig;
use memento_core::model::{EmbeddingProfile, MemoryChunk};
use memento_embed::provider::{ContextualChunk, EmbedRequest, Embedder, InputType};
use memento_embed::{build_embedder, DispatchError, ProviderConfig, ProviderKind};
use memento_storage::Repository;
use pgvector::Vector;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::JobError;

const CANONICAL_CONTEXTUAL_CLASSES: &[&str] = &["app_spec", "feature_spec", "implementation_plan"];

#[derive(Debug, Deserialize)]
pub struct EmbedPayload {
    pub version_id: Uuid,
    #[serde(default)]
    pub embedding_profile_id: Option<Uuid>,
}

impl From<DispatchError> for JobError {
    fn from(err: DispatchError) -> Self {
        JobError::Dispatch(err.to_string())
    }
}

pub async fn run_embed_job(
    repo: &Repository,
    config: &EmbedConfig,
    payload: &EmbedPayload,
) -> Result<(), JobError> {
    let version = repo.get_version(payload.version_id).await?;
    let item = repo.get_item(version.project_id, version.item_id).await?;

    let profile = match payload.embedding_profile_id {
        Some(id) => repo.get_embedding_profile(id).await?,
        None => repo
            .active_embedding_profile(version.project_id)
            .await?
            .ok_or_else(|| JobError::Validation("project has no active embedding profile".into()))?,
    };

    let chunks = repo.chunks_for_version(version.id).await?;

    if chunks.is_empty() {
        delete_stale_embeddings(repo, version.id, profile.id).await?;
        info!(version_id = %version.id, "embed job found zero chunks, no-op");
        return Ok(());
    }

    let provider = ProviderKind::from_str(&profile.provider)
        .map_err(|e| JobError::Dispatch(e.to_string()))?;
    let provider_config: ProviderConfig =
        serde_json::from_value(profile.provider_config.clone()).unwrap_or_default();
    let embedder = build_embedder(
        provider,
        &profile.model,
        profile.dims as usize,
        &provider_config,
        config.use_fake,
    )?;

    let contextual_eligible = embedder.supports_contextual()
        && item
            .doc_class
            .as_deref()
            .map(|c| CANONICAL_CONTEXTUAL_CLASSES.contains(&c))
            .unwrap_or(false)
        && item.canonical_key.is_some();

    if contextual_eligible {
        let total_chars: usize = chunks.iter().map(|c| c.chunk_text.len()).sum();
        let max_chars = profile_override_usize(&profile, "contextual_max_chars")
            .unwrap_or(config.contextual_max_chars);
        let max_chunks = profile_override_usize(&profile, "contextual_max_chunks")
            .unwrap_or(config.contextual_max_chunks);
        let strict = profile_override_bool(&profile, "contextual_strict").unwrap_or(false);

        if total_chars <= max_chars && chunks.len() <= max_chunks {
            match run_contextual(repo, &*embedder, &profile, &chunks).await {
                Ok(()) => return Ok(()),
                Err(err) if strict => return Err(err),
                Err(err) => {
                    warn!(error = %err, version_id = %version.id, "contextual embedding failed, falling back to batch mode");
                }
            }
        } else {
            warn!(
                version_id = %version.id,
                total_chars,
                chunk_count = chunks.len(),
                "skipping contextual embedding, exceeds configured guard"
            );
        }
    }

    run_batch(repo, &*embedder, &profile, &chunks, config).await
}

async fn run_contextual(
    repo: &Repository,
    embedder: &dyn Embedder,
    profile: &EmbeddingProfile,
    chunks: &[MemoryChunk],
) -> Result<(), JobError> {
    let contextual_chunks: Vec<ContextualChunk> = chunks
        .iter()
        .map(|c| ContextualChunk {
            chunk_id: c.id,
            text: c.chunk_text.clone(),
        })
        .collect();

    let response = embedder
        .embed_document_chunks_contextual(&contextual_chunks)
        .await?;

    if response.dimensions != profile.dims as usize || response.vectors.len() != chunks.len() {
        return Err(JobError::Validation(format!(
            "contextual embed response shape mismatch: {} vectors of dim {}, expected {} of dim {}",
            response.vectors.len(),
            response.dimensions,
            chunks.len(),
            profile.dims
        )));
    }

    let pairs: Vec<(Uuid, Vec<f32>)> = chunks
        .iter()
        .zip(response.vectors.into_iter())
        .map(|(c, v)| (c.id, v))
        .collect();

    upsert_embeddings(repo, profile.project_id, profile.id, &pairs).await
}

async fn run_batch(
    repo: &Repository,
    embedder: &dyn Embedder,
    profile: &EmbeddingProfile,
    chunks: &[MemoryChunk],
    config: &EmbedConfig,
) -> Result<(), JobError> {
    let batch_size = config.batch_size.clamp(1, 256);
    let concurrency = config.concurrency.clamp(1, 8);

    let batches: Vec<Vec<MemoryChunk>> = chunks.chunks(batch_size).map(|b| b.to_vec()).collect();

    let results: Vec<Result<(usize, Vec<Vec<f32>>), JobError>> = stream::iter(batches.into_iter().enumerate())
        .map(|(index, batch)| async move {
            let texts: Vec<String> = batch.iter().map(|c| c.chunk_text.clone()).collect();
            let response = embedder
                .embed(EmbedRequest {
                    texts,
                    input_type: InputType::Passage,
                })
                .await?;
            if response.dimensions != profile.dims as usize || response.vectors.len() != batch.len() {
                return Err(JobError::Validation(format!(
                    "embed response shape mismatch: {} vectors of dim {}, expected {} of dim {}",
                    response.vectors.len(),
                    response.dimensions,
                    batch.len(),
                    profile.dims
                )));
            }
            Ok((index, response.vectors))
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut ordered: Vec<Option<Vec<Vec<f32>>>> = vec![None; results.len()];
    for result in results {
        let (index, vectors) = result?;
        ordered[index] = Some(vectors);
    }

    let mut pairs = Vec::with_capacity(chunks.len());
    let mut chunk_iter = chunks.iter();
    for batch_vectors in ordered.into_iter().flatten() {
        for vector in batch_vectors {
            let chunk = chunk_iter
                .next()
                .ok_or_else(|| JobError::Validation("embed batch produced more vectors than chunks".into()))?;
            pairs.push((chunk.id, vector));
        }
    }

    upsert_embeddings(repo, profile.project_id, profile.id, &pairs).await
}

fn profile_override_usize(profile: &EmbeddingProfile, key: &str) -> Option<usize> {
    profile
        .provider_config
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
}

fn profile_override_bool(profile: &EmbeddingProfile, key: &str) -> Option<bool> {
    profile.provider_config.get(key).and_then(|v| v.as_bool())
}

async fn delete_stale_embeddings(
    repo: &Repository,
    version_id: Uuid,
    profile_id: Uuid,
) -> Result<(), JobError> {
    sqlx::query(
        r#"
        DELETE FROM chunk_embeddings
        WHERE embedding_profile_id = $1
          AND chunk_id IN (SELECT id FROM memory_chunks WHERE version_id = $2)
        "#,
    )
    .bind(profile_id)
    .bind(version_id)
    .execute(repo.pool())
    .await?;
    Ok(())
}

async fn upsert_embeddings(
    repo: &Repository,
    project_id: Uuid,
    profile_id: Uuid,
    pairs: &[(Uuid, Vec<f32>)],
) -> Result<(), JobError> {
    let mut tx = repo.pool().begin().await?;
    for (chunk_id, vector) in pairs {
        sqlx::query(
            r#"
            INSERT INTO chunk_embeddings (chunk_id, embedding_profile_id, project_id, embedding_vector)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (chunk_id, embedding_profile_id)
            DO UPDATE SET embedding_vector = EXCLUDED.embedding_vector
            "#,
        )
        .bind(chunk_id)
        .bind(profile_id)
        .bind(project_id)
        .bind(Vector::from(vector.clone()))
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}
