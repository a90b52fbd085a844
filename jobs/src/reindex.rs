use std::str::FromStr;

use futures::stream::{self, StreamExt};
use memento_core::config::EmbedConfig;
use memento_embed::provider::{EmbedRequest, InputType};
use memento_embed::{build_embedder, ProviderConfig, ProviderKind};
use memento_storage::Repository;
use pgvector::Vector;
use serde::Deserialize;
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

use crate::error::JobError;

#[derive(Debug, Deserialize)]
pub struct ReindexPayload {
    pub embedding_profile_id: Uuid,
}

const PAGE_SIZE: i64 = 200;

/// Paginates chunks of the project by ascending chunk id (keyset) and re-embeds each page
/// under the given profile, never loading the whole project into memory.
pub async fn run_reindex_job(
    repo: &Repository,
    config: &EmbedConfig,
    payload: &ReindexPayload,
) -> Result<(), JobError> {
    let profile = repo.get_embedding_profile(payload.embedding_profile_id).await?;
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

    let batch_size = config.batch_size.clamp(1, 256);
    let concurrency = config.concurrency.clamp(1, 8);

    let mut cursor: Option<Uuid> = None;
    let mut first_page = true;
    let mut total_reindexed = 0usize;

    loop {
        let page = fetch_chunk_page(repo, profile.project_id, cursor, PAGE_SIZE).await?;

        if page.is_empty() {
            if first_page {
                delete_embeddings_for_profile(repo, profile.project_id, profile.id).await?;
                info!(profile_id = %profile.id, "reindex: empty project, pre-deleted stale embeddings");
            }
            break;
        }
        first_page = false;

        cursor = page.last().map(|c| c.id);

        let batches: Vec<Vec<ChunkPageRow>> = page
            .chunks(batch_size)
            .map(|b| b.iter().map(|c| ChunkPageRow { id: c.id, chunk_text: c.chunk_text.clone() }).collect())
            .collect();

        let results: Vec<Result<Vec<(Uuid, Vec<f32>)>, JobError>> = stream::iter(batches.into_iter())
            .map(|batch| {
                let embedder = embedder.clone();
                async move {
                let texts: Vec<String> = batch.iter().map(|c| c.chunk_text.clone()).collect();
                let response = embedder
                    .embed(EmbedRequest {
                        texts,
                        input_type: InputType::Passage,
                    })
                    .await?;
                if response.dimensions != profile.dims as usize || response.vectors.len() != batch.len() {
                    return Err(JobError::Validation(format!(
                        "reindex embed response shape mismatch: {} vectors, expected {}",
                        response.vectors.len(),
                        batch.len()
                    )));
                }
                Ok(batch
                    .iter()
                    .zip(response.vectors.into_iter())
                    .map(|(c, v)| (c.id, v))
                    .collect())
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut pairs = Vec::new();
        for result in results {
            pairs.extend(result?);
        }

        total_reindexed += pairs.len();
        upsert_embeddings(repo, profile.project_id, profile.id, &pairs).await?;
    }

    info!(profile_id = %profile.id, total_reindexed, "reindex complete");
    Ok(())
}

async fn fetch_chunk_page(
    repo: &Repository,
    project_id: Uuid,
    after: Option<Uuid>,
    page_size: i64,
) -> Result<Vec<ChunkPageRow>, JobError> {
    let rows = sqlx::query(
        r#"
        SELECT id, chunk_text FROM memory_chunks
        WHERE project_id = $1 AND ($2::uuid IS NULL OR id > $2)
        ORDER BY id ASC
        LIMIT $3
        "#,
    )
    .bind(project_id)
    .bind(after)
    .bind(page_size)
    .fetch_all(repo.pool())
    .await?;

    rows.into_iter()
        .map(|row| {
            Ok(ChunkPageRow {
                id: row.try_get("id")?,
                chunk_text: row.try_get("chunk_text")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(JobError::from)
}

struct ChunkPageRow {
    id: Uuid,
    chunk_text: String,
}

async fn delete_embeddings_for_profile(
    repo: &Repository,
    project_id: Uuid,
    profile_id: Uuid,
) -> Result<(), JobError> {
    sqlx::query("DELETE FROM chunk_embeddings WHERE project_id = $1 AND embedding_profile_id = $2")
        .bind(project_id)
        .bind(profile_id)
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
