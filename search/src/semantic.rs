use std::str::FromStr;

use memento_core::config::EmbedConfig;
use memento_core::model::Distance;
use memento_embed::provider::{EmbedRequest, InputType};
use memento_embed::{build_embedder, ProviderConfig, ProviderKind};
use memento_storage::Repository;
use pgvector::Vector;
use sqlx::Row;
use uuid::Uuid;

use crate::dsl::SearchFilters;
use crate::error::SearchError;

#[derive(Debug, Clone, PartialEq)]
pub struct SemanticMatch {
    pub chunk_id: Uuid,
    pub item_id: Uuid,
    pub version_id: Uuid,
    pub heading_path: Vec<String>,
    pub section_anchor: Option<String>,
    pub distance: f32,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SemanticOutcome {
    Matches(Vec<SemanticMatch>),
    Empty { reason: &'static str },
}

#[derive(Debug, Clone, Copy)]
pub struct EfSearchBounds {
    pub min: u32,
    pub factor: f32,
    pub max: u32,
}

impl Default for EfSearchBounds {
    fn default() -> Self {
        Self {
            min: 40,
            factor: 2.0,
            max: 400,
        }
    }
}

/// `clamp(max(min, top_k, ceil(top_k * factor)), min, max)`.
pub fn resolve_ef_search(top_k: usize, bounds: EfSearchBounds) -> u32 {
    let scaled = (top_k as f32 * bounds.factor).ceil() as u32;
    let raised = (bounds.min).max(top_k as u32).max(scaled);
    raised.clamp(bounds.min, bounds.max)
}

fn distance_to_score(distance: f32, metric: Distance) -> f32 {
    match metric {
        Distance::Cosine => 1.0 - distance,
        _ => -distance,
    }
}

fn distance_operator(metric: Distance) -> &'static str {
    match metric {
        Distance::Cosine => "<=>",
        Distance::L2 => "<->",
        Distance::Ip => "<#>",
    }
}

pub struct SemanticEngine {
    repo: Repository,
    embed_config: EmbedConfig,
    ef_bounds: EfSearchBounds,
}

impl SemanticEngine {
    pub fn new(repo: Repository, embed_config: EmbedConfig) -> Self {
        Self {
            repo,
            embed_config,
            ef_bounds: EfSearchBounds::default(),
        }
    }

    pub async fn search(
        &self,
        project_id: Uuid,
        query: &str,
        filters: &SearchFilters,
        top_k: usize,
    ) -> Result<SemanticOutcome, SearchError> {
        let profile = match self.repo.active_embedding_profile(project_id).await? {
            Some(p) => p,
            None => return Ok(SemanticOutcome::Empty { reason: "no_active_profile" }),
        };

        let provider = match ProviderKind::from_str(&profile.provider) {
            Ok(p) => p,
            Err(_) => return Ok(SemanticOutcome::Empty { reason: "embedder_not_configured" }),
        };
        let provider_config: ProviderConfig =
            serde_json::from_value(profile.provider_config.clone()).unwrap_or_default();
        let embedder = match build_embedder(
            provider,
            &profile.model,
            profile.dims as usize,
            &provider_config,
            self.embed_config.use_fake,
        ) {
            Ok(e) => e,
            Err(_) => return Ok(SemanticOutcome::Empty { reason: "embedder_not_configured" }),
        };

        let response = embedder
            .embed(EmbedRequest {
                texts: vec![query.to_string()],
                input_type: InputType::Query,
            })
            .await?;

        let Some(query_vector) = response.vectors.into_iter().next() else {
            return Ok(SemanticOutcome::Empty { reason: "empty_embedding" });
        };
        if query_vector.is_empty() {
            return Ok(SemanticOutcome::Empty { reason: "empty_embedding" });
        }
        if response.dimensions != profile.dims as usize {
            return Err(SearchError::DimensionMismatch {
                expected: profile.dims as usize,
                actual: response.dimensions,
            });
        }

        let ef_search = resolve_ef_search(top_k, self.ef_bounds);
        let multiplier: i64 = if filters.is_empty() { 4 } else { 8 };
        let candidate_limit = top_k as i64 * multiplier;
        let operator = distance_operator(profile.distance);

        let mut tx = self.repo.pool().begin().await?;
        sqlx::query(&format!("SET LOCAL hnsw.ef_search = {ef_search}"))
            .execute(&mut *tx)
            .await?;

        let item_ids: Option<Vec<Uuid>> = (!filters.item_ids.is_empty()).then(|| filters.item_ids.clone());
        let kinds: Option<Vec<String>> = (!filters.kinds.is_empty()).then(|| filters.kinds.clone());

        let sql = format!(
            r#"
            WITH candidates AS (
                SELECT e.chunk_id, e.embedding_vector {operator} $2 AS distance
                FROM chunk_embeddings e
                WHERE e.embedding_profile_id = $1
                ORDER BY distance ASC
                LIMIT $3
            )
            SELECT cand.chunk_id, cand.distance, c.version_id, v.item_id, c.heading_path, c.section_anchor
            FROM candidates cand
            JOIN memory_chunks c ON c.id = cand.chunk_id
            JOIN memory_versions v ON v.id = c.version_id
            JOIN memory_items i ON i.id = v.item_id
            WHERE i.project_id = $4
              AND i.status = 'active'
              AND ($5::uuid[] IS NULL OR i.id = ANY($5))
              AND ($6::text[] IS NULL OR i.kind = ANY($6))
            ORDER BY cand.distance ASC
            LIMIT $7
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(profile.id)
            .bind(Vector::from(query_vector))
            .bind(candidate_limit)
            .bind(project_id)
            .bind(item_ids)
            .bind(kinds)
            .bind(top_k as i64)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        let matches = rows
            .iter()
            .map(|row| {
                let distance: f32 = row.try_get("distance")?;
                Ok(SemanticMatch {
                    chunk_id: row.try_get("chunk_id")?,
                    item_id: row.try_get("item_id")?,
                    version_id: row.try_get("version_id")?,
                    heading_path: row.try_get::<Vec<String>, _>("heading_path").unwrap_or_default(),
                    section_anchor: row.try_get("section_anchor")?,
                    distance,
                    score: distance_to_score(distance, profile.distance),
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(SemanticOutcome::Matches(matches))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ef_search_respects_floor_and_ceiling() {
        let bounds = EfSearchBounds::default();
        assert_eq!(resolve_ef_search(10, bounds), 40);
        assert_eq!(resolve_ef_search(100, bounds), 200);
        assert_eq!(resolve_ef_search(1000, bounds), 400);
    }

    #[test]
    fn cosine_distance_converts_to_similarity_score() {
        assert!((distance_to_score(0.2, Distance::Cosine) - 0.8).abs() < 1e-6);
        assert!((distance_to_score(0.2, Distance::L2) + 0.2).abs() < 1e-6);
    }
}
