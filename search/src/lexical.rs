use std::sync::Mutex;
use std::time::{Duration, Instant};

use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::dsl::{should_apply_trigram, SearchFilters, SearchOptions};
use crate::error::SearchError;

#[derive(Debug, Clone)]
pub struct LexicalMatch {
    pub chunk_id: Uuid,
    pub item_id: Uuid,
    pub version_id: Uuid,
    pub heading_path: Vec<String>,
    pub section_anchor: Option<String>,
    pub excerpt: String,
    /// Primary rank blended with `trigram_weight * trigram_score`; this is what orders and
    /// truncates the SQL result set.
    pub lexical_score: f32,
    pub trigram_score: f32,
}

struct Bm25Probe {
    available: bool,
    checked_at: Instant,
}

/// Caches the BM25-extension capability probe process-wide (not per-project, since extension
/// availability is a database-level property) with a configurable TTL, re-probing after expiry
/// or after any probe/query failure.
pub struct Bm25Cache {
    ttl: Duration,
    cached: Mutex<Option<Bm25Probe>>,
}

impl Bm25Cache {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_seconds),
            cached: Mutex::new(None),
        }
    }

    async fn available(&self, pool: &PgPool) -> bool {
        {
            let guard = self.cached.lock().expect("bm25 cache mutex poisoned");
            if let Some(probe) = guard.as_ref() {
                if probe.checked_at.elapsed() < self.ttl {
                    return probe.available;
                }
            }
        }

        let available = probe_bm25(pool).await.unwrap_or(false);
        let mut guard = self.cached.lock().expect("bm25 cache mutex poisoned");
        *guard = Some(Bm25Probe {
            available,
            checked_at: Instant::now(),
        });
        available
    }

    pub fn invalidate(&self) {
        let mut guard = self.cached.lock().expect("bm25 cache mutex poisoned");
        *guard = None;
    }
}

async fn probe_bm25(pool: &PgPool) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM pg_am WHERE amname = 'bm25') AS present")
        .fetch_one(pool)
        .await?;
    row.try_get("present")
}

pub struct LexicalEngine {
    pool: PgPool,
    bm25_cache: Bm25Cache,
}

impl LexicalEngine {
    pub fn new(pool: PgPool, bm25_caps_ttl_seconds: u64) -> Self {
        Self {
            pool,
            bm25_cache: Bm25Cache::new(bm25_caps_ttl_seconds),
        }
    }

    pub async fn search(
        &self,
        project_id: Uuid,
        query: &str,
        filters: &SearchFilters,
        options: SearchOptions,
    ) -> Result<Vec<LexicalMatch>, SearchError> {
        let use_bm25 = self.bm25_cache.available(&self.pool).await;
        let apply_trigram = should_apply_trigram(query);

        let result = self
            .run_query(project_id, query, filters, options, use_bm25, apply_trigram)
            .await;

        match result {
            Ok(matches) => Ok(matches),
            Err(err) if use_bm25 => {
                debug!(error = %err, "bm25 query failed, falling back to full-text search");
                self.bm25_cache.invalidate();
                self.run_query(project_id, query, filters, options, false, apply_trigram)
                    .await
            }
            Err(err) => Err(err),
        }
    }

    async fn run_query(
        &self,
        project_id: Uuid,
        query: &str,
        filters: &SearchFilters,
        options: SearchOptions,
        use_bm25: bool,
        apply_trigram: bool,
    ) -> Result<Vec<LexicalMatch>, SearchError> {
        let primary_rank_expr = if use_bm25 {
            "paradedb.score(c.id)"
        } else {
            "ts_rank(c.tsv, websearch_to_tsquery('english', $2))"
        };
        let match_clause = if use_bm25 {
            "c.chunk_text &&& $2"
        } else {
            "c.tsv @@ websearch_to_tsquery('english', $2)"
        };
        let trigram_expr = if apply_trigram {
            "similarity(c.chunk_text, $2)"
        } else {
            "0.0"
        };

        // §4.10: the ordered/truncated lexical score blends the primary rank with the
        // trigram-weighted similarity, so identifier-heavy matches that only rank via trigram
        // similarity aren't cut before fusion ever sees them.
        let sql = format!(
            r#"
            SELECT c.id AS chunk_id, c.version_id, v.item_id, c.heading_path, c.section_anchor,
                   left(c.chunk_text, $3) AS excerpt,
                   ({primary_rank_expr}) + $7::real * ({trigram_expr}) AS lexical_score,
                   {trigram_expr} AS trigram_score
            FROM memory_chunks c
            JOIN memory_versions v ON v.id = c.version_id
            JOIN memory_items i ON i.id = v.item_id
            WHERE i.project_id = $1
              AND i.status = 'active'
              AND {match_clause}
              AND ($4::uuid[] IS NULL OR i.id = ANY($4))
              AND ($5::text[] IS NULL OR i.kind = ANY($5))
            ORDER BY lexical_score DESC
            LIMIT $6
            "#
        );

        let item_ids: Option<Vec<Uuid>> = (!filters.item_ids.is_empty()).then(|| filters.item_ids.clone());
        let kinds: Option<Vec<String>> = (!filters.kinds.is_empty()).then(|| filters.kinds.clone());

        let rows = sqlx::query(&sql)
            .bind(project_id)
            .bind(query)
            .bind(options.max_chunk_chars as i32)
            .bind(item_ids)
            .bind(kinds)
            .bind(options.top_k as i64)
            .bind(options.trigram_weight)
            .fetch_all(&self.pool)
            .await
            .map_err(SearchError::from)?;

        rows.iter()
            .map(|row| {
                Ok(LexicalMatch {
                    chunk_id: row.try_get("chunk_id")?,
                    item_id: row.try_get("item_id")?,
                    version_id: row.try_get("version_id")?,
                    heading_path: row.try_get::<Vec<String>, _>("heading_path").unwrap_or_default(),
                    section_anchor: row.try_get("section_anchor")?,
                    excerpt: row.try_get("excerpt")?,
                    lexical_score: row.try_get::<f32, _>("lexical_score")?,
                    trigram_score: row.try_get::<f32, _>("trigram_score")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(SearchError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bm25_cache_starts_unprobed() {
        let cache = Bm25Cache::new(300);
        assert!(cache.cached.lock().unwrap().is_none());
    }
}
