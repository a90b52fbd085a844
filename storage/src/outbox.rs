use chrono::{DateTime, Duration as ChronoDuration, Utc};
use memento_core::model::{OutboxEvent, OutboxEventType};
use serde_json::Value as Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::RepoError;

fn event_type_str(event_type: OutboxEventType) -> &'static str {
    match event_type {
        OutboxEventType::IngestVersion => "INGEST_VERSION",
        OutboxEventType::EmbedVersion => "EMBED_VERSION",
        OutboxEventType::ReindexProfile => "REINDEX_PROFILE",
    }
}

fn parse_event_type(s: &str) -> Option<OutboxEventType> {
    match s {
        "INGEST_VERSION" => Some(OutboxEventType::IngestVersion),
        "EMBED_VERSION" => Some(OutboxEventType::EmbedVersion),
        "REINDEX_PROFILE" => Some(OutboxEventType::ReindexProfile),
        _ => None,
    }
}

fn row_to_event(row: &sqlx::postgres::PgRow) -> Result<OutboxEvent, RepoError> {
    let event_type_raw: String = row.try_get("event_type")?;
    Ok(OutboxEvent {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        event_type: parse_event_type(&event_type_raw)
            .ok_or_else(|| RepoError::Validation(format!("unknown event_type {event_type_raw}")))?,
        payload: row.try_get("payload")?,
        created_at: row.try_get("created_at")?,
        processed_at: row.try_get("processed_at")?,
        retry_count: row.try_get("retry_count")?,
        next_attempt_at: row.try_get("next_attempt_at")?,
        locked_by: row.try_get("locked_by")?,
        lease_expires_at: row.try_get("lease_expires_at")?,
        error: row.try_get("error")?,
    })
}

pub struct OutboxStore {
    pool: PgPool,
}

impl OutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn enqueue(
        &self,
        project_id: Uuid,
        event_type: OutboxEventType,
        payload: Json,
    ) -> Result<Uuid, RepoError> {
        let row = sqlx::query(
            r#"
            INSERT INTO outbox_events (project_id, event_type, payload)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(project_id)
        .bind(event_type_str(event_type))
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("id")?)
    }

    /// Claims up to `batch_size` claimable events, ordered by `created_at` ascending, via
    /// `FOR UPDATE SKIP LOCKED` so concurrent workers never contend on the same row.
    pub async fn claim_batch(
        &self,
        worker_id: &str,
        batch_size: i64,
        lease_seconds: i64,
        project_id: Option<Uuid>,
    ) -> Result<Vec<OutboxEvent>, RepoError> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r#"
            SELECT id FROM outbox_events
            WHERE processed_at IS NULL
              AND (lease_expires_at IS NULL OR lease_expires_at <= now())
              AND (next_attempt_at IS NULL OR next_attempt_at <= now())
              AND ($2::uuid IS NULL OR project_id = $2)
            ORDER BY created_at ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(batch_size)
        .bind(project_id)
        .fetch_all(&mut *tx)
        .await?;

        let ids: Vec<Uuid> = rows
            .iter()
            .map(|r| r.try_get::<Uuid, _>("id"))
            .collect::<Result<_, _>>()?;

        if ids.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        let claimed = sqlx::query(
            r#"
            UPDATE outbox_events
            SET locked_by = $2, lease_expires_at = now() + ($3 || ' seconds')::interval
            WHERE id = ANY($1)
            RETURNING id, project_id, event_type, payload, created_at, processed_at,
                      retry_count, next_attempt_at, locked_by, lease_expires_at, error
            "#,
        )
        .bind(&ids)
        .bind(worker_id)
        .bind(lease_seconds.to_string())
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        claimed.iter().map(row_to_event).collect()
    }

    /// Returns whether the update matched: `false` means the lease was stolen and the caller
    /// must not treat the event as handled.
    pub async fn finalize_success(&self, event_id: Uuid, worker_id: &str) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_events
            SET processed_at = now(), error = NULL, locked_by = NULL, lease_expires_at = NULL
            WHERE id = $1 AND locked_by = $2 AND processed_at IS NULL
            "#,
        )
        .bind(event_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn finalize_failure(
        &self,
        event_id: Uuid,
        worker_id: &str,
        error_message: &str,
        retry_count_before: i32,
        max_attempts: i32,
        base_delay_seconds: i64,
        max_delay_seconds: i64,
    ) -> Result<bool, RepoError> {
        let truncated: String = error_message.chars().take(1000).collect();
        let next_retry_count = retry_count_before + 1;

        if next_retry_count >= max_attempts {
            let result = sqlx::query(
                r#"
                UPDATE outbox_events
                SET retry_count = $3, processed_at = now(), error = $4,
                    locked_by = NULL, lease_expires_at = NULL
                WHERE id = $1 AND locked_by = $2 AND processed_at IS NULL
                "#,
            )
            .bind(event_id)
            .bind(worker_id)
            .bind(next_retry_count)
            .bind(&truncated)
            .execute(&self.pool)
            .await?;
            return Ok(result.rows_affected() == 1);
        }

        let delay_seconds = backoff_seconds(next_retry_count, base_delay_seconds, max_delay_seconds);
        let next_attempt_at: DateTime<Utc> = Utc::now() + ChronoDuration::seconds(delay_seconds);

        let result = sqlx::query(
            r#"
            UPDATE outbox_events
            SET retry_count = $3, next_attempt_at = $4, error = $5,
                locked_by = NULL, lease_expires_at = NULL
            WHERE id = $1 AND locked_by = $2 AND processed_at IS NULL
            "#,
        )
        .bind(event_id)
        .bind(worker_id)
        .bind(next_retry_count)
        .bind(next_attempt_at)
        .bind(&truncated)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// `min(base * 2^(retry_count-1), max)`.
pub fn backoff_seconds(retry_count: i32, base_delay_seconds: i64, max_delay_seconds: i64) -> i64 {
    let exponent = (retry_count - 1).max(0) as u32;
    let scaled = base_delay_seconds.saturating_mul(1i64 << exponent.min(32));
    scaled.min(max_delay_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_with_each_retry() {
        assert_eq!(backoff_seconds(1, 5, 600), 5);
        assert_eq!(backoff_seconds(2, 5, 600), 10);
        assert_eq!(backoff_seconds(3, 5, 600), 20);
    }

    #[test]
    fn backoff_is_capped_at_max() {
        assert_eq!(backoff_seconds(20, 5, 600), 600);
    }

    #[test]
    fn event_type_round_trips() {
        for t in [
            OutboxEventType::IngestVersion,
            OutboxEventType::EmbedVersion,
            OutboxEventType::ReindexProfile,
        ] {
            assert_eq!(parse_event_type(event_type_str(t)), Some(t));
        }
    }
}
