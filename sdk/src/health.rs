use chrono::Utc;
use sqlx::{PgPool, Row};

use crate::error::SdkError;

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub database_ok: bool,
    pub outbox_pending: i64,
    pub outbox_oldest_pending_age_seconds: Option<i64>,
}

pub async fn check(pool: &PgPool) -> Result<HealthReport, SdkError> {
    let database_ok = sqlx::query("SELECT 1").fetch_one(pool).await.is_ok();

    let row = sqlx::query(
        r#"
        SELECT count(*) AS pending, min(created_at) AS oldest
        FROM outbox_events WHERE processed_at IS NULL
        "#,
    )
    .fetch_one(pool)
    .await?;

    let outbox_pending: i64 = row.try_get("pending")?;
    let oldest: Option<chrono::DateTime<Utc>> = row.try_get("oldest")?;
    let outbox_oldest_pending_age_seconds =
        oldest.map(|ts| (Utc::now() - ts).num_seconds().max(0));

    Ok(HealthReport {
        database_ok,
        outbox_pending,
        outbox_oldest_pending_age_seconds,
    })
}
