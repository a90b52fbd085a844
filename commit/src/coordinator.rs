use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use memento_core::hashing::checksum;
use memento_core::model::{ContentFormat, MemoryScope};
use serde_json::{json, Value as Json};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::canonical::kind_for_doc_class;
use crate::error::CommitError;

#[derive(Debug, Clone)]
pub enum ItemRef {
    Id(Uuid),
    CanonicalKey(String),
    New,
}

#[derive(Debug, Clone)]
pub struct CommitEntry {
    pub item_ref: ItemRef,
    pub scope: MemoryScope,
    pub kind: Option<String>,
    pub doc_class: Option<String>,
    pub title: String,
    pub pinned: Option<bool>,
    pub tags: Vec<String>,
    pub metadata: Json,
    pub content_format: ContentFormat,
    pub content_text: String,
    pub content_json: Option<Json>,
}

#[derive(Debug, Clone)]
pub struct LinkRequest {
    pub to: ItemRef,
    pub relation: String,
    pub weight: f32,
    pub metadata: Json,
}

#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub project_id: Uuid,
    pub idempotency_key: String,
    pub session_id: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub entries: Vec<CommitEntry>,
    pub links: Vec<LinkRequest>,
}

#[derive(Debug, Clone)]
pub struct CommittedVersion {
    pub item_id: Uuid,
    pub version_id: Uuid,
    pub version_num: i32,
}

#[derive(Debug, Clone)]
pub struct CommitResult {
    pub commit_id: Uuid,
    pub deduped: bool,
    pub versions: Vec<CommittedVersion>,
}

/// Serializes concurrent commits under the same raw idempotency key so duplicate callers
/// observe the DB's own `(project_id, idempotency_key)` uniqueness rather than racing each
/// other into two transactions.
pub struct CommitCoordinator {
    pool: PgPool,
    locks: Arc<DashMap<(Uuid, String), ()>>,
}

impl CommitCoordinator {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            locks: Arc::new(DashMap::new()),
        }
    }

    pub async fn commit(&self, request: CommitRequest) -> Result<CommitResult, CommitError> {
        let lock_key = (request.project_id, request.idempotency_key.clone());
        while self.locks.contains_key(&lock_key) {
            tokio::task::yield_now().await;
        }
        self.locks.insert(lock_key.clone(), ());
        let result = self.commit_inner(request).await;
        self.locks.remove(&lock_key);
        result
    }

    async fn commit_inner(&self, request: CommitRequest) -> Result<CommitResult, CommitError> {
        for entry in &request.entries {
            if entry.kind.is_none() && entry.doc_class.is_none() {
                return Err(CommitError::Validation(
                    "entry must specify kind or doc_class".into(),
                ));
            }
            if entry.title.trim().is_empty() {
                return Err(CommitError::Validation("entry title must not be empty".into()));
            }
        }

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO commits (project_id, session_id, idempotency_key, author, summary)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (project_id, idempotency_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(request.project_id)
        .bind(&request.session_id)
        .bind(&request.idempotency_key)
        .bind(&request.author)
        .bind(&request.summary)
        .fetch_optional(&mut *tx)
        .await?;

        let (commit_id, deduped) = match inserted {
            Some(row) => (row.try_get::<Uuid, _>("id")?, false),
            None => {
                let existing = sqlx::query(
                    r#"SELECT id FROM commits WHERE project_id = $1 AND idempotency_key = $2"#,
                )
                .bind(request.project_id)
                .bind(&request.idempotency_key)
                .fetch_one(&mut *tx)
                .await?;
                (existing.try_get::<Uuid, _>("id")?, true)
            }
        };

        if deduped {
            let rows = sqlx::query(
                r#"SELECT item_id, id, version_num FROM memory_versions
                   WHERE commit_id = $1 ORDER BY created_at ASC"#,
            )
            .bind(commit_id)
            .fetch_all(&mut *tx)
            .await?;
            tx.commit().await?;

            let versions = rows
                .iter()
                .map(|row| {
                    Ok(CommittedVersion {
                        item_id: row.try_get("item_id")?,
                        version_id: row.try_get("id")?,
                        version_num: row.try_get("version_num")?,
                    })
                })
                .collect::<Result<_, sqlx::Error>>()?;

            return Ok(CommitResult {
                commit_id,
                deduped: true,
                versions,
            });
        }

        let mut versions = Vec::with_capacity(request.entries.len());

        for entry in &request.entries {
            let kind = entry
                .kind
                .clone()
                .or_else(|| entry.doc_class.as_deref().and_then(kind_for_doc_class).map(String::from))
                .ok_or_else(|| CommitError::Validation("unable to resolve kind".into()))?;

            let item_id = upsert_item(&mut tx, request.project_id, entry, &kind).await?;

            let row = sqlx::query(r#"SELECT id, version_num FROM memory_versions WHERE item_id = $1
                                      ORDER BY version_num DESC LIMIT 1 FOR UPDATE"#)
                .bind(item_id)
                .fetch_optional(&mut *tx)
                .await?;
            let next_version_num = row.as_ref().map(|r| r.try_get::<i32, _>("version_num")).transpose()?.unwrap_or(0) + 1;

            let format_label = match entry.content_format {
                ContentFormat::Markdown => "markdown",
                ContentFormat::Plain => "plain",
                ContentFormat::Json => "json",
            };
            let version_checksum = checksum(&entry.content_text);

            let version_row = sqlx::query(
                r#"
                INSERT INTO memory_versions
                    (project_id, item_id, commit_id, version_num, content_format, content_text, content_json, checksum)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING id
                "#,
            )
            .bind(request.project_id)
            .bind(item_id)
            .bind(commit_id)
            .bind(next_version_num)
            .bind(format_label)
            .bind(&entry.content_text)
            .bind(&entry.content_json)
            .bind(&version_checksum)
            .fetch_one(&mut *tx)
            .await?;
            let version_id: Uuid = version_row.try_get("id")?;

            for event_type in ["INGEST_VERSION", "EMBED_VERSION"] {
                let payload = json!({ "version_id": version_id, "item_id": item_id });
                sqlx::query(
                    r#"INSERT INTO outbox_events (project_id, event_type, payload) VALUES ($1, $2, $3)"#,
                )
                .bind(request.project_id)
                .bind(event_type)
                .bind(payload)
                .execute(&mut *tx)
                .await?;
            }

            versions.push(CommittedVersion {
                item_id,
                version_id,
                version_num: next_version_num,
            });
        }

        for link in &request.links {
            let from_item_id = versions
                .first()
                .map(|v| v.item_id)
                .ok_or_else(|| CommitError::Validation("no items to link from".into()))?;
            let to_item_id = resolve_item_ref(&mut tx, request.project_id, &link.to).await?;
            verify_same_project(&mut tx, request.project_id, to_item_id).await?;

            sqlx::query(
                r#"INSERT INTO memory_links (project_id, from_item_id, to_item_id, relation, weight, metadata)
                   VALUES ($1, $2, $3, $4, $5, $6)"#,
            )
            .bind(request.project_id)
            .bind(from_item_id)
            .bind(to_item_id)
            .bind(&link.relation)
            .bind(link.weight)
            .bind(&link.metadata)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(CommitResult {
            commit_id,
            deduped: false,
            versions,
        })
    }

    /// Canonical upsert: pins by default and infers `kind` from `doc_class`.
    pub async fn canonical_upsert(
        &self,
        mut request: CommitRequest,
    ) -> Result<CommitResult, CommitError> {
        for entry in &mut request.entries {
            if entry.pinned.is_none() {
                entry.pinned = Some(true);
            }
        }
        self.commit(request).await
    }
}

async fn upsert_item(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    project_id: Uuid,
    entry: &CommitEntry,
    kind: &str,
) -> Result<Uuid, CommitError> {
    let scope_label = match entry.scope {
        MemoryScope::Project => "project",
        MemoryScope::WorkspaceShared => "workspace_shared",
        MemoryScope::Global => "global",
    };
    let pinned = entry.pinned.unwrap_or(false);
    let now = Utc::now();

    match &entry.item_ref {
        ItemRef::Id(id) => {
            let row = sqlx::query(r#"SELECT id FROM memory_items WHERE project_id = $1 AND id = $2"#)
                .bind(project_id)
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?
                .ok_or_else(|| CommitError::Validation(format!("item {id} not found in project")))?;
            Ok(row.try_get("id")?)
        }
        ItemRef::CanonicalKey(key) => {
            let row = sqlx::query(
                r#"
                INSERT INTO memory_items
                    (project_id, scope, kind, canonical_key, doc_class, title, pinned, tags, metadata, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (project_id, canonical_key) DO UPDATE SET
                    kind = COALESCE(EXCLUDED.kind, memory_items.kind),
                    doc_class = COALESCE(EXCLUDED.doc_class, memory_items.doc_class),
                    title = COALESCE(NULLIF(EXCLUDED.title, ''), memory_items.title),
                    pinned = EXCLUDED.pinned OR memory_items.pinned,
                    updated_at = EXCLUDED.updated_at
                RETURNING id
                "#,
            )
            .bind(project_id)
            .bind(scope_label)
            .bind(kind)
            .bind(key)
            .bind(&entry.doc_class)
            .bind(&entry.title)
            .bind(pinned)
            .bind(&entry.tags)
            .bind(&entry.metadata)
            .bind(now)
            .fetch_one(&mut **tx)
            .await?;
            Ok(row.try_get("id")?)
        }
        ItemRef::New => {
            let row = sqlx::query(
                r#"
                INSERT INTO memory_items
                    (project_id, scope, kind, doc_class, title, pinned, tags, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING id
                "#,
            )
            .bind(project_id)
            .bind(scope_label)
            .bind(kind)
            .bind(&entry.doc_class)
            .bind(&entry.title)
            .bind(pinned)
            .bind(&entry.tags)
            .bind(&entry.metadata)
            .fetch_one(&mut **tx)
            .await?;
            Ok(row.try_get("id")?)
        }
    }
}

async fn resolve_item_ref(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    project_id: Uuid,
    item_ref: &ItemRef,
) -> Result<Uuid, CommitError> {
    match item_ref {
        ItemRef::Id(id) => Ok(*id),
        ItemRef::CanonicalKey(key) => {
            let row = sqlx::query(r#"SELECT id FROM memory_items WHERE project_id = $1 AND canonical_key = $2"#)
                .bind(project_id)
                .bind(key)
                .fetch_optional(&mut **tx)
                .await?
                .ok_or_else(|| CommitError::LinkEndpointNotFound(key.clone()))?;
            Ok(row.try_get("id")?)
        }
        ItemRef::New => Err(CommitError::Validation("link target cannot be a new item".into())),
    }
}

async fn verify_same_project(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    project_id: Uuid,
    item_id: Uuid,
) -> Result<(), CommitError> {
    let row = sqlx::query(r#"SELECT 1 AS present FROM memory_items WHERE project_id = $1 AND id = $2"#)
        .bind(project_id)
        .bind(item_id)
        .fetch_optional(&mut **tx)
        .await?;
    if row.is_none() {
        return Err(CommitError::LinkEndpointNotFound(item_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_upsert_defaults_pinned_when_unset() {
        let mut entry = CommitEntry {
            item_ref: ItemRef::CanonicalKey("app-spec".into()),
            scope: MemoryScope::Project,
            kind: None,
            doc_class: Some("app_spec".into()),
            title: "App Spec".into(),
            pinned: None,
            tags: vec![],
            metadata: json!({}),
            content_format: ContentFormat::Markdown,
            content_text: "content".into(),
            content_json: None,
        };
        entry.pinned = entry.pinned.or(Some(true));
        assert_eq!(entry.pinned, Some(true));
    }
}
