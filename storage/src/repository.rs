use chrono::Utc;
use memento_core::model::{
    Commit, ContentFormat, Distance, EmbeddingProfile, ItemStatus, MemoryChunk, MemoryItem,
    MemoryLink, MemoryScope, MemoryVersion, Project, ProjectStatus, Workspace,
};
use serde_json::Value as Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::error::RepoError;

pub struct Repository {
    pool: PgPool,
}

fn scope_str(scope: MemoryScope) -> &'static str {
    match scope {
        MemoryScope::Project => "project",
        MemoryScope::WorkspaceShared => "workspace_shared",
        MemoryScope::Global => "global",
    }
}

fn parse_scope(s: &str) -> MemoryScope {
    match s {
        "workspace_shared" => MemoryScope::WorkspaceShared,
        "global" => MemoryScope::Global,
        _ => MemoryScope::Project,
    }
}

fn status_str(status: ItemStatus) -> &'static str {
    match status {
        ItemStatus::Active => "active",
        ItemStatus::Archived => "archived",
        ItemStatus::Deleted => "deleted",
    }
}

fn parse_status(s: &str) -> ItemStatus {
    match s {
        "archived" => ItemStatus::Archived,
        "deleted" => ItemStatus::Deleted,
        _ => ItemStatus::Active,
    }
}

fn format_str(format: ContentFormat) -> &'static str {
    match format {
        ContentFormat::Markdown => "markdown",
        ContentFormat::Plain => "plain",
        ContentFormat::Json => "json",
    }
}

fn parse_format(s: &str) -> ContentFormat {
    match s {
        "plain" => ContentFormat::Plain,
        "json" => ContentFormat::Json,
        _ => ContentFormat::Markdown,
    }
}

fn distance_str(distance: Distance) -> &'static str {
    match distance {
        Distance::Cosine => "cosine",
        Distance::L2 => "l2",
        Distance::Ip => "ip",
    }
}

fn parse_distance(s: &str) -> Distance {
    match s {
        "l2" => Distance::L2,
        "ip" => Distance::Ip,
        _ => Distance::Cosine,
    }
}

fn row_to_item(row: &sqlx::postgres::PgRow) -> Result<MemoryItem, RepoError> {
    let metadata_json: Json = row.try_get("metadata")?;
    Ok(MemoryItem {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        scope: parse_scope(row.try_get("scope")?),
        kind: row.try_get("kind")?,
        canonical_key: row.try_get("canonical_key")?,
        doc_class: row.try_get("doc_class")?,
        title: row.try_get("title")?,
        pinned: row.try_get("pinned")?,
        status: parse_status(row.try_get("status")?),
        tags: row.try_get::<Vec<String>, _>("tags").unwrap_or_default(),
        metadata: serde_json::from_value(metadata_json).unwrap_or_default(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_version(row: &sqlx::postgres::PgRow) -> Result<MemoryVersion, RepoError> {
    Ok(MemoryVersion {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        item_id: row.try_get("item_id")?,
        commit_id: row.try_get("commit_id")?,
        version_num: row.try_get("version_num")?,
        content_format: parse_format(row.try_get("content_format")?),
        content_text: row.try_get("content_text")?,
        content_json: row.try_get("content_json")?,
        checksum: row.try_get("checksum")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_profile(row: &sqlx::postgres::PgRow) -> Result<EmbeddingProfile, RepoError> {
    Ok(EmbeddingProfile {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        name: row.try_get("name")?,
        provider: row.try_get("provider")?,
        model: row.try_get("model")?,
        dims: row.try_get("dims")?,
        distance: parse_distance(row.try_get("distance")?),
        is_active: row.try_get("is_active")?,
        provider_config: row.try_get("provider_config")?,
    })
}

fn row_to_chunk(row: &sqlx::postgres::PgRow) -> Result<MemoryChunk, RepoError> {
    Ok(MemoryChunk {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        version_id: row.try_get("version_id")?,
        chunk_index: row.try_get("chunk_index")?,
        chunk_text: row.try_get("chunk_text")?,
        heading_path: row.try_get::<Vec<String>, _>("heading_path").unwrap_or_default(),
        section_anchor: row.try_get("section_anchor")?,
        start_char: row.try_get("start_char")?,
        end_char: row.try_get("end_char")?,
    })
}

impl Repository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, RepoError> {
        Ok(self.pool.begin().await?)
    }

    pub async fn get_or_create_workspace(&self, name: &str) -> Result<Workspace, RepoError> {
        let row = sqlx::query(
            r#"
            INSERT INTO workspaces (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(Workspace {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
        })
    }

    pub async fn upsert_project(
        &self,
        workspace_id: Uuid,
        project_key: &str,
        display_name: &str,
        repo_url: Option<&str>,
    ) -> Result<Project, RepoError> {
        let row = sqlx::query(
            r#"
            INSERT INTO projects (workspace_id, project_key, display_name, repo_url, status)
            VALUES ($1, $2, $3, $4, 'active')
            ON CONFLICT (workspace_id, project_key)
            DO UPDATE SET display_name = EXCLUDED.display_name
            RETURNING id, workspace_id, project_key, display_name, repo_url, status
            "#,
        )
        .bind(workspace_id)
        .bind(project_key)
        .bind(display_name)
        .bind(repo_url)
        .fetch_one(&self.pool)
        .await?;

        let status: String = row.try_get("status")?;
        Ok(Project {
            id: row.try_get("id")?,
            workspace_id: row.try_get("workspace_id")?,
            project_key: row.try_get("project_key")?,
            display_name: row.try_get("display_name")?,
            repo_url: row.try_get("repo_url")?,
            status: if status == "archived" {
                ProjectStatus::Archived
            } else {
                ProjectStatus::Active
            },
        })
    }

    pub async fn get_item(&self, project_id: Uuid, item_id: Uuid) -> Result<MemoryItem, RepoError> {
        let row = sqlx::query(
            r#"
            SELECT id, project_id, scope, kind, canonical_key, doc_class, title, pinned,
                   status, tags, metadata, created_at, updated_at
            FROM memory_items WHERE project_id = $1 AND id = $2
            "#,
        )
        .bind(project_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("item {item_id}")))?;

        row_to_item(&row)
    }

    pub async fn get_item_by_canonical_key(
        &self,
        project_id: Uuid,
        canonical_key: &str,
    ) -> Result<MemoryItem, RepoError> {
        let row = sqlx::query(r#"SELECT id FROM memory_items WHERE project_id = $1 AND canonical_key = $2"#)
            .bind(project_id)
            .bind(canonical_key)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("canonical_key {canonical_key}")))?;

        let item_id: Uuid = row.try_get("id")?;
        self.get_item(project_id, item_id).await
    }

    pub async fn latest_version(&self, item_id: Uuid) -> Result<MemoryVersion, RepoError> {
        let row = sqlx::query(
            r#"
            SELECT id, project_id, item_id, commit_id, version_num, content_format,
                   content_text, content_json, checksum, created_at
            FROM memory_versions WHERE item_id = $1 ORDER BY version_num DESC LIMIT 1
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("no versions for item {item_id}")))?;

        row_to_version(&row)
    }

    pub async fn history(&self, item_id: Uuid) -> Result<Vec<MemoryVersion>, RepoError> {
        let rows = sqlx::query(
            r#"
            SELECT id, project_id, item_id, commit_id, version_num, content_format,
                   content_text, content_json, checksum, created_at
            FROM memory_versions WHERE item_id = $1 ORDER BY version_num ASC
            "#,
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_version).collect()
    }

    pub async fn get_version(&self, version_id: Uuid) -> Result<MemoryVersion, RepoError> {
        let row = sqlx::query(
            r#"
            SELECT id, project_id, item_id, commit_id, version_num, content_format,
                   content_text, content_json, checksum, created_at
            FROM memory_versions WHERE id = $1
            "#,
        )
        .bind(version_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("version {version_id}")))?;

        row_to_version(&row)
    }

    pub async fn active_embedding_profile(
        &self,
        project_id: Uuid,
    ) -> Result<Option<EmbeddingProfile>, RepoError> {
        let row = sqlx::query(
            r#"
            SELECT id, project_id, name, provider, model, dims, distance, is_active, provider_config
            FROM embedding_profiles WHERE project_id = $1 AND is_active = true
            "#,
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_profile).transpose()
    }

    pub async fn get_embedding_profile(&self, profile_id: Uuid) -> Result<EmbeddingProfile, RepoError> {
        let row = sqlx::query(
            r#"
            SELECT id, project_id, name, provider, model, dims, distance, is_active, provider_config
            FROM embedding_profiles WHERE id = $1
            "#,
        )
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("embedding profile {profile_id}")))?;

        row_to_profile(&row)
    }

    pub async fn chunks_for_version(&self, version_id: Uuid) -> Result<Vec<MemoryChunk>, RepoError> {
        let rows = sqlx::query(
            r#"
            SELECT id, project_id, version_id, chunk_index, chunk_text, heading_path,
                   section_anchor, start_char, end_char
            FROM memory_chunks WHERE version_id = $1 ORDER BY chunk_index ASC
            "#,
        )
        .bind(version_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_chunk).collect()
    }

    pub async fn insert_link(
        &self,
        project_id: Uuid,
        from_item_id: Uuid,
        to_item_id: Uuid,
        relation: &str,
        weight: f32,
        metadata: Json,
    ) -> Result<MemoryLink, RepoError> {
        let row = sqlx::query(
            r#"
            INSERT INTO memory_links (project_id, from_item_id, to_item_id, relation, weight, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, project_id, from_item_id, to_item_id, relation, weight, metadata, created_at
            "#,
        )
        .bind(project_id)
        .bind(from_item_id)
        .bind(to_item_id)
        .bind(relation)
        .bind(weight)
        .bind(&metadata)
        .fetch_one(&self.pool)
        .await?;

        let metadata_json: Json = row.try_get("metadata")?;
        Ok(MemoryLink {
            id: row.try_get("id")?,
            project_id: row.try_get("project_id")?,
            from_item_id: row.try_get("from_item_id")?,
            to_item_id: row.try_get("to_item_id")?,
            relation: row.try_get("relation")?,
            weight: row.try_get("weight")?,
            metadata: serde_json::from_value(metadata_json).unwrap_or_default(),
            created_at: row.try_get("created_at")?,
        })
    }

    pub async fn archive_item(&self, project_id: Uuid, item_id: Uuid) -> Result<(), RepoError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"UPDATE memory_items SET status = 'archived', updated_at = $3
               WHERE project_id = $1 AND id = $2"#,
        )
        .bind(project_id)
        .bind(item_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound(format!("item {item_id}")));
        }
        Ok(())
    }

    pub async fn set_pinned(&self, project_id: Uuid, item_id: Uuid, pinned: bool) -> Result<(), RepoError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"UPDATE memory_items SET pinned = $3, updated_at = $4
               WHERE project_id = $1 AND id = $2"#,
        )
        .bind(project_id)
        .bind(item_id)
        .bind(pinned)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound(format!("item {item_id}")));
        }
        Ok(())
    }

    pub async fn get_commit_by_idempotency_key(
        &self,
        project_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<Commit>, RepoError> {
        let row = sqlx::query(
            r#"
            SELECT id, project_id, session_id, idempotency_key, author, summary
            FROM commits WHERE project_id = $1 AND idempotency_key = $2
            "#,
        )
        .bind(project_id)
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(Commit {
                id: row.try_get("id")?,
                project_id: row.try_get("project_id")?,
                session_id: row.try_get("session_id")?,
                idempotency_key: row.try_get("idempotency_key")?,
                author: row.try_get("author")?,
                summary: row.try_get("summary")?,
            })
        })
        .transpose()
    }

    pub fn distance_label(distance: Distance) -> &'static str {
        distance_str(distance)
    }

    pub fn scope_label(scope: MemoryScope) -> &'static str {
        scope_str(scope)
    }

    pub fn status_label(status: ItemStatus) -> &'static str {
        status_str(status)
    }

    pub fn format_label(format: ContentFormat) -> &'static str {
        format_str(format)
    }
}
