use memento_chunker::{chunk_markdown, overlap_disabled_for, ChunkConfig};
use memento_storage::Repository;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::JobError;

#[derive(Debug, Deserialize)]
pub struct IngestPayload {
    pub version_id: Uuid,
}

/// Re-chunks a version and rewrites its chunk rows atomically.
pub async fn run_ingest_job(repo: &Repository, payload: &IngestPayload) -> Result<(), JobError> {
    let version = repo.get_version(payload.version_id).await?;
    let item = repo.get_item(version.project_id, version.item_id).await?;

    let content_text = normalize_to_markdown(&version);
    let overlap_disabled = overlap_disabled_for(item.doc_class.as_deref());
    let chunks = chunk_markdown(&content_text, &ChunkConfig::default(), overlap_disabled);

    let mut tx = repo.pool().begin().await?;

    sqlx::query("DELETE FROM memory_chunks WHERE version_id = $1")
        .bind(version.id)
        .execute(&mut *tx)
        .await?;

    for batch in chunks.chunks(200) {
        for chunk in batch {
            sqlx::query(
                r#"
                INSERT INTO memory_chunks
                    (project_id, version_id, chunk_index, chunk_text, heading_path,
                     section_anchor, start_char, end_char, tsv)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, to_tsvector('english', $4))
                "#,
            )
            .bind(version.project_id)
            .bind(version.id)
            .bind(chunk.chunk_index)
            .bind(&chunk.chunk_text)
            .bind(&chunk.heading_path)
            .bind(&chunk.section_anchor)
            .bind(chunk.start_char)
            .bind(chunk.end_char)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;

    info!(version_id = %version.id, chunk_count = chunks.len(), "ingested version");
    Ok(())
}

fn normalize_to_markdown(version: &memento_core::model::MemoryVersion) -> String {
    use memento_core::model::ContentFormat;

    if version.content_format == ContentFormat::Json && version.content_text.trim().is_empty() {
        if let Some(json) = &version.content_json {
            return serde_json::to_string_pretty(json).unwrap_or_default();
        }
    }
    version.content_text.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use memento_core::model::{ContentFormat, MemoryVersion};
    use serde_json::json;

    fn version(format: ContentFormat, text: &str, json_body: Option<serde_json::Value>) -> MemoryVersion {
        MemoryVersion {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            item_id: Uuid::new_v4(),
            commit_id: None,
            version_num: 1,
            content_format: format,
            content_text: text.to_string(),
            content_json: json_body,
            checksum: "checksum".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn pretty_prints_json_when_text_is_empty() {
        let v = version(ContentFormat::Json, "", Some(json!({"a": 1})));
        let out = normalize_to_markdown(&v);
        assert!(out.contains("\"a\""));
    }

    #[test]
    fn leaves_markdown_text_untouched() {
        let v = version(ContentFormat::Markdown, "# Title\n\nbody", None);
        assert_eq!(normalize_to_markdown(&v), "# Title\n\nbody");
    }

    #[test]
    fn json_format_with_nonempty_text_is_not_overridden() {
        let v = version(ContentFormat::Json, "already text", Some(json!({"a": 1})));
        assert_eq!(normalize_to_markdown(&v), "already text");
    }
}
