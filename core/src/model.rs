use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryScope {
    Project,
    WorkspaceShared,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Active,
    Archived,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFormat {
    Markdown,
    Plain,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Distance {
    Cosine,
    L2,
    Ip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboxEventType {
    IngestVersion,
    EmbedVersion,
    ReindexProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectStatus {
    Active,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub project_key: String,
    pub display_name: String,
    pub repo_url: Option<String>,
    pub status: ProjectStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: Uuid,
    pub project_id: Uuid,
    pub scope: MemoryScope,
    pub kind: String,
    pub canonical_key: Option<String>,
    pub doc_class: Option<String>,
    pub title: String,
    pub pinned: bool,
    pub status: ItemStatus,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MemoryItem {
    /// Only active items ever surface in search results.
    pub fn is_searchable(&self) -> bool {
        matches!(self.status, ItemStatus::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryVersion {
    pub id: Uuid,
    pub project_id: Uuid,
    pub item_id: Uuid,
    pub commit_id: Option<Uuid>,
    pub version_num: i32,
    pub content_format: ContentFormat,
    pub content_text: String,
    pub content_json: Option<serde_json::Value>,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: Uuid,
    pub project_id: Uuid,
    pub session_id: Option<String>,
    pub idempotency_key: String,
    pub author: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryChunk {
    pub id: Uuid,
    pub project_id: Uuid,
    pub version_id: Uuid,
    pub chunk_index: i32,
    pub chunk_text: String,
    pub heading_path: Vec<String>,
    pub section_anchor: Option<String>,
    pub start_char: i32,
    pub end_char: i32,
}

impl MemoryChunk {
    /// Invariant from spec: `chunk_text == version.content_text[start_char:end_char]`.
    pub fn matches_source(&self, content_text: &str) -> bool {
        content_text
            .get(self.start_char as usize..self.end_char as usize)
            .map(|slice| slice == self.chunk_text)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkEmbedding {
    pub chunk_id: Uuid,
    pub embedding_profile_id: Uuid,
    pub project_id: Uuid,
    pub embedding_vector: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingProfile {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub provider: String,
    pub model: String,
    pub dims: i32,
    pub distance: Distance,
    pub is_active: bool,
    pub provider_config: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryLink {
    pub id: Uuid,
    pub project_id: Uuid,
    pub from_item_id: Uuid,
    pub to_item_id: Uuid,
    pub relation: String,
    pub weight: f32,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub project_id: Uuid,
    pub event_type: OutboxEventType,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl OutboxEvent {
    pub fn is_pending(&self) -> bool {
        self.processed_at.is_none()
    }

    pub fn is_claimable(&self, now: DateTime<Utc>, max_attempts: i32) -> bool {
        if !self.is_pending() {
            return false;
        }
        let lease_active = self
            .lease_expires_at
            .map(|expiry| expiry > now)
            .unwrap_or(false);
        if lease_active {
            return false;
        }
        if self.retry_count >= max_attempts {
            return false;
        }
        self.next_attempt_at.map(|t| t <= now).unwrap_or(true)
    }

    /// Terminal events have `processed_at` set; dead-lettered ones additionally carry `error`.
    pub fn is_dead_lettered(&self) -> bool {
        self.processed_at.is_some() && self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(now: DateTime<Utc>) -> OutboxEvent {
        OutboxEvent {
            id: Uuid::nil(),
            project_id: Uuid::nil(),
            event_type: OutboxEventType::IngestVersion,
            payload: serde_json::json!({}),
            created_at: now,
            processed_at: None,
            retry_count: 0,
            next_attempt_at: None,
            locked_by: None,
            lease_expires_at: None,
            error: None,
        }
    }

    #[test]
    fn claimable_when_pending_and_no_lease() {
        let now = Utc::now();
        let ev = sample_event(now);
        assert!(ev.is_claimable(now, 5));
    }

    #[test]
    fn not_claimable_with_active_lease() {
        let now = Utc::now();
        let mut ev = sample_event(now);
        ev.lease_expires_at = Some(now + chrono::Duration::seconds(30));
        assert!(!ev.is_claimable(now, 5));
    }

    #[test]
    fn not_claimable_past_max_attempts() {
        let now = Utc::now();
        let mut ev = sample_event(now);
        ev.retry_count = 5;
        assert!(!ev.is_claimable(now, 5));
    }

    #[test]
    fn not_claimable_before_next_attempt() {
        let now = Utc::now();
        let mut ev = sample_event(now);
        ev.next_attempt_at = Some(now + chrono::Duration::seconds(5));
        assert!(!ev.is_claimable(now, 5));
    }

    #[test]
    fn chunk_matches_source_slices_exactly() {
        let chunk = MemoryChunk {
            id: Uuid::nil(),
            project_id: Uuid::nil(),
            version_id: Uuid::nil(),
            chunk_index: 0,
            chunk_text: "hello".into(),
            heading_path: vec![],
            section_anchor: None,
            start_char: 0,
            end_char: 5,
        };
        assert!(chunk.matches_source("hello world"));
        assert!(!chunk.matches_source("goodbye world"));
    }
}
