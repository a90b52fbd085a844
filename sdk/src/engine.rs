use memento_commit::{CommitCoordinator, CommitRequest, CommitResult, ItemRef};
use memento_core::config::AppConfig;
use memento_core::metrics::MetricsCollector;
use memento_core::model::{EmbeddingProfile, MemoryItem, MemoryVersion, OutboxEventType};
use memento_jobs::{run_ingest_job, run_reindex_job, IngestPayload, ReindexPayload};
use memento_search::{HybridItemResult, HybridSearch, LexicalEngine, SearchFilters, SemanticEngine};
use memento_storage::{HnswParams, OutboxStore, Repository, VectorIndexManager};
use serde_json::Value as Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::diff::{diff_versions, DiffResult};
use crate::error::SdkError;
use crate::health::{self, HealthReport};

/// A section of an item's latest version, by its anchor in heading order.
#[derive(Debug, Clone)]
pub struct OutlineEntry {
    pub section_anchor: Option<String>,
    pub heading_path: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ContextPackEntry {
    pub item_id: Uuid,
    pub uri: String,
    pub title: String,
    pub content_text: String,
}

/// The facade: every project-scoped memory operation goes through one of these methods. It
/// owns the connection pool and wires the repository, outbox, vector index manager, commit
/// coordinator and search engines built by the other crates in this workspace.
pub struct MementoEngine {
    pool: PgPool,
    repo: Repository,
    outbox: OutboxStore,
    vector_index: VectorIndexManager,
    commit: CommitCoordinator,
    hybrid: HybridSearch,
    config: AppConfig,
    metrics: MetricsCollector,
}

impl MementoEngine {
    pub async fn connect(config: AppConfig) -> Result<Self, SdkError> {
        let pool = memento_storage::connect(&config.database).await?;
        memento_storage::run_migrations(&pool).await?;
        Ok(Self::from_pool(pool, config))
    }

    fn from_pool(pool: PgPool, config: AppConfig) -> Self {
        let repo = Repository::new(pool.clone());
        let outbox = OutboxStore::new(pool.clone());
        let vector_index = VectorIndexManager::new(pool.clone());
        let commit = CommitCoordinator::new(pool.clone());

        let lexical = LexicalEngine::new(pool.clone(), config.search.bm25_caps_ttl_seconds);
        let semantic = SemanticEngine::new(Repository::new(pool.clone()), config.embed.clone());
        let hybrid = HybridSearch::new(lexical, semantic, Repository::new(pool.clone()));

        Self {
            pool,
            repo,
            outbox,
            vector_index,
            commit,
            hybrid,
            config,
            metrics: MetricsCollector::new(500),
        }
    }

    pub fn metrics(&self) -> memento_core::metrics::MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn commit(&self, request: CommitRequest) -> Result<CommitResult, SdkError> {
        let result = self.commit.commit(request).await?;
        self.metrics.record_commit();
        Ok(result)
    }

    pub async fn canonical_upsert(&self, request: CommitRequest) -> Result<CommitResult, SdkError> {
        let result = self.commit.canonical_upsert(request).await?;
        self.metrics.record_commit();
        Ok(result)
    }

    pub async fn get_item(&self, project_id: Uuid, item_id: Uuid) -> Result<MemoryItem, SdkError> {
        Ok(self.repo.get_item(project_id, item_id).await?)
    }

    pub async fn get_by_canonical_key(
        &self,
        project_id: Uuid,
        canonical_key: &str,
    ) -> Result<MemoryItem, SdkError> {
        Ok(self.repo.get_item_by_canonical_key(project_id, canonical_key).await?)
    }

    pub async fn history(&self, item_id: Uuid) -> Result<Vec<MemoryVersion>, SdkError> {
        Ok(self.repo.history(item_id).await?)
    }

    pub async fn diff(
        &self,
        item_id: Uuid,
        from_version_num: i32,
        to_version_num: i32,
    ) -> Result<DiffResult, SdkError> {
        let versions = self.repo.history(item_id).await?;
        let from = versions
            .iter()
            .find(|v| v.version_num == from_version_num)
            .ok_or_else(|| SdkError::Validation(format!("no version {from_version_num} for item {item_id}")))?;
        let to = versions
            .iter()
            .find(|v| v.version_num == to_version_num)
            .ok_or_else(|| SdkError::Validation(format!("no version {to_version_num} for item {item_id}")))?;
        Ok(diff_versions(from, to))
    }

    pub async fn pin(&self, project_id: Uuid, item_id: Uuid) -> Result<(), SdkError> {
        Ok(self.repo.set_pinned(project_id, item_id, true).await?)
    }

    pub async fn unpin(&self, project_id: Uuid, item_id: Uuid) -> Result<(), SdkError> {
        Ok(self.repo.set_pinned(project_id, item_id, false).await?)
    }

    pub async fn archive(&self, project_id: Uuid, item_id: Uuid) -> Result<(), SdkError> {
        Ok(self.repo.archive_item(project_id, item_id).await?)
    }

    pub async fn link(
        &self,
        project_id: Uuid,
        from: ItemRef,
        to: ItemRef,
        relation: &str,
        weight: f32,
        metadata: Json,
    ) -> Result<(), SdkError> {
        let from_item_id = self.resolve_item_ref(project_id, &from).await?;
        let to_item_id = self.resolve_item_ref(project_id, &to).await?;
        self.repo
            .insert_link(project_id, from_item_id, to_item_id, relation, weight, metadata)
            .await?;
        Ok(())
    }

    async fn resolve_item_ref(&self, project_id: Uuid, item_ref: &ItemRef) -> Result<Uuid, SdkError> {
        match item_ref {
            ItemRef::Id(id) => {
                self.repo.get_item(project_id, *id).await?;
                Ok(*id)
            }
            ItemRef::CanonicalKey(key) => Ok(self.repo.get_item_by_canonical_key(project_id, key).await?.id),
            ItemRef::New => Err(SdkError::Validation("link endpoint cannot be a new item".into())),
        }
    }

    pub async fn search(
        &self,
        project_id: Uuid,
        query: &str,
        filters: &SearchFilters,
        top_k: usize,
    ) -> Result<Vec<HybridItemResult>, SdkError> {
        let start = std::time::Instant::now();
        let results = self.hybrid.search(project_id, query, filters, top_k).await?;
        self.metrics.record_query(start.elapsed().as_micros() as u64, false);
        Ok(results)
    }

    pub async fn outline(&self, item_id: Uuid) -> Result<Vec<OutlineEntry>, SdkError> {
        let version = self.repo.latest_version(item_id).await?;
        let chunks = self.repo.chunks_for_version(version.id).await?;

        let mut entries: Vec<OutlineEntry> = Vec::new();
        for chunk in chunks {
            let is_new_section = entries
                .last()
                .map(|e| e.section_anchor != chunk.section_anchor)
                .unwrap_or(true);
            if is_new_section {
                entries.push(OutlineEntry {
                    section_anchor: chunk.section_anchor,
                    heading_path: chunk.heading_path,
                });
            }
        }
        Ok(entries)
    }

    pub async fn get_section(&self, item_id: Uuid, anchor: &str) -> Result<String, SdkError> {
        let version = self.repo.latest_version(item_id).await?;
        let chunks = self.repo.chunks_for_version(version.id).await?;
        let matching: Vec<String> = chunks
            .into_iter()
            .filter(|c| c.section_anchor.as_deref() == Some(anchor))
            .map(|c| c.chunk_text)
            .collect();
        if matching.is_empty() {
            return Err(SdkError::Validation(format!("no section {anchor} for item {item_id}")));
        }
        Ok(matching.join("\n\n"))
    }

    pub async fn context_pack(
        &self,
        project_id: Uuid,
        item_ids: &[Uuid],
    ) -> Result<Vec<ContextPackEntry>, SdkError> {
        let mut entries = Vec::with_capacity(item_ids.len());
        for item_id in item_ids {
            let item = self.repo.get_item(project_id, *item_id).await?;
            let version = self.repo.latest_version(*item_id).await?;
            let uri = memento_core::uri::MemoryUri::latest(project_id, *item_id)
                .with_version(version.version_num)
                .to_string();
            entries.push(ContextPackEntry {
                item_id: *item_id,
                uri,
                title: item.title,
                content_text: version.content_text,
            });
        }
        Ok(entries)
    }

    pub async fn admin_reindex(&self, project_id: Uuid, embedding_profile_id: Uuid) -> Result<(), SdkError> {
        let profile: EmbeddingProfile = self.repo.get_embedding_profile(embedding_profile_id).await?;
        if profile.project_id != project_id {
            return Err(SdkError::Validation("embedding profile does not belong to project".into()));
        }
        self.vector_index
            .ensure_index(profile.id, profile.dims, profile.distance, HnswParams::default())
            .await?;
        self.outbox
            .enqueue(
                project_id,
                OutboxEventType::ReindexProfile,
                serde_json::json!({ "embedding_profile_id": embedding_profile_id }),
            )
            .await?;
        Ok(())
    }

    pub async fn admin_reingest(&self, project_id: Uuid, item_id: Uuid) -> Result<(), SdkError> {
        let item = self.repo.get_item(project_id, item_id).await?;
        let version = self.repo.latest_version(item.id).await?;
        self.outbox
            .enqueue(
                project_id,
                OutboxEventType::IngestVersion,
                serde_json::json!({ "version_id": version.id }),
            )
            .await?;
        self.outbox
            .enqueue(
                project_id,
                OutboxEventType::EmbedVersion,
                serde_json::json!({ "version_id": version.id, "embedding_profile_id": Json::Null }),
            )
            .await?;
        Ok(())
    }

    pub async fn health(&self) -> Result<HealthReport, SdkError> {
        health::check(&self.pool).await
    }

    /// Runs an ingest job inline, bypassing the outbox. Used by tests and one-off backfills
    /// that don't want to wait on a worker poll cycle.
    pub async fn run_ingest_inline(&self, version_id: Uuid) -> Result<(), SdkError> {
        Ok(run_ingest_job(&self.repo, &IngestPayload { version_id }).await?)
    }

    /// Runs a reindex job inline, bypassing the outbox, with the given concurrency settings.
    pub async fn run_reindex_inline(&self, embedding_profile_id: Uuid) -> Result<(), SdkError> {
        Ok(run_reindex_job(&self.repo, &self.config.embed, &ReindexPayload { embedding_profile_id }).await?)
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn outbox_store(&self) -> &OutboxStore {
        &self.outbox
    }
}
