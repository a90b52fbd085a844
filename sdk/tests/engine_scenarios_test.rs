use memento_commit::{CommitEntry, CommitRequest, ItemRef};
use memento_core::config::{AppConfig, DatabaseConfig, EmbedConfig, OutboxConfig, SearchConfig};
use memento_core::model::{ContentFormat, MemoryScope, OutboxEventType};
use memento_sdk::MementoEngine;
use memento_search::SearchFilters;
use memento_storage::OutboxStore;
use uuid::Uuid;

/// These scenarios need a live Postgres with migrations applied (`DATABASE_URL`); they're
/// skipped rather than failing when that isn't available, same as the rest of this workspace's
/// database-backed integration tests.
async fn test_engine() -> Option<MementoEngine> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let config = AppConfig {
        database: DatabaseConfig {
            url,
            pool_max: 5,
            idle_timeout_ms: 30_000,
            connect_timeout_ms: 5_000,
        },
        outbox: OutboxConfig::default(),
        embed: EmbedConfig {
            use_fake: true,
            ..EmbedConfig::default()
        },
        search: SearchConfig::default(),
    };
    MementoEngine::connect(config).await.ok()
}

fn note_entry(title: &str, content: &str) -> CommitEntry {
    CommitEntry {
        item_ref: ItemRef::New,
        scope: MemoryScope::Project,
        kind: Some("note".into()),
        doc_class: None,
        title: title.into(),
        pinned: None,
        tags: vec![],
        metadata: serde_json::json!({}),
        content_format: ContentFormat::Markdown,
        content_text: content.into(),
        content_json: None,
    }
}

#[tokio::test]
async fn commit_ingest_and_get_section_round_trip() {
    let Some(engine) = test_engine().await else { return };
    let project_id = Uuid::new_v4();

    let request = CommitRequest {
        project_id,
        idempotency_key: "scenario-1".into(),
        session_id: None,
        author: None,
        summary: None,
        entries: vec![note_entry(
            "Install Guide",
            "# Install Guide\n\n## Install Steps\n\nRun `cargo build` then `cargo test`.\n",
        )],
        links: vec![],
    };

    let result = engine.commit(request).await.expect("commit");
    let version_id = result.versions[0].version_id;
    let item_id = result.versions[0].item_id;

    engine.run_ingest_inline(version_id).await.expect("ingest");

    let outline = engine.outline(item_id).await.expect("outline");
    assert!(!outline.is_empty());

    let anchor = outline
        .iter()
        .find_map(|e| e.section_anchor.clone())
        .expect("at least one anchored section");
    let section = engine.get_section(item_id, &anchor).await.expect("get_section");
    assert!(section.contains("cargo build"));
}

#[tokio::test]
async fn lexical_search_finds_committed_content() {
    let Some(engine) = test_engine().await else { return };
    let project_id = Uuid::new_v4();

    let request = CommitRequest {
        project_id,
        idempotency_key: "scenario-2".into(),
        session_id: None,
        author: None,
        summary: None,
        entries: vec![note_entry(
            "Battery Policy",
            "# Battery Policy\n\nThis document covers electric vehicle battery regulations.\n",
        )],
        links: vec![],
    };
    let result = engine.commit(request).await.expect("commit");
    let version_id = result.versions[0].version_id;
    engine.run_ingest_inline(version_id).await.expect("ingest");

    let hits = engine
        .search(project_id, "electric vehicle battery", &SearchFilters::default(), 10)
        .await
        .expect("search");
    assert!(hits.iter().any(|r| r.item_id == result.versions[0].item_id));
}

#[tokio::test]
async fn outbox_dead_letters_after_max_attempts() {
    let Some(engine) = test_engine().await else { return };
    let project_id = Uuid::new_v4();
    let outbox = OutboxStore::new(engine.repository().pool().clone());

    let event_id = outbox
        .enqueue(project_id, OutboxEventType::IngestVersion, serde_json::json!({ "version_id": Uuid::new_v4() }))
        .await
        .expect("enqueue");

    for attempt in 0..5 {
        let claimed = outbox
            .claim_batch("dead-letter-test-worker", 10, 1, Some(project_id))
            .await
            .expect("claim");
        assert!(claimed.iter().any(|e| e.id == event_id), "event should be claimable on attempt {attempt}");
        outbox
            .finalize_failure(event_id, "dead-letter-test-worker", "synthetic failure", attempt, 5, 1, 60)
            .await
            .expect("finalize_failure");
    }

    let claimed_after = outbox
        .claim_batch("dead-letter-test-worker", 10, 1, Some(project_id))
        .await
        .expect("claim");
    assert!(
        !claimed_after.iter().any(|e| e.id == event_id),
        "dead-lettered event must not be claimable again"
    );
}

#[tokio::test]
async fn claimed_event_is_excluded_until_lease_expires() {
    let Some(engine) = test_engine().await else { return };
    let project_id = Uuid::new_v4();
    let outbox = OutboxStore::new(engine.repository().pool().clone());

    outbox
        .enqueue(project_id, OutboxEventType::IngestVersion, serde_json::json!({ "version_id": Uuid::new_v4() }))
        .await
        .expect("enqueue");

    let first_claim = outbox
        .claim_batch("worker-a", 10, 120, Some(project_id))
        .await
        .expect("claim a");
    assert_eq!(first_claim.len(), 1);

    let second_claim = outbox
        .claim_batch("worker-b", 10, 120, Some(project_id))
        .await
        .expect("claim b");
    assert!(second_claim.is_empty(), "a leased event must not be claimable by another worker");
}
