use std::env;
use std::sync::Arc;
use std::time::Instant;

use memento_benches::synthetic_markdown;
use memento_commit::{CommitEntry, CommitRequest, ItemRef};
use memento_core::config::{AppConfig, DatabaseConfig, EmbedConfig, OutboxConfig, SearchConfig};
use memento_core::model::{ContentFormat, MemoryScope};
use memento_search::SearchFilters;
use memento_sdk::MementoEngine;
use uuid::Uuid;

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn percentile_ns(samples: &[u128], p: f64) -> u128 {
    if samples.is_empty() {
        return 0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    let rank = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted[rank]
}

fn fmt_ns(ns: u128) -> String {
    if ns >= 1_000_000 {
        format!("{:.3} ms", ns as f64 / 1_000_000.0)
    } else if ns >= 1_000 {
        format!("{:.3} us", ns as f64 / 1_000.0)
    } else {
        format!("{ns} ns")
    }
}

async fn seed(engine: &MementoEngine, project_id: Uuid, item_count: usize) -> Vec<Uuid> {
    let mut item_ids = Vec::with_capacity(item_count);
    for i in 0..item_count {
        let content = synthetic_markdown(4, 80);
        let request = CommitRequest {
            project_id,
            idempotency_key: format!("seed-{i}"),
            session_id: None,
            author: Some("bench".into()),
            summary: None,
            entries: vec![CommitEntry {
                item_ref: ItemRef::New,
                scope: MemoryScope::Project,
                kind: Some("note".into()),
                doc_class: None,
                title: format!("Seed Item {i}"),
                pinned: None,
                tags: vec![],
                metadata: serde_json::json!({}),
                content_format: ContentFormat::Markdown,
                content_text: content,
                content_json: None,
            }],
            links: vec![],
        };
        let result = engine.commit(request).await.expect("seed commit");
        item_ids.push(result.versions[0].item_id);
    }
    item_ids
}

/// Measures commit and hybrid-search latency under concurrent load, against a real database
/// given by `DATABASE_URL`. Skipped entirely when that isn't set, since this isn't a pure-CPU
/// microbenchmark like `chunker_bench`.
#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let Ok(database_url) = env::var("DATABASE_URL") else {
        println!("DATABASE_URL not set, skipping operational_latency_bench");
        return;
    };

    let item_count = env_usize("MEMENTO_BENCH_ITEMS", 200);
    let workers = env_usize("MEMENTO_BENCH_WORKERS", 8);
    let ops_per_worker = env_usize("MEMENTO_BENCH_OPS_PER_WORKER", 60);
    let write_every = env_usize("MEMENTO_BENCH_WRITE_EVERY", 10).max(1);

    let config = AppConfig {
        database: DatabaseConfig {
            url: database_url,
            pool_max: (workers as u32 + 2).max(10),
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

    let engine = Arc::new(MementoEngine::connect(config).await.expect("connect"));
    let project_id = Uuid::new_v4();
    let item_ids = Arc::new(seed(&engine, project_id, item_count).await);

    let read_latencies = Arc::new(tokio::sync::Mutex::new(Vec::<u128>::new()));
    let write_latencies = Arc::new(tokio::sync::Mutex::new(Vec::<u128>::new()));

    let scenario_start = Instant::now();
    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let engine = engine.clone();
        let item_ids = item_ids.clone();
        let read_latencies = read_latencies.clone();
        let write_latencies = write_latencies.clone();

        let handle = tokio::spawn(async move {
            for op in 0..ops_per_worker {
                if op % write_every == 0 {
                    let request = CommitRequest {
                        project_id,
                        idempotency_key: format!("runtime-{worker_id}-{op}"),
                        session_id: None,
                        author: Some("bench".into()),
                        summary: None,
                        entries: vec![CommitEntry {
                            item_ref: ItemRef::New,
                            scope: MemoryScope::Project,
                            kind: Some("note".into()),
                            doc_class: None,
                            title: format!("Runtime Item w{worker_id} o{op}"),
                            pinned: None,
                            tags: vec![],
                            metadata: serde_json::json!({}),
                            content_format: ContentFormat::Markdown,
                            content_text: synthetic_markdown(2, 60),
                            content_json: None,
                        }],
                        links: vec![],
                    };
                    let begin = Instant::now();
                    engine.commit(request).await.expect("runtime commit");
                    write_latencies.lock().await.push(begin.elapsed().as_nanos());
                } else {
                    let _ = &item_ids;
                    let begin = Instant::now();
                    let _ = engine
                        .search(project_id, "synthetic benchmark section", &SearchFilters::default(), 20)
                        .await
                        .expect("search");
                    read_latencies.lock().await.push(begin.elapsed().as_nanos());
                }
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.unwrap();
    }

    let total_elapsed = scenario_start.elapsed();
    let read_samples = read_latencies.lock().await.clone();
    let write_samples = write_latencies.lock().await.clone();
    let total_ops = read_samples.len() + write_samples.len();
    let throughput = if total_elapsed.as_secs_f64() > 0.0 {
        total_ops as f64 / total_elapsed.as_secs_f64()
    } else {
        0.0
    };

    println!("=== Operational Latency Benchmark (Commit + Hybrid Search) ===");
    println!(
        "config: items={item_count}, workers={workers}, ops_per_worker={ops_per_worker}, write_every={write_every}"
    );
    println!(
        "workload: total_ops={total_ops}, read_ops={}, write_ops={}, elapsed={:.3}s, throughput={:.2} ops/s",
        read_samples.len(),
        write_samples.len(),
        total_elapsed.as_secs_f64(),
        throughput
    );
    println!(
        "read latency: p50={}, p95={}, p99={}",
        fmt_ns(percentile_ns(&read_samples, 0.50)),
        fmt_ns(percentile_ns(&read_samples, 0.95)),
        fmt_ns(percentile_ns(&read_samples, 0.99))
    );
    println!(
        "write latency: p50={}, p95={}, p99={}",
        fmt_ns(percentile_ns(&write_samples, 0.50)),
        fmt_ns(percentile_ns(&write_samples, 0.95)),
        fmt_ns(percentile_ns(&write_samples, 0.99))
    );
}
