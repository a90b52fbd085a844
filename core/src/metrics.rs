use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct SearchMetrics {
    pub total_queries: u64,
    pub cache_hits: u64,
    pub latencies_us: VecDeque<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct IngestMetrics {
    pub commits: u64,
    pub outbox_claimed: u64,
    pub outbox_finalized: u64,
    pub outbox_dead_lettered: u64,
    pub embed_batch_latencies_us: VecDeque<u64>,
}

pub struct MetricsCollector {
    state: Arc<Mutex<MetricsState>>,
}

struct MetricsState {
    search: SearchMetrics,
    ingest: IngestMetrics,
    max_history: usize,
}

impl MetricsCollector {
    pub fn new(max_history: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MetricsState {
                search: SearchMetrics::default(),
                ingest: IngestMetrics::default(),
                max_history,
            })),
        }
    }

    pub fn record_query(&self, latency_us: u64, is_cache_hit: bool) {
        let mut state = self.state.lock().unwrap();
        state.search.total_queries += 1;
        if is_cache_hit {
            state.search.cache_hits += 1;
        }
        let max_history = state.max_history;
        push_bounded(&mut state.search.latencies_us, latency_us, max_history);
    }

    pub fn record_commit(&self) {
        self.state.lock().unwrap().ingest.commits += 1;
    }

    pub fn record_outbox_claim(&self) {
        self.state.lock().unwrap().ingest.outbox_claimed += 1;
    }

    pub fn record_outbox_finalize(&self, dead_lettered: bool) {
        let mut state = self.state.lock().unwrap();
        state.ingest.outbox_finalized += 1;
        if dead_lettered {
            state.ingest.outbox_dead_lettered += 1;
        }
    }

    pub fn record_embed_batch(&self, latency_us: u64) {
        let mut state = self.state.lock().unwrap();
        let max_history = state.max_history;
        push_bounded(&mut state.ingest.embed_batch_latencies_us, latency_us, max_history);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.state.lock().unwrap();
        let q = &state.search;
        let ig = &state.ingest;

        let mut sorted_query: Vec<u64> = q.latencies_us.iter().copied().collect();
        sorted_query.sort_unstable();
        let mut sorted_embed: Vec<u64> = ig.embed_batch_latencies_us.iter().copied().collect();
        sorted_embed.sort_unstable();

        let hit_rate = if q.total_queries > 0 {
            q.cache_hits as f32 / q.total_queries as f32
        } else {
            0.0
        };

        MetricsSnapshot {
            total_queries: q.total_queries,
            cache_hit_rate: hit_rate,
            query_p50_us: percentile(&sorted_query, 50.0),
            query_p95_us: percentile(&sorted_query, 95.0),
            query_p99_us: percentile(&sorted_query, 99.0),
            commits: ig.commits,
            outbox_claimed: ig.outbox_claimed,
            outbox_finalized: ig.outbox_finalized,
            outbox_dead_lettered: ig.outbox_dead_lettered,
            embed_batch_p50_us: percentile(&sorted_embed, 50.0),
            embed_batch_p95_us: percentile(&sorted_embed, 95.0),
            embed_batch_p99_us: percentile(&sorted_embed, 99.0),
        }
    }
}

fn push_bounded(queue: &mut VecDeque<u64>, value: u64, max_history: usize) {
    queue.push_back(value);
    if queue.len() > max_history {
        queue.pop_front();
    }
}

fn percentile(sorted: &[u64], p: f32) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((p / 100.0) * (sorted.len() as f32)).ceil() as usize;
    sorted[idx.saturating_sub(1).min(sorted.len() - 1)]
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    pub total_queries: u64,
    pub cache_hit_rate: f32,
    pub query_p50_us: u64,
    pub query_p95_us: u64,
    pub query_p99_us: u64,
    pub commits: u64,
    pub outbox_claimed: u64,
    pub outbox_finalized: u64,
    pub outbox_dead_lettered: u64,
    pub embed_batch_p50_us: u64,
    pub embed_batch_p95_us: u64,
    pub embed_batch_p99_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_tracks_cache_hits() {
        let collector = MetricsCollector::new(100);
        collector.record_query(10, false);
        collector.record_query(20, true);
        let snap = collector.snapshot();
        assert_eq!(snap.total_queries, 2);
        assert_eq!(snap.cache_hit_rate, 0.5);
    }

    #[test]
    fn history_is_bounded() {
        let collector = MetricsCollector::new(3);
        for i in 0..10 {
            collector.record_query(i, false);
        }
        let snap = collector.snapshot();
        assert_eq!(snap.total_queries, 10);
        assert!(snap.query_p99_us >= 7);
    }
}
