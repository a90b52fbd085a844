use std::sync::Arc;
use std::time::{Duration, Instant};

use memento_core::config::{EmbedConfig, OutboxConfig};
use memento_core::metrics::MetricsCollector;
use memento_core::model::{OutboxEvent, OutboxEventType};
use memento_storage::{OutboxStore, Repository};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use crate::embed::{run_embed_job, EmbedPayload};
use crate::error::JobError;
use crate::ingest::{run_ingest_job, IngestPayload};
use crate::reindex::{run_reindex_job, ReindexPayload};

pub struct WorkerRuntime {
    worker_id: String,
    repo: Repository,
    outbox: OutboxStore,
    outbox_config: OutboxConfig,
    embed_config: EmbedConfig,
    metrics: Arc<MetricsCollector>,
    processed: u64,
    errored: u64,
    started_at: Instant,
    last_metrics_emit: Instant,
    metrics_interval: Duration,
}

impl WorkerRuntime {
    pub fn new(
        worker_id: impl Into<String>,
        repo: Repository,
        outbox: OutboxStore,
        outbox_config: OutboxConfig,
        embed_config: EmbedConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let now = Instant::now();
        Self {
            worker_id: worker_id.into(),
            repo,
            outbox,
            outbox_config,
            embed_config,
            metrics,
            processed: 0,
            errored: 0,
            started_at: now,
            last_metrics_emit: now,
            metrics_interval: Duration::from_secs(30),
        }
    }

    /// Cooperative poll loop: claims a batch, dispatches each event, finalizes, then sleeps
    /// on an empty batch. Shutdown on SIGINT/SIGTERM finishes the in-flight batch first.
    pub async fn run(&mut self) {
        info!(worker_id = %self.worker_id, "worker started");
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!(worker_id = %self.worker_id, "received SIGINT, draining current batch");
                    break;
                }
                _ = sigterm.recv() => {
                    info!(worker_id = %self.worker_id, "received SIGTERM, draining current batch");
                    break;
                }
                result = self.poll_once() => {
                    if let Err(err) = result {
                        error!(worker_id = %self.worker_id, error = %err, "poll iteration failed");
                    }
                }
            }
        }
        info!(worker_id = %self.worker_id, processed = self.processed, errored = self.errored, "worker stopped");
    }

    async fn poll_once(&mut self) -> Result<(), JobError> {
        let batch = self
            .outbox
            .claim_batch(
                &self.worker_id,
                self.outbox_config.batch_size as i64,
                self.outbox_config.lease_seconds as i64,
                None,
            )
            .await?;

        if batch.is_empty() {
            self.maybe_emit_metrics();
            tokio::time::sleep(Duration::from_millis(self.outbox_config.poll_interval_ms)).await;
            return Ok(());
        }

        for _ in 0..batch.len() {
            self.metrics.record_outbox_claim();
        }

        for event in batch {
            self.dispatch(event).await;
        }

        self.maybe_emit_metrics();
        Ok(())
    }

    async fn dispatch(&mut self, event: OutboxEvent) {
        let result = self.run_handler(&event).await;
        match result {
            Ok(()) => {
                self.processed += 1;
                match self.outbox.finalize_success(event.id, &self.worker_id).await {
                    Ok(true) => self.metrics.record_outbox_finalize(false),
                    Ok(false) => warn!(event_id = %event.id, "finalize_success found lease already stolen"),
                    Err(err) => error!(event_id = %event.id, error = %err, "finalize_success failed"),
                }
            }
            Err(err) => {
                self.errored += 1;
                error!(event_id = %event.id, event_type = ?event.event_type, attempt = event.retry_count, error = %err, "job handler failed");
                let dead_lettered = event.retry_count + 1 >= self.outbox_config.max_attempts as i32;
                let finalize = self
                    .outbox
                    .finalize_failure(
                        event.id,
                        &self.worker_id,
                        &err.to_string(),
                        event.retry_count,
                        self.outbox_config.max_attempts as i32,
                        self.outbox_config.retry_delay_seconds as i64,
                        self.outbox_config.retry_max_delay_seconds as i64,
                    )
                    .await;
                match finalize {
                    Ok(true) => self.metrics.record_outbox_finalize(dead_lettered),
                    Ok(false) => {}
                    Err(finalize_err) => error!(event_id = %event.id, error = %finalize_err, "finalize_failure failed"),
                }
            }
        }
    }

    async fn run_handler(&self, event: &OutboxEvent) -> Result<(), JobError> {
        match event.event_type {
            OutboxEventType::IngestVersion => {
                let payload: IngestPayload = serde_json::from_value(event.payload.clone())
                    .map_err(|e| JobError::Validation(e.to_string()))?;
                run_ingest_job(&self.repo, &payload).await
            }
            OutboxEventType::EmbedVersion => {
                let payload: EmbedPayload = serde_json::from_value(event.payload.clone())
                    .map_err(|e| JobError::Validation(e.to_string()))?;
                run_embed_job(&self.repo, &self.embed_config, &payload).await
            }
            OutboxEventType::ReindexProfile => {
                let payload: ReindexPayload = serde_json::from_value(event.payload.clone())
                    .map_err(|e| JobError::Validation(e.to_string()))?;
                run_reindex_job(&self.repo, &self.embed_config, &payload).await
            }
        }
    }

    fn maybe_emit_metrics(&mut self) {
        if self.last_metrics_emit.elapsed() >= self.metrics_interval {
            info!(
                worker_id = %self.worker_id,
                processed = self.processed,
                errored = self.errored,
                uptime_seconds = self.started_at.elapsed().as_secs(),
                "worker metrics"
            );
            self.last_metrics_emit = Instant::now();
        }
    }
}
