pub mod embed;
pub mod error;
pub mod ingest;
pub mod reindex;
pub mod worker;

pub use embed::{run_embed_job, EmbedPayload};
pub use error::JobError;
pub use ingest::{run_ingest_job, IngestPayload};
pub use reindex::{run_reindex_job, ReindexPayload};
pub use worker::WorkerRuntime;
