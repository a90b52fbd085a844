pub mod error;
pub mod outbox;
pub mod pool;
pub mod repository;
pub mod vector_index;

pub use error::RepoError;
pub use outbox::OutboxStore;
pub use pool::{connect, run_migrations};
pub use repository::Repository;
pub use vector_index::{HnswParams, VectorIndexManager};
