pub mod canonical;
pub mod coordinator;
pub mod error;
pub mod idempotency;

pub use coordinator::{
    CommitCoordinator, CommitEntry, CommitRequest, CommitResult, CommittedVersion, ItemRef,
    LinkRequest,
};
pub use error::CommitError;
