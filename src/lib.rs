//! gatehouse - Permission-gated access to pluggable data backends
//!
//! Resources expose named accesses guarded by ordered permission rules.
//! Backends perform them inside sessions, and transactions group sessions
//! across backends. The job queue backend defers every write until commit.

pub mod access;
pub mod backend;
pub mod config;
pub mod error;
pub mod journal;
pub mod permission;
pub mod queue;
pub mod resource;
pub mod session;

pub use access::{AccessDescriptor, AccessKind, AccessRecord, CrudAccess, Hook, PermissionRules};
pub use backend::{Backend, BackendAccessRecord, HandlerTable};
pub use config::QueueConfig;
pub use error::{Error, Result};
pub use journal::{JournalBackend, JournalEntry, JournalSession};
pub use permission::{has_permission, Action, Permission, Principal};
pub use queue::{
    CommitReport, CreateJob, InMemoryQueue, JobDescriptor, JobQueueBackend, JobRef, JobSession,
    JobStatus, QueueClient,
};
pub use resource::Resource;
pub use session::{Session, Transaction};
