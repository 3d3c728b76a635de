//! # Job Queue
//!
//! Deferred access to an external arq-style job queue.
//!
//! Creates and deletes issued through a `JobSession` stay local until the
//! session commits. Reads merge the buffered intents with what the queue
//! reports, so a job created in the same session answers as a promise.

pub mod backend;
pub mod client;
pub mod job;
pub mod memory;
pub mod session;

pub use backend::JobQueueBackend;
pub use client::{EnqueueRequest, QueueClient};
pub use job::{
    CreateJob, JobDefinition, JobDescriptor, JobId, JobOutcome, JobRef, JobResult, JobStage,
    JobStatus,
};
pub use memory::InMemoryQueue;
pub use session::{CommitReport, JobIntent, JobSession};
