//! Queue Service Boundary
//!
//! The calls a job session makes against the external queue: enqueue,
//! marker lookups and sorted-set score reads and writes. Every call is a
//! suspension point.

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde_json::{Map, Value};

use super::job::{CreateJob, JobDefinition, JobId, JobResult};
use crate::error::{Error, Result};

/// Fully resolved enqueue call
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueRequest {
    pub function: String,
    pub job_id: JobId,
    pub queue_name: String,
    pub defer_until: Option<DateTime<Utc>>,
    pub defer_by_ms: Option<i64>,
    pub expires_ms: Option<i64>,
    pub job_try: Option<u32>,
    pub kwargs: Map<String, Value>,
}

impl EnqueueRequest {
    /// Translate buffered create parameters into an enqueue call
    ///
    /// Fails when `defer_by` or `expires` is not a representable,
    /// non-negative number of seconds.
    pub fn from_create(create: CreateJob, job_id: JobId, default_queue: &str) -> Result<Self> {
        let defer_by_ms = create
            .defer_by
            .map(|seconds| seconds_to_ms("defer_by", seconds))
            .transpose()?;
        let expires_ms = create
            .expires
            .map(|seconds| seconds_to_ms("expires", seconds))
            .transpose()?;

        Ok(Self {
            function: create.function,
            job_id,
            queue_name: create
                .queue_name
                .unwrap_or_else(|| default_queue.to_string()),
            defer_until: create.defer_until,
            defer_by_ms,
            expires_ms,
            job_try: create.job_try,
            kwargs: create.kwargs,
        })
    }
}

/// Longest accepted delay: 100 years
const MAX_SECONDS: f64 = 100.0 * 365.25 * 24.0 * 3600.0;

fn seconds_to_ms(field: &str, seconds: f64) -> Result<i64> {
    if !seconds.is_finite() || !(0.0..=MAX_SECONDS).contains(&seconds) {
        return Err(Error::validation(format!(
            "{} must be between 0 and {} seconds, got {}",
            field, MAX_SECONDS, seconds
        )));
    }
    Ok((seconds * 1000.0).round() as i64)
}

/// Client of the external job queue
pub trait QueueClient: Send + Sync {
    /// Enqueue a job
    ///
    /// Returns `None` when a job or result with the same id already exists.
    fn enqueue(&self, request: EnqueueRequest) -> BoxFuture<'_, Result<Option<JobDefinition>>>;

    /// Whether a key exists
    fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>>;

    /// Score of `member` in the sorted set `set`
    fn zscore<'a>(&'a self, set: &'a str, member: &'a str) -> BoxFuture<'a, Result<Option<i64>>>;

    /// Add `member` to the sorted set `set` with `score`
    fn zadd<'a>(&'a self, set: &'a str, score: i64, member: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Stored definition of a job
    fn job_definition<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<Option<JobDefinition>>>;

    /// Stored result of a finished job
    fn job_result<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<Option<JobResult>>>;
}
