//! # Deferred Job Session
//!
//! Buffers job creates and deletes locally and replays them against the
//! queue service on commit.
//!
//! ## Buffer
//! Intents are grouped per job id. Within one job they replay in the order
//! they were recorded; across jobs no ordering is promised.
//!
//! ## Partial failure
//! Each job commits independently. A job whose replay fails keeps its
//! unapplied intents buffered while the other jobs go through, so a caller
//! can drop the failing job with `remove_operations` and commit again.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use tracing::{debug, info, warn};

use super::client::{EnqueueRequest, QueueClient};
use super::job::{timestamp_ms, CreateJob, JobDescriptor, JobId, JobStatus};
use crate::config::QueueConfig;
use crate::error::{Error, Result};
use crate::session::Session;

/// A buffered request against the queue
#[derive(Debug, Clone, PartialEq)]
pub enum JobIntent {
    /// Enqueue with the buffered parameters
    Add(CreateJob),
    /// Request an abort
    Delete,
}

/// Per-job outcome of a commit
#[derive(Debug, Default, PartialEq)]
pub struct CommitReport {
    /// Jobs whose intents were all applied
    pub applied: Vec<JobId>,
    /// Jobs that stopped at a failing intent
    pub failed: Vec<(JobId, Error)>,
}

impl CommitReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// First failure, if any
    pub fn into_result(self) -> Result<()> {
        match self.failed.into_iter().next() {
            Some((_, error)) => Err(error),
            None => Ok(()),
        }
    }
}

/// Session over the external job queue
pub struct JobSession {
    client: Arc<dyn QueueClient>,
    config: QueueConfig,
    operations: Vec<(JobId, Vec<JobIntent>)>,
    /// Position of each job in `operations`
    index: HashMap<JobId, usize>,
}

impl JobSession {
    pub fn new(client: Arc<dyn QueueClient>, config: QueueConfig) -> Self {
        Self {
            client,
            config,
            operations: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Buffer a create and return its promise descriptor
    ///
    /// A fresh job id is assigned when `create` carries none.
    pub fn add(&mut self, mut create: CreateJob) -> JobDescriptor {
        let job_id = create.ensure_job_id();
        let descriptor = JobDescriptor::promise(create.function.as_str(), job_id.as_str());
        debug!(job_id = %job_id, function = %create.function, "buffering job create");
        self.intents_mut(&job_id).push(JobIntent::Add(create));
        descriptor
    }

    /// Buffer an abort request
    ///
    /// Existence is not checked here.
    pub fn delete(&mut self, job_id: &str) {
        debug!(job_id, "buffering job delete");
        self.intents_mut(job_id).push(JobIntent::Delete);
    }

    /// Current view of a job, merging buffered intents with the live queue
    ///
    /// A buffered create answers with a promise. Otherwise the queue decides
    /// and `None` means it knows nothing about the job.
    pub async fn query(&self, job_id: &str, queue_name: Option<&str>) -> Result<Option<JobDescriptor>> {
        if let Some(JobIntent::Add(create)) = self.intents(job_id).last() {
            return Ok(Some(JobDescriptor::promise(create.function.as_str(), job_id)));
        }

        let queue_name = queue_name.unwrap_or(&self.config.default_queue_name);
        let status = self.status(job_id, queue_name).await?;

        if let Some(result) = self.client.job_result(job_id).await? {
            return Ok(Some(JobDescriptor::from_result(job_id, status, result)));
        }
        match self.client.job_definition(job_id).await? {
            Some(mut definition) => {
                definition.score = self.client.zscore(queue_name, job_id).await?;
                Ok(Some(JobDescriptor::from_definition(job_id, status, definition)))
            }
            None => Ok(None),
        }
    }

    /// Live status of a job as the queue sees it
    pub async fn status(&self, job_id: &str, queue_name: &str) -> Result<JobStatus> {
        if self.client.exists(&self.config.result_key(job_id)).await? {
            return Ok(JobStatus::Complete);
        }
        if self.client.exists(&self.config.in_progress_key(job_id)).await? {
            return Ok(JobStatus::InProgress);
        }
        let status = match self.client.zscore(queue_name, job_id).await? {
            None => JobStatus::NotFound,
            Some(score) if score > timestamp_ms() => JobStatus::Deferred,
            Some(_) => JobStatus::Queued,
        };
        Ok(status)
    }

    /// Replay every buffered intent, isolating failures per job
    pub async fn commit_each(&mut self) -> CommitReport {
        let mut report = CommitReport::default();

        for position in 0..self.operations.len() {
            let (job_id, intents) = &self.operations[position];
            let mut applied = 0;
            let mut failure = None;

            for intent in intents {
                match self.apply(job_id, intent).await {
                    Ok(()) => applied += 1,
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }

            let (job_id, intents) = &mut self.operations[position];
            intents.drain(..applied);
            match failure {
                None => report.applied.push(job_id.clone()),
                Some(error) => {
                    warn!(job_id = %job_id, error = %error, "job commit failed");
                    report.failed.push((job_id.clone(), error));
                }
            }
        }

        // Fully applied jobs are left with an empty buffer
        self.operations.retain(|(_, intents)| !intents.is_empty());
        self.reindex();
        report
    }

    /// Drop every buffered intent for a job, returning them
    pub fn remove_operations(&mut self, job_id: &str) -> Vec<JobIntent> {
        match self.index.remove(job_id) {
            Some(position) => {
                let (_, intents) = self.operations.remove(position);
                self.reindex();
                intents
            }
            None => Vec::new(),
        }
    }

    /// Buffered intents for a job in recorded order
    pub fn intents(&self, job_id: &str) -> &[JobIntent] {
        self.index
            .get(job_id)
            .map(|&position| self.operations[position].1.as_slice())
            .unwrap_or(&[])
    }

    /// Job ids with buffered intents
    pub fn pending_jobs(&self) -> impl Iterator<Item = &str> {
        self.operations.iter().map(|(id, _)| id.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn intents_mut(&mut self, job_id: &str) -> &mut Vec<JobIntent> {
        let position = match self.index.get(job_id) {
            Some(&position) => position,
            None => {
                let position = self.operations.len();
                self.operations.push((job_id.to_string(), Vec::new()));
                self.index.insert(job_id.to_string(), position);
                position
            }
        };
        &mut self.operations[position].1
    }

    fn reindex(&mut self) {
        self.index = self
            .operations
            .iter()
            .enumerate()
            .map(|(position, (job_id, _))| (job_id.clone(), position))
            .collect();
    }

    async fn apply(&self, job_id: &str, intent: &JobIntent) -> Result<()> {
        match intent {
            JobIntent::Add(create) => {
                let request = EnqueueRequest::from_create(
                    create.clone(),
                    job_id.to_string(),
                    &self.config.default_queue_name,
                )?;
                match self.client.enqueue(request).await? {
                    Some(_) => {
                        info!(job_id, function = %create.function, "job enqueued");
                        Ok(())
                    }
                    None => Err(Error::AlreadyExists(job_id.to_string())),
                }
            }
            JobIntent::Delete => self.abort(job_id).await,
        }
    }

    /// Request an abort, then confirm it took effect
    async fn abort(&self, job_id: &str) -> Result<()> {
        self.client
            .zadd(&self.config.abort_set, timestamp_ms(), job_id)
            .await?;

        let status = self.status(job_id, &self.config.default_queue_name).await?;
        if status.has_started() {
            return Err(Error::AbortFailure(job_id.to_string()));
        }
        info!(job_id, "job aborted");
        Ok(())
    }

    fn discard(&mut self, reason: &'static str) {
        if !self.operations.is_empty() {
            debug!(jobs = self.operations.len(), reason, "discarding buffered job intents");
        }
        self.operations.clear();
        self.index.clear();
    }
}

impl Session for JobSession {
    fn commit(&mut self) -> BoxFuture<'_, Result<()>> {
        async move { self.commit_each().await.into_result() }.boxed()
    }

    fn rollback(&mut self) -> BoxFuture<'_, Result<()>> {
        self.discard("rollback");
        future::ready(Ok(())).boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        self.discard("close");
        future::ready(Ok(())).boxed()
    }
}

impl std::fmt::Debug for JobSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSession")
            .field("queue", &self.config.default_queue_name)
            .field("pending_jobs", &self.pending_jobs().collect::<Vec<_>>())
            .finish()
    }
}
