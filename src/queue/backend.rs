//! Job Queue Backend
//!
//! CRUD backend over the deferred job session. Create, read and delete are
//! registered; update is not, so dispatching it yields `NotFound`.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use super::client::{EnqueueRequest, QueueClient};
use super::job::{CreateJob, JobDescriptor, JobRef};
use super::session::JobSession;
use crate::access::CrudAccess;
use crate::backend::{Backend, BackendAccessRecord, HandlerTable};
use crate::config::QueueConfig;
use crate::error::{Error, Result};

/// Backend binding resources to an external job queue
pub struct JobQueueBackend {
    name: String,
    client: Arc<dyn QueueClient>,
    config: QueueConfig,
    handlers: HandlerTable<CrudAccess, JobSession>,
}

impl JobQueueBackend {
    pub fn new(client: Arc<dyn QueueClient>) -> Self {
        Self::with_config(client, QueueConfig::default())
    }

    pub fn with_config(client: Arc<dyn QueueClient>, config: QueueConfig) -> Self {
        let handlers = HandlerTable::new()
            .with(BackendAccessRecord::new(CrudAccess::Create, create_job))
            .with(BackendAccessRecord::new(CrudAccess::Read, read_job))
            .with(BackendAccessRecord::new(CrudAccess::Delete, delete_job));

        Self {
            name: "job_queue".to_string(),
            client,
            config,
            handlers,
        }
    }

    /// Use a different transaction key, for several queues in one transaction
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }
}

impl Backend for JobQueueBackend {
    type Kind = CrudAccess;
    type Session = JobSession;

    fn name(&self) -> &str {
        &self.name
    }

    fn handlers(&self) -> &HandlerTable<CrudAccess, JobSession> {
        &self.handlers
    }

    fn generate_session(&self) -> JobSession {
        JobSession::new(Arc::clone(&self.client), self.config.clone())
    }
}

/// Buffer a new job, refusing ids that already resolve
///
/// Scheduling parameters are checked here so a bad delay fails the call
/// instead of the later commit.
fn create_job(session: &mut JobSession, mut create: CreateJob) -> BoxFuture<'_, Result<JobDescriptor>> {
    async move {
        let job_id = create.ensure_job_id();
        EnqueueRequest::from_create(create.clone(), job_id.clone(), &session.config().default_queue_name)?;
        let queue_name = create.queue_name.clone();
        if session.query(&job_id, queue_name.as_deref()).await?.is_some() {
            return Err(Error::AlreadyExists(job_id));
        }

        session.add(create);
        session
            .query(&job_id, queue_name.as_deref())
            .await?
            .ok_or_else(|| Error::internal(format!("buffered job '{}' did not resolve", job_id)))
    }
    .boxed()
}

fn read_job(session: &mut JobSession, job: JobRef) -> BoxFuture<'_, Result<JobDescriptor>> {
    async move {
        session
            .query(&job.job_id, job.queue_name.as_deref())
            .await?
            .ok_or_else(|| Error::not_found(format!("job '{}'", job.job_id)))
    }
    .boxed()
}

/// Buffer an abort for a job that has not started yet
fn delete_job(session: &mut JobSession, job: JobRef) -> BoxFuture<'_, Result<JobDescriptor>> {
    async move {
        let descriptor = session
            .query(&job.job_id, job.queue_name.as_deref())
            .await?
            .ok_or_else(|| Error::not_found(format!("job '{}'", job.job_id)))?;

        if descriptor.status.has_started() {
            return Err(Error::AlreadyCompleted(job.job_id));
        }

        session.delete(&job.job_id);
        Ok(descriptor)
    }
    .boxed()
}
