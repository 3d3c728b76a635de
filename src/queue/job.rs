//! # Job Types
//!
//! Create parameters, queue records and the descriptors returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Identifier of a queued job
pub type JobId = String;

/// Milliseconds since the Unix epoch
pub fn timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Generate a fresh job id
pub fn new_job_id() -> JobId {
    Uuid::new_v4().to_string()
}

/// Parameters for enqueueing a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateJob {
    /// Worker function to run
    pub function: String,

    /// Job id; generated when absent
    #[serde(default)]
    pub job_id: Option<JobId>,

    /// Queue to score the job into; the configured default when absent
    #[serde(default)]
    pub queue_name: Option<String>,

    /// Run no earlier than this instant
    #[serde(default)]
    pub defer_until: Option<DateTime<Utc>>,

    /// Run no earlier than this many seconds from enqueue
    #[serde(default)]
    pub defer_by: Option<f64>,

    /// Seconds after which an unstarted job is dropped
    #[serde(default)]
    pub expires: Option<f64>,

    /// Attempt number to start from
    #[serde(default)]
    pub job_try: Option<u32>,

    /// Keyword arguments passed to the function
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl CreateJob {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            job_id: None,
            queue_name: None,
            defer_until: None,
            defer_by: None,
            expires: None,
            job_try: None,
            kwargs: Map::new(),
        }
    }

    pub fn with_job_id(mut self, job_id: impl Into<JobId>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.kwargs.insert(key.into(), value);
        self
    }

    /// The job id, assigning a fresh one if none was given
    pub fn ensure_job_id(&mut self) -> JobId {
        self.job_id.get_or_insert_with(new_job_id).clone()
    }
}

/// Reference to an existing job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRef {
    pub job_id: JobId,

    /// Queue to look in; the configured default when absent
    #[serde(default)]
    pub queue_name: Option<String>,
}

impl JobRef {
    pub fn new(job_id: impl Into<JobId>) -> Self {
        Self {
            job_id: job_id.into(),
            queue_name: None,
        }
    }
}

/// Lifecycle stage of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Buffered in a session, not yet sent to the queue
    Promise,
    Queued,
    /// Scored into the queue with a schedule time in the future
    Deferred,
    InProgress,
    Complete,
    NotFound,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Promise => "promise",
            Self::Queued => "queued",
            Self::Deferred => "deferred",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::NotFound => "not_found",
        }
    }

    /// Whether a worker has picked the job up
    pub fn has_started(&self) -> bool {
        matches!(self, Self::InProgress | Self::Complete)
    }
}

/// Job definition record stored by the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub function: String,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    #[serde(default)]
    pub job_try: Option<u32>,
    pub enqueue_time: DateTime<Utc>,
    /// Instant after which an unstarted job is dropped
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Schedule time in the queue, milliseconds since the epoch
    #[serde(default)]
    pub score: Option<i64>,
}

/// Outcome fields of a finished job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub success: bool,
    pub result: Value,
    pub start_time: DateTime<Utc>,
    pub finish_time: DateTime<Utc>,
    pub queue_name: String,
}

/// Result record stored by the queue once a job has finished
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub definition: JobDefinition,
    pub outcome: JobOutcome,
}

/// Which shape of information a descriptor carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Promise,
    Definition,
    Result,
}

/// View of a job returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub function: String,
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<JobDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<JobOutcome>,
}

impl JobDescriptor {
    /// Provisional view of a buffered job
    pub fn promise(function: impl Into<String>, job_id: impl Into<JobId>) -> Self {
        Self {
            function: function.into(),
            job_id: job_id.into(),
            status: JobStatus::Promise,
            definition: None,
            outcome: None,
        }
    }

    pub fn from_definition(job_id: impl Into<JobId>, status: JobStatus, definition: JobDefinition) -> Self {
        Self {
            function: definition.function.clone(),
            job_id: job_id.into(),
            status,
            definition: Some(definition),
            outcome: None,
        }
    }

    pub fn from_result(job_id: impl Into<JobId>, status: JobStatus, result: JobResult) -> Self {
        Self {
            function: result.definition.function.clone(),
            job_id: job_id.into(),
            status,
            definition: Some(result.definition),
            outcome: Some(result.outcome),
        }
    }

    pub fn stage(&self) -> JobStage {
        match (&self.definition, &self.outcome) {
            (_, Some(_)) => JobStage::Result,
            (Some(_), None) => JobStage::Definition,
            (None, None) => JobStage::Promise,
        }
    }
}
