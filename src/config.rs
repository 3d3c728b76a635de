//! Job Queue Configuration
//!
//! Key layout of the external queue service. Defaults match the arq
//! keyspace so sessions interoperate with existing arq workers.

use serde::{Deserialize, Serialize};

/// Queue keyspace configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Sorted set that jobs are scored into (default: "arq:queue")
    #[serde(default = "default_queue_name")]
    pub default_queue_name: String,

    /// Prefix of job definition records (default: "arq:job:")
    #[serde(default = "default_job_key_prefix")]
    pub job_key_prefix: String,

    /// Prefix of completed result records (default: "arq:result:")
    #[serde(default = "default_result_key_prefix")]
    pub result_key_prefix: String,

    /// Prefix of in-progress markers (default: "arq:in-progress:")
    #[serde(default = "default_in_progress_key_prefix")]
    pub in_progress_key_prefix: String,

    /// Sorted set recording abort requests (default: "arq:abort")
    #[serde(default = "default_abort_set")]
    pub abort_set: String,
}

fn default_queue_name() -> String {
    "arq:queue".to_string()
}

fn default_job_key_prefix() -> String {
    "arq:job:".to_string()
}

fn default_result_key_prefix() -> String {
    "arq:result:".to_string()
}

fn default_in_progress_key_prefix() -> String {
    "arq:in-progress:".to_string()
}

fn default_abort_set() -> String {
    "arq:abort".to_string()
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            default_queue_name: default_queue_name(),
            job_key_prefix: default_job_key_prefix(),
            result_key_prefix: default_result_key_prefix(),
            in_progress_key_prefix: default_in_progress_key_prefix(),
            abort_set: default_abort_set(),
        }
    }
}

impl QueueConfig {
    /// Create a config scoring jobs into the given queue
    pub fn with_queue_name(queue_name: impl Into<String>) -> Self {
        Self {
            default_queue_name: queue_name.into(),
            ..Default::default()
        }
    }

    /// Key of a job's definition record
    pub fn job_key(&self, job_id: &str) -> String {
        format!("{}{}", self.job_key_prefix, job_id)
    }

    /// Key of a job's completed result record
    pub fn result_key(&self, job_id: &str) -> String {
        format!("{}{}", self.result_key_prefix, job_id)
    }

    /// Key of a job's in-progress marker
    pub fn in_progress_key(&self, job_id: &str) -> String {
        format!("{}{}", self.in_progress_key_prefix, job_id)
    }
}
