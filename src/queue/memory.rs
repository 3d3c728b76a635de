//! In-Memory Queue
//!
//! In-process model of the arq keyspace for tests and local development.
//! Jobs are scored into sorted sets, definitions and results live under
//! prefixed keys, and a running job carries an in-progress marker.
//!
//! The worker side is driven by hand through `start`, `finish` and
//! `complete`. An abort request removes a job that is still waiting in its
//! queue; running and finished jobs ignore it.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use serde_json::{json, Value};
use tracing::debug;

use super::client::{EnqueueRequest, QueueClient};
use super::job::{timestamp_ms, JobDefinition, JobId, JobOutcome, JobResult};
use crate::config::QueueConfig;
use crate::error::{Error, Result};

#[derive(Default)]
struct QueueState {
    records: HashMap<String, Value>,
    sets: HashMap<String, HashMap<String, i64>>,
    /// Queue each waiting job is scored into
    queues: HashMap<JobId, String>,
}

impl QueueState {
    fn score(&self, set: &str, member: &str) -> Option<i64> {
        self.sets.get(set).and_then(|scores| scores.get(member)).copied()
    }

    fn unscore(&mut self, set: &str, member: &str) -> Option<i64> {
        self.sets.get_mut(set).and_then(|scores| scores.remove(member))
    }
}

/// Queue service held entirely in memory
pub struct InMemoryQueue {
    config: QueueConfig,
    state: Mutex<QueueState>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            config,
            state: Mutex::new(QueueState::default()),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn state(&self) -> Result<MutexGuard<'_, QueueState>> {
        self.state.lock().map_err(|e| Error::internal(e.to_string()))
    }

    /// Pick a waiting job up: drop its score and mark it in progress
    pub fn start(&self, job_id: &str) -> Result<()> {
        let mut state = self.state()?;
        let queue = state
            .queues
            .remove(job_id)
            .ok_or_else(|| Error::not_found(format!("queued job '{}'", job_id)))?;
        state.unscore(&queue, job_id);
        let marker = json!({"queue_name": queue, "start_ms": timestamp_ms()});
        state
            .records
            .insert(self.config.in_progress_key(job_id), marker);
        debug!(job_id, queue = %queue, "job started");
        Ok(())
    }

    /// Finish a running job, storing its result record
    pub fn finish(&self, job_id: &str, success: bool, result: Value) -> Result<()> {
        let mut state = self.state()?;
        let marker = state
            .records
            .remove(&self.config.in_progress_key(job_id))
            .ok_or_else(|| Error::not_found(format!("running job '{}'", job_id)))?;
        let start_time = marker["start_ms"]
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or_else(Utc::now);
        let queue_name = marker["queue_name"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| self.config.default_queue_name.clone());
        let definition: JobDefinition = match state.records.remove(&self.config.job_key(job_id)) {
            Some(record) => serde_json::from_value(record)?,
            None => return Err(Error::not_found(format!("job '{}'", job_id))),
        };

        let record = JobResult {
            definition,
            outcome: JobOutcome {
                success,
                result,
                start_time,
                finish_time: Utc::now(),
                queue_name,
            },
        };
        state
            .records
            .insert(self.config.result_key(job_id), serde_json::to_value(record)?);
        debug!(job_id, success, "job finished");
        Ok(())
    }

    /// Run a waiting job to successful completion
    pub fn complete(&self, job_id: &str, result: Value) -> Result<()> {
        self.start(job_id)?;
        self.finish(job_id, true, result)
    }

    /// Job ids recorded in the abort set
    pub fn abort_requests(&self) -> Result<Vec<JobId>> {
        let state = self.state()?;
        let mut requests: Vec<(i64, JobId)> = state
            .sets
            .get(&self.config.abort_set)
            .map(|scores| scores.iter().map(|(id, score)| (*score, id.clone())).collect())
            .unwrap_or_default();
        requests.sort();
        Ok(requests.into_iter().map(|(_, id)| id).collect())
    }

    fn enqueue_now(&self, request: EnqueueRequest) -> Result<Option<JobDefinition>> {
        let mut state = self.state()?;
        let job_key = self.config.job_key(&request.job_id);
        if state.records.contains_key(&job_key)
            || state.records.contains_key(&self.config.result_key(&request.job_id))
        {
            return Ok(None);
        }

        let enqueue_time = Utc::now();
        let now_ms = enqueue_time.timestamp_millis();
        let score = match (request.defer_until, request.defer_by_ms) {
            (Some(until), _) => until.timestamp_millis(),
            (None, Some(by)) => now_ms.checked_add(by).ok_or_else(|| {
                Error::validation(format!("defer_by of {} ms is out of range", by))
            })?,
            (None, None) => now_ms,
        };
        let expires_at = match request.expires_ms {
            Some(ms) => Some(
                Duration::try_milliseconds(ms)
                    .and_then(|ttl| enqueue_time.checked_add_signed(ttl))
                    .ok_or_else(|| {
                        Error::validation(format!("expires of {} ms is out of range", ms))
                    })?,
            ),
            None => None,
        };

        let definition = JobDefinition {
            function: request.function,
            kwargs: request.kwargs,
            job_try: request.job_try,
            enqueue_time,
            expires_at,
            score: None,
        };

        state.records.insert(job_key, serde_json::to_value(&definition)?);
        state
            .sets
            .entry(request.queue_name.clone())
            .or_default()
            .insert(request.job_id.clone(), score);
        debug!(job_id = %request.job_id, queue = %request.queue_name, score, "job enqueued");
        state.queues.insert(request.job_id, request.queue_name);

        Ok(Some(definition))
    }

    fn zadd_now(&self, set: &str, score: i64, member: &str) -> Result<()> {
        let mut state = self.state()?;
        state
            .sets
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string(), score);

        if set == self.config.abort_set {
            if let Some(queue) = state.queues.remove(member) {
                state.unscore(&queue, member);
                state.records.remove(&self.config.job_key(member));
                debug!(job_id = member, queue = %queue, "waiting job aborted");
            }
        }
        Ok(())
    }

    fn record<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let state = self.state()?;
        match state.records.get(key) {
            Some(record) => Ok(Some(serde_json::from_value(record.clone())?)),
            None => Ok(None),
        }
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueClient for InMemoryQueue {
    fn enqueue(&self, request: EnqueueRequest) -> BoxFuture<'_, Result<Option<JobDefinition>>> {
        future::ready(self.enqueue_now(request)).boxed()
    }

    fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
        let exists = self.state().map(|state| state.records.contains_key(key));
        future::ready(exists).boxed()
    }

    fn zscore<'a>(&'a self, set: &'a str, member: &'a str) -> BoxFuture<'a, Result<Option<i64>>> {
        let score = self.state().map(|state| state.score(set, member));
        future::ready(score).boxed()
    }

    fn zadd<'a>(&'a self, set: &'a str, score: i64, member: &'a str) -> BoxFuture<'a, Result<()>> {
        future::ready(self.zadd_now(set, score, member)).boxed()
    }

    fn job_definition<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<Option<JobDefinition>>> {
        future::ready(self.record(&self.config.job_key(job_id))).boxed()
    }

    fn job_result<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<Option<JobResult>>> {
        future::ready(self.record(&self.config.result_key(job_id))).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::job::CreateJob;

    fn request(job_id: &str) -> EnqueueRequest {
        EnqueueRequest::from_create(CreateJob::new("f"), job_id.into(), "arq:queue").unwrap()
    }

    #[tokio::test]
    async fn test_enqueue_scores_job() {
        let queue = InMemoryQueue::new();
        let before = timestamp_ms();

        let definition = queue.enqueue(request("abc")).await.unwrap().unwrap();
        assert_eq!(definition.function, "f");

        let score = queue.zscore("arq:queue", "abc").await.unwrap().unwrap();
        assert!(score >= before);
        assert!(queue.exists("arq:job:abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_enqueue_duplicate_returns_none() {
        let queue = InMemoryQueue::new();
        queue.enqueue(request("abc")).await.unwrap();

        assert!(queue.enqueue(request("abc")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_defer_by_moves_score_forward() {
        let queue = InMemoryQueue::new();
        let mut deferred = request("later");
        deferred.defer_by_ms = Some(60_000);
        let before = timestamp_ms();

        queue.enqueue(deferred).await.unwrap();

        let score = queue.zscore("arq:queue", "later").await.unwrap().unwrap();
        assert!(score >= before + 60_000);
    }

    #[tokio::test]
    async fn test_out_of_range_schedule_is_rejected() {
        let queue = InMemoryQueue::new();
        let mut deferred = request("later");
        deferred.defer_by_ms = Some(i64::MAX);
        let mut expiring = request("expiring");
        expiring.expires_ms = Some(i64::MAX);

        assert!(matches!(queue.enqueue(deferred).await, Err(Error::Validation(_))));
        assert!(matches!(queue.enqueue(expiring).await, Err(Error::Validation(_))));
        assert!(!queue.exists("arq:job:later").await.unwrap());
        assert!(!queue.exists("arq:job:expiring").await.unwrap());
    }

    #[tokio::test]
    async fn test_worker_lifecycle() {
        let queue = InMemoryQueue::new();
        queue.enqueue(request("abc")).await.unwrap();

        queue.start("abc").unwrap();
        assert!(queue.exists("arq:in-progress:abc").await.unwrap());
        assert!(queue.zscore("arq:queue", "abc").await.unwrap().is_none());

        queue.finish("abc", true, json!(42)).unwrap();
        assert!(!queue.exists("arq:in-progress:abc").await.unwrap());

        let result = queue.job_result("abc").await.unwrap().unwrap();
        assert_eq!(result.outcome.result, json!(42));
        assert_eq!(result.definition.function, "f");

        // A finished id cannot be reused
        assert!(queue.enqueue(request("abc")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_result_records_queue_job_ran_on() {
        let queue = InMemoryQueue::new();
        let mut request = request("abc");
        request.queue_name = "emails".into();
        queue.enqueue(request).await.unwrap();

        queue.complete("abc", json!(null)).unwrap();

        let result = queue.job_result("abc").await.unwrap().unwrap();
        assert_eq!(result.outcome.queue_name, "emails");
    }

    #[tokio::test]
    async fn test_abort_removes_waiting_job() {
        let queue = InMemoryQueue::new();
        queue.enqueue(request("abc")).await.unwrap();

        queue.zadd("arq:abort", timestamp_ms(), "abc").await.unwrap();

        assert!(queue.zscore("arq:queue", "abc").await.unwrap().is_none());
        assert!(queue.job_definition("abc").await.unwrap().is_none());
        assert_eq!(queue.abort_requests().unwrap(), vec!["abc".to_string()]);
    }

    #[tokio::test]
    async fn test_abort_ignored_by_finished_job() {
        let queue = InMemoryQueue::new();
        queue.enqueue(request("abc")).await.unwrap();
        queue.complete("abc", json!(null)).unwrap();

        queue.zadd("arq:abort", timestamp_ms(), "abc").await.unwrap();

        assert!(queue.job_result("abc").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_finish_requires_running_job() {
        let queue = InMemoryQueue::new();
        queue.enqueue(request("abc")).await.unwrap();

        assert!(matches!(queue.finish("abc", true, json!(1)), Err(Error::NotFound(_))));
        assert!(matches!(queue.start("nope"), Err(Error::NotFound(_))));
    }
}
