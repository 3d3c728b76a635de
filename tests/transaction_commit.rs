//! Transaction Commit Tests
//!
//! Joint commit across backends is best-effort: sessions commit in the
//! order they joined, and a failure leaves earlier sessions committed.

use std::sync::Arc;

use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use gatehouse::{
    AccessRecord, Backend, BackendAccessRecord, CreateJob, CrudAccess, Error, HandlerTable,
    InMemoryQueue, JobDescriptor, JobQueueBackend, JobSession, JournalBackend, Permission,
    Principal, QueueClient, Resource, Result, Session, Transaction,
};
use serde_json::{json, Value};

/// Session whose store refuses every commit
struct FailingSession;

impl Session for FailingSession {
    fn commit(&mut self) -> BoxFuture<'_, Result<()>> {
        future::ready(Err(Error::backend("store unavailable"))).boxed()
    }

    fn rollback(&mut self) -> BoxFuture<'_, Result<()>> {
        future::ready(Ok(())).boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        future::ready(Ok(())).boxed()
    }
}

struct FailingBackend {
    handlers: HandlerTable<CrudAccess, FailingSession>,
}

impl FailingBackend {
    fn new() -> Self {
        Self {
            handlers: HandlerTable::new().with(BackendAccessRecord::new(
                CrudAccess::Create,
                |_: &mut FailingSession, data: Value| future::ready(Ok(data)).boxed(),
            )),
        }
    }
}

impl Backend for FailingBackend {
    type Kind = CrudAccess;
    type Session = FailingSession;

    fn name(&self) -> &str {
        "failing"
    }

    fn handlers(&self) -> &HandlerTable<CrudAccess, FailingSession> {
        &self.handlers
    }

    fn generate_session(&self) -> FailingSession {
        FailingSession
    }
}

fn everyone() -> Vec<Permission> {
    vec![Permission::allow(Principal::group("user"))]
}

fn user() -> Vec<Principal> {
    vec![Principal::group("user")]
}

fn journal_resource() -> (Arc<JournalBackend<Value>>, Resource<JournalBackend<Value>>) {
    let backend = Arc::new(JournalBackend::new("journal"));
    let resource = Resource::new(backend.clone())
        .with_access(AccessRecord::<_, Value, Value>::create("write").permissions(everyone()));
    (backend, resource)
}

fn failing_resource() -> Resource<FailingBackend> {
    Resource::new(Arc::new(FailingBackend::new()))
        .with_access(AccessRecord::<_, Value, Value>::create("write").permissions(everyone()))
}

fn job_resource() -> (Arc<InMemoryQueue>, Resource<JobQueueBackend>) {
    let queue = Arc::new(InMemoryQueue::new());
    let resource = Resource::new(Arc::new(JobQueueBackend::new(queue.clone()))).with_access(
        AccessRecord::<_, CreateJob, JobDescriptor>::create("create_job").permissions(everyone()),
    );
    (queue, resource)
}

// =============================================================================
// BEST-EFFORT JOINT COMMIT
// =============================================================================

/// Test: When the second backend fails to commit, the first stays committed.
#[tokio::test]
async fn test_second_commit_failure_keeps_first() {
    let (journal, journal_resource) = journal_resource();
    let failing = failing_resource();
    let mut transaction = Transaction::new();

    journal_resource
        .create("write", json!({"id": 1}), &user(), Some(&mut transaction))
        .await
        .unwrap();
    failing
        .create("write", json!({"id": 2}), &user(), Some(&mut transaction))
        .await
        .unwrap();

    let result = transaction.commit().await;

    assert_eq!(result, Err(Error::backend("store unavailable")));
    assert_eq!(journal.committed().unwrap().len(), 1);
    assert_eq!(journal.committed().unwrap()[0].record, json!({"id": 1}));
}

/// Test: A failure first in line leaves later sessions uncommitted.
#[tokio::test]
async fn test_first_commit_failure_stops_commit() {
    let (journal, journal_resource) = journal_resource();
    let failing = failing_resource();
    let mut transaction = Transaction::new();

    failing
        .create("write", json!({"id": 1}), &user(), Some(&mut transaction))
        .await
        .unwrap();
    journal_resource
        .create("write", json!({"id": 2}), &user(), Some(&mut transaction))
        .await
        .unwrap();

    let result = transaction.finish(Ok(())).await;

    assert!(matches!(result, Err(Error::Backend(_))));
    assert!(journal.committed().unwrap().is_empty());
}

/// Test: One session per backend, keyed in the order backends joined.
#[tokio::test]
async fn test_sessions_keyed_in_join_order() {
    let (_, journal_resource) = journal_resource();
    let (_, jobs) = job_resource();
    let mut transaction = Transaction::new();

    jobs.create(
        "create_job",
        json!({"function": "f", "job_id": "abc"}),
        &user(),
        Some(&mut transaction),
    )
    .await
    .unwrap();
    journal_resource
        .create("write", json!("x"), &user(), Some(&mut transaction))
        .await
        .unwrap();
    journal_resource
        .create("write", json!("y"), &user(), Some(&mut transaction))
        .await
        .unwrap();

    assert_eq!(transaction.keys().collect::<Vec<_>>(), vec!["job_queue", "journal"]);
    assert_eq!(transaction.len(), 2);
}

// =============================================================================
// SCOPED TRANSACTIONS
// =============================================================================

/// Test: `run` commits every participant on success.
#[tokio::test]
async fn test_run_commits_all_backends() {
    let (journal, journal_resource) = journal_resource();
    let (queue, jobs) = job_resource();
    let journal_resource = Arc::new(journal_resource);
    let jobs = Arc::new(jobs);

    Transaction::run(move |transaction| {
        async move {
            jobs.create(
                "create_job",
                json!({"function": "f", "job_id": "abc"}),
                &user(),
                Some(&mut *transaction),
            )
            .await?;
            journal_resource
                .create("write", json!({"job": "abc"}), &user(), Some(transaction))
                .await
        }
        .boxed()
    })
    .await
    .unwrap();

    assert!(queue.job_definition("abc").await.unwrap().is_some());
    assert_eq!(journal.committed().unwrap().len(), 1);
}

/// Test: `run` rolls back every participant when the body fails.
#[tokio::test]
async fn test_run_rolls_back_on_error() {
    let (journal, journal_resource) = journal_resource();
    let (queue, jobs) = job_resource();
    let journal_resource = Arc::new(journal_resource);
    let jobs = Arc::new(jobs);

    let result: Result<Value> = Transaction::run(move |transaction| {
        async move {
            journal_resource
                .create("write", json!({"job": "abc"}), &user(), Some(&mut *transaction))
                .await?;
            jobs.create(
                "create_job",
                json!({"function": "f", "job_id": "abc"}),
                &user(),
                Some(&mut *transaction),
            )
            .await?;
            Err(Error::Unauthorised)
        }
        .boxed()
    })
    .await;

    assert_eq!(result, Err(Error::Unauthorised));
    assert!(journal.committed().unwrap().is_empty());
    assert!(queue.job_definition("abc").await.unwrap().is_none());
}

/// Test: A caller can reach a backend's session through the transaction.
#[tokio::test]
async fn test_session_lookup_by_backend() {
    let (_, jobs) = job_resource();
    let mut transaction = Transaction::new();

    jobs.create(
        "create_job",
        json!({"function": "f", "job_id": "abc"}),
        &user(),
        Some(&mut transaction),
    )
    .await
    .unwrap();

    let session: &mut JobSession = transaction.session_for(&**jobs.backend()).unwrap();
    assert_eq!(session.pending_jobs().collect::<Vec<_>>(), vec!["abc"]);

    let removed = session.remove_operations("abc");
    assert_eq!(removed.len(), 1);
    transaction.commit().await.unwrap();
}
