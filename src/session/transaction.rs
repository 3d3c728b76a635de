//! # Transaction Coordinator
//!
//! Groups one session per participating backend so a single logical call can
//! span several stores.
//!
//! ## Guarantees
//! - Sessions are committed in the order they joined the transaction
//! - Joint commit is best-effort: if a later session fails to commit, the
//!   sessions before it stay committed and are not rolled back
//! - One session per backend name; repeated calls reuse it

use futures_util::future::BoxFuture;
use tracing::{debug, warn};

use super::Session;
use crate::backend::Backend;
use crate::error::{Error, Result};

/// Ordered collection of named sessions for one logical operation
#[derive(Default)]
pub struct Transaction {
    sessions: Vec<(String, Box<dyn Session>)>,
}

impl Transaction {
    /// Create an empty transaction
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` inside a fresh transaction
    ///
    /// Commits when `f` succeeds, rolls back when it fails, and always closes
    /// the transaction afterwards.
    pub async fn run<T, F>(f: F) -> Result<T>
    where
        F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T>>,
    {
        let mut transaction = Transaction::new();
        let outcome = f(&mut transaction).await;
        transaction.finish(outcome).await
    }

    /// Inject a session under an explicit key
    ///
    /// Fails if the key is already taken.
    pub fn insert<S: Session>(&mut self, key: impl Into<String>, session: S) -> Result<()> {
        let key = key.into();
        if self.position(&key).is_some() {
            return Err(Error::AlreadyExists(format!("session '{}'", key)));
        }
        let session: Box<dyn Session> = Box::new(session);
        self.sessions.push((key, session));
        Ok(())
    }

    /// Borrow the session stored under `key` as its concrete type
    pub fn get_mut<S: Session>(&mut self, key: &str) -> Result<Option<&mut S>> {
        match self.position(key) {
            Some(index) => downcast(&mut self.sessions[index]).map(Some),
            None => Ok(None),
        }
    }

    /// Session belonging to `backend`, opened on first use
    pub fn session_for<B: Backend + ?Sized>(&mut self, backend: &B) -> Result<&mut B::Session> {
        let index = match self.position(backend.name()) {
            Some(index) => index,
            None => {
                debug!(backend = backend.name(), "opening session");
                let session: Box<dyn Session> = Box::new(backend.generate_session());
                self.sessions.push((backend.name().to_string(), session));
                self.sessions.len() - 1
            }
        };
        downcast(&mut self.sessions[index])
    }

    /// Commit every session in insertion order, stopping at the first failure
    pub async fn commit(&mut self) -> Result<()> {
        for (key, session) in self.sessions.iter_mut() {
            debug!(session = %key, "committing session");
            if let Err(e) = session.commit().await {
                warn!(session = %key, error = %e, "session commit failed");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Roll back every session, then hand `error` back to the caller
    pub async fn rollback<T>(&mut self, error: Error) -> Result<T> {
        for (key, session) in self.sessions.iter_mut() {
            if let Err(e) = session.rollback().await {
                warn!(session = %key, error = %e, "session rollback failed");
            }
        }
        Err(error)
    }

    /// Close every session
    pub async fn close(&mut self) {
        for (key, session) in self.sessions.iter_mut() {
            if let Err(e) = session.close().await {
                warn!(session = %key, error = %e, "session close failed");
            }
        }
    }

    /// Commit on success or roll back on failure, then close
    pub async fn finish<T>(&mut self, outcome: Result<T>) -> Result<T> {
        let outcome = match outcome {
            Ok(value) => self.commit().await.map(|_| value),
            Err(e) => self.rollback(e).await,
        };
        self.close().await;
        outcome
    }

    /// Session keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sessions.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.sessions.iter().position(|(k, _)| k == key)
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("sessions", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn downcast<S: Session>(entry: &mut (String, Box<dyn Session>)) -> Result<&mut S> {
    let (key, session) = entry;
    let session: &mut dyn Session = &mut **session;
    session.as_any_mut().downcast_mut::<S>().ok_or_else(|| {
        Error::internal(format!(
            "session '{}' is not a {}",
            key,
            std::any::type_name::<S>()
        ))
    })
}
