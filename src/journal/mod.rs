//! # Journal Backend
//!
//! CRUD backend that echoes every record back to the caller and journals
//! it. Entries stay in the session until commit, then land in a journal
//! shared by every session of the backend.

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::access::CrudAccess;
use crate::backend::{Backend, BackendAccessRecord, HandlerTable};
use crate::error::{Error, Result};
use crate::session::Session;

/// One journaled access
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry<T> {
    pub kind: CrudAccess,
    pub record: T,
}

type Journal<T> = Arc<RwLock<Vec<JournalEntry<T>>>>;

/// Session holding uncommitted journal entries
pub struct JournalSession<T> {
    backend: String,
    pending: Vec<JournalEntry<T>>,
    journal: Journal<T>,
}

impl<T> JournalSession<T> {
    fn push(&mut self, kind: CrudAccess, record: T) {
        self.pending.push(JournalEntry { kind, record });
    }

    /// Entries recorded since the last commit
    pub fn pending(&self) -> &[JournalEntry<T>] {
        &self.pending
    }
}

impl<T: Send + Sync + 'static> Session for JournalSession<T> {
    fn commit(&mut self) -> BoxFuture<'_, Result<()>> {
        let outcome = match self.journal.write() {
            Ok(mut journal) => {
                let entries = self.pending.len();
                journal.append(&mut self.pending);
                info!(backend = %self.backend, entries, "journal batch committed");
                Ok(())
            }
            Err(e) => Err(Error::internal(e.to_string())),
        };
        future::ready(outcome).boxed()
    }

    fn rollback(&mut self) -> BoxFuture<'_, Result<()>> {
        self.pending.clear();
        future::ready(Ok(())).boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        self.pending.clear();
        future::ready(Ok(())).boxed()
    }
}

/// Echoing CRUD backend over records of type `T`
pub struct JournalBackend<T> {
    name: String,
    journal: Journal<T>,
    handlers: HandlerTable<CrudAccess, JournalSession<T>>,
    record: PhantomData<fn() -> T>,
}

impl<T> JournalBackend<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        let mut handlers = HandlerTable::new();
        for kind in [
            CrudAccess::Create,
            CrudAccess::Read,
            CrudAccess::Update,
            CrudAccess::Delete,
        ] {
            handlers.register(BackendAccessRecord::new(
                kind,
                move |session: &mut JournalSession<T>, record: T| {
                    session.push(kind, record.clone());
                    future::ready(Ok(record)).boxed()
                },
            ));
        }

        Self {
            name: name.into(),
            journal: Arc::new(RwLock::new(Vec::new())),
            handlers,
            record: PhantomData,
        }
    }

    /// Committed entries in commit order
    pub fn committed(&self) -> Result<Vec<JournalEntry<T>>> {
        self.journal
            .read()
            .map(|journal| journal.clone())
            .map_err(|e| Error::internal(e.to_string()))
    }
}

impl<T> Backend for JournalBackend<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    type Kind = CrudAccess;
    type Session = JournalSession<T>;

    fn name(&self) -> &str {
        &self.name
    }

    fn handlers(&self) -> &HandlerTable<CrudAccess, JournalSession<T>> {
        &self.handlers
    }

    fn generate_session(&self) -> JournalSession<T> {
        JournalSession {
            backend: self.name.clone(),
            pending: Vec::new(),
            journal: Arc::clone(&self.journal),
        }
    }
}

impl<T> fmt::Debug for JournalBackend<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JournalBackend").field("name", &self.name).finish()
    }
}
