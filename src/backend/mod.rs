//! # Backends
//!
//! Store bindings behind resources. A backend provides one handler per
//! access kind, opens sessions onto its store, and runs handlers inside a
//! session, either one supplied directly or the one it owns inside a
//! transaction.

pub mod handler;

use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use serde_json::Value;

use crate::access::AccessKind;
use crate::error::Result;
use crate::session::{Session, Transaction};

pub use handler::{BackendAccessRecord, Handler, HandlerTable, Process};

/// A pluggable store binding
pub trait Backend: Send + Sync {
    /// Access kinds this backend dispatches on
    type Kind: AccessKind;

    /// Session type opened onto the store
    type Session: Session;

    /// Stable key of this backend inside a transaction
    fn name(&self) -> &str;

    /// Registered handlers
    fn handlers(&self) -> &HandlerTable<Self::Kind, Self::Session>;

    /// Open a fresh session
    fn generate_session(&self) -> Self::Session;

    /// Run the handler for `kind` inside `session`
    fn invoke<'a>(
        &self,
        kind: Self::Kind,
        data: Value,
        session: &'a mut Self::Session,
    ) -> BoxFuture<'a, Result<Value>> {
        self.handlers().invoke(kind, data, session)
    }

    /// Run the handler for `kind` inside this backend's session of
    /// `transaction`, opening that session on first use
    fn invoke_in<'a>(
        &self,
        kind: Self::Kind,
        data: Value,
        transaction: &'a mut Transaction,
    ) -> BoxFuture<'a, Result<Value>> {
        match transaction.session_for(self) {
            Ok(session) => self.invoke(kind, data, session),
            Err(e) => future::ready(Err(e)).boxed(),
        }
    }
}
