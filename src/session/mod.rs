//! # Sessions
//!
//! Unit-of-work handles onto a single backend's store, and the transaction
//! that groups one session per participating backend.
//!
//! ## Contract
//! - Failures are surfaced by the operations that buffer work; `commit()`
//!   on an in-memory store is not expected to fail
//! - Stores with external write effects may fail `commit()` per buffered
//!   item and must keep the remaining buffered state
//! - A session is committed or rolled back, never both
//! - A session is owned by one logical flow at a time

pub mod transaction;

use std::any::Any;

use futures_util::future::BoxFuture;

use crate::error::Result;

pub use transaction::Transaction;

/// Object-safe downcasting support for sessions
pub trait AsAny: Any {
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Unit of work against one backend
pub trait Session: AsAny + Send {
    /// Apply buffered work to the store
    fn commit(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Discard buffered work
    fn rollback(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Release the session; uncommitted work is discarded
    fn close(&mut self) -> BoxFuture<'_, Result<()>>;
}
