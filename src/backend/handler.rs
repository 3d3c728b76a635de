//! Backend Handler Table
//!
//! Per-kind dispatch table of a backend. Each registered handler is wrapped
//! so its input is parsed into the declared input schema before the call and
//! its output is encoded from the declared output schema after it.

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::access::AccessKind;
use crate::error::{Error, Result};

/// Typed processing function of a backend access
pub type Process<S, I, O> =
    Arc<dyn for<'a> Fn(&'a mut S, I) -> BoxFuture<'a, Result<O>> + Send + Sync>;

/// Schema-erased handler stored in the dispatch table
pub type Handler<S> =
    Arc<dyn for<'a> Fn(&'a mut S, Value) -> BoxFuture<'a, Result<Value>> + Send + Sync>;

/// Registration record for one access kind of a backend
pub struct BackendAccessRecord<K, S, I, O> {
    pub kind: K,
    pub process: Process<S, I, O>,
}

impl<K: AccessKind, S, I, O> BackendAccessRecord<K, S, I, O> {
    pub fn new<F>(kind: K, process: F) -> Self
    where
        F: for<'a> Fn(&'a mut S, I) -> BoxFuture<'a, Result<O>> + Send + Sync + 'static,
    {
        Self {
            kind,
            process: Arc::new(process),
        }
    }
}

struct HandlerEntry<S> {
    handler: Handler<S>,
    input_schema: &'static str,
    output_schema: &'static str,
}

/// Handlers of a backend keyed by access kind
///
/// Lookups are hashed; registration order is kept for enumeration.
pub struct HandlerTable<K, S> {
    handlers: HashMap<K, HandlerEntry<S>>,
    order: Vec<K>,
}

impl<K: AccessKind, S: Send + 'static> HandlerTable<K, S> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a handler; a later registration for the same kind replaces it
    pub fn register<I, O>(&mut self, record: BackendAccessRecord<K, S, I, O>)
    where
        I: DeserializeOwned + Send + 'static,
        O: Serialize + Send + 'static,
    {
        let process = record.process;
        let handler = erase(move |session: &mut S, data: Value| {
            let process = Arc::clone(&process);
            async move {
                let input: I = serde_json::from_value(data)?;
                let output = process(session, input).await?;
                Ok(serde_json::to_value(output)?)
            }
            .boxed()
        });

        let entry = HandlerEntry {
            handler,
            input_schema: type_name::<I>(),
            output_schema: type_name::<O>(),
        };
        if self.handlers.insert(record.kind, entry).is_none() {
            self.order.push(record.kind);
        }
    }

    /// Builder form of `register`
    pub fn with<I, O>(mut self, record: BackendAccessRecord<K, S, I, O>) -> Self
    where
        I: DeserializeOwned + Send + 'static,
        O: Serialize + Send + 'static,
    {
        self.register(record);
        self
    }

    pub fn get(&self, kind: K) -> Option<&Handler<S>> {
        self.handlers.get(&kind).map(|entry| &entry.handler)
    }

    pub fn contains(&self, kind: K) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Registered kinds with their input and output schema names
    pub fn kinds(&self) -> impl Iterator<Item = (K, &'static str, &'static str)> + '_ {
        self.order.iter().filter_map(move |kind| {
            self.handlers
                .get(kind)
                .map(|entry| (*kind, entry.input_schema, entry.output_schema))
        })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Run the handler for `kind` inside `session`
    pub fn invoke<'a>(&self, kind: K, data: Value, session: &'a mut S) -> BoxFuture<'a, Result<Value>> {
        match self.handlers.get(&kind) {
            Some(entry) => {
                let handler = Arc::clone(&entry.handler);
                handler(session, data)
            }
            None => future::ready(Err(Error::not_found(format!(
                "backend handler for '{}'",
                kind.name()
            ))))
            .boxed(),
        }
    }
}

impl<K: AccessKind, S: Send + 'static> Default for HandlerTable<K, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, S> fmt::Debug for HandlerTable<K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable").field("kinds", &self.order).finish()
    }
}

fn erase<S, F>(f: F) -> Handler<S>
where
    F: for<'a> Fn(&'a mut S, Value) -> BoxFuture<'a, Result<Value>> + Send + Sync + 'static,
{
    Arc::new(f)
}
