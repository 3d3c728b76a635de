//! # Resource Dispatcher
//!
//! Entry point for callers. Every invocation runs the same stages:
//!
//! Parse input → Pre-process → Static permissions → Backend → Dynamic
//! permissions → Post-process → Parse output
//!
//! ## Transaction ownership
//! - Caller-supplied transaction or session: the caller commits later
//! - No transaction supplied: an ad-hoc transaction is opened for the call,
//!   committed on success and rolled back on any error

pub mod crud;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::access::{AccessDescriptor, AccessKind, AccessRecord, PermissionRules};
use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::permission::{has_permission, Action, Principal};
use crate::session::Transaction;

type Stage = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// Registered access with its schemas erased
struct AccessEntry<K> {
    descriptor: AccessDescriptor<K>,
    permissions: PermissionRules,
    /// Parse input and apply the pre-process hook
    prepare: Stage,
    /// Apply the post-process hook and parse output
    finish: Stage,
}

/// Where the backend call runs
enum Target<'t, S> {
    Session(&'t mut S),
    Transaction(&'t mut Transaction),
}

/// A set of named accesses over one backend
pub struct Resource<B: Backend> {
    backend: Arc<B>,
    index: HashMap<(B::Kind, String), usize>,
    entries: Vec<AccessEntry<B::Kind>>,
}

impl<B: Backend> Resource<B> {
    /// Create a resource with no accesses
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// Register an access
    ///
    /// A later registration of the same kind and name replaces the earlier
    /// one and keeps its enumeration position.
    pub fn register<I, O>(&mut self, record: AccessRecord<B::Kind, I, O>)
    where
        I: DeserializeOwned + Serialize + 'static,
        O: DeserializeOwned + Serialize + 'static,
    {
        let descriptor = record.descriptor();
        let pre_process = record.pre_process;
        let post_process = record.post_process;

        let prepare: Stage = Arc::new(move |data: Value| {
            let input: I = serde_json::from_value(data)?;
            pre_process.apply(input)
        });
        let finish: Stage = Arc::new(move |data: Value| {
            let output: O = serde_json::from_value(post_process.apply(data)?)?;
            Ok(serde_json::to_value(output)?)
        });

        let entry = AccessEntry {
            descriptor,
            permissions: record.permissions,
            prepare,
            finish,
        };

        let key = (record.kind, record.name);
        match self.index.get(&key).copied() {
            Some(position) => self.entries[position] = entry,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Builder form of `register`
    pub fn with_access<I, O>(mut self, record: AccessRecord<B::Kind, I, O>) -> Self
    where
        I: DeserializeOwned + Serialize + 'static,
        O: DeserializeOwned + Serialize + 'static,
    {
        self.register(record);
        self
    }

    /// Registered accesses in registration order
    pub fn accesses(&self) -> impl Iterator<Item = &AccessDescriptor<B::Kind>> {
        self.entries.iter().map(|entry| &entry.descriptor)
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Invoke an access
    ///
    /// With `transaction`, the backend's session inside it is reused (or
    /// opened) and nothing is committed. Without, the call runs in its own
    /// transaction.
    pub async fn invoke(
        &self,
        kind: B::Kind,
        name: &str,
        data: Value,
        principals: &[Principal],
        transaction: Option<&mut Transaction>,
    ) -> Result<Value> {
        let entry = self.entry(kind, name)?;
        match transaction {
            Some(transaction) => {
                self.dispatch(entry, data, principals, Target::Transaction(transaction))
                    .await
            }
            None => {
                let mut transaction = Transaction::new();
                let outcome = self
                    .dispatch(entry, data, principals, Target::Transaction(&mut transaction))
                    .await;
                transaction.finish(outcome).await
            }
        }
    }

    /// Invoke an access inside a caller-owned session of this backend
    pub async fn invoke_in_session(
        &self,
        kind: B::Kind,
        name: &str,
        data: Value,
        principals: &[Principal],
        session: &mut B::Session,
    ) -> Result<Value> {
        let entry = self.entry(kind, name)?;
        self.dispatch(entry, data, principals, Target::Session(session))
            .await
    }

    fn entry(&self, kind: B::Kind, name: &str) -> Result<&AccessEntry<B::Kind>> {
        self.index
            .get(&(kind, name.to_string()))
            .map(|&position| &self.entries[position])
            .ok_or_else(|| Error::not_found(format!("access '{}' of kind '{}'", name, kind.name())))
    }

    async fn dispatch(
        &self,
        entry: &AccessEntry<B::Kind>,
        data: Value,
        principals: &[Principal],
        target: Target<'_, B::Session>,
    ) -> Result<Value> {
        let kind = entry.descriptor.kind;
        let name = entry.descriptor.name.as_str();
        debug!(kind = kind.name(), access = name, "invoking access");

        let input = (entry.prepare)(data)?;

        if let PermissionRules::Static(rules) = &entry.permissions {
            if has_permission(principals, rules) != Action::Allow {
                warn!(kind = kind.name(), access = name, reason = "static", "access denied");
                return Err(Error::Unauthorised);
            }
        }

        let output = match target {
            Target::Session(session) => self.backend.invoke(kind, input, session).await?,
            Target::Transaction(transaction) => {
                self.backend.invoke_in(kind, input, transaction).await?
            }
        };

        if let PermissionRules::Dynamic(rules) = &entry.permissions {
            if has_permission(principals, &rules(&output)) != Action::Allow {
                warn!(kind = kind.name(), access = name, reason = "dynamic", "access denied");
                return Err(Error::Unauthorised);
            }
        }

        (entry.finish)(output)
    }
}

impl<B: Backend> fmt::Debug for Resource<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("backend", &self.backend.name())
            .field("accesses", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendAccessRecord, HandlerTable};
    use crate::permission::Permission;
    use crate::session::Session;
    use futures_util::future::{self, BoxFuture};
    use futures_util::FutureExt;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum LedgerAccess {
        Credit,
        Audit,
    }

    impl AccessKind for LedgerAccess {
        fn name(&self) -> &'static str {
            match self {
                Self::Credit => "credit",
                Self::Audit => "audit",
            }
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Amount {
        cents: i64,
    }

    #[derive(Default)]
    struct LedgerSession {
        balance: i64,
    }

    impl Session for LedgerSession {
        fn commit(&mut self) -> BoxFuture<'_, Result<()>> {
            future::ready(Ok(())).boxed()
        }

        fn rollback(&mut self) -> BoxFuture<'_, Result<()>> {
            self.balance = 0;
            future::ready(Ok(())).boxed()
        }

        fn close(&mut self) -> BoxFuture<'_, Result<()>> {
            future::ready(Ok(())).boxed()
        }
    }

    struct Ledger {
        handlers: HandlerTable<LedgerAccess, LedgerSession>,
    }

    impl Backend for Ledger {
        type Kind = LedgerAccess;
        type Session = LedgerSession;

        fn name(&self) -> &str {
            "ledger"
        }

        fn handlers(&self) -> &HandlerTable<LedgerAccess, LedgerSession> {
            &self.handlers
        }

        fn generate_session(&self) -> LedgerSession {
            LedgerSession::default()
        }
    }

    fn resource() -> Resource<Ledger> {
        let handlers = HandlerTable::new().with(BackendAccessRecord::new(
            LedgerAccess::Credit,
            |session: &mut LedgerSession, amount: Amount| {
                session.balance += amount.cents;
                future::ready(Ok(Amount {
                    cents: session.balance,
                }))
                .boxed()
            },
        ));

        Resource::new(Arc::new(Ledger { handlers }))
            .with_access(
                AccessRecord::<_, Amount, Amount>::new(LedgerAccess::Credit, "deposit")
                    .permissions(vec![Permission::allow(Principal::role("teller"))]),
            )
            .with_access(
                AccessRecord::<_, Amount, Amount>::new(LedgerAccess::Audit, "audit")
                    .permissions(vec![Permission::allow(Principal::role("teller"))]),
            )
    }

    #[tokio::test]
    async fn test_custom_kind_dispatch() {
        let resource = resource();
        let teller = [Principal::role("teller")];
        let mut session = LedgerSession::default();

        resource
            .invoke_in_session(LedgerAccess::Credit, "deposit", json!({"cents": 250}), &teller, &mut session)
            .await
            .unwrap();
        let output = resource
            .invoke_in_session(LedgerAccess::Credit, "deposit", json!({"cents": 50}), &teller, &mut session)
            .await
            .unwrap();

        assert_eq!(output, json!({"cents": 300}));
    }

    #[tokio::test]
    async fn test_kind_and_name_both_key_the_access() {
        let resource = resource();
        let teller = [Principal::role("teller")];

        let result = resource
            .invoke(LedgerAccess::Audit, "deposit", json!({"cents": 1}), &teller, None)
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        // Registered access without a backend handler
        let result = resource
            .invoke(LedgerAccess::Audit, "audit", json!({"cents": 1}), &teller, None)
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_denied_before_input_reaches_backend() {
        let resource = resource();
        let mut session = LedgerSession::default();

        let result = resource
            .invoke_in_session(
                LedgerAccess::Credit,
                "deposit",
                json!({"cents": 250}),
                &[Principal::role("auditor")],
                &mut session,
            )
            .await;

        assert_eq!(result, Err(Error::Unauthorised));
        assert_eq!(session.balance, 0);
    }
}
