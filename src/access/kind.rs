//! Access Kinds
//!
//! The dispatch key of an access. CRUD is built in; custom verbs are
//! caller-defined enums implementing `AccessKind`.

use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// A family of accesses a backend provides one handler for
pub trait AccessKind: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Stable name for logging and schema generation
    fn name(&self) -> &'static str;
}

/// Create/read/update/delete access kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrudAccess {
    Create,
    Read,
    Update,
    Delete,
}

impl AccessKind for CrudAccess {
    fn name(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}
