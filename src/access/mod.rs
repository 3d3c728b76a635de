//! # Accesses
//!
//! Named, permission-checked operations a resource exposes.
//!
//! An access binds a kind (create, read, custom verb, ...) and a name to a
//! typed input schema, a typed output schema, optional transforms on either
//! side of the backend call, and the permission rules guarding it.

pub mod kind;
pub mod record;

pub use kind::{AccessKind, CrudAccess};
pub use record::{AccessDescriptor, AccessRecord, Hook, PermissionRules};
