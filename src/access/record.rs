//! Access Records
//!
//! Typed registration records for resource accesses.

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::kind::{AccessKind, CrudAccess};
use crate::error::Result;
use crate::permission::Permission;

/// Optional transform applied around a backend call
///
/// `Identity` passes data through untouched (only re-encoded).
pub enum Hook<T> {
    Identity,
    Transform(Arc<dyn Fn(T) -> Value + Send + Sync>),
}

impl<T> Hook<T> {
    /// Wrap a transform function
    pub fn transform(f: impl Fn(T) -> Value + Send + Sync + 'static) -> Self {
        Self::Transform(Arc::new(f))
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }
}

impl<T: Serialize> Hook<T> {
    /// Apply the hook, encoding the result for the next stage
    pub fn apply(&self, data: T) -> Result<Value> {
        match self {
            Self::Identity => Ok(serde_json::to_value(data)?),
            Self::Transform(f) => Ok(f(data)),
        }
    }
}

impl<T> Clone for Hook<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Identity => Self::Identity,
            Self::Transform(f) => Self::Transform(Arc::clone(f)),
        }
    }
}

impl<T> Default for Hook<T> {
    fn default() -> Self {
        Self::Identity
    }
}

impl<T> fmt::Debug for Hook<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => write!(f, "Identity"),
            Self::Transform(_) => write!(f, "Transform(..)"),
        }
    }
}

/// Permission rules attached to an access
///
/// Dynamic rules are computed from the backend's output and are therefore
/// evaluated after the backend call has run. A denied caller may already
/// have caused a buffered write at that point; only the ad-hoc transaction
/// path rolls it back.
#[derive(Clone)]
pub enum PermissionRules {
    Static(Vec<Permission>),
    Dynamic(Arc<dyn Fn(&Value) -> Vec<Permission> + Send + Sync>),
}

impl PermissionRules {
    pub fn dynamic(f: impl Fn(&Value) -> Vec<Permission> + Send + Sync + 'static) -> Self {
        Self::Dynamic(Arc::new(f))
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic(_))
    }
}

impl Default for PermissionRules {
    fn default() -> Self {
        Self::Static(Vec::new())
    }
}

impl fmt::Debug for PermissionRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(rules) => f.debug_tuple("Static").field(rules).finish(),
            Self::Dynamic(_) => write!(f, "Dynamic(..)"),
        }
    }
}

/// Registration record for one access of a resource
///
/// `I` is the caller-facing input schema and `O` the caller-facing output
/// schema. Without explicit permissions the access denies everyone.
pub struct AccessRecord<K, I, O> {
    pub kind: K,
    pub name: String,
    pub permissions: PermissionRules,
    /// Maps parsed input to what the backend handler accepts
    pub pre_process: Hook<I>,
    /// Maps backend output to what `O` parses from
    pub post_process: Hook<Value>,
    schema: PhantomData<fn(I) -> O>,
}

impl<K: AccessKind, I, O> AccessRecord<K, I, O> {
    /// Create a record with no permissions and identity hooks
    pub fn new(kind: K, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            permissions: PermissionRules::default(),
            pre_process: Hook::Identity,
            post_process: Hook::Identity,
            schema: PhantomData,
        }
    }

    /// Guard the access with static rules, evaluated before the backend call
    pub fn permissions(mut self, permissions: Vec<Permission>) -> Self {
        self.permissions = PermissionRules::Static(permissions);
        self
    }

    /// Guard the access with rules derived from the backend output
    pub fn dynamic_permissions(
        mut self,
        f: impl Fn(&Value) -> Vec<Permission> + Send + Sync + 'static,
    ) -> Self {
        self.permissions = PermissionRules::dynamic(f);
        self
    }

    pub fn pre_process(mut self, f: impl Fn(I) -> Value + Send + Sync + 'static) -> Self {
        self.pre_process = Hook::transform(f);
        self
    }

    pub fn post_process(mut self, f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.post_process = Hook::transform(f);
        self
    }

    /// Describe this access for enumeration
    pub fn descriptor(&self) -> AccessDescriptor<K> {
        AccessDescriptor {
            kind: self.kind,
            name: self.name.clone(),
            input_schema: type_name::<I>(),
            output_schema: type_name::<O>(),
            dynamic_permissions: self.permissions.is_dynamic(),
        }
    }
}

impl<I, O> AccessRecord<CrudAccess, I, O> {
    pub fn create(name: impl Into<String>) -> Self {
        Self::new(CrudAccess::Create, name)
    }

    pub fn read(name: impl Into<String>) -> Self {
        Self::new(CrudAccess::Read, name)
    }

    pub fn update(name: impl Into<String>) -> Self {
        Self::new(CrudAccess::Update, name)
    }

    pub fn delete(name: impl Into<String>) -> Self {
        Self::new(CrudAccess::Delete, name)
    }
}

impl<K: fmt::Debug, I, O> fmt::Debug for AccessRecord<K, I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessRecord")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("permissions", &self.permissions)
            .field("pre_process", &self.pre_process)
            .field("post_process", &self.post_process)
            .finish()
    }
}

/// Registered access as seen by schema generators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDescriptor<K> {
    pub kind: K,
    pub name: String,
    pub input_schema: &'static str,
    pub output_schema: &'static str,
    pub dynamic_permissions: bool,
}
