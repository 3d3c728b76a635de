//! # Permissions
//!
//! Ordered allow/deny rules evaluated against the caller's principals.
//!
//! ## Invariants
//! - First match wins: rule order is significant and never rearranged
//! - Default deny: no matching rule yields `Action::Deny`

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a permission rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Allow,
    Deny,
}

/// A caller's group or role membership, e.g. `("group", "admin")`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    /// How the membership was established (group, role, user, ...)
    pub method: String,
    pub value: String,
}

impl Principal {
    pub fn new(method: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            value: value.into(),
        }
    }

    /// Group membership principal
    pub fn group(value: impl Into<String>) -> Self {
        Self::new("group", value)
    }

    /// Role principal
    pub fn role(value: impl Into<String>) -> Self {
        Self::new("role", value)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.method, self.value)
    }
}

/// Allows or denies an access to callers holding a principal
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub action: Action,
    pub principal: Principal,
}

impl Permission {
    pub fn new(action: Action, principal: Principal) -> Self {
        Self { action, principal }
    }

    pub fn allow(principal: Principal) -> Self {
        Self::new(Action::Allow, principal)
    }

    pub fn deny(principal: Principal) -> Self {
        Self::new(Action::Deny, principal)
    }
}

/// Returns the action a caller holding `principals` may take on an access
/// guarded by `permissions`.
pub fn has_permission(principals: &[Principal], permissions: &[Permission]) -> Action {
    permissions
        .iter()
        .find(|permission| principals.contains(&permission.principal))
        .map(|permission| permission.action)
        .unwrap_or(Action::Deny)
}
