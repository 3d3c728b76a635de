//! Permission Evaluation Tests
//!
//! Rules are scanned in declaration order and the first rule whose
//! principal the caller holds decides. Nothing matching means deny.

use gatehouse::{has_permission, Action, Permission, Principal};

// =============================================================================
// FIRST MATCH WINS
// =============================================================================

/// Test: A deny declared before an allow for the same principal denies.
#[test]
fn test_deny_before_allow_denies() {
    let p1 = Principal::group("p1");
    let rules = vec![Permission::deny(p1.clone()), Permission::allow(p1.clone())];

    assert_eq!(has_permission(&[p1], &rules), Action::Deny);
}

/// Test: Reordering the same rules flips the outcome.
#[test]
fn test_order_is_significant() {
    let p1 = Principal::group("p1");
    let rules = vec![Permission::allow(p1.clone()), Permission::deny(p1.clone())];

    assert_eq!(has_permission(&[p1], &rules), Action::Allow);
}

/// Test: Rules for principals the caller lacks are skipped.
#[test]
fn test_non_matching_rules_skipped() {
    let rules = vec![
        Permission::deny(Principal::group("banned")),
        Permission::allow(Principal::role("editor")),
    ];
    let caller = [Principal::group("user"), Principal::role("editor")];

    assert_eq!(has_permission(&caller, &rules), Action::Allow);
}

/// Test: Principal method is part of the match, not just the value.
#[test]
fn test_method_must_match() {
    let rules = vec![Permission::allow(Principal::role("admin"))];

    assert_eq!(has_permission(&[Principal::group("admin")], &rules), Action::Deny);
}

// =============================================================================
// DEFAULT DENY
// =============================================================================

/// Test: An empty rule list denies every caller.
#[test]
fn test_empty_rules_deny() {
    let caller = [Principal::group("user"), Principal::role("admin")];

    assert_eq!(has_permission(&caller, &[]), Action::Deny);
}

/// Test: A caller with no principals is denied.
#[test]
fn test_anonymous_caller_denied() {
    let rules = vec![Permission::allow(Principal::group("user"))];

    assert_eq!(has_permission(&[], &rules), Action::Deny);
}
