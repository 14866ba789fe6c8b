//! Desired-versus-actual reconciliation.
//!
//! Pure and transport-free: the output is the list of controller calls that
//! would bring `actual` to `desired`, in execution order.

use juju_access_core::{AccessGrant, AccessLevel, GrantState};
use serde::Serialize;
use std::fmt;

/// A single controller call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Grant {
        model: String,
        user: String,
        access: AccessLevel,
    },
    Revoke {
        model: String,
        user: String,
        access: AccessLevel,
    },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Grant {
                model,
                user,
                access,
            } => write!(f, "+ grant {access} on {model} to {user}"),
            Operation::Revoke {
                model,
                user,
                access,
            } => write!(f, "- revoke {access} on {model} from {user}"),
        }
    }
}

/// What happens to the resource as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    NoOp,
    Create,
    /// Only the user set changed.
    Update,
    /// `model` or `access` changed; the old grant is revoked first.
    Replace,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::NoOp => "no-op",
            Action::Create => "create",
            Action::Update => "update",
            Action::Replace => "replace",
            Action::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub action: Action,
    pub operations: Vec<Operation>,
}

impl Plan {
    pub fn is_noop(&self) -> bool {
        self.action == Action::NoOp
    }
}

/// Computes the plan that moves `actual` to `desired`.
///
/// `None` on either side means "no grant": a missing desired grant deletes,
/// a missing actual state creates.
pub fn diff(desired: Option<&AccessGrant>, actual: Option<&GrantState>) -> Plan {
    match (desired, actual) {
        (None, None) => Plan {
            action: Action::NoOp,
            operations: Vec::new(),
        },
        (Some(d), None) => Plan {
            action: Action::Create,
            operations: grants(&d.model, d.access, d.users.iter()),
        },
        (None, Some(a)) => Plan {
            action: Action::Delete,
            operations: revokes(&a.model, a.access, a.users.iter()),
        },
        (Some(d), Some(a)) if d.model != a.model || d.access != a.access => {
            let mut operations = revokes(&a.model, a.access, a.users.iter());
            operations.extend(grants(&d.model, d.access, d.users.iter()));
            Plan {
                action: Action::Replace,
                operations,
            }
        }
        (Some(d), Some(a)) => {
            let mut operations = grants(&d.model, d.access, d.users.difference(&a.users));
            operations.extend(revokes(&a.model, a.access, a.users.difference(&d.users)));
            let action = if operations.is_empty() {
                Action::NoOp
            } else {
                Action::Update
            };
            Plan { action, operations }
        }
    }
}

fn grants<'a>(
    model: &str,
    access: AccessLevel,
    users: impl Iterator<Item = &'a String>,
) -> Vec<Operation> {
    users
        .map(|user| Operation::Grant {
            model: model.to_string(),
            user: user.clone(),
            access,
        })
        .collect()
}

fn revokes<'a>(
    model: &str,
    access: AccessLevel,
    users: impl Iterator<Item = &'a String>,
) -> Vec<Operation> {
    users
        .map(|user| Operation::Revoke {
            model: model.to_string(),
            user: user.clone(),
            access,
        })
        .collect()
}
