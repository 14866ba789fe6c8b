//! Machine-readable plan output.
//!
//! Two row schemas:
//! - [`PlanRow`]: one per planned resource
//! - [`OperationRow`]: one per controller call, denormalized
//!
//! Written as NDJSON by [`json_stream::JsonStreamSink`].

pub mod json_stream;

use crate::diff::{Operation, Plan};
use juju_access_core::AccessLevel;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Serializable row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PlanRow {
    pub resource: String,
    pub id: String,
    pub action: &'static str,
    pub grants: u32,
    pub revokes: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationRow {
    pub resource: String,
    pub op: &'static str,
    pub model: String,
    pub user: String,
    pub access: AccessLevel,
}

// ---------------------------------------------------------------------------
// Builder: Plan → Rows
// ---------------------------------------------------------------------------

impl Plan {
    /// Flatten the plan into sink-ready rows. `id` is the desired grant's id.
    pub fn to_rows(&self, resource: &str, id: &str) -> (PlanRow, Vec<OperationRow>) {
        let mut summary = PlanRow {
            resource: resource.to_string(),
            id: id.to_string(),
            action: self.action.as_str(),
            grants: 0,
            revokes: 0,
        };

        let operations = self
            .operations
            .iter()
            .map(|op| {
                let (kind, model, user, access) = match op {
                    Operation::Grant {
                        model,
                        user,
                        access,
                    } => {
                        summary.grants += 1;
                        ("grant", model, user, access)
                    }
                    Operation::Revoke {
                        model,
                        user,
                        access,
                    } => {
                        summary.revokes += 1;
                        ("revoke", model, user, access)
                    }
                };
                OperationRow {
                    resource: resource.to_string(),
                    op: kind,
                    model: model.clone(),
                    user: user.clone(),
                    access: *access,
                }
            })
            .collect();

        (summary, operations)
    }
}
