//! Human-readable plan and state rendering.

use crate::diff::{Action, Plan};
use juju_access_core::GrantState;

const RESOURCE: &str = "juju_access_model";

/// Renders a plan the way `terraform plan` summarizes one resource.
pub fn render_plan(name: &str, plan: &Plan) -> String {
    let mut out = String::new();

    let verb = match plan.action {
        Action::NoOp => {
            out.push_str(&format!(
                "{RESOURCE}.{name}: no changes. Controller matches the configuration.\n"
            ));
            return out;
        }
        Action::Create => "will be created",
        Action::Update => "will be updated in-place",
        Action::Replace => "must be replaced",
        Action::Delete => "will be destroyed",
    };

    out.push_str(&format!("  # {RESOURCE}.{name} {verb}\n"));
    for op in &plan.operations {
        out.push_str(&format!("    {op}\n"));
    }

    let (grants, revokes) = plan.operations.iter().fold((0, 0), |(g, r), op| match op {
        crate::diff::Operation::Grant { .. } => (g + 1, r),
        crate::diff::Operation::Revoke { .. } => (g, r + 1),
    });
    out.push_str(&format!(
        "\nPlan: {} to grant, {} to revoke.\n",
        grants, revokes
    ));
    out
}

/// Renders the attributes of a managed grant, as `terraform state show` does.
pub fn render_state(name: &str, state: &GrantState) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {RESOURCE}.{name}:\n"));
    out.push_str(&format!("resource \"{RESOURCE}\" \"{name}\" {{\n"));
    out.push_str(&format!("    access = \"{}\"\n", state.access));
    out.push_str(&format!("    id     = \"{}\"\n", state.id));
    out.push_str(&format!("    model  = \"{}\"\n", state.model));
    out.push_str("    users  = [\n");
    for user in &state.users {
        out.push_str(&format!("        \"{user}\",\n"));
    }
    out.push_str("    ]\n}\n");
    out
}
