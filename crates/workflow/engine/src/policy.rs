//! The policy engine: visibility/editability/required enforcement.
//!
//! Visibility is advisory for rendering and is not enforced here; only
//! `editable` and `required` are checked against a node's policy.

use workflow_types::{FormSchema, InstanceData, WorkflowError, WorkflowResult};

/// Reject a patch containing a key outside the node's `editable` set (or a
/// calculated field id, which is never user-editable). An empty patch is
/// always accepted, and a node with no policy at all rejects any patch.
pub fn enforce_editable(
    schema: &FormSchema,
    node_id: &str,
    patch: &InstanceData,
) -> WorkflowResult<()> {
    if patch.is_empty() {
        return Ok(());
    }

    let policy = schema.get_policy(node_id).ok_or_else(|| {
        WorkflowError::state(format!("no policy for node {node_id}"))
    })?;

    for key in patch.keys() {
        if schema.calculations.iter().any(|c| &c.target_field_id == key) {
            return Err(WorkflowError::validation(format!(
                "field not editable at node {node_id}: {key}"
            )));
        }
        if !policy.allows_edit(key) {
            return Err(WorkflowError::validation(format!(
                "field not editable at node {node_id}: {key}"
            )));
        }
    }
    Ok(())
}

/// Every id in the node's `required` set must be present, non-null, and
/// (if a string) non-empty. Fails on the first missing field.
pub fn validate_required(
    schema: &FormSchema,
    node_id: &str,
    data: &InstanceData,
) -> WorkflowResult<()> {
    let Some(policy) = schema.get_policy(node_id) else {
        return Ok(());
    };

    for field_id in &policy.required {
        let present = match data.get(field_id) {
            None => false,
            Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        };
        if !present {
            return Err(WorkflowError::validation(format!(
                "missing required field: {field_id}"
            )));
        }
    }
    Ok(())
}
