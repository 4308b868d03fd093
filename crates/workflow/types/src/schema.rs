//! The form schema: fields bound to a directed approval graph.
//!
//! A `FormSchema` is immutable once stored at a given version. Operators
//! author new drafts and publish them; instances bind to whichever version
//! was published when they were created.

use crate::ids::NodeId;
use crate::{WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormStatus {
    Draft,
    Published,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Textarea,
    Number,
    Money,
    Date,
    Select,
    Switch,
    Member,
    Department,
    Attachment,
    Subtable,
}

/// One field of a form. `visibleWhen` is advisory for rendering and is not
/// enforced by the core (see `engine::policy`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_when: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<Field>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rows: Option<u32>,
}

impl Field {
    pub fn new(id: impl Into<String>, field_type: FieldType, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            field_type,
            label: label.into(),
            required: false,
            readonly: false,
            visible_when: None,
            options: None,
            columns: None,
            max_rows: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn with_options(mut self, options: Vec<&str>) -> Self {
        self.options = Some(options.into_iter().map(String::from).collect());
        self
    }

    pub fn with_columns(mut self, columns: Vec<Field>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn with_max_rows(mut self, max_rows: u32) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    pub fn visible_when(mut self, expr: Value) -> Self {
        self.visible_when = Some(expr);
        self
    }
}

/// A derived-field rule: `targetFieldId` is recomputed from `expr`
/// whenever instance data changes. See `engine::calc`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calc {
    pub target_field_id: String,
    pub expr: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeAction {
    Submit,
    Approve,
    Reject,
    Return,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupMode {
    And,
    Or,
}

impl Default for GroupMode {
    fn default() -> Self {
        Self::Or
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssigneeType {
    User,
    Role,
    Dept,
    Applicant,
}

/// An assignee on an edge. `id` is ignored when `assignee_type = Applicant`;
/// it is substituted with the instance's applicant at task-creation time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignee {
    #[serde(rename = "type")]
    pub assignee_type: AssigneeType,
    #[serde(default)]
    pub id: String,
}

impl Assignee {
    pub fn user(id: impl Into<String>) -> Self {
        Self { assignee_type: AssigneeType::User, id: id.into() }
    }

    pub fn role(id: impl Into<String>) -> Self {
        Self { assignee_type: AssigneeType::Role, id: id.into() }
    }

    pub fn dept(id: impl Into<String>) -> Self {
        Self { assignee_type: AssigneeType::Dept, id: id.into() }
    }

    pub fn applicant() -> Self {
        Self { assignee_type: AssigneeType::Applicant, id: String::new() }
    }
}

/// A directed transition for a specific user action, optionally guarded by
/// an expression. Edges are ordered; resolution picks the first match.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub on: EdgeAction,
    #[serde(default)]
    pub mode: GroupMode,
    #[serde(default)]
    pub assignees: Vec<Assignee>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
}

impl Edge {
    /// The synthetic terminal edge substituted when a node has no authored
    /// `reject` edge. Not persisted; constructed on demand by the resolver.
    pub fn synthetic_reject(node: impl Into<String>) -> Self {
        Self {
            from: node.into(),
            to: "end".to_string(),
            on: EdgeAction::Reject,
            mode: GroupMode::Or,
            assignees: Vec::new(),
            condition: None,
        }
    }
}

/// Per-node declaration of which fields are visible/editable/required.
/// Each set is either a list of field ids or the wildcard `"*"`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePolicy {
    #[serde(default)]
    pub visible: Vec<String>,
    #[serde(default)]
    pub editable: Vec<String>,
    #[serde(default)]
    pub required: Vec<String>,
}

const WILDCARD: &str = "*";

impl NodePolicy {
    pub fn allows_edit(&self, field_id: &str) -> bool {
        self.editable.iter().any(|x| x == WILDCARD || x == field_id)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Workflow {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub policies: HashMap<String, NodePolicy>,
}

impl Workflow {
    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn outgoing_edges<'a>(&'a self, from: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.from == from)
    }
}

/// A versioned, immutable-once-stored form: fields plus the workflow graph
/// that routes instances of it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    pub id: String,
    pub name: String,
    pub version: u32,
    #[serde(default = "default_status")]
    pub status: FormStatus,
    pub fields: Vec<Field>,
    pub workflow: Workflow,
    #[serde(default)]
    pub calculations: Vec<Calc>,
}

fn default_status() -> FormStatus {
    FormStatus::Draft
}

impl FormSchema {
    pub fn get_field(&self, id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn get_policy(&self, node_id: &str) -> Option<&NodePolicy> {
        self.workflow.policies.get(node_id)
    }

    /// Structural validation run at save-time: every edge must reference an
    /// existing node, node ids are unique, `start` and `end` both exist, and
    /// every `return` edge names an explicit `to` (a `return` with no
    /// destination is ambiguous about where the applicant lands).
    pub fn validate(&self) -> WorkflowResult<()> {
        if self.id.is_empty() {
            return Err(WorkflowError::validation("form id required"));
        }
        if self.workflow.nodes.is_empty() {
            return Err(WorkflowError::validation("workflow has no nodes"));
        }

        let mut seen = std::collections::HashSet::new();
        for n in &self.workflow.nodes {
            if !seen.insert(n.id.as_str()) {
                return Err(WorkflowError::validation(format!("duplicate node id: {}", n.id)));
            }
        }
        if !seen.contains(crate::ids::start_node().as_str()) {
            return Err(WorkflowError::validation("workflow missing start node"));
        }
        if !seen.contains(crate::ids::end_node().as_str()) {
            return Err(WorkflowError::validation("workflow missing end node"));
        }

        for e in &self.workflow.edges {
            if !seen.contains(e.from.as_str()) {
                return Err(WorkflowError::validation(format!(
                    "edge references unknown source node: {}",
                    e.from
                )));
            }
            if !seen.contains(e.to.as_str()) {
                return Err(WorkflowError::validation(format!(
                    "edge references unknown target node: {}",
                    e.to
                )));
            }
            if e.on == EdgeAction::Return && e.to.is_empty() {
                return Err(WorkflowError::validation(
                    "return edge must name an explicit `to`",
                ));
            }
        }

        for calc in &self.calculations {
            if !calc.expr.starts_with("sum(") || !calc.expr.ends_with(')') {
                return Err(WorkflowError::validation(format!(
                    "unsupported calc expr: {}",
                    calc.expr
                )));
            }
        }

        Ok(())
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.workflow.nodes.iter().map(|n| n.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::leave_form_v1;

    #[test]
    fn leave_form_validates() {
        leave_form_v1().validate().unwrap();
    }

    #[test]
    fn missing_start_node_fails() {
        let mut schema = leave_form_v1();
        schema.workflow.nodes.retain(|n| n.id != "start");
        let err = schema.validate().unwrap_err();
        assert!(matches!(err, WorkflowError::ValidationError(_)));
    }

    #[test]
    fn duplicate_node_id_fails() {
        let mut schema = leave_form_v1();
        let dup = schema.workflow.nodes[0].clone();
        schema.workflow.nodes.push(dup);
        assert!(schema.validate().is_err());
    }

    #[test]
    fn edge_to_unknown_node_fails() {
        let mut schema = leave_form_v1();
        schema.workflow.edges.push(Edge {
            from: "start".into(),
            to: "nowhere".into(),
            on: EdgeAction::Submit,
            mode: GroupMode::Or,
            assignees: vec![],
            condition: None,
        });
        assert!(schema.validate().is_err());
    }

    #[test]
    fn return_edge_without_to_fails() {
        let mut schema = leave_form_v1();
        schema.workflow.edges.push(Edge {
            from: "manager".into(),
            to: "".into(),
            on: EdgeAction::Return,
            mode: GroupMode::Or,
            assignees: vec![],
            condition: None,
        });
        assert!(schema.validate().is_err());
    }

    #[test]
    fn node_policy_wildcard_allows_any_field() {
        let policy = NodePolicy { visible: vec!["*".into()], editable: vec!["*".into()], required: vec![] };
        assert!(policy.allows_edit("anything"));
    }

    #[test]
    fn node_policy_explicit_list_is_exact() {
        let policy = NodePolicy {
            visible: vec![],
            editable: vec!["proof".into()],
            required: vec![],
        };
        assert!(policy.allows_edit("proof"));
        assert!(!policy.allows_edit("reason"));
    }
}
