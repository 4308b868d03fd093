//! Seed schemas shared by the engine and API test suites.
//!
//! `leave_form_v1` mirrors the demo leave-request form that ships with the
//! form designer: a single `manager` approval, escalating to `hr` for
//! longer leaves, with a derived `totalCost` field.

use crate::schema::{
    Assignee, Calc, Edge, EdgeAction, Field, FieldType, FormSchema, FormStatus, GroupMode, Node,
    NodePolicy, Workflow,
};
use serde_json::json;
use std::collections::HashMap;

pub fn leave_form_v1() -> FormSchema {
    let fields = vec![
        Field::new("title", FieldType::Text, "Title").required(),
        Field::new("applicant", FieldType::Member, "Applicant").required(),
        Field::new("dept", FieldType::Department, "Department").required(),
        Field::new("leaveType", FieldType::Select, "Leave type")
            .with_options(vec!["annual", "personal", "sick"])
            .required(),
        Field::new("days", FieldType::Number, "Days").required(),
        Field::new("reason", FieldType::Textarea, "Reason").required(),
        Field::new("needAttachment", FieldType::Switch, "Needs supporting material"),
        Field::new("proof", FieldType::Attachment, "Supporting material")
            .visible_when(json!({"==": [{"var": "form.needAttachment"}, true]})),
        Field::new("items", FieldType::Subtable, "Itinerary")
            .with_max_rows(20)
            .with_columns(vec![
                Field::new("date", FieldType::Date, "Date").required(),
                Field::new("city", FieldType::Text, "City").required(),
                Field::new("cost", FieldType::Money, "Estimated cost").required(),
            ]),
        Field::new("totalCost", FieldType::Money, "Total cost").readonly(),
    ];

    let calculations = vec![Calc {
        target_field_id: "totalCost".into(),
        expr: "sum(items.cost)".into(),
    }];

    let nodes = vec![
        Node { id: "start".into(), name: "Submit".into() },
        Node { id: "manager".into(), name: "Manager approval".into() },
        Node { id: "hr".into(), name: "HR review".into() },
        Node { id: "end".into(), name: "Done".into() },
    ];

    let edges = vec![
        Edge {
            from: "start".into(),
            to: "manager".into(),
            on: EdgeAction::Submit,
            mode: GroupMode::Or,
            assignees: vec![Assignee::role("manager")],
            condition: None,
        },
        Edge {
            from: "manager".into(),
            to: "hr".into(),
            on: EdgeAction::Approve,
            mode: GroupMode::Or,
            assignees: vec![Assignee::role("hr")],
            condition: Some(json!({">": [{"var": "form.days"}, 3]})),
        },
        Edge {
            from: "manager".into(),
            to: "end".into(),
            on: EdgeAction::Approve,
            mode: GroupMode::Or,
            assignees: vec![],
            condition: Some(json!({"<=": [{"var": "form.days"}, 3]})),
        },
        Edge {
            from: "manager".into(),
            to: "start".into(),
            on: EdgeAction::Return,
            mode: GroupMode::Or,
            assignees: vec![Assignee::applicant()],
            condition: None,
        },
        Edge {
            from: "hr".into(),
            to: "end".into(),
            on: EdgeAction::Approve,
            mode: GroupMode::Or,
            assignees: vec![],
            condition: None,
        },
        Edge {
            from: "hr".into(),
            to: "start".into(),
            on: EdgeAction::Return,
            mode: GroupMode::Or,
            assignees: vec![Assignee::applicant()],
            condition: None,
        },
    ];

    let mut policies = HashMap::new();
    policies.insert(
        "start".to_string(),
        NodePolicy {
            visible: vec!["*".into()],
            editable: vec!["*".into()],
            required: vec![
                "title".into(),
                "applicant".into(),
                "dept".into(),
                "leaveType".into(),
                "days".into(),
                "reason".into(),
            ],
        },
    );
    policies.insert(
        "manager".to_string(),
        NodePolicy {
            visible: vec!["*".into()],
            editable: vec!["reason".into(), "items".into()],
            required: vec![],
        },
    );
    policies.insert(
        "hr".to_string(),
        NodePolicy {
            visible: vec!["*".into()],
            editable: vec!["proof".into()],
            required: vec!["proof".into()],
        },
    );

    FormSchema {
        id: "leave_form_v1".into(),
        name: "Leave request".into(),
        version: 1,
        status: FormStatus::Published,
        fields,
        workflow: Workflow { nodes, edges, policies },
        calculations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leave_form_is_valid() {
        leave_form_v1().validate().unwrap();
    }

    #[test]
    fn leave_form_has_expected_nodes() {
        let schema = leave_form_v1();
        let ids: Vec<&str> = schema.node_ids().collect();
        assert_eq!(ids, vec!["start", "manager", "hr", "end"]);
    }
}
