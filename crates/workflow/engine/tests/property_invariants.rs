//! Property-based checks for invariants that example-based tests only
//! spot-check: edge resolution determinism, vacuous-true conditions,
//! editability on empty patches, and task-group counter bounds.

use proptest::prelude::*;
use workflow_types::fixtures::leave_form_v1;
use workflow_types::{
    EdgeAction, GroupMode, GroupStatus, InstanceData, TaskGroup, TaskGroupId,
};

fn leave_data(days: f64) -> InstanceData {
    let mut data = InstanceData::new();
    data.insert("days".into(), serde_json::json!(days));
    data
}

fn group_with(mode: GroupMode, total: u32) -> TaskGroup {
    TaskGroup {
        id: TaskGroupId::generate(),
        instance_id: workflow_types::InstanceId::generate(),
        node_id: "manager".into(),
        mode,
        status: GroupStatus::Open,
        total_count: total,
        approved_count: 0,
        rejected_count: 0,
        created_at: chrono::Utc::now(),
        closed_at: None,
    }
}

proptest! {
    /// A null/missing condition is vacuously true no matter what form data
    /// looks like.
    #[test]
    fn eval_null_is_always_true(days in any::<f64>(), title in ".*") {
        let mut data = InstanceData::new();
        data.insert("days".into(), serde_json::json!(days));
        data.insert("title".into(), serde_json::json!(title));
        prop_assert!(workflow_expr::eval(&serde_json::Value::Null, &data).unwrap());
    }

    /// The manager-approve routing threshold (`days > 3` -> hr, else end) is
    /// a pure function of `days`: same input always resolves to the same
    /// edge, and the two conditioned edges partition every input exactly.
    #[test]
    fn manager_approve_edge_resolution_is_deterministic(days in -100.0f64..200.0) {
        let schema = leave_form_v1();
        let data = leave_data(days);

        let first = workflow_engine::resolver::resolve_edge(&schema, "manager", &EdgeAction::Approve, &data).unwrap();
        let second = workflow_engine::resolver::resolve_edge(&schema, "manager", &EdgeAction::Approve, &data).unwrap();
        prop_assert_eq!(first.as_ref().map(|e| e.to.clone()), second.as_ref().map(|e| e.to.clone()));

        let edge = first.expect("manager always has an approve edge for some days value");
        if days > 3.0 {
            prop_assert_eq!(edge.to, "hr");
        } else {
            prop_assert_eq!(edge.to, "end");
        }
    }

    /// An empty patch is always accepted by the editability check,
    /// regardless of node id (even one the schema has no policy for).
    #[test]
    fn enforce_editable_empty_patch_always_ok(node_id in "[a-z]{1,12}") {
        let schema = leave_form_v1();
        prop_assert!(workflow_engine::policy::enforce_editable(&schema, &node_id, &InstanceData::new()).is_ok());
    }

    /// Tallying approvals/rejections one at a time never pushes either
    /// counter total above the group's declared `total_count`, whichever
    /// mode the group runs in.
    #[test]
    fn tally_counters_never_exceed_total(
        total in 1u32..10,
        actions in prop::collection::vec(prop_oneof![Just(EdgeAction::Approve), Just(EdgeAction::Reject)], 0..20),
        and_mode in any::<bool>(),
    ) {
        let mode = if and_mode { GroupMode::And } else { GroupMode::Or };
        let mut group = group_with(mode, total);

        for action in actions.iter().take(total as usize) {
            workflow_engine::groups::tally(&mut group, action);
        }

        prop_assert!(group.approved_count + group.rejected_count <= total);
    }

    /// Typed ids round-trip through their string representation: building
    /// one from an arbitrary string and reading it back via `as_str`/
    /// `Display` always returns the original string.
    #[test]
    fn task_group_id_round_trips_through_string(raw in "[a-zA-Z0-9_-]{1,32}") {
        let id = TaskGroupId::new(raw.clone());
        prop_assert_eq!(id.as_str(), raw.as_str());
        prop_assert_eq!(id.to_string(), raw);
    }
}
