//! The six end-to-end scenarios: one leave-request instance driven
//! through `Coordinator` against a seeded `MemoryStore`.

use serde_json::json;
use std::sync::Arc;
use workflow_engine::{Coordinator, InstanceRepository, TaskRepository};
use workflow_store::MemoryStore;
use workflow_types::fixtures::leave_form_v1;
use workflow_types::{EdgeAction, Instance, InstanceData, InstanceStatus, UserId};

fn setup() -> (Arc<MemoryStore>, Coordinator) {
    let store = Arc::new(MemoryStore::new());
    store.seed_schema(leave_form_v1()).unwrap();
    store.seed_user_role(UserId::new("u3"), "manager").unwrap();
    store.seed_user_role(UserId::new("u2"), "hr").unwrap();

    let coordinator = Coordinator::new(store.clone());
    (store, coordinator)
}

fn leave_data(days: f64) -> InstanceData {
    let mut data = InstanceData::new();
    data.insert("title".into(), json!("L"));
    data.insert("applicant".into(), json!("u1"));
    data.insert("dept".into(), json!("d1"));
    data.insert("leaveType".into(), json!("annual"));
    data.insert("days".into(), json!(days));
    data.insert("reason".into(), json!("r"));
    data
}

async fn create_and_submit(
    store: &Arc<MemoryStore>,
    coordinator: &Coordinator,
    days: f64,
) -> String {
    let instance = Instance::new_draft("leave_form_v1", 1, UserId::new("u1"), leave_data(days));
    let id = instance.id.to_string();
    store.create_draft(instance).await.unwrap();
    coordinator.submit(&id, &UserId::new("u1")).await.unwrap();
    id
}

#[tokio::test]
async fn scenario_1_two_days_approved_by_manager() {
    let (store, coordinator) = setup();
    let id = create_and_submit(&store, &coordinator, 2.0).await;

    let instance = store.load(&id).await.unwrap();
    assert_eq!(instance.current_node.as_str(), "manager");

    let inbox = store.list_inbox(&UserId::new("u3")).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].node_id.as_str(), "manager");

    let outcome = coordinator
        .act_on_task(inbox[0].id.as_str(), &UserId::new("u3"), EdgeAction::Approve, None, InstanceData::new())
        .await
        .unwrap();

    assert_eq!(outcome.instance_status, InstanceStatus::Approved);
    assert_eq!(outcome.current_node.as_str(), "end");

    let group = store.load_group(&inbox[0].group_id).await.unwrap();
    assert_eq!(group.status, workflow_types::GroupStatus::Closed);
}

#[tokio::test]
async fn scenario_2_five_days_routes_to_hr() {
    let (store, coordinator) = setup();
    let id = create_and_submit(&store, &coordinator, 5.0).await;

    let manager_inbox = store.list_inbox(&UserId::new("u3")).await.unwrap();
    let outcome = coordinator
        .act_on_task(
            manager_inbox[0].id.as_str(),
            &UserId::new("u3"),
            EdgeAction::Approve,
            None,
            InstanceData::new(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.current_node.as_str(), "hr");
    assert_eq!(outcome.instance_status, InstanceStatus::Running);

    let hr_inbox = store.list_inbox(&UserId::new("u2")).await.unwrap();
    assert_eq!(hr_inbox.len(), 1);
    assert_eq!(hr_inbox[0].node_id.as_str(), "hr");

    let outcome = coordinator
        .act_on_task(hr_inbox[0].id.as_str(), &UserId::new("u2"), EdgeAction::Approve, None, InstanceData::new())
        .await
        .unwrap();
    assert_eq!(outcome.instance_status, InstanceStatus::Approved);
    assert_eq!(outcome.current_node.as_str(), "end");

    let _ = id;
}

#[tokio::test]
async fn scenario_3_manager_returns_to_applicant() {
    let (store, coordinator) = setup();
    let id = create_and_submit(&store, &coordinator, 2.0).await;

    let manager_inbox = store.list_inbox(&UserId::new("u3")).await.unwrap();
    let manager_group_id = manager_inbox[0].group_id.clone();

    let outcome = coordinator
        .act_on_task(
            manager_inbox[0].id.as_str(),
            &UserId::new("u3"),
            EdgeAction::Return,
            Some("please clarify".into()),
            InstanceData::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.instance_status, InstanceStatus::Running);
    assert_eq!(outcome.current_node.as_str(), "start");

    let old_group = store.load_group(&manager_group_id).await.unwrap();
    assert_eq!(old_group.status, workflow_types::GroupStatus::Closed);

    let applicant_inbox = store.list_inbox(&UserId::new("u1")).await.unwrap();
    assert_eq!(applicant_inbox.len(), 1);
    assert_eq!(applicant_inbox[0].node_id.as_str(), "start");

    coordinator.submit(&id, &UserId::new("u1")).await.unwrap();
    let instance = store.load(&id).await.unwrap();
    assert_eq!(instance.current_node.as_str(), "manager");
}

#[tokio::test]
async fn scenario_4_reject_without_explicit_edge_terminates() {
    let (store, coordinator) = setup();
    let _id = create_and_submit(&store, &coordinator, 2.0).await;

    let manager_inbox = store.list_inbox(&UserId::new("u3")).await.unwrap();
    let outcome = coordinator
        .act_on_task(manager_inbox[0].id.as_str(), &UserId::new("u3"), EdgeAction::Reject, None, InstanceData::new())
        .await
        .unwrap();

    assert_eq!(outcome.instance_status, InstanceStatus::Rejected);
    assert_eq!(outcome.current_node.as_str(), "end");

    let group = store.load_group(&manager_inbox[0].group_id).await.unwrap();
    assert_eq!(group.status, workflow_types::GroupStatus::Closed);
}

#[tokio::test]
async fn scenario_5_missing_required_field_blocks_submit() {
    let (store, coordinator) = setup();
    let mut data = leave_data(2.0);
    data.remove("reason");

    let instance = Instance::new_draft("leave_form_v1", 1, UserId::new("u1"), data);
    let id = instance.id.to_string();
    store.create_draft(instance).await.unwrap();

    let err = coordinator.submit(&id, &UserId::new("u1")).await.unwrap_err();
    assert_eq!(err.to_string(), "validation failed: missing required field: reason");

    let reloaded = store.load(&id).await.unwrap();
    assert_eq!(reloaded.status, InstanceStatus::Draft);
    assert_eq!(reloaded.current_node.as_str(), "start");
}

#[tokio::test]
async fn scenario_6_hr_editability_is_enforced() {
    let (store, coordinator) = setup();
    let id = create_and_submit(&store, &coordinator, 5.0).await;

    let manager_inbox = store.list_inbox(&UserId::new("u3")).await.unwrap();
    coordinator
        .act_on_task(manager_inbox[0].id.as_str(), &UserId::new("u3"), EdgeAction::Approve, None, InstanceData::new())
        .await
        .unwrap();

    let hr_inbox = store.list_inbox(&UserId::new("u2")).await.unwrap();

    let mut bad_patch = InstanceData::new();
    bad_patch.insert("reason".into(), json!("x"));
    let err = coordinator
        .act_on_task(hr_inbox[0].id.as_str(), &UserId::new("u2"), EdgeAction::Approve, None, bad_patch)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not editable"));

    let mut good_patch = InstanceData::new();
    good_patch.insert("proof".into(), json!("file://receipt.pdf"));
    let outcome = coordinator
        .act_on_task(hr_inbox[0].id.as_str(), &UserId::new("u2"), EdgeAction::Approve, None, good_patch)
        .await
        .unwrap();
    assert_eq!(outcome.instance_status, InstanceStatus::Approved);

    let _ = id;
}
