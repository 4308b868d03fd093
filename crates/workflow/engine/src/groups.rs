//! The task-group protocol: creates groups+tasks for a node, tallies
//! completions, and decides closure.

use chrono::{DateTime, Utc};
use workflow_types::{
    ActionTaken, Assignee, AssigneeType, Edge, EdgeAction, GroupMode, GroupStatus, Instance,
    TaskGroup, TaskGroupId, WorkflowError, WorkflowResult,
};
use workflow_types::{Task, TaskId};

/// Build the group and its pending tasks for entering `node_id` via
/// `edge`. `node_id == "end"` creates nothing (terminal). An edge with no
/// assignees is a schema authoring error, not a runtime one caught later.
pub fn build_node_tasks(
    instance: &Instance,
    node_id: &str,
    edge: &Edge,
) -> WorkflowResult<Option<(TaskGroup, Vec<Task>)>> {
    if node_id == "end" {
        return Ok(None);
    }
    if edge.assignees.is_empty() {
        return Err(WorkflowError::state(format!(
            "node {node_id} has no assignees"
        )));
    }

    let now = Utc::now();
    let group_id = TaskGroupId::generate();
    let total = edge.assignees.len() as u32;

    let group = TaskGroup {
        id: group_id.clone(),
        instance_id: instance.id.clone(),
        node_id: node_id.into(),
        mode: edge.mode.clone(),
        status: GroupStatus::Open,
        total_count: total,
        approved_count: 0,
        rejected_count: 0,
        created_at: now,
        closed_at: None,
    };

    let tasks = edge
        .assignees
        .iter()
        .map(|a| resolve_assignee_task(group_id.clone(), instance, node_id, a))
        .collect();

    Ok(Some((group, tasks)))
}

fn resolve_assignee_task(
    group_id: TaskGroupId,
    instance: &Instance,
    node_id: &str,
    assignee: &Assignee,
) -> Task {
    let (assignee_type, assignee_id) = match assignee.assignee_type {
        AssigneeType::Applicant => (AssigneeType::User, instance.applicant_user_id.to_string()),
        ref other => (other.clone(), assignee.id.clone()),
    };

    Task {
        id: TaskId::generate(),
        group_id,
        instance_id: instance.id.clone(),
        node_id: node_id.into(),
        status: workflow_types::TaskStatus::Pending,
        assignee_type,
        assignee_id,
        action_taken: None,
        actor_user_id: None,
        comment: None,
        created_at: Utc::now(),
        completed_at: None,
    }
}

/// Apply the counter update for `action` against an OPEN group's PENDING
/// task. `approve` increments `approvedCount`; `reject` increments
/// `rejectedCount`; `return` leaves counters unchanged.
pub fn tally(group: &mut TaskGroup, action: &EdgeAction) {
    match action {
        EdgeAction::Approve => group.approved_count += 1,
        EdgeAction::Reject => group.rejected_count += 1,
        EdgeAction::Return | EdgeAction::Submit => {}
    }
}

/// Whether the node's work is finished after this action, per the
/// completion rule: reject/return finish immediately; OR-mode approve
/// finishes immediately; AND-mode approve finishes once every assignee has
/// approved.
pub fn node_finished(group: &TaskGroup, action: &EdgeAction) -> bool {
    match action {
        EdgeAction::Reject | EdgeAction::Return => true,
        EdgeAction::Approve => match group.mode {
            GroupMode::Or => true,
            GroupMode::And => group.and_satisfied(),
        },
        EdgeAction::Submit => false,
    }
}

/// Close a group: set `status=Closed` and `closedAt=now`. Sibling PENDING
/// tasks are bulk-transitioned to DONE (`actionTaken=auto_closed`) by the
/// repository layer's `auto_close_group_tasks`, not by this pure helper.
pub fn close(group: &mut TaskGroup, now: DateTime<Utc>) {
    group.status = GroupStatus::Closed;
    group.closed_at = Some(now);
}

pub const AUTO_CLOSED: ActionTaken = ActionTaken::AutoClosed;

#[cfg(test)]
mod tests {
    use super::*;
    use workflow_types::{EdgeAction, FieldType, GroupMode, Instance, InstanceData, UserId};

    fn instance() -> Instance {
        Instance::new_draft("leave_form_v1", 1, UserId::new("u1"), InstanceData::new())
    }

    fn or_edge() -> Edge {
        Edge {
            from: "start".into(),
            to: "manager".into(),
            on: EdgeAction::Submit,
            mode: GroupMode::Or,
            assignees: vec![Assignee::role("manager")],
            condition: None,
        }
    }

    #[test]
    fn end_node_creates_nothing() {
        let inst = instance();
        let edge = or_edge();
        assert!(build_node_tasks(&inst, "end", &edge).unwrap().is_none());
    }

    #[test]
    fn edge_without_assignees_is_a_state_error() {
        let inst = instance();
        let mut edge = or_edge();
        edge.assignees.clear();
        assert!(build_node_tasks(&inst, "manager", &edge).unwrap_err().to_string().contains("no assignees"));
    }

    #[test]
    fn applicant_assignee_resolves_to_instance_applicant() {
        let inst = instance();
        let edge = Edge {
            from: "manager".into(),
            to: "start".into(),
            on: EdgeAction::Return,
            mode: GroupMode::Or,
            assignees: vec![Assignee::applicant()],
            condition: None,
        };
        let (_group, tasks) = build_node_tasks(&inst, "start", &edge).unwrap().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].assignee_type, AssigneeType::User);
        assert_eq!(tasks[0].assignee_id, "u1");
    }

    #[test]
    fn or_mode_finishes_on_first_approval() {
        let mut group = TaskGroup {
            id: TaskGroupId::generate(),
            instance_id: workflow_types::InstanceId::generate(),
            node_id: "manager".into(),
            mode: GroupMode::Or,
            status: GroupStatus::Open,
            total_count: 3,
            approved_count: 0,
            rejected_count: 0,
            created_at: Utc::now(),
            closed_at: None,
        };
        tally(&mut group, &EdgeAction::Approve);
        assert!(node_finished(&group, &EdgeAction::Approve));
    }

    #[test]
    fn and_mode_requires_every_approval() {
        let mut group = TaskGroup {
            id: TaskGroupId::generate(),
            instance_id: workflow_types::InstanceId::generate(),
            node_id: "manager".into(),
            mode: GroupMode::And,
            status: GroupStatus::Open,
            total_count: 2,
            approved_count: 0,
            rejected_count: 0,
            created_at: Utc::now(),
            closed_at: None,
        };
        tally(&mut group, &EdgeAction::Approve);
        assert!(!node_finished(&group, &EdgeAction::Approve));
        tally(&mut group, &EdgeAction::Approve);
        assert!(node_finished(&group, &EdgeAction::Approve));
    }

    #[test]
    fn reject_and_return_always_finish_immediately() {
        let group = TaskGroup {
            id: TaskGroupId::generate(),
            instance_id: workflow_types::InstanceId::generate(),
            node_id: "manager".into(),
            mode: GroupMode::And,
            status: GroupStatus::Open,
            total_count: 5,
            approved_count: 0,
            rejected_count: 0,
            created_at: Utc::now(),
            closed_at: None,
        };
        assert!(node_finished(&group, &EdgeAction::Reject));
        assert!(node_finished(&group, &EdgeAction::Return));
    }
}
