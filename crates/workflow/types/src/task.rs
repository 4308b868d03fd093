//! Task groups and tasks: the units of pending work routed to principals.

use crate::ids::{InstanceId, NodeId, TaskGroupId, TaskId, UserId};
use crate::schema::{AssigneeType, GroupMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupStatus {
    Open,
    Closed,
}

/// The collection of tasks generated when the workflow enters a
/// non-terminal node. Counters are monotone non-decreasing; the core
/// maintains `approvedCount + rejectedCount <= totalCount`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskGroup {
    pub id: TaskGroupId,
    pub instance_id: InstanceId,
    pub node_id: NodeId,
    pub mode: GroupMode,
    pub status: GroupStatus,
    pub total_count: u32,
    pub approved_count: u32,
    pub rejected_count: u32,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl TaskGroup {
    /// Whether an AND group has accumulated enough approvals to finish.
    pub fn and_satisfied(&self) -> bool {
        self.approved_count >= self.total_count
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Done,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionTaken {
    Approve,
    Reject,
    Return,
    Submit,
    AutoClosed,
}

/// A unit of pending work assigned to a principal (user/role/dept).
/// `assigneeType` is never `applicant`: that variant is resolved to a
/// concrete `user` at task-creation time.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub group_id: TaskGroupId,
    pub instance_id: InstanceId,
    pub node_id: NodeId,
    pub status: TaskStatus,
    pub assignee_type: AssigneeType,
    pub assignee_id: String,
    pub action_taken: Option<ActionTaken>,
    pub actor_user_id: Option<UserId>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new_pending(
        group_id: TaskGroupId,
        instance_id: InstanceId,
        node_id: NodeId,
        assignee_type: AssigneeType,
        assignee_id: impl Into<String>,
    ) -> Self {
        Self {
            id: TaskId::generate(),
            group_id,
            instance_id,
            node_id,
            status: TaskStatus::Pending,
            assignee_type,
            assignee_id: assignee_id.into(),
            action_taken: None,
            actor_user_id: None,
            comment: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(total: u32, approved: u32) -> TaskGroup {
        TaskGroup {
            id: TaskGroupId::generate(),
            instance_id: InstanceId::generate(),
            node_id: NodeId::new("manager"),
            mode: GroupMode::And,
            status: GroupStatus::Open,
            total_count: total,
            approved_count: approved,
            rejected_count: 0,
            created_at: Utc::now(),
            closed_at: None,
        }
    }

    #[test]
    fn and_satisfied_requires_all_approvals() {
        assert!(!group(3, 2).and_satisfied());
        assert!(group(3, 3).and_satisfied());
    }

    #[test]
    fn new_task_is_pending_with_no_action() {
        let t = Task::new_pending(
            TaskGroupId::generate(),
            InstanceId::generate(),
            NodeId::new("manager"),
            AssigneeType::Role,
            "manager",
        );
        assert!(t.is_pending());
        assert!(t.action_taken.is_none());
    }
}
