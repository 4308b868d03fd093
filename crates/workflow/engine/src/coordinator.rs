//! The transition coordinator: one entry point per user action. Each
//! validates, patches, routes, and writes, end to end.
//!
//! Every entry point opens one `UnitOfWork`, does all of its reads and
//! writes through that single handle, and commits once at the end. A
//! failure anywhere in between drops the handle uncommitted, so the
//! backing store (a `sqlx::Transaction` for `PostgresStore`) rolls back
//! and no partial update becomes visible.

use crate::repository::{TransactionalStore, UnitOfWork};
use crate::{groups, policy, resolver};
use chrono::Utc;
use std::sync::Arc;
use workflow_types::{
    ActionTaken, AssigneeType, EdgeAction, Instance, InstanceData, InstanceStatus, NodeId, Task,
    UserId, WorkflowError, WorkflowResult,
};

pub struct Coordinator {
    store: Arc<dyn TransactionalStore>,
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub instance_id: String,
    pub next_node: NodeId,
}

#[derive(Debug, Clone)]
pub struct ActOutcome {
    pub instance_id: String,
    pub instance_status: InstanceStatus,
    pub current_node: NodeId,
}

impl Coordinator {
    pub fn new(store: Arc<dyn TransactionalStore>) -> Self {
        Self { store }
    }

    fn check_applicant_editable(&self, instance: &Instance, user_id: &UserId) -> WorkflowResult<()> {
        if &instance.applicant_user_id != user_id {
            return Err(WorkflowError::authz("only the applicant may edit this instance"));
        }
        if instance.current_node.as_str() != "start" {
            return Err(WorkflowError::state("instance is not at the start node"));
        }
        if !matches!(instance.status, InstanceStatus::Draft | InstanceStatus::Running) {
            return Err(WorkflowError::state("instance not editable at current status"));
        }
        Ok(())
    }

    /// Applicant typing at `start`: enforce editability, merge, recompute
    /// calculated fields, persist. No routing.
    pub async fn update_data(
        &self,
        instance_id: &str,
        user_id: &UserId,
        patch: InstanceData,
    ) -> WorkflowResult<()> {
        let mut uow = self.store.clone().begin().await?;

        let instance = uow.load_instance(instance_id).await?;
        self.check_applicant_editable(&instance, user_id)?;

        let schema = uow.get_schema_version(&instance.form_id, instance.form_version).await?;
        policy::enforce_editable(&schema, "start", &patch)?;

        let mut data = instance.data.clone();
        data.extend(patch);
        workflow_expr::calc::recompute(&schema.calculations, &mut data)?;

        let now = Utc::now();
        uow.update_instance(instance_id, instance.status, instance.current_node.clone(), data, now)
            .await?;
        uow.commit().await?;

        tracing::info!(instance_id, "instance data updated");
        Ok(())
    }

    /// Applicant at `start`: validate, resolve the submit edge, transition
    /// to RUNNING, and create tasks at the next node.
    pub async fn submit(&self, instance_id: &str, user_id: &UserId) -> WorkflowResult<SubmitOutcome> {
        let mut uow = self.store.clone().begin().await?;

        let instance = uow.load_instance(instance_id).await?;
        self.check_applicant_editable(&instance, user_id)?;

        let schema = uow.get_schema_version(&instance.form_id, instance.form_version).await?;
        policy::validate_required(&schema, "start", &instance.data)?;

        let edge = resolver::resolve_edge(&schema, "start", &EdgeAction::Submit, &instance.data)?
            .ok_or_else(|| WorkflowError::state("no submit edge"))?;

        let now = Utc::now();
        let next_node: NodeId = edge.to.clone().into();
        uow.update_instance(instance_id, InstanceStatus::Running, next_node.clone(), instance.data.clone(), now)
            .await?;

        if let Some((group, tasks)) = groups::build_node_tasks(&instance, &edge.to, &edge)? {
            uow.insert_group(group).await?;
            for t in tasks {
                uow.insert_task(t).await?;
            }
        }

        uow.commit().await?;
        tracing::info!(instance_id, next_node = %next_node, "instance submitted");
        Ok(SubmitOutcome { instance_id: instance_id.to_string(), next_node })
    }

    async fn user_matches_assignee(
        uow: &mut dyn UnitOfWork,
        user_id: &UserId,
        task: &Task,
    ) -> WorkflowResult<bool> {
        match &task.assignee_type {
            AssigneeType::User => Ok(user_id.as_str() == task.assignee_id.as_str()),
            AssigneeType::Role => uow.user_in_role(user_id, &task.assignee_id).await,
            AssigneeType::Dept => uow.user_in_dept(user_id, &task.assignee_id).await,
            AssigneeType::Applicant => Ok(false),
        }
    }

    /// Approver at the current node: apply a patch, validate, resolve the
    /// edge for `action`, tally the task group, and compute the instance's
    /// next status/node.
    pub async fn act_on_task(
        &self,
        task_id: &str,
        user_id: &UserId,
        action: EdgeAction,
        comment: Option<String>,
        patch: InstanceData,
    ) -> WorkflowResult<ActOutcome> {
        if action == EdgeAction::Submit {
            return Err(WorkflowError::InputError(
                "action must be one of approve, reject, return".into(),
            ));
        }

        let mut uow = self.store.clone().begin().await?;

        let task = uow.load_task(task_id).await?;
        if !task.is_pending() {
            return Err(WorkflowError::state("task not pending"));
        }

        if !Self::user_matches_assignee(uow.as_mut(), user_id, &task).await? {
            return Err(WorkflowError::authz("user is not allowed to act on this task"));
        }

        let instance = uow.load_instance(task.instance_id.as_str()).await?;
        if instance.status != InstanceStatus::Running || instance.current_node != task.node_id {
            return Err(WorkflowError::state("instance/task node mismatch"));
        }

        let schema = uow.get_schema_version(&instance.form_id, instance.form_version).await?;
        policy::enforce_editable(&schema, task.node_id.as_str(), &patch)?;

        let mut data = instance.data.clone();
        data.extend(patch);
        workflow_expr::calc::recompute(&schema.calculations, &mut data)?;
        policy::validate_required(&schema, task.node_id.as_str(), &data)?;

        let edge = resolver::resolve_edge_with_reject_fallback(
            &schema,
            task.node_id.as_str(),
            &action,
            &data,
        )?
        .ok_or_else(|| WorkflowError::state("no edge for action"))?;

        let mut group = uow.load_group(&task.group_id).await?;
        groups::tally(&mut group, &action);

        let now = Utc::now();
        let action_taken = match &action {
            EdgeAction::Approve => ActionTaken::Approve,
            EdgeAction::Reject => ActionTaken::Reject,
            EdgeAction::Return => ActionTaken::Return,
            EdgeAction::Submit => unreachable!("rejected above"),
        };
        uow.update_task_done(&task.id, action_taken, user_id.clone(), comment, now).await?;
        uow.update_group_counters(&group.id, group.approved_count, group.rejected_count).await?;

        let finished = groups::node_finished(&group, &action);

        let (next_status, next_node, create_tasks_at) = match &action {
            EdgeAction::Reject => (InstanceStatus::Rejected, NodeId::new("end"), None),
            EdgeAction::Return => (InstanceStatus::Running, NodeId::new(edge.to.clone()), None),
            EdgeAction::Approve if finished && edge.to == "end" => {
                (InstanceStatus::Approved, NodeId::new("end"), None)
            }
            EdgeAction::Approve if finished => (
                InstanceStatus::Running,
                NodeId::new(edge.to.clone()),
                Some(edge.to.clone()),
            ),
            EdgeAction::Approve => (instance.status.clone(), instance.current_node.clone(), None),
            EdgeAction::Submit => unreachable!("rejected above"),
        };

        if finished {
            groups::close(&mut group, now);
            uow.close_group(&group.id, now).await?;
            uow.auto_close_group_tasks(&group.id, now).await?;
        }

        uow.update_instance(task.instance_id.as_str(), next_status.clone(), next_node.clone(), data, now)
            .await?;

        if let Some(target_node) = create_tasks_at {
            if let Some((new_group, new_tasks)) = groups::build_node_tasks(&instance, &target_node, &edge)? {
                uow.insert_group(new_group).await?;
                for t in new_tasks {
                    uow.insert_task(t).await?;
                }
            }
        }

        uow.commit().await?;

        tracing::info!(
            task_id,
            instance_id = task.instance_id.as_str(),
            next_status = ?next_status,
            next_node = %next_node,
            "task actioned"
        );

        Ok(ActOutcome {
            instance_id: task.instance_id.to_string(),
            instance_status: next_status,
            current_node: next_node,
        })
    }
}
