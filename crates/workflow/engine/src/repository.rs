//! Repository adapters: the sole point that understands durable encoding.
//! Every other component sees parsed structures, never blobs.
//!
//! One `async_trait` per concern, mirroring the composition style of a
//! workflow orchestrator over its store. Two implementations live in
//! `workflow-store`: a `sqlx`/Postgres adapter and an in-memory adapter
//! used by this crate's own tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use workflow_types::{
    FormSchema, Instance, InstanceData, InstanceStatus, NodeId, TaskGroup, TaskGroupId, TaskId,
    UserId, WorkflowResult,
};
use workflow_types::{ActionTaken, Task};

/// Status filter for listing an applicant's instances. `Done` is a
/// pseudo-status standing for "approved or rejected" at the query layer;
/// it has no matching `InstanceStatus` variant because no instance row
/// is ever persisted with that value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusFilter {
    Draft,
    Running,
    Done,
}

#[async_trait]
pub trait SchemaRepository: Send + Sync {
    async fn list_published(&self) -> WorkflowResult<Vec<FormSchema>>;
    async fn get_published(&self, form_id: &str) -> WorkflowResult<FormSchema>;
    async fn get_version(&self, form_id: &str, version: u32) -> WorkflowResult<FormSchema>;
    /// Insert a new draft at `version = maxVersion(id)+1`, returning the
    /// assigned version.
    async fn save_draft(&self, schema: FormSchema) -> WorkflowResult<FormSchema>;
    /// Flip the highest-version row for `form_id` to `published`.
    async fn publish(&self, form_id: &str) -> WorkflowResult<()>;
}

#[async_trait]
pub trait InstanceRepository: Send + Sync {
    async fn load(&self, id: &str) -> WorkflowResult<Instance>;
    async fn list_for_applicant(
        &self,
        user_id: &UserId,
        status: Option<StatusFilter>,
    ) -> WorkflowResult<Vec<Instance>>;
    async fn create_draft(&self, instance: Instance) -> WorkflowResult<Instance>;
    async fn update(
        &self,
        id: &str,
        status: InstanceStatus,
        node: NodeId,
        data: InstanceData,
        updated_at: DateTime<Utc>,
    ) -> WorkflowResult<()>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn load_task(&self, id: &str) -> WorkflowResult<Task>;
    async fn load_group(&self, id: &TaskGroupId) -> WorkflowResult<TaskGroup>;
    async fn insert_group(&self, group: TaskGroup) -> WorkflowResult<()>;
    async fn insert_task(&self, task: Task) -> WorkflowResult<()>;
    async fn update_task_done(
        &self,
        id: &TaskId,
        action: ActionTaken,
        actor: UserId,
        comment: Option<String>,
        completed_at: DateTime<Utc>,
    ) -> WorkflowResult<()>;
    async fn update_group_counters(
        &self,
        id: &TaskGroupId,
        approved: u32,
        rejected: u32,
    ) -> WorkflowResult<()>;
    async fn close_group(&self, id: &TaskGroupId, closed_at: DateTime<Utc>) -> WorkflowResult<()>;
    async fn auto_close_group_tasks(
        &self,
        group_id: &TaskGroupId,
        completed_at: DateTime<Utc>,
    ) -> WorkflowResult<()>;
    async fn list_inbox(&self, user_id: &UserId) -> WorkflowResult<Vec<Task>>;
    async fn list_done(&self, user_id: &UserId) -> WorkflowResult<Vec<Task>>;
}

#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    async fn user_in_role(&self, user_id: &UserId, role_id: &str) -> WorkflowResult<bool>;
    async fn user_in_dept(&self, user_id: &UserId, dept_id: &str) -> WorkflowResult<bool>;
    async fn user_name(&self, user_id: &UserId) -> WorkflowResult<String>;
}

/// The subset of repository operations the transition coordinator needs,
/// scoped to one unit of work: every call against a `UnitOfWork` runs
/// against the same underlying connection and becomes durable only when
/// `commit` is called. Dropping the handle without committing rolls the
/// whole sequence back, so a coordinator entry point that fails partway
/// never leaves a partial write visible.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn get_schema_version(&mut self, form_id: &str, version: u32) -> WorkflowResult<FormSchema>;
    async fn load_instance(&mut self, id: &str) -> WorkflowResult<Instance>;
    async fn update_instance(
        &mut self,
        id: &str,
        status: InstanceStatus,
        node: NodeId,
        data: InstanceData,
        updated_at: DateTime<Utc>,
    ) -> WorkflowResult<()>;
    async fn load_task(&mut self, id: &str) -> WorkflowResult<Task>;
    async fn load_group(&mut self, id: &TaskGroupId) -> WorkflowResult<TaskGroup>;
    async fn insert_group(&mut self, group: TaskGroup) -> WorkflowResult<()>;
    async fn insert_task(&mut self, task: Task) -> WorkflowResult<()>;
    async fn update_task_done(
        &mut self,
        id: &TaskId,
        action: ActionTaken,
        actor: UserId,
        comment: Option<String>,
        completed_at: DateTime<Utc>,
    ) -> WorkflowResult<()>;
    async fn update_group_counters(
        &mut self,
        id: &TaskGroupId,
        approved: u32,
        rejected: u32,
    ) -> WorkflowResult<()>;
    async fn close_group(&mut self, id: &TaskGroupId, closed_at: DateTime<Utc>) -> WorkflowResult<()>;
    async fn auto_close_group_tasks(
        &mut self,
        group_id: &TaskGroupId,
        completed_at: DateTime<Utc>,
    ) -> WorkflowResult<()>;
    async fn user_in_role(&mut self, user_id: &UserId, role_id: &str) -> WorkflowResult<bool>;
    async fn user_in_dept(&mut self, user_id: &UserId, dept_id: &str) -> WorkflowResult<bool>;

    /// Commit every mutation made through this handle.
    async fn commit(self: Box<Self>) -> WorkflowResult<()>;
}

/// Opens `UnitOfWork` handles. Implemented once per store alongside the
/// four narrow repository traits above; the coordinator is the only
/// caller, and only for its three mutating entry points.
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    async fn begin(self: Arc<Self>) -> WorkflowResult<Box<dyn UnitOfWork>>;
}
