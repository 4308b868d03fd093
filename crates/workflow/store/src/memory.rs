//! In-memory repository adapter.
//!
//! Deterministic and test-friendly. Used by `workflow-engine`'s and
//! `workflow-api`'s own test suites; not a production backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use workflow_engine::{
    DirectoryRepository, InstanceRepository, SchemaRepository, StatusFilter, TaskRepository,
    TransactionalStore, UnitOfWork,
};
use workflow_types::{
    ActionTaken, FormSchema, GroupStatus, Instance, InstanceData, InstanceStatus, NodeId, Task,
    TaskGroup, TaskGroupId, TaskId, TaskStatus, UserId, WorkflowError, WorkflowResult,
};

fn lock_poisoned(which: &str) -> WorkflowError {
    WorkflowError::StorageError(format!("{which} lock poisoned"))
}

/// All workflow state held in memory, behind one lock per table.
#[derive(Default)]
pub struct MemoryStore {
    schemas: RwLock<HashMap<String, Vec<FormSchema>>>,
    instances: RwLock<HashMap<String, Instance>>,
    groups: RwLock<HashMap<TaskGroupId, TaskGroup>>,
    tasks: RwLock<HashMap<TaskId, Task>>,
    users: RwLock<HashMap<UserId, String>>,
    user_roles: RwLock<Vec<(UserId, String)>>,
    user_depts: RwLock<Vec<(UserId, String)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a published form, as the demo fixtures and tests do.
    pub fn seed_schema(&self, schema: FormSchema) -> WorkflowResult<()> {
        schema.validate()?;
        let mut guard = self.schemas.write().map_err(|_| lock_poisoned("schemas"))?;
        guard.entry(schema.id.clone()).or_default().push(schema);
        Ok(())
    }

    pub fn seed_user(&self, id: UserId, name: impl Into<String>) -> WorkflowResult<()> {
        let mut guard = self.users.write().map_err(|_| lock_poisoned("users"))?;
        guard.insert(id, name.into());
        Ok(())
    }

    pub fn seed_user_role(&self, user_id: UserId, role_id: impl Into<String>) -> WorkflowResult<()> {
        let mut guard = self.user_roles.write().map_err(|_| lock_poisoned("user_roles"))?;
        guard.push((user_id, role_id.into()));
        Ok(())
    }

    pub fn seed_user_dept(&self, user_id: UserId, dept_id: impl Into<String>) -> WorkflowResult<()> {
        let mut guard = self.user_depts.write().map_err(|_| lock_poisoned("user_depts"))?;
        guard.push((user_id, dept_id.into()));
        Ok(())
    }
}

#[async_trait]
impl SchemaRepository for MemoryStore {
    async fn list_published(&self) -> WorkflowResult<Vec<FormSchema>> {
        let guard = self.schemas.read().map_err(|_| lock_poisoned("schemas"))?;
        Ok(guard
            .values()
            .filter_map(|versions| versions.iter().rev().find(|s| s.status == workflow_types::FormStatus::Published))
            .cloned()
            .collect())
    }

    async fn get_published(&self, form_id: &str) -> WorkflowResult<FormSchema> {
        let guard = self.schemas.read().map_err(|_| lock_poisoned("schemas"))?;
        guard
            .get(form_id)
            .and_then(|versions| versions.iter().rev().find(|s| s.status == workflow_types::FormStatus::Published))
            .cloned()
            .ok_or_else(|| WorkflowError::not_found(format!("no published version of form {form_id}")))
    }

    async fn get_version(&self, form_id: &str, version: u32) -> WorkflowResult<FormSchema> {
        let guard = self.schemas.read().map_err(|_| lock_poisoned("schemas"))?;
        guard
            .get(form_id)
            .and_then(|versions| versions.iter().find(|s| s.version == version))
            .cloned()
            .ok_or_else(|| WorkflowError::not_found(format!("form {form_id} version {version} not found")))
    }

    async fn save_draft(&self, mut schema: FormSchema) -> WorkflowResult<FormSchema> {
        let mut guard = self.schemas.write().map_err(|_| lock_poisoned("schemas"))?;
        let versions = guard.entry(schema.id.clone()).or_default();
        let next_version = versions.iter().map(|s| s.version).max().unwrap_or(0) + 1;
        schema.version = next_version;
        schema.status = workflow_types::FormStatus::Draft;
        schema.validate()?;
        versions.push(schema.clone());
        Ok(schema)
    }

    async fn publish(&self, form_id: &str) -> WorkflowResult<()> {
        let mut guard = self.schemas.write().map_err(|_| lock_poisoned("schemas"))?;
        let versions = guard
            .get_mut(form_id)
            .ok_or_else(|| WorkflowError::not_found(format!("form {form_id} not found")))?;
        let max_version = versions.iter().map(|s| s.version).max();
        for s in versions.iter_mut() {
            s.status = if Some(s.version) == max_version {
                workflow_types::FormStatus::Published
            } else {
                workflow_types::FormStatus::Draft
            };
        }
        Ok(())
    }
}

#[async_trait]
impl InstanceRepository for MemoryStore {
    async fn load(&self, id: &str) -> WorkflowResult<Instance> {
        let guard = self.instances.read().map_err(|_| lock_poisoned("instances"))?;
        guard
            .get(id)
            .cloned()
            .ok_or_else(|| WorkflowError::not_found(format!("instance {id} not found")))
    }

    async fn list_for_applicant(
        &self,
        user_id: &UserId,
        status: Option<StatusFilter>,
    ) -> WorkflowResult<Vec<Instance>> {
        let guard = self.instances.read().map_err(|_| lock_poisoned("instances"))?;
        Ok(guard
            .values()
            .filter(|i| &i.applicant_user_id == user_id)
            .filter(|i| status_matches(&i.status, status.as_ref()))
            .cloned()
            .collect())
    }

    async fn create_draft(&self, instance: Instance) -> WorkflowResult<Instance> {
        let mut guard = self.instances.write().map_err(|_| lock_poisoned("instances"))?;
        guard.insert(instance.id.to_string(), instance.clone());
        Ok(instance)
    }

    async fn update(
        &self,
        id: &str,
        status: InstanceStatus,
        node: NodeId,
        data: InstanceData,
        updated_at: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        let mut guard = self.instances.write().map_err(|_| lock_poisoned("instances"))?;
        let instance = guard
            .get_mut(id)
            .ok_or_else(|| WorkflowError::not_found(format!("instance {id} not found")))?;
        instance.status = status;
        instance.current_node = node;
        instance.data = data;
        instance.updated_at = updated_at;
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for MemoryStore {
    async fn load_task(&self, id: &str) -> WorkflowResult<Task> {
        let guard = self.tasks.read().map_err(|_| lock_poisoned("tasks"))?;
        guard
            .get(&TaskId::new(id))
            .cloned()
            .ok_or_else(|| WorkflowError::not_found(format!("task {id} not found")))
    }

    async fn load_group(&self, id: &TaskGroupId) -> WorkflowResult<TaskGroup> {
        let guard = self.groups.read().map_err(|_| lock_poisoned("groups"))?;
        guard
            .get(id)
            .cloned()
            .ok_or_else(|| WorkflowError::not_found(format!("task group {id} not found")))
    }

    async fn insert_group(&self, group: TaskGroup) -> WorkflowResult<()> {
        let mut guard = self.groups.write().map_err(|_| lock_poisoned("groups"))?;
        guard.insert(group.id.clone(), group);
        Ok(())
    }

    async fn insert_task(&self, task: Task) -> WorkflowResult<()> {
        let mut guard = self.tasks.write().map_err(|_| lock_poisoned("tasks"))?;
        guard.insert(task.id.clone(), task);
        Ok(())
    }

    async fn update_task_done(
        &self,
        id: &TaskId,
        action: ActionTaken,
        actor: UserId,
        comment: Option<String>,
        completed_at: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        let mut guard = self.tasks.write().map_err(|_| lock_poisoned("tasks"))?;
        let task = guard
            .get_mut(id)
            .ok_or_else(|| WorkflowError::not_found(format!("task {id} not found")))?;
        if task.status != TaskStatus::Pending {
            return Err(WorkflowError::state(format!("task {id} not pending")));
        }
        task.status = TaskStatus::Done;
        task.action_taken = Some(action);
        task.actor_user_id = Some(actor);
        task.comment = comment;
        task.completed_at = Some(completed_at);
        Ok(())
    }

    async fn update_group_counters(
        &self,
        id: &TaskGroupId,
        approved: u32,
        rejected: u32,
    ) -> WorkflowResult<()> {
        let mut guard = self.groups.write().map_err(|_| lock_poisoned("groups"))?;
        let group = guard
            .get_mut(id)
            .ok_or_else(|| WorkflowError::not_found(format!("task group {id} not found")))?;
        group.approved_count = approved;
        group.rejected_count = rejected;
        Ok(())
    }

    async fn close_group(&self, id: &TaskGroupId, closed_at: DateTime<Utc>) -> WorkflowResult<()> {
        let mut guard = self.groups.write().map_err(|_| lock_poisoned("groups"))?;
        let group = guard
            .get_mut(id)
            .ok_or_else(|| WorkflowError::not_found(format!("task group {id} not found")))?;
        group.status = GroupStatus::Closed;
        group.closed_at = Some(closed_at);
        Ok(())
    }

    async fn auto_close_group_tasks(
        &self,
        group_id: &TaskGroupId,
        completed_at: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        let mut guard = self.tasks.write().map_err(|_| lock_poisoned("tasks"))?;
        for task in guard.values_mut() {
            if &task.group_id == group_id && task.status == TaskStatus::Pending {
                task.status = TaskStatus::Done;
                task.action_taken = Some(ActionTaken::AutoClosed);
                task.completed_at = Some(completed_at);
            }
        }
        Ok(())
    }

    async fn list_inbox(&self, user_id: &UserId) -> WorkflowResult<Vec<Task>> {
        let tasks = self.tasks.read().map_err(|_| lock_poisoned("tasks"))?;
        let roles = self.user_roles.read().map_err(|_| lock_poisoned("user_roles"))?;
        let depts = self.user_depts.read().map_err(|_| lock_poisoned("user_depts"))?;

        Ok(tasks
            .values()
            .filter(|t| t.is_pending())
            .filter(|t| task_matches_user(t, user_id, &roles, &depts))
            .cloned()
            .collect())
    }

    async fn list_done(&self, user_id: &UserId) -> WorkflowResult<Vec<Task>> {
        let guard = self.tasks.read().map_err(|_| lock_poisoned("tasks"))?;
        Ok(guard
            .values()
            .filter(|t| t.status == TaskStatus::Done && t.actor_user_id.as_ref() == Some(user_id))
            .cloned()
            .collect())
    }
}

fn status_matches(actual: &InstanceStatus, filter: Option<&StatusFilter>) -> bool {
    match filter {
        None => true,
        Some(StatusFilter::Draft) => *actual == InstanceStatus::Draft,
        Some(StatusFilter::Running) => *actual == InstanceStatus::Running,
        Some(StatusFilter::Done) => actual.is_terminal(),
    }
}

fn task_matches_user(
    task: &Task,
    user_id: &UserId,
    roles: &[(UserId, String)],
    depts: &[(UserId, String)],
) -> bool {
    use workflow_types::AssigneeType;
    match task.assignee_type {
        AssigneeType::User => task.assignee_id == user_id.as_str(),
        AssigneeType::Role => roles.iter().any(|(u, r)| u == user_id && r == &task.assignee_id),
        AssigneeType::Dept => depts.iter().any(|(u, d)| u == user_id && d == &task.assignee_id),
        AssigneeType::Applicant => false,
    }
}

#[async_trait]
impl DirectoryRepository for MemoryStore {
    async fn user_in_role(&self, user_id: &UserId, role_id: &str) -> WorkflowResult<bool> {
        let guard = self.user_roles.read().map_err(|_| lock_poisoned("user_roles"))?;
        Ok(guard.iter().any(|(u, r)| u == user_id && r == role_id))
    }

    async fn user_in_dept(&self, user_id: &UserId, dept_id: &str) -> WorkflowResult<bool> {
        let guard = self.user_depts.read().map_err(|_| lock_poisoned("user_depts"))?;
        Ok(guard.iter().any(|(u, d)| u == user_id && d == dept_id))
    }

    async fn user_name(&self, user_id: &UserId) -> WorkflowResult<String> {
        let guard = self.users.read().map_err(|_| lock_poisoned("users"))?;
        guard
            .get(user_id)
            .cloned()
            .ok_or_else(|| WorkflowError::not_found(format!("user {user_id} not found")))
    }
}

/// No real transaction: each call still locks and releases its own
/// table, same as calling the four repository traits directly. Good
/// enough for the deterministic, single-task-at-a-time tests this store
/// backs; `PostgresUnitOfWork` is the one that actually isolates.
pub struct MemoryUnitOfWork {
    store: Arc<MemoryStore>,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn get_schema_version(&mut self, form_id: &str, version: u32) -> WorkflowResult<FormSchema> {
        SchemaRepository::get_version(self.store.as_ref(), form_id, version).await
    }

    async fn load_instance(&mut self, id: &str) -> WorkflowResult<Instance> {
        InstanceRepository::load(self.store.as_ref(), id).await
    }

    async fn update_instance(
        &mut self,
        id: &str,
        status: InstanceStatus,
        node: NodeId,
        data: InstanceData,
        updated_at: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        InstanceRepository::update(self.store.as_ref(), id, status, node, data, updated_at).await
    }

    async fn load_task(&mut self, id: &str) -> WorkflowResult<Task> {
        TaskRepository::load_task(self.store.as_ref(), id).await
    }

    async fn load_group(&mut self, id: &TaskGroupId) -> WorkflowResult<TaskGroup> {
        TaskRepository::load_group(self.store.as_ref(), id).await
    }

    async fn insert_group(&mut self, group: TaskGroup) -> WorkflowResult<()> {
        TaskRepository::insert_group(self.store.as_ref(), group).await
    }

    async fn insert_task(&mut self, task: Task) -> WorkflowResult<()> {
        TaskRepository::insert_task(self.store.as_ref(), task).await
    }

    async fn update_task_done(
        &mut self,
        id: &TaskId,
        action: ActionTaken,
        actor: UserId,
        comment: Option<String>,
        completed_at: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        TaskRepository::update_task_done(self.store.as_ref(), id, action, actor, comment, completed_at).await
    }

    async fn update_group_counters(
        &mut self,
        id: &TaskGroupId,
        approved: u32,
        rejected: u32,
    ) -> WorkflowResult<()> {
        TaskRepository::update_group_counters(self.store.as_ref(), id, approved, rejected).await
    }

    async fn close_group(&mut self, id: &TaskGroupId, closed_at: DateTime<Utc>) -> WorkflowResult<()> {
        TaskRepository::close_group(self.store.as_ref(), id, closed_at).await
    }

    async fn auto_close_group_tasks(
        &mut self,
        group_id: &TaskGroupId,
        completed_at: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        TaskRepository::auto_close_group_tasks(self.store.as_ref(), group_id, completed_at).await
    }

    async fn user_in_role(&mut self, user_id: &UserId, role_id: &str) -> WorkflowResult<bool> {
        DirectoryRepository::user_in_role(self.store.as_ref(), user_id, role_id).await
    }

    async fn user_in_dept(&mut self, user_id: &UserId, dept_id: &str) -> WorkflowResult<bool> {
        DirectoryRepository::user_in_dept(self.store.as_ref(), user_id, dept_id).await
    }

    async fn commit(self: Box<Self>) -> WorkflowResult<()> {
        Ok(())
    }
}

#[async_trait]
impl TransactionalStore for MemoryStore {
    async fn begin(self: Arc<Self>) -> WorkflowResult<Box<dyn UnitOfWork>> {
        Ok(Box::new(MemoryUnitOfWork { store: self }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workflow_types::fixtures::leave_form_v1;

    #[tokio::test]
    async fn save_then_publish_draft() {
        let store = MemoryStore::new();
        let draft = store.save_draft(leave_form_v1()).await.unwrap();
        assert_eq!(draft.version, 1);
        store.publish(&draft.id).await.unwrap();
        let published = store.get_published(&draft.id).await.unwrap();
        assert_eq!(published.status, workflow_types::FormStatus::Published);
    }

    #[tokio::test]
    async fn instance_lifecycle_round_trips() {
        let store = MemoryStore::new();
        let instance = Instance::new_draft("leave_form_v1", 1, UserId::new("u1"), InstanceData::new());
        let id = instance.id.to_string();
        store.create_draft(instance).await.unwrap();

        store
            .update(&id, InstanceStatus::Running, NodeId::new("manager"), InstanceData::new(), Utc::now())
            .await
            .unwrap();

        let reloaded = store.load(&id).await.unwrap();
        assert_eq!(reloaded.status, InstanceStatus::Running);
        assert_eq!(reloaded.current_node, NodeId::new("manager"));
    }

    #[tokio::test]
    async fn status_filter_done_matches_either_terminal_status() {
        let store = MemoryStore::new();

        let approved = Instance::new_draft("leave_form_v1", 1, UserId::new("u1"), InstanceData::new());
        let approved_id = approved.id.to_string();
        store.create_draft(approved).await.unwrap();
        store
            .update(&approved_id, InstanceStatus::Approved, NodeId::new("end"), InstanceData::new(), Utc::now())
            .await
            .unwrap();

        let rejected = Instance::new_draft("leave_form_v1", 1, UserId::new("u1"), InstanceData::new());
        let rejected_id = rejected.id.to_string();
        store.create_draft(rejected).await.unwrap();
        store
            .update(&rejected_id, InstanceStatus::Rejected, NodeId::new("end"), InstanceData::new(), Utc::now())
            .await
            .unwrap();

        let running = Instance::new_draft("leave_form_v1", 1, UserId::new("u1"), InstanceData::new());
        store.create_draft(running).await.unwrap();

        let done = store.list_for_applicant(&UserId::new("u1"), Some(StatusFilter::Done)).await.unwrap();
        assert_eq!(done.len(), 2);
        assert!(done.iter().all(|i| i.status.is_terminal()));

        let all = store.list_for_applicant(&UserId::new("u1"), None).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn inbox_matches_role_assignment() {
        let store = MemoryStore::new();
        store.seed_user_role(UserId::new("mgr1"), "manager").unwrap();

        let instance = Instance::new_draft("leave_form_v1", 1, UserId::new("u1"), InstanceData::new());
        let group = TaskGroup {
            id: TaskGroupId::generate(),
            instance_id: instance.id.clone(),
            node_id: NodeId::new("manager"),
            mode: workflow_types::GroupMode::Or,
            status: GroupStatus::Open,
            total_count: 1,
            approved_count: 0,
            rejected_count: 0,
            created_at: Utc::now(),
            closed_at: None,
        };
        let task = Task::new_pending(
            group.id.clone(),
            instance.id.clone(),
            NodeId::new("manager"),
            workflow_types::AssigneeType::Role,
            "manager",
        );
        store.insert_group(group).await.unwrap();
        store.insert_task(task).await.unwrap();

        let inbox = store.list_inbox(&UserId::new("mgr1")).await.unwrap();
        assert_eq!(inbox.len(), 1);

        let empty = store.list_inbox(&UserId::new("nobody")).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn auto_close_marks_sibling_pending_tasks() {
        let store = MemoryStore::new();
        let instance = Instance::new_draft("leave_form_v1", 1, UserId::new("u1"), InstanceData::new());
        let group_id = TaskGroupId::generate();
        let group = TaskGroup {
            id: group_id.clone(),
            instance_id: instance.id.clone(),
            node_id: NodeId::new("manager"),
            mode: workflow_types::GroupMode::And,
            status: GroupStatus::Open,
            total_count: 2,
            approved_count: 1,
            rejected_count: 0,
            created_at: Utc::now(),
            closed_at: None,
        };
        let t1 = Task::new_pending(
            group_id.clone(),
            instance.id.clone(),
            NodeId::new("manager"),
            workflow_types::AssigneeType::Role,
            "manager",
        );
        let t2 = Task::new_pending(
            group_id.clone(),
            instance.id.clone(),
            NodeId::new("manager"),
            workflow_types::AssigneeType::Role,
            "manager",
        );
        store.insert_group(group).await.unwrap();
        store.insert_task(t1).await.unwrap();
        store.insert_task(t2).await.unwrap();

        store.auto_close_group_tasks(&group_id, Utc::now()).await.unwrap();

        let tasks = store.tasks.read().unwrap();
        assert!(tasks.values().all(|t| t.status == TaskStatus::Done));
        assert!(tasks
            .values()
            .all(|t| t.action_taken == Some(ActionTaken::AutoClosed)));
    }
}
