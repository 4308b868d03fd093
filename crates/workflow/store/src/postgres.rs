//! PostgreSQL repository adapter.
//!
//! The four narrow repository traits (`SchemaRepository` and friends)
//! each run one autocommitted statement per call, same as any simple CRUD
//! adapter. The coordinator's three mutating entry points are different:
//! they compose several of these reads and writes into one user action,
//! so `PostgresStore` additionally implements `TransactionalStore`,
//! opening a `sqlx::Transaction` that `PostgresUnitOfWork` drives for the
//! lifetime of that action. Both paths share the same query bodies,
//! written once as free functions generic over the `sqlx` executor.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Row};
use std::sync::Arc;
use workflow_engine::{
    DirectoryRepository, InstanceRepository, SchemaRepository, StatusFilter, TaskRepository,
    TransactionalStore, UnitOfWork,
};
use workflow_types::{
    ActionTaken, AssigneeType, FormSchema, FormStatus, GroupMode, GroupStatus, Instance,
    InstanceData, InstanceStatus, NodeId, Task, TaskGroup, TaskGroupId, TaskId, TaskStatus, UserId,
    WorkflowError, WorkflowResult,
};

fn backend_err(e: sqlx::Error) -> WorkflowError {
    WorkflowError::StorageError(e.to_string())
}

/// PostgreSQL-backed repository adapter, implementing all four workflow
/// repository traits against one pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> WorkflowResult<Self> {
        Self::connect_with_options(database_url, 10).await
    }

    pub async fn connect_with_options(database_url: &str, max_connections: u32) -> WorkflowResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(backend_err)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> WorkflowResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS workflow_form_schemas (
                form_id TEXT NOT NULL,
                version INTEGER NOT NULL,
                status TEXT NOT NULL,
                document JSONB NOT NULL,
                PRIMARY KEY (form_id, version)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS workflow_instances (
                id TEXT PRIMARY KEY,
                form_id TEXT NOT NULL,
                form_version INTEGER NOT NULL,
                applicant_user_id TEXT NOT NULL,
                status TEXT NOT NULL,
                current_node TEXT NOT NULL,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS workflow_task_groups (
                id TEXT PRIMARY KEY,
                instance_id TEXT NOT NULL,
                node_id TEXT NOT NULL,
                mode TEXT NOT NULL,
                status TEXT NOT NULL,
                total_count INTEGER NOT NULL,
                approved_count INTEGER NOT NULL,
                rejected_count INTEGER NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                closed_at TIMESTAMPTZ
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS workflow_tasks (
                id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL,
                instance_id TEXT NOT NULL,
                node_id TEXT NOT NULL,
                status TEXT NOT NULL,
                assignee_type TEXT NOT NULL,
                assignee_id TEXT NOT NULL,
                action_taken TEXT,
                actor_user_id TEXT,
                comment TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                completed_at TIMESTAMPTZ
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS workflow_users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS workflow_user_roles (
                user_id TEXT NOT NULL,
                role_id TEXT NOT NULL,
                PRIMARY KEY (user_id, role_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS workflow_user_depts (
                user_id TEXT NOT NULL,
                dept_id TEXT NOT NULL,
                PRIMARY KEY (user_id, dept_id)
            )
            "#,
        ];

        for stmt in ddl {
            sqlx::query(stmt).execute(&self.pool).await.map_err(backend_err)?;
        }
        Ok(())
    }
}

fn status_str(status: &InstanceStatus) -> &'static str {
    match status {
        InstanceStatus::Draft => "DRAFT",
        InstanceStatus::Running => "RUNNING",
        InstanceStatus::Approved => "APPROVED",
        InstanceStatus::Rejected => "REJECTED",
    }
}

fn parse_status(raw: &str) -> WorkflowResult<InstanceStatus> {
    match raw {
        "DRAFT" => Ok(InstanceStatus::Draft),
        "RUNNING" => Ok(InstanceStatus::Running),
        "APPROVED" => Ok(InstanceStatus::Approved),
        "REJECTED" => Ok(InstanceStatus::Rejected),
        other => Err(WorkflowError::StorageError(format!("unknown instance status `{other}`"))),
    }
}

fn row_to_instance(row: sqlx::postgres::PgRow) -> WorkflowResult<Instance> {
    let status: String = row.try_get("status").map_err(backend_err)?;
    let data: serde_json::Value = row.try_get("data").map_err(backend_err)?;
    Ok(Instance {
        id: row.try_get::<String, _>("id").map_err(backend_err)?.into(),
        form_id: row.try_get("form_id").map_err(backend_err)?,
        form_version: row.try_get::<i32, _>("form_version").map_err(backend_err)? as u32,
        applicant_user_id: row.try_get::<String, _>("applicant_user_id").map_err(backend_err)?.into(),
        status: parse_status(&status)?,
        current_node: row.try_get::<String, _>("current_node").map_err(backend_err)?.into(),
        data: data.as_object().cloned().unwrap_or_default(),
        created_at: row.try_get("created_at").map_err(backend_err)?,
        updated_at: row.try_get("updated_at").map_err(backend_err)?,
    })
}

// The following free functions carry the actual query bodies for every
// operation the coordinator needs inside a transaction. Each is generic
// over the `sqlx` executor so the same body runs against `&self.pool`
// (autocommit, one statement) from the narrow repository impls below, or
// against `&mut *tx` (same transaction, many statements) from
// `PostgresUnitOfWork`.

async fn exec_get_schema_version<'e, E>(executor: E, form_id: &str, version: u32) -> WorkflowResult<FormSchema>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let row = sqlx::query("SELECT document FROM workflow_form_schemas WHERE form_id = $1 AND version = $2")
        .bind(form_id)
        .bind(version as i32)
        .fetch_optional(executor)
        .await
        .map_err(backend_err)?
        .ok_or_else(|| WorkflowError::not_found(format!("form {form_id} version {version} not found")))?;

    let doc: serde_json::Value = row.try_get("document").map_err(backend_err)?;
    serde_json::from_value(doc).map_err(|e| WorkflowError::StorageError(e.to_string()))
}

async fn exec_load_instance<'e, E>(executor: E, id: &str) -> WorkflowResult<Instance>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let row = sqlx::query("SELECT * FROM workflow_instances WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(backend_err)?
        .ok_or_else(|| WorkflowError::not_found(format!("instance {id} not found")))?;
    row_to_instance(row)
}

#[allow(clippy::too_many_arguments)]
async fn exec_update_instance<'e, E>(
    executor: E,
    id: &str,
    status: InstanceStatus,
    node: NodeId,
    data: InstanceData,
    updated_at: DateTime<Utc>,
) -> WorkflowResult<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        "UPDATE workflow_instances SET status = $1, current_node = $2, data = $3, updated_at = $4 \
         WHERE id = $5",
    )
    .bind(status_str(&status))
    .bind(node.as_str())
    .bind(serde_json::Value::Object(data))
    .bind(updated_at)
    .bind(id)
    .execute(executor)
    .await
    .map_err(backend_err)?;

    if result.rows_affected() == 0 {
        return Err(WorkflowError::not_found(format!("instance {id} not found")));
    }
    Ok(())
}

async fn exec_load_task<'e, E>(executor: E, id: &str) -> WorkflowResult<Task>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let row = sqlx::query("SELECT * FROM workflow_tasks WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(backend_err)?
        .ok_or_else(|| WorkflowError::not_found(format!("task {id} not found")))?;
    row_to_task(row)
}

async fn exec_load_group<'e, E>(executor: E, id: &TaskGroupId) -> WorkflowResult<TaskGroup>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let row = sqlx::query("SELECT * FROM workflow_task_groups WHERE id = $1")
        .bind(id.as_str())
        .fetch_optional(executor)
        .await
        .map_err(backend_err)?
        .ok_or_else(|| WorkflowError::not_found(format!("task group {id} not found")))?;
    row_to_group(row)
}

async fn exec_insert_group<'e, E>(executor: E, group: TaskGroup) -> WorkflowResult<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        "INSERT INTO workflow_task_groups \
         (id, instance_id, node_id, mode, status, total_count, approved_count, rejected_count, created_at, closed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(group.id.as_str())
    .bind(group.instance_id.as_str())
    .bind(group.node_id.as_str())
    .bind(mode_str(&group.mode))
    .bind(group_status_str(&group.status))
    .bind(group.total_count as i32)
    .bind(group.approved_count as i32)
    .bind(group.rejected_count as i32)
    .bind(group.created_at)
    .bind(group.closed_at)
    .execute(executor)
    .await
    .map_err(backend_err)?;
    Ok(())
}

async fn exec_insert_task<'e, E>(executor: E, task: Task) -> WorkflowResult<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        "INSERT INTO workflow_tasks \
         (id, group_id, instance_id, node_id, status, assignee_type, assignee_id, action_taken, actor_user_id, comment, created_at, completed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(task.id.as_str())
    .bind(task.group_id.as_str())
    .bind(task.instance_id.as_str())
    .bind(task.node_id.as_str())
    .bind(task_status_str(&task.status))
    .bind(assignee_type_str(&task.assignee_type))
    .bind(&task.assignee_id)
    .bind(task.action_taken.as_ref().map(action_taken_str))
    .bind(task.actor_user_id.as_ref().map(UserId::as_str))
    .bind(&task.comment)
    .bind(task.created_at)
    .bind(task.completed_at)
    .execute(executor)
    .await
    .map_err(backend_err)?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn exec_update_task_done<'e, E>(
    executor: E,
    id: &TaskId,
    action: ActionTaken,
    actor: UserId,
    comment: Option<String>,
    completed_at: DateTime<Utc>,
) -> WorkflowResult<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        "UPDATE workflow_tasks SET status = 'DONE', action_taken = $1, actor_user_id = $2, \
         comment = $3, completed_at = $4 WHERE id = $5 AND status = 'PENDING'",
    )
    .bind(action_taken_str(&action))
    .bind(actor.as_str())
    .bind(comment)
    .bind(completed_at)
    .bind(id.as_str())
    .execute(executor)
    .await
    .map_err(backend_err)?;

    if result.rows_affected() == 0 {
        return Err(WorkflowError::state(format!("task {id} not pending")));
    }
    Ok(())
}

async fn exec_update_group_counters<'e, E>(
    executor: E,
    id: &TaskGroupId,
    approved: u32,
    rejected: u32,
) -> WorkflowResult<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        "UPDATE workflow_task_groups SET approved_count = $1, rejected_count = $2 WHERE id = $3",
    )
    .bind(approved as i32)
    .bind(rejected as i32)
    .bind(id.as_str())
    .execute(executor)
    .await
    .map_err(backend_err)?;

    if result.rows_affected() == 0 {
        return Err(WorkflowError::not_found(format!("task group {id} not found")));
    }
    Ok(())
}

async fn exec_close_group<'e, E>(executor: E, id: &TaskGroupId, closed_at: DateTime<Utc>) -> WorkflowResult<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query("UPDATE workflow_task_groups SET status = 'CLOSED', closed_at = $1 WHERE id = $2")
        .bind(closed_at)
        .bind(id.as_str())
        .execute(executor)
        .await
        .map_err(backend_err)?;
    Ok(())
}

async fn exec_auto_close_group_tasks<'e, E>(
    executor: E,
    group_id: &TaskGroupId,
    completed_at: DateTime<Utc>,
) -> WorkflowResult<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        "UPDATE workflow_tasks SET status = 'DONE', action_taken = 'auto_closed', completed_at = $1 \
         WHERE group_id = $2 AND status = 'PENDING'",
    )
    .bind(completed_at)
    .bind(group_id.as_str())
    .execute(executor)
    .await
    .map_err(backend_err)?;
    Ok(())
}

async fn exec_user_in_role<'e, E>(executor: E, user_id: &UserId, role_id: &str) -> WorkflowResult<bool>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let row = sqlx::query("SELECT 1 FROM workflow_user_roles WHERE user_id = $1 AND role_id = $2")
        .bind(user_id.as_str())
        .bind(role_id)
        .fetch_optional(executor)
        .await
        .map_err(backend_err)?;
    Ok(row.is_some())
}

async fn exec_user_in_dept<'e, E>(executor: E, user_id: &UserId, dept_id: &str) -> WorkflowResult<bool>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let row = sqlx::query("SELECT 1 FROM workflow_user_depts WHERE user_id = $1 AND dept_id = $2")
        .bind(user_id.as_str())
        .bind(dept_id)
        .fetch_optional(executor)
        .await
        .map_err(backend_err)?;
    Ok(row.is_some())
}

#[async_trait]
impl SchemaRepository for PostgresStore {
    async fn list_published(&self) -> WorkflowResult<Vec<FormSchema>> {
        let rows = sqlx::query(
            "SELECT DISTINCT ON (form_id) document FROM workflow_form_schemas \
             WHERE status = 'published' ORDER BY form_id, version DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?;

        rows.into_iter()
            .map(|r| {
                let doc: serde_json::Value = r.try_get("document").map_err(backend_err)?;
                serde_json::from_value(doc).map_err(|e| WorkflowError::StorageError(e.to_string()))
            })
            .collect()
    }

    async fn get_published(&self, form_id: &str) -> WorkflowResult<FormSchema> {
        let row = sqlx::query(
            "SELECT document FROM workflow_form_schemas \
             WHERE form_id = $1 AND status = 'published' ORDER BY version DESC LIMIT 1",
        )
        .bind(form_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?
        .ok_or_else(|| WorkflowError::not_found(format!("no published version of form {form_id}")))?;

        let doc: serde_json::Value = row.try_get("document").map_err(backend_err)?;
        serde_json::from_value(doc).map_err(|e| WorkflowError::StorageError(e.to_string()))
    }

    async fn get_version(&self, form_id: &str, version: u32) -> WorkflowResult<FormSchema> {
        exec_get_schema_version(&self.pool, form_id, version).await
    }

    async fn save_draft(&self, mut schema: FormSchema) -> WorkflowResult<FormSchema> {
        let max_version: Option<i32> =
            sqlx::query("SELECT MAX(version) AS v FROM workflow_form_schemas WHERE form_id = $1")
                .bind(&schema.id)
                .fetch_one(&self.pool)
                .await
                .map_err(backend_err)?
                .try_get("v")
                .map_err(backend_err)?;

        schema.version = max_version.unwrap_or(0) as u32 + 1;
        schema.status = FormStatus::Draft;
        schema.validate()?;

        let doc = serde_json::to_value(&schema).map_err(|e| WorkflowError::StorageError(e.to_string()))?;
        sqlx::query(
            "INSERT INTO workflow_form_schemas (form_id, version, status, document) VALUES ($1, $2, 'draft', $3)",
        )
        .bind(&schema.id)
        .bind(schema.version as i32)
        .bind(doc)
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;

        Ok(schema)
    }

    async fn publish(&self, form_id: &str) -> WorkflowResult<()> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;

        let max_version: Option<i32> =
            sqlx::query("SELECT MAX(version) AS v FROM workflow_form_schemas WHERE form_id = $1")
                .bind(form_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(backend_err)?
                .try_get("v")
                .map_err(backend_err)?;
        let Some(max_version) = max_version else {
            return Err(WorkflowError::not_found(format!("form {form_id} not found")));
        };

        sqlx::query("UPDATE workflow_form_schemas SET status = 'draft' WHERE form_id = $1")
            .bind(form_id)
            .execute(&mut *tx)
            .await
            .map_err(backend_err)?;
        sqlx::query(
            "UPDATE workflow_form_schemas SET status = 'published' WHERE form_id = $1 AND version = $2",
        )
        .bind(form_id)
        .bind(max_version)
        .execute(&mut *tx)
        .await
        .map_err(backend_err)?;

        tx.commit().await.map_err(backend_err)?;
        Ok(())
    }
}

#[async_trait]
impl InstanceRepository for PostgresStore {
    async fn load(&self, id: &str) -> WorkflowResult<Instance> {
        exec_load_instance(&self.pool, id).await
    }

    async fn list_for_applicant(
        &self,
        user_id: &UserId,
        status: Option<StatusFilter>,
    ) -> WorkflowResult<Vec<Instance>> {
        let rows = match &status {
            Some(StatusFilter::Done) => {
                sqlx::query(
                    "SELECT * FROM workflow_instances WHERE applicant_user_id = $1 AND status IN ($2, $3) \
                     ORDER BY updated_at DESC",
                )
                .bind(user_id.as_str())
                .bind(status_str(&InstanceStatus::Approved))
                .bind(status_str(&InstanceStatus::Rejected))
                .fetch_all(&self.pool)
                .await
            }
            Some(StatusFilter::Draft) => {
                sqlx::query(
                    "SELECT * FROM workflow_instances WHERE applicant_user_id = $1 AND status = $2 \
                     ORDER BY updated_at DESC",
                )
                .bind(user_id.as_str())
                .bind(status_str(&InstanceStatus::Draft))
                .fetch_all(&self.pool)
                .await
            }
            Some(StatusFilter::Running) => {
                sqlx::query(
                    "SELECT * FROM workflow_instances WHERE applicant_user_id = $1 AND status = $2 \
                     ORDER BY updated_at DESC",
                )
                .bind(user_id.as_str())
                .bind(status_str(&InstanceStatus::Running))
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT * FROM workflow_instances WHERE applicant_user_id = $1 ORDER BY updated_at DESC",
                )
                .bind(user_id.as_str())
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(backend_err)?;

        rows.into_iter().map(row_to_instance).collect()
    }

    async fn create_draft(&self, instance: Instance) -> WorkflowResult<Instance> {
        sqlx::query(
            "INSERT INTO workflow_instances \
             (id, form_id, form_version, applicant_user_id, status, current_node, data, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(instance.id.as_str())
        .bind(&instance.form_id)
        .bind(instance.form_version as i32)
        .bind(instance.applicant_user_id.as_str())
        .bind(status_str(&instance.status))
        .bind(instance.current_node.as_str())
        .bind(serde_json::Value::Object(instance.data.clone()))
        .bind(instance.created_at)
        .bind(instance.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;

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
        exec_update_instance(&self.pool, id, status, node, data, updated_at).await
    }
}

#[async_trait]
impl TaskRepository for PostgresStore {
    async fn load_task(&self, id: &str) -> WorkflowResult<Task> {
        exec_load_task(&self.pool, id).await
    }

    async fn load_group(&self, id: &TaskGroupId) -> WorkflowResult<TaskGroup> {
        exec_load_group(&self.pool, id).await
    }

    async fn insert_group(&self, group: TaskGroup) -> WorkflowResult<()> {
        exec_insert_group(&self.pool, group).await
    }

    async fn insert_task(&self, task: Task) -> WorkflowResult<()> {
        exec_insert_task(&self.pool, task).await
    }

    async fn update_task_done(
        &self,
        id: &TaskId,
        action: ActionTaken,
        actor: UserId,
        comment: Option<String>,
        completed_at: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        exec_update_task_done(&self.pool, id, action, actor, comment, completed_at).await
    }

    async fn update_group_counters(
        &self,
        id: &TaskGroupId,
        approved: u32,
        rejected: u32,
    ) -> WorkflowResult<()> {
        exec_update_group_counters(&self.pool, id, approved, rejected).await
    }

    async fn close_group(&self, id: &TaskGroupId, closed_at: DateTime<Utc>) -> WorkflowResult<()> {
        exec_close_group(&self.pool, id, closed_at).await
    }

    async fn auto_close_group_tasks(
        &self,
        group_id: &TaskGroupId,
        completed_at: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        exec_auto_close_group_tasks(&self.pool, group_id, completed_at).await
    }

    async fn list_inbox(&self, user_id: &UserId) -> WorkflowResult<Vec<Task>> {
        let rows = sqlx::query(
            "SELECT t.* FROM workflow_tasks t \
             LEFT JOIN workflow_user_roles ur ON t.assignee_type = 'role' AND ur.role_id = t.assignee_id AND ur.user_id = $1 \
             LEFT JOIN workflow_user_depts ud ON t.assignee_type = 'dept' AND ud.dept_id = t.assignee_id AND ud.user_id = $1 \
             WHERE t.status = 'PENDING' \
               AND ((t.assignee_type = 'user' AND t.assignee_id = $1) \
                 OR ur.user_id IS NOT NULL \
                 OR ud.user_id IS NOT NULL) \
             ORDER BY t.created_at",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?;

        rows.into_iter().map(row_to_task).collect()
    }

    async fn list_done(&self, user_id: &UserId) -> WorkflowResult<Vec<Task>> {
        let rows = sqlx::query(
            "SELECT * FROM workflow_tasks WHERE status = 'DONE' AND actor_user_id = $1 ORDER BY completed_at DESC",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?;

        rows.into_iter().map(row_to_task).collect()
    }
}

fn mode_str(mode: &GroupMode) -> &'static str {
    match mode {
        GroupMode::And => "AND",
        GroupMode::Or => "OR",
    }
}

fn parse_mode(raw: &str) -> WorkflowResult<GroupMode> {
    match raw {
        "AND" => Ok(GroupMode::And),
        "OR" => Ok(GroupMode::Or),
        other => Err(WorkflowError::StorageError(format!("unknown group mode `{other}`"))),
    }
}

fn group_status_str(status: &GroupStatus) -> &'static str {
    match status {
        GroupStatus::Open => "OPEN",
        GroupStatus::Closed => "CLOSED",
    }
}

fn parse_group_status(raw: &str) -> WorkflowResult<GroupStatus> {
    match raw {
        "OPEN" => Ok(GroupStatus::Open),
        "CLOSED" => Ok(GroupStatus::Closed),
        other => Err(WorkflowError::StorageError(format!("unknown group status `{other}`"))),
    }
}

fn task_status_str(status: &TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "PENDING",
        TaskStatus::Done => "DONE",
    }
}

fn parse_task_status(raw: &str) -> WorkflowResult<TaskStatus> {
    match raw {
        "PENDING" => Ok(TaskStatus::Pending),
        "DONE" => Ok(TaskStatus::Done),
        other => Err(WorkflowError::StorageError(format!("unknown task status `{other}`"))),
    }
}

fn assignee_type_str(t: &AssigneeType) -> &'static str {
    match t {
        AssigneeType::User => "user",
        AssigneeType::Role => "role",
        AssigneeType::Dept => "dept",
        AssigneeType::Applicant => "applicant",
    }
}

fn parse_assignee_type(raw: &str) -> WorkflowResult<AssigneeType> {
    match raw {
        "user" => Ok(AssigneeType::User),
        "role" => Ok(AssigneeType::Role),
        "dept" => Ok(AssigneeType::Dept),
        "applicant" => Ok(AssigneeType::Applicant),
        other => Err(WorkflowError::StorageError(format!("unknown assignee type `{other}`"))),
    }
}

fn action_taken_str(a: &ActionTaken) -> &'static str {
    match a {
        ActionTaken::Approve => "approve",
        ActionTaken::Reject => "reject",
        ActionTaken::Return => "return",
        ActionTaken::Submit => "submit",
        ActionTaken::AutoClosed => "auto_closed",
    }
}

fn parse_action_taken(raw: &str) -> WorkflowResult<ActionTaken> {
    match raw {
        "approve" => Ok(ActionTaken::Approve),
        "reject" => Ok(ActionTaken::Reject),
        "return" => Ok(ActionTaken::Return),
        "submit" => Ok(ActionTaken::Submit),
        "auto_closed" => Ok(ActionTaken::AutoClosed),
        other => Err(WorkflowError::StorageError(format!("unknown action_taken `{other}`"))),
    }
}

fn row_to_group(row: sqlx::postgres::PgRow) -> WorkflowResult<TaskGroup> {
    let mode: String = row.try_get("mode").map_err(backend_err)?;
    let status: String = row.try_get("status").map_err(backend_err)?;
    Ok(TaskGroup {
        id: row.try_get::<String, _>("id").map_err(backend_err)?.into(),
        instance_id: row.try_get::<String, _>("instance_id").map_err(backend_err)?.into(),
        node_id: row.try_get::<String, _>("node_id").map_err(backend_err)?.into(),
        mode: parse_mode(&mode)?,
        status: parse_group_status(&status)?,
        total_count: row.try_get::<i32, _>("total_count").map_err(backend_err)? as u32,
        approved_count: row.try_get::<i32, _>("approved_count").map_err(backend_err)? as u32,
        rejected_count: row.try_get::<i32, _>("rejected_count").map_err(backend_err)? as u32,
        created_at: row.try_get("created_at").map_err(backend_err)?,
        closed_at: row.try_get("closed_at").map_err(backend_err)?,
    })
}

fn row_to_task(row: sqlx::postgres::PgRow) -> WorkflowResult<Task> {
    let status: String = row.try_get("status").map_err(backend_err)?;
    let assignee_type: String = row.try_get("assignee_type").map_err(backend_err)?;
    let action_taken: Option<String> = row.try_get("action_taken").map_err(backend_err)?;
    let actor_user_id: Option<String> = row.try_get("actor_user_id").map_err(backend_err)?;
    Ok(Task {
        id: row.try_get::<String, _>("id").map_err(backend_err)?.into(),
        group_id: row.try_get::<String, _>("group_id").map_err(backend_err)?.into(),
        instance_id: row.try_get::<String, _>("instance_id").map_err(backend_err)?.into(),
        node_id: row.try_get::<String, _>("node_id").map_err(backend_err)?.into(),
        status: parse_task_status(&status)?,
        assignee_type: parse_assignee_type(&assignee_type)?,
        assignee_id: row.try_get("assignee_id").map_err(backend_err)?,
        action_taken: action_taken.map(|a| parse_action_taken(&a)).transpose()?,
        actor_user_id: actor_user_id.map(UserId::new),
        comment: row.try_get("comment").map_err(backend_err)?,
        created_at: row.try_get("created_at").map_err(backend_err)?,
        completed_at: row.try_get("completed_at").map_err(backend_err)?,
    })
}

#[async_trait]
impl DirectoryRepository for PostgresStore {
    async fn user_in_role(&self, user_id: &UserId, role_id: &str) -> WorkflowResult<bool> {
        exec_user_in_role(&self.pool, user_id, role_id).await
    }

    async fn user_in_dept(&self, user_id: &UserId, dept_id: &str) -> WorkflowResult<bool> {
        exec_user_in_dept(&self.pool, user_id, dept_id).await
    }

    async fn user_name(&self, user_id: &UserId) -> WorkflowResult<String> {
        let row = sqlx::query("SELECT name FROM workflow_users WHERE id = $1")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?
            .ok_or_else(|| WorkflowError::not_found(format!("user {user_id} not found")))?;
        row.try_get("name").map_err(backend_err)
    }
}

/// One `sqlx::Transaction` driving the coordinator's mutating entry
/// points. `commit` makes every write durable at once; dropping this
/// without committing rolls all of them back, `Transaction`'s own Drop
/// impl issues the `ROLLBACK`.
pub struct PostgresUnitOfWork {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn get_schema_version(&mut self, form_id: &str, version: u32) -> WorkflowResult<FormSchema> {
        exec_get_schema_version(&mut *self.tx, form_id, version).await
    }

    async fn load_instance(&mut self, id: &str) -> WorkflowResult<Instance> {
        exec_load_instance(&mut *self.tx, id).await
    }

    async fn update_instance(
        &mut self,
        id: &str,
        status: InstanceStatus,
        node: NodeId,
        data: InstanceData,
        updated_at: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        exec_update_instance(&mut *self.tx, id, status, node, data, updated_at).await
    }

    async fn load_task(&mut self, id: &str) -> WorkflowResult<Task> {
        exec_load_task(&mut *self.tx, id).await
    }

    async fn load_group(&mut self, id: &TaskGroupId) -> WorkflowResult<TaskGroup> {
        exec_load_group(&mut *self.tx, id).await
    }

    async fn insert_group(&mut self, group: TaskGroup) -> WorkflowResult<()> {
        exec_insert_group(&mut *self.tx, group).await
    }

    async fn insert_task(&mut self, task: Task) -> WorkflowResult<()> {
        exec_insert_task(&mut *self.tx, task).await
    }

    async fn update_task_done(
        &mut self,
        id: &TaskId,
        action: ActionTaken,
        actor: UserId,
        comment: Option<String>,
        completed_at: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        exec_update_task_done(&mut *self.tx, id, action, actor, comment, completed_at).await
    }

    async fn update_group_counters(
        &mut self,
        id: &TaskGroupId,
        approved: u32,
        rejected: u32,
    ) -> WorkflowResult<()> {
        exec_update_group_counters(&mut *self.tx, id, approved, rejected).await
    }

    async fn close_group(&mut self, id: &TaskGroupId, closed_at: DateTime<Utc>) -> WorkflowResult<()> {
        exec_close_group(&mut *self.tx, id, closed_at).await
    }

    async fn auto_close_group_tasks(
        &mut self,
        group_id: &TaskGroupId,
        completed_at: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        exec_auto_close_group_tasks(&mut *self.tx, group_id, completed_at).await
    }

    async fn user_in_role(&mut self, user_id: &UserId, role_id: &str) -> WorkflowResult<bool> {
        exec_user_in_role(&mut *self.tx, user_id, role_id).await
    }

    async fn user_in_dept(&mut self, user_id: &UserId, dept_id: &str) -> WorkflowResult<bool> {
        exec_user_in_dept(&mut *self.tx, user_id, dept_id).await
    }

    async fn commit(self: Box<Self>) -> WorkflowResult<()> {
        self.tx.commit().await.map_err(backend_err)
    }
}

#[async_trait]
impl TransactionalStore for PostgresStore {
    async fn begin(self: Arc<Self>) -> WorkflowResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await.map_err(backend_err)?;
        Ok(Box::new(PostgresUnitOfWork { tx }))
    }
}
