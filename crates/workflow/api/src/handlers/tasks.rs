//! Task inbox/done listings and the single act-on-task entry point.

use crate::dto::{ActOnTaskRequest, ActOnTaskResponse, TaskDetailResponse, UserIdQuery};
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use workflow_types::{Task, UserId};

/// A task joined with its instance and the form schema the instance was
/// started from.
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskDetailResponse>> {
    let task = state.tasks.load_task(&task_id).await?;
    let instance = state.instances.load(task.instance_id.as_str()).await?;
    let schema = state.schemas.get_version(&instance.form_id, instance.form_version).await?;
    Ok(Json(TaskDetailResponse { task, instance, schema }))
}

pub async fn list_inbox(
    State(state): State<AppState>,
    Query(query): Query<UserIdQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.tasks.list_inbox(&UserId::new(query.user_id)).await?))
}

pub async fn list_done(
    State(state): State<AppState>,
    Query(query): Query<UserIdQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.tasks.list_done(&UserId::new(query.user_id)).await?))
}

pub async fn act_on_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(req): Json<ActOnTaskRequest>,
) -> ApiResult<Json<ActOnTaskResponse>> {
    let outcome = state
        .coordinator
        .act_on_task(&task_id, &UserId::new(req.user_id), req.action, req.comment, req.data)
        .await?;
    Ok(Json(outcome.into()))
}
