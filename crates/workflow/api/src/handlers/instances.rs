//! Instance lifecycle handlers: draft creation, data edits, submission,
//! and listing by applicant.

use crate::dto::{CreateInstanceRequest, ListInstancesQuery, SubmitRequest, SubmitResponse, UpdateInstanceDataRequest};
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use workflow_types::{Instance, UserId};

pub async fn create_draft(
    State(state): State<AppState>,
    Json(req): Json<CreateInstanceRequest>,
) -> ApiResult<Json<Instance>> {
    let schema = state.schemas.get_published(&req.form_id).await?;
    let instance = Instance::new_draft(req.form_id, schema.version, UserId::new(req.user_id), req.data);
    Ok(Json(state.instances.create_draft(instance).await?))
}

pub async fn get_instance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Instance>> {
    Ok(Json(state.instances.load(&id).await?))
}

pub async fn list_instances(
    State(state): State<AppState>,
    Query(query): Query<ListInstancesQuery>,
) -> ApiResult<Json<Vec<Instance>>> {
    let instances = state
        .instances
        .list_for_applicant(&UserId::new(query.user_id), query.status)
        .await?;
    Ok(Json(instances))
}

pub async fn update_data(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateInstanceDataRequest>,
) -> ApiResult<()> {
    state.coordinator.update_data(&id, &UserId::new(req.user_id), req.data).await?;
    Ok(())
}

pub async fn submit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SubmitRequest>,
) -> ApiResult<Json<SubmitResponse>> {
    let outcome = state.coordinator.submit(&id, &UserId::new(req.user_id)).await?;
    Ok(Json(outcome.into()))
}
