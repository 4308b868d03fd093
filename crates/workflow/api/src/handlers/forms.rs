//! Form schema handlers: draft authoring, publishing, lookup.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use workflow_types::FormSchema;

pub async fn list_published(State(state): State<AppState>) -> ApiResult<Json<Vec<FormSchema>>> {
    Ok(Json(state.schemas.list_published().await?))
}

pub async fn get_published(
    State(state): State<AppState>,
    Path(form_id): Path<String>,
) -> ApiResult<Json<FormSchema>> {
    Ok(Json(state.schemas.get_published(&form_id).await?))
}

pub async fn get_version(
    State(state): State<AppState>,
    Path((form_id, version)): Path<(String, u32)>,
) -> ApiResult<Json<FormSchema>> {
    Ok(Json(state.schemas.get_version(&form_id, version).await?))
}

pub async fn save_draft(
    State(state): State<AppState>,
    Json(schema): Json<FormSchema>,
) -> ApiResult<Json<FormSchema>> {
    Ok(Json(state.schemas.save_draft(schema).await?))
}

pub async fn publish(
    State(state): State<AppState>,
    Path(form_id): Path<String>,
) -> ApiResult<()> {
    state.schemas.publish(&form_id).await?;
    Ok(())
}
