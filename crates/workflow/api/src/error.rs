//! Maps [`WorkflowError`] onto HTTP status codes and a JSON error body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use workflow_types::WorkflowError;

pub struct ApiError(pub WorkflowError);

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            WorkflowError::InputError(_) => StatusCode::BAD_REQUEST,
            WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkflowError::AuthzError(_) => StatusCode::FORBIDDEN,
            WorkflowError::StateError(_) => StatusCode::CONFLICT,
            WorkflowError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            WorkflowError::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorBody { code: self.0.kind(), message: self.0.to_string() };
        (status, Json(body)).into_response()
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        ApiError(err)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
