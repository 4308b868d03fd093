//! Route table: resources grouped as `forms`, `instances`, `tasks`, as
//! `DomnicAmalan-health-v1`'s `presentation/api/handlers/` does.

use crate::handlers;
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/forms", get(handlers::forms::list_published).post(handlers::forms::save_draft))
        .route("/forms/:form_id", get(handlers::forms::get_published))
        .route("/forms/:form_id/versions/:version", get(handlers::forms::get_version))
        .route("/forms/:form_id/publish", post(handlers::forms::publish))
        .route("/instances", get(handlers::instances::list_instances).post(handlers::instances::create_draft))
        .route("/instances/:id", get(handlers::instances::get_instance))
        .route("/instances/:id/data", post(handlers::instances::update_data))
        .route("/instances/:id/submit", post(handlers::instances::submit))
        .route("/tasks/inbox", get(handlers::tasks::list_inbox))
        .route("/tasks/done", get(handlers::tasks::list_done))
        .route("/tasks/:task_id", get(handlers::tasks::get_task))
        .route("/tasks/:task_id/action", post(handlers::tasks::act_on_task));

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::util::ServiceExt;
    use workflow_store::MemoryStore;
    use workflow_types::fixtures::leave_form_v1;
    use workflow_types::UserId;

    fn test_app() -> Router {
        let store = Arc::new(MemoryStore::new());
        store.seed_schema(leave_form_v1()).unwrap();
        store.seed_user_role(UserId::new("u3"), "manager").unwrap();
        let state = AppState::new(store);
        create_router(state)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_check_is_ok() {
        let app = test_app();
        let request = Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_draft_then_submit_routes_to_manager() {
        let app = test_app();

        let create_body = serde_json::json!({
            "formId": "leave_form_v1",
            "userId": "u1",
            "data": {
                "title": "L",
                "applicant": "u1",
                "dept": "d1",
                "leaveType": "annual",
                "days": 2,
                "reason": "r",
            },
        });
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/instances")
            .header("content-type", "application/json")
            .body(Body::from(create_body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let instance = body_json(response).await;
        let id = instance["id"].as_str().unwrap().to_string();

        let submit_body = serde_json::json!({"userId": "u1"});
        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/v1/instances/{id}/submit"))
            .header("content-type", "application/json")
            .body(Body::from(submit_body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let outcome = body_json(response).await;
        assert_eq!(outcome["nextNode"], "manager");
    }

    #[tokio::test]
    async fn get_task_joins_instance_and_schema() {
        let app = test_app();

        let create_body = serde_json::json!({
            "formId": "leave_form_v1",
            "userId": "u1",
            "data": {
                "title": "L",
                "applicant": "u1",
                "dept": "d1",
                "leaveType": "annual",
                "days": 2,
                "reason": "r",
            },
        });
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/instances")
            .header("content-type", "application/json")
            .body(Body::from(create_body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let instance = body_json(response).await;
        let instance_id = instance["id"].as_str().unwrap().to_string();

        let submit_body = serde_json::json!({"userId": "u1"});
        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/v1/instances/{instance_id}/submit"))
            .header("content-type", "application/json")
            .body(Body::from(submit_body.to_string()))
            .unwrap();
        app.clone().oneshot(request).await.unwrap();

        let request = Request::builder().uri("/api/v1/tasks/inbox?userId=u3").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let inbox = body_json(response).await;
        let task_id = inbox[0]["id"].as_str().unwrap().to_string();

        let request = Request::builder().uri(format!("/api/v1/tasks/{task_id}")).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let detail = body_json(response).await;
        assert_eq!(detail["task"]["id"], task_id);
        assert_eq!(detail["instance"]["id"], instance_id);
        assert_eq!(detail["schema"]["id"], "leave_form_v1");
    }

    #[tokio::test]
    async fn get_published_unknown_form_is_not_found() {
        let app = test_app();
        let request = Request::builder().uri("/api/v1/forms/no_such_form").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["code"], "not_found");
    }
}
