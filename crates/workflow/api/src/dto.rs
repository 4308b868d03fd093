//! Request/response bodies for the HTTP surface. Wire shapes use
//! `camelCase`, matching `workflow-types`' own `#[serde(rename_all =
//! "camelCase")]` domain structs.

use serde::{Deserialize, Serialize};
use workflow_engine::{ActOutcome, StatusFilter, SubmitOutcome};
use workflow_types::{EdgeAction, FormSchema, Instance, InstanceData, InstanceStatus, Task};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceRequest {
    pub form_id: String,
    pub user_id: String,
    #[serde(default)]
    pub data: InstanceData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInstanceDataRequest {
    pub user_id: String,
    #[serde(default)]
    pub data: InstanceData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActOnTaskRequest {
    pub user_id: String,
    pub action: EdgeAction,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub data: InstanceData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInstancesQuery {
    pub user_id: String,
    #[serde(default)]
    pub status: Option<StatusFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdQuery {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub instance_id: String,
    pub next_node: String,
}

impl From<SubmitOutcome> for SubmitResponse {
    fn from(outcome: SubmitOutcome) -> Self {
        Self { instance_id: outcome.instance_id, next_node: outcome.next_node.to_string() }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActOnTaskResponse {
    pub instance_id: String,
    pub instance_status: InstanceStatus,
    pub current_node: String,
}

impl From<ActOutcome> for ActOnTaskResponse {
    fn from(outcome: ActOutcome) -> Self {
        Self {
            instance_id: outcome.instance_id,
            instance_status: outcome.instance_status,
            current_node: outcome.current_node.to_string(),
        }
    }
}

/// A task joined with the instance and form schema it belongs to, for
/// `GET /tasks/:task_id` where a single task response would otherwise
/// leave the caller to fetch the other two separately.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetailResponse {
    pub task: Task,
    pub instance: Instance,
    pub schema: FormSchema,
}
