//! Instances: live cases derived from one published form version.

use crate::ids::{start_node, InstanceId, NodeId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type InstanceData = Map<String, Value>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstanceStatus {
    Draft,
    Running,
    Approved,
    Rejected,
}

impl InstanceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

/// A live case derived from one published form version.
///
/// Invariants (enforced by the transition coordinator, not by this type
/// alone): `status=Draft ⇒ currentNode=start`; a terminal status implies
/// `currentNode=end` and no PENDING task on the instance; at most one OPEN
/// task group exists per instance and its `nodeId = currentNode`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: InstanceId,
    pub form_id: String,
    pub form_version: u32,
    pub applicant_user_id: UserId,
    pub status: InstanceStatus,
    pub current_node: NodeId,
    pub data: InstanceData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Instance {
    pub fn new_draft(
        form_id: impl Into<String>,
        form_version: u32,
        applicant_user_id: UserId,
        data: InstanceData,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: InstanceId::generate(),
            form_id: form_id.into(),
            form_version,
            applicant_user_id,
            status: InstanceStatus::Draft,
            current_node: start_node(),
            data,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}
