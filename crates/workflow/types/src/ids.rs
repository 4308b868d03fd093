//! Typed identifiers used across the form/workflow domain.
//!
//! Each id wraps a `String` rather than aliasing it so that a `TaskId`
//! can never be handed to a function expecting an `InstanceId` by accident.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn generate() -> Self {
                Self(format!("{}_{}", $prefix, uuid::Uuid::new_v4().simple()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(FormId, "form");
string_id!(InstanceId, "inst");
string_id!(NodeId, "node");
string_id!(TaskGroupId, "tg");
string_id!(TaskId, "task");
string_id!(UserId, "u");
string_id!(DeptId, "d");
string_id!(RoleId, "role");

/// `NodeId` for the well-known applicant-held entry node.
pub fn start_node() -> NodeId {
    NodeId::new("start")
}

/// `NodeId` for the well-known terminal sink node.
pub fn end_node() -> NodeId {
    NodeId::new("end")
}
