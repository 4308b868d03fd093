//! The directory: users, departments, and the membership relations that
//! `role`/`dept` assignees resolve against.

use crate::ids::{DeptId, RoleId, UserId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dept {
    pub id: DeptId,
    pub name: String,
}

/// A `user_depts` row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserDept {
    pub user_id: UserId,
    pub dept_id: DeptId,
}

/// A `user_roles` row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserRole {
    pub user_id: UserId,
    pub role_id: RoleId,
}
