//! Form and workflow domain types.
//!
//! This crate is pure data: schema model, instance/task-group/task model,
//! directory model, typed ids, and the shared error taxonomy. No I/O, no
//! policy enforcement, no routing — those live in `workflow-engine`.

pub mod directory;
pub mod error;
pub mod fixtures;
pub mod ids;
pub mod instance;
pub mod schema;
pub mod task;

pub use directory::{Dept, User, UserDept, UserRole};
pub use error::{WorkflowError, WorkflowResult};
pub use ids::{DeptId, FormId, InstanceId, NodeId, RoleId, TaskGroupId, TaskId, UserId};
pub use instance::{Instance, InstanceData, InstanceStatus};
pub use schema::{
    Assignee, AssigneeType, Calc, Edge, EdgeAction, Field, FieldType, FormSchema, FormStatus,
    GroupMode, Node, NodePolicy, Workflow,
};
pub use task::{ActionTaken, GroupStatus, Task, TaskGroup, TaskStatus};
