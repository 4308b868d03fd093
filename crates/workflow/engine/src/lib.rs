//! The transition coordinator and its supporting components: policy
//! enforcement, edge resolution, the task-group protocol, and the
//! repository adapters they run against.

pub mod coordinator;
pub mod groups;
pub mod policy;
pub mod repository;
pub mod resolver;

pub use coordinator::{ActOutcome, Coordinator, SubmitOutcome};
pub use repository::{
    DirectoryRepository, InstanceRepository, SchemaRepository, StatusFilter, TaskRepository,
    TransactionalStore, UnitOfWork,
};
