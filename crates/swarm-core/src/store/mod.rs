pub mod task_store;
pub mod user_store;
pub mod workflow_store;

pub use task_store::TaskStore;
pub use user_store::UserStore;
pub use workflow_store::WorkflowStore;
