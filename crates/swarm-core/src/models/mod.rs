pub mod task;
pub mod user;
pub mod workflow;

pub use task::*;
pub use user::*;
pub use workflow::*;
