//! Domain records

pub mod task;
pub mod user;

pub use task::{NewTask, Task, TaskPatch, TaskView};
pub use user::{PublicUser, User, UserPatch, UserSummary};
