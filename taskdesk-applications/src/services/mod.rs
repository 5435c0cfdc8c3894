//! Domain services composing storage with access rules

pub mod tasks;
pub mod users;

pub use tasks::{TaskFilters, TaskService};
pub use users::{UserDirectory, UserFilters};
