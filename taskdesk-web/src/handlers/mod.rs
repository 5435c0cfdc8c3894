//! HTTP request handlers, grouped by resource

pub mod auth;
pub mod health;
pub mod tasks;
pub mod types;
pub mod users;

pub use auth::*;
pub use health::*;
pub use tasks::*;
pub use users::*;

pub use types::*;
