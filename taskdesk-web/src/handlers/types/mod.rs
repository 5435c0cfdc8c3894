//! Request/response types used by the handlers

pub mod common;
pub mod tasks;
pub mod users;

pub use common::*;
pub use tasks::*;
pub use users::*;
