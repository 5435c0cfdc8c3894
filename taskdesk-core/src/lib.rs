//! Taskdesk Core - shared data types, error handling and logging
//!
//! This crate holds the pieces every other Taskdesk crate depends on: the
//! closed role/status enumerations, the unified error type and the tracing
//! bootstrap.

pub mod error;
pub mod logging;
pub mod types;

pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use tracing;
