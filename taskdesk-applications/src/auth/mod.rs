//! Access control
//!
//! Caller identity, the role/permission matrix and the checks that combine
//! them.

pub mod context;
pub mod identity;
pub mod permissions;

pub use context::{forbid_self, require_permission, require_role, AccessError, AccessPolicy};
pub use identity::UserIdentity;
pub use permissions::{permission_set, permissions_for, role_has_permission, Permission};
