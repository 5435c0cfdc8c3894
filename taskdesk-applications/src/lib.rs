//! Taskdesk Applications - the domain layer behind the HTTP API
//!
//! This crate owns everything that does not depend on HTTP:
//!
//! - Role/permission matrix and access checks
//! - User and task records and their validation
//! - Storage traits with in-memory and SQLite backends
//! - Task and user-directory services
//!
//! ## Architecture
//!
//! - **Core** (taskdesk-core): shared enums, errors, logging
//! - **Applications** (this crate): domain rules and persistence
//! - **Presentation** (taskdesk-web): HTTP, sessions, caching

pub mod auth;
pub mod models;
pub mod services;
pub mod storage;
pub mod validation;

pub use auth::{AccessError, AccessPolicy, Permission, UserIdentity};
pub use models::{NewTask, PublicUser, Task, TaskPatch, TaskView, User, UserPatch, UserSummary};
pub use services::{TaskFilters, TaskService, UserDirectory, UserFilters};
pub use storage::{Page, PageRequest, Pagination, TaskStorage, UserStorage};

/// Application-level error type
#[derive(Debug, thiserror::Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Core(#[from] taskdesk_core::TaskdeskError),

    #[error(transparent)]
    Access(#[from] AccessError),
}

pub type ApplicationResult<T> = Result<T, ApplicationError>;

impl ApplicationError {
    pub fn not_found(resource: &str) -> Self {
        Self::Core(taskdesk_core::TaskdeskError::not_found(resource))
    }

    pub fn bad_request(message: &str) -> Self {
        Self::Core(taskdesk_core::TaskdeskError::bad_request(message))
    }
}
