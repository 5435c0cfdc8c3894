//! Storage backends
//!
//! Users and tasks live behind two async traits so the web layer can run on
//! the in-memory backend (tests, `DATABASE_URL=memory`) or on SQLite without
//! knowing which one it holds.

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use crate::models::{Task, User};
use async_trait::async_trait;
use serde::Serialize;
use taskdesk_core::{Role, TaskPriority, TaskStatus, TaskdeskResult};

pub use memory::{MemoryTaskStorage, MemoryUserStorage};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteTaskStorage, SqliteUserStorage};

/// 1-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const MAX_LIMIT: u32 = 100;

    /// Clamp to page >= 1 and 1 <= limit <= MAX_LIMIT
    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }
}

/// One page of results plus the total match count
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub request: PageRequest,
}

impl<T> Page<T> {
    pub fn pages(&self) -> u64 {
        self.total.div_ceil(self.request.limit as u64)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            request: self.request,
        }
    }

    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.request.page,
            limit: self.request.limit,
            total: self.total,
            pages: self.pages(),
        }
    }
}

/// Pagination block returned with every list response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

/// Filters for listing users; results are newest first
#[derive(Debug, Clone)]
pub struct UserQuery {
    pub role: Option<Role>,
    /// Case-insensitive substring over first name, last name and email
    pub search: Option<String>,
    pub active_only: bool,
    pub page: PageRequest,
}

impl UserQuery {
    pub fn matches(&self, user: &User) -> bool {
        if self.active_only && !user.is_active {
            return false;
        }
        if let Some(role) = self.role {
            if user.role != role {
                return false;
            }
        }
        match self.search.as_deref().map(str::to_lowercase) {
            Some(needle) if !needle.is_empty() => {
                user.first_name.to_lowercase().contains(&needle)
                    || user.last_name.to_lowercase().contains(&needle)
                    || user.email.to_lowercase().contains(&needle)
            }
            _ => true,
        }
    }
}

/// Which tasks a listing may return
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskScope {
    All,
    AssignedTo(String),
    ReviewedBy(String),
    /// Reviewed by `reviewer` or assigned to one of `agents`
    Team {
        reviewer: String,
        agents: Vec<String>,
    },
}

impl TaskScope {
    pub fn contains(&self, task: &Task) -> bool {
        match self {
            TaskScope::All => true,
            TaskScope::AssignedTo(id) => &task.assigned_to == id,
            TaskScope::ReviewedBy(id) => task.qa_reviewer.as_ref() == Some(id),
            TaskScope::Team { reviewer, agents } => {
                task.qa_reviewer.as_ref() == Some(reviewer) || agents.contains(&task.assigned_to)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOrder {
    /// Most recently created first
    Newest,
    /// Priority descending, then due date ascending with undated tasks last
    Urgency,
}

#[derive(Debug, Clone)]
pub struct TaskQuery {
    pub scope: TaskScope,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub order: TaskOrder,
    pub page: PageRequest,
}

impl TaskQuery {
    pub fn matches(&self, task: &Task) -> bool {
        self.scope.contains(task)
            && self.status.map_or(true, |s| task.status == s)
            && self.priority.map_or(true, |p| task.priority == p)
    }

    pub fn sort(&self, tasks: &mut [Task]) {
        match self.order {
            TaskOrder::Newest => tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            TaskOrder::Urgency => tasks.sort_by(|a, b| {
                b.priority
                    .rank()
                    .cmp(&a.priority.rank())
                    .then_with(|| match (a.due_date, b.due_date) {
                        (Some(x), Some(y)) => x.cmp(&y),
                        (Some(_), None) => std::cmp::Ordering::Less,
                        (None, Some(_)) => std::cmp::Ordering::Greater,
                        (None, None) => std::cmp::Ordering::Equal,
                    })
                    .then_with(|| b.created_at.cmp(&a.created_at))
            }),
        }
    }
}

/// User persistence
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Insert a new user; a duplicate email is a `Conflict`
    async fn insert_user(&self, user: &User) -> TaskdeskResult<()>;

    async fn find_user(&self, id: &str) -> TaskdeskResult<Option<User>>;

    /// Look up by (lower-cased) email
    async fn find_user_by_email(&self, email: &str) -> TaskdeskResult<Option<User>>;

    /// Load several users at once; unknown ids are skipped
    async fn find_users(&self, ids: &[String]) -> TaskdeskResult<Vec<User>>;

    /// Replace a stored user; a duplicate email is a `Conflict`
    async fn update_user(&self, user: &User) -> TaskdeskResult<()>;

    async fn list_users(&self, query: &UserQuery) -> TaskdeskResult<Page<User>>;

    /// Active agents whose QA reviewer is `qa_id`
    async fn list_team(&self, qa_id: &str) -> TaskdeskResult<Vec<User>>;

    async fn count_users(&self) -> TaskdeskResult<u64>;

    async fn health_check(&self) -> TaskdeskResult<()>;
}

/// Task persistence
#[async_trait]
pub trait TaskStorage: Send + Sync {
    async fn insert_task(&self, task: &Task) -> TaskdeskResult<()>;

    async fn find_task(&self, id: &str) -> TaskdeskResult<Option<Task>>;

    /// Replace a stored task; `NotFound` when it no longer exists
    async fn update_task(&self, task: &Task) -> TaskdeskResult<()>;

    /// Hard delete; returns whether a task was removed
    async fn delete_task(&self, id: &str) -> TaskdeskResult<bool>;

    async fn list_tasks(&self, query: &TaskQuery) -> TaskdeskResult<Page<Task>>;

    async fn health_check(&self) -> TaskdeskResult<()>;
}
