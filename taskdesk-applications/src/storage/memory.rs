//! In-memory storage
//!
//! Default backend for tests and `DATABASE_URL=memory`. Data is lost on
//! restart.

use super::{Page, TaskQuery, TaskStorage, UserQuery, UserStorage};
use crate::models::{Task, User};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use taskdesk_core::{Role, TaskdeskError, TaskdeskResult};
use tokio::sync::RwLock;
use tracing::debug;

const DUPLICATE_EMAIL: &str = "User already exists with this email.";

#[derive(Debug, Clone, Default)]
pub struct MemoryUserStorage {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl MemoryUserStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_taken(users: &HashMap<String, User>, email: &str, except_id: &str) -> bool {
    users
        .values()
        .any(|u| u.id != except_id && u.email.eq_ignore_ascii_case(email))
}

#[async_trait]
impl UserStorage for MemoryUserStorage {
    async fn insert_user(&self, user: &User) -> TaskdeskResult<()> {
        let mut users = self.users.write().await;
        if email_taken(&users, &user.email, &user.id) {
            return Err(TaskdeskError::conflict(DUPLICATE_EMAIL));
        }
        users.insert(user.id.clone(), user.clone());
        debug!(user_id = %user.id, "Inserted user into memory storage");
        Ok(())
    }

    async fn find_user(&self, id: &str) -> TaskdeskResult<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> TaskdeskResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_users(&self, ids: &[String]) -> TaskdeskResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn update_user(&self, user: &User) -> TaskdeskResult<()> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(TaskdeskError::not_found("User"));
        }
        if email_taken(&users, &user.email, &user.id) {
            return Err(TaskdeskError::conflict(DUPLICATE_EMAIL));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn list_users(&self, query: &UserQuery) -> TaskdeskResult<Page<User>> {
        let users = self.users.read().await;
        let mut matched: Vec<User> = users.values().filter(|u| query.matches(u)).cloned().collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(query.page.offset())
            .take(query.page.limit as usize)
            .collect();

        Ok(Page {
            items,
            total,
            request: query.page,
        })
    }

    async fn list_team(&self, qa_id: &str) -> TaskdeskResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .filter(|u| u.is_active && u.role == Role::Agent)
            .filter(|u| u.assigned_qa.as_deref() == Some(qa_id))
            .cloned()
            .collect())
    }

    async fn count_users(&self) -> TaskdeskResult<u64> {
        Ok(self.users.read().await.len() as u64)
    }

    async fn health_check(&self) -> TaskdeskResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTaskStorage {
    tasks: Arc<RwLock<HashMap<String, Task>>>,
}

impl MemoryTaskStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStorage for MemoryTaskStorage {
    async fn insert_task(&self, task: &Task) -> TaskdeskResult<()> {
        self.tasks
            .write()
            .await
            .insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn find_task(&self, id: &str) -> TaskdeskResult<Option<Task>> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn update_task(&self, task: &Task) -> TaskdeskResult<()> {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(&task.id) {
            Some(existing) => {
                *existing = task.clone();
                Ok(())
            }
            None => Err(TaskdeskError::not_found("Task")),
        }
    }

    async fn delete_task(&self, id: &str) -> TaskdeskResult<bool> {
        Ok(self.tasks.write().await.remove(id).is_some())
    }

    async fn list_tasks(&self, query: &TaskQuery) -> TaskdeskResult<Page<Task>> {
        let tasks = self.tasks.read().await;
        let mut matched: Vec<Task> = tasks.values().filter(|t| query.matches(t)).cloned().collect();
        query.sort(&mut matched);

        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(query.page.offset())
            .take(query.page.limit as usize)
            .collect();

        Ok(Page {
            items,
            total,
            request: query.page,
        })
    }

    async fn health_check(&self) -> TaskdeskResult<()> {
        Ok(())
    }
}
