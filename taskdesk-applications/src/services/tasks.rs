//! Task service
//!
//! Creation, listing and updates of tasks. Which tasks a caller can see is
//! derived from the permissions of their role:
//!
//! - `ViewAllTasks`: every task
//! - `ViewTeamTasks`: tasks they review plus tasks of their assigned agents
//! - `ViewAssignedTasks`: tasks assigned to them

use crate::auth::{AccessError, Permission, UserIdentity};
use crate::models::{NewTask, Task, TaskPatch, TaskView, User, UserSummary};
use crate::storage::{
    Page, PageRequest, TaskOrder, TaskQuery, TaskScope, TaskStorage, UserStorage,
};
use crate::{ApplicationError, ApplicationResult};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use taskdesk_core::{Role, TaskPriority, TaskStatus};
use tracing::{debug, info};

pub const DEFAULT_TASK_PAGE_SIZE: u32 = 20;
pub const DEFAULT_INBOX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Default)]
pub struct TaskFilters {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Clone)]
pub struct TaskService {
    users: Arc<dyn UserStorage>,
    tasks: Arc<dyn TaskStorage>,
}

impl TaskService {
    pub fn new(users: Arc<dyn UserStorage>, tasks: Arc<dyn TaskStorage>) -> Self {
        Self { users, tasks }
    }

    /// Validate the referenced users, then insert
    ///
    /// The two steps are not atomic: an agent deactivated in between still
    /// receives the task.
    pub async fn create(
        &self,
        actor: &UserIdentity,
        new_task: NewTask,
    ) -> ApplicationResult<TaskView> {
        self.require_user(&new_task.assigned_to, Role::Agent, "Invalid agent selected")
            .await?;
        if let Some(reviewer) = &new_task.qa_reviewer {
            self.require_user(reviewer, Role::Qa, "Invalid QA reviewer selected")
                .await?;
        }

        let task = new_task.into_task(&actor.id);
        self.tasks.insert_task(&task).await?;
        info!(task_id = %task.id, assigned_to = %task.assigned_to, actor = %actor.id, "Task created");

        self.populate_one(task).await
    }

    /// Tasks visible to `actor`, newest first
    pub async fn list(
        &self,
        actor: &UserIdentity,
        filters: TaskFilters,
    ) -> ApplicationResult<Page<TaskView>> {
        let scope = self.visible_scope(actor).await?;
        self.query(scope, TaskOrder::Newest, filters, DEFAULT_TASK_PAGE_SIZE)
            .await
    }

    /// Tasks the caller reviews as QA
    pub async fn review_queue(
        &self,
        actor: &UserIdentity,
        filters: TaskFilters,
    ) -> ApplicationResult<Page<TaskView>> {
        let scope = TaskScope::ReviewedBy(actor.id.clone());
        self.query(scope, TaskOrder::Newest, filters, DEFAULT_INBOX_PAGE_SIZE)
            .await
    }

    /// Tasks assigned to the caller, most urgent first
    pub async fn work_queue(
        &self,
        actor: &UserIdentity,
        filters: TaskFilters,
    ) -> ApplicationResult<Page<TaskView>> {
        let scope = TaskScope::AssignedTo(actor.id.clone());
        self.query(scope, TaskOrder::Urgency, filters, DEFAULT_INBOX_PAGE_SIZE)
            .await
    }

    pub async fn get(&self, actor: &UserIdentity, id: &str) -> ApplicationResult<TaskView> {
        let task = self.find_visible(actor, id).await?;
        self.populate_one(task).await
    }

    /// Apply a partial update
    ///
    /// Holders of `UpdateTasks` may change any field of a task they can see.
    /// Holders of `UpdateTaskStatus` may only change the status of their own
    /// tasks.
    pub async fn update(
        &self,
        actor: &UserIdentity,
        id: &str,
        patch: &TaskPatch,
    ) -> ApplicationResult<TaskView> {
        let mut task = self.find_visible(actor, id).await?;

        if actor.has_permission(Permission::UpdateTasks) {
            if let Some(agent) = &patch.assigned_to {
                self.require_user(agent, Role::Agent, "Invalid agent selected")
                    .await?;
            }
            if let Some(reviewer) = &patch.qa_reviewer {
                self.require_user(reviewer, Role::Qa, "Invalid QA reviewer selected")
                    .await?;
            }
        } else if !(actor.has_permission(Permission::UpdateTaskStatus)
            && patch.is_status_only()
            && task.assigned_to == actor.id)
        {
            return Err(AccessError::MissingPermission {
                permission: Permission::UpdateTasks,
            }
            .into());
        }

        patch.apply(&mut task);
        self.tasks.update_task(&task).await?;
        info!(task_id = %task.id, actor = %actor.id, status = %task.status, "Task updated");

        self.populate_one(task).await
    }

    /// Hard delete
    pub async fn delete(&self, actor: &UserIdentity, id: &str) -> ApplicationResult<()> {
        if !self.tasks.delete_task(id).await? {
            return Err(ApplicationError::not_found("Task"));
        }
        info!(task_id = %id, actor = %actor.id, "Task deleted");
        Ok(())
    }

    async fn require_user(&self, id: &str, role: Role, message: &str) -> ApplicationResult<User> {
        match self.users.find_user(id).await? {
            Some(user) if user.role == role && user.is_active => Ok(user),
            _ => Err(ApplicationError::bad_request(message)),
        }
    }

    async fn visible_scope(&self, actor: &UserIdentity) -> ApplicationResult<TaskScope> {
        if actor.has_permission(Permission::ViewAllTasks) {
            Ok(TaskScope::All)
        } else if actor.has_permission(Permission::ViewTeamTasks) {
            let agents = self
                .users
                .list_team(&actor.id)
                .await?
                .into_iter()
                .map(|u| u.id)
                .collect();
            Ok(TaskScope::Team {
                reviewer: actor.id.clone(),
                agents,
            })
        } else if actor.has_permission(Permission::ViewAssignedTasks) {
            Ok(TaskScope::AssignedTo(actor.id.clone()))
        } else {
            Err(AccessError::MissingPermission {
                permission: Permission::ViewAssignedTasks,
            }
            .into())
        }
    }

    /// Load a task, reporting tasks outside the caller's scope as missing
    async fn find_visible(&self, actor: &UserIdentity, id: &str) -> ApplicationResult<Task> {
        let task = self
            .tasks
            .find_task(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Task"))?;

        if self.visible_scope(actor).await?.contains(&task) {
            Ok(task)
        } else {
            debug!(task_id = %id, actor = %actor.id, "Task outside caller scope");
            Err(ApplicationError::not_found("Task"))
        }
    }

    async fn query(
        &self,
        scope: TaskScope,
        order: TaskOrder,
        filters: TaskFilters,
        default_limit: u32,
    ) -> ApplicationResult<Page<TaskView>> {
        let query = TaskQuery {
            scope,
            status: filters.status,
            priority: filters.priority,
            order,
            page: PageRequest::new(filters.page, filters.limit, default_limit),
        };
        let page = self.tasks.list_tasks(&query).await?;
        let views = self.populate(page.items).await?;
        Ok(Page {
            items: views,
            total: page.total,
            request: page.request,
        })
    }

    async fn populate_one(&self, task: Task) -> ApplicationResult<TaskView> {
        let mut views = self.populate(vec![task]).await?;
        views
            .pop()
            .ok_or_else(|| ApplicationError::not_found("Task"))
    }

    /// Resolve every user reference with a single storage round-trip
    async fn populate(&self, tasks: Vec<Task>) -> ApplicationResult<Vec<TaskView>> {
        let ids: Vec<String> = tasks
            .iter()
            .flat_map(|t| [Some(&t.assigned_to), Some(&t.assigned_by), t.qa_reviewer.as_ref()])
            .flatten()
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let summaries: HashMap<String, UserSummary> = self
            .users
            .find_users(&ids)
            .await?
            .iter()
            .map(|u| (u.id.clone(), u.summary()))
            .collect();

        Ok(tasks
            .into_iter()
            .map(|task| {
                let assigned_to = summaries.get(&task.assigned_to).cloned();
                let assigned_by = summaries.get(&task.assigned_by).cloned();
                let qa_reviewer = task
                    .qa_reviewer
                    .as_ref()
                    .and_then(|id| summaries.get(id).cloned());
                TaskView::new(task, assigned_to, assigned_by, qa_reviewer)
            })
            .collect())
    }
}
