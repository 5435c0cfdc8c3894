//! Task records

use super::user::UserSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskdesk_core::{QaStatus, TaskPriority, TaskStatus};

/// Stored task record; user references are ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub assigned_to: String,
    pub assigned_by: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub qa_reviewer: Option<String>,
    pub qa_status: Option<QaStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated task ready to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub assigned_to: String,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub qa_reviewer: Option<String>,
}

impl NewTask {
    pub fn into_task(self, assigned_by: &str) -> Task {
        let now = Utc::now();
        Task {
            id: uuid::Uuid::new_v4().to_string(),
            title: self.title,
            description: self.description,
            assigned_to: self.assigned_to,
            assigned_by: assigned_by.to_string(),
            status: TaskStatus::Pending,
            priority: self.priority,
            due_date: self.due_date,
            completed_at: None,
            qa_status: self.qa_reviewer.as_ref().map(|_| QaStatus::PendingReview),
            qa_reviewer: self.qa_reviewer,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a task; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub qa_reviewer: Option<String>,
    pub qa_status: Option<QaStatus>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self == &TaskPatch::default()
    }

    /// True when the patch touches nothing but `status`
    pub fn is_status_only(&self) -> bool {
        self.status.is_some()
            && TaskPatch {
                status: None,
                ..self.clone()
            }
            .is_empty()
    }

    pub fn apply(&self, task: &mut Task) {
        let now = Utc::now();
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = Some(description.clone());
        }
        if let Some(assigned_to) = &self.assigned_to {
            task.assigned_to = assigned_to.clone();
        }
        if let Some(status) = self.status {
            task.status = status;
            if status == TaskStatus::Completed && self.completed_at.is_none() {
                task.completed_at = Some(now);
            }
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = Some(due_date);
        }
        if let Some(completed_at) = self.completed_at {
            task.completed_at = Some(completed_at);
        }
        if let Some(qa_reviewer) = &self.qa_reviewer {
            task.qa_reviewer = Some(qa_reviewer.clone());
        }
        if let Some(qa_status) = self.qa_status {
            task.qa_status = Some(qa_status);
        }
        task.updated_at = now;
    }
}

/// Task with its user references populated, as returned over the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub assigned_to: Option<UserSummary>,
    pub assigned_by: Option<UserSummary>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub qa_reviewer: Option<UserSummary>,
    pub qa_status: Option<QaStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskView {
    pub fn new(
        task: Task,
        assigned_to: Option<UserSummary>,
        assigned_by: Option<UserSummary>,
        qa_reviewer: Option<UserSummary>,
    ) -> Self {
        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            assigned_to,
            assigned_by,
            status: task.status,
            priority: task.priority,
            due_date: task.due_date,
            completed_at: task.completed_at,
            qa_reviewer,
            qa_status: task.qa_status,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task() -> NewTask {
        NewTask {
            title: "Write report".to_string(),
            description: None,
            assigned_to: "agent-1".to_string(),
            priority: TaskPriority::High,
            due_date: None,
            qa_reviewer: None,
        }
    }

    #[test]
    fn test_new_task_defaults_to_pending() {
        let task = new_task().into_task("admin-1");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.assigned_by, "admin-1");
        assert_eq!(task.qa_status, None);
    }

    #[test]
    fn test_qa_reviewer_starts_pending_review() {
        let task = NewTask {
            qa_reviewer: Some("qa-1".to_string()),
            ..new_task()
        }
        .into_task("admin-1");
        assert_eq!(task.qa_status, Some(QaStatus::PendingReview));
    }

    #[test]
    fn test_completing_stamps_completed_at() {
        let mut task = new_task().into_task("admin-1");
        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            ..Default::default()
        };
        assert!(patch.is_status_only());

        patch.apply(&mut task);
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn test_status_only_detection() {
        let patch = TaskPatch {
            status: Some(TaskStatus::InProgress),
            title: Some("Other".to_string()),
            ..Default::default()
        };
        assert!(!patch.is_status_only());
        assert!(!TaskPatch::default().is_status_only());
    }

    #[test]
    fn test_task_serializes_camel_case() {
        let task = new_task().into_task("admin-1");
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["assignedTo"], "agent-1");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["priority"], "high");
    }
}
