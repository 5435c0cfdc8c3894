//! Request validation
//!
//! Raw inputs deserialize with every field optional so that all problems can
//! be collected and reported together instead of failing on the first one.

use crate::models::{NewTask, TaskPatch, UserPatch};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use taskdesk_core::{FieldError, QaStatus, Role, TaskPriority, TaskStatus, TaskdeskError, TaskdeskResult};

static NAME_REGEX: OnceLock<Regex> = OnceLock::new();
static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();

pub const NAME_MIN: usize = 2;
pub const NAME_MAX: usize = 50;
pub const PASSWORD_MIN: usize = 8;
pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 200;
pub const DESCRIPTION_MAX: usize = 1000;

fn is_valid_name(name: &str) -> bool {
    let regex = NAME_REGEX.get_or_init(|| Regex::new(r"^[a-zA-Z\s]+$").expect("name regex"));
    regex.is_match(name)
}

pub fn is_valid_email(email: &str) -> bool {
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[a-zA-Z]{2,}$").expect("email regex")
    });
    regex.is_match(email) && email.len() <= 254
}

/// Lower-case and trim an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC)
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[derive(Default)]
struct Collector {
    errors: Vec<FieldError>,
}

impl Collector {
    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    fn required<'a>(&mut self, field: &str, value: &'a Option<String>, message: &str) -> Option<&'a str> {
        match value.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => Some(v),
            _ => {
                self.push(field, message);
                None
            }
        }
    }

    fn name(&mut self, field: &str, label: &str, value: &str) {
        let len = value.chars().count();
        if len < NAME_MIN || len > NAME_MAX {
            self.push(
                field,
                format!("{} must be between {} and {} characters", label, NAME_MIN, NAME_MAX),
            );
        } else if !is_valid_name(value) {
            self.push(field, format!("{} can only contain letters and spaces", label));
        }
    }

    fn email(&mut self, value: &str) -> String {
        let email = normalize_email(value);
        if !is_valid_email(&email) {
            self.push("email", "Please enter a valid email address");
        }
        email
    }

    fn role(&mut self, value: &str) -> Option<Role> {
        match value.parse::<Role>() {
            Ok(role) => Some(role),
            Err(_) => {
                self.push("role", "Role must be one of admin, manager, qa, agent");
                None
            }
        }
    }

    fn title(&mut self, value: &str) {
        let len = value.chars().count();
        if len < TITLE_MIN || len > TITLE_MAX {
            self.push(
                "title",
                format!("Title must be between {} and {} characters", TITLE_MIN, TITLE_MAX),
            );
        }
    }

    fn description(&mut self, value: &str) {
        if value.chars().count() > DESCRIPTION_MAX {
            self.push(
                "description",
                format!("Description cannot exceed {} characters", DESCRIPTION_MAX),
            );
        }
    }

    fn priority(&mut self, value: &str) -> Option<TaskPriority> {
        match value.parse() {
            Ok(priority) => Some(priority),
            Err(_) => {
                self.push("priority", "Priority must be one of low, medium, high, critical");
                None
            }
        }
    }

    fn timestamp(&mut self, field: &str, value: &str) -> Option<DateTime<Utc>> {
        let parsed = parse_timestamp(value);
        if parsed.is_none() {
            self.push(field, format!("{} must be a valid date", field));
        }
        parsed
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> TaskdeskResult<T> {
        if self.errors.is_empty() {
            Ok(value())
        } else {
            Err(TaskdeskError::validation(self.errors))
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    /// One of admin, manager, qa, agent; defaults to agent
    pub role: Option<String>,
}

/// A registration that passed validation
#[derive(Debug, Clone)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl RegisterInput {
    pub fn validate(&self) -> TaskdeskResult<Registration> {
        let mut c = Collector::default();

        let first_name = c.required("firstName", &self.first_name, "First name is required");
        if let Some(v) = first_name {
            c.name("firstName", "First name", v);
        }
        let last_name = c.required("lastName", &self.last_name, "Last name is required");
        if let Some(v) = last_name {
            c.name("lastName", "Last name", v);
        }
        let email = c
            .required("email", &self.email, "Email is required")
            .map(|v| c.email(v));
        let password = match self.password.as_deref() {
            None | Some("") => {
                c.push("password", "Password is required");
                None
            }
            Some(p) if p.chars().count() < PASSWORD_MIN => {
                c.push("password", "Password must be at least 8 characters");
                None
            }
            Some(p) => Some(p),
        };
        let role = match self.role.as_deref() {
            Some(r) => c.role(r),
            None => Some(Role::default()),
        };

        c.finish(|| Registration {
            first_name: first_name.unwrap_or_default().to_string(),
            last_name: last_name.unwrap_or_default().to_string(),
            email: email.unwrap_or_default(),
            password: password.unwrap_or_default().to_string(),
            role: role.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LoginInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    pub fn validate(&self) -> TaskdeskResult<Credentials> {
        let mut c = Collector::default();
        let email = c
            .required("email", &self.email, "Email is required")
            .map(|v| c.email(v));
        let password = match self.password.as_deref() {
            Some(p) if !p.is_empty() => Some(p),
            _ => {
                c.push("password", "Password is required");
                None
            }
        };
        c.finish(|| Credentials {
            email: email.unwrap_or_default(),
            password: password.unwrap_or_default().to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UserUpdateInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

impl UserUpdateInput {
    pub fn validate(&self) -> TaskdeskResult<UserPatch> {
        let mut c = Collector::default();
        let mut patch = UserPatch::default();

        if let Some(v) = self.first_name.as_deref() {
            c.name("firstName", "First name", v.trim());
            patch.first_name = Some(v.trim().to_string());
        }
        if let Some(v) = self.last_name.as_deref() {
            c.name("lastName", "Last name", v.trim());
            patch.last_name = Some(v.trim().to_string());
        }
        if let Some(v) = self.email.as_deref() {
            patch.email = Some(c.email(v));
        }
        if let Some(v) = self.role.as_deref() {
            patch.role = c.role(v);
        }
        patch.is_active = self.is_active;

        if c.errors.is_empty() && patch.is_empty() {
            c.push("body", "At least one field must be provided");
        }
        c.finish(|| patch)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AssignQaInput {
    pub agent_id: Option<String>,
    pub qa_id: Option<String>,
}

impl AssignQaInput {
    pub fn validate(&self) -> TaskdeskResult<(String, String)> {
        let mut c = Collector::default();
        let agent_id = c.required("agentId", &self.agent_id, "Agent is required");
        let qa_id = c.required("qaId", &self.qa_id, "QA is required");
        c.finish(|| {
            (
                agent_id.unwrap_or_default().to_string(),
                qa_id.unwrap_or_default().to_string(),
            )
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub priority: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`, must lie in the future
    pub due_date: Option<String>,
    pub qa_reviewer: Option<String>,
}

impl TaskInput {
    pub fn validate(&self, now: DateTime<Utc>) -> TaskdeskResult<NewTask> {
        let mut c = Collector::default();

        let title = c.required("title", &self.title, "Title is required");
        if let Some(v) = title {
            c.title(v);
        }
        if let Some(v) = self.description.as_deref() {
            c.description(v);
        }
        let assigned_to = c.required("assignedTo", &self.assigned_to, "Assigned agent is required");
        let priority = match self.priority.as_deref() {
            Some(p) => c.priority(p),
            None => Some(TaskPriority::default()),
        };
        let due_date = match self.due_date.as_deref() {
            Some(d) => match c.timestamp("dueDate", d) {
                Some(ts) if ts <= now => {
                    c.push("dueDate", "Due date must be in the future");
                    None
                }
                other => other,
            },
            None => None,
        };
        let qa_reviewer = self
            .qa_reviewer
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        c.finish(|| NewTask {
            title: title.unwrap_or_default().to_string(),
            description: self.description.clone().filter(|d| !d.is_empty()),
            assigned_to: assigned_to.unwrap_or_default().to_string(),
            priority: priority.unwrap_or_default(),
            due_date,
            qa_reviewer,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdateInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub completed_at: Option<String>,
    pub qa_reviewer: Option<String>,
    pub qa_status: Option<String>,
}

impl TaskUpdateInput {
    pub fn validate(&self) -> TaskdeskResult<TaskPatch> {
        let mut c = Collector::default();
        let mut patch = TaskPatch::default();

        if let Some(v) = self.title.as_deref() {
            c.title(v.trim());
            patch.title = Some(v.trim().to_string());
        }
        if let Some(v) = self.description.as_deref() {
            c.description(v);
            patch.description = Some(v.to_string());
        }
        patch.assigned_to = self.assigned_to.clone();
        if let Some(v) = self.status.as_deref() {
            match v.parse::<TaskStatus>() {
                Ok(status) => patch.status = Some(status),
                Err(_) => c.push(
                    "status",
                    "Status must be one of pending, in-progress, completed, cancelled",
                ),
            }
        }
        if let Some(v) = self.priority.as_deref() {
            patch.priority = c.priority(v);
        }
        if let Some(v) = self.due_date.as_deref() {
            patch.due_date = c.timestamp("dueDate", v);
        }
        if let Some(v) = self.completed_at.as_deref() {
            patch.completed_at = c.timestamp("completedAt", v);
        }
        patch.qa_reviewer = self.qa_reviewer.clone();
        if let Some(v) = self.qa_status.as_deref() {
            match v.parse::<QaStatus>() {
                Ok(qa_status) => patch.qa_status = Some(qa_status),
                Err(_) => c.push(
                    "qaStatus",
                    "QA status must be one of pending-review, approved, needs-revision",
                ),
            }
        }

        c.finish(|| patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fields(err: TaskdeskError) -> Vec<String> {
        match err {
            TaskdeskError::Validation { errors } => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    fn register() -> RegisterInput {
        RegisterInput {
            first_name: Some("Grace".to_string()),
            last_name: Some("Hopper".to_string()),
            email: Some("  Grace@Navy.MIL ".to_string()),
            password: Some("cobol-rules".to_string()),
            role: None,
        }
    }

    #[test]
    fn test_register_normalizes_and_defaults_role() {
        let reg = register().validate().unwrap();
        assert_eq!(reg.email, "grace@navy.mil");
        assert_eq!(reg.role, Role::Agent);
    }

    #[test]
    fn test_register_collects_every_error() {
        let input = RegisterInput {
            first_name: Some("G".to_string()),
            last_name: Some("H0pper".to_string()),
            email: Some("not-an-email".to_string()),
            password: Some("short".to_string()),
            role: Some("owner".to_string()),
        };
        let fields = fields(input.validate().unwrap_err());
        assert_eq!(fields, vec!["firstName", "lastName", "email", "password", "role"]);
    }

    #[test]
    fn test_register_missing_fields() {
        let fields = fields(RegisterInput::default().validate().unwrap_err());
        assert_eq!(fields, vec!["firstName", "lastName", "email", "password"]);
    }

    #[test]
    fn test_login_requires_both_fields() {
        let input = LoginInput {
            email: Some("a@b.co".to_string()),
            password: None,
        };
        assert_eq!(fields(input.validate().unwrap_err()), vec!["password"]);
    }

    #[test]
    fn test_user_update_requires_a_field() {
        let fields = fields(UserUpdateInput::default().validate().unwrap_err());
        assert_eq!(fields, vec!["body"]);

        let patch = UserUpdateInput {
            is_active: Some(false),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(patch.is_active, Some(false));
    }

    #[test]
    fn test_task_due_date_must_be_future() {
        let now = Utc::now();
        let input = TaskInput {
            title: Some("Fix login".to_string()),
            assigned_to: Some("agent-1".to_string()),
            due_date: Some((now - Duration::days(1)).to_rfc3339()),
            ..Default::default()
        };
        assert_eq!(fields(input.validate(now).unwrap_err()), vec!["dueDate"]);

        let input = TaskInput {
            due_date: Some((now + Duration::days(1)).to_rfc3339()),
            ..input
        };
        let task = input.validate(now).unwrap();
        assert_eq!(task.priority, TaskPriority::Medium);
        assert!(task.due_date.is_some());
    }

    #[test]
    fn test_task_title_bounds() {
        let input = TaskInput {
            title: Some("ab".to_string()),
            assigned_to: Some("agent-1".to_string()),
            description: Some("x".repeat(DESCRIPTION_MAX + 1)),
            ..Default::default()
        };
        assert_eq!(
            fields(input.validate(Utc::now()).unwrap_err()),
            vec!["title", "description"]
        );
    }

    #[test]
    fn test_task_update_parses_enums() {
        let patch = TaskUpdateInput {
            status: Some("in-progress".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(patch.status, Some(TaskStatus::InProgress));

        let err = TaskUpdateInput {
            status: Some("done".to_string()),
            qa_status: Some("rejected".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(fields(err), vec!["status", "qaStatus"]);
    }

    #[test]
    fn test_parse_timestamp_accepts_plain_date() {
        let ts = parse_timestamp("2030-01-15").unwrap();
        assert_eq!(ts.to_rfc3339(), "2030-01-15T00:00:00+00:00");
        assert!(parse_timestamp("next tuesday").is_none());
    }
}
