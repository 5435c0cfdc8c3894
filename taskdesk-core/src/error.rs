//! Unified error handling system
//!
//! Provides structured error types with context and proper error chaining

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

pub type TaskdeskResult<T> = Result<T, TaskdeskError>;

/// Error context providing additional information for debugging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }
}

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Main error type for the Taskdesk domain and storage layers
#[derive(Error, Debug)]
pub enum TaskdeskError {
    #[error("Validation failed")]
    Validation { errors: Vec<FieldError> },

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("{message}")]
    Conflict { message: String },

    /// A well-formed request that references something unusable
    #[error("{message}")]
    BadRequest { message: String },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl TaskdeskError {
    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self::Validation { errors }
    }

    pub fn invalid_field(field: &str, message: &str) -> Self {
        Self::Validation {
            errors: vec![FieldError::new(field, message)],
        }
    }

    pub fn not_found(resource: &str) -> Self {
        Self::NotFound {
            resource: resource.to_string(),
        }
    }

    pub fn conflict(message: &str) -> Self {
        Self::Conflict {
            message: message.to_string(),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::BadRequest {
            message: message.to_string(),
        }
    }

    /// Wrap a backend failure raised by `component` during `operation`
    pub fn storage<E>(component: &str, operation: &str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            message: format!("{} failed: {}", operation, source),
            source: Some(Box::new(source)),
            context: ErrorContext::new(component).with_operation(operation),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            TaskdeskError::Storage { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            TaskdeskError::Validation { .. }
            | TaskdeskError::NotFound { .. }
            | TaskdeskError::Conflict { .. }
            | TaskdeskError::BadRequest { .. } => {
                warn!(error = %self, "Request rejected");
            }
            _ => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Error occurred"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_carries_context() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = TaskdeskError::storage("sqlite_users", "insert_user", io);

        let context = err.context().unwrap();
        assert_eq!(context.component, "sqlite_users");
        assert_eq!(context.operation.as_deref(), Some("insert_user"));
        assert!(err.to_string().contains("insert_user failed"));
    }

    #[test]
    fn test_invalid_field() {
        match TaskdeskError::invalid_field("email", "Email is required") {
            TaskdeskError::Validation { errors } => {
                assert_eq!(errors, vec![FieldError::new("email", "Email is required")]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
