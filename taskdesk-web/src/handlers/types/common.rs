//! Common types used across multiple handlers

use crate::error::ApiError;
use serde::Serialize;
use std::str::FromStr;
use taskdesk_core::FieldError;
use utoipa::ToSchema;

/// Health check response
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    #[schema(example = "OK")]
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[schema(example = "0.1.0")]
    pub version: String,
    /// Cache backend in use
    #[schema(example = "memory")]
    pub cache: String,
    pub uptime_seconds: u64,
}

/// Success envelope shared by every endpoint
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    #[schema(example = true)]
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Present on reads that may be served from the cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_cache: Option<bool>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            from_cache: None,
            data,
        }
    }

    pub fn with_message(message: &str, data: T) -> Self {
        Self {
            message: Some(message.to_string()),
            ..Self::ok(data)
        }
    }

    pub fn cached(mut self, from_cache: bool) -> Self {
        self.from_cache = Some(from_cache);
        self
    }
}

/// Envelope without a payload
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = true)]
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }
}

/// Error envelope, documented for OpenAPI
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    #[schema(example = false)]
    pub success: bool,
    pub message: String,
    pub errors: Option<Vec<FieldError>>,
    #[schema(example = "delete_users")]
    pub required_permission: Option<String>,
}

/// Parse an optional enum filter from a query string, collecting failures
pub(crate) fn parse_filter<T: FromStr>(
    field: &str,
    value: Option<&str>,
    errors: &mut Vec<FieldError>,
) -> Option<T> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            errors.push(FieldError::new(field, format!("Invalid {}: {}", field, value)));
            None
        }
    }
}

pub(crate) fn filters_or_error<T>(value: T, errors: Vec<FieldError>) -> Result<T, ApiError> {
    if errors.is_empty() {
        Ok(value)
    } else {
        Err(ApiError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskdesk_core::TaskStatus;

    #[test]
    fn test_envelope_shape() {
        let value = serde_json::to_value(ApiResponse::with_message("Done", 1)).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["message"], "Done");
        assert_eq!(value["data"], 1);
        assert!(value.get("fromCache").is_none());

        let value = serde_json::to_value(ApiResponse::ok(1).cached(true)).unwrap();
        assert_eq!(value["fromCache"], true);
        assert!(value.get("message").is_none());
    }

    #[test]
    fn test_parse_filter() {
        let mut errors = Vec::new();
        let status: Option<TaskStatus> = parse_filter("status", Some("in-progress"), &mut errors);
        assert_eq!(status, Some(TaskStatus::InProgress));

        let none: Option<TaskStatus> = parse_filter("status", Some(" "), &mut errors);
        assert!(none.is_none());
        assert!(errors.is_empty());

        let bad: Option<TaskStatus> = parse_filter("status", Some("sleeping"), &mut errors);
        assert!(bad.is_none());
        assert_eq!(errors.len(), 1);
        assert!(filters_or_error((), errors).is_err());
    }
}
