//! HTTP error responses
//!
//! Every failure leaves the server as `{ "success": false, "message": ... }`
//! with the matching status code. Internal details are attached to the
//! response as an [`ErrorDetail`] extension and only written into the body by
//! [`expose_error_details`], which is installed in development mode.

use crate::auth::jwt::TokenError;
use axum::{
    body::{to_bytes, Body},
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Query, Request,
    },
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use taskdesk_applications::{AccessError, ApplicationError};
use taskdesk_core::{FieldError, TaskdeskError};
use tracing::{error, warn};

const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    /// Duplicate data; reported as 400 like other client mistakes
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{message}")]
    Forbidden {
        message: String,
        required_permission: Option<String>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{message}")]
    Internal {
        message: String,
        detail: Option<String>,
    },
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Underlying cause of a 500, surfaced in development only
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    success: bool,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a [FieldError]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    required_permission: Option<&'a str>,
}

impl ApiError {
    pub fn internal(detail: impl ToString) -> Self {
        Self::Internal {
            message: INTERNAL_MESSAGE.to_string(),
            detail: Some(detail.to_string()),
        }
    }

    pub fn not_found(resource: &str) -> Self {
        Self::NotFound(format!("{} not found", resource))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) | ApiError::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        let body = ErrorBody {
            success: false,
            message: &message,
            errors: match &self {
                ApiError::Validation(errors) => Some(errors),
                _ => None,
            },
            required_permission: match &self {
                ApiError::Forbidden {
                    required_permission,
                    ..
                } => required_permission.as_deref(),
                _ => None,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        if let ApiError::Internal {
            detail: Some(detail),
            ..
        } = self
        {
            response.extensions_mut().insert(ErrorDetail(detail));
        }
        response
    }
}

impl From<TaskdeskError> for ApiError {
    fn from(err: TaskdeskError) -> Self {
        err.log();
        match err {
            TaskdeskError::Validation { errors } => ApiError::Validation(errors),
            TaskdeskError::NotFound { resource } => ApiError::not_found(&resource),
            TaskdeskError::Conflict { message } => ApiError::Conflict(message),
            TaskdeskError::BadRequest { message } => ApiError::BadRequest(message),
            other => ApiError::internal(other),
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        let message = err.to_string();
        match err {
            AccessError::Unauthenticated => ApiError::Unauthenticated(message),
            AccessError::RoleNotAllowed { role } => {
                warn!(role = %role, "Role not allowed");
                ApiError::Forbidden {
                    message,
                    required_permission: None,
                }
            }
            AccessError::MissingPermission { permission } => {
                warn!(permission = %permission, "Permission denied");
                ApiError::Forbidden {
                    message,
                    required_permission: Some(permission.to_string()),
                }
            }
            AccessError::SelfModification { .. } => ApiError::Forbidden {
                message,
                required_permission: None,
            },
        }
    }
}

impl From<ApplicationError> for ApiError {
    fn from(err: ApplicationError) -> Self {
        match err {
            ApplicationError::Core(e) => e.into(),
            ApplicationError::Access(e) => e.into(),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Missing | TokenError::Invalid | TokenError::Expired | TokenError::Revoked => {
                ApiError::Unauthenticated(err.to_string())
            }
            TokenError::VerificationFailed => ApiError::Internal {
                message: err.to_string(),
                detail: None,
            },
            TokenError::Creation => ApiError::internal(err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// `Json` extractor whose rejection uses the API error shape
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Query` extractor whose rejection uses the API error shape
#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Copy [`ErrorDetail`] into the JSON body as `error`
pub async fn expose_error_details(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to read error body: {}", e);
            return (parts.status, Json(serde_json::json!({
                "success": false,
                "message": INTERNAL_MESSAGE,
                "error": detail,
            })))
                .into_response();
        }
    };

    let mut value: Value = serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::Object(Default::default()));
    if let Value::Object(map) = &mut value {
        map.insert("error".to_string(), Value::String(detail));
    }

    let body = serde_json::to_vec(&value).unwrap_or_else(|_| bytes.to_vec());
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(body))
}
