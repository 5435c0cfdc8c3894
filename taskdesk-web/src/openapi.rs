//! OpenAPI specification for the Taskdesk API

use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::auth::SESSION_COOKIE;
use crate::handlers::{
    AgentData, ErrorResponse, HealthResponse, LoginData, MessageResponse, SessionData, TaskData,
    TaskListData, UserData, UserListData,
};
use taskdesk_applications::validation::{
    AssignQaInput, LoginInput, RegisterInput, TaskInput, TaskUpdateInput, UserUpdateInput,
};
use taskdesk_applications::{Pagination, PublicUser, TaskView, UserSummary};
use taskdesk_core::{FieldError, QaStatus, Role, TaskPriority, TaskStatus};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Taskdesk API",
        version = "0.1.0",
        description = "Role-based task assignment: admins and managers hand tasks to agents, QA reviewers check them",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development server")
    ),
    paths(
        crate::handlers::health_check,

        crate::handlers::register,
        crate::handlers::login,
        crate::handlers::logout,
        crate::handlers::me,

        crate::handlers::list_users,
        crate::handlers::get_user,
        crate::handlers::update_user,
        crate::handlers::delete_user,
        crate::handlers::assign_qa,
        crate::handlers::qa_tasks,
        crate::handlers::agent_tasks,

        crate::handlers::create_task,
        crate::handlers::list_tasks,
        crate::handlers::get_task,
        crate::handlers::update_task,
        crate::handlers::delete_task,
    ),
    components(
        schemas(
            HealthResponse,
            MessageResponse,
            ErrorResponse,
            SessionData,
            LoginData,
            UserData,
            AgentData,
            UserListData,
            TaskData,
            TaskListData,
            RegisterInput,
            LoginInput,
            UserUpdateInput,
            AssignQaInput,
            TaskInput,
            TaskUpdateInput,
            PublicUser,
            UserSummary,
            TaskView,
            Pagination,
            FieldError,
            Role,
            TaskStatus,
            TaskPriority,
            QaStatus,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Auth", description = "Registration and sessions"),
        (name = "Users", description = "User administration and personal task queues"),
        (name = "Tasks", description = "Task assignment and updates"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Bearer header and session cookie schemes
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "cookie_auth",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(SESSION_COOKIE))),
            );
        }
    }
}

/// The OpenAPI document as pretty-printed JSON
pub fn openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let openapi = ApiDoc::openapi();
        assert_eq!(openapi.info.title, "Taskdesk API");
        assert!(openapi.paths.paths.contains_key("/api/users/{id}"));
        assert!(openapi.paths.paths.contains_key("/api/auth/login"));

        let components = openapi.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.security_schemes.contains_key("cookie_auth"));
    }

    #[test]
    fn test_openapi_json() {
        let json = openapi_json().unwrap();
        assert!(json.contains("Taskdesk API"));
        assert!(json.contains("requiredPermission"));
        assert!(!json.contains("passwordHash"));
    }
}
