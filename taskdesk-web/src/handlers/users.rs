//! User management handlers

use super::types::{
    AgentData, ApiResponse, ErrorResponse, TaskListData, TaskListQuery, UserData, UserListData,
    UserListQuery,
};
use crate::{
    auth::CurrentUser,
    error::{ApiJson, ApiQuery, ApiResult},
    AppState,
};
use axum::{
    extract::{Path, State},
    response::Json,
};
use taskdesk_applications::validation::{AssignQaInput, UserUpdateInput};
use tracing::debug;

/// List active users
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    summary = "List users",
    description = "Active users, newest first. Admin and manager only.",
    params(UserListQuery),
    responses(
        (status = 200, description = "Users", body = ApiResponse<UserListData>),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse)
    ),
    security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserListQuery>,
) -> ApiResult<Json<ApiResponse<UserListData>>> {
    let page = state.users.list_users(query.into_filters()?).await?;
    let pagination = page.pagination();
    Ok(Json(ApiResponse::ok(UserListData {
        users: page.items,
        pagination,
    })))
}

/// Read one user, served from the identity cache when possible
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "Users",
    summary = "Get user",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User; `fromCache` tells where it was read from", body = ApiResponse<UserData>),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<UserData>>> {
    let lookup = state.users.get_user(&id).await?;
    debug!(user_id = %id, from_cache = lookup.from_cache, "User lookup");
    Ok(Json(
        ApiResponse::ok(UserData { user: lookup.user }).cached(lookup.from_cache),
    ))
}

/// Partially update a user
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "Users",
    summary = "Update user",
    description = "Nobody may change their own role. A duplicate email is rejected.",
    params(("id" = String, Path, description = "User id")),
    request_body = UserUpdateInput,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<UserData>),
        (status = 400, description = "Validation failed or duplicate email", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<UserUpdateInput>,
) -> ApiResult<Json<ApiResponse<UserData>>> {
    let patch = input.validate()?;
    let user = state.users.update_user(&actor, &id, &patch).await?;
    Ok(Json(ApiResponse::with_message(
        "User updated successfully",
        UserData { user },
    )))
}

/// Deactivate a user
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "Users",
    summary = "Delete user",
    description = "Soft delete. Admin only; nobody may delete their own account.",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User deactivated", body = ApiResponse<UserData>),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<UserData>>> {
    let user = state.users.deactivate_user(&actor, &id).await?;
    Ok(Json(ApiResponse::with_message(
        "User deleted successfully",
        UserData { user },
    )))
}

/// Attach an agent to a QA reviewer
#[utoipa::path(
    post,
    path = "/api/users/assign-qa",
    tag = "Users",
    summary = "Assign agent to QA",
    request_body = AssignQaInput,
    responses(
        (status = 200, description = "Agent assigned", body = ApiResponse<AgentData>),
        (status = 400, description = "Invalid agent or QA", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse)
    ),
    security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn assign_qa(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<AssignQaInput>,
) -> ApiResult<Json<ApiResponse<AgentData>>> {
    let (agent_id, qa_id) = input.validate()?;
    let agent = state.users.assign_qa(&agent_id, &qa_id).await?;
    Ok(Json(ApiResponse::with_message(
        "Agent assigned to QA successfully",
        AgentData { agent },
    )))
}

/// Tasks the calling QA reviews
#[utoipa::path(
    get,
    path = "/api/users/qa/tasks",
    tag = "Users",
    summary = "QA review queue",
    params(TaskListQuery),
    responses(
        (status = 200, description = "Tasks under review by the caller", body = ApiResponse<TaskListData>),
        (status = 403, description = "Forbidden", body = ErrorResponse)
    ),
    security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn qa_tasks(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiQuery(query): ApiQuery<TaskListQuery>,
) -> ApiResult<Json<ApiResponse<TaskListData>>> {
    let page = state
        .tasks
        .review_queue(&actor, query.into_filters()?)
        .await?;
    let pagination = page.pagination();
    Ok(Json(ApiResponse::ok(TaskListData {
        tasks: page.items,
        pagination,
    })))
}

/// Tasks assigned to the calling agent, most urgent first
#[utoipa::path(
    get,
    path = "/api/users/agent/tasks",
    tag = "Users",
    summary = "Agent work queue",
    params(TaskListQuery),
    responses(
        (status = 200, description = "Tasks assigned to the caller", body = ApiResponse<TaskListData>),
        (status = 403, description = "Forbidden", body = ErrorResponse)
    ),
    security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn agent_tasks(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiQuery(query): ApiQuery<TaskListQuery>,
) -> ApiResult<Json<ApiResponse<TaskListData>>> {
    let page = state.tasks.work_queue(&actor, query.into_filters()?).await?;
    let pagination = page.pagination();
    Ok(Json(
        ApiResponse::ok(TaskListData {
            tasks: page.items,
            pagination,
        })
        .cached(false),
    ))
}
