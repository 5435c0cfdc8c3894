//! Task handlers

use super::types::{ApiResponse, ErrorResponse, MessageResponse, TaskData, TaskListData, TaskListQuery};
use crate::{
    auth::CurrentUser,
    error::{ApiJson, ApiQuery, ApiResult},
    AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use taskdesk_applications::validation::{TaskInput, TaskUpdateInput};

/// Assign a new task to an agent
#[utoipa::path(
    post,
    path = "/api/tasks",
    tag = "Tasks",
    summary = "Create task",
    description = "Admin and manager only. `assignedTo` must be an active agent and `qaReviewer`, when given, an active QA.",
    request_body = TaskInput,
    responses(
        (status = 201, description = "Task assigned", body = ApiResponse<TaskData>),
        (status = 400, description = "Validation failed or invalid assignee", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse)
    ),
    security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn create_task(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiJson(input): ApiJson<TaskInput>,
) -> ApiResult<(StatusCode, Json<ApiResponse<TaskData>>)> {
    let new_task = input.validate(Utc::now())?;
    let task = state.tasks.create(&actor, new_task).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Task assigned successfully",
            TaskData { task },
        )),
    ))
}

/// Tasks visible to the caller
#[utoipa::path(
    get,
    path = "/api/tasks",
    tag = "Tasks",
    summary = "List tasks",
    description = "Admins and managers see every task, QA their review and team tasks, agents their own.",
    params(TaskListQuery),
    responses(
        (status = 200, description = "Tasks", body = ApiResponse<TaskListData>),
        (status = 400, description = "Invalid filter", body = ErrorResponse)
    ),
    security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiQuery(query): ApiQuery<TaskListQuery>,
) -> ApiResult<Json<ApiResponse<TaskListData>>> {
    let page = state.tasks.list(&actor, query.into_filters()?).await?;
    let pagination = page.pagination();
    Ok(Json(ApiResponse::ok(TaskListData {
        tasks: page.items,
        pagination,
    })))
}

#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    tag = "Tasks",
    summary = "Get task",
    params(("id" = String, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task", body = ApiResponse<TaskData>),
        (status = 404, description = "Task not found or not visible", body = ErrorResponse)
    ),
    security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn get_task(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<TaskData>>> {
    let task = state.tasks.get(&actor, &id).await?;
    Ok(Json(ApiResponse::ok(TaskData { task })))
}

/// Partially update a task
#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    tag = "Tasks",
    summary = "Update task",
    description = "Agents may only change the status of their own tasks.",
    params(("id" = String, Path, description = "Task id")),
    request_body = TaskUpdateInput,
    responses(
        (status = 200, description = "Task updated", body = ApiResponse<TaskData>),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn update_task(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<TaskUpdateInput>,
) -> ApiResult<Json<ApiResponse<TaskData>>> {
    let patch = input.validate()?;
    let task = state.tasks.update(&actor, &id, &patch).await?;
    Ok(Json(ApiResponse::with_message(
        "Task updated successfully",
        TaskData { task },
    )))
}

#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    tag = "Tasks",
    summary = "Delete task",
    description = "Admin and manager only; permanent.",
    params(("id" = String, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task deleted", body = MessageResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn delete_task(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.tasks.delete(&actor, &id).await?;
    Ok(Json(MessageResponse::new("Task deleted successfully")))
}
