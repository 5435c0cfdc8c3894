//! Task types

use super::common::{filters_or_error, parse_filter};
use crate::error::ApiResult;
use serde::{Deserialize, Serialize};
use taskdesk_applications::{Pagination, TaskFilters, TaskView};
use taskdesk_core::{TaskPriority, TaskStatus};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskData {
    pub task: TaskView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskListData {
    pub tasks: Vec<TaskView>,
    pub pagination: Pagination,
}

/// Query string for task listings
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TaskListQuery {
    /// pending, in-progress, completed or cancelled
    pub status: Option<String>,
    /// low, medium, high or urgent
    pub priority: Option<String>,
    #[param(example = 1)]
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl TaskListQuery {
    pub fn into_filters(self) -> ApiResult<TaskFilters> {
        let mut errors = Vec::new();
        let status = parse_filter::<TaskStatus>("status", self.status.as_deref(), &mut errors);
        let priority =
            parse_filter::<TaskPriority>("priority", self.priority.as_deref(), &mut errors);

        filters_or_error(
            TaskFilters {
                status,
                priority,
                page: self.page,
                limit: self.limit,
            },
            errors,
        )
    }
}
