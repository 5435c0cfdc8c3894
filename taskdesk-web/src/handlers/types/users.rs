//! Authentication and user management types

use super::common::{filters_or_error, parse_filter};
use crate::error::ApiResult;
use serde::{Deserialize, Serialize};
use taskdesk_applications::{Pagination, PublicUser, UserFilters};
use taskdesk_core::Role;
use utoipa::{IntoParams, ToSchema};

/// Returned by registration
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionData {
    pub user: PublicUser,
    pub token: String,
}

/// Returned by login
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginData {
    pub user: PublicUser,
    pub token: String,
    pub role: Role,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserData {
    pub user: PublicUser,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AgentData {
    pub agent: PublicUser,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListData {
    pub users: Vec<PublicUser>,
    pub pagination: Pagination,
}

/// Query string for listing users
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    /// One of admin, manager, qa, agent
    pub role: Option<String>,
    /// Substring of first name, last name or email
    pub search: Option<String>,
    #[param(example = 1)]
    pub page: Option<u32>,
    #[param(example = 10)]
    pub limit: Option<u32>,
}

impl UserListQuery {
    pub fn into_filters(self) -> ApiResult<UserFilters> {
        let mut errors = Vec::new();
        let role = parse_filter::<Role>("role", self.role.as_deref(), &mut errors);
        let search = self
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        filters_or_error(
            UserFilters {
                role,
                search,
                page: self.page,
                limit: self.limit,
            },
            errors,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    #[test]
    fn test_user_query_filters() {
        let filters = UserListQuery {
            role: Some("qa".to_string()),
            search: Some("  ada ".to_string()),
            page: Some(2),
            limit: None,
        }
        .into_filters()
        .unwrap();
        assert_eq!(filters.role, Some(Role::Qa));
        assert_eq!(filters.search.as_deref(), Some("ada"));
        assert_eq!(filters.page, Some(2));

        let err = UserListQuery {
            role: Some("owner".to_string()),
            ..Default::default()
        }
        .into_filters()
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref e) if e[0].field == "role"));
    }
}
