//! Route definitions
//!
//! Every route except health, register, login and logout sits behind
//! [`authenticate`]. Each route then carries its own [`AccessPolicy`] guard.

use crate::{
    handlers,
    middleware::{authenticate, authorize},
    AppState,
};
use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post, put, MethodRouter},
    Router,
};
use taskdesk_applications::{AccessPolicy, Permission};
use taskdesk_core::Role;

/// Route-level access policies
pub mod policies {
    use super::*;

    const STAFF: &[Role] = &[Role::Admin, Role::Manager];

    pub const VIEW_USERS: AccessPolicy =
        AccessPolicy::roles(STAFF).with_permission(Permission::ViewUsers);
    pub const UPDATE_USERS: AccessPolicy =
        AccessPolicy::roles(STAFF).with_permission(Permission::UpdateUsers);
    pub const DELETE_USERS: AccessPolicy =
        AccessPolicy::roles(&[Role::Admin]).with_permission(Permission::DeleteUsers);
    pub const ASSIGN_QA: AccessPolicy =
        AccessPolicy::roles(STAFF).with_permission(Permission::AssignQa);
    pub const QA_QUEUE: AccessPolicy =
        AccessPolicy::roles(&[Role::Qa]).with_permission(Permission::ReviewTasks);
    pub const AGENT_QUEUE: AccessPolicy =
        AccessPolicy::roles(&[Role::Agent]).with_permission(Permission::ViewAssignedTasks);

    pub const CREATE_TASKS: AccessPolicy =
        AccessPolicy::roles(STAFF).with_permission(Permission::CreateTasks);
    pub const DELETE_TASKS: AccessPolicy =
        AccessPolicy::roles(STAFF).with_permission(Permission::DeleteTasks);
    pub const ANY_ROLE: AccessPolicy = AccessPolicy::AUTHENTICATED;
}

fn guarded(route: MethodRouter<AppState>, policy: AccessPolicy) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(policy, authorize))
}

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/users", user_routes(state.clone()))
        .nest("/tasks", task_routes(state))
}

fn auth_routes(state: AppState) -> Router<AppState> {
    let session = Router::new()
        .route("/me", get(handlers::me))
        .route_layer(from_fn_with_state(state, authenticate));

    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .merge(session)
}

fn user_routes(state: AppState) -> Router<AppState> {
    use policies::*;

    Router::new()
        .route("/", guarded(get(handlers::list_users), VIEW_USERS))
        .route("/assign-qa", guarded(post(handlers::assign_qa), ASSIGN_QA))
        .route("/qa/tasks", guarded(get(handlers::qa_tasks), QA_QUEUE))
        .route("/agent/tasks", guarded(get(handlers::agent_tasks), AGENT_QUEUE))
        .route(
            "/{id}",
            guarded(get(handlers::get_user), VIEW_USERS)
                .merge(guarded(put(handlers::update_user), UPDATE_USERS))
                .merge(guarded(delete(handlers::delete_user), DELETE_USERS)),
        )
        .route_layer(from_fn_with_state(state, authenticate))
}

fn task_routes(state: AppState) -> Router<AppState> {
    use policies::*;

    Router::new()
        .route(
            "/",
            guarded(get(handlers::list_tasks), ANY_ROLE)
                .merge(guarded(post(handlers::create_task), CREATE_TASKS)),
        )
        .route(
            "/{id}",
            guarded(get(handlers::get_task), ANY_ROLE)
                .merge(guarded(put(handlers::update_task), ANY_ROLE))
                .merge(guarded(delete(handlers::delete_task), DELETE_TASKS)),
        )
        .route_layer(from_fn_with_state(state, authenticate))
}

#[cfg(test)]
mod tests {
    use super::policies::*;
    use taskdesk_applications::{AccessError, UserIdentity};
    use taskdesk_core::Role;

    fn identity(role: Role) -> UserIdentity {
        UserIdentity {
            id: format!("{}-id", role),
            email: format!("{}@example.com", role),
            role,
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            assigned_qa: None,
        }
    }

    fn allowed(policy: taskdesk_applications::AccessPolicy) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|role| policy.check(Some(&identity(*role))).is_ok())
            .collect()
    }

    #[test]
    fn test_user_route_policies() {
        assert_eq!(allowed(VIEW_USERS), vec![Role::Admin, Role::Manager]);
        assert_eq!(allowed(UPDATE_USERS), vec![Role::Admin, Role::Manager]);
        assert_eq!(allowed(DELETE_USERS), vec![Role::Admin]);
        assert_eq!(allowed(ASSIGN_QA), vec![Role::Admin, Role::Manager]);
        assert_eq!(allowed(QA_QUEUE), vec![Role::Qa]);
        assert_eq!(allowed(AGENT_QUEUE), vec![Role::Agent]);
    }

    #[test]
    fn test_task_route_policies() {
        assert_eq!(allowed(CREATE_TASKS), vec![Role::Admin, Role::Manager]);
        assert_eq!(allowed(DELETE_TASKS), vec![Role::Admin, Role::Manager]);
        assert_eq!(allowed(ANY_ROLE), Role::ALL.to_vec());
    }

    #[test]
    fn test_manager_denied_user_deletion_by_role() {
        assert_eq!(
            DELETE_USERS.check(Some(&identity(Role::Manager))),
            Err(AccessError::RoleNotAllowed {
                role: Role::Manager
            })
        );
    }
}
