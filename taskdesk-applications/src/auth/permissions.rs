//! Permission matrix
//!
//! Every role maps to a fixed permission set through an exhaustive match, so
//! introducing a new [`Role`] variant fails to compile until it is given one.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use taskdesk_core::Role;

/// Fine-grained actions checked by the authorization gate
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// List and read user accounts
    ViewUsers,
    /// Create user accounts on behalf of others
    CreateUsers,
    /// Edit user profiles and roles
    UpdateUsers,
    /// Deactivate user accounts
    DeleteUsers,
    /// Attach an agent to a QA reviewer
    AssignQa,
    /// See every task in the system
    ViewAllTasks,
    CreateTasks,
    /// Edit any field of a visible task
    UpdateTasks,
    DeleteTasks,
    /// See tasks assigned to (or reviewed by) the caller
    ViewAssignedTasks,
    /// See tasks of the agents a QA reviewer is responsible for
    ViewTeamTasks,
    /// Set the QA outcome of a task
    ReviewTasks,
    /// Change only the status of one's own tasks
    UpdateTaskStatus,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewUsers => "view_users",
            Permission::CreateUsers => "create_users",
            Permission::UpdateUsers => "update_users",
            Permission::DeleteUsers => "delete_users",
            Permission::AssignQa => "assign_qa",
            Permission::ViewAllTasks => "view_all_tasks",
            Permission::CreateTasks => "create_tasks",
            Permission::UpdateTasks => "update_tasks",
            Permission::DeleteTasks => "delete_tasks",
            Permission::ViewAssignedTasks => "view_assigned_tasks",
            Permission::ViewTeamTasks => "view_team_tasks",
            Permission::ReviewTasks => "review_tasks",
            Permission::UpdateTaskStatus => "update_task_status",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "view_users" => Ok(Permission::ViewUsers),
            "create_users" => Ok(Permission::CreateUsers),
            "update_users" => Ok(Permission::UpdateUsers),
            "delete_users" => Ok(Permission::DeleteUsers),
            "assign_qa" => Ok(Permission::AssignQa),
            "view_all_tasks" => Ok(Permission::ViewAllTasks),
            "create_tasks" => Ok(Permission::CreateTasks),
            "update_tasks" => Ok(Permission::UpdateTasks),
            "delete_tasks" => Ok(Permission::DeleteTasks),
            "view_assigned_tasks" => Ok(Permission::ViewAssignedTasks),
            "view_team_tasks" => Ok(Permission::ViewTeamTasks),
            "review_tasks" => Ok(Permission::ReviewTasks),
            "update_task_status" => Ok(Permission::UpdateTaskStatus),
            _ => Err(format!("Unknown permission: {}", s)),
        }
    }
}

const ADMIN: &[Permission] = &[
    Permission::ViewUsers,
    Permission::CreateUsers,
    Permission::UpdateUsers,
    Permission::DeleteUsers,
    Permission::AssignQa,
    Permission::ViewAllTasks,
    Permission::CreateTasks,
    Permission::UpdateTasks,
    Permission::DeleteTasks,
];

const MANAGER: &[Permission] = &[
    Permission::ViewUsers,
    Permission::CreateUsers,
    Permission::UpdateUsers,
    Permission::AssignQa,
    Permission::ViewAllTasks,
    Permission::CreateTasks,
    Permission::UpdateTasks,
    Permission::DeleteTasks,
];

const QA: &[Permission] = &[
    Permission::ViewAssignedTasks,
    Permission::ViewTeamTasks,
    Permission::UpdateTasks,
    Permission::ReviewTasks,
];

const AGENT: &[Permission] = &[Permission::ViewAssignedTasks, Permission::UpdateTaskStatus];

/// The permission set granted to `role`
pub fn permissions_for(role: Role) -> &'static [Permission] {
    match role {
        Role::Admin => ADMIN,
        Role::Manager => MANAGER,
        Role::Qa => QA,
        Role::Agent => AGENT,
    }
}

/// Whether `role` holds `permission`
pub fn role_has_permission(role: Role, permission: Permission) -> bool {
    permissions_for(role).contains(&permission)
}

/// Owned copy of a role's permissions, for serializing into responses
pub fn permission_set(role: Role) -> HashSet<Permission> {
    permissions_for(role).iter().copied().collect()
}
