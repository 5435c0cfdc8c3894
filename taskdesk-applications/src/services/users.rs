//! User directory
//!
//! Listing and administration of user accounts. Session handling and the
//! identity cache sit on top of this in the web layer.

use crate::auth::{forbid_self, UserIdentity};
use crate::models::{PublicUser, User, UserPatch};
use crate::storage::{Page, PageRequest, UserQuery, UserStorage};
use crate::{ApplicationError, ApplicationResult};
use chrono::Utc;
use std::sync::Arc;
use taskdesk_core::{Role, TaskdeskError};
use tracing::info;

pub const DEFAULT_USER_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Default)]
pub struct UserFilters {
    pub role: Option<Role>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Clone)]
pub struct UserDirectory {
    users: Arc<dyn UserStorage>,
}

impl UserDirectory {
    pub fn new(users: Arc<dyn UserStorage>) -> Self {
        Self { users }
    }

    pub fn storage(&self) -> &Arc<dyn UserStorage> {
        &self.users
    }

    /// Active users matching `filters`, newest first
    pub async fn list(&self, filters: UserFilters) -> ApplicationResult<Page<PublicUser>> {
        let query = UserQuery {
            role: filters.role,
            search: filters.search,
            active_only: true,
            page: PageRequest::new(filters.page, filters.limit, DEFAULT_USER_PAGE_SIZE),
        };
        let page = self.users.list_users(&query).await?;
        Ok(page.map(|u| u.to_public()))
    }

    pub async fn get(&self, id: &str) -> ApplicationResult<User> {
        self.users
            .find_user(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("User"))
    }

    /// Apply a partial update; nobody may change their own role
    pub async fn update(
        &self,
        actor: &UserIdentity,
        id: &str,
        patch: &UserPatch,
    ) -> ApplicationResult<PublicUser> {
        if patch.role.is_some() {
            forbid_self(actor, id, "You cannot change your own role")?;
        }

        let mut user = self.get(id).await?;
        patch.apply(&mut user);

        match self.users.update_user(&user).await {
            Ok(()) => {}
            Err(TaskdeskError::Conflict { .. }) => {
                return Err(TaskdeskError::conflict(
                    "Email already exists. Please use a different email address.",
                )
                .into())
            }
            Err(e) => return Err(e.into()),
        }

        info!(user_id = %id, actor = %actor.id, "User updated");
        Ok(user.to_public())
    }

    /// Soft delete; nobody may deactivate their own account
    pub async fn deactivate(&self, actor: &UserIdentity, id: &str) -> ApplicationResult<()> {
        forbid_self(actor, id, "You cannot delete your own account")?;

        let mut user = self.get(id).await?;
        UserPatch {
            is_active: Some(false),
            ..Default::default()
        }
        .apply(&mut user);
        self.users.update_user(&user).await?;

        info!(user_id = %id, actor = %actor.id, "User deactivated");
        Ok(())
    }

    /// Attach an agent to a QA reviewer
    pub async fn assign_qa(&self, agent_id: &str, qa_id: &str) -> ApplicationResult<PublicUser> {
        let mut agent = match self.users.find_user(agent_id).await? {
            Some(user) if user.role == Role::Agent && user.is_active => user,
            _ => return Err(ApplicationError::bad_request("Invalid agent selected")),
        };
        match self.users.find_user(qa_id).await? {
            Some(user) if user.role == Role::Qa && user.is_active => {}
            _ => return Err(ApplicationError::bad_request("Invalid QA selected")),
        }

        UserPatch {
            assigned_qa: Some(qa_id.to_string()),
            ..Default::default()
        }
        .apply(&mut agent);
        self.users.update_user(&agent).await?;

        info!(agent_id = %agent_id, qa_id = %qa_id, "Agent assigned to QA");
        Ok(agent.to_public())
    }

    /// Stamp a successful login and return the refreshed record
    pub async fn record_login(&self, mut user: User) -> ApplicationResult<User> {
        UserPatch {
            last_login: Some(Utc::now()),
            ..Default::default()
        }
        .apply(&mut user);
        self.users.update_user(&user).await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AccessError;
    use crate::storage::MemoryUserStorage;

    async fn directory_with(users: &[&User]) -> UserDirectory {
        let storage = MemoryUserStorage::new();
        for user in users {
            storage.insert_user(user).await.unwrap();
        }
        UserDirectory::new(Arc::new(storage))
    }

    fn user(first: &str, email: &str, role: Role) -> User {
        User::new(first, "Test", email, "hash", role)
    }

    #[tokio::test]
    async fn test_admin_cannot_change_own_role() {
        let admin = user("Admin", "admin@example.com", Role::Admin);
        let directory = directory_with(&[&admin]).await;
        let actor = UserIdentity::from_user(&admin.to_public());

        let patch = UserPatch {
            role: Some(Role::Agent),
            ..Default::default()
        };
        let err = directory.update(&actor, &admin.id, &patch).await.unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Access(AccessError::SelfModification { .. })
        ));

        // editing one's own name is fine
        let patch = UserPatch {
            first_name: Some("Root".to_string()),
            ..Default::default()
        };
        let updated = directory.update(&actor, &admin.id, &patch).await.unwrap();
        assert_eq!(updated.first_name, "Root");
    }

    #[tokio::test]
    async fn test_admin_cannot_delete_self() {
        let admin = user("Admin", "admin@example.com", Role::Admin);
        let agent = user("Agent", "agent@example.com", Role::Agent);
        let directory = directory_with(&[&admin, &agent]).await;
        let actor = UserIdentity::from_user(&admin.to_public());

        assert!(directory.deactivate(&actor, &admin.id).await.is_err());
        directory.deactivate(&actor, &agent.id).await.unwrap();

        let stored = directory.get(&agent.id).await.unwrap();
        assert!(!stored.is_active);
        let listed = directory.list(UserFilters::default()).await.unwrap();
        assert_eq!(listed.total, 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_on_update() {
        let admin = user("Admin", "admin@example.com", Role::Admin);
        let agent = user("Agent", "agent@example.com", Role::Agent);
        let directory = directory_with(&[&admin, &agent]).await;
        let actor = UserIdentity::from_user(&admin.to_public());

        let patch = UserPatch {
            email: Some("admin@example.com".to_string()),
            ..Default::default()
        };
        let err = directory.update(&actor, &agent.id, &patch).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Email already exists. Please use a different email address."
        );
    }

    #[tokio::test]
    async fn test_assign_qa_checks_roles() {
        let agent = user("Agent", "agent@example.com", Role::Agent);
        let qa = user("Quinn", "qa@example.com", Role::Qa);
        let directory = directory_with(&[&agent, &qa]).await;

        let err = directory.assign_qa(&qa.id, &qa.id).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid agent selected");
        let err = directory.assign_qa(&agent.id, &agent.id).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid QA selected");

        let assigned = directory.assign_qa(&agent.id, &qa.id).await.unwrap();
        assert_eq!(assigned.assigned_qa.as_deref(), Some(qa.id.as_str()));
    }
}
