//! Resolved caller identity
//!
//! Built from verified token claims and optionally refreshed from the
//! identity cache before it reaches any handler.

use super::permissions::{role_has_permission, Permission};
use crate::models::PublicUser;
use serde::{Deserialize, Serialize};
use taskdesk_core::Role;

/// The authenticated user attached to a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    /// Only known once the identity has been refreshed from the cache
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_qa: Option<String>,
}

impl UserIdentity {
    pub fn from_user(user: &PublicUser) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            assigned_qa: user.assigned_qa.clone(),
        }
    }

    /// Overlay a cached user record; cached values win on every shared field
    pub fn merge_cached(&mut self, cached: &PublicUser) {
        if cached.id != self.id {
            return;
        }
        self.email = cached.email.clone();
        self.role = cached.role;
        self.first_name = cached.first_name.clone();
        self.last_name = cached.last_name.clone();
        self.assigned_qa = cached.assigned_qa.clone();
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        role_has_permission(self.role, permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;

    fn identity() -> UserIdentity {
        UserIdentity {
            id: "u1".to_string(),
            email: "old@example.com".to_string(),
            role: Role::Agent,
            first_name: "Old".to_string(),
            last_name: "Name".to_string(),
            assigned_qa: None,
        }
    }

    #[test]
    fn test_merge_cached_overrides_claims() {
        let mut cached = User::new("New", "Name", "new@example.com", "hash", Role::Qa).to_public();
        cached.id = "u1".to_string();

        let mut id = identity();
        id.merge_cached(&cached);

        assert_eq!(id.role, Role::Qa);
        assert_eq!(id.email, "new@example.com");
        assert_eq!(id.first_name, "New");
    }

    #[test]
    fn test_merge_ignores_foreign_record() {
        let other = User::new("Someone", "Else", "x@example.com", "hash", Role::Admin).to_public();
        let mut id = identity();
        id.merge_cached(&other);
        assert_eq!(id, identity());
    }
}
