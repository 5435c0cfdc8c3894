//! User records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskdesk_core::Role;

/// Stored user record, including the password hash
///
/// Deliberately not `Serialize`: anything leaving the process goes through
/// [`User::to_public`].
#[derive(Clone)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    /// Lower-cased, unique across the store
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub assigned_qa: Option<String>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        first_name: &str,
        last_name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_lowercase(),
            password_hash: password_hash.to_string(),
            role,
            assigned_qa: None,
            is_active: true,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            role: self.role,
            assigned_qa: self.assigned_qa.clone(),
            is_active: self.is_active,
            last_login: self.last_login,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
        }
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

/// Outward projection of a user; never carries the password hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub assigned_qa: Option<String>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Minimal user reference embedded in task responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Partial update of a user record; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub assigned_qa: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self == &UserPatch::default()
    }

    pub fn apply(&self, user: &mut User) {
        if let Some(first_name) = &self.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &self.last_name {
            user.last_name = last_name.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.to_lowercase();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(is_active) = self.is_active {
            user.is_active = is_active;
        }
        if let Some(assigned_qa) = &self.assigned_qa {
            user.assigned_qa = Some(assigned_qa.clone());
        }
        if let Some(last_login) = self.last_login {
            user.last_login = Some(last_login);
        }
        user.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_projection_has_no_password() {
        let user = User::new("Ada", "Lovelace", "Ada@Example.com", "$argon2id$secret", Role::Admin);
        let json = serde_json::to_value(user.to_public()).unwrap();

        assert_eq!(json["email"], "ada@example.com");
        assert_eq!(json["firstName"], "Ada");
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
        assert!(!json.to_string().contains("argon2"));
    }

    #[test]
    fn test_debug_redacts_hash() {
        let user = User::new("Ada", "Lovelace", "ada@example.com", "$argon2id$secret", Role::Agent);
        assert!(!format!("{:?}", user).contains("argon2"));
    }

    #[test]
    fn test_patch_apply() {
        let mut user = User::new("Ada", "Lovelace", "ada@example.com", "h", Role::Agent);
        let patch = UserPatch {
            role: Some(Role::Qa),
            email: Some("ADA@new.io".to_string()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        patch.apply(&mut user);

        assert_eq!(user.role, Role::Qa);
        assert_eq!(user.email, "ada@new.io");
        assert_eq!(user.first_name, "Ada");
        assert!(UserPatch::default().is_empty());
    }
}
