//! Access checks
//!
//! Route-level checks compose a role allow-list with an optional permission.
//! The role list is evaluated first; the permission check only runs for a
//! caller whose role is already allowed.

use super::identity::UserIdentity;
use super::permissions::Permission;
use taskdesk_core::Role;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("Authentication required.")]
    Unauthenticated,

    #[error("Insufficient permissions.")]
    RoleNotAllowed { role: Role },

    #[error("Insufficient permissions.")]
    MissingPermission { permission: Permission },

    /// Self-targeted actions that no role may perform
    #[error("{message}")]
    SelfModification { message: String },
}

impl AccessError {
    pub fn self_modification(message: &str) -> Self {
        Self::SelfModification {
            message: message.to_string(),
        }
    }

    /// The permission name to report back to the caller, if any
    pub fn required_permission(&self) -> Option<Permission> {
        match self {
            AccessError::MissingPermission { permission } => Some(*permission),
            _ => None,
        }
    }
}

pub type AccessResult<T> = Result<T, AccessError>;

/// Allowed roles plus an optional fine-grained permission for one route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    pub roles: &'static [Role],
    pub permission: Option<Permission>,
}

impl AccessPolicy {
    /// Policy admitting any authenticated caller
    pub const AUTHENTICATED: AccessPolicy = AccessPolicy {
        roles: &Role::ALL,
        permission: None,
    };

    pub const fn roles(roles: &'static [Role]) -> Self {
        Self {
            roles,
            permission: None,
        }
    }

    pub const fn with_permission(mut self, permission: Permission) -> Self {
        self.permission = Some(permission);
        self
    }

    pub fn check(&self, identity: Option<&UserIdentity>) -> AccessResult<()> {
        let identity = require_role(identity, self.roles)?;
        if let Some(permission) = self.permission {
            require_permission(Some(identity), permission)?;
        }
        Ok(())
    }
}

/// Reject callers whose role is not in `allowed`
pub fn require_role<'a>(
    identity: Option<&'a UserIdentity>,
    allowed: &[Role],
) -> AccessResult<&'a UserIdentity> {
    let identity = identity.ok_or(AccessError::Unauthenticated)?;
    if allowed.contains(&identity.role) {
        Ok(identity)
    } else {
        Err(AccessError::RoleNotAllowed {
            role: identity.role,
        })
    }
}

/// Reject callers whose role lacks `permission`
pub fn require_permission(
    identity: Option<&UserIdentity>,
    permission: Permission,
) -> AccessResult<&UserIdentity> {
    let identity = identity.ok_or(AccessError::Unauthenticated)?;
    if identity.has_permission(permission) {
        Ok(identity)
    } else {
        Err(AccessError::MissingPermission { permission })
    }
}

/// Reject an action targeting the caller's own account
pub fn forbid_self(identity: &UserIdentity, target_id: &str, message: &str) -> AccessResult<()> {
    if identity.id == target_id {
        Err(AccessError::self_modification(message))
    } else {
        Ok(())
    }
}
