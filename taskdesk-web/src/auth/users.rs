//! User sessions and the identity cache
//!
//! Login and registration write the password-free user record to
//! `user:<id>`; reads of a single user go through that entry first. Any
//! write that changes a user rewrites the entry with the fresh record, so
//! role changes and deactivation reach [`crate::middleware::authenticate`]
//! before the caller's token expires. Logout revokes the token by writing
//! `blacklist:<token>` for the rest of the token's life.

use super::jwt::JwtService;
use crate::cache::{keys, CacheStore};
use crate::config::SeedAdmin;
use crate::error::{ApiError, ApiResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use taskdesk_applications::validation::{Credentials, Registration};
use taskdesk_applications::{
    Page, PublicUser, User, UserDirectory, UserFilters, UserIdentity, UserPatch,
};
use taskdesk_core::{Role, TaskdeskError};
use tracing::{debug, info, warn};

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// A freshly issued session
#[derive(Debug, Clone)]
pub struct Session {
    pub user: PublicUser,
    pub token: String,
}

/// A user read together with where it came from
#[derive(Debug, Clone)]
pub struct CachedLookup {
    pub user: PublicUser,
    pub from_cache: bool,
}

#[derive(Clone)]
pub struct UserService {
    directory: UserDirectory,
    cache: CacheStore,
    jwt: JwtService,
}

impl UserService {
    pub fn new(directory: UserDirectory, cache: CacheStore, jwt: JwtService) -> Self {
        Self {
            directory,
            cache,
            jwt,
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    /// Create an account, cache it and open a session
    pub async fn register(&self, registration: Registration) -> ApiResult<Session> {
        debug!(email = %registration.email, "Starting user registration");

        let password_hash = hash_password(&registration.password)?;
        let user = User::new(
            &registration.first_name,
            &registration.last_name,
            &registration.email,
            &password_hash,
            registration.role,
        );
        self.directory.storage().insert_user(&user).await?;

        let public = user.to_public();
        self.cache_user(&public).await;
        let token = self.jwt.issue(&public)?;

        info!(user_id = %public.id, role = %public.role, "User registered");
        Ok(Session {
            user: public,
            token,
        })
    }

    /// Check credentials and open a session
    ///
    /// Unknown email, inactive account and wrong password all fail with the
    /// same message.
    pub async fn login(&self, credentials: Credentials) -> ApiResult<Session> {
        let user = match self
            .directory
            .storage()
            .find_user_by_email(&credentials.email)
            .await?
        {
            Some(user) if user.is_active => user,
            _ => {
                debug!("Login rejected: no active account for email");
                return Err(ApiError::Unauthenticated(INVALID_CREDENTIALS.to_string()));
            }
        };

        if !verify_password(&credentials.password, &user.password_hash) {
            warn!(user_id = %user.id, "Login rejected: wrong password");
            return Err(ApiError::Unauthenticated(INVALID_CREDENTIALS.to_string()));
        }

        let user = self.directory.record_login(user).await?;
        let public = user.to_public();

        // delete then write; a concurrent login may briefly read the old entry
        self.cache.del(&keys::user(&public.id)).await;
        let token = self.jwt.issue(&public)?;
        self.cache_user(&public).await;

        info!(user_id = %public.id, "User logged in");
        Ok(Session {
            user: public,
            token,
        })
    }

    /// Revoke `token` until it would have expired anyway
    pub async fn logout(&self, token: &str) {
        let claims = match self.jwt.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "Logout with unusable token, nothing to revoke");
                return;
            }
        };

        if let Some(remaining) = claims.remaining_lifetime() {
            if self
                .cache
                .set(&keys::blacklist(token), &true, Some(remaining))
                .await
            {
                info!(user_id = %claims.id, "Session revoked");
            } else {
                warn!(user_id = %claims.id, "Session could not be revoked");
            }
        }
    }

    /// Whether `token` was revoked; an unreachable cache counts as not revoked
    pub async fn is_revoked(&self, token: &str) -> bool {
        self.cache.exists(&keys::blacklist(token)).await
    }

    pub async fn cached_user(&self, id: &str) -> Option<PublicUser> {
        self.cache.get(&keys::user(id)).await
    }

    /// The caller's own record, preferring the identity cache
    pub async fn me(&self, identity: &UserIdentity) -> ApiResult<PublicUser> {
        Ok(self.get_user(&identity.id).await?.user)
    }

    /// Read-through lookup of a single user
    pub async fn get_user(&self, id: &str) -> ApiResult<CachedLookup> {
        if let Some(user) = self.cached_user(id).await {
            return Ok(CachedLookup {
                user,
                from_cache: true,
            });
        }

        let user = self.directory.get(id).await?.to_public();
        self.cache_user(&user).await;
        Ok(CachedLookup {
            user,
            from_cache: false,
        })
    }

    pub async fn list_users(&self, filters: UserFilters) -> ApiResult<Page<PublicUser>> {
        Ok(self.directory.list(filters).await?)
    }

    pub async fn update_user(
        &self,
        actor: &UserIdentity,
        id: &str,
        patch: &UserPatch,
    ) -> ApiResult<PublicUser> {
        let user = self.directory.update(actor, id, patch).await?;
        self.cache_user(&user).await;
        Ok(user)
    }

    /// Soft delete and return the deactivated record
    pub async fn deactivate_user(&self, actor: &UserIdentity, id: &str) -> ApiResult<PublicUser> {
        self.directory.deactivate(actor, id).await?;
        let user = self.directory.get(id).await?.to_public();
        self.cache_user(&user).await;
        Ok(user)
    }

    pub async fn assign_qa(&self, agent_id: &str, qa_id: &str) -> ApiResult<PublicUser> {
        let agent = self.directory.assign_qa(agent_id, qa_id).await?;
        self.cache_user(&agent).await;
        Ok(agent)
    }

    /// Drop cached identities when the user store is empty
    ///
    /// A shared Redis can outlive the database it cached, e.g. a restarted
    /// in-memory store; its `user:*` entries then describe nobody.
    pub async fn purge_orphaned_identities(&self) -> ApiResult<u64> {
        if self.directory.storage().count_users().await? > 0 {
            return Ok(0);
        }
        let purged = self.cache.delete_pattern(keys::ALL_USERS).await;
        if purged > 0 {
            info!(purged, "Dropped cached identities of an earlier store");
        }
        Ok(purged)
    }

    /// Create the first admin when the store holds no users at all
    pub async fn seed_admin(&self, seed: &SeedAdmin) -> ApiResult<bool> {
        if self.directory.storage().count_users().await? > 0 {
            return Ok(false);
        }

        let password_hash = hash_password(&seed.password)?;
        let admin = User::new("Admin", "User", &seed.email, &password_hash, Role::Admin);
        self.directory.storage().insert_user(&admin).await?;

        info!(email = %admin.email, "Seeded admin account");
        Ok(true)
    }

    async fn cache_user(&self, user: &PublicUser) {
        self.cache
            .set(&keys::user(&user.id), user, Some(keys::USER_TTL))
            .await;
    }
}

impl From<argon2::password_hash::Error> for ApiError {
    fn from(err: argon2::password_hash::Error) -> Self {
        TaskdeskError::internal(format!("Password hashing failed: {}", err)).into()
    }
}

/// Hash a password with a fresh salt
fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

/// Verify password against hash; an unparsable hash never matches
fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "Stored password hash is malformed");
            false
        }
    }
}
