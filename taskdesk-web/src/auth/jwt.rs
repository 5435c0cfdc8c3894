//! JWT session tokens
//!
//! Tokens are HS256-signed and carry enough of the user to authorize a
//! request without a store lookup. Keys are built once from configuration
//! and shared through [`crate::AppState`].

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use taskdesk_applications::{PublicUser, UserIdentity};
use taskdesk_core::Role;
use tracing::{debug, error};

/// JWT Claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    /// Issued at (timestamp)
    pub iat: i64,
    /// Expiration time (timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn for_user(user: &PublicUser, lifetime: Duration) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            iat: now,
            exp: now + lifetime.as_secs() as i64,
        }
    }

    pub fn identity(&self) -> UserIdentity {
        UserIdentity {
            id: self.id.clone(),
            email: self.email.clone(),
            role: self.role,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            assigned_qa: None,
        }
    }

    /// Time until the token expires, `None` once it has
    pub fn remaining_lifetime(&self) -> Option<Duration> {
        let left = self.exp - Utc::now().timestamp();
        (left > 0).then(|| Duration::from_secs(left as u64))
    }
}

/// Why a token was not accepted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Access denied. No token provided.")]
    Missing,
    #[error("Invalid token.")]
    Invalid,
    #[error("Token has expired.")]
    Expired,
    #[error("Token has been invalidated.")]
    Revoked,
    /// The verifier itself failed, as opposed to the token being bad
    #[error("Authentication failed.")]
    VerificationFailed,
    #[error("Failed to create authentication token")]
    Creation,
}

/// Issues and verifies session tokens
#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl JwtService {
    pub fn new(secret: &str, lifetime: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issue a token for `user` valid for the configured lifetime
    pub fn issue(&self, user: &PublicUser) -> Result<String, TokenError> {
        self.sign(&Claims::for_user(user, self.lifetime))
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(|e| {
            error!("Failed to encode JWT token: {}", e);
            TokenError::Creation
        })
    }

    /// Verify signature and expiry and return the claims
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => {
                    debug!("Token expired");
                    Err(TokenError::Expired)
                }
                ErrorKind::InvalidKeyFormat
                | ErrorKind::InvalidEcdsaKey
                | ErrorKind::InvalidRsaKey(_)
                | ErrorKind::RsaFailedSigning
                | ErrorKind::Crypto(_) => {
                    error!("Token verification failed: {}", e);
                    Err(TokenError::VerificationFailed)
                }
                _ => {
                    debug!("Token rejected: {}", e);
                    Err(TokenError::Invalid)
                }
            },
        }
    }
}
