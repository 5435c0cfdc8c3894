//! Request authentication and route guards

use crate::{
    auth::{extract_token, SessionToken, TokenError},
    error::ApiError,
    AppState,
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use taskdesk_applications::{AccessPolicy, UserIdentity};
use tracing::{debug, warn};

const ACCOUNT_DEACTIVATED: &str = "Account has been deactivated.";

/// Resolve the caller from the session token
///
/// Steps, each of which ends the request with 401 on failure:
/// 1. read the token from the `token` cookie or a bearer header
/// 2. verify signature and expiry
/// 3. reject tokens revoked by logout
///
/// 4. reject accounts that have been deactivated since the token was issued
///
/// The identity comes from the claims and is refreshed from `user:<id>`,
/// reading the store on a cache miss. If the store cannot be read the
/// claims are used as they are.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers()).ok_or(TokenError::Missing)?;
    let claims = state.users.jwt().verify(&token)?;

    if state.users.is_revoked(&token).await {
        debug!(user_id = %claims.id, "Rejected revoked token");
        return Err(TokenError::Revoked.into());
    }

    let mut identity = claims.identity();
    match state.users.get_user(&claims.id).await {
        Ok(lookup) if !lookup.user.is_active => {
            debug!(user_id = %claims.id, "Rejected token of deactivated account");
            return Err(ApiError::Unauthenticated(ACCOUNT_DEACTIVATED.to_string()));
        }
        Ok(lookup) => identity.merge_cached(&lookup.user),
        Err(ApiError::NotFound(_)) => {
            debug!(user_id = %claims.id, "Rejected token of unknown user");
            return Err(TokenError::Invalid.into());
        }
        Err(e) => warn!(user_id = %claims.id, error = %e, "Using token claims, user lookup failed"),
    }

    debug!(user_id = %identity.id, role = %identity.role, "Authenticated request");
    request.extensions_mut().insert(identity);
    request.extensions_mut().insert(SessionToken(token));
    Ok(next.run(request).await)
}

/// Admit the request only if the authenticated caller satisfies `policy`
///
/// Install with `from_fn_with_state(policy, authorize)` inside a router
/// already wrapped by [`authenticate`].
pub async fn authorize(
    State(policy): State<AccessPolicy>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    policy.check(request.extensions().get::<UserIdentity>())?;
    Ok(next.run(request).await)
}
