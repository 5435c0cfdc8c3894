//! Authentication handlers

use super::types::{ApiResponse, ErrorResponse, LoginData, MessageResponse, SessionData, UserData};
use crate::{
    auth::{extract_token, CurrentUser},
    error::{ApiJson, ApiResult},
    AppState,
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};
use axum_extra::extract::cookie::CookieJar;
use taskdesk_applications::validation::{LoginInput, RegisterInput};

/// Create an account and start a session
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    summary = "Register",
    description = "Create an account. The session token is returned in the body and set as the `token` cookie.",
    request_body = RegisterInput,
    responses(
        (status = 201, description = "User registered", body = ApiResponse<SessionData>),
        (status = 400, description = "Validation failed or email already registered", body = ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(input): ApiJson<RegisterInput>,
) -> ApiResult<(StatusCode, CookieJar, Json<ApiResponse<SessionData>>)> {
    let registration = input.validate()?;
    let session = state.users.register(registration).await?;

    let jar = jar.add(state.cookies.session(session.token.clone()));
    Ok((
        StatusCode::CREATED,
        jar,
        Json(ApiResponse::with_message(
            "User registered successfully",
            SessionData {
                user: session.user,
                token: session.token,
            },
        )),
    ))
}

/// Exchange credentials for a session
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    summary = "Log in",
    request_body = LoginInput,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse<LoginData>),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(input): ApiJson<LoginInput>,
) -> ApiResult<(CookieJar, Json<ApiResponse<LoginData>>)> {
    let credentials = input.validate()?;
    let session = state.users.login(credentials).await?;

    let jar = jar.add(state.cookies.session(session.token.clone()));
    let role = session.user.role;
    Ok((
        jar,
        Json(ApiResponse::with_message(
            "Login successful",
            LoginData {
                user: session.user,
                token: session.token,
                role,
            },
        )),
    ))
}

/// End the session
///
/// Works without a valid session: the cookie is always cleared, and a token
/// that still verifies is revoked for the rest of its life.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    summary = "Log out",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    if let Some(token) = extract_token(&headers) {
        state.users.logout(&token).await;
    }
    (
        jar.add(state.cookies.removal()),
        Json(MessageResponse::new("Logged out successfully")),
    )
}

/// The authenticated caller
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    summary = "Current user",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<UserData>),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []), ("cookie_auth" = []))
)]
pub async fn me(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> ApiResult<Json<ApiResponse<UserData>>> {
    let user = state.users.me(&identity).await?;
    Ok(Json(ApiResponse::ok(UserData { user })))
}
