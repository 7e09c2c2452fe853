use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::{presented_tokens, AuthUser, Registration, SESSION_COOKIE};
use crate::models::PublicUser;
use crate::state::AppState;
use crate::utils::error::{AppError, Result};
use crate::utils::response::{empty_success, success};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
struct SessionPayload {
    user: PublicUser,
    token: String,
    expires_in_secs: i64,
}

fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE}={token}; Path=/; Max-Age={max_age_secs}; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn session_response(state: &AppState, user: PublicUser, token: String, message: &str) -> Response {
    let max_age = state.sessions.ttl().num_seconds();
    let cookie = session_cookie(&token, max_age, state.config.production);
    let payload = SessionPayload {
        user,
        token,
        expires_in_secs: max_age,
    };
    ([(SET_COOKIE, cookie)], success(payload, message)).into_response()
}

pub async fn register(
    State(state): State<AppState>,
    Json(form): Json<Registration>,
) -> Result<Response> {
    let user = state.credentials.register(&form).await?;
    let token = state.sessions.create_session(user.id).await?;
    Ok(session_response(
        &state,
        PublicUser::from(&user),
        token,
        "Registration successful",
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response> {
    if request.username.trim().is_empty() || request.password.is_empty() {
        return Err(AppError::ValidationError(
            "Username and password are required".to_string(),
        ));
    }

    let Some(user) = state
        .credentials
        .authenticate(&request.username, &request.password)
        .await?
    else {
        return Err(AppError::AuthError(
            "Invalid username or password".to_string(),
        ));
    };

    let token = state.sessions.create_session(user.id).await?;
    Ok(session_response(
        &state,
        PublicUser::from(&user),
        token,
        "Login successful",
    ))
}

/// Revokes every session the request presented. Always succeeds, with or
/// without a live session.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    for token in presented_tokens(&headers) {
        state.sessions.destroy_session(token).await?;
    }
    let cookie = session_cookie("", 0, state.config.production);
    Ok(([(SET_COOKIE, cookie)], empty_success("Logged out successfully")).into_response())
}

pub async fn me(AuthUser(user): AuthUser) -> Response {
    success(user, "Session is valid")
}
