//! Login, logout and current-volunteer endpoints (cookie or bearer session).

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{error, info};

use super::types::{LoginRequest, SessionResponse, VolunteerResponse};
use crate::api::handlers::response::{error_response, ErrorBody, MessageBody, INTERNAL_ERROR};
use crate::api::state::{AppConfig, AppState};
use crate::volunteers::{
    credentials::{generate_token, hash_token, verify_password},
    Volunteer,
};

pub(crate) const SESSION_COOKIE_NAME: &str = "volreg_session";
const BLOCKED: &str = "Access denied. Volunteer is blocked.";

#[utoipa::path(
    post,
    path = "/v1/volunteer/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionResponse),
        (status = 400, description = "Missing fields, unverified account or wrong password", body = ErrorBody),
        (status = 403, description = "Volunteer is blocked", body = ErrorBody)
    ),
    tag = "volunteer"
)]
pub async fn login(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    if request.email.is_empty() || request.password.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Email and password are required.");
    }

    let record = match state.volunteers().find_login(&request.email).await {
        Ok(record) => record,
        Err(err) => {
            error!("Failed to lookup login record: {err:#}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR);
        }
    };

    let Some(record) = record else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Account not verified. Please verify your email first.",
        );
    };
    if record.volunteer.is_blocked {
        return error_response(StatusCode::FORBIDDEN, BLOCKED);
    }
    if !record.volunteer.account_verified {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Account not verified. Please verify your email first.",
        );
    }

    let password = request.password;
    let stored_hash = record.password_hash;
    let matched = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .unwrap_or(false);
    if !matched {
        return error_response(StatusCode::BAD_REQUEST, "Invalid email or password.");
    }

    info!(volunteer_id = %record.volunteer.id, "volunteer logged in");
    session_response(&state, record.volunteer, "Volunteer logged in successfully.").await
}

#[utoipa::path(
    post,
    path = "/v1/volunteer/logout",
    responses(
        (status = 200, description = "Session cleared", body = MessageBody)
    ),
    tag = "volunteer"
)]
pub async fn logout(headers: HeaderMap, state: Extension<Arc<AppState>>) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        if let Err(err) = state.volunteers().delete_session(&hash_token(&token)).await {
            error!("Failed to delete session: {err:#}");
        }
    }

    // Cleared even when no session row matched.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (
        StatusCode::OK,
        response_headers,
        Json(MessageBody::new("Logged out successfully.")),
    )
        .into_response()
}

#[utoipa::path(
    get,
    path = "/v1/volunteer/me",
    responses(
        (status = 200, description = "Current volunteer", body = VolunteerResponse),
        (status = 401, description = "Missing or expired session", body = ErrorBody),
        (status = 403, description = "Volunteer is blocked", body = ErrorBody)
    ),
    tag = "volunteer"
)]
pub async fn me(headers: HeaderMap, state: Extension<Arc<AppState>>) -> impl IntoResponse {
    match authenticate(&headers, &state).await {
        Ok(volunteer) => Json(VolunteerResponse {
            success: true,
            volunteer,
        })
        .into_response(),
        Err(response) => response,
    }
}

/// Resolve the session cookie or bearer token into an active, unblocked volunteer.
pub(crate) async fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<Volunteer, Response> {
    let unauthorized = || error_response(StatusCode::UNAUTHORIZED, "Unauthorized. Please login again.");

    let Some(token) = extract_session_token(headers) else {
        return Err(unauthorized());
    };
    match state
        .volunteers()
        .find_session(&hash_token(&token), Utc::now())
        .await
    {
        Ok(Some(volunteer)) if volunteer.is_blocked => {
            Err(error_response(StatusCode::FORBIDDEN, BLOCKED))
        }
        Ok(Some(volunteer)) => Ok(volunteer),
        Ok(None) => Err(unauthorized()),
        Err(err) => {
            error!("Failed to lookup session: {err:#}");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_ERROR,
            ))
        }
    }
}

/// Create a session for `volunteer` and answer with the token in body and cookie.
pub(super) async fn session_response(
    state: &AppState,
    volunteer: Volunteer,
    message: &str,
) -> Response {
    let token = match start_session(state, &volunteer).await {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to create session: {err:#}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR);
        }
    };

    let mut headers = HeaderMap::new();
    match session_cookie(state.config(), &token) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR);
        }
    }

    (
        StatusCode::OK,
        headers,
        Json(SessionResponse {
            success: true,
            message: message.to_string(),
            volunteer,
            token,
        }),
    )
        .into_response()
}

async fn start_session(state: &AppState, volunteer: &Volunteer) -> anyhow::Result<String> {
    let token = generate_token()?;
    let expires_at = Utc::now() + Duration::seconds(state.config().session_ttl_seconds());
    state
        .volunteers()
        .create_session(volunteer.id, &hash_token(&token), expires_at)
        .await?;
    Ok(token)
}

fn session_cookie(
    config: &AppConfig,
    token: &str,
) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(
    config: &AppConfig,
) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let value = headers.get(COOKIE)?.to_str().ok()?;
    value.split(';').find_map(|pair| {
        let (key, val) = pair.trim().split_once('=')?;
        (key.trim() == SESSION_COOKIE_NAME && !val.trim().is_empty())
            .then(|| val.trim().to_string())
    })
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
