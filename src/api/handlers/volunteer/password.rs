//! Forgot-password and reset-password endpoints.
//!
//! The mailed link carries a random token; only its SHA-256 hash is stored,
//! together with a deadline.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{error, info};

use super::session::session_response;
use super::types::{ForgotPasswordRequest, ResetPasswordRequest, SessionResponse};
use crate::api::handlers::response::{error_response, ErrorBody, MessageBody, INTERNAL_ERROR};
use crate::api::state::AppState;
use crate::email::password_reset_message;
use crate::volunteers::credentials::{generate_token, hash_password, hash_token};

#[utoipa::path(
    post,
    path = "/v1/volunteer/password/forgot",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset link mailed", body = MessageBody),
        (status = 404, description = "No verified volunteer with that email", body = ErrorBody),
        (status = 500, description = "Reset link could not be mailed", body = ErrorBody)
    ),
    tag = "volunteer"
)]
pub async fn forgot_password(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> impl IntoResponse {
    let request = payload.map(|Json(request)| request).unwrap_or_default();

    let volunteer = match state.volunteers().find_login(&request.email).await {
        Ok(Some(record)) if record.volunteer.account_verified => record.volunteer,
        Ok(_) => return error_response(StatusCode::NOT_FOUND, "Volunteer not found."),
        Err(err) => {
            error!("Failed to lookup volunteer for password reset: {err:#}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR);
        }
    };

    let token = match generate_token() {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to generate reset token: {err:#}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR);
        }
    };
    let expires_at = Utc::now() + Duration::seconds(state.config().reset_token_ttl_seconds());
    if let Err(err) = state
        .volunteers()
        .set_reset_token(volunteer.id, &hash_token(&token), expires_at)
        .await
    {
        error!("Failed to store reset token: {err:#}");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR);
    }

    let reset_url = state.config().reset_password_url(&token);
    let message = password_reset_message(&volunteer.details.email, &reset_url);
    if let Err(err) = state.mailer().send(&message).await {
        error!("Failed to send reset password email: {err:#}");
        if let Err(err) = state.volunteers().clear_reset_token(volunteer.id).await {
            error!("Failed to clear reset token: {err:#}");
        }
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Cannot send reset password token.",
        );
    }

    info!(volunteer_id = %volunteer.id, "password reset link sent");
    Json(MessageBody::new(format!(
        "Email sent to {} successfully.",
        volunteer.details.email
    )))
    .into_response()
}

#[utoipa::path(
    put,
    path = "/v1/volunteer/password/reset/{token}",
    params(
        ("token" = String, Path, description = "Token from the reset link")
    ),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed and session issued", body = SessionResponse),
        (status = 400, description = "Invalid or expired token, or passwords differ", body = ErrorBody)
    ),
    tag = "volunteer"
)]
pub async fn reset_password(
    state: Extension<Arc<AppState>>,
    Path(token): Path<String>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let request = payload.map(|Json(request)| request).unwrap_or_default();

    let volunteer = match state
        .volunteers()
        .find_by_reset_token(&hash_token(&token), Utc::now())
        .await
    {
        Ok(Some(volunteer)) => volunteer,
        Ok(None) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Reset password token is invalid or has expired.",
            )
        }
        Err(err) => {
            error!("Failed to lookup reset token: {err:#}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR);
        }
    };

    if request.password.is_empty() || request.password != request.confirm_password {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Password and confirm password do not match.",
        );
    }

    let password = request.password;
    let password_hash = match tokio::task::spawn_blocking(move || hash_password(&password)).await {
        Ok(Ok(hash)) => hash,
        Ok(Err(err)) => {
            error!("Failed to hash password: {err:#}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR);
        }
        Err(err) => {
            error!("Password hashing task failed: {err}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR);
        }
    };

    if let Err(err) = state
        .volunteers()
        .update_password(volunteer.id, &password_hash)
        .await
    {
        error!("Failed to update password: {err:#}");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR);
    }

    info!(volunteer_id = %volunteer.id, "password reset");
    session_response(&state, volunteer, "Reset Password Successfully.").await
}
