//! Email verification code endpoints.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::response::{ErrorBody, MessageBody};
use crate::api::state::AppState;
use crate::otp::IssueStatus;

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct OtpEmailRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct OtpVerifyRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OtpSendResponse {
    pub success: bool,
    /// `sent` or `verified`.
    pub otp_status: String,
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OtpResendResponse {
    pub success: bool,
    pub message: String,
    /// Milliseconds until the next resend is accepted.
    pub can_resend_after: u64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OtpStatusResponse {
    pub success: bool,
    pub otp_exists: bool,
    pub can_resend: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_expired: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    /// Seconds until a resend is accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[utoipa::path(
    post,
    path = "/v1/volunteer/otp/send",
    request_body = OtpEmailRequest,
    responses(
        (status = 200, description = "Code sent, or email already verified", body = OtpSendResponse),
        (status = 400, description = "Invalid or registered email", body = ErrorBody),
        (status = 429, description = "Previous code still inside the resend cooldown", body = ErrorBody),
        (status = 500, description = "Code could not be mailed", body = ErrorBody)
    ),
    tag = "otp"
)]
pub async fn send_otp(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<OtpEmailRequest>>,
) -> impl IntoResponse {
    let request = payload.map(|Json(request)| request).unwrap_or_default();

    match state.otp().issue(&request.email).await {
        Ok(IssueStatus::Sent) => Json(OtpSendResponse {
            success: true,
            otp_status: "sent".to_string(),
            message: "OTP sent successfully.".to_string(),
        })
        .into_response(),
        Ok(IssueStatus::AlreadyVerified) => Json(OtpSendResponse {
            success: true,
            otp_status: "verified".to_string(),
            message: "Email is already verified.".to_string(),
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/volunteer/otp/resend",
    request_body = OtpEmailRequest,
    responses(
        (status = 200, description = "New code sent", body = OtpResendResponse),
        (status = 400, description = "Invalid email, no pending code, or already verified", body = ErrorBody),
        (status = 429, description = "Resend cooldown has not elapsed", body = ErrorBody),
        (status = 500, description = "Code could not be mailed", body = ErrorBody)
    ),
    tag = "otp"
)]
pub async fn resend_otp(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<OtpEmailRequest>>,
) -> impl IntoResponse {
    let request = payload.map(|Json(request)| request).unwrap_or_default();

    match state.otp().resend(&request.email).await {
        Ok(()) => {
            let cooldown = state.otp_store().config().resend_cooldown();
            Json(OtpResendResponse {
                success: true,
                message: "OTP resent successfully.".to_string(),
                can_resend_after: u64::try_from(cooldown.as_millis()).unwrap_or(u64::MAX),
            })
            .into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/volunteer/otp/status",
    request_body = OtpEmailRequest,
    responses(
        (status = 200, description = "Challenge state for the email", body = OtpStatusResponse),
        (status = 400, description = "Missing email", body = ErrorBody)
    ),
    tag = "otp"
)]
pub async fn otp_status(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<OtpEmailRequest>>,
) -> impl IntoResponse {
    let request = payload.map(|Json(request)| request).unwrap_or_default();

    let status = match state.otp().status(&request.email).await {
        Ok(status) => status,
        Err(err) => return err.into_response(),
    };

    let response = if status.exists {
        OtpStatusResponse {
            success: true,
            otp_exists: true,
            can_resend: status.can_resend,
            is_expired: Some(status.is_expired),
            verified: Some(status.verified),
            remaining_time: Some(status.remaining_seconds),
            attempts: Some(status.attempts),
            message: None,
        }
    } else {
        OtpStatusResponse {
            success: true,
            otp_exists: false,
            can_resend: true,
            is_expired: None,
            verified: None,
            remaining_time: None,
            attempts: None,
            message: Some("No OTP found for this email.".to_string()),
        }
    };
    (StatusCode::OK, Json(response)).into_response()
}

#[utoipa::path(
    post,
    path = "/v1/volunteer/otp/verify",
    request_body = OtpVerifyRequest,
    responses(
        (status = 200, description = "Email verified", body = MessageBody),
        (status = 400, description = "Invalid, expired or exhausted code", body = ErrorBody)
    ),
    tag = "otp"
)]
pub async fn verify_otp(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<OtpVerifyRequest>>,
) -> impl IntoResponse {
    let request = payload.map(|Json(request)| request).unwrap_or_default();

    match state.otp().verify(&request.email, &request.otp).await {
        Ok(()) => Json(MessageBody::new("Email verified successfully.")).into_response(),
        Err(err) => err.into_response(),
    }
}
