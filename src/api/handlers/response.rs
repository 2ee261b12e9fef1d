//! JSON error bodies and the HTTP mapping of domain errors.

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::otp::OtpError;

pub(crate) const INTERNAL_ERROR: &str = "Internal Server Error";

/// Body of every failed request.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}

/// Plain success acknowledgement.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageBody {
    pub success: bool,
    pub message: String,
}

impl MessageBody {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            success: false,
            message: message.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for OtpError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::DeliveryFailure | Self::Lookup => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        let mut response = error_response(status, self.to_string());
        if let Self::RateLimited {
            retry_after_seconds,
        } = self
        {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_seconds));
        }
        response
    }
}
