//! Errors surfaced by the verification flows.

use thiserror::Error;

pub(super) const EMAIL_REQUIRED: &str = "Email is required.";
pub(super) const EMAIL_INVALID: &str = "Please provide a valid email address.";
pub(super) const EMAIL_AND_CODE_REQUIRED: &str = "Email and OTP are required.";
pub(super) const CODE_FORMAT: &str = "OTP must be a 6-digit number.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OtpError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("Email is already registered.")]
    AlreadyRegistered,
    #[error("Email is already verified.")]
    AlreadyVerified,
    #[error("OTP not found. Please request a new OTP.")]
    NotFound,
    /// Resend asked for an email that has no pending challenge.
    #[error("No OTP request found. Please request a new OTP.")]
    NoPendingRequest,
    #[error("Please wait {retry_after_seconds} seconds before requesting a new OTP.")]
    RateLimited { retry_after_seconds: u64 },
    #[error("OTP has expired. Please request a new one.")]
    Expired,
    #[error("Maximum verification attempts exceeded. Please request a new OTP.")]
    AttemptsExceeded,
    #[error("Invalid OTP. {remaining_attempts} attempts remaining.")]
    InvalidCode { remaining_attempts: u32 },
    #[error("Failed to send OTP. Please try again.")]
    DeliveryFailure,
    #[error("Failed to check registration status.")]
    Lookup,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_counters() {
        assert_eq!(
            OtpError::RateLimited {
                retry_after_seconds: 42
            }
            .to_string(),
            "Please wait 42 seconds before requesting a new OTP."
        );
        assert_eq!(
            OtpError::InvalidCode {
                remaining_attempts: 4
            }
            .to_string(),
            "Invalid OTP. 4 attempts remaining."
        );
        assert_eq!(
            OtpError::Validation(EMAIL_REQUIRED).to_string(),
            "Email is required."
        );
    }
}
