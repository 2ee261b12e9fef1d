//! Issue, resend, inspect and verify email challenges.
//!
//! Flow Overview:
//! 1) Validate the email (and code, for verify).
//! 2) Refuse emails that already belong to a registered volunteer.
//! 3) Update the challenge table under its lock.
//! 4) Mail the new code outside the lock.
//!
//! A failed mail on first issue discards the challenge so the caller can retry
//! right away. A failed mail on resend keeps the replaced challenge.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};

use super::error::{CODE_FORMAT, EMAIL_AND_CODE_REQUIRED, EMAIL_INVALID, EMAIL_REQUIRED};
use super::store::{ChallengeStatus, IssueOutcome, IssuedCode, OtpStore};
use super::OtpError;
use crate::email::{otp_message, valid_email, EmailSender};
use crate::volunteers::VolunteerRepository;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IssueStatus {
    Sent,
    AlreadyVerified,
}

pub struct OtpService {
    store: Arc<OtpStore>,
    mailer: Arc<dyn EmailSender>,
    volunteers: Arc<dyn VolunteerRepository>,
}

impl OtpService {
    pub fn new(
        store: Arc<OtpStore>,
        mailer: Arc<dyn EmailSender>,
        volunteers: Arc<dyn VolunteerRepository>,
    ) -> Self {
        Self {
            store,
            mailer,
            volunteers,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<OtpStore> {
        &self.store
    }

    /// Send a first code, or report that the email is already verified.
    ///
    /// # Errors
    /// Validation, registration, rate-limit and delivery failures.
    #[instrument(skip(self))]
    pub async fn issue(&self, email: &str) -> Result<IssueStatus, OtpError> {
        validate_email(email)?;
        self.ensure_unregistered(email).await?;

        let issued = match self.store.begin_issue(email).await? {
            IssueOutcome::AlreadyVerified => return Ok(IssueStatus::AlreadyVerified),
            IssueOutcome::Issued(issued) => issued,
        };

        if let Err(err) = self.deliver(email, &issued).await {
            error!("Failed to send OTP email: {err:#}");
            self.store.discard(email, &issued).await;
            return Err(OtpError::DeliveryFailure);
        }

        info!("OTP sent");
        Ok(IssueStatus::Sent)
    }

    /// Replace a pending code once its cooldown has passed.
    ///
    /// # Errors
    /// Validation, registration, lookup, rate-limit and delivery failures.
    #[instrument(skip(self))]
    pub async fn resend(&self, email: &str) -> Result<(), OtpError> {
        validate_email(email)?;
        self.ensure_unregistered(email).await?;

        let issued = self.store.begin_resend(email).await?;

        if let Err(err) = self.deliver(email, &issued).await {
            error!("Failed to resend OTP email: {err:#}");
            return Err(OtpError::DeliveryFailure);
        }

        info!("OTP resent");
        Ok(())
    }

    /// # Errors
    /// Returns `OtpError::Validation` when the email is missing.
    pub async fn status(&self, email: &str) -> Result<ChallengeStatus, OtpError> {
        if email.is_empty() {
            return Err(OtpError::Validation(EMAIL_REQUIRED));
        }
        Ok(self.store.status(email).await)
    }

    /// # Errors
    /// Validation failures or the reason the store rejected the code.
    #[instrument(skip(self, code))]
    pub async fn verify(&self, email: &str, code: &str) -> Result<(), OtpError> {
        if email.is_empty() || code.is_empty() {
            return Err(OtpError::Validation(EMAIL_AND_CODE_REQUIRED));
        }
        if !valid_email(email) {
            return Err(OtpError::Validation(EMAIL_INVALID));
        }
        if !valid_code(code) {
            return Err(OtpError::Validation(CODE_FORMAT));
        }

        self.store.verify(email, code).await
    }

    async fn ensure_unregistered(&self, email: &str) -> Result<(), OtpError> {
        match self.volunteers.email_exists(email).await {
            Ok(false) => Ok(()),
            Ok(true) => Err(OtpError::AlreadyRegistered),
            Err(err) => {
                error!("Failed to look up volunteer email: {err:#}");
                Err(OtpError::Lookup)
            }
        }
    }

    async fn deliver(&self, email: &str, issued: &IssuedCode) -> anyhow::Result<()> {
        let message = otp_message(
            email,
            &issued.code,
            valid_minutes(self.store.config().ttl()),
        );
        self.mailer.send(&message).await
    }
}

/// Whole minutes shown in the mail, rounded up so short lifetimes never read as zero.
fn valid_minutes(ttl: Duration) -> u64 {
    ttl.as_secs().div_ceil(60).max(1)
}

fn validate_email(email: &str) -> Result<(), OtpError> {
    if email.is_empty() {
        return Err(OtpError::Validation(EMAIL_REQUIRED));
    }
    if !valid_email(email) {
        return Err(OtpError::Validation(EMAIL_INVALID));
    }
    Ok(())
}

fn valid_code(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|byte| byte.is_ascii_digit())
}
