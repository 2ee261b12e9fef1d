//! Registered volunteer records, sessions and password reset state.
//!
//! Storage sits behind [`VolunteerRepository`]; the server uses the `PostgreSQL`
//! implementation and tests use the in-memory one.

pub mod credentials;
pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EducationQualification {
    pub degree: String,
    pub year_of_completion: String,
    /// URL of the uploaded certificate.
    pub certificate: String,
}

/// Profile fields collected by the registration form, with document URLs.
#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolunteerDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub guardian: String,
    pub age: String,
    pub address: String,
    pub current_address: String,
    pub state: String,
    pub district: String,
    pub city: String,
    pub pincode: String,
    pub dob: String,
    pub gender: String,
    pub bank_acc_number: String,
    pub bank_name: String,
    pub ifsc: String,
    pub education_qualification: EducationQualification,
    pub employment_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_income_range: Option<String>,
    pub image: String,
    pub bank_document: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub police_verification: Option<String>,
    pub undertaking: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Volunteer {
    pub id: Uuid,
    pub temp_reg_number: String,
    #[serde(flatten)]
    pub details: VolunteerDetails,
    pub account_verified: bool,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
}

/// Record handed to [`VolunteerRepository::create`].
#[derive(Clone, Debug)]
pub struct NewVolunteer {
    pub temp_reg_number: String,
    pub details: VolunteerDetails,
    pub password_hash: String,
}

#[derive(Clone, Debug)]
pub enum CreateOutcome {
    Created(Box<Volunteer>),
    /// Email or phone collided with an existing record.
    Conflict,
}

/// Minimal fields needed to check a login.
#[derive(Clone, Debug)]
pub struct LoginRecord {
    pub volunteer: Volunteer,
    pub password_hash: String,
}

#[async_trait]
pub trait VolunteerRepository: Send + Sync {
    async fn ping(&self) -> Result<()>;

    async fn email_exists(&self, email: &str) -> Result<bool>;

    async fn phone_exists(&self, phone: &str) -> Result<bool>;

    async fn count(&self) -> Result<i64>;

    async fn create(&self, volunteer: NewVolunteer) -> Result<CreateOutcome>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Volunteer>>;

    async fn find_login(&self, email: &str) -> Result<Option<LoginRecord>>;

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn clear_reset_token(&self, id: Uuid) -> Result<()>;

    /// Volunteer whose reset token hash matches and has not expired at `now`.
    async fn find_by_reset_token(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<Volunteer>>;

    /// Store a new password hash and clear any pending reset token.
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()>;

    async fn create_session(
        &self,
        id: Uuid,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Volunteer owning a session that has not expired at `now`.
    async fn find_session(&self, token_hash: &[u8], now: DateTime<Utc>)
        -> Result<Option<Volunteer>>;

    async fn delete_session(&self, token_hash: &[u8]) -> Result<()>;
}

/// Display identifier minted from the number of existing records, e.g. `ASF/FE/00042`.
#[must_use]
pub fn registration_number(prefix: &str, existing: i64) -> String {
    format!("{prefix}/{:05}", existing.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::new_volunteer;

    #[test]
    fn registration_number_pads_to_five_digits() {
        assert_eq!(registration_number("ASF/FE", 0), "ASF/FE/00001");
        assert_eq!(registration_number("ASF/FE", 41), "ASF/FE/00042");
        assert_eq!(registration_number("X", 123_456), "X/123457");
    }

    #[test]
    fn volunteer_serializes_flat_camel_case() -> anyhow::Result<()> {
        let volunteer = Volunteer {
            id: Uuid::nil(),
            temp_reg_number: "ASF/FE/00001".to_string(),
            details: new_volunteer("a@b.com", "9999999999").details,
            account_verified: true,
            is_blocked: false,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&volunteer)?;
        assert_eq!(value["email"], "a@b.com");
        assert_eq!(value["tempRegNumber"], "ASF/FE/00001");
        assert_eq!(value["accountVerified"], true);
        assert_eq!(value["educationQualification"]["yearOfCompletion"], "2020");
        assert!(value.get("policeVerification").is_none());
        assert!(value.get("passwordHash").is_none());
        Ok(())
    }
}
