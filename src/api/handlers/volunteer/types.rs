//! Request and response payloads for volunteer endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::volunteers::Volunteer;

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// Returned by login and password reset; `token` is also set as the session cookie.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub success: bool,
    pub message: String,
    pub volunteer: Volunteer,
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VolunteerResponse {
    pub success: bool,
    pub volunteer: Volunteer,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub volunteer: Volunteer,
}

/// Multipart form accepted by registration (documented only; parsed field by field).
#[allow(dead_code)]
#[derive(ToSchema)]
#[schema(rename_all = "camelCase")]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
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
    pub education_degree: String,
    pub education_year_of_completion: String,
    pub employment_status: String,
    pub monthly_income_range: Option<String>,
    pub undertaking: bool,
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
    #[schema(value_type = String, format = Binary)]
    pub education_certificate: Vec<u8>,
    #[schema(value_type = String, format = Binary)]
    pub bank_document: Vec<u8>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub police_verification: Option<Vec<u8>>,
}
