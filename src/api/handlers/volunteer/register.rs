//! Volunteer registration (multipart form with documents).
//!
//! Flow Overview:
//! 1) Read text fields and files from the form.
//! 2) Run the checks in a fixed order: required fields, uniqueness, verified
//!    email, undertaking, income range, required documents.
//! 3) Mint the registration number, store the documents, hash the password.
//! 4) Create the record, consume the verification challenge, send a welcome mail.

use axum::{
    extract::{multipart::MultipartRejection, Extension, Multipart},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::types::{RegisterForm, RegisterResponse};
use crate::api::handlers::response::{error_response, ErrorBody, INTERNAL_ERROR};
use crate::api::state::AppState;
use crate::email::welcome_message;
use crate::volunteers::{
    credentials::hash_password, registration_number, CreateOutcome, EducationQualification,
    NewVolunteer, VolunteerDetails,
};

const REQUIRED_FIELDS: [&str; 21] = [
    "name",
    "email",
    "phone",
    "password",
    "guardian",
    "age",
    "address",
    "currentAddress",
    "state",
    "district",
    "city",
    "pincode",
    "dob",
    "gender",
    "bankAccNumber",
    "bankName",
    "ifsc",
    "educationDegree",
    "educationYearOfCompletion",
    "employmentStatus",
    "undertaking",
];

const REQUIRED_DOCUMENTS: [&str; 3] = ["image", "educationCertificate", "bankDocument"];
const DOCUMENT_FIELDS: [&str; 4] = [
    "image",
    "educationCertificate",
    "bankDocument",
    "policeVerification",
];

const ALREADY_REGISTERED: &str = "Email or phone is already registered.";

struct Upload {
    bytes: Vec<u8>,
    file_name: Option<String>,
}

#[derive(Default)]
struct RegistrationForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Upload>,
}

impl RegistrationForm {
    async fn read(mut multipart: Multipart) -> Result<Self, Response> {
        let mut form = Self::default();
        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(err) => return Err(error_response(err.status(), err.body_text())),
            };
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if DOCUMENT_FIELDS.contains(&name.as_str()) {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| error_response(err.status(), err.body_text()))?;
                // Empty file inputs count as not uploaded.
                if !bytes.is_empty() {
                    form.files.insert(
                        name,
                        Upload {
                            bytes: bytes.to_vec(),
                            file_name,
                        },
                    );
                }
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|err| error_response(err.status(), err.body_text()))?;
                // Passwords are hashed exactly as typed; login compares them untrimmed.
                let value = if name == "password" {
                    text
                } else {
                    text.trim().to_string()
                };
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    fn text(&self, name: &str) -> &str {
        self.fields.get(name).map_or("", String::as_str)
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        REQUIRED_FIELDS
            .into_iter()
            .filter(|name| self.text(name).is_empty())
            .collect()
    }

    fn missing_documents(&self) -> bool {
        REQUIRED_DOCUMENTS
            .iter()
            .any(|name| !self.files.contains_key(*name))
    }
}

#[utoipa::path(
    post,
    path = "/v1/volunteer/register",
    request_body(content = RegisterForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Volunteer registered", body = RegisterResponse),
        (status = 400, description = "Validation failure or unverified email", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody)
    ),
    tag = "volunteer"
)]
#[instrument(skip_all)]
pub async fn register(
    state: Extension<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> impl IntoResponse {
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => return error_response(rejection.status(), rejection.body_text()),
    };
    let form = match RegistrationForm::read(multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };

    match register_volunteer(&state, form).await {
        Ok(response) | Err(response) => response,
    }
}

async fn register_volunteer(state: &AppState, form: RegistrationForm) -> Result<Response, Response> {
    let missing = form.missing_fields();
    if !missing.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("Missing required field(s): {}", missing.join(", ")),
        ));
    }

    let email = form.text("email");
    let phone = form.text("phone");
    let taken = async {
        Ok::<bool, anyhow::Error>(
            state.volunteers().email_exists(email).await?
                || state.volunteers().phone_exists(phone).await?,
        )
    };
    match taken.await {
        Ok(false) => {}
        Ok(true) => return Err(error_response(StatusCode::BAD_REQUEST, ALREADY_REGISTERED)),
        Err(err) => {
            error!("Failed to check volunteer uniqueness: {err:#}");
            return Err(internal());
        }
    }

    if !state.otp_store().is_verified(email).await {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Email is not verified. Please verify your email first.",
        ));
    }

    if form.text("undertaking") != "true" {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Confirmation is required.",
        ));
    }

    let employed = form.text("employmentStatus") == "Employed";
    let income = form.text("monthlyIncomeRange");
    if employed && income.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Monthly income range is required for employed volunteers.",
        ));
    }

    if form.missing_documents() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "All required documents must be uploaded.",
        ));
    }

    let existing = state.volunteers().count().await.map_err(|err| {
        error!("Failed to count volunteers: {err:#}");
        internal()
    })?;
    let temp_reg_number = registration_number(state.config().registration_prefix(), existing);

    let image = upload(state, &form, "image", "users").await?;
    let certificate = upload(state, &form, "educationCertificate", "documents").await?;
    let bank_document = upload(state, &form, "bankDocument", "documents").await?;
    let police_verification = if form.files.contains_key("policeVerification") {
        Some(upload(state, &form, "policeVerification", "documents").await?)
    } else {
        None
    };

    let password = form.text("password").to_string();
    let password_hash = match tokio::task::spawn_blocking(move || hash_password(&password)).await {
        Ok(Ok(hash)) => hash,
        Ok(Err(err)) => {
            error!("Failed to hash password: {err:#}");
            return Err(internal());
        }
        Err(err) => {
            error!("Password hashing task failed: {err}");
            return Err(internal());
        }
    };

    let details = VolunteerDetails {
        name: form.text("name").to_string(),
        email: email.to_string(),
        phone: phone.to_string(),
        guardian: form.text("guardian").to_string(),
        age: form.text("age").to_string(),
        address: form.text("address").to_string(),
        current_address: form.text("currentAddress").to_string(),
        state: form.text("state").to_string(),
        district: form.text("district").to_string(),
        city: form.text("city").to_string(),
        pincode: form.text("pincode").to_string(),
        dob: form.text("dob").to_string(),
        gender: form.text("gender").to_string(),
        bank_acc_number: form.text("bankAccNumber").to_string(),
        bank_name: form.text("bankName").to_string(),
        ifsc: form.text("ifsc").to_string(),
        education_qualification: EducationQualification {
            degree: form.text("educationDegree").to_string(),
            year_of_completion: form.text("educationYearOfCompletion").to_string(),
            certificate,
        },
        employment_status: form.text("employmentStatus").to_string(),
        monthly_income_range: employed.then(|| income.to_string()),
        image,
        bank_document,
        police_verification,
        undertaking: true,
    };

    let volunteer = match state
        .volunteers()
        .create(NewVolunteer {
            temp_reg_number,
            details,
            password_hash,
        })
        .await
    {
        Ok(CreateOutcome::Created(volunteer)) => *volunteer,
        Ok(CreateOutcome::Conflict) => {
            return Err(error_response(StatusCode::BAD_REQUEST, ALREADY_REGISTERED))
        }
        Err(err) => {
            error!("Failed to create volunteer: {err:#}");
            return Err(internal());
        }
    };

    state.otp_store().consume_verified(email).await;

    let welcome = welcome_message(
        email,
        &volunteer.details.name,
        &volunteer.temp_reg_number,
    );
    if let Err(err) = state.mailer().send(&welcome).await {
        warn!("Failed to send welcome email: {err:#}");
    }

    info!(
        volunteer_id = %volunteer.id,
        temp_reg_number = %volunteer.temp_reg_number,
        "volunteer registered"
    );
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "Volunteer registered successfully.".to_string(),
            volunteer,
        }),
    )
        .into_response())
}

async fn upload(
    state: &AppState,
    form: &RegistrationForm,
    field: &str,
    category: &str,
) -> Result<String, Response> {
    let Some(file) = form.files.get(field) else {
        return Err(internal());
    };
    state
        .documents()
        .upload(&file.bytes, category, file.file_name.as_deref())
        .await
        .map_err(|err| {
            error!(field, "Failed to store document: {err}");
            internal()
        })
}

fn internal() -> Response {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
}
