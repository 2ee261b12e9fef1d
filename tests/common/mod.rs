//! Shared harness: the full router over in-memory storage and a recording mailer.

#![allow(dead_code)]

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Request, Response},
    Router,
};
use regex::Regex;
use serde_json::Value;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tempfile::TempDir;
use tokio::sync::Mutex;
use tower::ServiceExt;
use volreg::{
    api::{self, AppConfig, AppState},
    documents::LocalDocumentStore,
    email::{EmailMessage, EmailSender},
    otp::{OtpConfig, OtpStore},
    volunteers::memory::MemoryVolunteerRepository,
};

pub const FRONTEND: &str = "http://localhost:5173";
pub const PUBLIC_BASE: &str = "http://localhost:8080";
pub const BOUNDARY: &str = "volreg-test-boundary";

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn last_to(&self, email: &str) -> Option<EmailMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|message| message.to_email == email)
            .cloned()
    }
}

#[async_trait]
impl EmailSender for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("smtp unavailable");
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub mailer: Arc<RecordingMailer>,
    pub volunteers: Arc<MemoryVolunteerRepository>,
    pub otp_store: Arc<OtpStore>,
    pub uploads: TempDir,
}

impl TestApp {
    pub fn new() -> Result<Self> {
        let uploads = tempfile::tempdir()?;
        let config = AppConfig::new(FRONTEND.to_string())
            .with_upload_dir(uploads.path().to_path_buf());

        let mailer = Arc::new(RecordingMailer::default());
        let volunteers = Arc::new(MemoryVolunteerRepository::new());
        let otp_store = Arc::new(OtpStore::new(OtpConfig::new()));
        let documents = Arc::new(LocalDocumentStore::new(uploads.path(), PUBLIC_BASE));

        let state = Arc::new(AppState::new(
            config,
            otp_store.clone(),
            volunteers.clone(),
            documents,
            mailer.clone(),
        ));

        Ok(Self {
            router: api::app(state)?,
            mailer,
            volunteers,
            otp_store,
            uploads,
        })
    }

    pub async fn send(&self, request: Request<Body>) -> Result<Response<Body>> {
        let response = self.router.clone().oneshot(request).await?;
        Ok(response)
    }

    pub async fn post_json(&self, uri: &str, body: &Value) -> Result<(u16, Value)> {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?;
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        Ok((status, json_body(response).await?))
    }

    /// Send, then verify, a code for `email`.
    pub async fn verify_email(&self, email: &str) -> Result<()> {
        let (status, _) = self
            .post_json("/v1/volunteer/otp/send", &serde_json::json!({ "email": email }))
            .await?;
        if status != 200 {
            bail!("send otp returned {status}");
        }
        let message = self
            .mailer
            .last_to(email)
            .await
            .context("no otp mail recorded")?;
        let code = otp_code(&message).context("no code in otp mail")?;
        let (status, _) = self
            .post_json(
                "/v1/volunteer/otp/verify",
                &serde_json::json!({ "email": email, "otp": code }),
            )
            .await?;
        if status != 200 {
            bail!("verify otp returned {status}");
        }
        Ok(())
    }
}

pub async fn json_body(response: Response<Body>) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn otp_code(message: &EmailMessage) -> Option<String> {
    let re = Regex::new(r#"otp-box">(\d{6})<"#).ok()?;
    re.captures(&message.html_body)
        .and_then(|captures| captures.get(1))
        .map(|code| code.as_str().to_string())
}

pub fn reset_token(message: &EmailMessage) -> Option<String> {
    let re = Regex::new(r"/volunteer/reset-password/([A-Za-z0-9_-]+)").ok()?;
    re.captures(&message.html_body)
        .and_then(|captures| captures.get(1))
        .map(|token| token.as_str().to_string())
}

/// Registration form parts: text fields plus `(field, file name, bytes)` files.
pub struct Form {
    pub fields: Vec<(String, String)>,
    pub files: Vec<(String, String, Vec<u8>)>,
}

impl Form {
    pub fn complete(email: &str, phone: &str) -> Self {
        let fields = [
            ("name", "Asha Rao"),
            ("email", email),
            ("phone", phone),
            ("password", "correct horse"),
            ("guardian", "R. Rao"),
            ("age", "24"),
            ("address", "12 MG Road"),
            ("currentAddress", "12 MG Road"),
            ("state", "Karnataka"),
            ("district", "Bengaluru Urban"),
            ("city", "Bengaluru"),
            ("pincode", "560001"),
            ("dob", "2001-04-12"),
            ("gender", "Female"),
            ("bankAccNumber", "1234567890"),
            ("bankName", "Canara Bank"),
            ("ifsc", "CNRB0000001"),
            ("educationDegree", "B.Sc"),
            ("educationYearOfCompletion", "2022"),
            ("employmentStatus", "Unemployed"),
            ("undertaking", "true"),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();

        let files = [
            ("image", "photo.JPG"),
            ("educationCertificate", "degree.pdf"),
            ("bankDocument", "passbook.pdf"),
        ]
        .into_iter()
        .map(|(name, file)| (name.to_string(), file.to_string(), b"%PDF-1.4".to_vec()))
        .collect();

        Self { fields, files }
    }

    pub fn set(mut self, name: &str, value: &str) -> Self {
        self.fields.retain(|(field, _)| field != name);
        self.fields.push((name.to_string(), value.to_string()));
        self
    }

    pub fn without(mut self, name: &str) -> Self {
        self.fields.retain(|(field, _)| field != name);
        self.files.retain(|(field, _, _)| field != name);
        self
    }

    pub fn body(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in &self.fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        for (name, file_name, bytes) in &self.files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    pub fn request(&self) -> Result<Request<Body>> {
        Ok(Request::builder()
            .method("POST")
            .uri("/v1/volunteer/register")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(self.body()))?)
    }
}
