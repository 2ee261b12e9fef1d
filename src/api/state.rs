//! Shared handler state and HTTP-facing configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::documents::DocumentStore;
use crate::email::EmailSender;
use crate::otp::{OtpService, OtpStore};
use crate::volunteers::VolunteerRepository;

const DEFAULT_REGISTRATION_PREFIX: &str = "ASF/FE";
const DEFAULT_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_RESET_TOKEN_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_UPLOAD_DIR: &str = "uploads";

#[derive(Clone, Debug)]
pub struct AppConfig {
    frontend_base_url: String,
    cors_origins: Vec<String>,
    upload_dir: PathBuf,
    max_upload_bytes: usize,
    registration_prefix: String,
    session_ttl_seconds: i64,
    reset_token_ttl_seconds: i64,
}

impl AppConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            cors_origins: Vec::new(),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            registration_prefix: DEFAULT_REGISTRATION_PREFIX.to_string(),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            reset_token_ttl_seconds: DEFAULT_RESET_TOKEN_TTL_SECONDS,
        }
    }

    /// Extra CORS origins; the frontend origin is always allowed.
    #[must_use]
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    #[must_use]
    pub fn with_upload_dir(mut self, dir: PathBuf) -> Self {
        self.upload_dir = dir;
        self
    }

    #[must_use]
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    #[must_use]
    pub fn with_registration_prefix(mut self, prefix: String) -> Self {
        self.registration_prefix = prefix;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reset_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn cors_origins(&self) -> &[String] {
        &self.cors_origins
    }

    #[must_use]
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    #[must_use]
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    #[must_use]
    pub fn registration_prefix(&self) -> &str {
        &self.registration_prefix
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn reset_token_ttl_seconds(&self) -> i64 {
        self.reset_token_ttl_seconds
    }

    /// Session cookies carry `Secure` only when the frontend is served over HTTPS.
    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }

    #[must_use]
    pub fn reset_password_url(&self, token: &str) -> String {
        let base = self.frontend_base_url.trim_end_matches('/');
        format!("{base}/volunteer/reset-password/{token}")
    }
}

/// Everything the handlers need, shared behind one `Arc`.
pub struct AppState {
    config: AppConfig,
    otp: OtpService,
    volunteers: Arc<dyn VolunteerRepository>,
    documents: Arc<dyn DocumentStore>,
    mailer: Arc<dyn EmailSender>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        otp_store: Arc<OtpStore>,
        volunteers: Arc<dyn VolunteerRepository>,
        documents: Arc<dyn DocumentStore>,
        mailer: Arc<dyn EmailSender>,
    ) -> Self {
        let otp = OtpService::new(otp_store, mailer.clone(), volunteers.clone());
        Self {
            config,
            otp,
            volunteers,
            documents,
            mailer,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn otp(&self) -> &OtpService {
        &self.otp
    }

    #[must_use]
    pub fn otp_store(&self) -> &Arc<OtpStore> {
        self.otp.store()
    }

    #[must_use]
    pub fn volunteers(&self) -> &dyn VolunteerRepository {
        self.volunteers.as_ref()
    }

    #[must_use]
    pub fn documents(&self) -> &dyn DocumentStore {
        self.documents.as_ref()
    }

    #[must_use]
    pub fn mailer(&self) -> &dyn EmailSender {
        self.mailer.as_ref()
    }
}
