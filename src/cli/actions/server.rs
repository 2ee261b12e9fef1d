use crate::{
    api::{self, AppConfig, ServerOptions},
    cli::commands::{otp, volunteer},
    otp::OtpConfig,
};
use anyhow::Result;
use secrecy::SecretString;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: SecretString,
    pub volunteer: volunteer::Options,
    pub otp: otp::Options,
}

impl Args {
    fn server_options(&self) -> ServerOptions {
        let volunteer = &self.volunteer;
        let app = AppConfig::new(volunteer.frontend_base_url.clone())
            .with_cors_origins(volunteer.cors_origins.clone())
            .with_upload_dir(volunteer.upload_dir.clone())
            .with_max_upload_bytes(volunteer.max_upload_bytes)
            .with_registration_prefix(volunteer.registration_prefix.clone())
            .with_session_ttl_seconds(volunteer.session_ttl_seconds)
            .with_reset_token_ttl_seconds(volunteer.reset_token_ttl_seconds);

        let otp = OtpConfig::new()
            .with_ttl_seconds(self.otp.ttl_seconds)
            .with_resend_cooldown_seconds(self.otp.resend_cooldown_seconds)
            .with_max_attempts(self.otp.max_attempts);

        ServerOptions {
            port: self.port,
            public_base_url: volunteer.public_base_url.clone(),
            app,
            otp,
            sweep_interval: Duration::from_secs(self.otp.sweep_interval_seconds),
        }
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let options = args.server_options();
    debug!(
        port = options.port,
        frontend = options.app.frontend_base_url(),
        upload_dir = %options.app.upload_dir().display(),
        otp_ttl_seconds = options.otp.ttl().as_secs(),
        "Starting server"
    );

    api::new(args.dsn, options).await
}
