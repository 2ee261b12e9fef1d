use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_PUBLIC_BASE_URL: &str = "public-base-url";
pub const ARG_CORS_ORIGIN: &str = "cors-origin";
pub const ARG_UPLOAD_DIR: &str = "upload-dir";
pub const ARG_MAX_UPLOAD_BYTES: &str = "max-upload-bytes";
pub const ARG_REGISTRATION_PREFIX: &str = "registration-prefix";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_RESET_TOKEN_TTL_SECONDS: &str = "reset-token-ttl-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub frontend_base_url: String,
    pub public_base_url: String,
    pub cors_origins: Vec<String>,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub registration_prefix: String,
    pub session_ttl_seconds: i64,
    pub reset_token_ttl_seconds: i64,
}

impl Options {
    /// Parse volunteer service arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let string = |id: &str| -> anyhow::Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };
        let seconds = |id: &str| -> anyhow::Result<i64> {
            matches
                .get_one::<i64>(id)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        Ok(Self {
            frontend_base_url: string(ARG_FRONTEND_BASE_URL)?,
            public_base_url: string(ARG_PUBLIC_BASE_URL)?,
            cors_origins: matches
                .get_many::<String>(ARG_CORS_ORIGIN)
                .map(|values| values.cloned().collect())
                .unwrap_or_default(),
            upload_dir: PathBuf::from(string(ARG_UPLOAD_DIR)?),
            max_upload_bytes: matches
                .get_one::<usize>(ARG_MAX_UPLOAD_BYTES)
                .copied()
                .ok_or_else(|| {
                    anyhow::anyhow!("missing required argument: --{ARG_MAX_UPLOAD_BYTES}")
                })?,
            registration_prefix: string(ARG_REGISTRATION_PREFIX)?,
            session_ttl_seconds: seconds(ARG_SESSION_TTL_SECONDS)?,
            reset_token_ttl_seconds: seconds(ARG_RESET_TOKEN_TTL_SECONDS)?,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL, used for CORS and password reset links")
                .env("VOLREG_FRONTEND_BASE_URL")
                .default_value("http://localhost:5173"),
        )
        .arg(
            Arg::new(ARG_PUBLIC_BASE_URL)
                .long(ARG_PUBLIC_BASE_URL)
                .help("Public base URL of this API, used to build uploaded document URLs")
                .env("VOLREG_PUBLIC_BASE_URL")
                .default_value("http://localhost:8080"),
        )
        .arg(
            Arg::new(ARG_CORS_ORIGIN)
                .long(ARG_CORS_ORIGIN)
                .help("Additional allowed CORS origin, may be repeated")
                .env("VOLREG_CORS_ORIGINS")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new(ARG_UPLOAD_DIR)
                .long(ARG_UPLOAD_DIR)
                .help("Directory where uploaded documents are stored")
                .env("VOLREG_UPLOAD_DIR")
                .default_value("uploads"),
        )
        .arg(
            Arg::new(ARG_MAX_UPLOAD_BYTES)
                .long(ARG_MAX_UPLOAD_BYTES)
                .help("Maximum request body size for registration uploads")
                .env("VOLREG_MAX_UPLOAD_BYTES")
                .default_value("10485760")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_REGISTRATION_PREFIX)
                .long(ARG_REGISTRATION_PREFIX)
                .help("Prefix of temporary registration numbers")
                .env("VOLREG_REGISTRATION_PREFIX")
                .default_value("ASF/FE"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Lifetime of a login session in seconds")
                .env("VOLREG_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_RESET_TOKEN_TTL_SECONDS)
                .long(ARG_RESET_TOKEN_TTL_SECONDS)
                .help("Lifetime of a password reset token in seconds")
                .env("VOLREG_RESET_TOKEN_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
}
