use clap::{Arg, ArgMatches, Command};

pub const ARG_OTP_TTL_SECONDS: &str = "otp-ttl-seconds";
pub const ARG_OTP_RESEND_COOLDOWN_SECONDS: &str = "otp-resend-cooldown-seconds";
pub const ARG_OTP_MAX_ATTEMPTS: &str = "otp-max-attempts";
pub const ARG_OTP_SWEEP_INTERVAL_SECONDS: &str = "otp-sweep-interval-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub ttl_seconds: u64,
    pub resend_cooldown_seconds: u64,
    pub max_attempts: u32,
    pub sweep_interval_seconds: u64,
}

impl Options {
    /// Parse verification code arguments from matches.
    ///
    /// # Errors
    /// Returns an error if an argument is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_u64 = |id: &str| -> anyhow::Result<u64> {
            matches
                .get_one::<u64>(id)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        Ok(Self {
            ttl_seconds: read_u64(ARG_OTP_TTL_SECONDS)?,
            resend_cooldown_seconds: read_u64(ARG_OTP_RESEND_COOLDOWN_SECONDS)?,
            max_attempts: matches
                .get_one::<u32>(ARG_OTP_MAX_ATTEMPTS)
                .copied()
                .ok_or_else(|| {
                    anyhow::anyhow!("missing required argument: --{ARG_OTP_MAX_ATTEMPTS}")
                })?,
            sweep_interval_seconds: read_u64(ARG_OTP_SWEEP_INTERVAL_SECONDS)?,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OTP_TTL_SECONDS)
                .long(ARG_OTP_TTL_SECONDS)
                .help("Lifetime of an email verification code in seconds")
                .env("VOLREG_OTP_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_OTP_RESEND_COOLDOWN_SECONDS)
                .long(ARG_OTP_RESEND_COOLDOWN_SECONDS)
                .help("Seconds before a new code can be requested for the same email")
                .env("VOLREG_OTP_RESEND_COOLDOWN_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_OTP_MAX_ATTEMPTS)
                .long(ARG_OTP_MAX_ATTEMPTS)
                .help("Wrong codes accepted before the challenge is discarded")
                .env("VOLREG_OTP_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_OTP_SWEEP_INTERVAL_SECONDS)
                .long(ARG_OTP_SWEEP_INTERVAL_SECONDS)
                .help("How often expired codes are swept from memory, in seconds")
                .env("VOLREG_OTP_SWEEP_INTERVAL_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
