use crate::cli::{
    actions::{server::Args, Action},
    commands::{otp, volunteer},
};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    Ok(Action::Server(Args {
        port,
        dsn: SecretString::from(dsn),
        volunteer: volunteer::Options::parse(matches)?,
        otp: otp::Options::parse(matches)?,
    }))
}
