use crate::cli::{actions::Action, commands, dispatch::handler, telemetry};
use anyhow::Result;

fn get_verbosity_level(matches: &clap::ArgMatches) -> Option<tracing::Level> {
    let level = match matches
        .get_one::<u8>(commands::logging::ARG_VERBOSITY)
        .copied()
        .unwrap_or(0)
    {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    Some(level)
}

/// Parse arguments, initialize telemetry and return the action to run.
/// # Errors
/// Returns an error if telemetry setup fails or arguments are inconsistent.
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    telemetry::init(get_verbosity_level(&matches))?;

    handler(&matches)
}
