//! # Volreg (Volunteer Registry)
//!
//! `volreg` is the backend for volunteer onboarding. It proves control of an
//! email address with a one-time code, registers the volunteer together with
//! their documents, and issues sessions for later logins.
//!
//! ## Email Verification (OTP)
//!
//! Verification challenges live in an in-process [`otp::OtpStore`] keyed by the
//! email address exactly as received.
//!
//! - **Code:** 6 random digits in `100000..=999999`, valid for 5 minutes.
//! - **Resend Cooldown:** a new code can be requested 5 minutes after the last one.
//! - **Attempts:** 5 wrong codes delete the challenge; the caller must start over.
//! - **Linearizable:** every check-then-write runs under the store mutex, so the
//!   attempt ceiling holds under concurrent requests.
//!
//! Expired challenges are removed lazily when probed and by a background sweeper
//! owned by the server lifecycle.
//!
//! ## Registration
//!
//! Registration is gated on a verified challenge for the email. Once the record
//! is created the challenge is consumed, so verified entries do not outlive the
//! registration they unlocked.
//!
//! > **Note:** the challenge table is not shared between instances. Run a single
//! > instance or pin clients to one instance until the store is externalized.

pub mod api;
pub mod cli;
pub mod documents;
pub mod email;
pub mod otp;
pub mod volunteers;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
pub(crate) mod test_support;
