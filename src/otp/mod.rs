//! Email ownership challenges (one-time codes).
//!
//! The [`OtpStore`] owns the challenge table, the [`OtpService`] wraps it with
//! input validation, the registered-email precondition and mail delivery, and
//! [`spawn_sweeper`] runs periodic expiry cleanup.

mod error;
mod service;
mod store;
mod sweeper;

pub use error::OtpError;
pub use service::{IssueStatus, OtpService};
pub use store::{ChallengeStatus, IssueOutcome, IssuedCode, OtpConfig, OtpStore};
pub use sweeper::spawn_sweeper;
