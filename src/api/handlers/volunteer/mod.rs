//! Volunteer account endpoints: registration, sessions and password reset.

pub mod password;
pub mod register;
pub mod session;
pub mod types;
