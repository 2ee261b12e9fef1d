//! Route handlers for the volunteer API.

pub mod health;
pub mod otp;
pub mod response;
pub mod volunteer;
