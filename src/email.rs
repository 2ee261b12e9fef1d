//! Outbound email abstractions and message templates.
//!
//! Every flow that mails a volunteer (verification codes, welcome notes,
//! password reset links) builds an [`EmailMessage`] and hands it to an
//! [`EmailSender`]. The sender decides how to deliver and returns `Ok`/`Err`;
//! callers decide what a failure means for their flow.
//!
//! The default sender is [`LogEmailSender`], which logs and returns `Ok(())`.

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use tracing::info;

pub const TEMPLATE_OTP: &str = "otp_verification";
pub const TEMPLATE_WELCOME: &str = "welcome";
pub const TEMPLATE_PASSWORD_RESET: &str = "password_reset";

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub template: &'static str,
    pub html_body: String,
}

/// Email delivery abstraction.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error describing why it was not sent.
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the message instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            template = message.template,
            body_len = message.html_body.len(),
            "email send stub"
        );
        Ok(())
    }
}

/// Basic `local@domain.tld` shape check.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// Verification code mail.
#[must_use]
pub fn otp_message(to_email: &str, code: &str, valid_minutes: u64) -> EmailMessage {
    let html_body = format!(
        r#"<!DOCTYPE html>
<html>
  <body style="font-family: Arial, sans-serif; background-color: #f9f9f9;">
    <div style="max-width: 600px; margin: 20px auto; padding: 20px; background-color: #ffffff; border-radius: 8px;">
      <h1 style="text-align: center; color: #4caf50;">Your OTP for Email Verification</h1>
      <p>Dear User,</p>
      <p>Please use the following One-Time Password (OTP) to verify your email:</p>
      <div class="otp-box">{code}</div>
      <p>This code is valid for the next {valid_minutes} minutes. Please do not share this code with anyone.</p>
      <p>If you did not request this, please ignore this email.</p>
      <p style="font-size: 12px; color: #aaa; text-align: center;">This is an automated message. Please do not reply to this email.</p>
    </div>
  </body>
</html>"#
    );

    EmailMessage {
        to_email: to_email.to_string(),
        subject: "Email Verification OTP".to_string(),
        template: TEMPLATE_OTP,
        html_body,
    }
}

/// Sent once a registration has been stored.
#[must_use]
pub fn welcome_message(to_email: &str, name: &str, reg_number: &str) -> EmailMessage {
    let html_body = format!(
        r#"<div style="font-family: Arial, sans-serif; padding: 20px; max-width: 600px; margin: auto;">
  <h2 style="text-align: center;">Welcome, {name}!</h2>
  <p>Dear Volunteer {name},</p>
  <p>Your registration has been successfully completed. Below are your details:</p>
  <div style="background: #f8f9fa; padding: 10px; border-radius: 5px;">
    <p><strong>Name:</strong> {name}</p>
    <p><strong>Email:</strong> {to_email}</p>
    <p><strong>Registration Number:</strong> {reg_number}</p>
  </div>
  <p style="text-align: center; font-size: 12px; color: #888;">This is an automated email, please do not reply.</p>
</div>"#
    );

    EmailMessage {
        to_email: to_email.to_string(),
        subject: "Registration Successful".to_string(),
        template: TEMPLATE_WELCOME,
        html_body,
    }
}

#[must_use]
pub fn password_reset_message(to_email: &str, reset_url: &str) -> EmailMessage {
    let html_body = format!(
        r#"<div style="font-family: Arial, sans-serif; padding: 20px; max-width: 600px; margin: auto;">
  <h2>Password Reset Request</h2>
  <p>We received a request to reset your password. You can reset it using the link below:</p>
  <p style="word-break: break-all;"><a href="{reset_url}">{reset_url}</a></p>
  <p>If you did not request a password reset, please ignore this email.</p>
  <p>This is an automated message. Please do not reply to this email.</p>
</div>"#
    );

    EmailMessage {
        to_email: to_email.to_string(),
        subject: "Reset Password".to_string(),
        template: TEMPLATE_PASSWORD_RESET,
        html_body,
    }
}
