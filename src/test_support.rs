//! Shared fixtures for unit tests.

use anyhow::{bail, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use crate::email::{EmailMessage, EmailSender};
use crate::volunteers::{EducationQualification, NewVolunteer, VolunteerDetails};

/// Sender that keeps every message it accepts and can be told to fail.
#[derive(Default)]
pub(crate) struct RecordingEmailSender {
    messages: Mutex<Vec<EmailMessage>>,
    failing: AtomicBool,
}

impl RecordingEmailSender {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing() -> Self {
        let sender = Self::default();
        sender.set_failing(true);
        sender
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) async fn messages(&self) -> Vec<EmailMessage> {
        self.messages.lock().await.clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("smtp unavailable");
        }
        self.messages.lock().await.push(message.clone());
        Ok(())
    }
}

/// Pull the six-digit code out of a verification mail.
pub(crate) fn code_from_message(message: &EmailMessage) -> Option<String> {
    Regex::new(r#"otp-box">(\d{6})<"#)
        .ok()?
        .captures(&message.html_body)?
        .get(1)
        .map(|code| code.as_str().to_string())
}

pub(crate) fn new_volunteer(email: &str, phone: &str) -> NewVolunteer {
    NewVolunteer {
        temp_reg_number: "ASF/FE/00001".to_string(),
        details: VolunteerDetails {
            name: "Asha Devi".to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            guardian: "Ram Prasad".to_string(),
            age: "28".to_string(),
            address: "12 Lake Road".to_string(),
            current_address: "12 Lake Road".to_string(),
            state: "Bihar".to_string(),
            district: "Patna".to_string(),
            city: "Patna".to_string(),
            pincode: "800001".to_string(),
            dob: "1997-04-02".to_string(),
            gender: "Female".to_string(),
            bank_acc_number: "0011223344".to_string(),
            bank_name: "State Bank".to_string(),
            ifsc: "SBIN0000001".to_string(),
            education_qualification: EducationQualification {
                degree: "B.A.".to_string(),
                year_of_completion: "2020".to_string(),
                certificate: "http://localhost:8080/uploads/documents/cert.pdf".to_string(),
            },
            employment_status: "Unemployed".to_string(),
            monthly_income_range: None,
            image: "http://localhost:8080/uploads/users/photo.png".to_string(),
            bank_document: "http://localhost:8080/uploads/documents/bank.pdf".to_string(),
            police_verification: None,
            undertaking: true,
        },
        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
    }
}
