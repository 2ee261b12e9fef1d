//! `PostgreSQL` storage for volunteers and their sessions.
//!
//! Queries are raw `sqlx` statements, each wrapped in a `db.query` span. The
//! schema lives in `db/sql/schema.sql`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{Instrument, Span};
use uuid::Uuid;

use super::{
    CreateOutcome, EducationQualification, LoginRecord, NewVolunteer, Volunteer, VolunteerDetails,
    VolunteerRepository,
};

const VOLUNTEER_COLUMNS: &str = r"
    v.id, v.temp_reg_number, v.name, v.email, v.phone, v.guardian, v.age, v.address,
    v.current_address, v.state, v.district, v.city, v.pincode, v.dob, v.gender,
    v.bank_acc_number, v.bank_name, v.ifsc, v.education_degree, v.education_year,
    v.education_certificate, v.employment_status, v.monthly_income_range, v.image,
    v.bank_document, v.police_verification, v.undertaking, v.account_verified,
    v.is_blocked, v.created_at
";

#[derive(Clone)]
pub struct PgVolunteerRepository {
    pool: PgPool,
}

impl PgVolunteerRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_span(operation: &'static str, statement: &str) -> Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn volunteer_from_row(row: &PgRow) -> Volunteer {
    Volunteer {
        id: row.get("id"),
        temp_reg_number: row.get("temp_reg_number"),
        details: VolunteerDetails {
            name: row.get("name"),
            email: row.get("email"),
            phone: row.get("phone"),
            guardian: row.get("guardian"),
            age: row.get("age"),
            address: row.get("address"),
            current_address: row.get("current_address"),
            state: row.get("state"),
            district: row.get("district"),
            city: row.get("city"),
            pincode: row.get("pincode"),
            dob: row.get("dob"),
            gender: row.get("gender"),
            bank_acc_number: row.get("bank_acc_number"),
            bank_name: row.get("bank_name"),
            ifsc: row.get("ifsc"),
            education_qualification: EducationQualification {
                degree: row.get("education_degree"),
                year_of_completion: row.get("education_year"),
                certificate: row.get("education_certificate"),
            },
            employment_status: row.get("employment_status"),
            monthly_income_range: row.get("monthly_income_range"),
            image: row.get("image"),
            bank_document: row.get("bank_document"),
            police_verification: row.get("police_verification"),
            undertaking: row.get("undertaking"),
        },
        account_verified: row.get("account_verified"),
        is_blocked: row.get("is_blocked"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl VolunteerRepository for PgVolunteerRepository {
    async fn ping(&self) -> Result<()> {
        let query = "SELECT 1";
        sqlx::query(query)
            .execute(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("database ping failed")?;
        Ok(())
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        let query = "SELECT EXISTS (SELECT 1 FROM volunteers WHERE email = $1)";
        let exists: bool = sqlx::query_scalar(query)
            .bind(email)
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to check volunteer email")?;
        Ok(exists)
    }

    async fn phone_exists(&self, phone: &str) -> Result<bool> {
        let query = "SELECT EXISTS (SELECT 1 FROM volunteers WHERE phone = $1)";
        let exists: bool = sqlx::query_scalar(query)
            .bind(phone)
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to check volunteer phone")?;
        Ok(exists)
    }

    async fn count(&self) -> Result<i64> {
        let query = "SELECT COUNT(*) FROM volunteers";
        let count: i64 = sqlx::query_scalar(query)
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to count volunteers")?;
        Ok(count)
    }

    async fn create(&self, volunteer: NewVolunteer) -> Result<CreateOutcome> {
        let query = format!(
            r"
            INSERT INTO volunteers AS v
                (temp_reg_number, name, email, phone, guardian, age, address, current_address,
                 state, district, city, pincode, dob, gender, bank_acc_number, bank_name, ifsc,
                 education_degree, education_year, education_certificate, employment_status,
                 monthly_income_range, image, bank_document, police_verification, undertaking,
                 password_hash, account_verified)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, TRUE)
            RETURNING {VOLUNTEER_COLUMNS}
            "
        );
        let details = &volunteer.details;
        let education = &details.education_qualification;
        let row = sqlx::query(&query)
            .bind(&volunteer.temp_reg_number)
            .bind(&details.name)
            .bind(&details.email)
            .bind(&details.phone)
            .bind(&details.guardian)
            .bind(&details.age)
            .bind(&details.address)
            .bind(&details.current_address)
            .bind(&details.state)
            .bind(&details.district)
            .bind(&details.city)
            .bind(&details.pincode)
            .bind(&details.dob)
            .bind(&details.gender)
            .bind(&details.bank_acc_number)
            .bind(&details.bank_name)
            .bind(&details.ifsc)
            .bind(&education.degree)
            .bind(&education.year_of_completion)
            .bind(&education.certificate)
            .bind(&details.employment_status)
            .bind(&details.monthly_income_range)
            .bind(&details.image)
            .bind(&details.bank_document)
            .bind(&details.police_verification)
            .bind(details.undertaking)
            .bind(&volunteer.password_hash)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", &query))
            .await;

        match row {
            Ok(row) => Ok(CreateOutcome::Created(Box::new(volunteer_from_row(&row)))),
            Err(err) if is_unique_violation(&err) => Ok(CreateOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert volunteer"),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Volunteer>> {
        let query = format!("SELECT {VOLUNTEER_COLUMNS} FROM volunteers v WHERE v.id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to load volunteer")?;
        Ok(row.as_ref().map(volunteer_from_row))
    }

    async fn find_login(&self, email: &str) -> Result<Option<LoginRecord>> {
        let query = format!(
            "SELECT {VOLUNTEER_COLUMNS}, v.password_hash FROM volunteers v WHERE v.email = $1"
        );
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup login record")?;
        Ok(row.map(|row| LoginRecord {
            volunteer: volunteer_from_row(&row),
            password_hash: row.get("password_hash"),
        }))
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let query = r"
            UPDATE volunteers
            SET reset_token_hash = $2, reset_token_expires_at = $3
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(id)
            .bind(token_hash)
            .bind(expires_at)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to store reset token")?;
        Ok(())
    }

    async fn clear_reset_token(&self, id: Uuid) -> Result<()> {
        let query = r"
            UPDATE volunteers
            SET reset_token_hash = NULL, reset_token_expires_at = NULL
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to clear reset token")?;
        Ok(())
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<Volunteer>> {
        let query = format!(
            r"
            SELECT {VOLUNTEER_COLUMNS}
            FROM volunteers v
            WHERE v.reset_token_hash = $1
              AND v.reset_token_expires_at > $2
            "
        );
        let row = sqlx::query(&query)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup reset token")?;
        Ok(row.as_ref().map(volunteer_from_row))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        let query = r"
            UPDATE volunteers
            SET password_hash = $2,
                reset_token_hash = NULL,
                reset_token_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to update password")?;
        Ok(())
    }

    async fn create_session(
        &self,
        id: Uuid,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let query = r"
            INSERT INTO volunteer_sessions (volunteer_id, session_hash, expires_at)
            VALUES ($1, $2, $3)
        ";
        sqlx::query(query)
            .bind(id)
            .bind(token_hash)
            .bind(expires_at)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .context("failed to insert session")?;
        Ok(())
    }

    async fn find_session(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<Volunteer>> {
        let query = format!(
            r"
            SELECT {VOLUNTEER_COLUMNS}
            FROM volunteer_sessions s
            JOIN volunteers v ON v.id = s.volunteer_id
            WHERE s.session_hash = $1
              AND s.expires_at > $2
            "
        );
        let row = sqlx::query(&query)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup session")?;
        Ok(row.as_ref().map(volunteer_from_row))
    }

    async fn delete_session(&self, token_hash: &[u8]) -> Result<()> {
        let query = "DELETE FROM volunteer_sessions WHERE session_hash = $1";
        sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to delete session")?;
        Ok(())
    }
}
