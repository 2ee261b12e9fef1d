//! In-process repository used by tests and local runs without a database.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CreateOutcome, LoginRecord, NewVolunteer, Volunteer, VolunteerRepository};

struct StoredVolunteer {
    volunteer: Volunteer,
    password_hash: String,
    reset_token: Option<(Vec<u8>, DateTime<Utc>)>,
}

struct StoredSession {
    volunteer_id: Uuid,
    token_hash: Vec<u8>,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    volunteers: Vec<StoredVolunteer>,
    sessions: Vec<StoredSession>,
}

impl Tables {
    fn by_id_mut(&mut self, id: Uuid) -> Option<&mut StoredVolunteer> {
        self.volunteers
            .iter_mut()
            .find(|stored| stored.volunteer.id == id)
    }
}

#[derive(Default)]
pub struct MemoryVolunteerRepository {
    tables: Mutex<Tables>,
}

impl MemoryVolunteerRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live session rows, expired ones included.
    pub async fn session_count(&self) -> usize {
        self.tables.lock().await.sessions.len()
    }
}

#[async_trait]
impl VolunteerRepository for MemoryVolunteerRepository {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        let tables = self.tables.lock().await;
        Ok(tables
            .volunteers
            .iter()
            .any(|stored| stored.volunteer.details.email == email))
    }

    async fn phone_exists(&self, phone: &str) -> Result<bool> {
        let tables = self.tables.lock().await;
        Ok(tables
            .volunteers
            .iter()
            .any(|stored| stored.volunteer.details.phone == phone))
    }

    async fn count(&self) -> Result<i64> {
        let tables = self.tables.lock().await;
        Ok(i64::try_from(tables.volunteers.len())?)
    }

    async fn create(&self, volunteer: NewVolunteer) -> Result<CreateOutcome> {
        let mut tables = self.tables.lock().await;
        let conflict = tables.volunteers.iter().any(|stored| {
            stored.volunteer.details.email == volunteer.details.email
                || stored.volunteer.details.phone == volunteer.details.phone
        });
        if conflict {
            return Ok(CreateOutcome::Conflict);
        }

        let created = Volunteer {
            id: Uuid::new_v4(),
            temp_reg_number: volunteer.temp_reg_number,
            details: volunteer.details,
            account_verified: true,
            is_blocked: false,
            created_at: Utc::now(),
        };
        tables.volunteers.push(StoredVolunteer {
            volunteer: created.clone(),
            password_hash: volunteer.password_hash,
            reset_token: None,
        });
        Ok(CreateOutcome::Created(Box::new(created)))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Volunteer>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .volunteers
            .iter()
            .find(|stored| stored.volunteer.id == id)
            .map(|stored| stored.volunteer.clone()))
    }

    async fn find_login(&self, email: &str) -> Result<Option<LoginRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .volunteers
            .iter()
            .find(|stored| stored.volunteer.details.email == email)
            .map(|stored| LoginRecord {
                volunteer: stored.volunteer.clone(),
                password_hash: stored.password_hash.clone(),
            }))
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if let Some(stored) = tables.by_id_mut(id) {
            stored.reset_token = Some((token_hash.to_vec(), expires_at));
        }
        Ok(())
    }

    async fn clear_reset_token(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if let Some(stored) = tables.by_id_mut(id) {
            stored.reset_token = None;
        }
        Ok(())
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<Volunteer>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .volunteers
            .iter()
            .find(|stored| {
                stored
                    .reset_token
                    .as_ref()
                    .is_some_and(|(hash, expires_at)| hash == token_hash && *expires_at > now)
            })
            .map(|stored| stored.volunteer.clone()))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if let Some(stored) = tables.by_id_mut(id) {
            stored.password_hash = password_hash.to_string();
            stored.reset_token = None;
        }
        Ok(())
    }

    async fn create_session(
        &self,
        id: Uuid,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.sessions.push(StoredSession {
            volunteer_id: id,
            token_hash: token_hash.to_vec(),
            expires_at,
        });
        Ok(())
    }

    async fn find_session(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<Volunteer>> {
        let tables = self.tables.lock().await;
        let Some(session) = tables
            .sessions
            .iter()
            .find(|session| session.token_hash == token_hash && session.expires_at > now)
        else {
            return Ok(None);
        };
        Ok(tables
            .volunteers
            .iter()
            .find(|stored| stored.volunteer.id == session.volunteer_id)
            .map(|stored| stored.volunteer.clone()))
    }

    async fn delete_session(&self, token_hash: &[u8]) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables
            .sessions
            .retain(|session| session.token_hash != token_hash);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::new_volunteer;
    use anyhow::bail;
    use chrono::Duration;

    async fn created(repo: &MemoryVolunteerRepository, email: &str, phone: &str) -> Result<Volunteer> {
        match repo.create(new_volunteer(email, phone)).await? {
            CreateOutcome::Created(volunteer) => Ok(*volunteer),
            CreateOutcome::Conflict => bail!("unexpected conflict"),
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email_or_phone() -> Result<()> {
        let repo = MemoryVolunteerRepository::new();
        let volunteer = created(&repo, "a@b.com", "9999999999").await?;
        assert!(volunteer.account_verified);
        assert_eq!(repo.count().await?, 1);

        assert!(matches!(
            repo.create(new_volunteer("a@b.com", "1111111111")).await?,
            CreateOutcome::Conflict
        ));
        assert!(matches!(
            repo.create(new_volunteer("c@d.com", "9999999999")).await?,
            CreateOutcome::Conflict
        ));
        assert!(repo.email_exists("a@b.com").await?);
        assert!(repo.phone_exists("9999999999").await?);
        assert!(!repo.email_exists("A@B.com").await?);
        Ok(())
    }

    #[tokio::test]
    async fn reset_token_expires_and_clears_on_password_update() -> Result<()> {
        let repo = MemoryVolunteerRepository::new();
        let volunteer = created(&repo, "a@b.com", "9999999999").await?;
        let now = Utc::now();
        let expires_at = now + Duration::minutes(15);
        repo.set_reset_token(volunteer.id, b"hash", expires_at).await?;

        assert!(repo.find_by_reset_token(b"hash", now).await?.is_some());
        assert!(repo.find_by_reset_token(b"hash", expires_at).await?.is_none());
        assert!(repo.find_by_reset_token(b"other", now).await?.is_none());

        repo.update_password(volunteer.id, "new-hash").await?;
        assert!(repo.find_by_reset_token(b"hash", now).await?.is_none());
        let login = repo.find_login("a@b.com").await?;
        assert_eq!(login.map(|record| record.password_hash).as_deref(), Some("new-hash"));
        Ok(())
    }

    #[tokio::test]
    async fn sessions_resolve_until_expiry_or_delete() -> Result<()> {
        let repo = MemoryVolunteerRepository::new();
        let volunteer = created(&repo, "a@b.com", "9999999999").await?;
        let now = Utc::now();
        repo.create_session(volunteer.id, b"s1", now + Duration::days(7))
            .await?;

        let found = repo.find_session(b"s1", now).await?;
        assert_eq!(found.map(|v| v.id), Some(volunteer.id));
        assert!(repo
            .find_session(b"s1", now + Duration::days(8))
            .await?
            .is_none());

        repo.delete_session(b"s1").await?;
        assert!(repo.find_session(b"s1", now).await?.is_none());
        assert_eq!(repo.session_count().await, 0);
        Ok(())
    }
}
