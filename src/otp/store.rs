//! Per-email table of pending verification challenges.
//!
//! Each operation takes the table lock once and performs its whole
//! check-then-write sequence under it. Mail delivery never happens while the
//! lock is held; callers receive an [`IssuedCode`] and report failures back via
//! [`OtpStore::discard`].

use rand::{rngs::OsRng, Rng};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::error::OtpError;

const DEFAULT_TTL_SECONDS: u64 = 5 * 60;
const DEFAULT_RESEND_COOLDOWN_SECONDS: u64 = 5 * 60;
const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

#[derive(Clone, Copy, Debug)]
pub struct OtpConfig {
    ttl: Duration,
    resend_cooldown: Duration,
    max_attempts: u32,
}

impl OtpConfig {
    /// Default config: codes live 5 minutes, resend after 5 minutes, 5 attempts.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            resend_cooldown: Duration::from_secs(DEFAULT_RESEND_COOLDOWN_SECONDS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    #[must_use]
    pub fn with_ttl_seconds(mut self, seconds: u64) -> Self {
        self.ttl = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_resend_cooldown_seconds(mut self, seconds: u64) -> Self {
        self.resend_cooldown = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn normalize(self) -> Self {
        let ttl = if self.ttl.is_zero() {
            Duration::from_secs(1)
        } else {
            self.ttl
        };
        Self {
            ttl,
            resend_cooldown: self.resend_cooldown,
            max_attempts: self.max_attempts.max(1),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn resend_cooldown(&self) -> Duration {
        self.resend_cooldown
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
struct Challenge {
    code: String,
    issued_at: Instant,
    expires_at: Instant,
    attempts: u32,
    verified: bool,
}

/// A code that was just written to the table and still has to be mailed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedCode {
    pub code: String,
    issued_at: Instant,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IssueOutcome {
    /// The email already passed verification; nothing was written.
    AlreadyVerified,
    Issued(IssuedCode),
}

/// Read-only view of a challenge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChallengeStatus {
    pub exists: bool,
    pub can_resend: bool,
    pub is_expired: bool,
    pub verified: bool,
    pub attempts: u32,
    /// Seconds until a resend is allowed, zero when `can_resend`.
    pub remaining_seconds: u64,
}

impl ChallengeStatus {
    fn absent() -> Self {
        Self {
            can_resend: true,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
pub struct OtpStore {
    config: OtpConfig,
    challenges: Mutex<HashMap<String, Challenge>>,
}

impl OtpStore {
    #[must_use]
    pub fn new(config: OtpConfig) -> Self {
        Self {
            config: config.normalize(),
            challenges: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    /// Create a challenge unless one is verified or still inside its cooldown.
    ///
    /// # Errors
    /// Returns `OtpError::RateLimited` while the previous code is inside the cooldown.
    pub async fn begin_issue(&self, email: &str) -> Result<IssueOutcome, OtpError> {
        let now = Instant::now();
        let mut challenges = self.challenges.lock().await;

        if let Some(existing) = challenges.get(email) {
            if existing.verified {
                return Ok(IssueOutcome::AlreadyVerified);
            }
            if let Some(retry_after_seconds) = self.cooldown_remaining(existing, now) {
                return Err(OtpError::RateLimited {
                    retry_after_seconds,
                });
            }
        }

        Ok(IssueOutcome::Issued(self.replace(
            &mut challenges,
            email,
            now,
        )))
    }

    /// Replace an existing unverified challenge once its cooldown has passed.
    ///
    /// # Errors
    /// Returns `NoPendingRequest`, `AlreadyVerified` or `RateLimited` depending on the
    /// current challenge.
    pub async fn begin_resend(&self, email: &str) -> Result<IssuedCode, OtpError> {
        let now = Instant::now();
        let mut challenges = self.challenges.lock().await;

        let existing = challenges
            .get(email)
            .ok_or(OtpError::NoPendingRequest)?;
        if existing.verified {
            return Err(OtpError::AlreadyVerified);
        }
        if let Some(retry_after_seconds) = self.cooldown_remaining(existing, now) {
            return Err(OtpError::RateLimited {
                retry_after_seconds,
            });
        }

        Ok(self.replace(&mut challenges, email, now))
    }

    /// Drop a challenge that could not be delivered.
    ///
    /// Only the issuance described by `issued` is removed; a newer challenge for
    /// the same email is left alone. Returns whether anything was removed.
    pub async fn discard(&self, email: &str, issued: &IssuedCode) -> bool {
        let mut challenges = self.challenges.lock().await;
        let same_issuance = challenges.get(email).is_some_and(|challenge| {
            !challenge.verified
                && challenge.issued_at == issued.issued_at
                && challenge.code == issued.code
        });
        if same_issuance {
            challenges.remove(email);
        }
        same_issuance
    }

    pub async fn status(&self, email: &str) -> ChallengeStatus {
        let now = Instant::now();
        let challenges = self.challenges.lock().await;

        let Some(challenge) = challenges.get(email) else {
            return ChallengeStatus::absent();
        };

        let remaining = self.cooldown_remaining(challenge, now);
        ChallengeStatus {
            exists: true,
            can_resend: remaining.is_none(),
            is_expired: now > challenge.expires_at,
            verified: challenge.verified,
            attempts: challenge.attempts,
            remaining_seconds: remaining.unwrap_or(0),
        }
    }

    /// Compare `code` against the pending challenge for `email`.
    ///
    /// Expired challenges and challenges that run out of attempts are deleted.
    ///
    /// # Errors
    /// Returns the `OtpError` describing why the code was not accepted.
    pub async fn verify(&self, email: &str, code: &str) -> Result<(), OtpError> {
        let now = Instant::now();
        let max_attempts = self.config.max_attempts;
        let mut challenges = self.challenges.lock().await;

        let challenge = challenges.get_mut(email).ok_or(OtpError::NotFound)?;
        if challenge.verified {
            return Err(OtpError::AlreadyVerified);
        }

        let failure = if now > challenge.expires_at {
            OtpError::Expired
        } else if challenge.attempts >= max_attempts {
            // Dormant: the wrong code that reaches the ceiling deletes the challenge,
            // so later calls see NotFound. The ceiling still holds if that changes.
            OtpError::AttemptsExceeded
        } else if challenge.code == code {
            challenge.verified = true;
            return Ok(());
        } else {
            challenge.attempts += 1;
            let remaining_attempts = max_attempts - challenge.attempts;
            if remaining_attempts > 0 {
                return Err(OtpError::InvalidCode { remaining_attempts });
            }
            // Last attempt used: the challenge is gone, the caller still learns the code was wrong.
            OtpError::InvalidCode {
                remaining_attempts: 0,
            }
        };

        challenges.remove(email);
        Err(failure)
    }

    pub async fn is_verified(&self, email: &str) -> bool {
        self.challenges
            .lock()
            .await
            .get(email)
            .is_some_and(|challenge| challenge.verified)
    }

    /// Remove a verified challenge once it has been used. Returns whether one was removed.
    pub async fn consume_verified(&self, email: &str) -> bool {
        let mut challenges = self.challenges.lock().await;
        if challenges.get(email).is_some_and(|challenge| challenge.verified) {
            challenges.remove(email);
            true
        } else {
            false
        }
    }

    /// Delete every unverified challenge past its expiry. Returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut challenges = self.challenges.lock().await;
        let before = challenges.len();
        challenges.retain(|_, challenge| challenge.verified || now <= challenge.expires_at);
        before - challenges.len()
    }

    pub async fn len(&self) -> usize {
        self.challenges.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.challenges.lock().await.is_empty()
    }

    fn replace(
        &self,
        challenges: &mut HashMap<String, Challenge>,
        email: &str,
        now: Instant,
    ) -> IssuedCode {
        let code = generate_code();
        challenges.insert(
            email.to_string(),
            Challenge {
                code: code.clone(),
                issued_at: now,
                expires_at: now + self.config.ttl,
                attempts: 0,
                verified: false,
            },
        );
        IssuedCode {
            code,
            issued_at: now,
        }
    }

    fn cooldown_remaining(&self, challenge: &Challenge, now: Instant) -> Option<u64> {
        let elapsed = now.saturating_duration_since(challenge.issued_at);
        if elapsed >= self.config.resend_cooldown {
            None
        } else {
            Some(ceil_seconds(self.config.resend_cooldown - elapsed))
        }
    }
}

fn generate_code() -> String {
    OsRng.gen_range(CODE_MIN..=CODE_MAX).to_string()
}

fn ceil_seconds(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use std::sync::Arc;
    use tokio::time::advance;

    const EMAIL: &str = "a@b.com";
    // Generated codes are never below 100000.
    const WRONG_CODE: &str = "000000";

    fn store() -> OtpStore {
        OtpStore::new(OtpConfig::new())
    }

    async fn issue(store: &OtpStore, email: &str) -> Result<IssuedCode> {
        match store.begin_issue(email).await {
            Ok(IssueOutcome::Issued(issued)) => Ok(issued),
            other => bail!("unexpected issue outcome: {other:?}"),
        }
    }

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..1_000 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().unwrap_or_default();
            assert!((CODE_MIN..=CODE_MAX).contains(&value));
        }
    }

    #[test]
    fn ceil_seconds_rounds_up_partial_seconds() {
        assert_eq!(ceil_seconds(Duration::from_secs(300)), 300);
        assert_eq!(ceil_seconds(Duration::from_millis(299_001)), 300);
        assert_eq!(ceil_seconds(Duration::from_millis(1)), 1);
        assert_eq!(ceil_seconds(Duration::ZERO), 0);
    }

    #[test]
    fn config_normalize_keeps_at_least_one_attempt() {
        let config = OtpConfig::new()
            .with_max_attempts(0)
            .with_ttl_seconds(0)
            .normalize();
        assert_eq!(config.max_attempts(), 1);
        assert_eq!(config.ttl(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn status_for_unknown_email_allows_resend() {
        let status = store().status("nobody@example.com").await;
        assert!(!status.exists);
        assert!(status.can_resend);
        assert_eq!(status.remaining_seconds, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn issue_twice_is_rate_limited_for_full_cooldown() -> Result<()> {
        let store = store();
        issue(&store, EMAIL).await?;

        let second = store.begin_issue(EMAIL).await;
        assert_eq!(
            second,
            Err(OtpError::RateLimited {
                retry_after_seconds: 300
            })
        );

        advance(Duration::from_millis(299_500)).await;
        let third = store.begin_issue(EMAIL).await;
        assert_eq!(
            third,
            Err(OtpError::RateLimited {
                retry_after_seconds: 1
            })
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_challenge_starts_unverified() -> Result<()> {
        let store = store();
        issue(&store, EMAIL).await?;

        let status = store.status(EMAIL).await;
        assert!(status.exists);
        assert!(!status.verified);
        assert!(!status.is_expired);
        assert!(!status.can_resend);
        assert_eq!(status.attempts, 0);
        assert_eq!(status.remaining_seconds, 300);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn correct_code_verifies_once() -> Result<()> {
        let store = store();
        let issued = issue(&store, EMAIL).await?;

        store.verify(EMAIL, &issued.code).await?;
        assert!(store.is_verified(EMAIL).await);
        assert_eq!(
            store.verify(EMAIL, &issued.code).await,
            Err(OtpError::AlreadyVerified)
        );
        assert_eq!(
            store.begin_issue(EMAIL).await,
            Ok(IssueOutcome::AlreadyVerified)
        );
        assert_eq!(
            store.begin_resend(EMAIL).await,
            Err(OtpError::AlreadyVerified)
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_code_counts_attempts_then_deletes() -> Result<()> {
        let store = store();
        issue(&store, EMAIL).await?;

        for remaining_attempts in (0..5).rev() {
            assert_eq!(
                store.verify(EMAIL, WRONG_CODE).await,
                Err(OtpError::InvalidCode { remaining_attempts })
            );
        }
        assert!(!store.status(EMAIL).await.exists);
        assert_eq!(
            store.verify(EMAIL, WRONG_CODE).await,
            Err(OtpError::NotFound)
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_then_right_code() -> Result<()> {
        let store = store();
        let issued = issue(&store, EMAIL).await?;

        assert_eq!(
            store.verify(EMAIL, WRONG_CODE).await,
            Err(OtpError::InvalidCode {
                remaining_attempts: 4
            })
        );
        assert_eq!(store.status(EMAIL).await.attempts, 1);

        store.verify(EMAIL, &issued.code).await?;
        let status = store.status(EMAIL).await;
        assert!(status.verified);
        assert_eq!(status.attempts, 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn expired_challenge_is_removed_on_verify() -> Result<()> {
        let store = store();
        let issued = issue(&store, EMAIL).await?;

        advance(Duration::from_secs(301)).await;
        assert!(store.status(EMAIL).await.is_expired);
        assert_eq!(
            store.verify(EMAIL, &issued.code).await,
            Err(OtpError::Expired)
        );
        assert!(!store.status(EMAIL).await.exists);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn code_is_still_valid_at_exact_expiry() -> Result<()> {
        let store = store();
        let issued = issue(&store, EMAIL).await?;

        advance(Duration::from_secs(300)).await;
        store.verify(EMAIL, &issued.code).await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn resend_requires_existing_challenge_and_cooldown() -> Result<()> {
        let store = store();
        assert_eq!(
            store.begin_resend(EMAIL).await,
            Err(OtpError::NoPendingRequest)
        );

        let first = issue(&store, EMAIL).await?;
        advance(Duration::from_secs(120)).await;
        assert_eq!(
            store.begin_resend(EMAIL).await,
            Err(OtpError::RateLimited {
                retry_after_seconds: 180
            })
        );
        assert_eq!(
            store.verify(EMAIL, WRONG_CODE).await,
            Err(OtpError::InvalidCode {
                remaining_attempts: 4
            })
        );

        advance(Duration::from_secs(180)).await;
        let second = store.begin_resend(EMAIL).await?;
        assert_eq!(store.status(EMAIL).await.attempts, 0);

        if first.code != second.code {
            assert_eq!(
                store.verify(EMAIL, &first.code).await,
                Err(OtpError::InvalidCode {
                    remaining_attempts: 4
                })
            );
        }
        store.verify(EMAIL, &second.code).await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn reissue_after_cooldown_resets_challenge() -> Result<()> {
        let store = store();
        issue(&store, EMAIL).await?;
        let _ = store.verify(EMAIL, WRONG_CODE).await;

        advance(Duration::from_secs(300)).await;
        issue(&store, EMAIL).await?;
        let status = store.status(EMAIL).await;
        assert_eq!(status.attempts, 0);
        assert!(!status.can_resend);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn discard_only_removes_matching_issuance() -> Result<()> {
        let store = store();
        let first = issue(&store, EMAIL).await?;

        advance(Duration::from_secs(300)).await;
        let _second = issue(&store, EMAIL).await?;

        assert!(!store.discard(EMAIL, &first).await);
        assert!(store.status(EMAIL).await.exists);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn discard_removes_undelivered_challenge() -> Result<()> {
        let store = store();
        let issued = issue(&store, EMAIL).await?;

        assert!(store.discard(EMAIL, &issued).await);
        assert!(store.is_empty().await);
        issue(&store, EMAIL).await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn consume_verified_ignores_pending_challenges() -> Result<()> {
        let store = store();
        let issued = issue(&store, EMAIL).await?;

        assert!(!store.consume_verified(EMAIL).await);
        store.verify(EMAIL, &issued.code).await?;
        assert!(store.consume_verified(EMAIL).await);
        assert!(!store.status(EMAIL).await.exists);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_keeps_verified_and_fresh_challenges() -> Result<()> {
        let store = store();
        let verified = issue(&store, "verified@example.com").await?;
        store.verify("verified@example.com", &verified.code).await?;
        issue(&store, "stale@example.com").await?;

        advance(Duration::from_secs(200)).await;
        issue(&store, "fresh@example.com").await?;

        advance(Duration::from_secs(101)).await;
        assert_eq!(store.cleanup_expired().await, 1);
        assert_eq!(store.len().await, 2);
        assert!(!store.status("stale@example.com").await.exists);
        assert!(store.status("fresh@example.com").await.exists);
        assert!(store.is_verified("verified@example.com").await);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_wrong_codes_respect_attempt_ceiling() -> Result<()> {
        let store = Arc::new(store());
        issue(&store, EMAIL).await?;

        let mut handles = Vec::new();
        for _ in 0..12 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(
                async move { store.verify(EMAIL, WRONG_CODE).await },
            ));
        }

        let mut invalid = 0;
        let mut not_found = 0;
        for handle in handles {
            match handle.await? {
                Err(OtpError::InvalidCode { .. }) => invalid += 1,
                Err(OtpError::NotFound) => not_found += 1,
                other => bail!("unexpected verify result: {other:?}"),
            }
        }
        assert_eq!(invalid, 5);
        assert_eq!(not_found, 7);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn emails_are_case_sensitive_keys() -> Result<()> {
        let store = store();
        issue(&store, "A@b.com").await?;
        assert!(!store.status("a@b.com").await.exists);
        Ok(())
    }
}
