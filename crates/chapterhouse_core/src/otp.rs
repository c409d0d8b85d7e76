//! crates/chapterhouse_core/src/otp.rs
//!
//! Passwordless sign-in. A session moves from anonymous to pending when a code
//! is requested for an email, and from pending to authenticated when the
//! matching code is presented within its validity window.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{Account, OtpCredential, SessionContext};
use crate::error::{CoreError, CoreResult};
use crate::ports::{Clock, CodeDeliveryService, DatabaseService, PortError};
use crate::validation::{default_name_for, is_valid_email, normalize_email};

/// Minutes a passcode stays valid after issuance. Absolute, not sliding.
pub const OTP_TTL_MINUTES: i64 = 15;

/// A uniformly random six digit code.
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// A fresh code guaranteed to differ from `previous`.
fn generate_code_unlike(previous: Option<&str>) -> String {
    loop {
        let code = generate_code();
        if Some(code.as_str()) != previous {
            return code;
        }
    }
}

impl OtpCredential {
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.issued_at >= ttl
    }

    /// Expiry wins over a mismatch: a stale code reports `ExpiredCode`
    /// whether or not it matches.
    pub fn verify(&self, code: &str, now: DateTime<Utc>, ttl: Duration) -> CoreResult<()> {
        if self.is_expired(now, ttl) {
            return Err(CoreError::ExpiredCode);
        }
        if self.code != code {
            return Err(CoreError::InvalidCode);
        }
        Ok(())
    }
}

//=========================================================================================
// The Authenticator
//=========================================================================================

#[derive(Clone)]
pub struct OtpAuthenticator {
    db: Arc<dyn DatabaseService>,
    delivery: Arc<dyn CodeDeliveryService>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl OtpAuthenticator {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        delivery: Arc<dyn CodeDeliveryService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            delivery,
            clock,
            ttl: Duration::minutes(OTP_TTL_MINUTES),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Starts a sign-in for `email`, creating the account on first use.
    pub async fn request_code(
        &self,
        session: &mut SessionContext,
        email: &str,
    ) -> CoreResult<Account> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(CoreError::EmptyEmail);
        }
        if !is_valid_email(&email) {
            return Err(CoreError::InvalidEmailFormat);
        }

        let account = match self.db.find_account_by_email(&email).await? {
            Some(account) => account,
            None => self.create_account(&email).await?,
        };

        self.issue(&account).await?;
        session.pending_account_id = Some(account.id);
        Ok(account)
    }

    /// Checks `code` against the pending account's outstanding passcode and,
    /// on success, signs the session in. The code cannot be used again.
    pub async fn validate(&self, session: &mut SessionContext, code: &str) -> CoreResult<Account> {
        let account = self.pending_account(session).await?;
        let now = self.clock.now();

        let credential = account.otp.as_ref().ok_or(CoreError::InvalidCode)?;
        credential.verify(code, now, self.ttl)?;

        // A concurrent validate or a reissue got there first.
        if !self
            .db
            .clear_otp(account.id, &credential.code, credential.issued_at)
            .await?
        {
            return Err(CoreError::InvalidCode);
        }
        session.authenticated_account_id = Some(account.id);
        session.pending_account_id = None;
        info!("Account {} signed in", account.id);
        Ok(account)
    }

    /// Replaces the pending account's passcode with a new one.
    pub async fn resend_code(&self, session: &mut SessionContext) -> CoreResult<Account> {
        let account = self.pending_account(session).await?;
        self.issue(&account).await?;
        Ok(account)
    }

    pub fn sign_out(&self, session: &mut SessionContext) {
        if let Some(account_id) = session.authenticated_account_id.take() {
            info!("Account {} signed out", account_id);
        }
    }

    async fn create_account(&self, email: &str) -> CoreResult<Account> {
        match self.db.create_account(email, &default_name_for(email)).await {
            Ok(account) => {
                info!("Created account {} on first sign-in", account.id);
                Ok(account)
            }
            // A concurrent first sign-in for the same address won the insert.
            Err(PortError::Conflict(_)) => self
                .db
                .find_account_by_email(email)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("Account {}", email))),
            Err(e) => Err(e.into()),
        }
    }

    async fn pending_account(&self, session: &mut SessionContext) -> CoreResult<Account> {
        let account_id = session
            .pending_account_id
            .ok_or(CoreError::SessionExpired)?;
        match self.db.get_account(account_id).await {
            Ok(account) => Ok(account),
            Err(PortError::NotFound(_)) => {
                session.pending_account_id = None;
                Err(CoreError::SessionExpired)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn issue(&self, account: &Account) -> CoreResult<()> {
        let previous = account.otp.as_ref().map(|otp| otp.code.as_str());
        let code = generate_code_unlike(previous);
        let issued_at = self.clock.now();
        self.db.store_otp(account.id, &code, issued_at).await?;

        if let Err(e) = self.delivery.deliver(&account.email, &code).await {
            warn!("Passcode delivery for account {} failed: {}", account.id, e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(code: &str, issued_at: DateTime<Utc>) -> OtpCredential {
        OtpCredential {
            code: code.to_string(),
            issued_at,
        }
    }

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn regenerated_code_never_repeats_previous() {
        for _ in 0..200 {
            let previous = generate_code();
            assert_ne!(generate_code_unlike(Some(&previous)), previous);
        }
    }

    #[test]
    fn correct_code_just_inside_window_is_accepted() {
        let issued = Utc::now();
        let ttl = Duration::minutes(OTP_TTL_MINUTES);
        let now = issued + ttl - Duration::seconds(1);
        assert!(credential("123456", issued).verify("123456", now, ttl).is_ok());
    }

    #[test]
    fn correct_code_at_window_edge_is_expired() {
        let issued = Utc::now();
        let ttl = Duration::minutes(OTP_TTL_MINUTES);
        let result = credential("123456", issued).verify("123456", issued + ttl, ttl);
        assert!(matches!(result, Err(CoreError::ExpiredCode)));
    }

    #[test]
    fn expiry_is_reported_before_mismatch() {
        let issued = Utc::now();
        let ttl = Duration::minutes(OTP_TTL_MINUTES);
        let result =
            credential("123456", issued).verify("000000", issued + Duration::hours(2), ttl);
        assert!(matches!(result, Err(CoreError::ExpiredCode)));
    }

    #[test]
    fn wrong_code_inside_window_is_invalid() {
        let issued = Utc::now();
        let ttl = Duration::minutes(OTP_TTL_MINUTES);
        let result = credential("123456", issued).verify("654321", issued, ttl);
        assert!(matches!(result, Err(CoreError::InvalidCode)));
    }

    #[test]
    fn comparison_is_exact() {
        let issued = Utc::now();
        let ttl = Duration::minutes(OTP_TTL_MINUTES);
        let result = credential("123456", issued).verify(" 123456", issued, ttl);
        assert!(matches!(result, Err(CoreError::InvalidCode)));
    }
}
