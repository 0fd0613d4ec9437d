use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use super::password::{self, PasswordIssues};
use crate::storage::{StoreError, UserRecord, UserStore};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("username must not be empty")]
    InvalidUsername,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("weak password: {0}")]
    WeakPassword(PasswordIssues),
    #[error("username already exists")]
    DuplicateUsername,
    #[error("email already registered")]
    DuplicateEmail,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("credential store unavailable: {0:#}")]
    StoreUnavailable(anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateUsername => AuthError::DuplicateUsername,
            StoreError::DuplicateEmail => AuthError::DuplicateEmail,
            StoreError::Unavailable(cause) => AuthError::StoreUnavailable(cause),
        }
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

lazy_static! {
    // Verified against when the username is unknown so both failure paths
    // cost one Argon2 run.
    static ref DUMMY_HASH: String = password::hash_password("Dummy-passw0rd").unwrap_or_default();
}

/// Register/verify over whichever backend was configured.
#[derive(Clone)]
pub struct CredentialService {
    store: Arc<dyn UserStore>,
}

impl CredentialService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        lazy_static::initialize(&DUMMY_HASH);
        Self { store }
    }

    #[cfg(test)]
    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    #[instrument(skip(self, password))]
    pub async fn register(&self, username: &str, password: &str, email: &str) -> Result<(), AuthError> {
        if username.trim().is_empty() {
            warn!("empty username");
            return Err(AuthError::InvalidUsername);
        }
        if !is_valid_email(email) {
            warn!("invalid email");
            return Err(AuthError::InvalidEmail);
        }
        password::check_strength(password).map_err(|issues| {
            warn!(%issues, "weak password");
            AuthError::WeakPassword(issues)
        })?;

        if self.store.find_by_username(username).await?.is_some() {
            warn!("username already exists");
            return Err(AuthError::DuplicateUsername);
        }
        if self.store.find_by_email(email).await?.is_some() {
            warn!("email already registered");
            return Err(AuthError::DuplicateEmail);
        }

        let password_hash = password::hash_password(password).map_err(|e| {
            error!(error = %e, "hash_password failed");
            AuthError::StoreUnavailable(e)
        })?;

        // The backend re-checks uniqueness; a concurrent registration that
        // slipped past the reads above surfaces here as a duplicate.
        self.store
            .insert(UserRecord {
                username: username.to_string(),
                password_hash,
                email: email.to_string(),
                created_at: OffsetDateTime::now_utc(),
            })
            .await?;

        info!("user registered");
        Ok(())
    }

    #[instrument(skip(self, password))]
    pub async fn verify(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let Some(user) = self.store.find_by_username(username).await? else {
            let _ = password::verify_password(password, &DUMMY_HASH);
            warn!("login unknown username");
            return Err(AuthError::InvalidCredentials);
        };

        let ok = password::verify_password(password, &user.password_hash).map_err(|e| {
            error!(error = %e, "stored password digest is malformed");
            AuthError::StoreUnavailable(e.context("malformed password digest in store"))
        })?;
        if !ok {
            warn!("login invalid password");
            return Err(AuthError::InvalidCredentials);
        }
        if password::is_legacy_digest(&user.password_hash) {
            // Records are never rewritten; the old digest stays as stored.
            info!("login verified against legacy digest");
        }

        info!("user logged in");
        Ok(())
    }
}
