//! Authentication service.
//!
//! Provides password signup and signin, and opaque bearer tokens.
//!
//! Tokens are 32 random bytes, URL-safe base64 encoded. Only the SHA-256
//! digest of a token is stored, so a database leak does not leak usable
//! tokens.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tracing::instrument;

use bazaar_core::Email;

use crate::db::{AccountRepository, RepositoryError, Store, TokenRepository, Transaction};
use crate::models::Account;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Random bytes per bearer token.
const TOKEN_BYTES: usize = 32;

/// An authenticated account with a freshly issued bearer token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub account: Account,
    pub access_token: SecretString,
    pub expires_at: DateTime<Utc>,
}

/// Authentication service.
///
/// Handles account registration, login and bearer-token resolution.
pub struct AuthService<'a, S> {
    store: &'a S,
    token_ttl: chrono::Duration,
}

impl<'a, S: Store> AuthService<'a, S> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(store: &'a S, token_ttl: chrono::Duration) -> Self {
        Self { store, token_ttl }
    }

    /// Register a new account with email and password and issue a token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip(self, email, password))]
    pub async fn register(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let mut tx = self.store.begin().await?;
        let account = tx
            .create_account(&email, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;
        let session = self.issue_token(&mut tx, account).await?;
        tx.commit().await?;

        tracing::info!(account_id = %session.account.id, "Account registered");
        Ok(session)
    }

    /// Login with email and password and issue a token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip(self, email, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        // An unparseable email cannot belong to any account
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let mut tx = self.store.begin().await?;
        let (account, password_hash) = tx
            .account_with_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        let session = self.issue_token(&mut tx, account).await?;
        tx.commit().await?;

        Ok(session)
    }

    /// Resolve a bearer token to its account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is unknown or expired.
    pub async fn authenticate(&self, token: &str) -> Result<Account, AuthError> {
        let digest = token_digest(token);
        let mut tx = self.store.begin().await?;
        let account = tx
            .account_for_token(&digest, Utc::now())
            .await?
            .ok_or(AuthError::InvalidToken)?;
        tx.commit().await?;
        Ok(account)
    }

    async fn issue_token(
        &self,
        tx: &mut S::Tx,
        account: Account,
    ) -> Result<AuthSession, AuthError> {
        let token = generate_token();
        let expires_at = Utc::now() + self.token_ttl;
        tx.insert_token(&token_digest(token.expose_secret()), account.id, expires_at)
            .await?;
        Ok(AuthSession {
            account,
            access_token: token,
            expires_at,
        })
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Generate a new random bearer token.
fn generate_token() -> SecretString {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    SecretString::from(URL_SAFE_NO_PAD.encode(bytes))
}

/// Digest stored in place of a token.
fn token_digest(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}
