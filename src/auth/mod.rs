//! Credential verification and bearer token lifecycle.
//!
//! Tokens are handed out as `<id>|<secret>`. The id locates the stored row and
//! the secret is checked against its SHA-256 hash in constant time.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Months, Utc};
use rand::{distr::Alphanumeric, Rng};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::time::Duration;
use subtle::ConstantTimeEq;

use crate::api::validation::{validate_email, validate_password};
use crate::db::{self, AccessToken, Role, User};

/// Length of the random part of a plaintext token
const SECRET_LEN: usize = 40;

/// Abilities granted to tokens issued by a password login
pub const ALL_ABILITIES: &[&str] = &["*"];

lazy_static::lazy_static! {
    /// Verified against when the email is unknown, so a miss costs the same
    /// argon2 work as a wrong password.
    static ref DUMMY_HASH: String = hash_password("roomdesk-dummy-password").unwrap_or_default();
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("Unauthenticated.")]
    Unauthenticated,
    #[error("{field}: {message}")]
    InvalidInput {
        field: &'static str,
        message: String,
    },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Internal(String),
}

/// A freshly issued token. `plain_text` is never stored and cannot be recovered later.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub plain_text: String,
    pub token: AccessToken,
}

/// The user and token a request authenticated with.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user: User,
    pub token: AccessToken,
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

fn generate_secret() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_LEN)
        .map(char::from)
        .collect()
}

/// Hash a token secret for storage
fn hash_token(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Split `<id>|<secret>` into its parts.
fn parse_token(plain_text: &str) -> Option<(i64, &str)> {
    let (id, secret) = plain_text.split_once('|')?;
    let id = id.parse().ok()?;
    if secret.is_empty() {
        return None;
    }
    Some((id, secret))
}

/// Look up a user by email and check the password. Unknown email and wrong
/// password both yield `None`.
pub async fn attempt(
    pool: &SqlitePool,
    email: &str,
    password: &str,
) -> Result<Option<User>, AuthError> {
    let Some(user) = db::find_user_by_email(pool, email).await? else {
        verify_password(password, &DUMMY_HASH);
        return Ok(None);
    };

    if verify_password(password, &user.password_hash) {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

/// Create a token row for `user` and return its one-time plaintext form.
pub async fn issue_token(
    pool: &SqlitePool,
    user: &User,
    abilities: &[&str],
    expires_at: Option<DateTime<Utc>>,
) -> Result<IssuedToken, AuthError> {
    let secret = generate_secret();
    let name = format!("API token for {}", user.email);
    let expires_at = expires_at.map(|t| t.to_rfc3339());

    let token = db::insert_token(
        pool,
        user.id,
        &name,
        &hash_token(&secret),
        abilities,
        expires_at.as_deref(),
    )
    .await?;

    Ok(IssuedToken {
        plain_text: format!("{}|{}", token.id, secret),
        token,
    })
}

/// Verify credentials and issue an all-abilities token valid for `lifetime_months`.
pub async fn login(
    pool: &SqlitePool,
    email: &str,
    password: &str,
    lifetime_months: u32,
) -> Result<IssuedToken, AuthError> {
    let user = attempt(pool, email, password)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let expires_at = Utc::now()
        .checked_add_months(Months::new(lifetime_months))
        .ok_or_else(|| AuthError::Internal("Token expiry out of range".to_string()))?;

    let issued = issue_token(pool, &user, ALL_ABILITIES, Some(expires_at)).await?;
    tracing::info!(user_id = user.id, token_id = issued.token.id, "User logged in");
    Ok(issued)
}

/// Resolve a presented bearer token to its user. Any failure is `Unauthenticated`.
pub async fn resolve(pool: &SqlitePool, plain_text: &str) -> Result<Authenticated, AuthError> {
    let (id, secret) = parse_token(plain_text).ok_or(AuthError::Unauthenticated)?;

    let token = db::find_token(pool, id)
        .await?
        .ok_or(AuthError::Unauthenticated)?;

    let presented = hash_token(secret);
    if !bool::from(presented.as_bytes().ct_eq(token.token_hash.as_bytes())) {
        return Err(AuthError::Unauthenticated);
    }

    if token.is_expired_at(Utc::now()) {
        return Err(AuthError::Unauthenticated);
    }

    let user = db::find_user(pool, token.user_id)
        .await?
        .ok_or(AuthError::Unauthenticated)?;

    db::touch_token(pool, token.id).await?;

    Ok(Authenticated { user, token })
}

/// Revoke the token that authenticated the current request.
pub async fn logout(pool: &SqlitePool, current: &AccessToken) -> Result<(), AuthError> {
    db::delete_token(pool, current.id).await?;
    tracing::info!(user_id = current.user_id, token_id = current.id, "User logged out");
    Ok(())
}

pub async fn prune_expired(pool: &SqlitePool) -> Result<u64, AuthError> {
    Ok(db::delete_expired_tokens(pool, Utc::now()).await?)
}

/// Spawn a background task that periodically removes expired tokens
pub fn spawn_prune_task(pool: SqlitePool, interval_secs: u64) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(interval_secs.max(1));
        loop {
            tokio::time::sleep(interval).await;
            match prune_expired(&pool).await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "Pruned expired access tokens"),
                Err(e) => tracing::warn!(error = %e, "Failed to prune expired access tokens"),
            }
        }
    });
}

/// Create a user with a freshly hashed password. Email and password pass the
/// same checks as a login request, so every stored account can log in.
pub async fn create_user(
    pool: &SqlitePool,
    email: &str,
    password: &str,
    name: &str,
    role: Role,
) -> Result<User, AuthError> {
    validate_email(email).map_err(|message| AuthError::InvalidInput {
        field: "email",
        message,
    })?;
    validate_password(password).map_err(|message| AuthError::InvalidInput {
        field: "password",
        message,
    })?;

    let password_hash = hash_password(password)
        .map_err(|e| AuthError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(db::insert_user(pool, email, &password_hash, name, role).await?)
}

/// Ensure the bootstrap admin exists. An existing account is left untouched.
pub async fn ensure_admin_user(
    pool: &SqlitePool,
    email: &str,
    password: &str,
) -> Result<(), AuthError> {
    if db::find_user_by_email(pool, email).await?.is_some() {
        return Ok(());
    }

    create_user(pool, email, password, "Administrator", Role::Admin).await?;
    tracing::info!("Created bootstrap admin user: {}", email);
    Ok(())
}
