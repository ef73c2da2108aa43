//! Personal access tokens issued at login.
//!
//! Only the SHA-256 hash of a token's secret is stored. The plaintext token
//! (`<id>|<secret>`) is returned once, at issuance.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccessToken {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub token_hash: String,
    /// JSON array of abilities, `["*"]` grants everything
    pub abilities: String,
    pub expires_at: Option<String>,
    pub last_used_at: Option<String>,
    pub created_at: String,
}

impl AccessToken {
    pub fn abilities(&self) -> Vec<String> {
        serde_json::from_str(&self.abilities).unwrap_or_default()
    }

    pub fn can(&self, ability: &str) -> bool {
        self.abilities()
            .iter()
            .any(|granted| granted == "*" || granted == ability)
    }

    /// Tokens without an expiry never expire; an unparseable expiry counts as expired.
    pub fn is_expired_at(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        match &self.expires_at {
            None => false,
            Some(raw) => match chrono::DateTime::parse_from_rfc3339(raw) {
                Ok(expires_at) => expires_at <= now,
                Err(_) => true,
            },
        }
    }
}

pub async fn insert_token(
    pool: &SqlitePool,
    user_id: i64,
    name: &str,
    token_hash: &str,
    abilities: &[&str],
    expires_at: Option<&str>,
) -> sqlx::Result<AccessToken> {
    let abilities = serde_json::to_string(abilities).unwrap_or_else(|_| "[]".to_string());
    let now = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query(
        r#"
        INSERT INTO personal_access_tokens (user_id, name, token_hash, abilities, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(name)
    .bind(token_hash)
    .bind(&abilities)
    .bind(expires_at)
    .bind(&now)
    .execute(pool)
    .await?;

    sqlx::query_as("SELECT * FROM personal_access_tokens WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(pool)
        .await
}

pub async fn find_token(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<AccessToken>> {
    sqlx::query_as("SELECT * FROM personal_access_tokens WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn touch_token(pool: &SqlitePool, id: i64) -> sqlx::Result<()> {
    sqlx::query("UPDATE personal_access_tokens SET last_used_at = ? WHERE id = ?")
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete one token, returning whether a row was removed.
pub async fn delete_token(pool: &SqlitePool, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM personal_access_tokens WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Tokens whose expiry is at or before `now`.
pub async fn delete_expired_tokens(
    pool: &SqlitePool,
    now: chrono::DateTime<chrono::Utc>,
) -> sqlx::Result<u64> {
    let tokens: Vec<AccessToken> =
        sqlx::query_as("SELECT * FROM personal_access_tokens WHERE expires_at IS NOT NULL")
            .fetch_all(pool)
            .await?;

    let mut removed = 0;
    for token in tokens.iter().filter(|t| t.is_expired_at(now)) {
        if delete_token(pool, token.id).await? {
            removed += 1;
        }
    }
    Ok(removed)
}

pub async fn count_tokens_for_user(pool: &SqlitePool, user_id: i64) -> sqlx::Result<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM personal_access_tokens WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}
