//! User model and role.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::fmt;
use std::str::FromStr;

/// Back-office role. Closed set: anything else stored or received is an
/// [`UnknownRole`] error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Accountant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Accountant => "accountant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "accountant" => Ok(Role::Accountant),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn role(&self) -> Result<Role, UnknownRole> {
        self.role.parse()
    }
}

/// User as exposed over the API (no password hash). The role is passed
/// through as stored so clients decide how to treat unknown values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
        }
    }
}

pub async fn find_user_by_email(pool: &SqlitePool, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn find_user(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Insert a user with an already-hashed password and return the stored row.
pub async fn insert_user(
    pool: &SqlitePool,
    email: &str,
    password_hash: &str,
    name: &str,
    role: Role,
) -> sqlx::Result<User> {
    let now = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query(
        "INSERT INTO users (email, password_hash, name, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(email)
    .bind(password_hash)
    .bind(name)
    .bind(role.as_str())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[test]
    fn test_role_parse() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("manager".parse::<Role>(), Ok(Role::Manager));
        assert_eq!("accountant".parse::<Role>(), Ok(Role::Accountant));
        assert_eq!(
            "receptionist".parse::<Role>(),
            Err(UnknownRole("receptionist".to_string()))
        );
        // Case matters, matching what is stored
        assert!("Admin".parse::<Role>().is_err());
    }

    #[tokio::test]
    async fn test_insert_and_find_user() {
        let pool = test_pool().await;
        let user = insert_user(&pool, "frontdesk@hotel.test", "hash", "Front Desk", Role::Manager)
            .await
            .unwrap();

        assert_eq!(user.role(), Ok(Role::Manager));

        let by_email = find_user_by_email(&pool, "frontdesk@hotel.test")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, user.id);

        let by_id = find_user(&pool, user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "frontdesk@hotel.test");

        assert!(find_user_by_email(&pool, "nobody@hotel.test").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let pool = test_pool().await;
        insert_user(&pool, "a@x.com", "hash", "A", Role::Admin).await.unwrap();
        assert!(insert_user(&pool, "a@x.com", "hash", "B", Role::Admin).await.is_err());
    }

    #[test]
    fn test_user_response_omits_hash() {
        let user = User {
            id: 7,
            email: "a@x.com".to_string(),
            password_hash: "secret-hash".to_string(),
            name: "A".to_string(),
            role: "admin".to_string(),
            created_at: String::new(),
            updated_at: String::new(),
        };
        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "admin");
    }
}
