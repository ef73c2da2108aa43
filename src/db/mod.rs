mod models;

pub use models::*;

use anyhow::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

pub type DbPool = SqlitePool;

/// Execute a SQL migration file, properly handling comments
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in sql.split(';') {
        // Strip SQL comment lines (lines starting with --)
        let cleaned: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

pub async fn init(data_dir: &Path) -> Result<DbPool> {
    let db_path = data_dir.join("roomdesk.db");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    info!("Initializing database at {}", db_path.display());

    let pool = connect(&db_url, 5).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

/// Open a pool against `url`, apply connection pragmas and run migrations.
pub async fn connect(url: &str, max_connections: u32) -> Result<DbPool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;

    // Enable WAL mode for better concurrency
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: Users and access tokens
    execute_sql(pool, include_str!("../../migrations/001_initial.sql")).await?;

    // Migration 002: Rooms table
    let has_rooms_table: Option<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type='table' AND name='rooms'"
    )
    .fetch_optional(pool)
    .await?;
    if has_rooms_table.is_none() {
        execute_sql(pool, include_str!("../../migrations/002_rooms.sql")).await?;
    }

    info!("Migrations completed");
    Ok(())
}

/// Single-connection in-memory database for tests. One connection keeps every
/// query on the same memory database.
#[cfg(test)]
pub async fn test_pool() -> DbPool {
    connect("sqlite::memory:", 1)
        .await
        .expect("in-memory database")
}
