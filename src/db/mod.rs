//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for all application data.

mod admin;
mod buckets;
mod friends;
mod goals;
pub(crate) mod repository;
mod users;

pub use repository::*;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL DEFAULT 1,
            revision_id INTEGER NOT NULL DEFAULT 0,
            generated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT OR IGNORE INTO meta (id, schema_version, revision_id, generated_at)
        VALUES (1, 1, 0, datetime('now'));
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            display_name TEXT NOT NULL,
            photo_url TEXT,
            created_at TEXT NOT NULL,
            bio TEXT,
            is_admin INTEGER NOT NULL DEFAULT 0,
            version INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Mirrors the custom claims the identity provider attaches to tokens.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS auth_claims (
            user_id TEXT PRIMARY KEY,
            admin INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS buckets (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            members TEXT NOT NULL,
            description TEXT,
            theme TEXT,
            cover_image TEXT,
            version INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    // No ON DELETE CASCADE: goals are removed explicitly before their bucket.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS goals (
            id TEXT PRIMARY KEY,
            bucket_id TEXT NOT NULL REFERENCES buckets(id),
            title TEXT NOT NULL,
            description TEXT,
            completed INTEGER NOT NULL DEFAULT 0,
            completed_at TEXT,
            created_at TEXT NOT NULL,
            created_by TEXT NOT NULL,
            due_date TEXT,
            is_favorite INTEGER NOT NULL DEFAULT 0,
            position INTEGER NOT NULL DEFAULT 0,
            completion_photos TEXT NOT NULL DEFAULT '[]',
            categories TEXT NOT NULL DEFAULT '[]',
            memory_journal TEXT,
            version INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS friend_requests (
            id TEXT PRIMARY KEY,
            from_user_id TEXT NOT NULL,
            to_user_id TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_users_email ON users(lower(email));
        CREATE INDEX IF NOT EXISTS idx_users_created_at ON users(created_at);
        CREATE INDEX IF NOT EXISTS idx_buckets_owner_id ON buckets(owner_id);
        CREATE INDEX IF NOT EXISTS idx_buckets_created_at ON buckets(created_at);
        CREATE INDEX IF NOT EXISTS idx_goals_bucket_id ON goals(bucket_id);
        CREATE INDEX IF NOT EXISTS idx_friend_requests_from ON friend_requests(from_user_id);
        CREATE INDEX IF NOT EXISTS idx_friend_requests_to ON friend_requests(to_user_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_friend_requests_pair
            ON friend_requests(min(from_user_id, to_user_id), max(from_user_id, to_user_id));
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Current time at the precision timestamps are stored with.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Timestamps are stored as RFC 3339 text with microsecond precision.
pub(crate) fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(parsed) => parsed.with_timezone(&Utc),
        Err(err) => {
            tracing::warn!(value, error = %err, "Unparseable timestamp in database");
            DateTime::<Utc>::UNIX_EPOCH
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_lexicographically() {
        let early = Utc.timestamp_opt(1_000, 5_000).unwrap();
        let late = Utc.timestamp_opt(20_000, 0).unwrap();
        let (a, b) = (format_timestamp(&early), format_timestamp(&late));
        assert!(a < b);
        assert_eq!(parse_timestamp(&a), early);
        assert_eq!(parse_timestamp("garbage"), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("venture.sqlite");
        let pool = init_database(&path).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let revision: i64 = sqlx::query_scalar("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(revision, 0);
    }
}
