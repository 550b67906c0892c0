//! Database repository for CRUD operations.
//!
//! Uses prepared statements and transactions for data integrity. Every
//! committed write bumps the revision and publishes a [`Change`] on the
//! repository's change feed.
//!
//! Operations are grouped per collection in sibling modules.

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};

use super::{format_timestamp, parse_timestamp};
use crate::errors::AppError;
use crate::live::{Change, ChangeFeed, Collection};
use crate::models::{
    Bucket, BucketTheme, BucketType, FriendRequest, FriendStatus, Goal, User,
};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pub(crate) pool: SqlitePool,
    changes: ChangeFeed,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            changes: ChangeFeed::default(),
        }
    }

    /// Feed of committed writes, used by live queries.
    pub fn changes(&self) -> &ChangeFeed {
        &self.changes
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Bump the revision inside `tx`, commit, then announce the change.
    pub(crate) async fn commit_change(
        &self,
        mut tx: Transaction<'_, Sqlite>,
        collection: Collection,
        parent: Option<&str>,
    ) -> Result<i64, AppError> {
        let revision = bump_revision(&mut tx).await?;
        tx.commit().await?;

        let change = Change::new(collection, revision);
        self.changes.publish(match parent {
            Some(parent) => change.with_parent(parent),
            None => change,
        });
        Ok(revision)
    }
}

async fn bump_revision(conn: &mut SqliteConnection) -> Result<i64, AppError> {
    let now = format_timestamp(&Utc::now());
    let revision: i64 = sqlx::query_scalar(
        "UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1 RETURNING revision_id",
    )
    .bind(&now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(revision)
}

/// Stale `expectedVersion` supplied by the caller.
pub(crate) fn version_mismatch(expected: i64, current: i64) -> AppError {
    AppError::Conflict {
        message: format!("Version mismatch: expected {}, current {}", expected, current),
        current_version: Some(current),
    }
}

/// The row changed between read and conditional write.
pub(crate) fn concurrent_modification(current: i64) -> AppError {
    AppError::Conflict {
        message: "Concurrent modification detected".to_string(),
        current_version: Some(current),
    }
}

pub(crate) fn check_expected_version(expected: Option<i64>, current: i64) -> Result<(), AppError> {
    match expected {
        Some(expected) if expected != current => Err(version_mismatch(expected, current)),
        _ => Ok(()),
    }
}

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, AppError> {
    serde_json::to_string(value)
        .map_err(|e| AppError::Internal(format!("Failed to encode column: {}", e)))
}

fn parse_json_array<T: DeserializeOwned>(s: &str) -> Vec<T> {
    serde_json::from_str(s).unwrap_or_default()
}

// Helper functions for row conversion

pub(crate) const USER_COLUMNS: &str =
    "id, email, display_name, photo_url, created_at, bio, is_admin, version";

pub(crate) fn user_from_row(row: &SqliteRow) -> User {
    let is_admin: i32 = row.get("is_admin");
    let created_at: String = row.get("created_at");
    User {
        id: row.get("id"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        photo_url: row.get("photo_url"),
        created_at: parse_timestamp(&created_at),
        bio: row.get("bio"),
        is_admin: is_admin != 0,
        version: row.get("version"),
    }
}

pub(crate) const BUCKET_COLUMNS: &str =
    "id, name, type, owner_id, created_at, members, description, theme, cover_image, version";

pub(crate) fn bucket_from_row(row: &SqliteRow) -> Bucket {
    let bucket_type: String = row.get("type");
    let created_at: String = row.get("created_at");
    let members: String = row.get("members");
    let theme: Option<String> = row.get("theme");
    Bucket {
        id: row.get("id"),
        name: row.get("name"),
        bucket_type: BucketType::from_str(&bucket_type).unwrap_or(BucketType::Solo),
        owner_id: row.get("owner_id"),
        created_at: parse_timestamp(&created_at),
        members: parse_json_array(&members),
        description: row.get("description"),
        theme: theme.and_then(|t| serde_json::from_str::<BucketTheme>(&t).ok()),
        cover_image: row.get("cover_image"),
        version: row.get("version"),
    }
}

pub(crate) const GOAL_COLUMNS: &str = "id, bucket_id, title, description, completed, completed_at, created_at, created_by, due_date, is_favorite, position, completion_photos, categories, memory_journal, version";

pub(crate) fn goal_from_row(row: &SqliteRow) -> Goal {
    let completed: i32 = row.get("completed");
    let is_favorite: i32 = row.get("is_favorite");
    let completed_at: Option<String> = row.get("completed_at");
    let created_at: String = row.get("created_at");
    let due_date: Option<String> = row.get("due_date");
    let photos: String = row.get("completion_photos");
    let categories: String = row.get("categories");
    Goal {
        id: row.get("id"),
        bucket_id: row.get("bucket_id"),
        title: row.get("title"),
        description: row.get("description"),
        completed: completed != 0,
        completed_at: completed_at.as_deref().map(parse_timestamp),
        created_at: parse_timestamp(&created_at),
        created_by: row.get("created_by"),
        due_date: due_date.as_deref().map(parse_timestamp),
        is_favorite: is_favorite != 0,
        order: row.get("position"),
        completion_photos: parse_json_array(&photos),
        categories: parse_json_array(&categories),
        memory_journal: row.get("memory_journal"),
        version: row.get("version"),
    }
}

pub(crate) const FRIEND_REQUEST_COLUMNS: &str = "id, from_user_id, to_user_id, status, created_at";

pub(crate) fn friend_request_from_row(row: &SqliteRow) -> FriendRequest {
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    FriendRequest {
        id: row.get("id"),
        from_user_id: row.get("from_user_id"),
        to_user_id: row.get("to_user_id"),
        status: FriendStatus::from_str(&status).unwrap_or(FriendStatus::Pending),
        created_at: parse_timestamp(&created_at),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::repository;
    use super::*;

    #[tokio::test]
    async fn commit_change_bumps_revision_and_publishes() {
        let (repo, _dir) = repository().await;
        let mut changes = repo.changes().subscribe();

        let tx = repo.pool.begin().await.unwrap();
        let revision = repo
            .commit_change(tx, Collection::Goals, Some("b1"))
            .await
            .unwrap();

        assert_eq!(revision, 1);
        assert_eq!(repo.get_revision_id().await.unwrap(), 1);
        let change = changes.recv().await.unwrap();
        assert!(change.touches_goals_of("b1"));
        assert_eq!(change.revision, 1);
    }

    #[test]
    fn expected_version_check() {
        assert!(check_expected_version(None, 3).is_ok());
        assert!(check_expected_version(Some(3), 3).is_ok());
        let err = check_expected_version(Some(2), 3).unwrap_err();
        assert!(matches!(
            err,
            AppError::Conflict {
                current_version: Some(3),
                ..
            }
        ));
    }
}
