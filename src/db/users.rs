//! User profile and auth claim operations.

use sqlx::Row;

use super::{format_timestamp, now};
use super::repository::{
    check_expected_version, concurrent_modification, user_from_row, Repository, USER_COLUMNS,
};
use crate::errors::AppError;
use crate::live::Collection;
use crate::models::{non_blank, AuthIdentity, UpdateUserRequest, User};

impl Repository {
    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Profiles for `ids`, in the given order. Unknown ids are skipped.
    pub async fn get_users(&self, ids: &[String]) -> Result<Vec<User>, AppError> {
        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(user) = self.get_user(id).await? {
                users.push(user);
            }
        }
        Ok(users)
    }

    /// List all users, newest first.
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users ORDER BY created_at DESC",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    /// Case-insensitive e-mail lookup.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let wanted = email.trim().to_lowercase();
        if wanted.is_empty() {
            return Ok(None);
        }
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE lower(email) = ? ORDER BY created_at LIMIT 1",
            USER_COLUMNS
        ))
        .bind(&wanted)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Case-insensitive substring match on e-mail or display name, excluding
    /// `exclude_user_id`. A blank term matches nothing.
    pub async fn search_users(
        &self,
        term: &str,
        exclude_user_id: &str,
    ) -> Result<Vec<User>, AppError> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .list_users()
            .await?
            .into_iter()
            .filter(|user| user.id != exclude_user_id)
            .filter(|user| {
                user.email.to_lowercase().contains(&needle)
                    || user.display_name.to_lowercase().contains(&needle)
            })
            .collect())
    }

    /// Create the profile for a freshly authenticated identity, or refresh the
    /// identity-provided fields of an existing one.
    ///
    /// `created_at`, `bio` and the admin flag of an existing profile are kept,
    /// as is its photo when the identity carries none.
    pub async fn upsert_user_profile(&self, identity: &AuthIdentity) -> Result<User, AppError> {
        let email = identity.email_or_empty();
        let display_name = identity.resolved_display_name();

        match self.get_user(&identity.uid).await? {
            Some(existing) => {
                let photo_url = identity.photo_url.clone().or(existing.photo_url.clone());
                let new_version = existing.version + 1;

                let mut tx = self.pool.begin().await?;
                let result = sqlx::query(
                    "UPDATE users SET email = ?, display_name = ?, photo_url = ?, version = ? WHERE id = ? AND version = ?",
                )
                .bind(&email)
                .bind(&display_name)
                .bind(&photo_url)
                .bind(new_version)
                .bind(&existing.id)
                .bind(existing.version)
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(concurrent_modification(existing.version));
                }
                self.commit_change(tx, Collection::Users, None).await?;

                Ok(User {
                    email,
                    display_name,
                    photo_url,
                    version: new_version,
                    ..existing
                })
            }
            None => {
                let now = now();
                let mut tx = self.pool.begin().await?;
                sqlx::query(
                    "INSERT INTO users (id, email, display_name, photo_url, created_at, bio, is_admin, version) VALUES (?, ?, ?, ?, ?, NULL, 0, 1)",
                )
                .bind(&identity.uid)
                .bind(&email)
                .bind(&display_name)
                .bind(&identity.photo_url)
                .bind(format_timestamp(&now))
                .execute(&mut *tx)
                .await?;
                self.commit_change(tx, Collection::Users, None).await?;

                tracing::info!(user_id = %identity.uid, "Created user profile");

                Ok(User {
                    id: identity.uid.clone(),
                    email,
                    display_name,
                    photo_url: identity.photo_url.clone(),
                    created_at: now,
                    bio: None,
                    is_admin: false,
                    version: 1,
                })
            }
        }
    }

    /// Update a profile with optimistic concurrency control.
    pub async fn update_user_profile(
        &self,
        id: &str,
        request: &UpdateUserRequest,
    ) -> Result<User, AppError> {
        let existing = self
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        check_expected_version(request.expected_version, existing.version)?;

        let display_name = match &request.display_name {
            Some(name) if name.trim().is_empty() => {
                return Err(AppError::Validation(
                    "Display name cannot be empty".to_string(),
                ))
            }
            Some(name) => name.trim().to_string(),
            None => existing.display_name.clone(),
        };
        let photo_url = match &request.photo_url {
            Some(photo) => non_blank(photo.clone()),
            None => existing.photo_url.clone(),
        };
        let bio = match &request.bio {
            Some(bio) => non_blank(bio.clone()),
            None => existing.bio.clone(),
        };
        let new_version = existing.version + 1;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE users SET display_name = ?, photo_url = ?, bio = ?, version = ? WHERE id = ? AND version = ?",
        )
        .bind(&display_name)
        .bind(&photo_url)
        .bind(&bio)
        .bind(new_version)
        .bind(id)
        .bind(existing.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(concurrent_modification(existing.version));
        }
        self.commit_change(tx, Collection::Users, None).await?;

        Ok(User {
            display_name,
            photo_url,
            bio,
            version: new_version,
            ..existing
        })
    }

    /// Set the `isAdmin` flag on the user document.
    pub async fn set_user_admin_flag(&self, id: &str, is_admin: bool) -> Result<User, AppError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("UPDATE users SET is_admin = ?, version = version + 1 WHERE id = ?")
            .bind(is_admin as i32)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }
        self.commit_change(tx, Collection::Users, None).await?;

        self.get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    /// The `admin` token claim, if one was ever set.
    pub async fn get_admin_claim(&self, user_id: &str) -> Result<Option<bool>, AppError> {
        let row = sqlx::query("SELECT admin FROM auth_claims WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get::<i32, _>("admin") != 0))
    }

    /// Set the `admin` token claim.
    pub async fn set_admin_claim(&self, user_id: &str, admin: bool) -> Result<(), AppError> {
        let now = format_timestamp(&now());
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO auth_claims (user_id, admin, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET admin = excluded.admin, updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(admin as i32)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        self.commit_change(tx, Collection::AuthClaims, None).await?;
        Ok(())
    }
}
