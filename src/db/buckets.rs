//! Bucket and membership operations.

use super::repository::{
    bucket_from_row, check_expected_version, concurrent_modification, to_json, Repository,
    BUCKET_COLUMNS,
};
use super::{format_timestamp, now};
use crate::errors::AppError;
use crate::live::{merge_visible_buckets, Change, Collection};
use crate::models::{
    initial_members, non_blank, Bucket, BucketMember, CreateBucketRequest, MemberRole,
    UpdateBucketRequest,
};

fn bucket_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Bucket {} not found", id))
}

impl Repository {
    /// Create a bucket owned by `owner_id`.
    pub async fn create_bucket(
        &self,
        owner_id: &str,
        request: &CreateBucketRequest,
    ) -> Result<Bucket, AppError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation(
                "Please enter a bucket name".to_string(),
            ));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = now();
        let bucket = Bucket {
            id,
            name,
            bucket_type: request.bucket_type,
            owner_id: owner_id.to_string(),
            created_at: now,
            members: initial_members(owner_id, &request.member_ids, now),
            description: non_blank(request.description.clone()),
            theme: request.theme.clone(),
            cover_image: None,
            version: 1,
        };
        let theme_json = bucket.theme.as_ref().map(to_json).transpose()?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO buckets (id, name, type, owner_id, created_at, members, description, theme, cover_image, version) VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL, 1)",
        )
        .bind(&bucket.id)
        .bind(&bucket.name)
        .bind(bucket.bucket_type.as_str())
        .bind(&bucket.owner_id)
        .bind(format_timestamp(&now))
        .bind(to_json(&bucket.members)?)
        .bind(&bucket.description)
        .bind(&theme_json)
        .execute(&mut *tx)
        .await?;
        self.commit_change(tx, Collection::Buckets, None).await?;

        tracing::info!(bucket_id = %bucket.id, owner_id, members = bucket.members.len(), "Created bucket");
        Ok(bucket)
    }

    /// Get a bucket by ID.
    pub async fn get_bucket(&self, id: &str) -> Result<Option<Bucket>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM buckets WHERE id = ?", BUCKET_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(bucket_from_row))
    }

    /// Buckets whose owner is `owner_id`, newest first.
    pub async fn list_buckets_owned_by(&self, owner_id: &str) -> Result<Vec<Bucket>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM buckets WHERE owner_id = ? ORDER BY created_at DESC",
            BUCKET_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(bucket_from_row).collect())
    }

    /// Every bucket, newest first.
    pub async fn list_buckets(&self) -> Result<Vec<Bucket>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM buckets ORDER BY created_at DESC",
            BUCKET_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(bucket_from_row).collect())
    }

    /// Buckets `user_id` owns or belongs to. Owned buckets come first.
    pub async fn list_visible_buckets(&self, user_id: &str) -> Result<Vec<Bucket>, AppError> {
        let owned = self.list_buckets_owned_by(user_id).await?;
        let all = self.list_buckets().await?;
        Ok(merge_visible_buckets(user_id, &owned, &all))
    }

    /// Update bucket details with optimistic concurrency control.
    pub async fn update_bucket(
        &self,
        id: &str,
        request: &UpdateBucketRequest,
    ) -> Result<Bucket, AppError> {
        let existing = self
            .get_bucket(id)
            .await?
            .ok_or_else(|| bucket_not_found(id))?;

        check_expected_version(request.expected_version, existing.version)?;

        let name = match &request.name {
            Some(name) if name.trim().is_empty() => {
                return Err(AppError::Validation(
                    "Please enter a bucket name".to_string(),
                ))
            }
            Some(name) => name.trim().to_string(),
            None => existing.name.clone(),
        };
        let description = match &request.description {
            Some(description) => non_blank(description.clone()),
            None => existing.description.clone(),
        };
        let bucket_type = request.bucket_type.unwrap_or(existing.bucket_type);
        let theme = match &request.theme {
            Some(theme) => theme.clone(),
            None => existing.theme.clone(),
        };
        let cover_image = match &request.cover_image {
            Some(cover) => non_blank(cover.clone()),
            None => existing.cover_image.clone(),
        };
        let theme_json = theme.as_ref().map(to_json).transpose()?;
        let new_version = existing.version + 1;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE buckets SET name = ?, description = ?, type = ?, theme = ?, cover_image = ?, version = ? WHERE id = ? AND version = ?",
        )
        .bind(&name)
        .bind(&description)
        .bind(bucket_type.as_str())
        .bind(&theme_json)
        .bind(&cover_image)
        .bind(new_version)
        .bind(id)
        .bind(existing.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(concurrent_modification(existing.version));
        }
        self.commit_change(tx, Collection::Buckets, None).await?;

        Ok(Bucket {
            name,
            description,
            bucket_type,
            theme,
            cover_image,
            version: new_version,
            ..existing
        })
    }

    /// Delete a bucket and all of its goals in one transaction.
    ///
    /// Goals go first, so no committed state has goals without a bucket.
    pub async fn delete_bucket(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let goals = sqlx::query("DELETE FROM goals WHERE bucket_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM buckets WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(bucket_not_found(id));
        }

        let revision = self.commit_change(tx, Collection::Buckets, None).await?;
        self.changes()
            .publish(Change::new(Collection::Goals, revision).with_parent(id));

        tracing::info!(bucket_id = id, goals = goals.rows_affected(), "Deleted bucket");
        Ok(())
    }

    /// Add one member. Existing members are left untouched.
    pub async fn add_bucket_member(&self, id: &str, user_id: &str) -> Result<Bucket, AppError> {
        self.add_bucket_members(id, &[user_id.to_string()]).await
    }

    /// Add members in bulk, skipping ids that are already members.
    pub async fn add_bucket_members(
        &self,
        id: &str,
        user_ids: &[String],
    ) -> Result<Bucket, AppError> {
        self.mutate_members(id, |bucket| {
            let now = now();
            let mut members = bucket.members.clone();
            for user_id in user_ids {
                if bucket.is_owner(user_id) || members.iter().any(|m| &m.user_id == user_id) {
                    continue;
                }
                members.push(BucketMember::new(user_id.clone(), MemberRole::Member, now));
            }
            Ok((members.len() != bucket.members.len()).then_some(members))
        })
        .await
    }

    /// Remove a member. The owner can never be removed.
    pub async fn remove_bucket_member(&self, id: &str, user_id: &str) -> Result<Bucket, AppError> {
        self.mutate_members(id, |bucket| {
            if bucket.is_owner(user_id) {
                return Err(AppError::Validation(
                    "Cannot remove the bucket owner".to_string(),
                ));
            }
            let members: Vec<BucketMember> = bucket
                .members
                .iter()
                .filter(|m| m.user_id != user_id)
                .cloned()
                .collect();
            Ok((members.len() != bucket.members.len()).then_some(members))
        })
        .await
    }

    /// Read-modify-write of the member list. `edit` returns `None` for a no-op.
    async fn mutate_members<F>(&self, id: &str, edit: F) -> Result<Bucket, AppError>
    where
        F: FnOnce(&Bucket) -> Result<Option<Vec<BucketMember>>, AppError>,
    {
        let existing = self
            .get_bucket(id)
            .await?
            .ok_or_else(|| bucket_not_found(id))?;

        let Some(members) = edit(&existing)? else {
            return Ok(existing);
        };
        let new_version = existing.version + 1;

        let mut tx = self.pool.begin().await?;
        let result =
            sqlx::query("UPDATE buckets SET members = ?, version = ? WHERE id = ? AND version = ?")
                .bind(to_json(&members)?)
                .bind(new_version)
                .bind(id)
                .bind(existing.version)
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(concurrent_modification(existing.version));
        }
        self.commit_change(tx, Collection::Buckets, None).await?;

        Ok(Bucket {
            members,
            version: new_version,
            ..existing
        })
    }

    /// Owner or member. Lookup failures count as no access.
    pub async fn has_bucket_access(&self, id: &str, user_id: &str) -> bool {
        match self.get_bucket(id).await {
            Ok(Some(bucket)) => bucket.is_member(user_id),
            Ok(None) => false,
            Err(err) => {
                tracing::warn!(bucket_id = id, error = %err, "Bucket access check failed");
                false
            }
        }
    }

    /// The caller's role, or `None` when not a member or on lookup failure.
    pub async fn get_user_bucket_role(&self, id: &str, user_id: &str) -> Option<MemberRole> {
        match self.get_bucket(id).await {
            Ok(bucket) => bucket.and_then(|b| b.role_of(user_id)),
            Err(err) => {
                tracing::warn!(bucket_id = id, error = %err, "Bucket role lookup failed");
                None
            }
        }
    }
}
