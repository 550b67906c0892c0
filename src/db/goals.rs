//! Goal operations. Goals always live under a bucket.

use super::repository::{
    check_expected_version, concurrent_modification, goal_from_row, to_json, Repository,
    GOAL_COLUMNS,
};
use super::{format_timestamp, now};
use crate::errors::AppError;
use crate::live::Collection;
use crate::models::{CompleteGoalRequest, CompletionMemoryPolicy, Goal, GoalChanges, NewGoal};

fn goal_not_found(goal_id: &str) -> AppError {
    AppError::NotFound(format!("Goal {} not found", goal_id))
}

impl Repository {
    /// Append a goal to a bucket. Its `order` is the bucket's current goal count.
    pub async fn create_goal(&self, bucket_id: &str, new_goal: &NewGoal) -> Result<Goal, AppError> {
        if self.get_bucket(bucket_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Bucket {} not found", bucket_id)));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let created_at = format_timestamp(&now());
        let completed_at = new_goal
            .completed_at
            .filter(|_| new_goal.completed)
            .map(|at| format_timestamp(&at));

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"INSERT INTO goals (id, bucket_id, title, description, completed, completed_at, created_at, created_by, due_date, is_favorite, position, completion_photos, categories, memory_journal, version)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, (SELECT COUNT(*) FROM goals WHERE bucket_id = ?), '[]', ?, NULL, 1)"#,
        )
        .bind(&id)
        .bind(bucket_id)
        .bind(&new_goal.title)
        .bind(&new_goal.description)
        .bind(new_goal.completed as i32)
        .bind(&completed_at)
        .bind(&created_at)
        .bind(&new_goal.created_by)
        .bind(new_goal.due_date.as_ref().map(format_timestamp))
        .bind(bucket_id)
        .bind(to_json(&new_goal.categories)?)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(&format!("SELECT {} FROM goals WHERE id = ?", GOAL_COLUMNS))
            .bind(&id)
            .fetch_one(&mut *tx)
            .await?;
        let goal = goal_from_row(&row);

        self.commit_change(tx, Collection::Goals, Some(bucket_id))
            .await?;

        tracing::debug!(bucket_id, goal_id = %goal.id, order = goal.order, "Created goal");
        Ok(goal)
    }

    /// Goals of a bucket in display order (`order`, then creation time).
    pub async fn list_goals(&self, bucket_id: &str) -> Result<Vec<Goal>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM goals WHERE bucket_id = ? ORDER BY position ASC, created_at ASC",
            GOAL_COLUMNS
        ))
        .bind(bucket_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(goal_from_row).collect())
    }

    /// Goals of a bucket, newest first.
    pub async fn list_goals_newest_first(&self, bucket_id: &str) -> Result<Vec<Goal>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM goals WHERE bucket_id = ? ORDER BY created_at DESC",
            GOAL_COLUMNS
        ))
        .bind(bucket_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(goal_from_row).collect())
    }

    /// Get a goal by bucket and goal ID.
    pub async fn get_goal(&self, bucket_id: &str, goal_id: &str) -> Result<Option<Goal>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM goals WHERE bucket_id = ? AND id = ?",
            GOAL_COLUMNS
        ))
        .bind(bucket_id)
        .bind(goal_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(goal_from_row))
    }

    /// Apply a partial update with optimistic concurrency control.
    pub async fn update_goal(
        &self,
        bucket_id: &str,
        goal_id: &str,
        changes: &GoalChanges,
        policy: CompletionMemoryPolicy,
        expected_version: Option<i64>,
    ) -> Result<Goal, AppError> {
        self.update_goal_with(bucket_id, goal_id, policy, expected_version, |_| {
            Ok(changes.clone())
        })
        .await
    }

    /// Mark complete or incomplete. Un-completing drops completion memory.
    pub async fn toggle_goal_completion(
        &self,
        bucket_id: &str,
        goal_id: &str,
        completed: bool,
    ) -> Result<Goal, AppError> {
        let policy = if completed {
            CompletionMemoryPolicy::Preserve
        } else {
            CompletionMemoryPolicy::ClearWhenIncomplete
        };
        self.update_goal(
            bucket_id,
            goal_id,
            &GoalChanges::toggle_completion(completed),
            policy,
            None,
        )
        .await
    }

    pub async fn toggle_goal_favorite(
        &self,
        bucket_id: &str,
        goal_id: &str,
        is_favorite: bool,
    ) -> Result<Goal, AppError> {
        self.update_goal(
            bucket_id,
            goal_id,
            &GoalChanges::favorite(is_favorite),
            CompletionMemoryPolicy::Preserve,
            None,
        )
        .await
    }

    /// Complete a goal with its memory; photos are appended to existing ones.
    pub async fn complete_goal(
        &self,
        bucket_id: &str,
        goal_id: &str,
        request: CompleteGoalRequest,
    ) -> Result<Goal, AppError> {
        self.update_goal_with(
            bucket_id,
            goal_id,
            CompletionMemoryPolicy::Preserve,
            None,
            move |existing| request.into_changes(existing),
        )
        .await
    }

    /// Read the goal, derive changes from it, then write conditionally on its version.
    async fn update_goal_with<F>(
        &self,
        bucket_id: &str,
        goal_id: &str,
        policy: CompletionMemoryPolicy,
        expected_version: Option<i64>,
        build: F,
    ) -> Result<Goal, AppError>
    where
        F: FnOnce(&Goal) -> Result<GoalChanges, AppError>,
    {
        let existing = self
            .get_goal(bucket_id, goal_id)
            .await?
            .ok_or_else(|| goal_not_found(goal_id))?;

        check_expected_version(expected_version, existing.version)?;

        let changes = build(&existing)?;
        let mut goal = changes.apply(&existing, policy, now());
        goal.version = existing.version + 1;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"UPDATE goals SET title = ?, description = ?, completed = ?, completed_at = ?, due_date = ?, is_favorite = ?, position = ?, completion_photos = ?, categories = ?, memory_journal = ?, version = ?
               WHERE bucket_id = ? AND id = ? AND version = ?"#,
        )
        .bind(&goal.title)
        .bind(&goal.description)
        .bind(goal.completed as i32)
        .bind(goal.completed_at.as_ref().map(format_timestamp))
        .bind(goal.due_date.as_ref().map(format_timestamp))
        .bind(goal.is_favorite as i32)
        .bind(goal.order)
        .bind(to_json(&goal.completion_photos)?)
        .bind(to_json(&goal.categories)?)
        .bind(&goal.memory_journal)
        .bind(goal.version)
        .bind(bucket_id)
        .bind(goal_id)
        .bind(existing.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(concurrent_modification(existing.version));
        }
        self.commit_change(tx, Collection::Goals, Some(bucket_id))
            .await?;

        Ok(goal)
    }

    /// Delete a goal.
    pub async fn delete_goal(&self, bucket_id: &str, goal_id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM goals WHERE bucket_id = ? AND id = ?")
            .bind(bucket_id)
            .bind(goal_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(goal_not_found(goal_id));
        }

        self.commit_change(tx, Collection::Goals, Some(bucket_id))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::repository::test_support::repository;
    use crate::db::Repository;
    use crate::errors::AppError;
    use crate::models::{
        parse_local_date, Bucket, BucketType, CompleteGoalRequest, CompletionMemoryPolicy,
        CreateBucketRequest, CreateGoalRequest, GoalChanges, NewGoal,
    };

    async fn bucket(repo: &Repository) -> Bucket {
        repo.create_bucket(
            "alice",
            &CreateBucketRequest {
                name: "Someday".to_string(),
                bucket_type: BucketType::Solo,
                description: None,
                member_ids: Vec::new(),
                theme: None,
            },
        )
        .await
        .unwrap()
    }

    fn new_goal(title: &str) -> NewGoal {
        CreateGoalRequest {
            title: title.to_string(),
            description: None,
            due_date: None,
            completed: false,
            completed_at: None,
            categories: vec!["travel".to_string()],
        }
        .into_new_goal("alice")
        .unwrap()
    }

    #[tokio::test]
    async fn goals_are_appended_in_order() {
        let (repo, _dir) = repository().await;
        let bucket = bucket(&repo).await;

        for title in ["Aurora", "Safari", "Everest base camp"] {
            repo.create_goal(&bucket.id, &new_goal(title)).await.unwrap();
        }

        let goals = repo.list_goals(&bucket.id).await.unwrap();
        let summary: Vec<_> = goals.iter().map(|g| (g.title.as_str(), g.order)).collect();
        assert_eq!(
            summary,
            vec![("Aurora", 0), ("Safari", 1), ("Everest base camp", 2)]
        );
        assert!(goals.iter().all(|g| g.categories == vec!["travel"]));
    }

    #[tokio::test]
    async fn goal_in_missing_bucket_is_not_found() {
        let (repo, _dir) = repository().await;
        let err = repo.create_goal("nope", &new_goal("Aurora")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn completion_lifecycle() {
        let (repo, _dir) = repository().await;
        let bucket = bucket(&repo).await;
        let goal = repo.create_goal(&bucket.id, &new_goal("Aurora")).await.unwrap();

        let completed = repo
            .complete_goal(
                &bucket.id,
                &goal.id,
                CompleteGoalRequest {
                    completed_at: Some("2025-02-01".to_string()),
                    photos: vec!["data:image/jpeg;base64,AAA".to_string()],
                    journal: Some("Green skies".to_string()),
                },
            )
            .await
            .unwrap();
        assert!(completed.completed);
        assert_eq!(
            completed.completed_at,
            Some(parse_local_date("2025-02-01", "date").unwrap())
        );

        let stored = repo.get_goal(&bucket.id, &goal.id).await.unwrap().unwrap();
        assert_eq!(stored, completed);

        let reopened = repo
            .toggle_goal_completion(&bucket.id, &goal.id, false)
            .await
            .unwrap();
        assert!(!reopened.completed);
        assert!(reopened.completed_at.is_none());
        assert!(reopened.completion_photos.is_empty());
        assert!(reopened.memory_journal.is_none());
    }

    #[tokio::test]
    async fn memory_journal_edits_are_persisted() {
        let (repo, _dir) = repository().await;
        let bucket = bucket(&repo).await;
        let goal = repo.create_goal(&bucket.id, &new_goal("Aurora")).await.unwrap();

        let changes = GoalChanges {
            completed: Some(true),
            memory_journal: Some(Some("Cold but worth it".to_string())),
            ..Default::default()
        };
        repo.update_goal(
            &bucket.id,
            &goal.id,
            &changes,
            CompletionMemoryPolicy::Preserve,
            Some(goal.version),
        )
        .await
        .unwrap();

        let stored = repo.get_goal(&bucket.id, &goal.id).await.unwrap().unwrap();
        assert_eq!(stored.memory_journal.as_deref(), Some("Cold but worth it"));
        assert!(stored.completed_at.is_some());

        let stale = repo
            .update_goal(
                &bucket.id,
                &goal.id,
                &GoalChanges::favorite(true),
                CompletionMemoryPolicy::Preserve,
                Some(goal.version),
            )
            .await
            .unwrap_err();
        assert!(matches!(stale, AppError::Conflict { .. }));
    }

    #[tokio::test]
    async fn delete_goal_and_bucket_cascade() {
        let (repo, _dir) = repository().await;
        let bucket = bucket(&repo).await;
        let first = repo.create_goal(&bucket.id, &new_goal("Aurora")).await.unwrap();
        repo.create_goal(&bucket.id, &new_goal("Safari")).await.unwrap();

        repo.delete_goal(&bucket.id, &first.id).await.unwrap();
        assert_eq!(repo.list_goals(&bucket.id).await.unwrap().len(), 1);
        assert!(matches!(
            repo.delete_goal(&bucket.id, &first.id).await,
            Err(AppError::NotFound(_))
        ));

        repo.delete_bucket(&bucket.id).await.unwrap();
        assert!(repo.get_bucket(&bucket.id).await.unwrap().is_none());
        assert!(repo.list_goals(&bucket.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn readers_never_see_orphaned_goals() {
        let (repo, _dir) = repository().await;
        let bucket = bucket(&repo).await;
        for i in 0..20 {
            repo.create_goal(&bucket.id, &new_goal(&format!("Goal {}", i)))
                .await
                .unwrap();
        }

        let reader = {
            let repo = repo.clone();
            let bucket_id = bucket.id.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    let mut conn = repo.pool.acquire().await.unwrap();
                    let (buckets, goals): (i64, i64) = sqlx::query_as(
                        "SELECT (SELECT COUNT(*) FROM buckets WHERE id = ?1), (SELECT COUNT(*) FROM goals WHERE bucket_id = ?1)",
                    )
                    .bind(&bucket_id)
                    .fetch_one(&mut *conn)
                    .await
                    .unwrap();
                    assert!(
                        !(buckets == 0 && goals > 0),
                        "goals visible without their bucket"
                    );
                    assert!(goals == 0 || goals == 20);
                    tokio::task::yield_now().await;
                }
            })
        };

        repo.delete_bucket(&bucket.id).await.unwrap();
        reader.await.unwrap();
    }
}
