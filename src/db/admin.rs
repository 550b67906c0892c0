//! Aggregate queries for the admin dashboard.

use chrono::TimeDelta;
use sqlx::Row;

use super::repository::Repository;
use super::{format_timestamp, now};
use crate::errors::AppError;
use crate::models::AppStats;

impl Repository {
    /// Application-wide counters. Active users are the distinct owners of
    /// buckets created within the last `active_window_days` days.
    pub async fn app_stats(&self, active_window_days: i64) -> Result<AppStats, AppError> {
        let since = TimeDelta::try_days(active_window_days)
            .and_then(|window| now().checked_sub_signed(window))
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "Active window of {} days is out of range",
                    active_window_days
                ))
            })?;
        let since = format_timestamp(&since);

        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM buckets) AS total_buckets,
                (SELECT COUNT(*) FROM goals) AS total_goals,
                (SELECT COUNT(*) FROM goals WHERE completed = 1) AS completed_goals,
                (SELECT COUNT(DISTINCT owner_id) FROM buckets WHERE created_at >= ?) AS active_users
            "#,
        )
        .bind(&since)
        .fetch_one(&self.pool)
        .await?;

        Ok(AppStats {
            total_users: row.get("total_users"),
            total_buckets: row.get("total_buckets"),
            total_goals: row.get("total_goals"),
            completed_goals: row.get("completed_goals"),
            active_users: row.get("active_users"),
        })
    }
}
