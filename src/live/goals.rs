//! Live view of one bucket's goals.

use std::sync::Arc;

use super::LiveQuery;
use crate::db::Repository;
use crate::models::Goal;

/// Goals of `bucket_id` in display order, refreshed on goal writes under that bucket.
pub fn subscribe_to_bucket_goals(repo: Arc<Repository>, bucket_id: &str) -> LiveQuery<Vec<Goal>> {
    let parent = bucket_id.to_string();
    let bucket_id = bucket_id.to_string();
    LiveQuery::spawn(
        &repo.changes().clone(),
        "bucket_goals",
        move |change| change.touches_goals_of(&parent),
        move || {
            let repo = repo.clone();
            let bucket_id = bucket_id.clone();
            async move {
                let mut goals = repo.list_goals(&bucket_id).await?;
                sort_goals_by_position(&mut goals);
                Ok(goals)
            }
        },
    )
}

/// `order` ascending, then creation time ascending.
pub fn sort_goals_by_position(goals: &mut [Goal]) {
    goals.sort_by(|a, b| a.order.cmp(&b.order).then(a.created_at.cmp(&b.created_at)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support::repository;
    use crate::models::{BucketType, CreateBucketRequest, CreateGoalRequest};
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn goal(id: &str, order: i64, created: i64) -> Goal {
        Goal {
            id: id.to_string(),
            bucket_id: "b".to_string(),
            title: id.to_string(),
            description: None,
            completed: false,
            completed_at: None,
            created_at: Utc.timestamp_opt(created, 0).unwrap(),
            created_by: "u".to_string(),
            due_date: None,
            is_favorite: false,
            order,
            completion_photos: Vec::new(),
            categories: Vec::new(),
            memory_journal: None,
            version: 1,
        }
    }

    #[test]
    fn position_sort_breaks_ties_by_creation() {
        let mut goals = vec![goal("c", 1, 5), goal("a", 0, 9), goal("b", 1, 2)];
        sort_goals_by_position(&mut goals);
        let ids: Vec<_> = goals.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn ignores_goal_writes_in_other_buckets() {
        let (repo, _dir) = repository().await;
        let repo = Arc::new(repo);
        let create = |name: &str| CreateBucketRequest {
            name: name.to_string(),
            bucket_type: BucketType::Solo,
            description: None,
            member_ids: Vec::new(),
            theme: None,
        };
        let watched = repo.create_bucket("alice", &create("Watched")).await.unwrap();
        let other = repo.create_bucket("alice", &create("Other")).await.unwrap();

        let mut live = subscribe_to_bucket_goals(repo.clone(), &watched.id);
        tokio::time::timeout(Duration::from_secs(2), live.wait_for(|g| g.is_empty()))
            .await
            .unwrap();

        let new_goal = |title: &str| {
            CreateGoalRequest {
                title: title.to_string(),
                description: None,
                due_date: None,
                completed: false,
                completed_at: None,
                categories: Vec::new(),
            }
            .into_new_goal("alice")
            .unwrap()
        };
        repo.create_goal(&other.id, &new_goal("Elsewhere")).await.unwrap();
        repo.create_goal(&watched.id, &new_goal("Here")).await.unwrap();

        let goals = tokio::time::timeout(Duration::from_secs(2), live.wait_for(|g| !g.is_empty()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].title, "Here");
        assert!(goals.iter().all(|g| g.bucket_id == watched.id));
    }
}
