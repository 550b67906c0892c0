//! Friend request operations. Friendship is an accepted request in either direction.

use super::repository::{friend_request_from_row, Repository, FRIEND_REQUEST_COLUMNS};
use super::{format_timestamp, now};
use crate::errors::AppError;
use crate::live::Collection;
use crate::models::{friend_ids, merge_friend_requests, FriendRequest, FriendStatus, User};

const ALREADY_FRIENDS: &str = "You are already friends with this user";
const ALREADY_SENT: &str = "Friend request already sent";

fn request_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Friend request {} not found", id))
}

impl Repository {
    /// Create a pending request from `from_user_id` to `to_user_id`.
    pub async fn send_friend_request(
        &self,
        from_user_id: &str,
        to_user_id: &str,
    ) -> Result<FriendRequest, AppError> {
        if from_user_id == to_user_id {
            return Err(AppError::Validation(
                "Cannot send friend request to yourself".to_string(),
            ));
        }

        if let Some(existing) = self.find_friend_request(from_user_id, to_user_id).await? {
            return Err(AppError::duplicate(if existing.is_accepted() {
                ALREADY_FRIENDS
            } else {
                ALREADY_SENT
            }));
        }

        let request = FriendRequest {
            id: uuid::Uuid::new_v4().to_string(),
            from_user_id: from_user_id.to_string(),
            to_user_id: to_user_id.to_string(),
            status: FriendStatus::Pending,
            created_at: now(),
        };

        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(
            "INSERT INTO friend_requests (id, from_user_id, to_user_id, status, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&request.id)
        .bind(&request.from_user_id)
        .bind(&request.to_user_id)
        .bind(request.status.as_str())
        .bind(format_timestamp(&request.created_at))
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            // A concurrent request for the same pair won the race.
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(AppError::duplicate(ALREADY_SENT));
            }
            Err(err) => return Err(err.into()),
        }
        self.commit_change(tx, Collection::FriendRequests, None)
            .await?;

        tracing::info!(from_user_id, to_user_id, "Friend request sent");
        Ok(request)
    }

    /// The request between two users in either direction, if any.
    pub async fn find_friend_request(
        &self,
        a: &str,
        b: &str,
    ) -> Result<Option<FriendRequest>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM friend_requests WHERE (from_user_id = ? AND to_user_id = ?) OR (from_user_id = ? AND to_user_id = ?)",
            FRIEND_REQUEST_COLUMNS
        ))
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(friend_request_from_row))
    }

    pub async fn get_friend_request(&self, id: &str) -> Result<Option<FriendRequest>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM friend_requests WHERE id = ?",
            FRIEND_REQUEST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(friend_request_from_row))
    }

    /// Accept a request. Only its receiver may accept; accepting twice is a no-op.
    pub async fn accept_friend_request(
        &self,
        id: &str,
        caller_id: &str,
    ) -> Result<FriendRequest, AppError> {
        let request = self
            .get_friend_request(id)
            .await?
            .ok_or_else(|| request_not_found(id))?;

        if request.to_user_id != caller_id {
            return Err(AppError::Forbidden(
                "Only the recipient can accept a friend request".to_string(),
            ));
        }
        if request.is_accepted() {
            return Ok(request);
        }

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("UPDATE friend_requests SET status = ? WHERE id = ?")
            .bind(FriendStatus::Accepted.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(request_not_found(id));
        }
        self.commit_change(tx, Collection::FriendRequests, None)
            .await?;

        Ok(FriendRequest {
            status: FriendStatus::Accepted,
            ..request
        })
    }

    /// Reject (delete) a request. Either party may reject.
    pub async fn reject_friend_request(&self, id: &str, caller_id: &str) -> Result<(), AppError> {
        let request = self
            .get_friend_request(id)
            .await?
            .ok_or_else(|| request_not_found(id))?;

        if request.counterpart(caller_id).is_none() {
            return Err(AppError::Forbidden(
                "Not a party to this friend request".to_string(),
            ));
        }

        self.delete_friend_request(id).await
    }

    /// Delete the accepted request connecting `user_id` and `friend_id`.
    pub async fn remove_friend(&self, user_id: &str, friend_id: &str) -> Result<(), AppError> {
        match self.find_friend_request(user_id, friend_id).await? {
            Some(request) if request.is_accepted() => self.delete_friend_request(&request.id).await,
            _ => Err(AppError::NotFound(
                "Friend relationship not found".to_string(),
            )),
        }
    }

    async fn delete_friend_request(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM friend_requests WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(request_not_found(id));
        }
        self.commit_change(tx, Collection::FriendRequests, None)
            .await?;
        Ok(())
    }

    /// Requests sent by `user_id`, oldest first.
    pub async fn list_friend_requests_from(
        &self,
        user_id: &str,
    ) -> Result<Vec<FriendRequest>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM friend_requests WHERE from_user_id = ? ORDER BY created_at ASC",
            FRIEND_REQUEST_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(friend_request_from_row).collect())
    }

    /// Requests received by `user_id`, oldest first.
    pub async fn list_friend_requests_to(
        &self,
        user_id: &str,
    ) -> Result<Vec<FriendRequest>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM friend_requests WHERE to_user_id = ? ORDER BY created_at ASC",
            FRIEND_REQUEST_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(friend_request_from_row).collect())
    }

    /// Sent and received requests of `user_id`.
    pub async fn list_user_friend_requests(
        &self,
        user_id: &str,
    ) -> Result<Vec<FriendRequest>, AppError> {
        let sent = self.list_friend_requests_from(user_id).await?;
        let received = self.list_friend_requests_to(user_id).await?;
        Ok(merge_friend_requests(&sent, &received))
    }

    /// Every accepted request.
    pub async fn list_accepted_friend_requests(&self) -> Result<Vec<FriendRequest>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM friend_requests WHERE status = ? ORDER BY created_at ASC",
            FRIEND_REQUEST_COLUMNS
        ))
        .bind(FriendStatus::Accepted.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(friend_request_from_row).collect())
    }

    /// Profiles of everyone `user_id` is friends with. Missing profiles are skipped.
    pub async fn get_user_friends(&self, user_id: &str) -> Result<Vec<User>, AppError> {
        let accepted = self.list_accepted_friend_requests().await?;
        self.get_users(&friend_ids(&accepted, user_id)).await
    }

    /// Lookup failures count as not friends.
    pub async fn are_friends(&self, a: &str, b: &str) -> bool {
        match self.find_friend_request(a, b).await {
            Ok(request) => request.is_some_and(|r| r.is_accepted()),
            Err(err) => {
                tracing::warn!(error = %err, "Friendship check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support::{repository, user};

    #[tokio::test]
    async fn duplicate_requests_fail_in_either_direction() {
        let (repo, _dir) = repository().await;

        let request = repo.send_friend_request("alice", "bob").await.unwrap();
        assert_eq!(request.status, FriendStatus::Pending);

        let again = repo.send_friend_request("alice", "bob").await.unwrap_err();
        assert_eq!(again.message(), ALREADY_SENT);
        let reverse = repo.send_friend_request("bob", "alice").await.unwrap_err();
        assert_eq!(reverse.message(), ALREADY_SENT);

        repo.accept_friend_request(&request.id, "bob").await.unwrap();
        let accepted = repo.send_friend_request("bob", "alice").await.unwrap_err();
        assert_eq!(accepted.message(), ALREADY_FRIENDS);
        assert!(matches!(accepted, AppError::Conflict { .. }));

        assert_eq!(repo.list_user_friend_requests("alice").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn self_request_is_invalid() {
        let (repo, _dir) = repository().await;
        let err = repo.send_friend_request("alice", "alice").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn only_recipient_accepts() {
        let (repo, _dir) = repository().await;
        let request = repo.send_friend_request("alice", "bob").await.unwrap();

        let err = repo
            .accept_friend_request(&request.id, "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let accepted = repo.accept_friend_request(&request.id, "bob").await.unwrap();
        assert!(accepted.is_accepted());
        let again = repo.accept_friend_request(&request.id, "bob").await.unwrap();
        assert!(again.is_accepted());
    }

    #[tokio::test]
    async fn friendship_lifecycle() {
        let (repo, _dir) = repository().await;
        user(&repo, "alice").await;
        user(&repo, "bob").await;

        let request = repo.send_friend_request("alice", "bob").await.unwrap();
        assert!(!repo.are_friends("alice", "bob").await);
        assert!(repo.get_user_friends("alice").await.unwrap().is_empty());

        repo.accept_friend_request(&request.id, "bob").await.unwrap();
        assert!(repo.are_friends("bob", "alice").await);

        let friends: Vec<_> = repo
            .get_user_friends("bob")
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(friends, vec!["alice"]);

        repo.remove_friend("bob", "alice").await.unwrap();
        assert!(!repo.are_friends("alice", "bob").await);
        let err = repo.remove_friend("bob", "alice").await.unwrap_err();
        assert_eq!(err.message(), "Friend relationship not found");
    }

    #[tokio::test]
    async fn reject_requires_a_party() {
        let (repo, _dir) = repository().await;
        let request = repo.send_friend_request("alice", "bob").await.unwrap();

        assert!(matches!(
            repo.reject_friend_request(&request.id, "carol").await,
            Err(AppError::Forbidden(_))
        ));
        repo.reject_friend_request(&request.id, "bob").await.unwrap();
        assert!(repo.get_friend_request(&request.id).await.unwrap().is_none());

        // A rejected pair can try again.
        repo.send_friend_request("bob", "alice").await.unwrap();
    }
}
