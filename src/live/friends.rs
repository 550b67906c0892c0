//! Live friend requests and friend lists.

use std::sync::Arc;

use super::{Collection, LiveQuery};
use crate::db::Repository;
use crate::models::{friend_ids, merge_friend_requests, FriendRequest, User};

/// Sent and received requests of `user_id`, de-duplicated by id.
pub fn subscribe_to_friend_requests(
    repo: Arc<Repository>,
    user_id: &str,
) -> LiveQuery<Vec<FriendRequest>> {
    let sent = {
        let repo = repo.clone();
        let user_id = user_id.to_string();
        LiveQuery::spawn(
            &repo.changes().clone(),
            "sent_friend_requests",
            |change| change.touches(Collection::FriendRequests),
            move || {
                let repo = repo.clone();
                let user_id = user_id.clone();
                async move { repo.list_friend_requests_from(&user_id).await }
            },
        )
    };

    let received = {
        let repo = repo.clone();
        let user_id = user_id.to_string();
        LiveQuery::spawn(
            &repo.changes().clone(),
            "received_friend_requests",
            |change| change.touches(Collection::FriendRequests),
            move || {
                let repo = repo.clone();
                let user_id = user_id.clone();
                async move { repo.list_friend_requests_to(&user_id).await }
            },
        )
    };

    LiveQuery::combine(sent, received, |sent: &Vec<FriendRequest>, received: &Vec<FriendRequest>| {
        merge_friend_requests(sent, received)
    })
}

/// Profiles of `user_id`'s friends, refreshed when requests or profiles change.
pub fn subscribe_to_friends(repo: Arc<Repository>, user_id: &str) -> LiveQuery<Vec<User>> {
    let user_id = user_id.to_string();
    LiveQuery::spawn(
        &repo.changes().clone(),
        "friends",
        |change| change.touches(Collection::FriendRequests) || change.touches(Collection::Users),
        move || {
            let repo = repo.clone();
            let user_id = user_id.clone();
            async move {
                let accepted = repo.list_accepted_friend_requests().await?;
                repo.get_users(&friend_ids(&accepted, &user_id)).await
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support::{repository, user};
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn requests_stream_covers_both_directions() {
        let (repo, _dir) = repository().await;
        let repo = Arc::new(repo);
        let mut live = subscribe_to_friend_requests(repo.clone(), "alice");

        repo.send_friend_request("alice", "bob").await.unwrap();
        repo.send_friend_request("carol", "alice").await.unwrap();
        repo.send_friend_request("bob", "carol").await.unwrap();

        let requests = tokio::time::timeout(WAIT, live.wait_for(|r| r.len() == 2))
            .await
            .unwrap()
            .unwrap();
        assert!(requests.iter().all(|r| r.counterpart("alice").is_some()));
    }

    #[tokio::test]
    async fn friends_stream_follows_acceptance() {
        let (repo, _dir) = repository().await;
        user(&repo, "alice").await;
        user(&repo, "bob").await;
        let repo = Arc::new(repo);

        let mut live = subscribe_to_friends(repo.clone(), "alice");
        tokio::time::timeout(WAIT, live.wait_for(|f| f.is_empty()))
            .await
            .unwrap();

        let request = repo.send_friend_request("alice", "bob").await.unwrap();
        repo.accept_friend_request(&request.id, "bob").await.unwrap();

        let friends = tokio::time::timeout(WAIT, live.wait_for(|f| f.len() == 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(friends[0].id, "bob");
    }
}
