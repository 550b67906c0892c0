//! Live view of every bucket a user can see.

use std::collections::HashSet;
use std::sync::Arc;

use super::{Collection, LiveQuery};
use crate::db::Repository;
use crate::models::Bucket;

/// Buckets visible to `user_id` (owned or shared), kept current.
///
/// Two live queries stay open: the user's owned buckets and all buckets.
/// Membership is filtered here because members are stored as a JSON array.
pub fn subscribe_to_user_buckets(repo: Arc<Repository>, user_id: &str) -> LiveQuery<Vec<Bucket>> {
    let owned = {
        let repo = repo.clone();
        let user_id = user_id.to_string();
        LiveQuery::spawn(
            &repo.changes().clone(),
            "owned_buckets",
            |change| change.touches(Collection::Buckets),
            move || {
                let repo = repo.clone();
                let user_id = user_id.clone();
                async move { repo.list_buckets_owned_by(&user_id).await }
            },
        )
    };

    let all = {
        let repo = repo.clone();
        LiveQuery::spawn(
            &repo.changes().clone(),
            "all_buckets",
            |change| change.touches(Collection::Buckets),
            move || {
                let repo = repo.clone();
                async move { repo.list_buckets().await }
            },
        )
    };

    let user_id = user_id.to_string();
    LiveQuery::combine(owned, all, move |owned: &Vec<Bucket>, all: &Vec<Bucket>| {
        merge_visible_buckets(&user_id, owned, all)
    })
}

/// Owned buckets first, then buckets from `all` where `user_id` is a member
/// but not the owner. Each id appears once.
pub fn merge_visible_buckets(user_id: &str, owned: &[Bucket], all: &[Bucket]) -> Vec<Bucket> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(owned.len());
    let mut merged = Vec::with_capacity(owned.len());

    for bucket in owned {
        if seen.insert(bucket.id.as_str()) {
            merged.push(bucket.clone());
        }
    }
    for bucket in all.iter().filter(|b| b.is_shared_with(user_id)) {
        if seen.insert(bucket.id.as_str()) {
            merged.push(bucket.clone());
        }
    }
    merged
}
