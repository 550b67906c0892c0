//! Friend request model. Friendship is derived from accepted requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a friend request. Rejection deletes the record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FriendStatus {
    Pending,
    Accepted,
}

impl FriendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FriendStatus::Pending => "pending",
            FriendStatus::Accepted => "accepted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(FriendStatus::Pending),
            "accepted" => Some(FriendStatus::Accepted),
            _ => None,
        }
    }
}

/// A directional request between two users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub status: FriendStatus,
    pub created_at: DateTime<Utc>,
}

impl FriendRequest {
    /// True when the request connects `a` and `b` in either direction.
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.from_user_id == a && self.to_user_id == b)
            || (self.from_user_id == b && self.to_user_id == a)
    }

    /// The other party, if `user_id` is one of the two.
    pub fn counterpart(&self, user_id: &str) -> Option<&str> {
        if self.from_user_id == user_id {
            Some(&self.to_user_id)
        } else if self.to_user_id == user_id {
            Some(&self.from_user_id)
        } else {
            None
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == FriendStatus::Accepted
    }
}

/// Friend ids of `user_id`, in request order, derived from accepted requests.
pub fn friend_ids(requests: &[FriendRequest], user_id: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for request in requests.iter().filter(|r| r.is_accepted()) {
        if let Some(other) = request.counterpart(user_id) {
            if !ids.iter().any(|id| id == other) {
                ids.push(other.to_string());
            }
        }
    }
    ids
}

/// Union of two request lists, first occurrence of each id wins.
pub fn merge_friend_requests(
    first: &[FriendRequest],
    second: &[FriendRequest],
) -> Vec<FriendRequest> {
    let mut merged: Vec<FriendRequest> = Vec::with_capacity(first.len() + second.len());
    for request in first.iter().chain(second) {
        if !merged.iter().any(|r| r.id == request.id) {
            merged.push(request.clone());
        }
    }
    merged
}

/// Request body for sending a friend request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFriendRequest {
    pub to_user_id: String,
}
