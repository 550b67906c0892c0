//! Bucket (goal container) model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::double_option;

/// How many people a bucket is meant for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BucketType {
    Solo,
    Duo,
    Group,
}

impl BucketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketType::Solo => "solo",
            BucketType::Duo => "duo",
            BucketType::Group => "group",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "solo" => Some(BucketType::Solo),
            "duo" => Some(BucketType::Duo),
            "group" => Some(BucketType::Group),
            _ => None,
        }
    }
}

/// A member's role inside a bucket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Member,
}

/// A user associated with a bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BucketMember {
    pub user_id: String,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

impl BucketMember {
    pub fn new(user_id: impl Into<String>, role: MemberRole, joined_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            joined_at,
        }
    }
}

/// Color and icon chosen for a bucket card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BucketTheme {
    pub color: String,
    pub icon: String,
}

/// A named, ownable collection of goals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub bucket_type: BucketType,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub members: Vec<BucketMember>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<BucketTheme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    /// Internal version for optimistic concurrency control
    #[serde(default)]
    pub version: i64,
}

impl Bucket {
    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    /// Owner or listed member.
    pub fn is_member(&self, user_id: &str) -> bool {
        self.is_owner(user_id) || self.members.iter().any(|m| m.user_id == user_id)
    }

    /// Listed as a member without being the owner.
    pub fn is_shared_with(&self, user_id: &str) -> bool {
        !self.is_owner(user_id) && self.members.iter().any(|m| m.user_id == user_id)
    }

    pub fn role_of(&self, user_id: &str) -> Option<MemberRole> {
        if self.is_owner(user_id) {
            return Some(MemberRole::Owner);
        }
        self.members
            .iter()
            .find(|m| m.user_id == user_id)
            .map(|m| m.role)
    }

    /// Exactly one `owner` member, and it is `owner_id`.
    pub fn has_valid_owner(&self) -> bool {
        let mut owners = self.members.iter().filter(|m| m.role == MemberRole::Owner);
        matches!(
            (owners.next(), owners.next()),
            (Some(owner), None) if owner.user_id == self.owner_id
        )
    }
}

/// Build the initial member list: the owner first, then each other id once.
pub fn initial_members(owner_id: &str, member_ids: &[String], now: DateTime<Utc>) -> Vec<BucketMember> {
    let mut members = vec![BucketMember::new(owner_id, MemberRole::Owner, now)];
    for member_id in member_ids {
        if members.iter().any(|m| &m.user_id == member_id) {
            continue;
        }
        members.push(BucketMember::new(member_id.clone(), MemberRole::Member, now));
    }
    members
}

/// Request body for creating a bucket. The caller becomes the owner.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBucketRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub bucket_type: BucketType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub member_ids: Vec<String>,
    #[serde(default)]
    pub theme: Option<BucketTheme>,
}

/// Request body for updating bucket details.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBucketRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, rename = "type")]
    pub bucket_type: Option<BucketType>,
    #[serde(default, deserialize_with = "double_option")]
    pub theme: Option<Option<BucketTheme>>,
    #[serde(default, deserialize_with = "double_option")]
    pub cover_image: Option<Option<String>>,
    /// Expected version for optimistic concurrency control
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Request body for adding members in bulk.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMembersRequest {
    pub user_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(owner: &str, members: &[(&str, MemberRole)]) -> Bucket {
        let now = Utc::now();
        Bucket {
            id: "b1".to_string(),
            name: "Trips".to_string(),
            bucket_type: BucketType::Group,
            owner_id: owner.to_string(),
            created_at: now,
            members: members
                .iter()
                .map(|(id, role)| BucketMember::new(*id, *role, now))
                .collect(),
            description: None,
            theme: None,
            cover_image: None,
            version: 1,
        }
    }

    #[test]
    fn initial_members_put_owner_first_and_skip_duplicates() {
        let ids = vec!["bob".to_string(), "alice".to_string(), "bob".to_string()];
        let members = initial_members("alice", &ids, Utc::now());
        let summary: Vec<_> = members.iter().map(|m| (m.user_id.as_str(), m.role)).collect();
        assert_eq!(
            summary,
            vec![("alice", MemberRole::Owner), ("bob", MemberRole::Member)]
        );
    }

    #[test]
    fn membership_predicates() {
        let b = bucket(
            "alice",
            &[("alice", MemberRole::Owner), ("bob", MemberRole::Member)],
        );
        assert!(b.is_member("alice"));
        assert!(b.is_member("bob"));
        assert!(!b.is_member("carol"));
        assert!(b.is_shared_with("bob"));
        assert!(!b.is_shared_with("alice"));
        assert_eq!(b.role_of("bob"), Some(MemberRole::Member));
        assert_eq!(b.role_of("alice"), Some(MemberRole::Owner));
        assert_eq!(b.role_of("carol"), None);
    }

    #[test]
    fn owner_invariant() {
        assert!(bucket("alice", &[("alice", MemberRole::Owner)]).has_valid_owner());
        assert!(!bucket("alice", &[("bob", MemberRole::Owner)]).has_valid_owner());
        assert!(!bucket(
            "alice",
            &[("alice", MemberRole::Owner), ("bob", MemberRole::Owner)]
        )
        .has_valid_owner());
        assert!(!bucket("alice", &[]).has_valid_owner());
    }

    #[test]
    fn bucket_serializes_type_field() {
        let json = serde_json::to_value(bucket("alice", &[("alice", MemberRole::Owner)])).unwrap();
        assert_eq!(json["type"], "group");
        assert_eq!(json["ownerId"], "alice");
        assert_eq!(json["members"][0]["role"], "owner");
    }
}
