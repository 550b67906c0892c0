//! Live subscriptions over the repository.
//!
//! Writes publish to a [`ChangeFeed`]; each [`LiveQuery`] re-runs its fetch
//! when a relevant change arrives and exposes the latest snapshot.

mod buckets;
mod feed;
mod friends;
mod goals;
mod query;

pub use buckets::{merge_visible_buckets, subscribe_to_user_buckets};
pub use feed::{Change, ChangeFeed, Collection};
pub use friends::{subscribe_to_friend_requests, subscribe_to_friends};
pub use goals::{sort_goals_by_position, subscribe_to_bucket_goals};
pub use query::{LiveQuery, Subscription};
