//! In-process change feed backed by a `tokio::sync::broadcast` channel.
//!
//! The repository publishes one [`Change`] per committed write; live queries
//! subscribe and decide for themselves whether a change is relevant.

use serde::Serialize;
use tokio::sync::broadcast;

/// Document collection touched by a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Users,
    Buckets,
    Goals,
    FriendRequests,
    AuthClaims,
}

/// A committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub collection: Collection,
    /// Parent bucket id for goal writes.
    pub parent: Option<String>,
    /// Revision after the write.
    pub revision: i64,
}

impl Change {
    pub fn new(collection: Collection, revision: i64) -> Self {
        Self {
            collection,
            parent: None,
            revision,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn touches(&self, collection: Collection) -> bool {
        self.collection == collection
    }

    /// True for goal writes under `bucket_id`.
    pub fn touches_goals_of(&self, bucket_id: &str) -> bool {
        self.collection == Collection::Goals && self.parent.as_deref() == Some(bucket_id)
    }
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// Fan-out of committed writes to every live query.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<Change>,
}

impl ChangeFeed {
    /// When the buffer is full the oldest changes are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a change to all current subscribers.
    pub fn publish(&self, change: Change) {
        tracing::trace!(
            collection = ?change.collection,
            parent = ?change.parent,
            revision = change.revision,
            "Publishing change"
        );
        // A send error only means nobody is listening.
        let _ = self.sender.send(change);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
