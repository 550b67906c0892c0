//! Client state store.
//!
//! Holds the latest buckets visible to one user and, per bucket, its goals.
//! The bucket slice is written only by the bucket subscription; each goal
//! slice only by that bucket's goal subscription. Readers get snapshots.
//!
//! Goal subscriptions are reference counted. The bucket subscription holds
//! one reference per visible bucket and explicit consumers (e.g. a detail
//! view) take their own through [`BucketStore::subscribe_to_goals`]. A goal
//! subscription and its slice are dropped when the last reference goes.
//!
//! Subscribing spawns tasks, so it must be called within a Tokio runtime.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use crate::db::Repository;
use crate::live::{subscribe_to_bucket_goals, subscribe_to_user_buckets, Subscription};
use crate::models::{Bucket, Goal};

/// Snapshot of the store contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    pub buckets: Vec<Bucket>,
    pub goals: HashMap<String, Vec<Goal>>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Completed and total goal counts of one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketProgress {
    pub completed: usize,
    pub total: usize,
}

impl BucketProgress {
    pub fn from_goals(goals: &[Goal]) -> Self {
        Self {
            completed: goals.iter().filter(|g| g.completed).count(),
            total: goals.len(),
        }
    }

    /// Completed fraction in `[0, 1]`; zero when there are no goals.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

struct GoalSubscription {
    refs: usize,
    token: u64,
    _subscription: Subscription,
}

#[derive(Default)]
struct Subscriptions {
    generation: u64,
    next_token: u64,
    buckets: Option<Subscription>,
    /// Buckets the bucket subscription currently holds a goal reference for.
    bucket_refs: HashSet<String>,
    goals: HashMap<String, GoalSubscription>,
}

struct StoreInner {
    repo: Arc<Repository>,
    state: RwLock<StoreState>,
    subscriptions: Mutex<Subscriptions>,
}

/// Injectable client state container. Cloning shares the same store.
#[derive(Clone)]
pub struct BucketStore {
    inner: Arc<StoreInner>,
}

impl BucketStore {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                repo,
                state: RwLock::new(StoreState {
                    loading: true,
                    ..Default::default()
                }),
                subscriptions: Mutex::new(Subscriptions::default()),
            }),
        }
    }

    /// Follow the buckets visible to `user_id`, replacing any previous bucket subscription.
    pub fn subscribe_to_buckets(&self, user_id: &str) {
        let mut subs = self.inner.lock_subscriptions();
        subs.buckets = None;
        subs.generation += 1;
        let generation = subs.generation;
        {
            let mut state = self.inner.write_state();
            state.buckets.clear();
            state.loading = true;
        }

        let weak = Arc::downgrade(&self.inner);
        let live = subscribe_to_user_buckets(self.inner.repo.clone(), user_id);
        subs.buckets = Some(live.for_each(move |buckets| {
            if let Some(inner) = weak.upgrade() {
                inner.on_buckets(generation, buckets);
            }
        }));
        drop(subs);

        tracing::debug!(user_id, generation, "Subscribed to buckets");
    }

    /// Take a reference on `bucket_id`'s goal subscription, opening it if needed.
    pub fn subscribe_to_goals(&self, bucket_id: &str) {
        let mut subs = self.inner.lock_subscriptions();
        self.inner.acquire_goals(&mut subs, bucket_id);
    }

    /// Release a reference taken with [`subscribe_to_goals`](Self::subscribe_to_goals).
    pub fn unsubscribe_from_goals(&self, bucket_id: &str) {
        let mut subs = self.inner.lock_subscriptions();
        self.inner.release_goals(&mut subs, bucket_id);
    }

    /// Stop following buckets and release the goal references held for them.
    pub fn unsubscribe_from_buckets(&self) {
        let mut subs = self.inner.lock_subscriptions();
        subs.buckets = None;
        subs.generation += 1;
        let held: Vec<String> = subs.bucket_refs.drain().collect();
        for bucket_id in held {
            self.inner.release_goals(&mut subs, &bucket_id);
        }
    }

    /// Tear down every subscription and reset to an empty, idle state.
    pub fn clear_state(&self) {
        let mut subs = self.inner.lock_subscriptions();
        subs.buckets = None;
        subs.generation += 1;
        subs.bucket_refs.clear();
        subs.goals.clear();

        *self.inner.write_state() = StoreState::default();
    }

    pub fn snapshot(&self) -> StoreState {
        self.inner.read_state().clone()
    }

    pub fn buckets(&self) -> Vec<Bucket> {
        self.inner.read_state().buckets.clone()
    }

    /// Goals of a bucket; empty when not subscribed or not yet loaded.
    pub fn goals_for(&self, bucket_id: &str) -> Vec<Goal> {
        self.inner
            .read_state()
            .goals
            .get(bucket_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn owned_buckets(&self, user_id: &str) -> Vec<Bucket> {
        self.inner
            .read_state()
            .buckets
            .iter()
            .filter(|b| b.is_owner(user_id))
            .cloned()
            .collect()
    }

    /// Buckets where `user_id` is a member but not the owner.
    pub fn shared_buckets(&self, user_id: &str) -> Vec<Bucket> {
        self.inner
            .read_state()
            .buckets
            .iter()
            .filter(|b| b.is_shared_with(user_id))
            .cloned()
            .collect()
    }

    pub fn bucket_by_id(&self, bucket_id: &str) -> Option<Bucket> {
        self.inner
            .read_state()
            .buckets
            .iter()
            .find(|b| b.id == bucket_id)
            .cloned()
    }

    pub fn is_bucket_owner(&self, bucket_id: &str, user_id: &str) -> bool {
        self.bucket_by_id(bucket_id)
            .is_some_and(|b| b.is_owner(user_id))
    }

    pub fn is_bucket_member(&self, bucket_id: &str, user_id: &str) -> bool {
        self.bucket_by_id(bucket_id)
            .is_some_and(|b| b.is_member(user_id))
    }

    pub fn bucket_progress(&self, bucket_id: &str) -> BucketProgress {
        self.inner
            .read_state()
            .goals
            .get(bucket_id)
            .map(|goals| BucketProgress::from_goals(goals))
            .unwrap_or_default()
    }

    /// Bucket ids with an open goal subscription, sorted.
    pub fn active_goal_subscriptions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .lock_subscriptions()
            .goals
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn loading(&self) -> bool {
        self.inner.read_state().loading
    }

    pub fn error(&self) -> Option<String> {
        self.inner.read_state().error.clone()
    }

    pub fn set_error(&self, error: Option<String>) {
        self.inner.write_state().error = error;
    }
}

impl StoreInner {
    fn lock_subscriptions(&self) -> MutexGuard<'_, Subscriptions> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_buckets(self: Arc<Self>, generation: u64, buckets: Vec<Bucket>) {
        let mut subs = self.lock_subscriptions();
        if subs.generation != generation {
            return;
        }

        let visible: HashSet<String> = buckets.iter().map(|b| b.id.clone()).collect();
        {
            let mut state = self.write_state();
            state.buckets = buckets;
            state.loading = false;
            state.error = None;
        }

        let gone: Vec<String> = subs
            .bucket_refs
            .iter()
            .filter(|id| !visible.contains(*id))
            .cloned()
            .collect();
        for bucket_id in gone {
            subs.bucket_refs.remove(&bucket_id);
            self.release_goals(&mut subs, &bucket_id);
        }

        for bucket_id in visible {
            if subs.bucket_refs.insert(bucket_id.clone()) {
                self.acquire_goals(&mut subs, &bucket_id);
            }
        }
    }

    fn acquire_goals(self: &Arc<Self>, subs: &mut Subscriptions, bucket_id: &str) {
        if let Some(existing) = subs.goals.get_mut(bucket_id) {
            existing.refs += 1;
            return;
        }

        subs.next_token += 1;
        let token = subs.next_token;
        let weak: Weak<StoreInner> = Arc::downgrade(self);
        let key = bucket_id.to_string();
        let live = subscribe_to_bucket_goals(self.repo.clone(), bucket_id);
        let subscription = live.for_each(move |goals| {
            if let Some(inner) = weak.upgrade() {
                inner.on_goals(&key, token, goals);
            }
        });

        subs.goals.insert(
            bucket_id.to_string(),
            GoalSubscription {
                refs: 1,
                token,
                _subscription: subscription,
            },
        );
        tracing::debug!(bucket_id, "Opened goal subscription");
    }

    fn release_goals(&self, subs: &mut Subscriptions, bucket_id: &str) {
        let Some(existing) = subs.goals.get_mut(bucket_id) else {
            return;
        };
        existing.refs = existing.refs.saturating_sub(1);
        if existing.refs > 0 {
            return;
        }

        subs.goals.remove(bucket_id);
        self.write_state().goals.remove(bucket_id);
        tracing::debug!(bucket_id, "Closed goal subscription");
    }

    fn on_goals(&self, bucket_id: &str, token: u64, goals: Vec<Goal>) {
        let subs = self.lock_subscriptions();
        // A closed or reopened subscription must not write this slice.
        if subs.goals.get(bucket_id).map(|g| g.token) != Some(token) {
            return;
        }
        self.write_state().goals.insert(bucket_id.to_string(), goals);
    }
}
