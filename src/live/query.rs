//! Live queries: continuously refreshed snapshots driven by the change feed.

use std::future::Future;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{Change, ChangeFeed};
use crate::errors::AppError;

/// Handle to a running live query.
///
/// Holds the latest snapshot (`None` until the first fetch completes).
/// Dropping the handle stops the query.
pub struct LiveQuery<T> {
    receiver: watch::Receiver<Option<T>>,
    task: Option<JoinHandle<()>>,
}

impl<T> Drop for LiveQuery<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<T> LiveQuery<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Run `fetch` now and again after every change accepted by `relevant`.
    ///
    /// Fetch errors are logged and the previous snapshot stays current.
    /// A lagged feed triggers a refresh since changes may have been missed.
    pub fn spawn<R, F, Fut>(feed: &ChangeFeed, label: &'static str, relevant: R, fetch: F) -> Self
    where
        R: Fn(&Change) -> bool + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        let (sender, receiver) = watch::channel(None);
        // Subscribe before the first fetch so no write can slip between them.
        let mut changes = feed.subscribe();

        let task = tokio::spawn(async move {
            loop {
                match fetch().await {
                    Ok(value) => {
                        if sender.send(Some(value)).is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(query = label, error = %err, "Live query refresh failed");
                    }
                }

                if !next_relevant_change(&mut changes, &relevant, label).await {
                    tracing::debug!(query = label, "Change feed closed, stopping live query");
                    return;
                }
            }
        });

        Self {
            receiver,
            task: Some(task),
        }
    }

    /// Derive a query from two others, republishing `merge(latest_left, latest_right)`
    /// whenever either side changes, once both have produced a snapshot.
    ///
    /// The derived query owns both inputs and stops them when dropped.
    pub fn combine<A, B, M>(mut left: LiveQuery<A>, mut right: LiveQuery<B>, merge: M) -> Self
    where
        A: Clone + Send + Sync + 'static,
        B: Clone + Send + Sync + 'static,
        M: Fn(&A, &B) -> T + Send + 'static,
    {
        let (sender, receiver) = watch::channel(None);

        let task = tokio::spawn(async move {
            loop {
                let merged = {
                    let a = left.receiver.borrow_and_update();
                    let b = right.receiver.borrow_and_update();
                    match (a.as_ref(), b.as_ref()) {
                        (Some(a), Some(b)) => Some(merge(a, b)),
                        _ => None,
                    }
                };

                if let Some(value) = merged {
                    if sender.send(Some(value)).is_err() {
                        return;
                    }
                }

                tokio::select! {
                    changed = left.receiver.changed() => if changed.is_err() { return; },
                    changed = right.receiver.changed() => if changed.is_err() { return; },
                }
            }
        });

        Self {
            receiver,
            task: Some(task),
        }
    }

    /// Wrap an externally driven channel.
    #[cfg(test)]
    pub(crate) fn from_receiver(receiver: watch::Receiver<Option<T>>) -> Self {
        Self {
            receiver,
            task: None,
        }
    }

    /// Latest snapshot, if any.
    pub fn snapshot(&self) -> Option<T> {
        (*self.receiver.borrow()).clone()
    }

    /// Wait for the next snapshot. `None` once the query has stopped.
    pub async fn changed(&mut self) -> Option<T> {
        self.receiver.changed().await.ok()?;
        (*self.receiver.borrow_and_update()).clone()
    }

    /// Wait until a snapshot satisfies `predicate` (checks the current one first).
    pub async fn wait_for<P>(&mut self, mut predicate: P) -> Option<T>
    where
        P: FnMut(&T) -> bool,
    {
        let guard = self
            .receiver
            .wait_for(|value| value.as_ref().is_some_and(&mut predicate))
            .await
            .ok()?;
        (*guard).clone()
    }

    /// A receiver that observes the same snapshots.
    pub fn watch(&self) -> watch::Receiver<Option<T>> {
        self.receiver.clone()
    }

    /// Deliver every snapshot (the current one first) to `callback` until the
    /// returned [`Subscription`] is dropped.
    pub fn for_each<F>(mut self, mut callback: F) -> Subscription
    where
        F: FnMut(T) + Send + 'static,
    {
        let task = tokio::spawn(async move {
            loop {
                let current = (*self.receiver.borrow_and_update()).clone();
                if let Some(value) = current {
                    callback(value);
                }
                if self.receiver.changed().await.is_err() {
                    return;
                }
            }
        });
        Subscription { task }
    }

    /// Stop listening.
    pub fn unsubscribe(self) {}
}

/// Callback-style listener returned by [`LiveQuery::for_each`]. Dropping it stops delivery.
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Block until a relevant change arrives. Returns false when the feed is closed.
async fn next_relevant_change<R>(
    changes: &mut broadcast::Receiver<Change>,
    relevant: &R,
    label: &'static str,
) -> bool
where
    R: Fn(&Change) -> bool,
{
    loop {
        match changes.recv().await {
            Ok(change) if relevant(&change) => return true,
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(query = label, skipped, "Change feed lagged, refreshing");
                return true;
            }
            Err(RecvError::Closed) => return false,
        }
    }
}
