//! Server-sent event streams over live queries.
//!
//! Each connection owns its live query; it is torn down when the client
//! disconnects and the stream is dropped.

use std::convert::Infallible;
use std::pin::Pin;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, KeepAliveStream, Sse},
};
use serde::Serialize;
use tokio_stream::{wrappers::WatchStream, Stream, StreamExt};

use super::buckets::{authorize_bucket, Access};
use crate::auth::CurrentUser;
use crate::errors::AppErrorWithRevision;
use crate::live::{subscribe_to_bucket_goals, subscribe_to_user_buckets, LiveQuery};
use crate::AppState;

type SnapshotStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

type EventStream = Sse<KeepAliveStream<SnapshotStream>>;

/// GET /api/live/buckets - Stream of the caller's visible buckets.
pub async fn live_buckets(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> EventStream {
    tracing::debug!(user_id = %user_id, "Opening live bucket stream");
    let live = subscribe_to_user_buckets(state.repo.clone(), &user_id);
    snapshot_events(live, "buckets")
}

/// GET /api/live/buckets/{id}/goals - Stream of one bucket's goals.
pub async fn live_bucket_goals(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(bucket_id): Path<String>,
) -> Result<EventStream, AppErrorWithRevision> {
    if let Err(e) = authorize_bucket(&state, &bucket_id, &user_id, Access::Member).await {
        let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
        return Err(AppErrorWithRevision {
            error: e,
            revision_id,
        });
    }

    let live = subscribe_to_bucket_goals(state.repo.clone(), &bucket_id);
    Ok(snapshot_events(live, "goals"))
}

/// Emit every snapshot of `live` as a JSON event named `event`.
fn snapshot_events<T>(live: LiveQuery<T>, event: &'static str) -> EventStream
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    let snapshots = WatchStream::new(live.watch());
    let stream = snapshots.filter_map(move |snapshot| {
        // The stream keeps the query alive.
        let _query = &live;
        let snapshot = snapshot?;
        match Event::default().event(event).json_data(&snapshot) {
            Ok(message) => Some(Ok(message)),
            Err(e) => {
                tracing::warn!("Failed to encode live {} snapshot: {}", event, e);
                None
            }
        }
    });
    let stream: SnapshotStream = Box::pin(stream);
    Sse::new(stream).keep_alive(KeepAlive::default())
}
