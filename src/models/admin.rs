//! Admin dashboard models.

use serde::Serialize;

/// Application-wide counters shown on the admin dashboard.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppStats {
    pub total_users: i64,
    pub total_buckets: i64,
    pub total_goals: i64,
    pub completed_goals: i64,
    /// Distinct owners of buckets created inside the active window
    pub active_users: i64,
}
