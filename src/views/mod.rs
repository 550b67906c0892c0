//! Filtering, searching and sorting of in-memory goal and bucket lists.
//!
//! Everything here is pure and synchronous. All sorts are stable, so equal
//! keys keep the order the list arrived in.

mod buckets;
mod goals;

pub use buckets::{filter_and_sort_buckets, BucketQuery, BucketSort, ProgressFilter};
pub use goals::{filter_and_sort_goals, GoalQuery, GoalSort, StatusFilter};

/// Trimmed, lowercased search term; `None` when blank.
fn normalize_term(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase)
}

fn contains_term(haystack: Option<&str>, term: &str) -> bool {
    haystack.is_some_and(|text| text.to_lowercase().contains(term))
}

/// Case-insensitive ordering with the exact string as tiebreak.
fn cmp_case_insensitive(a: &str, b: &str) -> std::cmp::Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}
