use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{cmp_case_insensitive, contains_term, normalize_term};
use crate::models::Goal;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl StatusFilter {
    fn matches(&self, goal: &Goal) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => !goal.completed,
            StatusFilter::Completed => goal.completed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GoalSort {
    #[default]
    Date,
    Favorites,
    DueDate,
    Title,
    Category,
}

/// Goal list query, also accepted as URL query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoalQuery {
    pub search: Option<String>,
    pub status: StatusFilter,
    pub category: Option<String>,
    pub sort: GoalSort,
}

/// Apply search, status and category filters, then sort.
pub fn filter_and_sort_goals(goals: &[Goal], query: &GoalQuery) -> Vec<Goal> {
    let term = normalize_term(query.search.as_deref());
    let category = query.category.as_deref().filter(|c| !c.is_empty());

    let mut filtered: Vec<Goal> = goals
        .iter()
        .filter(|goal| match &term {
            Some(term) => {
                contains_term(Some(&goal.title), term)
                    || contains_term(goal.description.as_deref(), term)
            }
            None => true,
        })
        .filter(|goal| query.status.matches(goal))
        .filter(|goal| category.map_or(true, |c| goal.has_category(c)))
        .cloned()
        .collect();

    match query.sort {
        GoalSort::Date => filtered.sort_by(cmp_by_date),
        GoalSort::Favorites => filtered.sort_by(|a, b| {
            b.is_favorite
                .cmp(&a.is_favorite)
                .then(a.created_at.cmp(&b.created_at))
        }),
        GoalSort::DueDate => filtered.sort_by(|a, b| cmp_missing_last(a.due_date, b.due_date)),
        GoalSort::Title => filtered.sort_by(|a, b| cmp_case_insensitive(&a.title, &b.title)),
        GoalSort::Category => filtered.sort_by(|a, b| {
            cmp_missing_last(a.first_category(), b.first_category())
                .then(a.created_at.cmp(&b.created_at))
        }),
    }
    filtered
}

/// Incomplete first, newest created first; then completed, most recent first.
fn cmp_by_date(a: &Goal, b: &Goal) -> Ordering {
    match (a.completed, b.completed) {
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (false, false) => b.created_at.cmp(&a.created_at),
        (true, true) => completed_or_epoch(b).cmp(&completed_or_epoch(a)),
    }
}

fn completed_or_epoch(goal: &Goal) -> DateTime<Utc> {
    goal.completed_at.unwrap_or(DateTime::UNIX_EPOCH)
}

fn cmp_missing_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
