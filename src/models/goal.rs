//! Goal model and the partial-update rules applied to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{double_option, non_blank, parse_local_date, validate_categories};
use crate::errors::AppError;

/// How completion memory (photos, journal, completion time) is treated when a
/// goal ends up incomplete after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMemoryPolicy {
    /// Write exactly what the caller sent; stale memory may remain.
    #[default]
    Preserve,
    /// Drop completion memory whenever the goal is not completed.
    ClearWhenIncomplete,
}

impl CompletionMemoryPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionMemoryPolicy::Preserve => "preserve",
            CompletionMemoryPolicy::ClearWhenIncomplete => "clear",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preserve" => Some(CompletionMemoryPolicy::Preserve),
            "clear" => Some(CompletionMemoryPolicy::ClearWhenIncomplete),
            _ => None,
        }
    }
}

/// A single trackable item inside a bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub bucket_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub completion_photos: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_journal: Option<String>,
    /// Internal version for optimistic concurrency control
    #[serde(default)]
    pub version: i64,
}

impl Goal {
    pub fn has_category(&self, category_id: &str) -> bool {
        self.categories.iter().any(|c| c == category_id)
    }

    pub fn first_category(&self) -> Option<&str> {
        self.categories.first().map(String::as_str)
    }
}

/// Validated input for a new goal.
#[derive(Debug, Clone)]
pub struct NewGoal {
    pub title: String,
    pub created_by: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub categories: Vec<String>,
}

/// A typed partial update. `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub completed: Option<bool>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub is_favorite: Option<bool>,
    pub order: Option<i64>,
    pub completion_photos: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub memory_journal: Option<Option<String>>,
}

impl GoalChanges {
    /// Changes that mark a goal complete or incomplete.
    ///
    /// Un-completing also clears photos and journal.
    pub fn toggle_completion(completed: bool) -> Self {
        if completed {
            GoalChanges {
                completed: Some(true),
                ..Default::default()
            }
        } else {
            GoalChanges {
                completed: Some(false),
                completion_photos: Some(Vec::new()),
                memory_journal: Some(None),
                ..Default::default()
            }
        }
    }

    pub fn favorite(is_favorite: bool) -> Self {
        GoalChanges {
            is_favorite: Some(is_favorite),
            ..Default::default()
        }
    }

    /// Produce the goal as it looks after these changes.
    ///
    /// Setting `completed` without `completed_at` stamps `now` on completion
    /// and clears the stamp on un-completion. An explicit `completed_at` wins.
    pub fn apply(&self, existing: &Goal, policy: CompletionMemoryPolicy, now: DateTime<Utc>) -> Goal {
        let mut goal = existing.clone();

        if let Some(title) = &self.title {
            goal.title = title.clone();
        }
        if let Some(description) = &self.description {
            goal.description = non_blank(description.clone());
        }
        if let Some(completed) = self.completed {
            goal.completed = completed;
            if self.completed_at.is_none() {
                goal.completed_at = completed.then_some(now);
            }
        }
        if let Some(completed_at) = self.completed_at {
            goal.completed_at = completed_at;
        }
        if let Some(due_date) = self.due_date {
            goal.due_date = due_date;
        }
        if let Some(is_favorite) = self.is_favorite {
            goal.is_favorite = is_favorite;
        }
        if let Some(order) = self.order {
            goal.order = order;
        }
        if let Some(photos) = &self.completion_photos {
            goal.completion_photos = photos.clone();
        }
        if let Some(categories) = &self.categories {
            goal.categories = categories.clone();
        }
        if let Some(journal) = &self.memory_journal {
            goal.memory_journal = non_blank(journal.clone());
        }

        if policy == CompletionMemoryPolicy::ClearWhenIncomplete && !goal.completed {
            goal.completed_at = None;
            goal.completion_photos.clear();
            goal.memory_journal = None;
        }

        goal
    }
}

/// Request body for creating a goal. Dates are `YYYY-MM-DD`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGoalRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl CreateGoalRequest {
    pub fn into_new_goal(self, created_by: &str) -> Result<NewGoal, AppError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::Validation("Please enter a goal title".to_string()));
        }
        validate_categories(&self.categories)?;

        let due_date = match non_blank(self.due_date) {
            Some(raw) => Some(parse_local_date(&raw, "due date")?),
            None => None,
        };
        let completed_at = match non_blank(self.completed_at) {
            Some(raw) if self.completed => Some(parse_local_date(&raw, "completion date")?),
            _ => None,
        };

        Ok(NewGoal {
            title,
            created_by: created_by.to_string(),
            description: non_blank(self.description),
            due_date,
            completed: self.completed,
            completed_at,
            categories: self.categories,
        })
    }
}

/// Request body for editing a goal. `null` clears nullable fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGoalRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub completed_at: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<String>>,
    #[serde(default)]
    pub is_favorite: Option<bool>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub completion_photos: Option<Vec<String>>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub memory_journal: Option<Option<String>>,
    /// Expected version for optimistic concurrency control
    #[serde(default)]
    pub expected_version: Option<i64>,
}

impl UpdateGoalRequest {
    pub fn into_changes(self) -> Result<GoalChanges, AppError> {
        let title = match self.title {
            Some(title) if title.trim().is_empty() => {
                return Err(AppError::Validation("Please enter a goal title".to_string()))
            }
            Some(title) => Some(title.trim().to_string()),
            None => None,
        };
        if let Some(categories) = &self.categories {
            validate_categories(categories)?;
        }

        Ok(GoalChanges {
            title,
            description: self.description,
            completed: self.completed,
            completed_at: parse_optional_date(self.completed_at, "completion date")?,
            due_date: parse_optional_date(self.due_date, "due date")?,
            is_favorite: self.is_favorite,
            order: self.order,
            completion_photos: self.completion_photos,
            categories: self.categories,
            memory_journal: self.memory_journal,
        })
    }
}

fn parse_optional_date(
    value: Option<Option<String>>,
    label: &str,
) -> Result<Option<Option<DateTime<Utc>>>, AppError> {
    match value {
        None => Ok(None),
        Some(raw) => match non_blank(raw) {
            Some(raw) => Ok(Some(Some(parse_local_date(&raw, label)?))),
            None => Ok(Some(None)),
        },
    }
}

/// Request body for completing a goal with its memory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteGoalRequest {
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub journal: Option<String>,
}

impl CompleteGoalRequest {
    /// New photos are appended to the ones already attached.
    pub fn into_changes(self, existing: &Goal) -> Result<GoalChanges, AppError> {
        let completed_at = match non_blank(self.completed_at) {
            Some(raw) => Some(Some(parse_local_date(&raw, "date")?)),
            None => None,
        };
        let mut photos = existing.completion_photos.clone();
        photos.extend(self.photos);

        Ok(GoalChanges {
            completed: Some(true),
            completed_at,
            completion_photos: Some(photos),
            memory_journal: Some(non_blank(self.journal)),
            ..Default::default()
        })
    }
}

/// Request body for toggling completion.
#[derive(Debug, Clone, Deserialize)]
pub struct ToggleCompletionRequest {
    pub completed: bool,
}

/// Request body for toggling favorite.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleFavoriteRequest {
    pub is_favorite: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn completed_goal() -> Goal {
        Goal {
            id: "g1".to_string(),
            bucket_id: "b1".to_string(),
            title: "See the aurora".to_string(),
            description: Some("Tromsø in winter".to_string()),
            completed: true,
            completed_at: Some(ts(50)),
            created_at: ts(10),
            created_by: "alice".to_string(),
            due_date: None,
            is_favorite: false,
            order: 0,
            completion_photos: vec!["data:image/jpeg;base64,AAA".to_string()],
            categories: vec!["travel".to_string()],
            memory_journal: Some("Green skies".to_string()),
            version: 1,
        }
    }

    #[test]
    fn completing_stamps_now_unless_explicit() {
        let mut goal = completed_goal();
        goal.completed = false;
        goal.completed_at = None;

        let changes = GoalChanges {
            completed: Some(true),
            ..Default::default()
        };
        let applied = changes.apply(&goal, CompletionMemoryPolicy::Preserve, ts(99));
        assert_eq!(applied.completed_at, Some(ts(99)));

        let explicit = GoalChanges {
            completed: Some(true),
            completed_at: Some(Some(ts(70))),
            ..Default::default()
        };
        let applied = explicit.apply(&goal, CompletionMemoryPolicy::Preserve, ts(99));
        assert_eq!(applied.completed_at, Some(ts(70)));
    }

    #[test]
    fn toggle_off_clears_memory() {
        let applied = GoalChanges::toggle_completion(false).apply(
            &completed_goal(),
            CompletionMemoryPolicy::ClearWhenIncomplete,
            ts(99),
        );
        assert!(!applied.completed);
        assert!(applied.completed_at.is_none());
        assert!(applied.completion_photos.is_empty());
        assert!(applied.memory_journal.is_none());
    }

    #[test]
    fn preserve_policy_keeps_memory_on_incomplete_edit() {
        let mut goal = completed_goal();
        goal.completed = false;
        goal.completed_at = None;

        let edit = GoalChanges {
            title: Some("See the aurora twice".to_string()),
            ..Default::default()
        };
        let kept = edit.apply(&goal, CompletionMemoryPolicy::Preserve, ts(99));
        assert_eq!(kept.completion_photos.len(), 1);
        assert_eq!(kept.memory_journal.as_deref(), Some("Green skies"));

        let cleared = edit.apply(&goal, CompletionMemoryPolicy::ClearWhenIncomplete, ts(99));
        assert!(cleared.completion_photos.is_empty());
        assert!(cleared.memory_journal.is_none());
        assert_eq!(cleared.title, "See the aurora twice");
    }

    #[test]
    fn explicit_null_and_blank_clear_optional_fields() {
        let request: UpdateGoalRequest =
            serde_json::from_str(r#"{"description": "", "dueDate": null, "memoryJournal": null}"#)
                .unwrap();
        let changes = request.into_changes().unwrap();
        assert_eq!(changes.due_date, Some(None));

        let applied = changes.apply(&completed_goal(), CompletionMemoryPolicy::Preserve, ts(99));
        assert!(applied.description.is_none());
        assert!(applied.memory_journal.is_none());
        assert_eq!(applied.title, "See the aurora");
    }

    #[test]
    fn update_request_validation() {
        let blank_title = UpdateGoalRequest {
            title: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(blank_title.into_changes().is_err());

        let bad_date = UpdateGoalRequest {
            due_date: Some(Some("next week".to_string())),
            ..Default::default()
        };
        assert_eq!(
            bad_date.into_changes().unwrap_err().message(),
            "Please enter a valid due date (YYYY-MM-DD)"
        );

        let bad_category = UpdateGoalRequest {
            categories: Some(vec!["skydiving".to_string()]),
            ..Default::default()
        };
        assert!(bad_category.into_changes().is_err());
    }

    #[test]
    fn create_request_drops_completed_at_for_incomplete_goal() {
        let request = CreateGoalRequest {
            title: "  Learn piano ".to_string(),
            description: Some(" ".to_string()),
            due_date: Some("2026-01-31".to_string()),
            completed: false,
            completed_at: Some("2025-12-01".to_string()),
            categories: vec!["music".to_string()],
        };
        let new_goal = request.into_new_goal("alice").unwrap();
        assert_eq!(new_goal.title, "Learn piano");
        assert!(new_goal.description.is_none());
        assert!(new_goal.due_date.is_some());
        assert!(new_goal.completed_at.is_none());
    }

    #[test]
    fn completion_appends_photos() {
        let request = CompleteGoalRequest {
            completed_at: Some("2025-06-01".to_string()),
            photos: vec!["data:image/jpeg;base64,BBB".to_string()],
            journal: Some("  again  ".to_string()),
        };
        let changes = request.into_changes(&completed_goal()).unwrap();
        let applied = changes.apply(&completed_goal(), CompletionMemoryPolicy::Preserve, ts(99));
        assert_eq!(applied.completion_photos.len(), 2);
        assert_eq!(applied.memory_journal.as_deref(), Some("again"));
        assert_eq!(
            applied.completed_at,
            Some(parse_local_date("2025-06-01", "date").unwrap())
        );
    }

    #[test]
    fn policy_parsing() {
        assert_eq!(
            CompletionMemoryPolicy::from_str("Clear"),
            Some(CompletionMemoryPolicy::ClearWhenIncomplete)
        );
        assert_eq!(CompletionMemoryPolicy::Preserve.as_str(), "preserve");
        assert_eq!(CompletionMemoryPolicy::from_str("sometimes"), None);
    }
}
