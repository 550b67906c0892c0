//! Fixed catalog of goal categories.

use serde::Serialize;

use crate::errors::AppError;

/// A goal category with its display attributes.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct GoalCategory {
    pub id: &'static str,
    pub name: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
}

const fn category(
    id: &'static str,
    name: &'static str,
    color: &'static str,
    icon: &'static str,
) -> GoalCategory {
    GoalCategory {
        id,
        name,
        color,
        icon,
    }
}

pub const GOAL_CATEGORIES: [GoalCategory; 16] = [
    category("adventure", "Adventure", "#FF9500", "🏔️"),
    category("career", "Career", "#5856D6", "💼"),
    category("creative", "Creative", "#FF2D55", "🎨"),
    category("education", "Education", "#007AFF", "📚"),
    category("family", "Family", "#FF3B30", "👨‍👩‍👧‍👦"),
    category("fitness", "Fitness", "#34C759", "💪"),
    category("food", "Food & Drink", "#FF9500", "🍽️"),
    category("health", "Health", "#00C7BE", "🏥"),
    category("hobby", "Hobby", "#AF52DE", "🎮"),
    category("mindfulness", "Mindfulness", "#5856D6", "🧘"),
    category("music", "Music", "#FF2D55", "🎵"),
    category("personal", "Personal", "#8E8E93", "✨"),
    category("relationship", "Relationship", "#FF3B30", "❤️"),
    category("social", "Social", "#007AFF", "👥"),
    category("sports", "Sports", "#34C759", "⚽"),
    category("travel", "Travel", "#00C7BE", "✈️"),
];

pub fn find_category(id: &str) -> Option<&'static GoalCategory> {
    GOAL_CATEGORIES.iter().find(|c| c.id == id)
}

/// Every id must name a catalog entry.
pub fn validate_categories(ids: &[String]) -> Result<(), AppError> {
    match ids.iter().find(|id| find_category(id).is_none()) {
        Some(unknown) => Err(AppError::Validation(format!(
            "Unknown goal category: {}",
            unknown
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_are_sorted_and_unique() {
        let ids: Vec<_> = GOAL_CATEGORIES.iter().map(|c| c.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn validation() {
        assert!(validate_categories(&["travel".to_string(), "food".to_string()]).is_ok());
        let err = validate_categories(&["travel".to_string(), "cooking".to_string()]).unwrap_err();
        assert_eq!(err.message(), "Unknown goal category: cooking");
        assert_eq!(find_category("food").map(|c| c.name), Some("Food & Drink"));
    }
}
