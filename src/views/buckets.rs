use std::collections::HashMap;

use serde::Deserialize;

use super::{cmp_case_insensitive, contains_term, normalize_term};
use crate::models::{Bucket, BucketType, Goal};
use crate::store::BucketProgress;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProgressFilter {
    #[default]
    All,
    InProgress,
    Completed,
}

impl ProgressFilter {
    fn matches(&self, progress: BucketProgress) -> bool {
        match self {
            ProgressFilter::All => true,
            ProgressFilter::InProgress => {
                progress.total > 0 && progress.completed < progress.total
            }
            ProgressFilter::Completed => {
                progress.total > 0 && progress.completed == progress.total
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BucketSort {
    #[default]
    Date,
    Name,
    Progress,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BucketQuery {
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub bucket_type: Option<BucketType>,
    pub progress: ProgressFilter,
    pub sort: BucketSort,
}

/// Filter and sort buckets, reading progress from `goals` (bucket id to goals).
pub fn filter_and_sort_buckets(
    buckets: &[Bucket],
    goals: &HashMap<String, Vec<Goal>>,
    query: &BucketQuery,
) -> Vec<Bucket> {
    let term = normalize_term(query.search.as_deref());
    let progress_of = |bucket: &Bucket| {
        goals
            .get(&bucket.id)
            .map(|g| BucketProgress::from_goals(g))
            .unwrap_or_default()
    };

    let mut filtered: Vec<Bucket> = buckets
        .iter()
        .filter(|bucket| match &term {
            Some(term) => {
                contains_term(Some(&bucket.name), term)
                    || contains_term(bucket.description.as_deref(), term)
            }
            None => true,
        })
        .filter(|bucket| query.bucket_type.map_or(true, |t| bucket.bucket_type == t))
        .filter(|bucket| query.progress.matches(progress_of(bucket)))
        .cloned()
        .collect();

    match query.sort {
        BucketSort::Date => filtered.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        BucketSort::Name => filtered.sort_by(|a, b| cmp_case_insensitive(&a.name, &b.name)),
        BucketSort::Progress => filtered.sort_by(|a, b| {
            progress_of(b)
                .ratio()
                .total_cmp(&progress_of(a).ratio())
        }),
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::initial_members;
    use chrono::{TimeZone, Utc};

    fn bucket(id: &str, name: &str, bucket_type: BucketType, created: i64) -> Bucket {
        let created_at = Utc.timestamp_opt(created, 0).unwrap();
        Bucket {
            id: id.to_string(),
            name: name.to_string(),
            bucket_type,
            owner_id: "u".to_string(),
            created_at,
            members: initial_members("u", &[], created_at),
            description: None,
            theme: None,
            cover_image: None,
            version: 1,
        }
    }

    fn goals(done: usize, open: usize) -> Vec<Goal> {
        let created_at = Utc.timestamp_opt(0, 0).unwrap();
        (0..done + open)
            .map(|i| Goal {
                id: format!("g{i}"),
                bucket_id: String::new(),
                title: format!("Goal {i}"),
                description: None,
                completed: i < done,
                completed_at: None,
                created_at,
                created_by: "u".to_string(),
                due_date: None,
                is_favorite: false,
                order: i as i64,
                completion_photos: Vec::new(),
                categories: Vec::new(),
                memory_journal: None,
                version: 1,
            })
            .collect()
    }

    fn fixture() -> (Vec<Bucket>, HashMap<String, Vec<Goal>>) {
        let mut trips = bucket("trips", "Trips", BucketType::Duo, 1);
        trips.description = Some("Weekends away".to_string());
        let buckets = vec![
            trips,
            bucket("skills", "skills", BucketType::Solo, 3),
            bucket("empty", "Empty", BucketType::Group, 2),
        ];
        let mut goal_map = HashMap::new();
        goal_map.insert("trips".to_string(), goals(2, 2));
        goal_map.insert("skills".to_string(), goals(3, 0));
        (buckets, goal_map)
    }

    fn ids(buckets: &[Bucket]) -> Vec<&str> {
        buckets.iter().map(|b| b.id.as_str()).collect()
    }

    #[test]
    fn default_sort_is_newest_first() {
        let (buckets, goal_map) = fixture();
        let result = filter_and_sort_buckets(&buckets, &goal_map, &BucketQuery::default());
        assert_eq!(ids(&result), vec!["skills", "empty", "trips"]);
    }

    #[test]
    fn progress_filters_ignore_empty_buckets() {
        let (buckets, goal_map) = fixture();
        let query = |progress| BucketQuery {
            progress,
            ..Default::default()
        };
        assert_eq!(
            ids(&filter_and_sort_buckets(&buckets, &goal_map, &query(ProgressFilter::Completed))),
            vec!["skills"]
        );
        assert_eq!(
            ids(&filter_and_sort_buckets(&buckets, &goal_map, &query(ProgressFilter::InProgress))),
            vec!["trips"]
        );
    }

    #[test]
    fn sorts_by_name_and_progress() {
        let (buckets, goal_map) = fixture();
        let by_name = BucketQuery {
            sort: BucketSort::Name,
            ..Default::default()
        };
        assert_eq!(
            ids(&filter_and_sort_buckets(&buckets, &goal_map, &by_name)),
            vec!["empty", "skills", "trips"]
        );

        let by_progress = BucketQuery {
            sort: BucketSort::Progress,
            ..Default::default()
        };
        assert_eq!(
            ids(&filter_and_sort_buckets(&buckets, &goal_map, &by_progress)),
            vec!["skills", "trips", "empty"]
        );
    }

    #[test]
    fn search_and_type_filter() {
        let (buckets, goal_map) = fixture();
        let query = BucketQuery {
            search: Some("WEEKEND".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_and_sort_buckets(&buckets, &goal_map, &query)), vec!["trips"]);

        let query: BucketQuery = serde_json::from_str(r#"{"type": "solo"}"#).unwrap();
        assert_eq!(ids(&filter_and_sort_buckets(&buckets, &goal_map, &query)), vec!["skills"]);
    }
}
