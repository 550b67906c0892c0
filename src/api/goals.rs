//! Goal endpoints, nested under their bucket.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::buckets::{authorize_bucket, Access};
use super::{respond, ApiResult};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::{
    CompleteGoalRequest, CreateGoalRequest, Goal, ToggleCompletionRequest, ToggleFavoriteRequest,
    UpdateGoalRequest,
};
use crate::views::{filter_and_sort_goals, GoalQuery, GoalSort, StatusFilter};
use crate::AppState;

/// Optional list parameters. Without any, goals come back in position order.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoalListParams {
    pub search: Option<String>,
    pub status: Option<StatusFilter>,
    pub category: Option<String>,
    pub sort: Option<GoalSort>,
}

impl GoalListParams {
    fn into_query(self) -> Option<GoalQuery> {
        if self.search.is_none()
            && self.status.is_none()
            && self.category.is_none()
            && self.sort.is_none()
        {
            return None;
        }
        Some(GoalQuery {
            search: self.search,
            status: self.status.unwrap_or_default(),
            category: self.category,
            sort: self.sort.unwrap_or_default(),
        })
    }
}

/// GET /api/buckets/{id}/goals - Goals of a bucket, optionally filtered and sorted.
pub async fn list_goals(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(bucket_id): Path<String>,
    Query(params): Query<GoalListParams>,
) -> ApiResult<Vec<Goal>> {
    let result = async {
        authorize_bucket(&state, &bucket_id, &user_id, Access::Member).await?;
        let goals = state.repo.list_goals(&bucket_id).await?;
        Ok::<_, AppError>(match params.into_query() {
            Some(query) => filter_and_sort_goals(&goals, &query),
            None => goals,
        })
    }
    .await;
    respond(&state.repo, result).await
}

/// POST /api/buckets/{id}/goals - Add a goal at the end of the bucket.
pub async fn create_goal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(bucket_id): Path<String>,
    Json(request): Json<CreateGoalRequest>,
) -> ApiResult<Goal> {
    let result = async {
        authorize_bucket(&state, &bucket_id, &user_id, Access::Member).await?;
        let new_goal = request.into_new_goal(&user_id)?;
        state.repo.create_goal(&bucket_id, &new_goal).await
    }
    .await;
    respond(&state.repo, result).await
}

/// PUT /api/buckets/{id}/goals/{goalId} - Partial goal update.
pub async fn update_goal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path((bucket_id, goal_id)): Path<(String, String)>,
    Json(request): Json<UpdateGoalRequest>,
) -> ApiResult<Goal> {
    let result = async {
        authorize_bucket(&state, &bucket_id, &user_id, Access::Member).await?;
        let expected_version = request.expected_version;
        let changes = request.into_changes()?;
        state
            .repo
            .update_goal(
                &bucket_id,
                &goal_id,
                &changes,
                state.config.completion_memory,
                expected_version,
            )
            .await
    }
    .await;
    respond(&state.repo, result).await
}

/// DELETE /api/buckets/{id}/goals/{goalId}
pub async fn delete_goal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path((bucket_id, goal_id)): Path<(String, String)>,
) -> ApiResult<()> {
    let result = async {
        authorize_bucket(&state, &bucket_id, &user_id, Access::Member).await?;
        state.repo.delete_goal(&bucket_id, &goal_id).await
    }
    .await;
    respond(&state.repo, result).await
}

/// POST /api/buckets/{id}/goals/{goalId}/complete - Complete with photos and journal.
pub async fn complete_goal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path((bucket_id, goal_id)): Path<(String, String)>,
    Json(request): Json<CompleteGoalRequest>,
) -> ApiResult<Goal> {
    let result = async {
        authorize_bucket(&state, &bucket_id, &user_id, Access::Member).await?;
        state.repo.complete_goal(&bucket_id, &goal_id, request).await
    }
    .await;
    respond(&state.repo, result).await
}

/// POST /api/buckets/{id}/goals/{goalId}/toggle
pub async fn toggle_goal_completion(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path((bucket_id, goal_id)): Path<(String, String)>,
    Json(request): Json<ToggleCompletionRequest>,
) -> ApiResult<Goal> {
    let result = async {
        authorize_bucket(&state, &bucket_id, &user_id, Access::Member).await?;
        state
            .repo
            .toggle_goal_completion(&bucket_id, &goal_id, request.completed)
            .await
    }
    .await;
    respond(&state.repo, result).await
}

/// POST /api/buckets/{id}/goals/{goalId}/favorite
pub async fn toggle_goal_favorite(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path((bucket_id, goal_id)): Path<(String, String)>,
    Json(request): Json<ToggleFavoriteRequest>,
) -> ApiResult<Goal> {
    let result = async {
        authorize_bucket(&state, &bucket_id, &user_id, Access::Member).await?;
        state
            .repo
            .toggle_goal_favorite(&bucket_id, &goal_id, request.is_favorite)
            .await
    }
    .await;
    respond(&state.repo, result).await
}
