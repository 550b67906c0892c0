//! Goal category catalog.

use axum::extract::State;

use super::{respond, ApiResult};
use crate::models::{GoalCategory, GOAL_CATEGORIES};
use crate::AppState;

/// GET /api/categories - The fixed category catalog.
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Vec<GoalCategory>> {
    respond(&state.repo, Ok(GOAL_CATEGORIES.to_vec())).await
}
