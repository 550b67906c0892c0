//! Admin dashboard endpoints. Every handler requires the admin capability.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{respond, ApiResult};
use crate::auth::{require_admin, CurrentUser};
use crate::errors::AppError;
use crate::models::{AdminStatusRequest, AppStats, Bucket, Goal, User};
use crate::AppState;

/// GET /api/admin/users - All users, newest first.
pub async fn admin_list_users(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Vec<User>> {
    let result = async {
        require_admin(&state.repo, &user_id).await?;
        state.repo.list_users().await
    }
    .await;
    respond(&state.repo, result).await
}

/// GET /api/admin/buckets - All buckets, newest first.
pub async fn admin_list_buckets(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Vec<Bucket>> {
    let result = async {
        require_admin(&state.repo, &user_id).await?;
        state.repo.list_buckets().await
    }
    .await;
    respond(&state.repo, result).await
}

/// GET /api/admin/buckets/{id}/goals - A bucket's goals, newest first.
pub async fn admin_bucket_goals(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(bucket_id): Path<String>,
) -> ApiResult<Vec<Goal>> {
    let result = async {
        require_admin(&state.repo, &user_id).await?;
        state.repo.list_goals_newest_first(&bucket_id).await
    }
    .await;
    respond(&state.repo, result).await
}

/// GET /api/admin/stats - Application-wide counters.
pub async fn admin_stats(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<AppStats> {
    let result = async {
        require_admin(&state.repo, &user_id).await?;
        state.repo.app_stats(state.config.active_window_days).await
    }
    .await;
    respond(&state.repo, result).await
}

/// DELETE /api/admin/buckets/{id} - Delete any bucket with its goals.
pub async fn admin_delete_bucket(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(bucket_id): Path<String>,
) -> ApiResult<()> {
    let result = async {
        require_admin(&state.repo, &user_id).await?;
        state.repo.delete_bucket(&bucket_id).await?;
        tracing::info!(admin = %user_id, bucket_id = %bucket_id, "Admin deleted bucket");
        Ok::<_, AppError>(())
    }
    .await;
    respond(&state.repo, result).await
}

/// PUT /api/admin/users/{id}/admin - Set the document admin flag.
pub async fn admin_set_user_admin(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(target_id): Path<String>,
    Json(request): Json<AdminStatusRequest>,
) -> ApiResult<User> {
    let result = async {
        require_admin(&state.repo, &user_id).await?;
        state
            .repo
            .set_user_admin_flag(&target_id, request.is_admin)
            .await
    }
    .await;
    respond(&state.repo, result).await
}
