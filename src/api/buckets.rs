//! Bucket and membership endpoints.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{respond, ApiResult};
use crate::auth::{is_admin, CurrentUser};
use crate::errors::AppError;
use crate::models::{
    AddMembersRequest, Bucket, CreateBucketRequest, MemberRole, UpdateBucketRequest,
};
use crate::views::{filter_and_sort_buckets, BucketQuery, BucketSort, ProgressFilter};
use crate::AppState;

/// What a caller must be to act on a bucket. Admins pass either check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Access {
    Member,
    Owner,
}

/// Load a bucket and check the caller's access to it.
pub(super) async fn authorize_bucket(
    state: &AppState,
    bucket_id: &str,
    user_id: &str,
    access: Access,
) -> Result<Bucket, AppError> {
    let bucket = state
        .repo
        .get_bucket(bucket_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Bucket {} not found", bucket_id)))?;

    let allowed = match access {
        Access::Member => bucket.is_member(user_id),
        Access::Owner => bucket.is_owner(user_id),
    };
    if allowed || is_admin(&state.repo, user_id).await {
        return Ok(bucket);
    }

    Err(AppError::Forbidden(match access {
        Access::Member => "You are not a member of this bucket".to_string(),
        Access::Owner => "Only the bucket owner can do this".to_string(),
    }))
}

/// GET /api/buckets - Buckets the caller owns or is a member of.
pub async fn list_buckets(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<BucketQuery>,
) -> ApiResult<Vec<Bucket>> {
    let result = async {
        let buckets = state.repo.list_visible_buckets(&user_id).await?;
        if query == BucketQuery::default() {
            return Ok(buckets);
        }

        let mut goals = HashMap::new();
        if query.progress != ProgressFilter::All || query.sort == BucketSort::Progress {
            for bucket in &buckets {
                goals.insert(bucket.id.clone(), state.repo.list_goals(&bucket.id).await?);
            }
        }
        Ok::<_, AppError>(filter_and_sort_buckets(&buckets, &goals, &query))
    }
    .await;
    respond(&state.repo, result).await
}

/// POST /api/buckets - Create a bucket owned by the caller.
pub async fn create_bucket(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<CreateBucketRequest>,
) -> ApiResult<Bucket> {
    let result = state.repo.create_bucket(&user_id, &request).await;
    respond(&state.repo, result).await
}

/// GET /api/buckets/{id} - A single bucket.
pub async fn get_bucket(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Bucket> {
    let result = authorize_bucket(&state, &id, &user_id, Access::Member).await;
    respond(&state.repo, result).await
}

/// PUT /api/buckets/{id} - Edit bucket details.
pub async fn update_bucket(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateBucketRequest>,
) -> ApiResult<Bucket> {
    let result = async {
        authorize_bucket(&state, &id, &user_id, Access::Member).await?;
        state.repo.update_bucket(&id, &request).await
    }
    .await;
    respond(&state.repo, result).await
}

/// DELETE /api/buckets/{id} - Delete a bucket and its goals. Owner only.
pub async fn delete_bucket(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let result = async {
        authorize_bucket(&state, &id, &user_id, Access::Owner).await?;
        state.repo.delete_bucket(&id).await
    }
    .await;
    respond(&state.repo, result).await
}

/// GET /api/buckets/{id}/role - The caller's role; `null` without access.
pub async fn get_bucket_role(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Option<MemberRole>> {
    let role = state.repo.get_user_bucket_role(&id, &user_id).await;
    respond(&state.repo, Ok(role)).await
}

/// POST /api/buckets/{id}/members - Add members, skipping existing ones.
pub async fn add_bucket_members(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    Json(request): Json<AddMembersRequest>,
) -> ApiResult<Bucket> {
    let result = async {
        let bucket = authorize_bucket(&state, &id, &user_id, Access::Member).await?;
        if request.user_ids.is_empty() {
            return Ok(bucket);
        }
        state.repo.add_bucket_members(&id, &request.user_ids).await
    }
    .await;
    respond(&state.repo, result).await
}

/// DELETE /api/buckets/{id}/members/{userId} - Remove a member.
///
/// Members may remove themselves; removing someone else takes the owner.
pub async fn remove_bucket_member(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path((id, member_id)): Path<(String, String)>,
) -> ApiResult<Bucket> {
    let result = async {
        let access = if member_id == user_id {
            Access::Member
        } else {
            Access::Owner
        };
        authorize_bucket(&state, &id, &user_id, access).await?;
        state.repo.remove_bucket_member(&id, &member_id).await
    }
    .await;
    respond(&state.repo, result).await
}
