//! Sign-in and user profile endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{respond, ApiResult};
use crate::auth::{is_admin, CurrentUser};
use crate::errors::AppError;
use crate::models::{AuthIdentity, UpdateUserRequest, User};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailParams {
    pub email: String,
}

/// POST /api/auth/sign-in - Create or refresh the profile of an authenticated identity.
///
/// Never fails on storage errors: a profile built from the identity is returned instead.
pub async fn sign_in(
    State(state): State<AppState>,
    Json(identity): Json<AuthIdentity>,
) -> ApiResult<User> {
    if identity.uid.trim().is_empty() {
        return respond(
            &state.repo,
            Err(AppError::Validation("Missing user id".to_string())),
        )
        .await;
    }

    let user = match state.repo.upsert_user_profile(&identity).await {
        Ok(mut user) => {
            user.is_admin = is_admin(&state.repo, &user.id).await;
            user
        }
        Err(e) => {
            tracing::warn!(uid = %identity.uid, "Profile sync failed, using fallback user: {}", e);
            identity.fallback_user()
        }
    };
    respond(&state.repo, Ok(user)).await
}

/// GET /api/users/me - The caller's profile.
pub async fn get_current_user(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<User> {
    let result = load_user(&state, &user_id).await;
    respond(&state.repo, result).await
}

/// GET /api/users/search?q= - Find other users by e-mail or display name.
pub async fn search_users(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(params): Query<SearchParams>,
) -> ApiResult<Vec<User>> {
    let result = state.repo.search_users(&params.q, &user_id).await;
    respond(&state.repo, result).await
}

/// GET /api/users/by-email?email= - Look a user up by e-mail; `null` when unknown.
pub async fn get_user_by_email(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Query(params): Query<EmailParams>,
) -> ApiResult<Option<User>> {
    let result = state.repo.get_user_by_email(&params.email).await;
    respond(&state.repo, result).await
}

/// GET /api/users/{id} - A user's profile.
pub async fn get_user_profile(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<User> {
    let result = load_user(&state, &id).await;
    respond(&state.repo, result).await
}

/// PUT /api/users/{id} - Edit a profile. Owner or admin only.
pub async fn update_user_profile(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> ApiResult<User> {
    let result = async {
        if user_id != id && !is_admin(&state.repo, &user_id).await {
            return Err(AppError::Forbidden(
                "You can only edit your own profile".to_string(),
            ));
        }
        state.repo.update_user_profile(&id, &request).await
    }
    .await;
    respond(&state.repo, result).await
}

async fn load_user(state: &AppState, id: &str) -> Result<User, AppError> {
    state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
}
