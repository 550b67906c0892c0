//! Friend request and friend list endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{respond, ApiResult};
use crate::auth::CurrentUser;
use crate::models::{FriendRequest, SendFriendRequest, User};
use crate::AppState;

/// GET /api/friends/requests - Requests the caller sent or received.
pub async fn list_friend_requests(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Vec<FriendRequest>> {
    let result = state.repo.list_user_friend_requests(&user_id).await;
    respond(&state.repo, result).await
}

/// POST /api/friends/requests - Send a request from the caller.
pub async fn send_friend_request(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<SendFriendRequest>,
) -> ApiResult<FriendRequest> {
    let result = state
        .repo
        .send_friend_request(&user_id, &request.to_user_id)
        .await;
    respond(&state.repo, result).await
}

/// POST /api/friends/requests/{id}/accept - Accept a request addressed to the caller.
pub async fn accept_friend_request(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<FriendRequest> {
    let result = state.repo.accept_friend_request(&id, &user_id).await;
    respond(&state.repo, result).await
}

/// DELETE /api/friends/requests/{id} - Reject or withdraw a request.
pub async fn reject_friend_request(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let result = state.repo.reject_friend_request(&id, &user_id).await;
    respond(&state.repo, result).await
}

/// GET /api/friends - Profiles of the caller's friends.
pub async fn list_friends(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Vec<User>> {
    let result = state.repo.get_user_friends(&user_id).await;
    respond(&state.repo, result).await
}

/// DELETE /api/friends/{friendId} - End a friendship.
pub async fn remove_friend(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(friend_id): Path<String>,
) -> ApiResult<()> {
    let result = state.repo.remove_friend(&user_id, &friend_id).await;
    respond(&state.repo, result).await
}
