//! REST API module.
//!
//! Handlers resolve the caller, authorize, delegate to the repository and
//! wrap the outcome in the response envelope with the current revision.

mod admin;
mod buckets;
mod categories;
mod friends;
mod goals;
mod live;
mod users;

pub use admin::*;
pub use buckets::*;
pub use categories::*;
pub use friends::*;
pub use goals::*;
pub use live::*;
pub use users::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::db::Repository;
use crate::errors::{AppError, AppErrorWithRevision};

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub revision_id: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, revision_id: i64) -> Self {
        Self {
            success: true,
            data,
            revision_id,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppErrorWithRevision>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, revision_id: i64) -> ApiResult<T> {
    Ok(ApiResponse::new(data, revision_id))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: AppError, revision_id: i64) -> ApiResult<T> {
    Err(AppErrorWithRevision {
        error: err,
        revision_id,
    })
}

/// Envelope an operation's outcome, stamped with the revision after it ran.
pub async fn respond<T: Serialize>(repo: &Repository, result: Result<T, AppError>) -> ApiResult<T> {
    let revision_id = repo.get_revision_id().await.unwrap_or(0);
    match result {
        Ok(data) => success(data, revision_id),
        Err(e) => error(e, revision_id),
    }
}
