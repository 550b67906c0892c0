//! Request authentication and the admin capability.
//!
//! The API is guarded by a pre-shared key compared in constant time. The
//! end user is asserted by the trusted front end in the `x-user-id` header.

use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::db::Repository;
use crate::errors::{AppError, AppErrorWithRevision};

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// PSK authentication layer function that takes the expected PSK as a parameter.
pub async fn psk_auth_layer(
    expected_psk: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    // If no PSK is configured, allow all requests (dev mode)
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    let headers = request.headers();
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match provided {
        Some(provided_key) => {
            if constant_time_compare(&provided_key, &expected) {
                next.run(request).await
            } else {
                unauthorized_response("Invalid API key")
            }
        }
        None => {
            // Also accept the key as a bearer token
            let bearer = headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .map(str::to_string);

            match bearer {
                Some(bearer_key) if constant_time_compare(&bearer_key, &expected) => {
                    next.run(request).await
                }
                _ => unauthorized_response("Missing or invalid API key"),
            }
        }
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn unauthorized_response(message: &str) -> Response {
    AppErrorWithRevision {
        error: AppError::Unauthorized(message.to_string()),
        revision_id: 0,
    }
    .into_response()
}

/// The calling user's id, taken from the `x-user-id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppErrorWithRevision;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| CurrentUser(id.to_string()))
            .ok_or_else(|| AppErrorWithRevision {
                error: AppError::Unauthorized("Missing user identity".to_string()),
                revision_id: 0,
            })
    }
}

/// Decide the admin capability from the token claim and the user document.
///
/// A `true` claim wins, then a `true` document flag. Anything else, including
/// a failed lookup, is not admin.
pub fn resolve_admin(
    claim: Result<Option<bool>, AppError>,
    document: Result<Option<bool>, AppError>,
) -> bool {
    match claim {
        Ok(Some(true)) => return true,
        Ok(_) => {}
        Err(e) => tracing::warn!("Admin claim lookup failed: {}", e),
    }
    match document {
        Ok(flag) => flag.unwrap_or(false),
        Err(e) => {
            tracing::warn!("Admin flag lookup failed: {}", e);
            false
        }
    }
}

/// Resolve whether `user_id` holds the admin capability.
pub async fn is_admin(repo: &Repository, user_id: &str) -> bool {
    let claim = repo.get_admin_claim(user_id).await;
    if matches!(claim, Ok(Some(true))) {
        return true;
    }
    let document = repo
        .get_user(user_id)
        .await
        .map(|user| user.map(|u| u.is_admin));
    resolve_admin(claim, document)
}

/// Fail with `Forbidden` unless `user_id` is an admin.
pub async fn require_admin(repo: &Repository, user_id: &str) -> Result<(), AppError> {
    if is_admin(repo, user_id).await {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin access required".to_string()))
    }
}
