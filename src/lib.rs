//! Venture backend
//!
//! Shared bucket lists over SQLite: a REST API, live change streams, and the
//! client-side state logic (visible-bucket aggregation, per-bucket goal
//! subscriptions, state store, filter/sort views) as a library.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod live;
pub mod models;
pub mod store;
pub mod views;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use db::Repository;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Arc<Config>,
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    let api_routes = Router::new()
        // Users
        .route("/auth/sign-in", post(api::sign_in))
        .route("/users/me", get(api::get_current_user))
        .route("/users/search", get(api::search_users))
        .route("/users/by-email", get(api::get_user_by_email))
        .route(
            "/users/{id}",
            get(api::get_user_profile).put(api::update_user_profile),
        )
        // Buckets
        .route("/buckets", get(api::list_buckets).post(api::create_bucket))
        .route(
            "/buckets/{id}",
            get(api::get_bucket)
                .put(api::update_bucket)
                .delete(api::delete_bucket),
        )
        .route("/buckets/{id}/role", get(api::get_bucket_role))
        .route("/buckets/{id}/members", post(api::add_bucket_members))
        .route(
            "/buckets/{id}/members/{user_id}",
            delete(api::remove_bucket_member),
        )
        // Goals
        .route(
            "/buckets/{id}/goals",
            get(api::list_goals).post(api::create_goal),
        )
        .route(
            "/buckets/{id}/goals/{goal_id}",
            put(api::update_goal).delete(api::delete_goal),
        )
        .route(
            "/buckets/{id}/goals/{goal_id}/complete",
            post(api::complete_goal),
        )
        .route(
            "/buckets/{id}/goals/{goal_id}/toggle",
            post(api::toggle_goal_completion),
        )
        .route(
            "/buckets/{id}/goals/{goal_id}/favorite",
            post(api::toggle_goal_favorite),
        )
        .route("/categories", get(api::list_categories))
        // Friends
        .route(
            "/friends/requests",
            get(api::list_friend_requests).post(api::send_friend_request),
        )
        .route(
            "/friends/requests/{id}",
            delete(api::reject_friend_request),
        )
        .route(
            "/friends/requests/{id}/accept",
            post(api::accept_friend_request),
        )
        .route("/friends", get(api::list_friends))
        .route(
            "/friends/{friend_id}",
            delete(api::remove_friend),
        )
        // Live streams
        .route("/live/buckets", get(api::live_buckets))
        .route("/live/buckets/{id}/goals", get(api::live_bucket_goals))
        // Admin
        .route("/admin/users", get(api::admin_list_users))
        .route("/admin/users/{id}/admin", put(api::admin_set_user_admin))
        .route("/admin/buckets", get(api::admin_list_buckets))
        .route(
            "/admin/buckets/{id}",
            delete(api::admin_delete_bucket),
        )
        .route("/admin/buckets/{id}/goals", get(api::admin_bucket_goals))
        .route("/admin/stats", get(api::admin_stats))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
