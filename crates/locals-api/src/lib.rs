pub mod auth;
pub mod bookings;
pub mod error;
pub mod events;
pub mod extract;
pub mod messaging;
pub mod middleware;
pub mod oauth;
pub mod reviews;
pub mod tags;
pub mod uploads;
pub mod users;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use serde_json::{Value, json};
use tower_http::services::ServeDir;
use tracing::error;

use locals_db::Database;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::require_auth;

/// Builds the full HTTP surface. Public routes need no token; everything
/// else goes through `require_auth`.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/user/create", post(auth::register))
        .route("/user/authenticate", post(auth::login))
        .route("/user/logout", post(auth::logout))
        .route("/user/oauth-login", post(auth::oauth_login))
        .route("/user/exists-by-email", get(auth::exists_by_email))
        .route("/user/{id}", get(users::public_profile))
        .route("/tags", get(tags::list_tags))
        .route("/event/get_all", get(events::list_events))
        .route("/event/id/{id}", get(events::get_event))
        .route("/event/{id}/reviews", get(reviews::list_reviews))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/user", get(users::current_user))
        .route("/user/update", post(users::update_profile))
        .route("/user/bookings", get(users::my_bookings))
        .route("/user/hosted_events", get(users::hosted_events))
        .route("/event/create", post(events::create_event))
        .route("/event/delete/{id}", delete(events::delete_event))
        .route("/booking/register/{event_id}", post(bookings::register))
        .route("/booking/delete/{id}", delete(bookings::delete))
        .route("/reviews/create", post(reviews::create_review))
        .route("/messaging/start-dm", post(messaging::start_dm))
        .route("/messaging/allowed-uids", get(messaging::allowed_uids))
        .route(
            "/upload",
            post(uploads::upload).layer(DefaultBodyLimit::max(uploads::MAX_UPLOAD_BYTES)),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service("/media", ServeDir::new(state.blobs.root()))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Runs blocking DB work off the async runtime.
pub(crate) async fn db_call<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> locals_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.to_string())
        })?
        .map_err(ApiError::from)
}
