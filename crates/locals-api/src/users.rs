use axum::{Extension, Json, extract::State, response::IntoResponse};

use locals_db::models::{ProfileUpdate, UserRow};
use locals_types::api::{
    Claims, ProfileResponse, PublicProfileResponse, UpdateProfileRequest, UserBooking,
};
use locals_types::models::UserId;

use crate::auth::AppState;
use crate::db_call;
use crate::error::ApiError;
use crate::events::summary;
use crate::extract::{ApiJson, ApiPath};

/// GET /user: the caller's own profile.
pub async fn current_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let id = claims.sub;
    let user = db_call(&state, move |db| db.get_user_by_id(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(profile(user)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let update = ProfileUpdate {
        first_name: req.first_name.map(|s| s.trim().to_string()),
        last_name: req.last_name.map(|s| s.trim().to_string()),
        bio: req.bio,
        profile_pic: req.profile_pic,
        is_host: req.is_host,
        is_traveler: req.is_traveler,
    };

    let id = claims.sub;
    let user = db_call(&state, move |db| db.update_profile(id, &update)).await?;
    Ok(Json(profile(user)))
}

/// GET /user/{id}: what other users may see.
pub async fn public_profile(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<UserId>,
) -> Result<impl IntoResponse, ApiError> {
    let user = db_call(&state, move |db| db.get_user_by_id(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(PublicProfileResponse {
        id: user.id,
        first_name: user.first_name,
        last_name: user.last_name,
        bio: user.bio,
        profile_pic: user.profile_pic,
        is_host: user.is_host,
    }))
}

pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let guest = claims.sub;
    let rows = db_call(&state, move |db| db.list_guest_bookings(guest)).await?;

    let bookings: Vec<UserBooking> = rows
        .into_iter()
        .map(|b| UserBooking {
            id: b.id,
            event_id: b.event_id,
            event_title: b.event_title,
            event_date: b.event_date,
        })
        .collect();
    Ok(Json(bookings))
}

pub async fn hosted_events(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let host = claims.sub;
    let rows = db_call(&state, move |db| db.list_hosted_events(host)).await?;

    Ok(Json(rows.into_iter().map(summary).collect::<Vec<_>>()))
}

fn profile(user: UserRow) -> ProfileResponse {
    ProfileResponse {
        id: user.id,
        username: user.username,
        email: user.email,
        first_name: user.first_name,
        last_name: user.last_name,
        bio: user.bio,
        profile_pic: user.profile_pic,
        is_host: user.is_host,
        is_traveler: user.is_traveler,
        auth_provider: user.auth_provider,
    }
}
