use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use tracing::info;

use locals_db::models::{EventRow, NewEvent};
use locals_discovery::{EventFilter, GeoPoint};
use locals_types::api::{
    Claims, CreateEventRequest, CreateEventResponse, EventDetail, EventListParams, EventSummary,
    SuccessResponse,
};
use locals_types::models::EventId;

use crate::auth::AppState;
use crate::db_call;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};

/// Highest accepted ticket price, in currency units.
const MAX_PRICE: f64 = 1_000_000.0;

/// GET /event/get_all: discovery listing. Bad filter values, repeated keys
/// included, are ignored, never rejected.
pub async fn list_events(
    State(state): State<AppState>,
    ApiQuery(pairs): ApiQuery<Vec<(String, String)>>,
) -> Result<impl IntoResponse, ApiError> {
    let params = EventListParams::from_pairs(pairs);
    let filter = EventFilter::from_params(&params, Utc::now(), state.utc_offset);
    let rows = db_call(&state, move |db| db.list_events(&filter)).await?;

    Ok(Json(rows.into_iter().map(summary).collect::<Vec<_>>()))
}

pub async fn get_event(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<EventId>,
) -> Result<impl IntoResponse, ApiError> {
    let row = db_call(&state, move |db| db.get_event(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".into()))?;

    Ok(Json(detail(row)))
}

pub async fn create_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::validation("Title is required"));
    }

    let occurence_date = req
        .occurence_date
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|at| at.with_timezone(&Utc))
                .map_err(|_| ApiError::validation("occurence_date must be an RFC 3339 timestamp"))
        })
        .transpose()?;

    match (req.latitude, req.longitude) {
        (None, None) => {}
        (Some(lat), Some(lon)) => {
            if GeoPoint::new(lat, lon).is_none() {
                return Err(ApiError::validation("Coordinates out of range"));
            }
        }
        _ => return Err(ApiError::validation("latitude and longitude must be given together")),
    }

    let price = req.price.unwrap_or(0.0);
    if !price.is_finite() || price < 0.0 {
        return Err(ApiError::validation("Price must be a non-negative number"));
    }
    if price > MAX_PRICE {
        return Err(ApiError::validation(format!("Price cannot exceed {MAX_PRICE}")));
    }
    let price_cents = (price * 100.0).round() as i64;

    let number_of_guests = req.number_of_guests.unwrap_or(1);
    if number_of_guests < 1 {
        return Err(ApiError::validation("number_of_guests must be at least 1"));
    }
    if req.duration_minutes.is_some_and(|d| d < 0) {
        return Err(ApiError::validation("duration_minutes cannot be negative"));
    }

    let host_id = claims.sub;
    let event_id = db_call(&state, move |db| {
        db.create_event(&NewEvent {
            title: &title,
            description: &req.description,
            unique_aspect: &req.unique_aspect,
            host_id,
            number_of_guests: Some(number_of_guests),
            occurence_date,
            duration_minutes: req.duration_minutes,
            location: req.location.trim(),
            latitude: req.latitude,
            longitude: req.longitude,
            price_cents,
            photos: &req.photos,
            tags: &req.tags,
        })
    })
    .await?;

    info!("Event {} created by host {}", event_id, host_id);
    Ok((
        StatusCode::CREATED,
        Json(CreateEventResponse {
            message: "Event created successfully".into(),
            event_id,
        }),
    ))
}

/// DELETE /event/delete/{id}: host only.
pub async fn delete_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(id): ApiPath<EventId>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = claims.sub;
    db_call(&state, move |db| db.delete_event(id, actor)).await?;

    info!("Event {} deleted by host {}", id, actor);
    Ok(Json(SuccessResponse { success: true }))
}

pub(crate) fn summary(row: EventRow) -> EventSummary {
    EventSummary {
        id: row.id,
        title: row.title,
        description: row.description,
        unique_aspect: row.unique_aspect,
        occurence_date: row.occurence_date,
        location: row.location,
        latitude: row.latitude,
        longitude: row.longitude,
        price: row.price_cents as f64 / 100.0,
        photos: row.photos,
        number_of_guests: row.number_of_guests,
        number_of_bookings: row.number_of_bookings,
        tags: row.tags,
        host_username: row.host_username.unwrap_or_else(|| "Unknown".into()),
        host_first_name: row.host_first_name.unwrap_or_else(|| "Unknown".into()),
    }
}

fn detail(mut row: EventRow) -> EventDetail {
    let host_id = row.host_id;
    let host_last_name = row.host_last_name.take().unwrap_or_default();
    let host_profile_pic = row.host_profile_pic.take();
    let duration_minutes = row.duration_minutes;
    let created_at = row.created_at;

    EventDetail {
        summary: summary(row),
        host_id,
        host_last_name,
        host_profile_pic,
        duration_minutes,
        created_at,
    }
}
