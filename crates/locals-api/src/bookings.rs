use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use locals_db::models::BookingOutcome;
use locals_types::api::{BookingResponse, Claims, SuccessResponse};
use locals_types::models::EventId;

use crate::auth::AppState;
use crate::db_call;
use crate::error::ApiError;
use crate::extract::ApiPath;

/// POST /booking/register/{event_id}: idempotent: a second call returns
/// the booking made by the first.
pub async fn register(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(event_id): ApiPath<EventId>,
) -> Result<impl IntoResponse, ApiError> {
    let guest = claims.sub;
    let outcome = db_call(&state, move |db| db.register_booking(event_id, guest)).await?;

    let (status, message) = match outcome {
        BookingOutcome::Created(_) => (StatusCode::CREATED, "Booking created"),
        BookingOutcome::AlreadyExists(_) => (StatusCode::OK, "Booking already exists"),
    };
    Ok((
        status,
        Json(BookingResponse {
            id: outcome.id(),
            message: message.into(),
        }),
    ))
}

/// DELETE /booking/delete/{id}
pub async fn delete(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    ApiPath(booking_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    db_call(&state, move |db| db.delete_booking(booking_id)).await?;
    Ok(Json(SuccessResponse { success: true }))
}
