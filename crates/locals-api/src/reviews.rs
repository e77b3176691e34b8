use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use locals_types::api::{Claims, CreateReviewRequest, CreateReviewResponse, ReviewResponse};
use locals_types::models::EventId;

use crate::auth::AppState;
use crate::db_call;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};

pub async fn create_review(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = req.text.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::validation("Review text is required"));
    }

    let (event_id, rating) = (req.event_id, req.rating);
    let review_id = db_call(&state, move |db| db.create_review(event_id, &text, rating)).await?;

    tracing::info!("Review {} on event {} by user {}", review_id, event_id, claims.sub);
    Ok((
        StatusCode::CREATED,
        Json(CreateReviewResponse {
            message: "Review created successfully".into(),
            review_id,
        }),
    ))
}

/// GET /event/{id}/reviews: oldest first.
pub async fn list_reviews(
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<EventId>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = db_call(&state, move |db| {
        if !db.event_exists(event_id)? {
            return Err(locals_db::StoreError::NotFound("Event"));
        }
        db.list_reviews(event_id)
    })
    .await?;

    let reviews: Vec<ReviewResponse> = rows
        .into_iter()
        .map(|r| ReviewResponse {
            text: r.text,
            rating: r.rating,
        })
        .collect();
    Ok(Json(reviews))
}
