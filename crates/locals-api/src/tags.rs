use axum::{Json, extract::State, response::IntoResponse};

use locals_types::api::{TagListResponse, TagResponse};

use crate::auth::AppState;
use crate::db_call;
use crate::error::ApiError;

pub async fn list_tags(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = db_call(&state, |db| db.list_tags()).await?;

    Ok(Json(TagListResponse {
        tags: rows
            .into_iter()
            .map(|t| TagResponse {
                id: t.id,
                tag_name: t.tag_name,
                description: t.description,
            })
            .collect(),
    }))
}
