use axum::{Extension, Json, extract::State, response::IntoResponse};

use locals_types::api::{Claims, StartDmRequest, StartDmResponse};

use crate::auth::AppState;
use crate::db_call;
use crate::error::ApiError;
use crate::extract::ApiJson;

/// POST /messaging/start-dm: grants both users permission to message each
/// other. Repeating the request, from either side, is a no-op.
pub async fn start_dm(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<StartDmRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let requester = claims.sub;
    let target = req.target_user_id;
    let created = db_call(&state, move |db| db.grant_dm(requester, target)).await?;

    Ok(Json(StartDmResponse {
        message: if created {
            "DM permission granted".into()
        } else {
            "DM permission already exists".into()
        },
        created,
    }))
}

/// GET /messaging/allowed-uids: ids as strings, the format chat clients key users by.
pub async fn allowed_uids(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = claims.sub;
    let peers = db_call(&state, move |db| db.list_dm_peers(user)).await?;

    Ok(Json(peers.into_iter().map(|id| id.to_string()).collect::<Vec<_>>()))
}
