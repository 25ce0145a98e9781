use axum::{Extension, Json, extract::State};
use std::sync::Arc;

use super::{AddStampRequest, ApiError, ApiResponse, AppState};
use crate::domain::Actor;
use crate::services::{StampAdded, StampRecord};

/// POST /stamps/add
pub async fn add_stamp(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<AddStampRequest>,
) -> Result<Json<ApiResponse<StampAdded>>, ApiError> {
    let added = state
        .loyalty()
        .add_stamp(&actor, payload.customer_code_id)
        .await?;
    Ok(Json(ApiResponse::success(added)))
}

/// GET /stamps/history
pub async fn history(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<ApiResponse<Vec<StampRecord>>>, ApiError> {
    let stamps = state.loyalty().stamp_history(&actor).await?;
    Ok(Json(ApiResponse::success(stamps)))
}
