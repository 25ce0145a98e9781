use axum::{Extension, Json, extract::State};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::domain::Actor;
use crate::services::Dashboard;

/// GET /user/dashboard
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<ApiResponse<Dashboard>>, ApiError> {
    let dashboard = state.loyalty().dashboard(&actor).await?;
    Ok(Json(ApiResponse::success(dashboard)))
}
