use axum::{
    Extension, Json,
    extract::{Path, State},
};
use std::sync::Arc;
use uuid::Uuid;

use super::validation::validate_notes;
use super::{ApiError, ApiResponse, AppState, RedeemRequest};
use crate::domain::Actor;
use crate::services::{RedemptionRecord, RewardRecord, RewardRedeemed};

/// GET /rewards
pub async fn list_rewards(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<ApiResponse<Vec<RewardRecord>>>, ApiError> {
    let rewards = state.loyalty().rewards(&actor).await?;
    Ok(Json(ApiResponse::success(rewards)))
}

/// POST /rewards/{id}/redeem
///
/// The body is optional; an empty request redeems without notes.
pub async fn redeem(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    payload: Option<Json<RedeemRequest>>,
) -> Result<Json<ApiResponse<RewardRedeemed>>, ApiError> {
    let notes = validate_notes(payload.and_then(|Json(body)| body.notes))?;
    let redeemed = state.loyalty().redeem_reward(&actor, id, notes).await?;
    Ok(Json(ApiResponse::success(redeemed)))
}

/// GET /redemptions/history
pub async fn redemption_history(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<ApiResponse<Vec<RedemptionRecord>>>, ApiError> {
    let redemptions = state.loyalty().redemption_history(&actor).await?;
    Ok(Json(ApiResponse::success(redemptions)))
}
