use axum::{Extension, Json, extract::State};
use std::sync::Arc;

use super::validation::validate_customer_code;
use super::{ApiError, ApiResponse, AppState, ValidateCodeRequest};
use crate::domain::Actor;
use crate::services::{CodeValidation, IssuedCode};

/// POST /customer-code/generate
pub async fn generate_code(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<ApiResponse<IssuedCode>>, ApiError> {
    let code = state.loyalty().issue_code(&actor).await?;
    Ok(Json(ApiResponse::success(code)))
}

/// POST /customer-code/validate
pub async fn validate_code(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<ValidateCodeRequest>,
) -> Result<Json<ApiResponse<CodeValidation>>, ApiError> {
    let code = validate_customer_code(&payload.code)?;
    let validation = state.loyalty().validate_code(&actor, code.as_str()).await?;
    Ok(Json(ApiResponse::success(validation)))
}
