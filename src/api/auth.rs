use axum::{
    Extension, Json,
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{Extensions, HeaderMap, request::Parts},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use super::validation::{validate_password, validate_phone};
use super::{
    ApiError, ApiKeyResponse, ApiResponse, AppState, ChangePasswordRequest, LoginRequest,
    MessageResponse, RegisterRequest,
};
use crate::domain::{Actor, RequestMeta};
use crate::services::{LoginResult, Registration, UserInfo};

// ============================================================================
// Middleware
// ============================================================================

/// Resolves the bearer token to an [`Actor`] and stores it in the request
/// extensions. Accepts `X-Api-Key` or `Authorization: Bearer <token>`.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_api_key(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let actor = state
        .auth()
        .authenticate(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid token"))?;

    tracing::Span::current().record("user_id", tracing::field::display(actor.user_id));

    let meta = request_meta(request.headers(), request.extensions());
    request.extensions_mut().insert(actor.with_meta(meta));

    Ok(next.run(request).await)
}

fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    if let Some(api_key) = headers.get("X-Api-Key")
        && let Ok(key_str) = api_key.to_str()
    {
        return Some(key_str.trim().to_string());
    }

    if let Some(auth_header) = headers.get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        return Some(token.trim().to_string());
    }

    None
}

/// Client address and agent for audit entries. The first `X-Forwarded-For`
/// hop wins over the socket peer.
fn request_meta(headers: &HeaderMap, extensions: &Extensions) -> RequestMeta {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let peer = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let user_agent = headers
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    RequestMeta {
        ip_address: forwarded.or(peer),
        user_agent,
    }
}

/// Extractor for [`RequestMeta`] on routes that run before authentication.
pub struct ClientMeta(pub RequestMeta);

impl<S: Send + Sync> FromRequestParts<S> for ClientMeta {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(request_meta(&parts.headers, &parts.extensions)))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    ClientMeta(meta): ClientMeta,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<LoginResult>>, ApiError> {
    let phone = validate_phone(&payload.phone)?.to_string();
    validate_password(&payload.password)?;

    let result = state
        .auth()
        .register(
            Registration {
                phone,
                password: payload.password,
                name: payload.name,
            },
            meta,
        )
        .await?;

    Ok(Json(ApiResponse::success(result)))
}

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientMeta(meta): ClientMeta,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResult>>, ApiError> {
    let phone = validate_phone(&payload.phone)?;
    let password = validate_password(&payload.password)?;

    let result = state.auth().login(phone, password, meta).await?;

    Ok(Json(ApiResponse::success(result)))
}

/// GET /user/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    let info = state.auth().get_user_info(actor.user_id).await?;
    Ok(Json(ApiResponse::success(info)))
}

/// PUT /auth/password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let current = validate_password(&payload.current_password)?;

    state
        .auth()
        .change_password(actor.user_id, current, &payload.new_password, actor.meta)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Password updated successfully".to_string(),
    })))
}

/// POST /auth/api-key/regenerate
pub async fn regenerate_api_key(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<ApiResponse<ApiKeyResponse>>, ApiError> {
    let api_key = state
        .auth()
        .regenerate_api_key(actor.user_id, actor.meta)
        .await?;

    Ok(Json(ApiResponse::success(ApiKeyResponse { api_key })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_api_key_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_api_key(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("abc123"));

        headers.insert("X-Api-Key", HeaderValue::from_static("key456"));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("key456"));
    }

    #[test]
    fn test_request_meta_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        headers.insert("user-agent", HeaderValue::from_static("pos-terminal/2"));

        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 9000))));

        let meta = request_meta(&headers, &extensions);
        assert_eq!(meta.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(meta.user_agent.as_deref(), Some("pos-terminal/2"));

        let meta = request_meta(&HeaderMap::new(), &extensions);
        assert_eq!(meta.ip_address.as_deref(), Some("127.0.0.1"));
    }
}
