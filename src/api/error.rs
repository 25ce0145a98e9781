use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::services::{AuthError, LoyaltyError};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    ValidationError(String),

    Unauthorized(String),

    Forbidden { kind: &'static str, message: String },

    Conflict { kind: &'static str, message: String },

    /// A request that is well-formed but not allowed in the current state.
    BadRequest { kind: &'static str, message: String },

    DatabaseError(String),

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            Self::Forbidden { message, .. } => write!(f, "Forbidden: {message}"),
            Self::Conflict { message, .. } => write!(f, "Conflict: {message}"),
            Self::BadRequest { message, .. } => write!(f, "Bad request: {message}"),
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden { kind, .. }
            | Self::Conflict { kind, .. }
            | Self::BadRequest { kind, .. } => *kind,
            Self::DatabaseError(_) => "STORAGE_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::DatabaseError(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        let error_message = match &self {
            Self::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                "A database error occurred".to_string()
            }
            Self::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }
            Self::NotFound(msg) | Self::ValidationError(msg) | Self::Unauthorized(msg) => {
                msg.clone()
            }
            Self::Forbidden { message, .. }
            | Self::Conflict { message, .. }
            | Self::BadRequest { message, .. } => message.clone(),
        };

        let body = ApiResponse::<()>::error(kind, error_message);
        (status, Json(body)).into_response()
    }
}

impl From<LoyaltyError> for ApiError {
    fn from(err: LoyaltyError) -> Self {
        let kind = err.kind();
        match err {
            LoyaltyError::ForbiddenRole(_) | LoyaltyError::Forbidden(_) => Self::Forbidden {
                kind,
                message: err.to_string(),
            },
            LoyaltyError::NotFound(_) => Self::NotFound(err.to_string()),
            LoyaltyError::CodeAlreadyUsed => Self::Conflict {
                kind,
                message: err.to_string(),
            },
            LoyaltyError::CodeInactive
            | LoyaltyError::CodeExpired
            | LoyaltyError::RewardNotAvailable
            | LoyaltyError::RewardExpired => Self::BadRequest {
                kind,
                message: err.to_string(),
            },
            LoyaltyError::CodeSpaceExhausted => Self::internal(err.to_string()),
            LoyaltyError::Storage(msg) => Self::DatabaseError(msg),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::Unauthorized(err.to_string()),
            AuthError::AccountDisabled => Self::Forbidden {
                kind: "ACCOUNT_DISABLED",
                message: err.to_string(),
            },
            AuthError::PhoneTaken => Self::BadRequest {
                kind: "PHONE_TAKEN",
                message: err.to_string(),
            },
            AuthError::UserNotFound => Self::NotFound(err.to_string()),
            AuthError::Validation(msg) => Self::ValidationError(msg),
            AuthError::Database(msg) => Self::DatabaseError(msg),
            AuthError::Internal(msg) => Self::internal(msg),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}
