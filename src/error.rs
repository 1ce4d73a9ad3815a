//! Unified API error handling
//!
//! Provides consistent error responses across all endpoints. Engine failures
//! keep their own machine-readable codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::engine::EngineError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Engine(e) => match e {
                EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
                EngineError::NotFound(_) => StatusCode::NOT_FOUND,
                EngineError::InvalidState(_)
                | EngineError::BidWindowClosed
                | EngineError::DuplicateBid
                | EngineError::DuplicateInvite
                | EngineError::DuplicateRequirement
                | EngineError::NotInvited
                | EngineError::AlreadyAssigned
                | EngineError::Conflict => StatusCode::CONFLICT,
                EngineError::IncompleteBidSet(_)
                | EngineError::NoRequirements
                | EngineError::IneligibleContractor(_) => StatusCode::UNPROCESSABLE_ENTITY,
                EngineError::InvalidDateRange | EngineError::Validation(_) => {
                    StatusCode::BAD_REQUEST
                }
                EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Engine(e) => match e {
                EngineError::Forbidden(_) => "FORBIDDEN",
                EngineError::InvalidState(_) => "INVALID_STATE",
                EngineError::BidWindowClosed => "BID_WINDOW_CLOSED",
                EngineError::DuplicateBid => "DUPLICATE_BID",
                EngineError::DuplicateInvite => "DUPLICATE_INVITE",
                EngineError::IncompleteBidSet(_) => "INCOMPLETE_BID_SET",
                EngineError::NotInvited => "NOT_INVITED",
                EngineError::InvalidDateRange => "INVALID_DATE_RANGE",
                EngineError::AlreadyAssigned => "ALREADY_ASSIGNED",
                EngineError::NotFound(_) => "NOT_FOUND",
                EngineError::NoRequirements => "NO_REQUIREMENTS",
                EngineError::DuplicateRequirement => "DUPLICATE_REQUIREMENT",
                EngineError::IneligibleContractor(_) => "INELIGIBLE_CONTRACTOR",
                EngineError::Validation(_) => "VALIDATION_ERROR",
                EngineError::Conflict => "CONFLICT",
                EngineError::Internal(_) => "INTERNAL_ERROR",
            },
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg) => msg.clone(),
            // Don't leak internal error details
            Self::Internal(_) | Self::Engine(EngineError::Internal(_)) => {
                "An internal error occurred".to_string()
            }
            Self::Engine(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(e) | Self::Engine(EngineError::Internal(e)) => {
                tracing::error!(error = ?e, "Internal server error");
            }
            _ => {
                tracing::warn!(error = %self, code = self.error_code(), "API error");
            }
        }

        let status = self.status_code();
        let body = ErrorResponse {
            code: self.error_code().to_string(),
            message: self.public_message(),
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
