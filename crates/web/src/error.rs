//! Error handling with RFC 7807 Problem Details for JSON responses

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Insufficient credits: {available} available, {requested} requested")]
    PaymentRequired { available: u64, requested: u64 },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::PaymentRequired { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<hive_core::Error> for AppError {
    fn from(err: hive_core::Error) -> Self {
        use hive_core::Error;

        match err {
            Error::Validation { message, .. } => Self::BadRequest(message),
            Error::Unauthorized { reason } => Self::Unauthorized(reason),
            Error::Forbidden { reason } => Self::Forbidden(reason),
            Error::InsufficientCredits {
                available,
                requested,
            } => Self::PaymentRequired {
                available,
                requested,
            },
            err @ Error::NotFound { .. } => Self::NotFound(err.to_string()),
            err @ (Error::Conflict { .. } | Error::InvalidTransition { .. }) => {
                Self::Conflict(err.to_string())
            }
            err @ (Error::Store { .. } | Error::Serialization { .. }) => {
                tracing::error!(error = %err, "request failed");
                Self::Internal
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(format!("Invalid query: {}", rejection.body_text()))
    }
}

/// RFC 7807 Problem Details for HTTP APIs
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    problem_type: Option<String>,
    error: String,
    title: String,
    status: u16,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    available: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    requested: Option<u64>,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, title: impl Into<String>, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            problem_type: None,
            error: detail.clone(),
            title: title.into(),
            status: status.as_u16(),
            detail,
            available: None,
            requested: None,
        }
    }

    pub fn from_error(err: &AppError) -> Self {
        let status = err.status_code();
        let title = status
            .canonical_reason()
            .map_or_else(|| "Error".to_string(), ToString::to_string);

        let mut response = Self::new(status, title, err.to_string());
        if let AppError::PaymentRequired {
            available,
            requested,
        } = err
        {
            response.available = Some(*available);
            response.requested = Some(*requested);
        }
        response
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let response = ErrorResponse::from_error(&self);
        (status, Json(response)).into_response()
    }
}
