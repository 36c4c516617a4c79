/*
 * Responsibility
 * - The single HTTP-facing error type (AppError)
 * - IntoResponse: status + `{"message": ...}` body
 * - Internal detail travels to the access log via the `ErrorMessage` response extension,
 *   never in the body
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::{AuthError, ScopeError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// Detailed failure reason attached to a response for the access log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage(pub String);

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),
    #[error("forbidden: {0}")]
    Forbidden(#[from] ScopeError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Unauthorized(_) => "Unauthorized".to_string(),
            AppError::Forbidden(_) => "Forbidden".to_string(),
            AppError::BadRequest(message) => message.clone(),
            AppError::Internal(_) => "Internal Server Error".to_string(),
        };

        let mut response = (status, Json(ErrorResponse { message })).into_response();
        response
            .extensions_mut()
            .insert(ErrorMessage(self.to_string()));
        response
    }
}
