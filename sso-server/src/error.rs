//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sso_client::SsoError;
use thiserror::Error;
use tracing::error;

/// Errors surfaced by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Handshake, session, or user store failure
    #[error(transparent)]
    Sso(#[from] SsoError),

    /// Redirect target cannot be carried in a `Location` header
    #[error("Invalid redirect location")]
    InvalidLocation,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Sso(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ApiError::InvalidLocation => StatusCode::BAD_REQUEST,
        }
    }

    /// Plain-text body.
    pub fn body(&self) -> String {
        match self {
            ApiError::Sso(e) => e.public_message(),
            ApiError::InvalidLocation => SsoError::DisallowedRedirect(String::new()).to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Sso(e) = &self {
            if e.is_server_error() {
                error!(error = %e, code = e.error_code(), "SSO request failed");
            }
        }

        (self.status_code(), self.body()).into_response()
    }
}
