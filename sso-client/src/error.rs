//! Error types for the SSO handshake
//!
//! Every way a handshake can be refused maps to exactly one variant here.
//! Validation failures are client-facing and carry a short plain-text
//! message; storage and configuration faults are server errors.

use thiserror::Error;

/// SSO handshake error types.
///
/// The `Display` text of the validation variants is the exact body returned
/// to the browser.
#[derive(Debug, Error)]
pub enum SsoError {
    /// Callback arrived without `sso` and/or `sig`
    #[error("This request was not signed.")]
    NotSigned,

    /// HMAC of the received payload does not match `sig`
    #[error("Request signature does not match expected.")]
    SignatureMismatch,

    /// No nonce stored in the session (never started, expired, or already consumed)
    #[error("Invalid session.")]
    InvalidSession,

    /// Nonce echoed by the provider differs from the one in the session
    #[error("Login replay detected.")]
    ReplayDetected,

    /// Payload is signed correctly but cannot be decoded
    #[error("Malformed SSO payload.")]
    MalformedPayload(String),

    /// Payload decoded but lacks a field the handshake needs
    #[error("SSO payload is missing required field: {0}")]
    MissingField(&'static str),

    /// Post-login destination uses a scheme we refuse to redirect to
    #[error("Disallowed redirect target.")]
    DisallowedRedirect(String),

    /// Session or user store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for SSO operations.
pub type SsoResult<T> = Result<T, SsoError>;

impl SsoError {
    /// Check if this error should be logged at error level.
    ///
    /// Handshake rejections are expected traffic and are only reported
    /// back to the caller.
    pub fn is_server_error(&self) -> bool {
        matches!(self, SsoError::Storage(_) | SsoError::ConfigError(_))
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            SsoError::NotSigned
            | SsoError::SignatureMismatch
            | SsoError::InvalidSession
            | SsoError::ReplayDetected
            | SsoError::MalformedPayload(_)
            | SsoError::MissingField(_) => 422,

            SsoError::DisallowedRedirect(_) => 400,

            SsoError::Storage(_) | SsoError::ConfigError(_) => 500,
        }
    }

    /// Get error code for logs and metrics.
    pub fn error_code(&self) -> &'static str {
        match self {
            SsoError::NotSigned => "NOT_SIGNED",
            SsoError::SignatureMismatch => "SIGNATURE_MISMATCH",
            SsoError::InvalidSession => "INVALID_SESSION",
            SsoError::ReplayDetected => "REPLAY_DETECTED",
            SsoError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            SsoError::MissingField(_) => "MISSING_FIELD",
            SsoError::DisallowedRedirect(_) => "DISALLOWED_REDIRECT",
            SsoError::Storage(_) => "STORAGE_ERROR",
            SsoError::ConfigError(_) => "CONFIG_ERROR",
        }
    }

    /// Body text safe to show to the browser.
    ///
    /// Server errors never leak their internal detail.
    pub fn public_message(&self) -> String {
        if self.is_server_error() {
            "Internal error.".to_string()
        } else {
            self.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages() {
        assert_eq!(SsoError::NotSigned.to_string(), "This request was not signed.");
        assert_eq!(
            SsoError::SignatureMismatch.to_string(),
            "Request signature does not match expected."
        );
        assert_eq!(SsoError::InvalidSession.to_string(), "Invalid session.");
        assert_eq!(SsoError::ReplayDetected.to_string(), "Login replay detected.");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(SsoError::NotSigned.status_code(), 422);
        assert_eq!(SsoError::SignatureMismatch.status_code(), 422);
        assert_eq!(SsoError::InvalidSession.status_code(), 422);
        assert_eq!(SsoError::ReplayDetected.status_code(), 422);
        assert_eq!(SsoError::MissingField("username").status_code(), 422);
        assert_eq!(
            SsoError::DisallowedRedirect("javascript:alert(1)".into()).status_code(),
            400
        );
        assert_eq!(SsoError::Storage("down".into()).status_code(), 500);
    }

    #[test]
    fn test_server_errors_hide_detail() {
        let err = SsoError::Storage("connection refused to 10.0.0.5".into());
        assert!(err.is_server_error());
        assert_eq!(err.public_message(), "Internal error.");

        let err = SsoError::ReplayDetected;
        assert!(!err.is_server_error());
        assert_eq!(err.public_message(), "Login replay detected.");
    }
}
