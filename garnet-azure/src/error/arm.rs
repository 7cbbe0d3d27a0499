//! Azure Resource Manager error types

use serde::Deserialize;

use super::AuthError;

/// Errors that can occur during Azure Resource Manager calls.
#[derive(Debug, thiserror::Error)]
pub enum ArmError {
    /// No management token is present. No request was sent.
    #[error("Not authenticated")]
    Unauthenticated,

    /// The management token could not be refreshed. No request was sent.
    #[error("Token acquisition failed: {0}")]
    Auth(#[from] AuthError),

    /// Non-2xx response from ARM.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// ARM error code (e.g. `AuthorizationFailed`), if the body carried one.
        code: Option<String>,
        /// Error message, from the ARM envelope or the raw body.
        message: String,
        /// Raw response body.
        body: String,
    },

    /// Network error during the call.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to parse the response.
    #[error("Response parse error: {message}")]
    Parse {
        /// Description of the parse error.
        message: String,
        /// Raw response body, if available.
        body: Option<String>,
    },

    /// A resource id that is not of the form `/subscriptions/{id}/resourceGroups/{name}/...`.
    #[error("Invalid resource id: {0}")]
    InvalidResourceId(String),
}

/// `{"error": {"code": "...", "message": "..."}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

impl ArmError {
    /// Builds an HTTP error from a status and raw body, extracting the ARM
    /// error envelope when the body has one.
    pub fn from_response(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => (
                envelope.error.code,
                envelope.error.message.unwrap_or_else(|| body.clone()),
            ),
            Err(_) => (None, body.clone()),
        };
        Self::Http {
            status,
            code,
            message,
            body,
        }
    }

    /// Creates a new parse error with the raw response body.
    pub fn parse_with_body(message: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            body: Some(body.into()),
        }
    }

    /// Returns the HTTP status code if this is an HTTP error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the ARM error code if available.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Http { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Returns `true` if this error is potentially retryable.
    ///
    /// Nothing in this crate retries; callers decide.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::Network(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_arm_error_envelope() {
        let body = r#"{"error":{"code":"AuthorizationFailed","message":"no access"}}"#;
        let err = ArmError::from_response(403, body);

        assert_eq!(err.status_code(), Some(403));
        assert_eq!(err.error_code(), Some("AuthorizationFailed"));
        assert!(err.to_string().contains("no access"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn keeps_raw_body_when_not_json() {
        let err = ArmError::from_response(502, "Bad Gateway");

        match &err {
            ArmError::Http { code, message, body, .. } => {
                assert!(code.is_none());
                assert_eq!(message, "Bad Gateway");
                assert_eq!(body, "Bad Gateway");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_retryable());
    }

    #[test]
    fn classifies_throttling_as_retryable() {
        assert!(ArmError::from_response(429, "").is_retryable());
        assert!(ArmError::from_response(503, "").is_retryable());
        assert!(!ArmError::from_response(404, "").is_retryable());
        assert!(!ArmError::Unauthenticated.is_retryable());
    }
}
