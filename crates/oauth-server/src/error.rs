//! OAuth endpoint errors, mapped onto RFC 6749 / RFC 7591 error codes

use serde_json::json;

/// Errors returned by the registration, authorization and token endpoints.
///
/// Each variant carries a human-readable description; `code()` gives the
/// wire-level `error` value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OAuthError {
    #[error("invalid_grant: {0}")]
    InvalidGrant(String),

    #[error("unsupported_grant_type: {0}")]
    UnsupportedGrantType(String),

    #[error("invalid_request: {0}")]
    InvalidRequest(String),

    #[error("invalid_redirect_uri: {0}")]
    InvalidRedirectUri(String),

    #[error("invalid_client_metadata: {0}")]
    InvalidClientMetadata(String),

    #[error("invalid_token: {0}")]
    InvalidToken(String),
}

impl OAuthError {
    pub fn code(&self) -> &'static str {
        match self {
            OAuthError::InvalidGrant(_) => "invalid_grant",
            OAuthError::UnsupportedGrantType(_) => "unsupported_grant_type",
            OAuthError::InvalidRequest(_) => "invalid_request",
            OAuthError::InvalidRedirectUri(_) => "invalid_redirect_uri",
            OAuthError::InvalidClientMetadata(_) => "invalid_client_metadata",
            OAuthError::InvalidToken(_) => "invalid_token",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            OAuthError::InvalidGrant(d)
            | OAuthError::UnsupportedGrantType(d)
            | OAuthError::InvalidRequest(d)
            | OAuthError::InvalidRedirectUri(d)
            | OAuthError::InvalidClientMetadata(d)
            | OAuthError::InvalidToken(d) => d,
        }
    }

    /// JSON error body: `{"error": ..., "error_description": ...}`
    pub fn to_body(&self) -> serde_json::Value {
        json!({
            "error": self.code(),
            "error_description": self.description(),
        })
    }
}

/// Result alias for OAuth operations.
pub type Result<T> = std::result::Result<T, OAuthError>;
