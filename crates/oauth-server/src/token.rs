//! Token endpoint: code exchange, refresh rotation and bearer validation
//!
//! Two grant types, dispatched on `grant_type`:
//! 1. `authorization_code`: redeem a single-use code, verified against PKCE
//! 2. `refresh_token`: redeem a stored refresh token, rotating both tokens
//!
//! Codes and refresh tokens are removed from the store on the first
//! redemption attempt, successful or not, so they can never be replayed.
//! Expired records are rejected even if the sweeper has not removed them yet.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::constants::{
    DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_CODE_TTL_SECS, DEFAULT_REFRESH_TOKEN_TTL_SECS,
    GRANT_AUTHORIZATION_CODE, GRANT_REFRESH_TOKEN, SCOPE, TOKEN_TYPE_BEARER,
};
use crate::error::{OAuthError, Result};
use crate::pkce;
use crate::store::{CredentialStore, IssuedToken, now_secs};

/// Lifetimes of issued credentials, in seconds.
#[derive(Debug, Clone, Copy)]
pub struct Lifetimes {
    pub code_secs: u64,
    pub access_token_secs: u64,
    pub refresh_token_secs: u64,
}

impl Default for Lifetimes {
    fn default() -> Self {
        Self {
            code_secs: DEFAULT_CODE_TTL_SECS,
            access_token_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
            refresh_token_secs: DEFAULT_REFRESH_TOKEN_TTL_SECS,
        }
    }
}

/// Body of `POST /token` (form-encoded or JSON).
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub grant_type: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub code_verifier: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

/// Successful token endpoint response.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until the access token expires
    pub expires_in: u64,
    pub refresh_token: String,
    pub scope: String,
}

/// Handle a token request for either supported grant type.
pub async fn exchange(
    store: &dyn CredentialStore,
    lifetimes: &Lifetimes,
    request: TokenRequest,
) -> Result<TokenResponse> {
    match request.grant_type.as_str() {
        GRANT_AUTHORIZATION_CODE => exchange_code(store, lifetimes, request).await,
        GRANT_REFRESH_TOKEN => refresh(store, lifetimes, request).await,
        "" => Err(OAuthError::UnsupportedGrantType(
            "grant_type is required".into(),
        )),
        other => Err(OAuthError::UnsupportedGrantType(format!(
            "unsupported grant_type: {other}"
        ))),
    }
}

async fn exchange_code(
    store: &dyn CredentialStore,
    lifetimes: &Lifetimes,
    request: TokenRequest,
) -> Result<TokenResponse> {
    let presented = request
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| OAuthError::InvalidGrant("code is required".into()))?;

    let code = store
        .take_code(presented)
        .await
        .ok_or_else(|| OAuthError::InvalidGrant("authorization code not found".into()))?;

    if code.is_expired(now_secs()) {
        warn!(client_id = %code.client_id, "expired authorization code presented");
        return Err(OAuthError::InvalidGrant(
            "authorization code expired".into(),
        ));
    }

    // client_id and redirect_uri are optional for public clients, but must
    // match the code when supplied.
    match request.client_id.as_deref() {
        Some(client_id) if !client_id.is_empty() && client_id != code.client_id => {
            warn!(client_id, "authorization code presented by a different client");
            return Err(OAuthError::InvalidGrant(
                "authorization code was issued to another client".into(),
            ));
        }
        _ => {}
    }

    match request.redirect_uri.as_deref() {
        Some(redirect_uri) if !redirect_uri.is_empty() && redirect_uri != code.redirect_uri => {
            return Err(OAuthError::InvalidGrant("redirect_uri mismatch".into()));
        }
        _ => {}
    }

    if let Some(challenge) = code.code_challenge.as_deref() {
        let verifier = request
            .code_verifier
            .as_deref()
            .ok_or_else(|| OAuthError::InvalidGrant("code_verifier required".into()))?;
        if !pkce::verify(verifier, challenge) {
            warn!(client_id = %code.client_id, "PKCE verification failed");
            return Err(OAuthError::InvalidGrant("PKCE verification failed".into()));
        }
    }

    let response = issue_tokens(store, lifetimes, Some(code.client_id.clone())).await;
    info!(client_id = %code.client_id, "authorization code exchanged");
    Ok(response)
}

async fn refresh(
    store: &dyn CredentialStore,
    lifetimes: &Lifetimes,
    request: TokenRequest,
) -> Result<TokenResponse> {
    let presented = request
        .refresh_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| OAuthError::InvalidGrant("refresh_token is required".into()))?;

    let old = store
        .take_refresh_token(presented)
        .await
        .ok_or_else(|| OAuthError::InvalidGrant("refresh token not found".into()))?;

    if old.is_expired(now_secs()) {
        return Err(OAuthError::InvalidGrant("refresh token expired".into()));
    }

    let response = issue_tokens(store, lifetimes, old.client_id.clone()).await;
    debug!(client_id = ?old.client_id, "refresh token rotated");
    Ok(response)
}

/// Mint, store and return a fresh access/refresh token pair.
async fn issue_tokens(
    store: &dyn CredentialStore,
    lifetimes: &Lifetimes,
    client_id: Option<String>,
) -> TokenResponse {
    let now = now_secs();
    let access = IssuedToken {
        value: pkce::random_token("at_"),
        client_id: client_id.clone(),
        expires_at: now + lifetimes.access_token_secs,
    };
    let refresh = IssuedToken {
        value: pkce::random_token("rt_"),
        client_id,
        expires_at: now + lifetimes.refresh_token_secs,
    };

    let response = TokenResponse {
        access_token: access.value.clone(),
        token_type: TOKEN_TYPE_BEARER.into(),
        expires_in: lifetimes.access_token_secs,
        refresh_token: refresh.value.clone(),
        scope: SCOPE.into(),
    };

    store.insert_access_token(access).await;
    store.insert_refresh_token(refresh).await;
    response
}

/// Look up a presented bearer token; it must exist and be unexpired.
pub async fn validate_access_token(
    store: &dyn CredentialStore,
    token: &str,
) -> Result<IssuedToken> {
    let issued = store
        .access_token(token)
        .await
        .ok_or_else(|| OAuthError::InvalidToken("unknown access token".into()))?;
    if issued.is_expired(now_secs()) {
        return Err(OAuthError::InvalidToken("access token expired".into()));
    }
    Ok(issued)
}
