//! Authorization endpoint
//!
//! Every request is approved without a consent screen: the deployment has a
//! single trusted caller. The endpoint still mints a fresh code, binds it to
//! the PKCE challenge and expires it after the configured TTL. `state` is
//! echoed back unchanged; correlating it is the caller's job.

use serde::Deserialize;
use tracing::{info, warn};

use crate::constants::CODE_CHALLENGE_METHOD_S256;
use crate::error::{OAuthError, Result};
use crate::pkce::random_token;
use crate::store::{AuthorizationCode, CredentialStore, now_secs};

/// Query parameters of `GET /authorize`.
#[derive(Debug, Default, Deserialize)]
pub struct AuthorizeRequest {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub code_challenge: Option<String>,
    #[serde(default)]
    pub code_challenge_method: Option<String>,
}

/// Issue an authorization code and return the redirect target.
pub async fn authorize(
    store: &dyn CredentialStore,
    request: AuthorizeRequest,
    code_ttl_secs: u64,
) -> Result<String> {
    if request.client_id.is_empty() {
        return Err(OAuthError::InvalidRequest("client_id is required".into()));
    }
    if request.redirect_uri.is_empty() {
        return Err(OAuthError::InvalidRequest("redirect_uri is required".into()));
    }
    // The redirect travels in a Location header: visible ASCII only.
    if !request
        .redirect_uri
        .bytes()
        .all(|b| b.is_ascii_graphic())
    {
        warn!("redirect_uri contains characters not allowed in a header");
        return Err(OAuthError::InvalidRequest(
            "redirect_uri must be printable ASCII without whitespace".into(),
        ));
    }
    if request.code_challenge.as_deref() == Some("") {
        return Err(OAuthError::InvalidRequest(
            "code_challenge must not be empty".into(),
        ));
    }

    let method = request
        .code_challenge_method
        .as_deref()
        .unwrap_or(CODE_CHALLENGE_METHOD_S256);
    if method != CODE_CHALLENGE_METHOD_S256 {
        return Err(OAuthError::InvalidRequest(format!(
            "unsupported code_challenge_method: {method}"
        )));
    }

    if store.client(&request.client_id).await.is_none() {
        warn!(client_id = %request.client_id, "authorizing unregistered client");
    }

    let code = random_token("code_");
    let code_challenge_method = request
        .code_challenge
        .as_ref()
        .map(|_| method.to_owned());

    let redirect = build_redirect(&request.redirect_uri, &code, request.state.as_deref())?;

    store
        .insert_code(AuthorizationCode {
            code,
            client_id: request.client_id.clone(),
            redirect_uri: request.redirect_uri,
            code_challenge: request.code_challenge,
            code_challenge_method,
            expires_at: now_secs() + code_ttl_secs,
        })
        .await;

    info!(client_id = %request.client_id, "authorization code issued");
    Ok(redirect)
}

/// Append `code` (and `state` if present) to the redirect URI, extending an
/// existing query string if there is one.
fn build_redirect(redirect_uri: &str, code: &str, state: Option<&str>) -> Result<String> {
    let mut params = vec![("code", code)];
    if let Some(state) = state {
        params.push(("state", state));
    }
    let query = serde_urlencoded::to_string(&params)
        .map_err(|e| OAuthError::InvalidRequest(format!("cannot encode redirect: {e}")))?;

    let separator = if redirect_uri.contains('?') { '&' } else { '?' };
    Ok(format!("{redirect_uri}{separator}{query}"))
}
