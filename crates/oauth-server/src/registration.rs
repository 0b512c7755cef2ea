//! Dynamic Client Registration (RFC 7591)

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::{GRANT_AUTHORIZATION_CODE, GRANT_REFRESH_TOKEN};
use crate::error::{OAuthError, Result};
use crate::pkce::random_token;
use crate::store::{Client, CredentialStore, now_secs};

/// Registration request body. Unknown metadata fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct RegistrationRequest {
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub client_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    pub client_id: String,
    pub client_secret: String,
    pub client_id_issued_at: u64,
    pub redirect_uris: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: String,
}

/// Optional redirect URI allow-list. Empty accepts anything.
#[derive(Debug, Clone, Default)]
pub struct RegistrationPolicy {
    pub allowed_redirect_prefixes: Vec<String>,
}

impl RegistrationPolicy {
    fn check(&self, redirect_uris: &[String]) -> Result<()> {
        if self.allowed_redirect_prefixes.is_empty() {
            return Ok(());
        }
        for uri in redirect_uris {
            let allowed = self
                .allowed_redirect_prefixes
                .iter()
                .any(|prefix| uri.starts_with(prefix.as_str()));
            if !allowed {
                warn!(redirect_uri = %uri, "redirect uri rejected by allow-list");
                return Err(OAuthError::InvalidRedirectUri(format!(
                    "redirect uri not allowed: {uri}"
                )));
            }
        }
        Ok(())
    }
}

/// Issue a fresh client identity and store it.
pub async fn register(
    store: &dyn CredentialStore,
    policy: &RegistrationPolicy,
    request: RegistrationRequest,
) -> Result<RegistrationResponse> {
    policy.check(&request.redirect_uris)?;

    let client = Client {
        client_id: random_token("client_"),
        client_secret: random_token("secret_"),
        client_name: request.client_name,
        redirect_uris: request.redirect_uris,
        created_at: now_secs(),
    };

    info!(
        client_id = %client.client_id,
        redirect_uris = client.redirect_uris.len(),
        "registered client"
    );

    let response = RegistrationResponse {
        client_id: client.client_id.clone(),
        client_secret: client.client_secret.clone(),
        client_id_issued_at: client.created_at,
        redirect_uris: client.redirect_uris.clone(),
        client_name: client.client_name.clone(),
        grant_types: vec![GRANT_AUTHORIZATION_CODE.into(), GRANT_REFRESH_TOKEN.into()],
        response_types: vec!["code".into()],
        token_endpoint_auth_method: "none".into(),
    };

    store.insert_client(client).await;
    Ok(response)
}
