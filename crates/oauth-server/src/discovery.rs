//! OAuth discovery documents (RFC 9728 and RFC 8414)
//!
//! MCP clients fetch the protected-resource metadata first, take the bare
//! base URL from `authorization_servers`, append the well-known suffix
//! themselves, and then read the authorization-server metadata.

use serde::Serialize;

use crate::constants::{
    AUTHORIZE_PATH, CODE_CHALLENGE_METHOD_S256, GRANT_AUTHORIZATION_CODE, GRANT_REFRESH_TOKEN,
    PROTECTED_RESOURCE_PATH, REGISTER_PATH, SCOPE, TOKEN_PATH,
};

/// RFC 9728 §3 protected-resource metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ProtectedResourceMetadata {
    pub resource: String,
    /// Bare base URLs. Never suffixed with a discovery path.
    pub authorization_servers: Vec<String>,
    pub scopes_supported: Vec<String>,
    pub bearer_methods_supported: Vec<String>,
}

/// RFC 8414 §2 authorization-server metadata.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub registration_endpoint: String,
    pub response_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
}

/// Builds discovery documents from the externally reachable base URL.
#[derive(Debug, Clone)]
pub struct Discovery {
    base_url: String,
}

impl Discovery {
    /// Trailing slashes are stripped so endpoint joins stay clean.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Absolute URL of the protected-resource document, used in
    /// `WWW-Authenticate` challenges.
    pub fn resource_metadata_url(&self) -> String {
        format!("{}{PROTECTED_RESOURCE_PATH}", self.base_url)
    }

    pub fn protected_resource(&self) -> ProtectedResourceMetadata {
        ProtectedResourceMetadata {
            resource: self.base_url.clone(),
            authorization_servers: vec![self.base_url.clone()],
            scopes_supported: vec![SCOPE.into()],
            bearer_methods_supported: vec!["header".into()],
        }
    }

    pub fn authorization_server(&self) -> AuthorizationServerMetadata {
        AuthorizationServerMetadata {
            issuer: self.base_url.clone(),
            authorization_endpoint: format!("{}{AUTHORIZE_PATH}", self.base_url),
            token_endpoint: format!("{}{TOKEN_PATH}", self.base_url),
            registration_endpoint: format!("{}{REGISTER_PATH}", self.base_url),
            response_types_supported: vec!["code".into()],
            grant_types_supported: vec![
                GRANT_AUTHORIZATION_CODE.into(),
                GRANT_REFRESH_TOKEN.into(),
            ],
            token_endpoint_auth_methods_supported: vec![
                "none".into(),
                "client_secret_post".into(),
            ],
            code_challenge_methods_supported: vec![CODE_CHALLENGE_METHOD_S256.into()],
            scopes_supported: vec![SCOPE.into()],
        }
    }
}
