//! Fixed protocol values advertised by discovery and enforced by the endpoints

/// The only scope this server grants.
pub const SCOPE: &str = "mcp:tools";

/// The only PKCE transformation accepted.
pub const CODE_CHALLENGE_METHOD_S256: &str = "S256";

pub const TOKEN_TYPE_BEARER: &str = "Bearer";

pub const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";
pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";

/// Authorization codes live for five minutes.
pub const DEFAULT_CODE_TTL_SECS: u64 = 300;

/// Access tokens live for 24 hours.
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 86_400;

/// Refresh tokens live for 30 days.
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: u64 = 30 * 86_400;

pub const PROTECTED_RESOURCE_PATH: &str = "/.well-known/oauth-protected-resource";
pub const AUTHORIZATION_SERVER_PATH: &str = "/.well-known/oauth-authorization-server";
pub const OPENID_CONFIGURATION_PATH: &str = "/.well-known/openid-configuration";

pub const AUTHORIZE_PATH: &str = "/authorize";
pub const TOKEN_PATH: &str = "/token";
pub const REGISTER_PATH: &str = "/register";
