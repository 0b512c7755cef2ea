//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults.
//! The push token comes from PUSHPLUS_TOKEN or `pushplus.token_file`,
//! never from the TOML directly to avoid leaking secrets.

use common::Secret;
use oauth_server::{
    DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_CODE_TTL_SECS, DEFAULT_REFRESH_TOKEN_TTL_SECS,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "pushplus-mcp.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub pushplus: PushPlusConfig,
    pub oauth: OAuthConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Externally reachable URL used in discovery metadata. Derived from the
    /// listen port when left empty.
    pub base_url: String,
    pub max_connections: usize,
    /// Require a valid access token on the JSON-RPC and tool routes.
    pub require_bearer_token: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            base_url: String::new(),
            max_connections: 1000,
            require_bearer_token: false,
        }
    }
}

/// Outbound push service settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PushPlusConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub template: String,
    /// Path to a file containing the token (alternative to PUSHPLUS_TOKEN)
    pub token_file: Option<PathBuf>,
    #[serde(skip)]
    pub token: Option<Secret<String>>,
}

impl Default for PushPlusConfig {
    fn default() -> Self {
        Self {
            endpoint: notifier::DEFAULT_ENDPOINT.into(),
            timeout_secs: 10,
            template: "html".into(),
            token_file: None,
            token: None,
        }
    }
}

/// Credential lifetimes and registration policy
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub code_ttl_secs: u64,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    /// Redirect URI prefixes accepted at registration. Empty accepts any.
    pub allowed_redirect_prefixes: Vec<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            code_ttl_secs: DEFAULT_CODE_TTL_SECS,
            access_token_ttl_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
            refresh_token_ttl_secs: DEFAULT_REFRESH_TOKEN_TTL_SECS,
            sweep_interval_secs: 60,
            allowed_redirect_prefixes: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then overlay
    /// environment variables and validate.
    ///
    /// Token resolution order:
    /// 1. PUSHPLUS_TOKEN env var
    /// 2. token_file path from config
    pub fn load(path: Option<&Path>) -> common::Result<Self> {
        let mut config: Config = match path {
            Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
            None => Config::default(),
        };

        if let Ok(port) = std::env::var("PORT") {
            let port: u16 = port.trim().parse().map_err(|e| common::Error::Env {
                name: "PORT".into(),
                reason: format!("{e}"),
            })?;
            config.server.listen_addr.set_port(port);
        }

        if let Some(base_url) = std::env::var("BASE_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())
        {
            config.server.base_url = base_url.trim().to_owned();
        }
        if config.server.base_url.is_empty() {
            config.server.base_url = format!("http://localhost:{}", config.server.listen_addr.port());
        }

        config.validate()?;

        // Resolve token: env var takes precedence over file
        if let Some(token) = std::env::var("PUSHPLUS_TOKEN")
            .ok()
            .and_then(|t| Secret::non_empty(&t))
        {
            config.pushplus.token = Some(token);
        } else if let Some(ref token_file) = config.pushplus.token_file {
            let token = std::fs::read_to_string(token_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read token_file {}: {e}",
                    token_file.display()
                ))
            })?;
            config.pushplus.token = Secret::non_empty(&token);
        }

        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        let base_url = &self.server.base_url;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {base_url}"
            )));
        }

        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.pushplus.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        let durations = [
            ("code_ttl_secs", self.oauth.code_ttl_secs),
            ("access_token_ttl_secs", self.oauth.access_token_ttl_secs),
            ("refresh_token_ttl_secs", self.oauth.refresh_token_ttl_secs),
            ("sweep_interval_secs", self.oauth.sweep_interval_secs),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, secs)| *secs == 0) {
            return Err(common::Error::Config(format!(
                "{name} must be greater than 0"
            )));
        }

        Ok(())
    }

    /// Resolve the config file from the CLI arg, the CONFIG_PATH env var, or
    /// `pushplus-mcp.toml` in the working directory. `None` means built-in
    /// defaults.
    pub fn resolve_path(cli_path: Option<&str>) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(PathBuf::from(p));
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return Some(PathBuf::from(p));
        }
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        local.exists().then_some(local)
    }
}
