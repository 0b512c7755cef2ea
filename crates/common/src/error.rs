//! Configuration and startup error types

use thiserror::Error;

/// Errors raised while assembling service configuration.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value for environment variable {name}: {reason}")]
    Env { name: String, reason: String },
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;
