//! Types shared by the PushPlus MCP crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
