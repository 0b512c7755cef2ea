//! OAuth 2.1 authorization server for a single-tool MCP endpoint
//!
//! Implements Dynamic Client Registration, an auto-approving authorization
//! endpoint bound to PKCE (S256), and a token endpoint with single-use codes
//! and rotating refresh tokens. All state lives behind the `CredentialStore`
//! trait; `MemoryStore` is the in-process implementation.
//!
//! Flow:
//! 1. Client reads `discovery::Discovery` metadata
//! 2. `registration::register()` issues a client identity
//! 3. `authorize::authorize()` stores a code bound to the PKCE challenge
//! 4. `token::exchange()` redeems the code (once) for access + refresh tokens
//! 5. `token::exchange()` with `refresh_token` rotates both tokens
//! 6. `sweep::spawn_sweep_task()` drops expired records in the background

pub mod authorize;
pub mod constants;
pub mod discovery;
pub mod error;
pub mod pkce;
pub mod registration;
pub mod store;
pub mod sweep;
pub mod token;

pub use authorize::{AuthorizeRequest, authorize};
pub use constants::*;
pub use discovery::{AuthorizationServerMetadata, Discovery, ProtectedResourceMetadata};
pub use error::{OAuthError, Result};
pub use registration::{RegistrationPolicy, RegistrationRequest, RegistrationResponse, register};
pub use store::{AuthorizationCode, Client, CredentialStore, IssuedToken, MemoryStore, now_secs};
pub use sweep::spawn_sweep_task;
pub use token::{Lifetimes, TokenRequest, TokenResponse, exchange, validate_access_token};
