//! In-memory credential storage for clients, codes and tokens
//!
//! Handlers only ever see `Arc<dyn CredentialStore>`, so a persistent
//! backend can replace `MemoryStore` without touching endpoint logic.
//! `MemoryStore` keeps all four maps behind one tokio Mutex: every insert,
//! lookup and single-use removal is serialized, so two concurrent exchanges
//! of the same authorization code cannot both succeed.
//!
//! Nothing is persisted. A restart invalidates every outstanding credential.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

/// Boxed future returned by store operations (keeps the trait dyn-compatible).
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A dynamically registered client. Immutable once stored.
#[derive(Debug, Clone, Serialize)]
pub struct Client {
    pub client_id: String,
    pub client_secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    pub redirect_uris: Vec<String>,
    /// Unix seconds
    pub created_at: u64,
}

/// An issued authorization code awaiting exchange.
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    /// Unix seconds
    pub expires_at: u64,
}

impl AuthorizationCode {
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

/// An access or refresh token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub value: String,
    pub client_id: Option<String>,
    /// Unix seconds
    pub expires_at: u64,
}

impl IssuedToken {
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

/// Storage contract for the OAuth endpoints.
///
/// `take_*` methods are atomic get-and-delete: at most one caller ever
/// receives a given code or refresh token. Unknown keys yield `None`.
pub trait CredentialStore: Send + Sync {
    fn insert_client(&self, client: Client) -> StoreFuture<'_, ()>;

    fn client<'a>(&'a self, client_id: &'a str) -> StoreFuture<'a, Option<Client>>;

    fn insert_code(&self, code: AuthorizationCode) -> StoreFuture<'_, ()>;

    fn take_code<'a>(&'a self, code: &'a str) -> StoreFuture<'a, Option<AuthorizationCode>>;

    fn insert_access_token(&self, token: IssuedToken) -> StoreFuture<'_, ()>;

    fn access_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<IssuedToken>>;

    fn insert_refresh_token(&self, token: IssuedToken) -> StoreFuture<'_, ()>;

    fn take_refresh_token<'a>(&'a self, token: &'a str)
    -> StoreFuture<'a, Option<IssuedToken>>;

    /// Drop every code and token whose expiry is at or before `now`.
    /// Returns the number of records removed. Clients never expire.
    fn purge_expired(&self, now: u64) -> StoreFuture<'_, usize>;
}

#[derive(Default)]
struct Maps {
    clients: HashMap<String, Client>,
    codes: HashMap<String, AuthorizationCode>,
    access_tokens: HashMap<String, IssuedToken>,
    refresh_tokens: HashMap<String, IssuedToken>,
}

/// Process-local store guarded by a single lock.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<Maps>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn insert_client(&self, client: Client) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            debug!(client_id = %client.client_id, "stored client");
            state.clients.insert(client.client_id.clone(), client);
        })
    }

    fn client<'a>(&'a self, client_id: &'a str) -> StoreFuture<'a, Option<Client>> {
        Box::pin(async move { self.state.lock().await.clients.get(client_id).cloned() })
    }

    fn insert_code(&self, code: AuthorizationCode) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.codes.insert(code.code.clone(), code);
        })
    }

    fn take_code<'a>(&'a self, code: &'a str) -> StoreFuture<'a, Option<AuthorizationCode>> {
        Box::pin(async move { self.state.lock().await.codes.remove(code) })
    }

    fn insert_access_token(&self, token: IssuedToken) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.access_tokens.insert(token.value.clone(), token);
        })
    }

    fn access_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<IssuedToken>> {
        Box::pin(async move { self.state.lock().await.access_tokens.get(token).cloned() })
    }

    fn insert_refresh_token(&self, token: IssuedToken) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.refresh_tokens.insert(token.value.clone(), token);
        })
    }

    fn take_refresh_token<'a>(
        &'a self,
        token: &'a str,
    ) -> StoreFuture<'a, Option<IssuedToken>> {
        Box::pin(async move { self.state.lock().await.refresh_tokens.remove(token) })
    }

    fn purge_expired(&self, now: u64) -> StoreFuture<'_, usize> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let before =
                state.codes.len() + state.access_tokens.len() + state.refresh_tokens.len();
            state.codes.retain(|_, c| !c.is_expired(now));
            state.access_tokens.retain(|_, t| !t.is_expired(now));
            state.refresh_tokens.retain(|_, t| !t.is_expired(now));
            let after =
                state.codes.len() + state.access_tokens.len() + state.refresh_tokens.len();
            before - after
        })
    }
}

/// Current wall-clock time as unix seconds.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
