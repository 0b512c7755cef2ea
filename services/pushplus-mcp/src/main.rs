//! PushPlus MCP server
//!
//! Single-binary Rust service that:
//! 1. Serves OAuth 2.1 discovery, registration, authorization and token endpoints
//! 2. Answers MCP JSON-RPC on `/` with one tool, `send_wechat_message`
//! 3. Delivers tool calls to WeChat through the PushPlus API

mod config;
mod metrics;
mod oauth;
mod rpc;
mod transport;

use anyhow::{Context, Result};
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use notifier::Notifier;
use oauth_server::{
    AUTHORIZATION_SERVER_PATH, AUTHORIZE_PATH, CredentialStore, Discovery, Lifetimes,
    MemoryStore, OPENID_CONFIGURATION_PATH, PROTECTED_RESOURCE_PATH, REGISTER_PATH,
    RegistrationPolicy, TOKEN_PATH,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::metrics::ServiceCounters;
use crate::rpc::Dispatcher;

/// Time allowed for in-flight requests after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    store: Arc<dyn CredentialStore>,
    discovery: Discovery,
    lifetimes: Lifetimes,
    registration: RegistrationPolicy,
    dispatcher: Dispatcher,
    require_bearer: bool,
    counters: ServiceCounters,
    prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// The discovery documents are also served under any path suffix, for
/// clients that append the resource path to the well-known URL.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route(PROTECTED_RESOURCE_PATH, get(oauth::protected_resource))
        .route(
            &format!("{PROTECTED_RESOURCE_PATH}/{{*rest}}"),
            get(oauth::protected_resource),
        )
        .route(AUTHORIZATION_SERVER_PATH, get(oauth::authorization_server))
        .route(
            &format!("{AUTHORIZATION_SERVER_PATH}/{{*rest}}"),
            get(oauth::authorization_server),
        )
        .route(OPENID_CONFIGURATION_PATH, get(oauth::authorization_server))
        .route(REGISTER_PATH, post(oauth::register))
        .route(AUTHORIZE_PATH, get(oauth::authorize))
        .route(TOKEN_PATH, post(oauth::token))
        .route(
            "/",
            get(transport::root_get)
                .head(transport::root_head)
                .post(transport::root_post)
                .delete(transport::root_delete),
        )
        .route("/tools/list", post(transport::legacy_tools_list))
        .route("/tools/call", post(transport::legacy_tools_call))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(version = rpc::SERVER_VERSION, "starting pushplus-mcp");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder()?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    match &config_path {
        Some(path) => info!(path = %path.display(), "loading configuration"),
        None => info!("no config file found, using defaults"),
    }

    let mut config = Config::load(config_path.as_deref()).context("failed to load config")?;

    info!(
        listen_addr = %config.server.listen_addr,
        base_url = %config.server.base_url,
        require_bearer_token = config.server.require_bearer_token,
        push_endpoint = %config.pushplus.endpoint,
        "configuration loaded"
    );

    let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::new());
    let sweeper = oauth_server::spawn_sweep_task(
        store.clone(),
        Duration::from_secs(config.oauth.sweep_interval_secs),
    );

    let http_client = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let push = notifier::PushPlusNotifier::new(
        http_client,
        config.pushplus.endpoint.clone(),
        config.pushplus.token.take(),
        Duration::from_secs(config.pushplus.timeout_secs),
    )
    .with_template(config.pushplus.template.clone());
    if !push.is_configured() {
        warn!("PUSHPLUS_TOKEN not set, tool calls will fail until it is configured");
    }

    let counters = ServiceCounters::new();
    let dispatcher = Dispatcher::new(Arc::new(push), counters.tool_calls.clone());

    let app_state = AppState {
        store,
        discovery: Discovery::new(&config.server.base_url),
        lifetimes: Lifetimes {
            code_secs: config.oauth.code_ttl_secs,
            access_token_secs: config.oauth.access_token_ttl_secs,
            refresh_token_secs: config.oauth.refresh_token_ttl_secs,
        },
        registration: RegistrationPolicy {
            allowed_redirect_prefixes: config.oauth.allowed_redirect_prefixes.clone(),
        },
        dispatcher,
        require_bearer: config.server.require_bearer_token,
        counters,
        prometheus: prometheus_handle,
    };

    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires, not when the
    // server starts.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());
    sweeper.abort();

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Health endpoint: 200 when the push token is configured, 503 otherwise.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let configured = state.dispatcher.notifier().is_configured();
    let status_code = if configured {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };

    let body = serde_json::json!({
        "status": if configured { "healthy" } else { "degraded" },
        "uptime_seconds": state.counters.started_at.elapsed().as_secs(),
        "requests_served": state.counters.requests_served.load(Ordering::Relaxed),
        "tool_calls": state.counters.tool_calls.load(Ordering::Relaxed),
        "push_token_configured": configured,
    });

    (status_code, Json(body))
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::tests::StubNotifier;
    use axum::body::Body;
    use axum::http::{HeaderMap, Request, StatusCode, header};
    use notifier::Outcome;
    use oauth_server::pkce::compute_challenge;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const BASE_URL: &str = "https://push.example.com";
    const REDIRECT_URI: &str = "https://app.example/cb";
    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

    /// Create a PrometheusHandle for tests without installing a global recorder.
    fn test_prometheus_handle() -> PrometheusHandle {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        recorder.handle()
    }

    fn test_app_with(notifier: Arc<dyn Notifier>, require_bearer: bool) -> Router {
        let counters = ServiceCounters::new();
        let state = AppState {
            store: Arc::new(MemoryStore::new()),
            discovery: Discovery::new(BASE_URL),
            lifetimes: Lifetimes::default(),
            registration: RegistrationPolicy::default(),
            dispatcher: Dispatcher::new(notifier, counters.tool_calls.clone()),
            require_bearer,
            counters,
            prometheus: test_prometheus_handle(),
        };
        build_router(state, 100)
    }

    fn test_app(require_bearer: bool) -> Router {
        test_app_with(Arc::new(StubNotifier::new(Outcome::Delivered)), require_bearer)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        (status, headers, body)
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        let (status, _, body) = send(app, Request::get(uri).body(Body::empty()).unwrap()).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn json_post(uri: &str, body: &Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn form_post(uri: &str, pairs: &[(&str, &str)]) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(serde_urlencoded::to_string(pairs).unwrap()))
            .unwrap()
    }

    fn query_param(location: &str, key: &str) -> Option<String> {
        let query = location.split_once('?')?.1;
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).ok()?;
        pairs.into_iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Register a client and run /authorize; returns (client_id, code).
    async fn obtain_code(app: &Router) -> (String, String) {
        let (status, _, body) = send(
            app,
            json_post(
                "/register",
                &json!({"redirect_uris": [REDIRECT_URI], "client_name": "test"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let registered: Value = serde_json::from_slice(&body).unwrap();
        let client_id = registered["client_id"].as_str().unwrap().to_owned();

        let query = serde_urlencoded::to_string([
            ("client_id", client_id.as_str()),
            ("redirect_uri", REDIRECT_URI),
            ("state", "st-1"),
            ("code_challenge", compute_challenge(VERIFIER).as_str()),
            ("code_challenge_method", "S256"),
        ])
        .unwrap();
        let (status, headers, _) = send(
            app,
            Request::get(format!("/authorize?{query}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        let location = headers[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with(REDIRECT_URI));
        assert_eq!(query_param(location, "state").as_deref(), Some("st-1"));
        let code = query_param(location, "code").unwrap();
        (client_id, code)
    }

    async fn obtain_access_token(app: &Router) -> Value {
        let (client_id, code) = obtain_code(app).await;
        let (status, headers, body) = send(
            app,
            form_post(
                "/token",
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code.as_str()),
                    ("code_verifier", VERIFIER),
                    ("client_id", client_id.as_str()),
                    ("redirect_uri", REDIRECT_URI),
                ],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CACHE_CONTROL], "no-store");
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn discovery_documents_are_served() {
        let app = test_app(false);

        let (status, doc) = get_json(&app, "/.well-known/oauth-protected-resource").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(doc["authorization_servers"], json!([BASE_URL]));

        let (_, suffixed) = get_json(&app, "/.well-known/oauth-protected-resource/mcp").await;
        assert_eq!(suffixed, doc);

        let (status, metadata) = get_json(&app, "/.well-known/oauth-authorization-server").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(metadata["token_endpoint"], format!("{BASE_URL}/token"));

        let (_, openid) = get_json(&app, "/.well-known/openid-configuration").await;
        assert_eq!(openid, metadata);

        let (_, suffixed) = get_json(&app, "/.well-known/oauth-authorization-server/mcp").await;
        assert_eq!(suffixed, metadata);
    }

    #[tokio::test]
    async fn full_flow_issues_tokens_once() {
        let app = test_app(false);
        let (client_id, code) = obtain_code(&app).await;
        let exchange = [
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("code_verifier", VERIFIER),
            ("client_id", client_id.as_str()),
        ];

        let (status, _, body) = send(&app, form_post("/token", &exchange)).await;
        assert_eq!(status, StatusCode::OK);
        let tokens: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(tokens["token_type"], "Bearer");
        assert_eq!(tokens["expires_in"], 86_400);
        assert_eq!(tokens["scope"], "mcp:tools");
        assert!(tokens["access_token"].as_str().unwrap().starts_with("at_"));

        let (status, _, body) = send(&app, form_post("/token", &exchange)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(err["error"], "invalid_grant");
    }

    #[tokio::test]
    async fn pkce_mismatch_is_invalid_grant() {
        let app = test_app(false);
        let (_, code) = obtain_code(&app).await;
        let (status, _, body) = send(
            &app,
            form_post(
                "/token",
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code.as_str()),
                    ("code_verifier", "not-the-verifier"),
                ],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(err["error"], "invalid_grant");
        assert_eq!(err["error_description"], "PKCE verification failed");
    }

    #[tokio::test]
    async fn unknown_code_is_invalid_grant() {
        let app = test_app(false);
        let (status, _, body) = send(
            &app,
            form_post(
                "/token",
                &[("grant_type", "authorization_code"), ("code", "code_abc")],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(err["error"], "invalid_grant");
    }

    #[tokio::test]
    async fn unsupported_grant_type_is_rejected() {
        let app = test_app(false);
        let (status, _, body) = send(
            &app,
            form_post("/token", &[("grant_type", "client_credentials")]),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(err["error"], "unsupported_grant_type");
    }

    #[tokio::test]
    async fn refresh_token_rotates_via_json_body() {
        let app = test_app(false);
        let tokens = obtain_access_token(&app).await;
        let refresh = tokens["refresh_token"].as_str().unwrap();

        let (status, _, body) = send(
            &app,
            json_post(
                "/token",
                &json!({"grant_type": "refresh_token", "refresh_token": refresh}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let rotated: Value = serde_json::from_slice(&body).unwrap();
        assert_ne!(rotated["refresh_token"], tokens["refresh_token"]);

        // The old refresh token was consumed
        let (status, _, _) = send(
            &app,
            form_post(
                "/token",
                &[("grant_type", "refresh_token"), ("refresh_token", refresh)],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_registration_is_invalid_client_metadata() {
        let app = test_app(false);
        let (status, _, body) = send(
            &app,
            Request::post("/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{oops"))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(err["error"], "invalid_client_metadata");
    }

    #[tokio::test]
    async fn authorize_without_client_id_is_invalid_request() {
        let app = test_app(false);
        let (status, _, body) = send(
            &app,
            Request::get("/authorize?redirect_uri=https%3A%2F%2Fapp.example%2Fcb")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(err["error"], "invalid_request");
    }

    #[tokio::test]
    async fn authorize_with_control_character_in_redirect_is_json_400() {
        let app = test_app(false);
        let (status, headers, body) = send(
            &app,
            Request::get("/authorize?client_id=c&redirect_uri=https%3A%2F%2Fa.example%2Fcb%0Ax")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(headers.get(header::LOCATION).is_none());
        let err: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(err["error"], "invalid_request");
    }

    #[tokio::test]
    async fn root_head_get_delete() {
        let app = test_app(false);

        let (status, _, body) = send(&app, Request::head("/").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());

        let (status, descriptor) = get_json(&app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(descriptor["name"], "pushplus-wechat");
        assert!(descriptor["version"].is_string());
        assert!(descriptor["description"].is_string());

        let (status, _, _) = send(&app, Request::delete("/").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn malformed_rpc_body_is_parse_error() {
        let app = test_app(false);
        let (status, _, body) = send(
            &app,
            Request::post("/")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"jsonrpc\": "))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let response: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(response["error"]["code"], -32700);
        assert_eq!(response["id"], Value::Null);
    }

    #[tokio::test]
    async fn notification_only_body_is_204() {
        let app = test_app(false);
        let (status, _, body) = send(
            &app,
            json_post(
                "/",
                &json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn tools_call_over_http() {
        let app = test_app(false);
        let (status, _, body) = send(
            &app,
            json_post(
                "/",
                &json!({
                    "jsonrpc": "2.0", "id": 1, "method": "tools/call",
                    "params": {"name": "send_wechat_message", "arguments": {"title": "hi", "content": "there"}}
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let response: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(response["id"], 1);
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("hi") && text.contains("there"));
    }

    #[tokio::test]
    async fn batch_over_http_returns_array() {
        let app = test_app(false);
        let (status, _, body) = send(
            &app,
            json_post(
                "/",
                &json!([
                    {"jsonrpc": "2.0", "id": 1, "method": "ping"},
                    {"jsonrpc": "2.0", "id": 2, "method": "tools/list"}
                ]),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let responses: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(responses.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn bearer_gate_rejects_missing_and_unknown_tokens() {
        let app = test_app(true);
        let ping = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});

        let (status, headers, body) = send(&app, json_post("/", &ping)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            headers[header::WWW_AUTHENTICATE],
            "Bearer resource_metadata=\"https://push.example.com/.well-known/oauth-protected-resource\""
        );
        let err: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(err, json!({"error": "invalid_token"}));

        let mut request = json_post("/", &ping);
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, "Bearer at_forged".parse().unwrap());
        let (status, _, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _, _) = send(&app, json_post("/tools/list", &json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bearer_gate_accepts_issued_token() {
        let app = test_app(true);
        let tokens = obtain_access_token(&app).await;
        let bearer = format!("Bearer {}", tokens["access_token"].as_str().unwrap());

        let mut request = json_post("/", &json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}));
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, bearer.parse().unwrap());
        let (status, _, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        let response: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(response["result"], json!({}));
    }

    #[tokio::test]
    async fn bearer_scheme_is_case_insensitive() {
        let app = test_app(true);
        let tokens = obtain_access_token(&app).await;
        let access = tokens["access_token"].as_str().unwrap();

        for scheme in ["bearer", "BEARER"] {
            let mut request = json_post("/tools/list", &json!({}));
            request.headers_mut().insert(
                header::AUTHORIZATION,
                format!("{scheme} {access}").parse().unwrap(),
            );
            let (status, _, _) = send(&app, request).await;
            assert_eq!(status, StatusCode::OK, "scheme {scheme} must be accepted");
        }

        let mut request = json_post("/tools/list", &json!({}));
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, format!("Basic {access}").parse().unwrap());
        let (status, _, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn open_mode_serves_without_token() {
        let app = test_app(false);
        let (status, _, _) = send(
            &app,
            json_post("/", &json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn legacy_routes() {
        let app = test_app(false);

        let (status, _, body) = send(&app, json_post("/tools/list", &json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        let list: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(list["tools"][0]["name"], "send_wechat_message");

        let (status, _, body) = send(
            &app,
            json_post(
                "/tools/call",
                &json!({"name": "send_wechat_message", "arguments": {"title": "a", "content": "b"}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let result: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            result["content"][0]["text"],
            "Message sent successfully!\nTitle: a\nContent: b"
        );

        let (status, _, body) = send(
            &app,
            json_post("/tools/call", &json!({"name": "nope", "arguments": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(err, json!({"error": "Unknown tool: nope"}));
    }

    #[tokio::test]
    async fn health_reports_counters() {
        let app = test_app(false);
        send(
            &app,
            json_post(
                "/",
                &json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call",
                        "params": {"name": "send_wechat_message", "arguments": {}}}),
            ),
        )
        .await;

        let (status, health) = get_json(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["requests_served"], 1);
        assert_eq!(health["tool_calls"], 1);
        assert_eq!(health["push_token_configured"], true);
        assert!(health["uptime_seconds"].is_u64());
    }

    #[tokio::test]
    async fn health_degraded_without_push_token() {
        let app = test_app_with(Arc::new(StubNotifier::unconfigured()), false);
        let (status, health) = get_json(&app, "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(health["status"], "degraded");
        assert_eq!(health["push_token_configured"], false);
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_text() {
        let app = test_app(false);
        let (status, headers, _) =
            send(&app, Request::get("/metrics").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(
            headers[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
    }
}
