//! HTTP transport for the JSON-RPC endpoint and the legacy tool routes
//!
//! `/` answers GET with a service descriptor, HEAD as a liveness probe,
//! DELETE as a no-op session teardown and POST with JSON-RPC. When
//! `require_bearer_token` is set, POST `/` and the `/tools/*` routes need a
//! valid access token.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{Instrument, debug, info_span, warn};

use crate::AppState;
use crate::rpc::{self, PARSE_ERROR, Reply, SERVER_NAME, SERVER_VERSION, TOOL_NAME};

pub async fn root_head() -> StatusCode {
    StatusCode::OK
}

pub async fn root_get() -> impl IntoResponse {
    Json(json!({
        "name": SERVER_NAME,
        "version": SERVER_VERSION,
        "description": "MCP server that sends WeChat messages through PushPlus",
    }))
}

pub async fn root_delete() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// `POST /` - one JSON-RPC message or a batch.
pub async fn root_post(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request_id = new_request_id();
    let span = info_span!("rpc", request_id = %request_id);

    async move {
        if let Err(rejection) = check_bearer(&state, &headers).await {
            return rejection;
        }
        state.counters.request_served();

        let payload: Value = match serde_json::from_slice(&body) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "unparseable JSON-RPC body");
                return (
                    StatusCode::BAD_REQUEST,
                    Json(rpc::error_response(Value::Null, PARSE_ERROR, "Parse error")),
                )
                    .into_response();
            }
        };

        match state.dispatcher.handle(payload).await {
            Reply::Empty => StatusCode::NO_CONTENT.into_response(),
            Reply::One(response) => Json(response).into_response(),
            Reply::Batch(responses) => Json(Value::Array(responses)).into_response(),
        }
    }
    .instrument(span)
    .await
}

/// `POST /tools/list`
pub async fn legacy_tools_list(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(rejection) = check_bearer(&state, &headers).await {
        return rejection;
    }
    state.counters.request_served();
    Json(json!({"tools": [rpc::tool_descriptor()]})).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct LegacyToolCall {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// `POST /tools/call` - `{name, arguments}` without the JSON-RPC envelope.
pub async fn legacy_tools_call(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = new_request_id();
    let span = info_span!("tool_call", request_id = %request_id);

    async move {
        if let Err(rejection) = check_bearer(&state, &headers).await {
            return rejection;
        }
        state.counters.request_served();

        let call: LegacyToolCall = match serde_json::from_slice(&body) {
            Ok(call) => call,
            Err(e) => {
                warn!(error = %e, "unparseable tool call body");
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "Invalid JSON body"})),
                )
                    .into_response();
            }
        };

        if call.name != TOOL_NAME {
            warn!(tool = %call.name, "unknown tool requested");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("Unknown tool: {}", call.name)})),
            )
                .into_response();
        }

        let output = state.dispatcher.call_tool(&call.arguments).await;
        Json(output.to_result()).into_response()
    }
    .instrument(span)
    .await
}

fn new_request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().as_simple())
}

/// Validate `Authorization: Bearer <token>` when the gate is enabled.
async fn check_bearer(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    if !state.require_bearer {
        return Ok(());
    }

    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        debug!("request without bearer token");
        return Err(unauthorized(state));
    };

    match oauth_server::validate_access_token(state.store.as_ref(), token).await {
        Ok(_) => Ok(()),
        Err(e) => {
            warn!(error = %e, "bearer token rejected");
            Err(unauthorized(state))
        }
    }
}

fn unauthorized(state: &AppState) -> Response {
    let challenge = format!(
        "Bearer resource_metadata=\"{}\"",
        state.discovery.resource_metadata_url()
    );
    let mut response = (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "invalid_token"})),
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&challenge) {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, value);
    }
    response
}
