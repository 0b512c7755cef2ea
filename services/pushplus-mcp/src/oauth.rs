//! HTTP handlers for discovery, registration, authorization and token
//! endpoints. Protocol logic lives in `oauth_server`; these functions only
//! translate between axum and that crate.

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use oauth_server::{AuthorizeRequest, OAuthError, RegistrationRequest, TokenRequest};
use tracing::{info, warn};

use crate::AppState;
use crate::metrics;

/// Render an OAuth error as `{"error", "error_description"}`.
pub fn error_response(err: &OAuthError) -> Response {
    let status = match err {
        OAuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
        _ => StatusCode::BAD_REQUEST,
    };
    (status, Json(err.to_body())).into_response()
}

pub async fn protected_resource(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.discovery.protected_resource())
}

pub async fn authorization_server(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.discovery.authorization_server())
}

/// `POST /register`. An empty body registers a client with no redirect URIs.
pub async fn register(State(state): State<AppState>, body: Bytes) -> Response {
    let request: RegistrationRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RegistrationRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "malformed registration request");
                return error_response(&OAuthError::InvalidClientMetadata(
                    "request body must be a JSON client metadata document".into(),
                ));
            }
        }
    };

    match oauth_server::register(state.store.as_ref(), &state.registration, request).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// `GET /authorize`. Approves immediately and redirects with the code.
pub async fn authorize(
    State(state): State<AppState>,
    query: Result<Query<AuthorizeRequest>, QueryRejection>,
) -> Response {
    let request = match query {
        Ok(Query(request)) => request,
        Err(e) => {
            warn!(error = %e, "malformed authorize query");
            return error_response(&OAuthError::InvalidRequest(
                "malformed query string".into(),
            ));
        }
    };

    match oauth_server::authorize(state.store.as_ref(), request, state.lifetimes.code_secs).await {
        Ok(location) => Redirect::to(&location).into_response(),
        Err(e) => error_response(&e),
    }
}

/// `POST /token`. Accepts form-encoded bodies, or JSON when the content type
/// says so.
pub async fn token(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request = match parse_token_request(&headers, &body) {
        Ok(request) => request,
        Err(e) => {
            metrics::record_token_error(e.code());
            return error_response(&e);
        }
    };
    let grant_type = request.grant_type.clone();

    match oauth_server::exchange(state.store.as_ref(), &state.lifetimes, request).await {
        Ok(tokens) => {
            metrics::record_token_issued(&grant_type);
            info!(grant_type = %grant_type, "tokens issued");
            (
                StatusCode::OK,
                [(header::CACHE_CONTROL, "no-store")],
                Json(tokens),
            )
                .into_response()
        }
        Err(e) => {
            metrics::record_token_error(e.code());
            warn!(
                grant_type = %grant_type,
                error = e.code(),
                description = e.description(),
                "token request rejected"
            );
            error_response(&e)
        }
    }
}

fn parse_token_request(headers: &HeaderMap, body: &[u8]) -> oauth_server::Result<TokenRequest> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    if is_json {
        serde_json::from_slice(body)
            .map_err(|e| OAuthError::InvalidRequest(format!("malformed JSON body: {e}")))
    } else {
        serde_urlencoded::from_bytes(body)
            .map_err(|e| OAuthError::InvalidRequest(format!("malformed form body: {e}")))
    }
}
