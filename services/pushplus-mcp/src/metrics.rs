//! Prometheus metrics exposition
//!
//! - `mcp_rpc_requests_total` (counter): label `method`
//! - `mcp_tool_calls_total` (counter): label `outcome`
//! - `oauth_tokens_issued_total` (counter): label `grant_type`
//! - `oauth_token_errors_total` (counter): label `error`
//!
//! Plain atomic counters in `ServiceCounters` back the `/health` document.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// JSON-RPC methods counted under their own label; anything else is "unknown"
/// so arbitrary client input cannot grow label cardinality.
const KNOWN_METHODS: &[&str] = &[
    "initialize",
    "notifications/initialized",
    "tools/list",
    "tools/call",
    "ping",
];

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Record one dispatched JSON-RPC message.
pub fn record_rpc_request(method: &str) {
    let label = if KNOWN_METHODS.contains(&method) {
        method
    } else {
        "unknown"
    };
    metrics::counter!("mcp_rpc_requests_total", "method" => label.to_string()).increment(1);
}

/// Record a tool invocation by delivery outcome.
pub fn record_tool_call(outcome: &str) {
    metrics::counter!("mcp_tool_calls_total", "outcome" => outcome.to_string()).increment(1);
}

pub fn record_token_issued(grant_type: &str) {
    metrics::counter!("oauth_tokens_issued_total", "grant_type" => grant_type.to_string())
        .increment(1);
}

pub fn record_token_error(error: &str) {
    metrics::counter!("oauth_token_errors_total", "error" => error.to_string()).increment(1);
}

/// Counters reported by `/health`.
#[derive(Clone)]
pub struct ServiceCounters {
    pub requests_served: Arc<AtomicU64>,
    pub tool_calls: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl ServiceCounters {
    pub fn new() -> Self {
        Self {
            requests_served: Arc::new(AtomicU64::new(0)),
            tool_calls: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn request_served(&self) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
    }
}
