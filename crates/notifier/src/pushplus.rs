//! PushPlus delivery - forwards a message to WeChat through pushplus.plus
//!
//! One GET to the send endpoint with the pre-shared token as a query
//! parameter. The service answers HTTP 200 with a JSON envelope whose
//! `code` field is 200 on success; any other code carries a reason in `msg`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use common::Secret;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::{Notifier, Outcome};

/// Public PushPlus send endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://www.pushplus.plus/send";

/// Message body template understood by PushPlus.
const DEFAULT_TEMPLATE: &str = "html";

/// Application-level success code in the PushPlus envelope.
const PUSHPLUS_OK: i64 = 200;

#[derive(Debug, Deserialize)]
struct PushPlusReply {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
}

/// Notifier backed by the PushPlus HTTP API.
pub struct PushPlusNotifier {
    client: reqwest::Client,
    endpoint: String,
    token: Option<Secret<String>>,
    template: String,
    timeout: Duration,
}

impl PushPlusNotifier {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        token: Option<Secret<String>>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            token,
            template: DEFAULT_TEMPLATE.into(),
            timeout,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    fn timed_out(&self) -> Outcome {
        warn!(timeout_secs = self.timeout.as_secs_f64(), "push request timed out");
        Outcome::TransportError(format!(
            "request timed out after {:.1}s",
            self.timeout.as_secs_f64()
        ))
    }

    #[instrument(skip_all, fields(title_len = title.len(), content_len = content.len()))]
    async fn deliver(&self, title: &str, content: &str) -> Outcome {
        let Some(token) = self.token.as_ref() else {
            warn!("push token not configured, refusing to send");
            return Outcome::Rejected("push token not configured".into());
        };

        let response = match self
            .client
            .get(&self.endpoint)
            .query(&[
                ("token", token.expose().as_str()),
                ("title", title),
                ("content", content),
                ("template", self.template.as_str()),
            ])
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return self.timed_out(),
            Err(e) => {
                // The URL carries the token as a query parameter.
                let e = e.without_url();
                warn!(error = %e, "push request failed");
                return Outcome::TransportError(format!("request failed: {e}"));
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "push service returned non-success status");
            return Outcome::TransportError(format!("push service returned {status}"));
        }

        // The timeout also covers reading the body.
        let reply = match response.json::<PushPlusReply>().await {
            Ok(reply) => reply,
            Err(e) if e.is_timeout() => return self.timed_out(),
            Err(e) => {
                let e = e.without_url();
                warn!(error = %e, "push service returned an unreadable body");
                return Outcome::TransportError(format!("invalid response from push service: {e}"));
            }
        };

        if reply.code == PUSHPLUS_OK {
            debug!("push accepted");
            Outcome::Delivered
        } else {
            let reason = reply
                .msg
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| String::from("unknown error"));
            warn!(code = reply.code, reason = %reason, "push rejected");
            Outcome::Rejected(reason)
        }
    }
}

impl Notifier for PushPlusNotifier {
    fn id(&self) -> &str {
        "pushplus"
    }

    fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    fn send_notification<'a>(
        &'a self,
        title: &'a str,
        content: &'a str,
    ) -> Pin<Box<dyn Future<Output = Outcome> + Send + 'a>> {
        Box::pin(self.deliver(title, content))
    }
}
