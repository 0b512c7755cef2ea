//! Outbound notification delivery for the `send_wechat_message` tool
//!
//! Defines the `Notifier` trait the JSON-RPC dispatcher calls to run its one
//! tool. Delivery never fails at the Rust level: every result, including
//! network errors, comes back as an `Outcome` the dispatcher renders as
//! tool output text.

pub mod pushplus;

pub use pushplus::{DEFAULT_ENDPOINT, PushPlusNotifier};

use std::future::Future;
use std::pin::Pin;

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The push service accepted the message.
    Delivered,
    /// The push service answered but refused the message.
    Rejected(String),
    /// The push service could not be reached or answered garbage.
    TransportError(String),
}

impl Outcome {
    /// Label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Delivered => "delivered",
            Outcome::Rejected(_) => "rejected",
            Outcome::TransportError(_) => "transport_error",
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Outcome::Delivered)
    }
}

/// A channel that can deliver a titled notification.
///
/// Uses `Pin<Box<dyn Future>>` so the dispatcher can hold `Arc<dyn Notifier>`.
pub trait Notifier: Send + Sync {
    /// Identifier for logging and health reporting (e.g. "pushplus")
    fn id(&self) -> &str;

    /// Whether credentials for the downstream service are present.
    fn is_configured(&self) -> bool;

    /// Deliver one message. Makes a single attempt, no retries.
    fn send_notification<'a>(
        &'a self,
        title: &'a str,
        content: &'a str,
    ) -> Pin<Box<dyn Future<Output = Outcome> + Send + 'a>>;
}
