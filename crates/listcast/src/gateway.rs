//! Subscription negotiation with the external fan-out proxy (GRIP).
//!
//! ```text
//! GET /stream/sse?channel=c
//!     │
//!     ├─ no Grip-Sig ──► Negotiation::Handoff   (proxy re-issues the request signed)
//!     │
//!     └─ Grip-Sig ─────► Negotiation::Hold      (+ "ping" on c after a short delay)
//! ```
//!
//! Once the hold directive is returned, the proxy owns the connection.

use std::time::Duration;

use serde_json::json;
use tracing::debug;

use crate::broadcast::EventBroadcaster;

/// Header the fan-out proxy adds to requests it forwards.
pub const GRIP_SIG_HEADER: &str = "Grip-Sig";
pub const GRIP_HOLD_HEADER: &str = "Grip-Hold";
pub const GRIP_CHANNEL_HEADER: &str = "Grip-Channel";
pub const STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Some EventSource implementations only fire `open` after a first event.
///
/// The ping is at most once: it runs on a detached task, so a ping still
/// waiting out its delay when the runtime shuts down is never sent, and a
/// failed publish is not retried.
pub const DEFAULT_PING_DELAY: Duration = Duration::from_millis(10);

/// Response headers that tell the proxy to hold the connection open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldDirective {
    pub content_type: &'static str,
    pub hold_mode: &'static str,
    pub channel: String,
}

impl HoldDirective {
    pub fn stream(channel: impl Into<String>) -> Self {
        Self {
            content_type: STREAM_CONTENT_TYPE,
            hold_mode: "stream",
            channel: channel.into(),
        }
    }

    /// Header name/value pairs, in the order they are emitted.
    pub fn headers(&self) -> [(&'static str, &str); 3] {
        [
            ("Content-Type", self.content_type),
            (GRIP_HOLD_HEADER, self.hold_mode),
            (GRIP_CHANNEL_HEADER, self.channel.as_str()),
        ]
    }
}

/// Outcome of one subscription request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Negotiation {
    /// Not yet proxied: pass the raw request to the fan-out proxy.
    Handoff,
    /// Proxied: answer with the hold directive.
    Hold(HoldDirective),
}

#[derive(Debug, Clone)]
pub struct StreamGateway {
    broadcaster: EventBroadcaster,
    ping_delay: Duration,
}

impl StreamGateway {
    pub fn new(broadcaster: EventBroadcaster) -> Self {
        Self {
            broadcaster,
            ping_delay: DEFAULT_PING_DELAY,
        }
    }

    pub fn with_ping_delay(mut self, delay: Duration) -> Self {
        self.ping_delay = delay;
        self
    }

    /// Decide how to answer a subscription request for `channel`.
    ///
    /// `grip_sig` is the value of the [`GRIP_SIG_HEADER`], if any. On a hold,
    /// a `ping` event is scheduled on the channel.
    pub fn negotiate(&self, channel: &str, grip_sig: Option<&str>) -> Negotiation {
        if grip_sig.is_none() {
            debug!(channel, "subscription not proxied yet, handing off");
            return Negotiation::Handoff;
        }

        debug!(channel, delay_ms = self.ping_delay.as_millis() as u64, "holding subscription");
        self.broadcaster
            .schedule(channel, "ping", json!({}), self.ping_delay);
        Negotiation::Hold(HoldDirective::stream(channel))
    }
}
