//! Event formatting and hand-off to the external publish interface.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::change::Change;
use crate::error::ListcastError;

/// External pub/sub interface. Receives fully formatted stream text.
#[async_trait]
pub trait Publisher: Send + Sync + 'static {
    async fn publish(&self, channel: &str, content: &str) -> Result<()>;
}

/// Render one stream event: `event: <name>\ndata: <json>\n\n`.
pub fn format_event<T: Serialize + ?Sized>(event: &str, payload: &T) -> serde_json::Result<String> {
    let data = serde_json::to_string(payload)?;
    Ok(format!("event: {event}\ndata: {data}\n\n"))
}

/// Formats changes as channel events and forwards them to a [`Publisher`].
#[derive(Clone)]
pub struct EventBroadcaster {
    publisher: Arc<dyn Publisher>,
}

impl EventBroadcaster {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self { publisher }
    }

    /// Publish `payload` as `event` on `channel` and wait for the publisher.
    pub async fn publish<T: Serialize + ?Sized>(
        &self,
        channel: &str,
        event: &str,
        payload: &T,
    ) -> Result<(), ListcastError> {
        let content = format_event(event, payload).map_err(|err| ListcastError::PublishFailed {
            channel: channel.to_string(),
            reason: format!("encoding `{event}` payload: {err}"),
        })?;

        self.publisher
            .publish(channel, &content)
            .await
            .map_err(|err| ListcastError::PublishFailed {
                channel: channel.to_string(),
                reason: format!("{err:#}"),
            })?;

        debug!(channel, event, bytes = content.len(), "published event");
        Ok(())
    }

    pub async fn publish_change(&self, channel: &str, change: &Change) -> Result<(), ListcastError> {
        self.publish(channel, change.event_name(), change).await
    }

    /// Publish after `delay` on a detached task. Failures are logged.
    ///
    /// Nothing drains these tasks on shutdown; abort or drop the runtime
    /// before `delay` passes and the event is never sent.
    pub fn schedule(
        &self,
        channel: &str,
        event: &'static str,
        payload: serde_json::Value,
        delay: Duration,
    ) -> JoinHandle<()> {
        let broadcaster = self.clone();
        let channel = channel.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = broadcaster.publish(&channel, event, &payload).await {
                warn!(channel = %channel, event, error = %err, "scheduled publish failed");
            }
        })
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster").finish_non_exhaustive()
    }
}
