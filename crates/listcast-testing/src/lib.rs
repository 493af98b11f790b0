//! Testing utilities for listcast.
//!
//! - [`RecordingPublisher`] captures every published event and lets a test
//!   wait until a given number arrived.
//! - [`FlakyStore`] wraps a [`MemoryListStore`] and fails or slows down
//!   loads and saves on demand.
//! - [`list`] builds a list with dense positions from `(id, checked)` pairs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use listcast_core::{Item, List, ListStore, MemoryListStore, Publisher};
use tokio::sync::Notify;

// ============================================================================
// Fixtures
// ============================================================================

/// A list whose item `i` has id `entries[i].0`, position `i` and contents `"<id> contents"`.
pub fn list(entries: &[(&str, bool)]) -> List {
    entries
        .iter()
        .enumerate()
        .map(|(index, (id, checked))| Item {
            id: id.to_string(),
            contents: format!("{id} contents"),
            checked: *checked,
            position: index as u64,
        })
        .collect::<Vec<_>>()
        .into()
}

// ============================================================================
// Recording publisher
// ============================================================================

/// One captured publish call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub channel: String,
    pub content: String,
}

impl Published {
    /// The `event:` line.
    pub fn event(&self) -> &str {
        self.field("event: ").unwrap_or_default()
    }

    /// The `data:` line, parsed as JSON.
    pub fn data(&self) -> serde_json::Value {
        self.field("data: ")
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or(serde_json::Value::Null)
    }

    fn field(&self, prefix: &str) -> Option<&str> {
        self.content.lines().find_map(|line| line.strip_prefix(prefix))
    }
}

/// [`Publisher`] that keeps everything it is handed.
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    published: Arc<Mutex<Vec<Published>>>,
    notify: Arc<Notify>,
    fail_next: Arc<AtomicUsize>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_to(&self, channel: &str) -> Vec<Published> {
        self.published()
            .into_iter()
            .filter(|p| p.channel == channel)
            .collect()
    }

    /// Event names in publish order, across all channels.
    pub fn event_names(&self) -> Vec<String> {
        self.published()
            .iter()
            .map(|p| p.event().to_string())
            .collect()
    }

    /// Reject the next `count` publish calls.
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Wait until at least `count` events were published, or `timeout` passed.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<Published> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            let published = self.published();
            if published.len() >= count {
                return published;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.published();
            }
        }
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, channel: &str, content: &str) -> Result<()> {
        let fail = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(anyhow!("publish endpoint answered 503"));
        }

        self.published.lock().unwrap().push(Published {
            channel: channel.to_string(),
            content: content.to_string(),
        });
        self.notify.notify_waiters();
        Ok(())
    }
}

// ============================================================================
// Flaky store
// ============================================================================

/// [`ListStore`] over a [`MemoryListStore`] with injectable failures.
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: MemoryListStore,
    fail_loads: Arc<AtomicUsize>,
    fail_saves: Arc<AtomicUsize>,
    loads: Arc<AtomicUsize>,
    saves: Arc<AtomicUsize>,
    save_delay: Arc<Mutex<Duration>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wrapping(inner: MemoryListStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// The underlying store, for seeding and inspecting raw state.
    pub fn memory(&self) -> &MemoryListStore {
        &self.inner
    }

    pub fn fail_next_loads(&self, count: usize) {
        self.fail_loads.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_saves(&self, count: usize) {
        self.fail_saves.store(count, Ordering::SeqCst);
    }

    /// Sleep this long before every save.
    pub fn delay_saves(&self, delay: Duration) {
        *self.save_delay.lock().unwrap() = delay;
    }

    pub fn load_calls(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn save_calls(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ListStore for FlakyStore {
    async fn load(&self, channel: &str) -> Result<List> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.fail_loads) {
            return Err(anyhow!("kv store timed out loading `{channel}`"));
        }
        self.inner.load(channel).await
    }

    async fn save(&self, channel: &str, list: &List) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        let delay = *self.save_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if Self::take_failure(&self.fail_saves) {
            return Err(anyhow!("kv store rejected write for `{channel}`"));
        }
        self.inner.save(channel, list).await
    }
}
