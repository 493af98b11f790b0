//! Storage seam for channel lists.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;

use crate::item::List;

/// Get/put access to the external key-value store holding one list per channel.
///
/// There is no version token: the last save wins. Serialize writers per
/// channel above this trait (see [`ChannelWriters`](crate::ChannelWriters)).
#[async_trait]
pub trait ListStore: Send + Sync + 'static {
    /// Load a channel's list. An absent channel is an empty list.
    async fn load(&self, channel: &str) -> Result<List>;

    /// Replace a channel's list.
    async fn save(&self, channel: &str, list: &List) -> Result<()>;
}

#[async_trait]
impl<T: ListStore + ?Sized> ListStore for Arc<T> {
    async fn load(&self, channel: &str) -> Result<List> {
        (**self).load(channel).await
    }

    async fn save(&self, channel: &str, list: &List) -> Result<()> {
        (**self).save(channel, list).await
    }
}

/// In-process store keeping each list in its encoded JSON form.
///
/// Values go through the same codec as any external store, so legacy
/// records seeded with [`MemoryListStore::put_raw`] are repaired on load.
#[derive(Debug, Default, Clone)]
pub struct MemoryListStore {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryListStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an already-encoded value, bypassing the codec.
    pub fn put_raw(&self, channel: impl Into<String>, json: impl Into<String>) {
        self.entries.insert(channel.into(), json.into());
    }

    pub fn get_raw(&self, channel: &str) -> Option<String> {
        self.entries.get(channel).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl ListStore for MemoryListStore {
    async fn load(&self, channel: &str) -> Result<List> {
        match self.entries.get(channel) {
            Some(raw) => List::from_json(raw.as_bytes())
                .with_context(|| format!("decoding list for channel `{channel}`")),
            None => Ok(List::new()),
        }
    }

    async fn save(&self, channel: &str, list: &List) -> Result<()> {
        let json = list.to_json().context("encoding list")?;
        self.entries.insert(channel.to_string(), json);
        Ok(())
    }
}
