//! Per-channel sequential writers.
//!
//! Each active channel gets one task that owns load → apply → save → publish
//! for that channel. Commands queue in FIFO order, so two requests against the
//! same list never interleave their read-modify-write cycles, and a change is
//! broadcast only after its save succeeded.
//!
//! ```text
//! dispatch("c", cmd) ──► DashMap["c"] ──► mpsc ──► writer task "c"
//!                                                     ├─ load (once, then cached)
//!                                                     ├─ apply ──► reply (AckMode::Applied)
//!                                                     ├─ save  (retry, backoff)
//!                                                     │        ──► reply (AckMode::Committed)
//!                                                     └─ publish
//! ```
//!
//! A writer retires after sitting idle, but only when its queue is empty.
//! Sends happen while the map entry is held, so no command can slip into a
//! queue that is being retired.

use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::broadcast::EventBroadcaster;
use crate::change::Change;
use crate::command::Command;
use crate::engine::MutationEngine;
use crate::error::ListcastError;
use crate::item::List;
use crate::store::ListStore;

/// When a mutating caller gets its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    /// As soon as the command applied; the save finishes afterwards.
    #[default]
    Applied,
    /// Only after the save committed. Save failures reach the caller.
    Committed,
}

#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub ack: AckMode,
    /// Total save attempts per change, including the first.
    pub save_attempts: u32,
    /// Delay before the second attempt; doubles on each further attempt.
    pub save_backoff: Duration,
    /// How long a writer waits for a command before retiring.
    pub idle_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            ack: AckMode::Applied,
            save_attempts: 3,
            save_backoff: Duration::from_millis(50),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

type Reply = oneshot::Sender<Result<Change, ListcastError>>;

struct Envelope {
    command: Command,
    reply: Reply,
}

struct WriterHandle {
    generation: u64,
    tx: mpsc::UnboundedSender<Envelope>,
}

/// Routes commands to one sequential writer per channel.
#[derive(Clone)]
pub struct ChannelWriters {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn ListStore>,
    broadcaster: EventBroadcaster,
    engine: MutationEngine,
    config: WriterConfig,
    writers: DashMap<String, WriterHandle>,
    next_generation: AtomicU64,
    closed: AtomicBool,
    tasks: Mutex<JoinSet<()>>,
}

impl ChannelWriters {
    pub fn new(
        store: Arc<dyn ListStore>,
        broadcaster: EventBroadcaster,
        config: WriterConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                broadcaster,
                engine: MutationEngine::new(),
                config,
                writers: DashMap::new(),
                next_generation: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                tasks: Mutex::new(JoinSet::new()),
            }),
        }
    }

    /// Run `command` on `channel` and return the change it produced.
    ///
    /// With [`AckMode::Applied`] this resolves once the command applied; the
    /// save and the broadcast follow in the background, in channel order.
    pub async fn dispatch(&self, channel: &str, command: Command) -> Result<Change, ListcastError> {
        let (reply, answer) = oneshot::channel();
        self.inner.enqueue(channel, Envelope { command, reply })?;
        answer.await.map_err(|_| ListcastError::WriterGone {
            channel: channel.to_string(),
        })?
    }

    /// Number of channels with a live writer.
    pub fn active_channels(&self) -> usize {
        self.inner.writers.len()
    }

    /// Stop accepting commands and wait until every queued save finished.
    pub async fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        loop {
            self.inner.writers.clear();
            let mut tasks = mem::take(
                &mut *self
                    .inner
                    .tasks
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            );
            if tasks.is_empty() {
                break;
            }
            while let Some(joined) = tasks.join_next().await {
                if let Err(err) = joined {
                    error!(error = %err, "channel writer ended abnormally");
                }
            }
        }
        info!("channel writers drained");
    }
}

impl std::fmt::Debug for ChannelWriters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelWriters")
            .field("active_channels", &self.active_channels())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn enqueue(self: &Arc<Self>, channel: &str, envelope: Envelope) -> Result<(), ListcastError> {
        let gone = || ListcastError::WriterGone {
            channel: channel.to_string(),
        };
        let mut envelope = envelope;

        // A second pass only happens when a writer died without retiring.
        for _ in 0..2 {
            if self.closed.load(Ordering::SeqCst) {
                return Err(gone());
            }
            let entry = self
                .writers
                .entry(channel.to_string())
                .or_insert_with(|| self.spawn_writer(channel));
            match entry.tx.send(envelope) {
                Ok(()) => return Ok(()),
                Err(mpsc::error::SendError(returned)) => {
                    let generation = entry.generation;
                    drop(entry);
                    warn!(channel, generation, "writer queue closed unexpectedly, respawning");
                    self.writers
                        .remove_if(channel, |_, handle| handle.generation == generation);
                    envelope = returned;
                }
            }
        }
        Err(gone())
    }

    fn spawn_writer(self: &Arc<Self>, channel: &str) -> WriterHandle {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::clone(self);
        let owned = channel.to_string();

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move { inner.run(owned, generation, rx).await });

        debug!(channel, generation, "spawned channel writer");
        WriterHandle { generation, tx }
    }

    async fn run(
        self: Arc<Self>,
        channel: String,
        generation: u64,
        mut rx: mpsc::UnboundedReceiver<Envelope>,
    ) {
        let mut cached: Option<List> = None;

        loop {
            match tokio::time::timeout(self.config.idle_timeout, rx.recv()).await {
                Ok(Some(envelope)) => self.process(&channel, &mut cached, envelope).await,
                Ok(None) => break,
                Err(_idle) => {
                    let retired = self
                        .writers
                        .remove_if(&channel, |_, handle| {
                            handle.generation == generation && rx.is_empty()
                        })
                        .is_some();
                    if retired {
                        break;
                    }
                }
            }
        }

        debug!(channel = %channel, generation, "channel writer stopped");
    }

    async fn process(&self, channel: &str, cached: &mut Option<List>, envelope: Envelope) {
        let Envelope { command, reply } = envelope;

        let mut list = match cached.take() {
            Some(list) => list,
            None => match self.store.load(channel).await {
                Ok(list) => list,
                Err(err) => {
                    let err = ListcastError::store(channel, &err);
                    warn!(channel, error = %err, "load failed");
                    let _ = reply.send(Err(err));
                    return;
                }
            },
        };

        let change = match self.engine.apply(&mut list, &command) {
            Ok(change) => change,
            Err(err) => {
                *cached = Some(list);
                let _ = reply.send(Err(err));
                return;
            }
        };
        let event = change.event_name();

        if command.is_read_only() {
            *cached = Some(list);
            let _ = reply.send(Ok(change.clone()));
            self.broadcast(channel, &change).await;
            return;
        }

        let mut reply = Some(reply);
        if self.config.ack == AckMode::Applied {
            if let Some(reply) = reply.take() {
                let _ = reply.send(Ok(change.clone()));
            }
        }

        match self.save(channel, &list).await {
            Ok(()) => {
                *cached = Some(list);
                if let Some(reply) = reply.take() {
                    let _ = reply.send(Ok(change.clone()));
                }
                self.broadcast(channel, &change).await;
            }
            Err(err) => {
                // Nothing is cached, so the next command reloads the stored list.
                error!(channel, event, error = %err, "change dropped after failed save");
                if let Some(reply) = reply.take() {
                    let _ = reply.send(Err(err));
                }
            }
        }
    }

    async fn save(&self, channel: &str, list: &List) -> Result<(), ListcastError> {
        let attempts = self.config.save_attempts.max(1);
        let mut delay = self.config.save_backoff;
        let mut attempt = 1;

        loop {
            match self.store.save(channel, list).await {
                Ok(()) => {
                    debug!(channel, attempt, items = list.len(), "saved list");
                    return Ok(());
                }
                Err(err) if attempt < attempts => {
                    warn!(channel, attempt, error = %format!("{err:#}"), "save failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(err) => return Err(ListcastError::store(channel, &err)),
            }
        }
    }

    async fn broadcast(&self, channel: &str, change: &Change) {
        if let Err(err) = self.broadcaster.publish_change(channel, change).await {
            warn!(channel, event = change.event_name(), error = %err, "broadcast failed");
        }
    }
}
