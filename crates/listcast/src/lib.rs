//! # Listcast
//!
//! Shared, ordered checklists per channel, kept consistent by a pure mutation
//! engine and fanned out to subscribers as discrete stream events.
//!
//! ## Core Concepts
//!
//! Listcast separates **decisions** from **IO**:
//! - [`MutationEngine`] = Decisions (pure, no IO, positions always `0..n-1`)
//! - [`ListStore`] / [`Publisher`] = IO (external key-value store, external fan-out)
//!
//! The key principle: **One Channel = One Writer**.
//! Every command for a channel runs through that channel's sequential writer,
//! so load → apply → save never interleaves with another command on the same list.
//!
//! ## Architecture
//!
//! ```text
//! Edge (HTTP GET /insert, /toggle, ...)
//!     │
//!     ▼ Command::parse()
//! ChannelWriters.dispatch(channel, command)
//!     │
//!     ▼ per-channel FIFO
//! Writer task ───────────────────────────────────────┐
//!     │                                              │
//!     ├─► ListStore.load()   (cached after commit)   │
//!     │                                              │
//!     ├─► MutationEngine.apply() ─► Change ──► reply │
//!     │                                              │
//!     ├─► ListStore.save()   (retry + backoff)       │
//!     │                                              │
//!     └─► EventBroadcaster.publish() ─► Publisher ───┘
//!
//! Edge (HTTP GET /stream/sse)
//!     │
//!     ▼ StreamGateway.negotiate()
//!     ├─► no Grip-Sig  ─► Handoff to fan-out proxy
//!     └─► Grip-Sig     ─► Hold directive + delayed "ping"
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Positions are dense** - after every command, positions are exactly `0..n-1`
//! 2. **Failed commands change nothing** - the engine validates before it mutates
//! 3. **Publish after commit** - a change is broadcast only once its save succeeded
//! 4. **Channels are independent** - no state or ordering spans two channels
//!
//! ## Guarantees
//!
//! - **At-most-once delivery**: subscribers that are not connected miss events
//! - **Per-channel FIFO**: saves and publishes of one channel happen in command order
//! - **No history**: late subscribers resynchronize with [`Command::Init`]
//!
//! ## Example
//!
//! ```ignore
//! use listcast_core::{ChannelWriters, Command, EventBroadcaster, MemoryListStore, WriterConfig};
//! use std::sync::Arc;
//!
//! let broadcaster = EventBroadcaster::new(Arc::new(my_publisher));
//! let writers = ChannelWriters::new(
//!     Arc::new(MemoryListStore::new()),
//!     broadcaster,
//!     WriterConfig::default(),
//! );
//!
//! let change = writers
//!     .dispatch("groceries", Command::Insert { id: "a1".into(), contents: "milk".into() })
//!     .await?;
//! assert_eq!(change.event_name(), "insert");
//!
//! writers.shutdown().await;
//! ```

mod broadcast;
mod change;
mod command;
mod engine;
mod error;
mod gateway;
mod item;
mod store;
mod writer;

// Re-export model types
pub use item::{Item, List};

// Re-export command types (parsed once at the edge)
pub use command::{Command, CommandKind, QueryParams};

// Re-export engine types
pub use change::Change;
pub use engine::MutationEngine;

// Re-export error types
pub use error::{Categorizable, ListcastError, SafeErrorCategory};

// Re-export store types
pub use store::{ListStore, MemoryListStore};

// Re-export broadcast types
pub use broadcast::{format_event, EventBroadcaster, Publisher};

// Re-export gateway types
pub use gateway::{
    HoldDirective, Negotiation, StreamGateway, DEFAULT_PING_DELAY, GRIP_CHANNEL_HEADER,
    GRIP_HOLD_HEADER, GRIP_SIG_HEADER, STREAM_CONTENT_TYPE,
};

// Re-export writer types (primary entry point)
pub use writer::{AckMode, ChannelWriters, WriterConfig};

// Re-export commonly used external types
pub use async_trait::async_trait;
