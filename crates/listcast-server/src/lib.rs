//! HTTP edge for listcast.
//!
//! ```text
//! GET /insert?channel=c&id=..&contents=..     ─┐
//! GET /toggle?channel=c&id=..&checked=true     │  QueryParams ─► Command
//! ...                                          ├─────────────────────────► ChannelWriters
//! GET /update-positions?channel=c&positions=[] ─┘
//!
//! GET /stream/sse?channel=c ──► StreamGateway ──► hold directive | ProxyHandoff
//! ```
//!
//! Every failure funnels through [`ApiError`], which logs the detail and
//! answers with a generic message.

pub mod config;
mod error;
pub mod handoff;
pub mod publisher;
pub mod routes;
pub mod telemetry;

use std::future::Future;

use tokio::net::TcpListener;

pub use config::Config;
pub use error::ApiError;
pub use handoff::{FanoutHandoff, ProxyHandoff};
pub use publisher::GripPublisher;
pub use routes::{router, AppState};

/// Serve `state` on `listener` until `shutdown` resolves.
///
/// Pending saves are not drained here; call
/// [`ChannelWriters::shutdown`](listcast_core::ChannelWriters::shutdown) afterwards.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
