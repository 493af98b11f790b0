use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use listcast_core::{ChannelWriters, EventBroadcaster, ListStore, MemoryListStore, StreamGateway};
use listcast_server::config::{Config, StoreKind};
use listcast_server::{telemetry, AppState, GripPublisher, ProxyHandoff};
use listcast_store_postgres::PgListStore;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    telemetry::init(config.log_format);

    let store = open_store(&config).await?;

    let mut publisher = GripPublisher::new(&config.publish_url)?;
    if let Some(token) = &config.publish_token {
        publisher = publisher.with_token(&config.publish_token_header, token)?;
    } else {
        warn!("no publish token configured, publishing unauthenticated");
    }
    let broadcaster = EventBroadcaster::new(Arc::new(publisher));

    let writers = ChannelWriters::new(store, broadcaster.clone(), config.writer_config());
    let gateway = StreamGateway::new(broadcaster).with_ping_delay(config.ping_delay());
    let handoff = ProxyHandoff::new(&config.fanout_url)?;
    let state = AppState::new(
        writers.clone(),
        gateway,
        Arc::new(handoff),
        &config.service_version,
    )?;

    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!(
        bind = %config.bind,
        version = %config.service_version,
        publish_url = %config.publish_url,
        fanout_url = %config.fanout_url,
        "listcast serving"
    );

    listcast_server::serve(listener, state, shutdown_signal()).await?;

    info!("http server stopped, draining channel writers");
    writers.shutdown().await;
    Ok(())
}

async fn open_store(config: &Config) -> Result<Arc<dyn ListStore>> {
    match config.store {
        StoreKind::Memory => {
            warn!("using the in-memory store, lists are lost on restart");
            Ok(Arc::new(MemoryListStore::new()))
        }
        StoreKind::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("--database-url (or DATABASE_URL) is required with --store postgres")?;
            let store = PgListStore::connect(url).await?;
            let stats = store.stats().await?;
            info!(
                channels = stats.channels,
                items = stats.items,
                checked = stats.checked,
                last_write = ?stats.last_write,
                "postgres list store ready"
            );
            Ok(Arc::new(store))
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "could not listen for ctrl-c, shutting down");
    }
}
