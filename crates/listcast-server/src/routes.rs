//! HTTP surface: one GET endpoint per command, the stream entry point, health.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Query, Request, State};
use axum::http::header::{HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Json, Router};
use listcast_core::{
    ChannelWriters, CommandKind, HoldDirective, ListcastError, Negotiation, QueryParams,
    StreamGateway, GRIP_SIG_HEADER,
};
use serde_json::json;
use tracing::debug;

use crate::error::ApiError;
use crate::handoff::FanoutHandoff;
use crate::telemetry::access_log;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    writers: ChannelWriters,
    gateway: StreamGateway,
    handoff: Arc<dyn FanoutHandoff>,
    service_version: HeaderValue,
}

impl AppState {
    pub fn new(
        writers: ChannelWriters,
        gateway: StreamGateway,
        handoff: Arc<dyn FanoutHandoff>,
        service_version: &str,
    ) -> Result<Self> {
        let service_version = HeaderValue::from_str(service_version)
            .with_context(|| format!("service version `{service_version}` is not a valid header value"))?;
        Ok(Self {
            writers,
            gateway,
            handoff,
            service_version,
        })
    }

    pub(crate) fn service_version(&self) -> &HeaderValue {
        &self.service_version
    }
}

/// Build the router with every endpoint and the access-log layer.
pub fn router(state: AppState) -> Router {
    let mut router = Router::new();
    for kind in CommandKind::ALL {
        router = router.route(
            kind.path(),
            get(
                move |State(state): State<AppState>, Query(params): Query<HashMap<String, String>>| async move {
                    run_command(state, kind, params).await
                },
            ),
        );
    }

    router
        .route("/stream/sse", get(stream_sse))
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(state.clone(), access_log))
        .with_state(state)
}

async fn run_command(
    state: AppState,
    kind: CommandKind,
    params: HashMap<String, String>,
) -> Result<StatusCode, ApiError> {
    let params = QueryParams::new(&params);
    let channel = params.channel()?;
    let command = kind.parse(&params)?;

    let change = state.writers.dispatch(channel, command).await?;
    debug!(channel, event = change.event_name(), "command accepted");
    Ok(StatusCode::OK)
}

async fn stream_sse(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    request: Request,
) -> Result<Response, ApiError> {
    let channel = QueryParams::new(&params).channel()?;
    if HeaderValue::from_str(channel).is_err() {
        return Err(ListcastError::malformed("channel", "not usable as a header value").into());
    }
    let grip_sig = request
        .headers()
        .get(GRIP_SIG_HEADER)
        .map(|value| value.to_str().unwrap_or_default());

    match state.gateway.negotiate(channel, grip_sig) {
        Negotiation::Handoff => state.handoff.handoff(request).await.map_err(ApiError::Handoff),
        Negotiation::Hold(directive) => hold_response(&directive),
    }
}

fn hold_response(directive: &HoldDirective) -> Result<Response, ApiError> {
    let invalid = |_| ListcastError::malformed("channel", "not usable as a header value");

    let mut headers = HeaderMap::new();
    for (name, value) in directive.headers() {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ListcastError::malformed("channel", "invalid hold header name")
        })?;
        headers.insert(name, HeaderValue::from_str(value).map_err(invalid)?);
    }
    Ok((StatusCode::OK, headers).into_response())
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "active_channels": state.writers.active_channels(),
    }))
}
