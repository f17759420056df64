//! syncbeats-relay — the room server that syncbeats clients talk to.
//!
//! Serves the room REST API and the WebSocket event relay from one
//! listener. Room state lives in memory for the life of the process.

pub mod api;
pub mod rooms;
pub mod socket;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use rooms::RoomRegistry;

pub fn router(rooms: Arc<RoomRegistry>) -> Router {
    api::routes()
        .merge(socket::routes())
        .with_state(rooms)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve until the listener fails.
pub async fn serve(listener: TcpListener, rooms: Arc<RoomRegistry>) -> anyhow::Result<()> {
    let addr = listener.local_addr().context("reading listener address")?;
    info!(%addr, "Relay listening");
    axum::serve(listener, router(rooms))
        .await
        .context("serving relay")
}
