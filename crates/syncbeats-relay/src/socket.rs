//! WebSocket endpoint carrying `{"event", "data"}` frames.
//!
//! Each socket gets a writer task draining its outbox; the read loop decodes
//! client events and hands them to the [`RoomRegistry`].

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use syncbeats_core::domain::event::{ClientEvent, RawEvent};

use crate::rooms::RoomRegistry;

pub fn routes() -> Router<Arc<RoomRegistry>> {
    Router::new().route("/ws", get(upgrade))
}

async fn upgrade(ws: WebSocketUpgrade, State(rooms): State<Arc<RoomRegistry>>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, rooms))
}

async fn serve_socket(socket: WebSocket, rooms: Arc<RoomRegistry>) {
    let conn = rooms.connect();
    debug!(?conn, "socket opened");

    let (mut sink, mut stream) = socket.split();
    let (outbox, mut pending) = mpsc::unbounded_channel::<RawEvent>();

    let writer = tokio::spawn(async move {
        while let Some(raw) = pending.recv().await {
            let text = match serde_json::to_string(&raw) {
                Ok(text) => text,
                Err(e) => {
                    warn!(event = %raw.event, "dropping unencodable frame: {e}");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(?conn, "socket read failed: {e}");
                break;
            }
        };
        match serde_json::from_str::<ClientEvent>(&text) {
            Ok(event) => rooms.handle(conn, &outbox, event),
            Err(e) => debug!(?conn, "ignoring frame: {e}"),
        }
    }

    rooms.disconnect(conn);
    writer.abort();
    debug!(?conn, "socket closed");
}
