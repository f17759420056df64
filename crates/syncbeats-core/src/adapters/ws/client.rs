//! tokio-tungstenite WebSocket [`EventChannel`] adapter.
//!
//! One socket per channel. A writer task drains an unbounded queue of
//! outbound frames; a reader task decodes inbound frames and routes them by
//! event name. When the socket ends for any reason other than a local
//! `disconnect`, subscribers receive a synthesised `disconnect` event.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::adapters::channel::EventRouter;
use crate::application::ports::{EventChannel, EventCodec, EventSink, SubscriptionId};
use crate::domain::event::{names, ClientEvent, RawEvent};

use super::codec::JsonEventCodec;

/// Connection state shared with the socket tasks.
#[derive(Default)]
struct Link {
    connected: AtomicBool,
    /// Bumped on every connect so a stale reader cannot report a drop for a
    /// newer socket.
    generation: AtomicU64,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
}

impl Link {
    /// Mark the link down if `generation` is still current. Returns whether
    /// this call took it down.
    fn close(&self, generation: u64) -> bool {
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.connected.swap(false, Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// WsEventChannel
// ---------------------------------------------------------------------------

/// Client-side [`EventChannel`] backed by tokio-tungstenite.
pub struct WsEventChannel {
    url: String,
    router: Arc<EventRouter>,
    link: Arc<Link>,
    codec: Arc<dyn EventCodec>,
}

impl WsEventChannel {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            router: Arc::new(EventRouter::new()),
            link: Arc::new(Link::default()),
            codec: Arc::new(JsonEventCodec),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EventChannel for WsEventChannel {
    async fn connect(&self) -> anyhow::Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        info!(url = %self.url, "Connecting to relay");
        let (stream, _) = connect_async(self.url.as_str())
            .await
            .with_context(|| format!("connecting to relay at {}", self.url))?;
        info!("Relay connection established");

        let (mut write, mut read) = stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        let generation = self.link.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self
            .link
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);
        self.link.connected.store(true, Ordering::SeqCst);

        // Writer
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let closing = matches!(frame, Message::Close(_));
                if let Err(e) = write.send(frame).await {
                    warn!("Relay write failed: {e}");
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = write.close().await;
        });

        // Reader
        let router = self.router.clone();
        let link = self.link.clone();
        let codec = self.codec.clone();
        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => match codec.decode(&text) {
                        Ok(raw) => {
                            router.dispatch(&raw);
                        }
                        Err(e) => warn!("Dropping undecodable frame: {e:#}"),
                    },
                    Ok(Message::Close(reason)) => {
                        info!(?reason, "Relay closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Relay read failed: {e}");
                        break;
                    }
                }
            }
            if link.close(generation) {
                router.dispatch(&RawEvent::new(names::DISCONNECT, Value::Null));
            }
        });

        Ok(())
    }

    async fn disconnect(&self) {
        let generation = self.link.generation.load(Ordering::SeqCst);
        let outbound = self
            .link
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(tx) = outbound {
            let _ = tx.send(Message::Close(None));
        }
        if self.link.close(generation) {
            info!("Disconnected from relay");
            self.router
                .dispatch(&RawEvent::new(names::DISCONNECT, Value::Null));
        }
    }

    fn is_connected(&self) -> bool {
        self.link.connected.load(Ordering::SeqCst)
    }

    fn emit(&self, event: &ClientEvent) {
        let outbound = self
            .link
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(tx) = outbound else {
            debug!(event = event.name(), "not connected; dropping emit");
            return;
        };
        match self.codec.encode(event) {
            Ok(frame) => {
                if tx.send(Message::Text(frame)).is_err() {
                    debug!(event = event.name(), "writer gone; dropping emit");
                }
            }
            Err(e) => warn!(event = event.name(), "Failed to encode event: {e:#}"),
        }
    }

    fn on(&self, event: &str, sink: EventSink) -> SubscriptionId {
        self.router.on(event, sink)
    }

    fn off(&self, id: SubscriptionId) {
        self.router.off(id);
    }
}
