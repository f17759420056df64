//! Subscription routing shared by channel adapters, plus an in-memory
//! [`EventChannel`] for offline sessions and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::application::ports::{EventChannel, EventSink, SubscriptionId};
use crate::domain::event::{names, ClientEvent, RawEvent};

// ---------------------------------------------------------------------------
// EventRouter
// ---------------------------------------------------------------------------

/// Name-keyed registry of inbound event sinks.
#[derive(Default)]
pub struct EventRouter {
    next_id: AtomicU64,
    sinks: Mutex<HashMap<String, Vec<(SubscriptionId, EventSink)>>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, event: &str, sink: EventSink) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event.to_string())
            .or_default()
            .push((id, sink));
        id
    }

    pub fn off(&self, id: SubscriptionId) {
        let mut sinks = self.sinks.lock().unwrap_or_else(PoisonError::into_inner);
        for registered in sinks.values_mut() {
            registered.retain(|(sid, _)| *sid != id);
        }
        sinks.retain(|_, registered| !registered.is_empty());
    }

    /// Hand `event` to every sink registered for its name. Sinks whose
    /// receiver is gone are dropped. Returns the number of deliveries.
    pub fn dispatch(&self, event: &RawEvent) -> usize {
        let mut sinks = self.sinks.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(registered) = sinks.get_mut(&event.event) else {
            debug!(event = %event.event, "no subscribers");
            return 0;
        };
        registered.retain(|(_, sink)| sink.send(event.clone()).is_ok());
        registered.len()
    }

    /// Number of live registrations across all names.
    pub fn subscription_count(&self) -> usize {
        self.sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }
}

// ---------------------------------------------------------------------------
// LoopbackChannel
// ---------------------------------------------------------------------------

/// An [`EventChannel`] with no network behind it. Emitted events are kept
/// for inspection and inbound events are injected with
/// [`LoopbackChannel::deliver`].
#[derive(Default)]
pub struct LoopbackChannel {
    connected: AtomicBool,
    router: EventRouter,
    sent: Mutex<Vec<ClientEvent>>,
}

impl LoopbackChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject an inbound event as if the relay had sent it.
    pub fn deliver(&self, event: RawEvent) -> usize {
        self.router.dispatch(&event)
    }

    /// Simulate the connection dropping underneath the session.
    pub fn drop_connection(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.router
                .dispatch(&RawEvent::new(names::DISCONNECT, Value::Null));
        }
    }

    /// Everything emitted while connected, in order.
    pub fn sent(&self) -> Vec<ClientEvent> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn take_sent(&self) -> Vec<ClientEvent> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn subscription_count(&self) -> usize {
        self.router.subscription_count()
    }
}

#[async_trait]
impl EventChannel for LoopbackChannel {
    async fn connect(&self) -> anyhow::Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.drop_connection();
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn emit(&self, event: &ClientEvent) {
        if !self.is_connected() {
            debug!(event = event.name(), "not connected; dropping emit");
            return;
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }

    fn on(&self, event: &str, sink: EventSink) -> SubscriptionId {
        self.router.on(event, sink)
    }

    fn off(&self, id: SubscriptionId) {
        self.router.off(id);
    }
}
