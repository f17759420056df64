//! RoomSession — runs one [`SyncEngine`] against its channel.
//!
//! The session owns the engine and feeds it from four sources in a single
//! task, so handlers never interleave:
//!
//! - inbound relay events (subscribed by name on the shared channel),
//! - player notifications,
//! - commands from any number of [`SessionHandle`]s,
//! - the host's drift deadline.
//!
//! Subscriptions are removed when the loop exits, whatever the reason.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::domain::event::{names, RawEvent, ServerEvent};
use crate::domain::identity::{RoomId, UserId, VideoId};
use crate::domain::playback::PlaybackState;
use crate::domain::room::{EndReason, RoomDetails, SessionState};
use crate::error::{Result, SyncError};

use super::ports::{EventChannel, PlayerNotification, SubscriptionId};
use super::sync_engine::SyncEngine;

/// A point-in-time copy of the session for display.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub room_id: RoomId,
    pub local_user: UserId,
    pub state: SessionState,
    pub host: Option<UserId>,
    pub is_host: bool,
    pub users: Vec<UserId>,
    pub queue: Vec<VideoId>,
    pub current_index: Option<usize>,
    pub playback: PlaybackState,
}

impl SessionStatus {
    fn of(engine: &SyncEngine) -> Self {
        Self {
            room_id: engine.room_id().clone(),
            local_user: engine.local_user().clone(),
            state: engine.state(),
            host: engine.host().cloned(),
            is_host: engine.is_host(),
            users: engine.users().to_vec(),
            queue: engine.queue().queue().to_vec(),
            current_index: engine.queue().current_index(),
            playback: engine.playback().clone(),
        }
    }
}

/// User-initiated session operations.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Play,
    Pause,
    Seek(f64),
    Next,
    Sync,
    Kick(UserId),
    Volume(u32),
    ToggleMute,
}

enum Request {
    Command(SessionCommand, oneshot::Sender<Result<()>>),
    Status(oneshot::Sender<SessionStatus>),
    Leave,
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Cloneable control surface for a running [`RoomSession`]. Every call
/// fails with [`SyncError::SessionClosed`] once the session has ended.
#[derive(Clone)]
pub struct SessionHandle {
    requests: mpsc::UnboundedSender<Request>,
}

impl SessionHandle {
    pub async fn send(&self, command: SessionCommand) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(Request::Command(command, tx))
            .map_err(|_| SyncError::SessionClosed)?;
        rx.await.map_err(|_| SyncError::SessionClosed)?
    }

    pub async fn play(&self) -> Result<()> {
        self.send(SessionCommand::Play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(SessionCommand::Pause).await
    }

    pub async fn seek(&self, time: f64) -> Result<()> {
        self.send(SessionCommand::Seek(time)).await
    }

    pub async fn next(&self) -> Result<()> {
        self.send(SessionCommand::Next).await
    }

    pub async fn request_sync(&self) -> Result<()> {
        self.send(SessionCommand::Sync).await
    }

    pub async fn kick(&self, username: UserId) -> Result<()> {
        self.send(SessionCommand::Kick(username)).await
    }

    pub async fn set_volume(&self, level: u32) -> Result<()> {
        self.send(SessionCommand::Volume(level)).await
    }

    pub async fn toggle_mute(&self) -> Result<()> {
        self.send(SessionCommand::ToggleMute).await
    }

    /// Current status with a freshly sampled position.
    pub async fn status(&self) -> Result<SessionStatus> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(Request::Status(tx))
            .map_err(|_| SyncError::SessionClosed)?;
        rx.await.map_err(|_| SyncError::SessionClosed)
    }

    /// Leave the room. The session loop exits after emitting `leave_room`.
    pub fn leave(&self) {
        let _ = self.requests.send(Request::Leave);
    }

    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }
}

// ---------------------------------------------------------------------------
// RoomSession
// ---------------------------------------------------------------------------

pub struct RoomSession {
    engine: SyncEngine,
    channel: Arc<dyn EventChannel>,
    details: Option<RoomDetails>,
    notifications: mpsc::UnboundedReceiver<PlayerNotification>,
    requests: mpsc::UnboundedReceiver<Request>,
}

impl RoomSession {
    /// `notifications` must be the receiving half of the notifier the
    /// engine's player was built with. `details` seeds the join with the
    /// room service's snapshot.
    pub fn new(
        engine: SyncEngine,
        channel: Arc<dyn EventChannel>,
        details: Option<RoomDetails>,
        notifications: mpsc::UnboundedReceiver<PlayerNotification>,
    ) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            engine,
            channel,
            details,
            notifications,
            requests: rx,
        };
        (session, SessionHandle { requests: tx })
    }

    /// Join the room and run until the session ends. Returns why it ended.
    pub async fn run(mut self) -> Result<EndReason> {
        let (sink, mut inbound) = mpsc::unbounded_channel::<RawEvent>();
        let subscriptions: Vec<SubscriptionId> = names::SESSION_INBOUND
            .iter()
            .map(|name| self.channel.on(name, sink.clone()))
            .collect();
        drop(sink);

        let result = self.drive(&mut inbound).await;

        for id in subscriptions {
            self.channel.off(id);
        }
        result
    }

    async fn drive(&mut self, inbound: &mut mpsc::UnboundedReceiver<RawEvent>) -> Result<EndReason> {
        if !self.channel.is_connected() {
            return Err(SyncError::NotConnected);
        }
        self.engine.begin_join(self.details.as_ref())?;

        loop {
            let deadline = self.engine.drift_deadline();

            tokio::select! {
                Some(raw) = inbound.recv() => match ServerEvent::decode(&raw) {
                    Ok(event) => self.engine.handle_event(event),
                    Err(e) => warn!(event = %raw.event, "Dropping malformed event: {e}"),
                },

                Some(notification) = self.notifications.recv() => match notification {
                    PlayerNotification::Ready => self.engine.handle_player_ready(),
                    PlayerNotification::StateChanged(state) => {
                        self.engine.handle_player_state(state)
                    }
                },

                request = self.requests.recv() => match request {
                    Some(request) => self.handle_request(request),
                    None => {
                        debug!("all session handles dropped; leaving");
                        self.engine.leave();
                    }
                },

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.engine.drift_tick();
                }
            }

            if self.engine.state() == SessionState::Disconnected {
                break;
            }
        }

        let reason = self
            .engine
            .end_reason()
            .cloned()
            .unwrap_or(EndReason::Left);
        info!(room_id = %self.engine.room_id(), ?reason, "Session ended");
        Ok(reason)
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::Command(command, reply) => {
                let result = self.apply(command);
                if let Err(e) = &result {
                    debug!("command refused: {e}");
                }
                let _ = reply.send(result);
            }
            Request::Status(reply) => {
                self.engine.refresh_position();
                let _ = reply.send(SessionStatus::of(&self.engine));
            }
            Request::Leave => self.engine.leave(),
        }
    }

    fn apply(&mut self, command: SessionCommand) -> Result<()> {
        match command {
            SessionCommand::Play => self.engine.local_play(),
            SessionCommand::Pause => self.engine.local_pause(),
            SessionCommand::Seek(time) => self.engine.local_seek(time),
            SessionCommand::Next => self.engine.request_next(),
            SessionCommand::Sync => self.engine.request_sync(),
            SessionCommand::Kick(username) => self.engine.kick_user(username),
            SessionCommand::Volume(level) => {
                self.engine.set_volume(level);
                Ok(())
            }
            SessionCommand::ToggleMute => {
                self.engine.toggle_mute();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::adapters::channel::LoopbackChannel;
    use crate::application::testing::{RecordingAppEvents, ScriptedPlayer};
    use crate::config::SyncConfig;
    use crate::domain::event::ClientEvent;
    use crate::domain::playback::PlayerState;

    struct Running {
        channel: Arc<LoopbackChannel>,
        player: Arc<ScriptedPlayer>,
        notifier: mpsc::UnboundedSender<PlayerNotification>,
        handle: SessionHandle,
        task: tokio::task::JoinHandle<Result<EndReason>>,
    }

    async fn start(user: &str) -> Running {
        let channel = Arc::new(LoopbackChannel::new());
        channel.connect().await.unwrap();
        let player = Arc::new(ScriptedPlayer::default());
        let engine = SyncEngine::new(
            RoomId::new("ROOM0001"),
            UserId::new(user),
            &SyncConfig::default(),
            channel.clone(),
            player.clone(),
            Arc::new(RecordingAppEvents::default()),
        );
        let (notifier, notifications) = mpsc::unbounded_channel();
        let (session, handle) = RoomSession::new(engine, channel.clone(), None, notifications);
        let task = tokio::spawn(session.run());
        settle().await;
        Running {
            channel,
            player,
            notifier,
            handle,
            task,
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn deliver(channel: &LoopbackChannel, event: &str, data: serde_json::Value) {
        channel.deliver(RawEvent::new(event, data));
    }

    async fn sync_as_host(r: &Running, host: &str) {
        deliver(&r.channel, "user_list", json!({"users": ["alice", "bob"]}));
        deliver(&r.channel, "host_update", json!({"host": host}));
        deliver(&r.channel, "queue_update", json!({"queue": ["v1", "v2"], "currentIndex": 0}));
        settle().await;
    }

    #[tokio::test]
    async fn subscribes_joins_and_syncs() {
        let r = start("alice").await;
        assert_eq!(r.channel.subscription_count(), names::SESSION_INBOUND.len());
        sync_as_host(&r, "alice").await;

        let status = r.handle.status().await.unwrap();
        assert_eq!(status.state, SessionState::Synced);
        assert!(status.is_host);
        assert_eq!(status.queue.len(), 2);

        let sent: Vec<_> = r.channel.sent().iter().map(ClientEvent::name).collect();
        assert_eq!(sent, vec!["join_room", "sync_request"]);
    }

    #[tokio::test]
    async fn commands_report_engine_errors() {
        let r = start("bob").await;
        sync_as_host(&r, "alice").await;
        assert!(matches!(r.handle.play().await, Err(SyncError::NotHost)));
        r.handle.set_volume(30).await.unwrap();
        assert_eq!(r.handle.status().await.unwrap().playback.volume.get(), 30);
    }

    #[tokio::test]
    async fn player_notifications_reach_the_engine() {
        let r = start("alice").await;
        sync_as_host(&r, "alice").await;
        r.channel.take_sent();

        r.notifier
            .send(PlayerNotification::StateChanged(PlayerState::Paused))
            .unwrap();
        settle().await;
        let sent: Vec<_> = r.channel.sent().iter().map(ClientEvent::name).collect();
        assert_eq!(sent, vec!["pause"]);
    }

    #[tokio::test]
    async fn malformed_events_are_dropped() {
        let r = start("bob").await;
        deliver(&r.channel, "seek", json!({"time": "soon"}));
        deliver(&r.channel, "host_update", json!(42));
        settle().await;
        assert_eq!(
            r.handle.status().await.unwrap().state,
            SessionState::Joining
        );
    }

    #[tokio::test]
    async fn leave_ends_the_loop_and_unsubscribes() {
        let r = start("bob").await;
        sync_as_host(&r, "alice").await;

        r.handle.leave();
        let reason = r.task.await.unwrap().unwrap();
        assert_eq!(reason, EndReason::Left);
        assert_eq!(r.channel.subscription_count(), 0);
        assert!(r.handle.is_closed());
        assert!(matches!(r.handle.play().await, Err(SyncError::SessionClosed)));
        assert_eq!(r.channel.sent().last().map(ClientEvent::name), Some("leave_room"));
    }

    #[tokio::test]
    async fn transport_loss_ends_the_session() {
        let r = start("bob").await;
        sync_as_host(&r, "alice").await;
        r.channel.drop_connection();
        let reason = r.task.await.unwrap().unwrap();
        assert_eq!(reason, EndReason::TransportLost);
        assert_eq!(r.channel.subscription_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn drift_deadline_fires_inside_the_loop() {
        let r = start("alice").await;
        sync_as_host(&r, "alice").await;

        r.notifier
            .send(PlayerNotification::StateChanged(PlayerState::Playing))
            .unwrap();
        settle().await;
        r.channel.take_sent();

        r.player.set_time(9.0);
        tokio::time::sleep(Duration::from_millis(5_100)).await;
        settle().await;
        assert_eq!(
            r.channel.sent(),
            vec![ClientEvent::Seek {
                room_id: RoomId::new("ROOM0001"),
                time: 9.0
            }]
        );
    }

    #[tokio::test]
    async fn refuses_to_start_on_a_closed_channel() {
        let channel = Arc::new(LoopbackChannel::new());
        let engine = SyncEngine::new(
            RoomId::new("ROOM0001"),
            UserId::new("bob"),
            &SyncConfig::default(),
            channel.clone(),
            Arc::new(ScriptedPlayer::default()),
            Arc::new(RecordingAppEvents::default()),
        );
        let (_notifier, notifications) = mpsc::unbounded_channel();
        let (session, _handle) = RoomSession::new(engine, channel.clone(), None, notifications);
        assert!(matches!(session.run().await, Err(SyncError::NotConnected)));
        assert_eq!(channel.subscription_count(), 0);
    }
}
