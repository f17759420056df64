//! Sync reconciliation engine — the per-room playback state machine.
//!
//! Maps inbound relay events to player commands and local player-state
//! transitions to outbound events:
//!
//! ```text
//!   Disconnected ──begin_join──▶ Joining ──users+host+queue──▶ Synced
//!        ▲                          │                            │
//!        └────── error / leave ─────┴── leave / kicked / lost ───┘
//! ```
//!
//! Handlers run to completion and never block; the owning session calls them
//! one at a time.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::domain::event::{ClientEvent, PlaybackSnapshot, ServerEvent};
use crate::domain::identity::{RoomId, UserId, VideoId};
use crate::domain::playback::{valid_time, ControlKind, PlaybackState, PlayerState, Volume};
use crate::domain::room::{EndReason, RoomDetails, SessionState};
use crate::error::{Result, SyncError};

use super::drift::DriftCorrector;
use super::host_gate::HostGate;
use super::ports::{AppEvents, EventChannel, PlayerEngine};
use super::queue::QueueCoordinator;
use super::suppressor::EchoSuppressor;

/// Volume restored when unmuting from a silent level.
const UNMUTE_FALLBACK_VOLUME: u32 = 50;

/// Which parts of the initial room state have arrived while joining.
#[derive(Debug, Default)]
struct JoinProgress {
    users: bool,
    host: bool,
    queue: bool,
    snapshot: Option<PlaybackSnapshot>,
}

impl JoinProgress {
    fn complete(&self) -> bool {
        self.users && self.host && self.queue
    }
}

pub struct SyncEngine {
    room_id: RoomId,
    state: SessionState,
    gate: HostGate,
    suppressor: EchoSuppressor,
    drift: DriftCorrector,
    queue: QueueCoordinator,
    playback: PlaybackState,
    users: Vec<UserId>,
    loaded_video: Option<VideoId>,
    join: JoinProgress,
    end_reason: Option<EndReason>,
    channel: Arc<dyn EventChannel>,
    player: Arc<dyn PlayerEngine>,
    app_events: Arc<dyn AppEvents>,
}

impl SyncEngine {
    pub fn new(
        room_id: RoomId,
        local_user: UserId,
        config: &SyncConfig,
        channel: Arc<dyn EventChannel>,
        player: Arc<dyn PlayerEngine>,
        app_events: Arc<dyn AppEvents>,
    ) -> Self {
        Self {
            room_id,
            state: SessionState::Disconnected,
            gate: HostGate::new(local_user),
            suppressor: EchoSuppressor::new(config.suppression_ttl),
            drift: DriftCorrector::new(config.drift_interval, config.drift_threshold_secs),
            queue: QueueCoordinator::new(),
            playback: PlaybackState::default(),
            users: Vec::new(),
            loaded_video: None,
            join: JoinProgress::default(),
            end_reason: None,
            channel,
            player,
            app_events,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn local_user(&self) -> &UserId {
        self.gate.local_user()
    }

    pub fn is_host(&self) -> bool {
        self.gate.is_host()
    }

    pub fn host(&self) -> Option<&UserId> {
        self.gate.host()
    }

    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    pub fn playback(&self) -> &PlaybackState {
        &self.playback
    }

    pub fn queue(&self) -> &QueueCoordinator {
        &self.queue
    }

    pub fn active_video_id(&self) -> Option<&VideoId> {
        self.queue.active_video_id()
    }

    /// When the drift check is next due, if armed.
    pub fn drift_deadline(&self) -> Option<Instant> {
        self.drift.deadline()
    }

    pub fn end_reason(&self) -> Option<&EndReason> {
        self.end_reason.as_ref()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// `Disconnected → Joining`. Call once the room is known to exist and the
    /// channel is connected. A REST room snapshot, when available, seeds the
    /// playback position applied on entering `Synced`.
    pub fn begin_join(&mut self, details: Option<&RoomDetails>) -> Result<()> {
        self.expect_state(SessionState::Disconnected)?;

        self.state = SessionState::Joining;
        self.gate.set_connected(true);
        self.join = JoinProgress {
            snapshot: details.and_then(|d| d.playback_state),
            ..JoinProgress::default()
        };
        self.end_reason = None;

        info!(room_id = %self.room_id, user = %self.local_user(), "joining room");
        self.send(ClientEvent::JoinRoom {
            room_id: self.room_id.clone(),
            username: self.local_user().clone(),
        });
        Ok(())
    }

    /// Explicit leave: tell the relay, then tear down.
    pub fn leave(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        self.send(ClientEvent::LeaveRoom {
            room_id: self.room_id.clone(),
            username: self.local_user().clone(),
        });
        self.teardown(EndReason::Left);
    }

    /// `* → Disconnected`. Cancels the drift check and drops latches before
    /// the state changes so nothing can be emitted afterwards.
    pub fn teardown(&mut self, reason: EndReason) {
        if self.state == SessionState::Disconnected {
            return;
        }
        self.drift.disarm();
        self.suppressor.clear();
        self.gate.set_connected(false);
        self.join = JoinProgress::default();
        self.state = SessionState::Disconnected;

        info!(room_id = %self.room_id, ?reason, "left room");
        self.app_events.emit_session_ended(&reason);
        self.end_reason = Some(reason);
    }

    // -----------------------------------------------------------------------
    // Inbound relay events
    // -----------------------------------------------------------------------

    pub fn handle_event(&mut self, event: ServerEvent) {
        if self.state == SessionState::Disconnected {
            debug!(?event, "session disconnected; ignoring event");
            return;
        }

        match event {
            ServerEvent::Joined { room_id, username } => {
                if room_id == self.room_id {
                    info!(room_id = %room_id, user = %username, "relay accepted join");
                } else {
                    debug!(room_id = %room_id, "join ack for another room");
                }
            }

            ServerEvent::UserList { users } => {
                self.users = users;
                self.app_events.emit_users(&self.users);
                self.join.users = true;
                self.maybe_complete_join();
            }

            ServerEvent::HostUpdate { host } => {
                self.apply_host(host);
                self.join.host = true;
                self.maybe_complete_join();
            }

            ServerEvent::QueueUpdate {
                queue,
                current_index,
            } => {
                self.apply_queue(queue, current_index);
                self.join.queue = true;
                self.maybe_complete_join();
            }

            ServerEvent::SyncState(snapshot) => {
                if self.state == SessionState::Joining {
                    self.join.snapshot = Some(snapshot);
                } else {
                    self.apply_snapshot(snapshot);
                }
            }

            ServerEvent::Play | ServerEvent::Pause | ServerEvent::Seek { .. }
                if self.state != SessionState::Synced =>
            {
                debug!(?event, "not synced yet; relying on resync");
            }

            ServerEvent::Play => {
                if self.suppressor.consume_if_local(ControlKind::Play) {
                    debug!("play echo suppressed");
                } else {
                    self.player.play();
                }
                self.set_playing(true);
            }

            ServerEvent::Pause => {
                if self.suppressor.consume_if_local(ControlKind::Pause) {
                    debug!("pause echo suppressed");
                } else {
                    self.player.pause();
                }
                self.set_playing(false);
            }

            ServerEvent::Seek { time } => {
                if self.suppressor.consume_if_local(ControlKind::Seek) {
                    debug!(time, "seek echo suppressed");
                } else {
                    self.player.seek_to(time, true);
                }
                self.playback.current_time = time;
                self.drift.record_broadcast(time);
                self.app_events.emit_playback(&self.playback);
            }

            ServerEvent::Kicked { room_id, username } => {
                let other_room = room_id.as_ref().is_some_and(|r| *r != self.room_id);
                // The relay announces kicks to the whole room; without a
                // username the roster it sent just before names who is gone.
                let other_user = match &username {
                    Some(user) => user != self.local_user(),
                    None => self.users.contains(self.local_user()),
                };
                if other_room || other_user {
                    debug!(?room_id, ?username, "kick addressed elsewhere");
                    return;
                }
                warn!(room_id = %self.room_id, "kicked from room");
                self.teardown(EndReason::Kicked);
            }

            ServerEvent::Error { message } => {
                if self.state == SessionState::Joining {
                    warn!(room_id = %self.room_id, %message, "relay rejected join");
                    self.teardown(EndReason::Rejected(message));
                } else {
                    warn!(room_id = %self.room_id, %message, "relay error");
                }
            }

            ServerEvent::Disconnected => {
                warn!(room_id = %self.room_id, "transport lost");
                self.teardown(EndReason::TransportLost);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Local player notifications
    // -----------------------------------------------------------------------

    /// The player finished loading. A follower asks for the room position.
    pub fn handle_player_ready(&mut self) {
        if self.state == SessionState::Synced && !self.is_host() {
            self.send(ClientEvent::SyncRequest {
                room_id: self.room_id.clone(),
            });
        }
    }

    pub fn handle_player_state(&mut self, state: PlayerState) {
        match state {
            PlayerState::Playing => {
                self.set_playing(true);
                if !self.may_broadcast() {
                    return;
                }
                self.broadcast(ClientEvent::Play {
                    room_id: self.room_id.clone(),
                });

                let now = self.sample_time();
                if self.drift.diverged(now) {
                    self.broadcast(ClientEvent::Seek {
                        room_id: self.room_id.clone(),
                        time: now,
                    });
                    self.drift.record_broadcast(now);
                }
                self.drift.arm();
            }

            PlayerState::Paused => {
                self.set_playing(false);
                self.drift.disarm();
                if self.may_broadcast() {
                    self.broadcast(ClientEvent::Pause {
                        room_id: self.room_id.clone(),
                    });
                }
            }

            PlayerState::Ended => {
                self.set_playing(false);
                self.drift.disarm();
                if self.may_broadcast() {
                    self.broadcast(ClientEvent::Next {
                        room_id: self.room_id.clone(),
                    });
                }
            }

            PlayerState::Unstarted | PlayerState::Buffering | PlayerState::VideoCued => {
                debug!(?state, "player state needs no sync action");
            }
        }
    }

    /// Periodic drift check; the session calls this when
    /// [`SyncEngine::drift_deadline`] passes.
    pub fn drift_tick(&mut self) {
        if !self.may_broadcast() || !self.playback.playing {
            self.drift.disarm();
            return;
        }
        let now = self.sample_time();
        if let Some(time) = self.drift.tick(now) {
            debug!(time, "drift detected; correcting");
            self.broadcast(ClientEvent::Seek {
                room_id: self.room_id.clone(),
                time,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Local user controls
    // -----------------------------------------------------------------------

    /// Host clicked play. The broadcast follows from the player's state
    /// change; the relay's echo is swallowed.
    pub fn local_play(&mut self) -> Result<()> {
        self.expect_host()?;
        self.suppressor.mark_local(ControlKind::Play);
        self.player.play();
        Ok(())
    }

    pub fn local_pause(&mut self) -> Result<()> {
        self.expect_host()?;
        self.suppressor.mark_local(ControlKind::Pause);
        self.player.pause();
        Ok(())
    }

    /// Host dragged the seek bar.
    pub fn local_seek(&mut self, time: f64) -> Result<()> {
        let time = valid_time(time).ok_or(SyncError::InvalidTime(time))?;
        self.expect_host()?;
        self.suppressor.mark_local(ControlKind::Seek);
        self.player.seek_to(time, true);
        self.playback.current_time = time;
        self.broadcast(ClientEvent::Seek {
            room_id: self.room_id.clone(),
            time,
        });
        self.drift.record_broadcast(time);
        self.app_events.emit_playback(&self.playback);
        Ok(())
    }

    /// Ask the relay to advance the queue. The new index arrives through
    /// `queue_update`.
    pub fn request_next(&mut self) -> Result<()> {
        self.expect_host()?;
        if !self.queue.can_advance() {
            return Err(SyncError::QueueExhausted);
        }
        self.broadcast(ClientEvent::Next {
            room_id: self.room_id.clone(),
        });
        Ok(())
    }

    /// Any member may ask for the room's playback snapshot.
    pub fn request_sync(&mut self) -> Result<()> {
        self.expect_state(SessionState::Synced)?;
        self.send(ClientEvent::SyncRequest {
            room_id: self.room_id.clone(),
        });
        Ok(())
    }

    pub fn kick_user(&mut self, username: UserId) -> Result<()> {
        self.expect_host()?;
        self.broadcast(ClientEvent::KickUser {
            room_id: self.room_id.clone(),
            username,
            host: self.local_user().clone(),
        });
        Ok(())
    }

    /// Local only; volume is never shared.
    pub fn set_volume(&mut self, level: u32) {
        let volume = Volume::new(level);
        self.player.set_volume(volume);
        if volume.is_silent() {
            self.player.mute();
        } else if self.playback.muted {
            self.player.unmute();
        }
        self.playback.volume = volume;
        self.playback.muted = volume.is_silent();
        self.app_events.emit_playback(&self.playback);
    }

    pub fn toggle_mute(&mut self) {
        if self.playback.muted {
            let volume = if self.playback.volume.is_silent() {
                Volume::new(UNMUTE_FALLBACK_VOLUME)
            } else {
                self.playback.volume
            };
            self.player.unmute();
            self.player.set_volume(volume);
            self.playback.volume = volume;
            self.playback.muted = false;
        } else {
            self.player.mute();
            self.playback.muted = true;
        }
        self.app_events.emit_playback(&self.playback);
    }

    /// Pull position and duration from the player into the local state.
    pub fn refresh_position(&mut self) -> &PlaybackState {
        self.sample_time();
        self.playback.duration = self.player.duration().and_then(valid_time);
        &self.playback
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn maybe_complete_join(&mut self) {
        if self.state != SessionState::Joining || !self.join.complete() {
            return;
        }
        self.state = SessionState::Synced;
        info!(
            room_id = %self.room_id,
            is_host = self.is_host(),
            users = self.users.len(),
            "synced with room"
        );

        match self.join.snapshot.take() {
            Some(snapshot) => self.apply_snapshot(snapshot),
            None => self.send(ClientEvent::SyncRequest {
                room_id: self.room_id.clone(),
            }),
        }
    }

    fn apply_host(&mut self, host: Option<UserId>) {
        let was_host = self.gate.is_host();
        let is_host = self.gate.update(host);
        if was_host && !is_host {
            self.drift.disarm();
        } else if !was_host && is_host && self.playback.playing {
            let now = self.sample_time();
            self.drift.record_broadcast(now);
            self.drift.arm();
        }
        info!(host = ?self.gate.host(), is_host, "host updated");
        self.app_events.emit_host(self.gate.host(), is_host);
    }

    /// A newly active video starts playing once the session is live, the
    /// way the room's players autoplay after `next`. While joining it is
    /// only cued and the snapshot decides.
    fn apply_queue(&mut self, queue: Vec<VideoId>, current_index: Option<i64>) {
        let active = self.queue.apply_update(queue, current_index).cloned();
        if active != self.loaded_video {
            let autoplay = active.is_some() && self.state == SessionState::Synced;
            if let Some(video) = &active {
                info!(video = %video, autoplay, "loading video");
                self.player.load_video(video);
                if autoplay {
                    self.player.play();
                }
            }
            self.loaded_video = active;
            self.playback.current_time = 0.0;
            self.playback.duration = None;
            self.playback.playing = autoplay;
            self.drift.record_broadcast(0.0);
            self.app_events.emit_playback(&self.playback);
        }
        self.app_events
            .emit_queue(self.queue.queue(), self.queue.current_index());
    }

    /// Full-state override: position and play state regardless of latches.
    fn apply_snapshot(&mut self, snapshot: PlaybackSnapshot) {
        self.suppressor.clear();
        self.player.seek_to(snapshot.time, true);
        if snapshot.playing {
            self.player.play();
        } else {
            self.player.pause();
        }
        self.playback.current_time = snapshot.time;
        self.playback.playing = snapshot.playing;
        self.drift.record_broadcast(snapshot.time);
        if snapshot.playing && self.is_host() {
            self.drift.arm();
        } else {
            self.drift.disarm();
        }
        debug!(time = snapshot.time, playing = snapshot.playing, "applied sync snapshot");
        self.app_events.emit_playback(&self.playback);
    }

    fn set_playing(&mut self, playing: bool) {
        if self.playback.playing != playing {
            self.playback.playing = playing;
            self.app_events.emit_playback(&self.playback);
        }
    }

    /// Read the player's position; bogus readings keep the previous value.
    fn sample_time(&mut self) -> f64 {
        if let Some(time) = valid_time(self.player.current_time()) {
            self.playback.current_time = time;
        }
        self.playback.current_time
    }

    fn may_broadcast(&self) -> bool {
        self.state == SessionState::Synced && self.gate.is_host()
    }

    /// Host-only events. Anything else is stopped here, before the wire.
    fn broadcast(&self, event: ClientEvent) {
        debug_assert!(event.is_host_only());
        if !self.may_broadcast() {
            debug!(event = event.name(), "not host; broadcast suppressed");
            return;
        }
        self.channel.emit(&event);
    }

    /// Events any member may send.
    fn send(&self, event: ClientEvent) {
        if self.state == SessionState::Disconnected {
            debug!(event = event.name(), "session disconnected; not sending");
            return;
        }
        self.channel.emit(&event);
    }

    fn expect_state(&self, expected: SessionState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SyncError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    fn expect_host(&self) -> Result<()> {
        self.expect_state(SessionState::Synced)?;
        if self.gate.is_host() {
            Ok(())
        } else {
            Err(SyncError::NotHost)
        }
    }
}
