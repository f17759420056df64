//! Recording port doubles for unit tests.

use std::sync::{Mutex, PoisonError};

use crate::domain::identity::{UserId, VideoId};
use crate::domain::playback::{PlaybackState, Volume};
use crate::domain::room::EndReason;

use super::ports::{AppEvents, PlayerEngine};

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCall {
    Load(VideoId),
    Play,
    Pause,
    SeekTo(f64),
    SetVolume(u8),
    Mute,
    Unmute,
}

/// Records commands; position and duration are set by the test.
#[derive(Default)]
pub struct ScriptedPlayer {
    calls: Mutex<Vec<PlayerCall>>,
    time: Mutex<f64>,
    duration: Mutex<Option<f64>>,
}

impl ScriptedPlayer {
    pub fn set_time(&self, time: f64) {
        *self.time.lock().unwrap() = time;
    }

    pub fn set_duration(&self, duration: Option<f64>) {
        *self.duration.lock().unwrap() = duration;
    }

    pub fn calls(&self) -> Vec<PlayerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn take_calls(&self) -> Vec<PlayerCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    fn record(&self, call: PlayerCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl PlayerEngine for ScriptedPlayer {
    fn load_video(&self, video: &VideoId) {
        self.record(PlayerCall::Load(video.clone()));
    }

    fn play(&self) {
        self.record(PlayerCall::Play);
    }

    fn pause(&self) {
        self.record(PlayerCall::Pause);
    }

    fn seek_to(&self, time: f64, _allow_seek_ahead: bool) {
        self.record(PlayerCall::SeekTo(time));
    }

    fn current_time(&self) -> f64 {
        *self.time.lock().unwrap()
    }

    fn duration(&self) -> Option<f64> {
        *self.duration.lock().unwrap()
    }

    fn set_volume(&self, volume: Volume) {
        self.record(PlayerCall::SetVolume(volume.get()));
    }

    fn mute(&self) {
        self.record(PlayerCall::Mute);
    }

    fn unmute(&self) {
        self.record(PlayerCall::Unmute);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    Users(Vec<UserId>),
    Host(Option<UserId>, bool),
    Queue(Vec<VideoId>, Option<usize>),
    Playback(PlaybackState),
    Ended(EndReason),
}

#[derive(Default)]
pub struct RecordingAppEvents {
    events: Mutex<Vec<AppEvent>>,
}

impl RecordingAppEvents {
    pub fn events(&self) -> Vec<AppEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: AppEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl AppEvents for RecordingAppEvents {
    fn emit_users(&self, users: &[UserId]) {
        self.record(AppEvent::Users(users.to_vec()));
    }

    fn emit_host(&self, host: Option<&UserId>, is_host: bool) {
        self.record(AppEvent::Host(host.cloned(), is_host));
    }

    fn emit_queue(&self, queue: &[VideoId], current_index: Option<usize>) {
        self.record(AppEvent::Queue(queue.to_vec(), current_index));
    }

    fn emit_playback(&self, state: &PlaybackState) {
        self.record(AppEvent::Playback(state.clone()));
    }

    fn emit_session_ended(&self, reason: &EndReason) {
        self.record(AppEvent::Ended(reason.clone()));
    }
}
