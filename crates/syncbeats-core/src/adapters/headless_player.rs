//! Clock-driven [`PlayerEngine`] with no media behind it.
//!
//! Tracks position from a monotonic anchor the way an embedded player would
//! and pushes state changes through a [`PlayerNotifier`]. Used by the
//! terminal client and by tests that need a player reporting real
//! transitions.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::application::ports::{PlayerEngine, PlayerNotification, PlayerNotifier};
use crate::domain::identity::VideoId;
use crate::domain::playback::{valid_time, PlayerState, Volume};

#[derive(Debug)]
struct Inner {
    video: Option<VideoId>,
    state: PlayerState,
    /// Position at `anchor`, or the frozen position when not playing.
    position: f64,
    anchor: Option<Instant>,
    duration: Option<f64>,
    volume: Volume,
    muted: bool,
    ready: bool,
}

impl Inner {
    fn position(&self) -> f64 {
        let mut position = self.position;
        if let Some(anchor) = self.anchor {
            position += anchor.elapsed().as_secs_f64();
        }
        match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    fn freeze(&mut self) {
        self.position = self.position();
        self.anchor = None;
    }
}

pub struct HeadlessPlayer {
    inner: Mutex<Inner>,
    notifier: PlayerNotifier,
    /// Length given to every loaded video; `None` plays forever.
    video_length: Option<f64>,
}

impl HeadlessPlayer {
    pub fn new(notifier: PlayerNotifier) -> Self {
        Self {
            inner: Mutex::new(Inner {
                video: None,
                state: PlayerState::Unstarted,
                position: 0.0,
                anchor: None,
                duration: None,
                volume: Volume::default(),
                muted: false,
                ready: false,
            }),
            notifier,
            video_length: None,
        }
    }

    #[must_use]
    pub fn with_video_length(mut self, seconds: Option<f64>) -> Self {
        self.video_length = seconds.and_then(valid_time);
        self
    }

    pub fn state(&self) -> PlayerState {
        self.lock().state
    }

    pub fn video(&self) -> Option<VideoId> {
        self.lock().video.clone()
    }

    pub fn volume(&self) -> Volume {
        self.lock().volume
    }

    pub fn is_muted(&self) -> bool {
        self.lock().muted
    }

    /// Report `Ended` once the position reaches the duration. Returns whether
    /// the video ended on this call.
    pub fn poll_ended(&self) -> bool {
        let mut inner = self.lock();
        let Some(duration) = inner.duration else {
            return false;
        };
        if inner.state != PlayerState::Playing || inner.position() < duration {
            return false;
        }
        inner.position = duration;
        inner.anchor = None;
        inner.state = PlayerState::Ended;
        drop(inner);
        self.notify(PlayerNotification::StateChanged(PlayerState::Ended));
        true
    }

    /// Poll for end-of-video every `period` until the session drops its
    /// notification receiver.
    pub async fn run_clock(&self, period: Duration) {
        loop {
            tokio::time::sleep(period).await;
            if self.notifier.is_closed() {
                break;
            }
            self.poll_ended();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, notification: PlayerNotification) {
        if self.notifier.send(notification).is_err() {
            debug!(?notification, "no session listening");
        }
    }

    fn transition(&self, inner: &mut Inner, state: PlayerState) -> Option<PlayerNotification> {
        if inner.state == state {
            return None;
        }
        inner.state = state;
        Some(PlayerNotification::StateChanged(state))
    }
}

impl PlayerEngine for HeadlessPlayer {
    fn load_video(&self, video: &VideoId) {
        let mut inner = self.lock();
        inner.video = Some(video.clone());
        inner.position = 0.0;
        inner.anchor = None;
        inner.duration = self.video_length;
        inner.state = PlayerState::VideoCued;
        let first_load = !inner.ready;
        inner.ready = true;
        drop(inner);

        debug!(%video, "video cued");
        if first_load {
            self.notify(PlayerNotification::Ready);
        }
        self.notify(PlayerNotification::StateChanged(PlayerState::VideoCued));
    }

    fn play(&self) {
        let mut inner = self.lock();
        if inner.video.is_none() {
            debug!("play with no video loaded");
            return;
        }
        if inner.state == PlayerState::Ended {
            inner.position = 0.0;
        }
        if inner.anchor.is_none() {
            inner.anchor = Some(Instant::now());
        }
        let change = self.transition(&mut inner, PlayerState::Playing);
        drop(inner);
        if let Some(change) = change {
            self.notify(change);
        }
    }

    fn pause(&self) {
        let mut inner = self.lock();
        if inner.state != PlayerState::Playing {
            return;
        }
        inner.freeze();
        let change = self.transition(&mut inner, PlayerState::Paused);
        drop(inner);
        if let Some(change) = change {
            self.notify(change);
        }
    }

    fn seek_to(&self, time: f64, _allow_seek_ahead: bool) {
        let Some(time) = valid_time(time) else {
            return;
        };
        let mut inner = self.lock();
        inner.position = match inner.duration {
            Some(duration) => time.min(duration),
            None => time,
        };
        if inner.anchor.is_some() {
            inner.anchor = Some(Instant::now());
        }
    }

    fn current_time(&self) -> f64 {
        self.lock().position()
    }

    fn duration(&self) -> Option<f64> {
        self.lock().duration
    }

    fn set_volume(&self, volume: Volume) {
        self.lock().volume = volume;
    }

    fn mute(&self) {
        self.lock().muted = true;
    }

    fn unmute(&self) {
        self.lock().muted = false;
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    fn player() -> (HeadlessPlayer, mpsc::UnboundedReceiver<PlayerNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (HeadlessPlayer::new(tx).with_video_length(Some(10.0)), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<PlayerNotification>) -> Vec<PlayerNotification> {
        let mut out = Vec::new();
        while let Ok(n) = rx.try_recv() {
            out.push(n);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn position_advances_only_while_playing() {
        let (player, mut rx) = player();
        player.load_video(&VideoId::new("abc"));
        assert_eq!(
            drain(&mut rx),
            vec![
                PlayerNotification::Ready,
                PlayerNotification::StateChanged(PlayerState::VideoCued)
            ]
        );

        player.play();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!((player.current_time() - 2.0).abs() < 1e-6);

        player.pause();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!((player.current_time() - 2.0).abs() < 1e-6);
        assert_eq!(
            drain(&mut rx),
            vec![
                PlayerNotification::StateChanged(PlayerState::Playing),
                PlayerNotification::StateChanged(PlayerState::Paused)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn seek_moves_position_without_notifying() {
        let (player, mut rx) = player();
        player.load_video(&VideoId::new("abc"));
        player.play();
        drain(&mut rx);

        player.seek_to(7.0, true);
        assert!((player.current_time() - 7.0).abs() < 1e-6);
        player.seek_to(f64::NAN, true);
        assert!((player.current_time() - 7.0).abs() < 1e-6);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reaching_the_end_reports_ended_once() {
        let (player, mut rx) = player();
        player.load_video(&VideoId::new("abc"));
        player.play();
        drain(&mut rx);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(player.poll_ended());
        assert!(!player.poll_ended());
        assert_eq!(player.current_time(), 10.0);
        assert_eq!(
            drain(&mut rx),
            vec![PlayerNotification::StateChanged(PlayerState::Ended)]
        );
    }

    #[test]
    fn play_without_video_is_ignored() {
        let (player, mut rx) = player();
        player.play();
        assert_eq!(player.state(), PlayerState::Unstarted);
        assert!(drain(&mut rx).is_empty());
    }
}
