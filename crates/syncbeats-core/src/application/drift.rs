//! Drift corrector — host-side periodic re-synchronization.
//!
//! While the host is playing, every `interval` the local playback time is
//! compared against the last time broadcast to the room; when they diverge by
//! more than `threshold` seconds a corrective `seek` is due.
//!
//! There is at most one pending deadline. Arming an armed corrector moves the
//! deadline instead of adding a second timer; the session loop sleeps on
//! [`DriftCorrector::deadline`].

use std::time::Duration;

use tokio::time::Instant;

/// Default check period.
pub const DEFAULT_DRIFT_INTERVAL: Duration = Duration::from_secs(5);
/// Default divergence (seconds) that triggers a corrective seek.
pub const DEFAULT_DRIFT_THRESHOLD: f64 = 1.0;

#[derive(Debug)]
pub struct DriftCorrector {
    interval: Duration,
    threshold: f64,
    next_due: Option<Instant>,
    last_broadcast_time: f64,
    last_broadcast_at: Option<Instant>,
}

impl DriftCorrector {
    pub fn new(interval: Duration, threshold: f64) -> Self {
        Self {
            interval,
            threshold,
            next_due: None,
            last_broadcast_time: 0.0,
            last_broadcast_at: None,
        }
    }

    /// Schedule the next check one interval from now.
    pub fn arm(&mut self) {
        self.next_due = Some(Instant::now() + self.interval);
    }

    /// Cancel the pending check.
    pub fn disarm(&mut self) {
        self.next_due = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.next_due
    }

    /// Whether `current_time` is far enough from the last broadcast time to
    /// warrant a seek.
    pub fn diverged(&self, current_time: f64) -> bool {
        (current_time - self.last_broadcast_time).abs() > self.threshold
    }

    /// Record a time that was just broadcast (or received from the host).
    pub fn record_broadcast(&mut self, time: f64) {
        self.last_broadcast_time = time;
        self.last_broadcast_at = Some(Instant::now());
    }

    pub fn last_broadcast_time(&self) -> f64 {
        self.last_broadcast_time
    }

    pub fn last_broadcast_at(&self) -> Option<Instant> {
        self.last_broadcast_at
    }

    /// Run one check if it is due. Returns the time to broadcast when the
    /// check found drift; the caller emits the seek. Re-arms for the next
    /// interval whenever a check ran.
    pub fn tick(&mut self, current_time: f64) -> Option<f64> {
        let due = self.next_due?;
        let now = Instant::now();
        if now < due {
            return None;
        }
        self.next_due = Some(now + self.interval);

        if self.diverged(current_time) {
            self.record_broadcast(current_time);
            Some(current_time)
        } else {
            None
        }
    }
}

impl Default for DriftCorrector {
    fn default() -> Self {
        Self::new(DEFAULT_DRIFT_INTERVAL, DEFAULT_DRIFT_THRESHOLD)
    }
}
