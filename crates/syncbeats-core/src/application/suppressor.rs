//! Echo suppression for locally initiated playback controls.
//!
//! When this client drives the player directly (a host clicking play), the
//! relay will later echo the same action back. A single-use latch per
//! control kind swallows exactly one matching inbound event so the player is
//! not commanded twice.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::domain::playback::ControlKind;

/// Per-control-kind single-use latches.
#[derive(Debug)]
pub struct EchoSuppressor {
    /// When each latch was armed; `None` when clear.
    armed_at: [Option<Instant>; 3],
    /// An unconsumed latch older than this no longer suppresses anything.
    ttl: Duration,
}

impl EchoSuppressor {
    pub fn new(ttl: Duration) -> Self {
        Self {
            armed_at: [None; 3],
            ttl,
        }
    }

    /// Arm the latch for `kind` before performing the local action.
    pub fn mark_local(&mut self, kind: ControlKind) {
        self.armed_at[kind.index()] = Some(Instant::now());
    }

    /// Check and clear the latch. Returns `true` when the inbound event is an
    /// echo of a local action and must not be re-applied.
    pub fn consume_if_local(&mut self, kind: ControlKind) -> bool {
        match self.armed_at[kind.index()].take() {
            Some(at) if at.elapsed() <= self.ttl => true,
            Some(_) => {
                debug!(?kind, "suppression latch expired before its echo arrived");
                false
            }
            None => false,
        }
    }

    pub fn is_armed(&self, kind: ControlKind) -> bool {
        self.armed_at[kind.index()].is_some_and(|at| at.elapsed() <= self.ttl)
    }

    /// Drop all latches (snapshot reconciliation, teardown).
    pub fn clear(&mut self) {
        self.armed_at = [None; 3];
    }
}
