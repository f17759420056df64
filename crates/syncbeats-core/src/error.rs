//! Errors surfaced by the sync core.

use crate::domain::identity::RoomId;
use crate::domain::room::SessionState;

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A host-only action was requested by a non-host session.
    #[error("only the room host may do that")]
    NotHost,

    #[error("session is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },

    #[error("room {0} does not exist")]
    RoomNotFound(RoomId),

    #[error("event channel is not connected")]
    NotConnected,

    /// `next` was requested on the last queue entry.
    #[error("no video after the current one")]
    QueueExhausted,

    #[error("invalid playback time {0}")]
    InvalidTime(f64),

    #[error("not a video link or id: {0:?}")]
    InvalidVideo(String),

    #[error("the session has ended")]
    SessionClosed,

    #[error("invalid configuration: {0}")]
    Config(String),
}
