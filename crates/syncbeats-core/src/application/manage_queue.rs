//! ManageQueue use case — queue edits go through the room service; the new
//! queue comes back over the relay as `queue_update`.

use std::sync::Arc;

use tracing::info;

use crate::domain::identity::{RoomId, VideoId};
use crate::error::SyncError;

use super::ports::RoomService;

pub struct ManageQueueUseCase {
    rooms: Arc<dyn RoomService>,
    room_id: RoomId,
}

impl ManageQueueUseCase {
    pub fn new(rooms: Arc<dyn RoomService>, room_id: RoomId) -> Self {
        Self { rooms, room_id }
    }

    /// Append a video given as a link or a bare id.
    pub async fn add(&self, input: &str) -> anyhow::Result<VideoId> {
        let video = VideoId::parse(input).ok_or_else(|| SyncError::InvalidVideo(input.to_string()))?;
        self.rooms.add_video(&self.room_id, &video).await?;
        info!(room_id = %self.room_id, %video, "Added to queue");
        Ok(video)
    }

    pub async fn remove(&self, video: &VideoId) -> anyhow::Result<()> {
        self.rooms.remove_video(&self.room_id, video).await?;
        info!(room_id = %self.room_id, %video, "Removed from queue");
        Ok(())
    }
}
