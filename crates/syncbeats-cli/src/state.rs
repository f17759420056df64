//! Room connection — holds Arc-wrapped adapters and use cases from
//! syncbeats-core for the lifetime of one room membership.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use syncbeats_core::adapters::headless_player::HeadlessPlayer;
use syncbeats_core::adapters::rest::HttpRoomService;
use syncbeats_core::adapters::ws::client::WsEventChannel;
use syncbeats_core::application::join_room::JoinRoomUseCase;
use syncbeats_core::application::manage_queue::ManageQueueUseCase;
use syncbeats_core::application::ports::{AppEvents, EventChannel, RoomService};
use syncbeats_core::application::session::{RoomSession, SessionHandle};
use syncbeats_core::application::sync_engine::SyncEngine;
use syncbeats_core::domain::identity::{RoomId, UserId};
use syncbeats_core::domain::room::EndReason;
use syncbeats_core::SyncConfig;

/// How often the headless player checks for end of video.
const PLAYER_CLOCK_PERIOD: Duration = Duration::from_millis(250);

/// Which room to enter.
#[derive(Debug, Clone)]
pub enum RoomTarget {
    Join(RoomId),
    Create,
}

pub struct RoomConnection {
    pub room_id: RoomId,
    pub username: UserId,
    pub handle: SessionHandle,
    pub queue: ManageQueueUseCase,
    pub channel: Arc<dyn EventChannel>,
    pub session: JoinHandle<syncbeats_core::Result<EndReason>>,
}

/// Build all adapters, check the room, connect, and spawn the session and
/// player clock. Returns a [`RoomConnection`].
pub async fn build_room_connection(
    config: &SyncConfig,
    target: RoomTarget,
    username: UserId,
    video_length: Option<f64>,
    app_events: Arc<dyn AppEvents>,
) -> anyhow::Result<RoomConnection> {
    // Adapters
    let rooms: Arc<dyn RoomService> = Arc::new(HttpRoomService::new(
        config.api_base_url.clone(),
        config.request_timeout,
    )?);
    let channel: Arc<dyn EventChannel> = Arc::new(WsEventChannel::new(config.relay_url.clone()));
    let (notifier, notifications) = mpsc::unbounded_channel();
    let player = Arc::new(HeadlessPlayer::new(notifier).with_video_length(video_length));

    // Room check + connect
    let join_room = JoinRoomUseCase::new(rooms.clone(), channel.clone());
    let room_id = match target {
        RoomTarget::Join(room_id) => room_id,
        RoomTarget::Create => join_room.create().await?,
    };
    let details = join_room.execute(&room_id).await?;

    // Session
    let engine = SyncEngine::new(
        room_id.clone(),
        username.clone(),
        config,
        channel.clone(),
        player.clone(),
        app_events,
    );
    let (session, handle) = RoomSession::new(engine, channel.clone(), Some(details), notifications);
    let session = tokio::spawn(session.run());

    // Player clock
    tokio::spawn(async move {
        player.run_clock(PLAYER_CLOCK_PERIOD).await;
    });

    info!(%room_id, user = %username, "Room session started");
    Ok(RoomConnection {
        queue: ManageQueueUseCase::new(rooms, room_id.clone()),
        room_id,
        username,
        handle,
        channel,
        session,
    })
}
