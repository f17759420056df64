//! Room REST API.
//!
//! ```text
//! POST   /api/rooms                       -> {"roomId": "..."}
//! GET    /api/rooms/{id}                  -> room details, or {"exists": false}
//! POST   /api/rooms/{id}/queue            <- {"videoId": "..."}
//! DELETE /api/rooms/{id}/queue/{videoId}
//! ```

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use syncbeats_core::domain::identity::{RoomId, VideoId};
use syncbeats_core::domain::room::RoomDetails;

use crate::rooms::{RelayError, RoomRegistry};

pub fn routes() -> Router<Arc<RoomRegistry>> {
    Router::new()
        .route("/api/rooms", post(create_room))
        .route("/api/rooms/:room_id", get(get_room))
        .route("/api/rooms/:room_id/queue", post(add_to_queue))
        .route("/api/rooms/:room_id/queue/:video_id", delete(remove_from_queue))
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match self {
            RelayError::MissingVideoId => StatusCode::BAD_REQUEST,
            RelayError::RoomNotFound | RelayError::VideoNotInQueue => StatusCode::NOT_FOUND,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatedRoom {
    room_id: RoomId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddVideo {
    #[serde(default)]
    video_id: Option<String>,
}

async fn create_room(State(rooms): State<Arc<RoomRegistry>>) -> Json<CreatedRoom> {
    Json(CreatedRoom {
        room_id: rooms.create_room(),
    })
}

async fn get_room(
    State(rooms): State<Arc<RoomRegistry>>,
    Path(room_id): Path<String>,
) -> Json<RoomDetails> {
    Json(rooms.details(&RoomId::new(room_id)))
}

async fn add_to_queue(
    State(rooms): State<Arc<RoomRegistry>>,
    Path(room_id): Path<String>,
    Json(body): Json<AddVideo>,
) -> Result<Json<serde_json::Value>, RelayError> {
    let video = VideoId::new(body.video_id.unwrap_or_default());
    rooms.add_video(&RoomId::new(room_id), video)?;
    Ok(Json(json!({ "success": true })))
}

async fn remove_from_queue(
    State(rooms): State<Arc<RoomRegistry>>,
    Path((room_id, video_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, RelayError> {
    rooms.remove_video(&RoomId::new(room_id), &VideoId::new(video_id))?;
    Ok(Json(json!({ "success": true })))
}
