//! reqwest-based [`RoomService`] adapter for the room REST API.
//!
//! ```text
//! POST   /api/rooms                       -> {"roomId": "..."}
//! GET    /api/rooms/{id}                  -> RoomDetails
//! POST   /api/rooms/{id}/queue            <- {"videoId": "..."}
//! DELETE /api/rooms/{id}/queue/{videoId}
//! ```

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::application::ports::RoomService;
use crate::domain::identity::{RoomId, VideoId};
use crate::domain::room::RoomDetails;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomResponse {
    room_id: RoomId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddVideoRequest<'a> {
    video_id: &'a VideoId,
}

pub struct HttpRoomService {
    client: Client,
    base_url: String,
}

impl HttpRoomService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl RoomService for HttpRoomService {
    async fn create_room(&self) -> anyhow::Result<RoomId> {
        let response: CreateRoomResponse = self
            .client
            .post(self.url("/api/rooms"))
            .send()
            .await
            .context("creating room")?
            .error_for_status()?
            .json()
            .await
            .context("decoding create-room response")?;
        info!(room_id = %response.room_id, "Created room");
        Ok(response.room_id)
    }

    async fn get_room(&self, room_id: &RoomId) -> anyhow::Result<RoomDetails> {
        let response = self
            .client
            .get(self.url(&format!("/api/rooms/{room_id}")))
            .send()
            .await
            .with_context(|| format!("fetching room {room_id}"))?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(%room_id, "room service answered 404");
            return Ok(RoomDetails::default());
        }
        response
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("decoding room {room_id}"))
    }

    async fn add_video(&self, room_id: &RoomId, video: &VideoId) -> anyhow::Result<()> {
        self.client
            .post(self.url(&format!("/api/rooms/{room_id}/queue")))
            .json(&AddVideoRequest { video_id: video })
            .send()
            .await
            .with_context(|| format!("adding {video} to room {room_id}"))?
            .error_for_status()?;
        info!(%room_id, %video, "Queued video");
        Ok(())
    }

    async fn remove_video(&self, room_id: &RoomId, video: &VideoId) -> anyhow::Result<()> {
        self.client
            .delete(self.url(&format!("/api/rooms/{room_id}/queue/{video}")))
            .send()
            .await
            .with_context(|| format!("removing {video} from room {room_id}"))?
            .error_for_status()?;
        info!(%room_id, %video, "Removed video from queue");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    use super::*;

    /// Serve one canned response per connection and report each request
    /// line.
    async fn canned_server(
        responses: Vec<(u16, &'static str)>,
    ) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                let _ = tx.send(request.lines().next().unwrap_or_default().to_string());
                let reply = format!(
                    "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
            }
        });
        (format!("http://{addr}"), rx)
    }

    /// Read headers plus a `content-length` body.
    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data);
            if let Some(end) = text.find("\r\n\r\n") {
                let body_len = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if data.len() >= end + 4 + body_len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).to_string()
    }

    #[tokio::test]
    async fn get_room_decodes_details() {
        let (base, mut requests) = canned_server(vec![(
            200,
            r#"{"exists":true,"host":"alice","users":["alice"],"queue":["dQw4w9WgXcQ"],"currentIndex":0,"playbackState":{"time":3.5,"playing":true}}"#,
        )])
        .await;
        let service = HttpRoomService::new(base, Duration::from_secs(5)).unwrap();

        let details = service.get_room(&RoomId::new("ROOM0001")).await.unwrap();
        assert!(details.exists);
        assert_eq!(details.queue, vec![VideoId::new("dQw4w9WgXcQ")]);
        assert_eq!(details.playback_state.map(|p| p.time), Some(3.5));
        assert_eq!(
            requests.recv().await.unwrap(),
            "GET /api/rooms/ROOM0001 HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn missing_room_is_not_an_error() {
        let (base, _requests) =
            canned_server(vec![(200, r#"{"exists":false}"#), (404, r#"{}"#)]).await;
        let service = HttpRoomService::new(base, Duration::from_secs(5)).unwrap();

        assert!(!service.get_room(&RoomId::new("NOPE")).await.unwrap().exists);
        assert!(!service.get_room(&RoomId::new("NOPE")).await.unwrap().exists);
    }

    #[tokio::test]
    async fn create_and_queue_hit_expected_routes() {
        let (base, mut requests) = canned_server(vec![
            (200, r#"{"roomId":"NEWROOM1"}"#),
            (200, r#"{"success":true}"#),
            (404, r#"{"error":"Video not found in queue"}"#),
        ])
        .await;
        let service = HttpRoomService::new(format!("{base}/"), Duration::from_secs(5)).unwrap();

        let room = service.create_room().await.unwrap();
        assert_eq!(room, RoomId::new("NEWROOM1"));
        service
            .add_video(&room, &VideoId::new("abc"))
            .await
            .unwrap();
        assert!(service
            .remove_video(&room, &VideoId::new("abc"))
            .await
            .is_err());

        assert_eq!(requests.recv().await.unwrap(), "POST /api/rooms HTTP/1.1");
        assert_eq!(
            requests.recv().await.unwrap(),
            "POST /api/rooms/NEWROOM1/queue HTTP/1.1"
        );
        assert_eq!(
            requests.recv().await.unwrap(),
            "DELETE /api/rooms/NEWROOM1/queue/abc HTTP/1.1"
        );
    }
}
