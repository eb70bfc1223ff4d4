//! REST implementation of [`RoomApi`] over reqwest.

use async_trait::async_trait;
use roomsync_proto::{Message, RoomId};
use serde::Serialize;

use crate::{error::ApiError, transport::RoomApi};

/// Number of history messages requested when a room is selected.
pub const HISTORY_LIMIT: usize = 50;

/// REST room API authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpRoomApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Serialize)]
struct CreateMessage<'a> {
    room_id: &'a RoomId,
    content: &'a str,
    message_type: &'static str,
}

impl HttpRoomApi {
    /// API rooted at `base_url` (for example `http://localhost:8000`).
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client: reqwest::Client::new(), base_url, token: token.into() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = if body.is_empty() {
            status.canonical_reason().unwrap_or_default().to_string()
        } else {
            body
        };
        Err(ApiError::Status { status: status.as_u16(), message })
    }
}

#[async_trait]
impl RoomApi for HttpRoomApi {
    async fn fetch_room_messages(&self, room: &RoomId) -> Result<Vec<Message>, ApiError> {
        let url = self.url(&format!("/api/messages/room/{room}"));
        let request = self.client.get(url).query(&[("limit", HISTORY_LIMIT)]);
        let response = self.execute(request).await?;
        response.json().await.map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn post_join_room(&self, room: &RoomId) -> Result<(), ApiError> {
        let url = self.url(&format!("/api/rooms/{room}/join"));
        self.execute(self.client.post(url)).await?;
        Ok(())
    }

    async fn create_message(&self, room: &RoomId, content: &str) -> Result<Message, ApiError> {
        let body = CreateMessage { room_id: room, content, message_type: "text" };
        let request = self.client.post(self.url("/api/messages")).json(&body);
        let response = self.execute(request).await?;
        response.json().await.map_err(|e| ApiError::Decode(e.to_string()))
    }
}
