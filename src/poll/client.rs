use crate::models::{PanelStatus, Room};
use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::json;

/// HTTP client for the room endpoints.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    session: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).with_context(|| format!("Invalid API base URL {}", base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("API base URL {} cannot carry a path", base_url);
        }
        Ok(Self {
            client: Client::new(),
            base_url,
            session: None,
        })
    }

    /// Attach a session token; needed for everything but the status board.
    pub fn with_session(mut self, token: impl Into<String>) -> Self {
        self.session = Some(token.into());
        self
    }

    /// Base URL with `segments` appended, each percent-encoded on its own.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.session {
            Some(token) => request.header(
                reqwest::header::COOKIE,
                format!("{}={}", crate::session::SESSION_COOKIE, token),
            ),
            None => request,
        }
    }

    pub async fn list_rooms(&self) -> Result<Vec<Room>> {
        let response = self
            .authed(self.client.get(self.url(&["api", "rooms"])))
            .send()
            .await
            .context("Failed to fetch rooms")?;
        read_field(response, "rooms").await
    }

    pub async fn get_room(&self, room_id: &str) -> Result<Room> {
        let response = self
            .authed(self.client.get(self.url(&["api", "rooms", room_id])))
            .send()
            .await
            .with_context(|| format!("Failed to fetch room {}", room_id))?;
        read_field(response, "room").await
    }

    /// Returns the room as stored after the change.
    pub async fn update_panel_status(&self, room_id: &str, panel_id: &str, status: PanelStatus) -> Result<Room> {
        let url = self.url(&["api", "rooms", room_id, "panels", panel_id, "status"]);
        let response = self
            .authed(self.client.put(url))
            .json(&json!({ "status": status }))
            .send()
            .await
            .with_context(|| format!("Failed to update panel {} in {}", panel_id, room_id))?;
        read_field(response, "room").await
    }
}

/// Unwrap the `{"success": .., field: ..}` envelope.
async fn read_field<T: DeserializeOwned>(response: Response, field: &str) -> Result<T> {
    let status = response.status();
    let mut json: serde_json::Value = response.json().await.context("Response was not JSON")?;

    if !json["success"].as_bool().unwrap_or(false) {
        anyhow::bail!(
            "API error ({}): {}",
            status,
            json["error"].as_str().unwrap_or("unknown")
        );
    }

    let value = json
        .get_mut(field)
        .map(serde_json::Value::take)
        .with_context(|| format!("No {} in response", field))?;
    serde_json::from_value(value).with_context(|| format!("Unexpected {} payload", field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_dropped() {
        let client = ApiClient::new("http://localhost:3000/").unwrap();
        assert_eq!(client.url(&["api", "rooms"]).as_str(), "http://localhost:3000/api/rooms");

        let mounted = ApiClient::new("https://k1000.example/manager/").unwrap();
        assert_eq!(
            mounted.url(&["api", "rooms"]).as_str(),
            "https://k1000.example/manager/api/rooms"
        );
    }

    #[test]
    fn test_ids_are_percent_encoded() {
        let client = ApiClient::new("http://localhost:3000").unwrap();
        let url = client.url(&["api", "rooms", "hall/a", "panels", "panel 1?x", "status"]);
        assert_eq!(
            url.as_str(),
            "http://localhost:3000/api/rooms/hall%2Fa/panels/panel%201%3Fx/status"
        );
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_base_url_must_accept_a_path() {
        assert!(ApiClient::new("not a url").is_err());
        assert!(ApiClient::new("mailto:rooms@kiit.ac.in").is_err());
    }

    #[test]
    fn test_session_cookie_is_attached() {
        let client = ApiClient::new("http://localhost:3000").unwrap().with_session("tok");
        let request = client
            .authed(client.client.get(client.url(&["api", "rooms", "room-1"])))
            .build()
            .unwrap();
        assert_eq!(request.headers()[reqwest::header::COOKIE], "k1000_session=tok");
    }
}
