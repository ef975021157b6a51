// SPDX-License-Identifier: Apache-2.0

//! Client for the emulator REST API (buttons, screenshots, screen events)

use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::SessionError;

/// Physical button of a Nano device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Button {
    Left,
    Right,
    Both,
}

impl Button {
    pub fn as_str(&self) -> &'static str {
        match self {
            Button::Left => "left",
            Button::Right => "right",
            Button::Both => "both",
        }
    }
}

#[derive(Debug, Serialize)]
struct ButtonAction<'a> {
    action: &'a str,
}

/// Text drawn on the screen, as reported by `/events`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScreenEvent {
    pub text: String,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
}

#[derive(Debug, Deserialize)]
struct ScreenEvents {
    events: Vec<ScreenEvent>,
}

pub struct SpeculosApi {
    client: reqwest::Client,
    base_url: String,
}

impl SpeculosApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn check(url: &str, response: &reqwest::Response) -> Result<(), SessionError> {
        if !response.status().is_success() {
            return Err(SessionError::ApiStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    /// Press and release `button`
    pub async fn press(&self, button: Button) -> Result<(), SessionError> {
        let url = format!("{}/button/{}", self.base_url, button.as_str());
        debug!("press {}", button.as_str());

        let response = self
            .client
            .post(&url)
            .json(&ButtonAction {
                action: "press-and-release",
            })
            .send()
            .await?;
        Self::check(&url, &response)
    }

    /// Current screen as PNG
    pub async fn screenshot(&self) -> Result<Vec<u8>, SessionError> {
        let url = format!("{}/screenshot", self.base_url);

        let response = self.client.get(&url).send().await?;
        Self::check(&url, &response)?;

        Ok(response.bytes().await?.to_vec())
    }

    /// Texts displayed on the current screen
    pub async fn current_screen_events(&self) -> Result<Vec<ScreenEvent>, SessionError> {
        let url = format!("{}/events?currentscreenonly=true", self.base_url);

        let response = self.client.get(&url).send().await?;
        Self::check(&url, &response)?;

        let events: ScreenEvents = response.json().await?;
        Ok(events.events)
    }

    /// Whether any text on the current screen contains `needle`
    pub async fn screen_contains(&self, needle: &str) -> Result<bool, SessionError> {
        let events = self.current_screen_events().await?;
        Ok(events.iter().any(|event| event.text.contains(needle)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{read_http_request, write_http_response};
    use tokio::net::TcpListener;

    /// Serves one HTTP request with `body` and hands back the raw request
    async fn one_shot_server(body: &'static [u8]) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_http_request(&mut socket).await;
            write_http_response(&mut socket, "200 OK", "application/json", body).await;
            request
        });

        (url, handle)
    }

    #[tokio::test]
    async fn press_posts_press_and_release() {
        let (url, request) = one_shot_server(b"{}").await;

        SpeculosApi::new(url).press(Button::Both).await.unwrap();

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /button/both "));
        assert!(request.contains(r#"{"action":"press-and-release"}"#));
    }

    #[tokio::test]
    async fn events_are_parsed() {
        let (url, request) = one_shot_server(
            br#"{"events":[{"text":"Application","x":20,"y":3},{"text":"is ready","x":35,"y":17}]}"#,
        )
        .await;

        let api = SpeculosApi::new(url);
        assert!(api.screen_contains("is ready").await.unwrap());
        assert!(request
            .await
            .unwrap()
            .starts_with("GET /events?currentscreenonly=true "));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_http_request(&mut socket).await;
            write_http_response(&mut socket, "500 Internal Server Error", "text/plain", b"").await;
        });

        let err = SpeculosApi::new(url).screenshot().await.unwrap_err();
        assert!(matches!(err, SessionError::ApiStatus { status: 500, .. }));
    }
}
