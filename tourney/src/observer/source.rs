//! Game server transports.

use super::models::{GameFetchRequest, RawResponse, TransportFault};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Instant;

const USER_AGENT: &str = concat!("tourney/", env!("CARGO_PKG_VERSION"));

/// One request against the game server, no retries
#[async_trait]
pub trait GameSource: Send + Sync {
    /// Fetch the current state of a game
    async fn get_game(&self, request: &GameFetchRequest) -> Result<RawResponse, TransportFault>;
}

/// Game server reached over HTTP at `GET {base_url}/games/{game_id}`
pub struct HttpGameSource {
    base_url: String,
    client: Client,
}

impl HttpGameSource {
    /// Create a new HTTP source
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self::with_client(base_url, client))
    }

    /// Create a source around an existing client
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn game_url(&self, game_id: &str) -> String {
        format!("{}/games/{}", self.base_url, game_id)
    }
}

#[async_trait]
impl GameSource for HttpGameSource {
    async fn get_game(&self, request: &GameFetchRequest) -> Result<RawResponse, TransportFault> {
        let started = Instant::now();
        let url = self.game_url(&request.game_id);

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportFault::Timeout {
                    after: started.elapsed(),
                }
            } else {
                TransportFault::Connection(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportFault::Connection(format!("Failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(TransportFault::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(RawResponse::new(status.as_u16(), body, started.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_url_strips_trailing_slash() {
        let source = HttpGameSource::new("http://games.local:8080/").unwrap();
        assert_eq!(source.base_url(), "http://games.local:8080");
        assert_eq!(
            source.game_url("open-r1-b1"),
            "http://games.local:8080/games/open-r1-b1"
        );
    }
}
