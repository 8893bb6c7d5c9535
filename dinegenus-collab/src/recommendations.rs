use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::{CollabError, CollabResult};

/// Reads venue recommendations from the recommendation service.
/// The recommendations themselves are opaque to this crate.
#[derive(Debug, Clone)]
pub struct RecommendationClient {
    base: Url,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Value>,
}

impl RecommendationClient {
    pub fn new(base: &str) -> CollabResult<Self> {
        let base = Url::parse(base)
            .map_err(|e| CollabError::Validation(format!("invalid recommendations url: {e}")))?;

        if base.cannot_be_a_base() {
            return Err(CollabError::Validation(format!(
                "{base} cannot be used as a recommendations url"
            )));
        }

        Ok(Self {
            base,
            client: Client::new(),
        })
    }

    /// The url recommendations of a room are read from
    pub fn endpoint(&self, room_id: &str) -> Url {
        let mut url = self.base.clone();

        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["recommendations", room_id]);
        }

        url
    }

    /// Fetches the recommendations of a room, or `None` if the service has none yet.
    pub async fn fetch(&self, room_id: &str) -> CollabResult<Option<Value>> {
        let response = self
            .client
            .get(self.endpoint(room_id))
            .send()
            .await
            .map_err(|e| CollabError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            return Err(handle_unsuccessful_request(response, status).await);
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| CollabError::Transport(e.to_string()))?;

        Ok(envelope.data.filter(|d| !d.is_null()))
    }
}

async fn handle_unsuccessful_request(response: Response, status: StatusCode) -> CollabError {
    let body = response.text().await.unwrap_or_else(|e| e.to_string());

    CollabError::Transport(format!("recommendation service replied {status}: {body}"))
}
