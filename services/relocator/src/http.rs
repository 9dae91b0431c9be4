//! Shared REST helpers.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::error::{RelocationError, Result};

/// Per-request limit for orchestrator and cluster manager calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| RelocationError::Config(format!("failed to build HTTP client: {e}")))
}

/// Send a prepared request; only transport failures are errors here.
pub async fn send(
    request: reqwest::RequestBuilder,
    method: &'static str,
    url: &str,
) -> Result<reqwest::Response> {
    request
        .send()
        .await
        .map_err(|source| RelocationError::Transport {
            method,
            url: url.to_string(),
            source,
        })
}

/// GET `url` and decode a 200 JSON body.
pub async fn get_json<T: DeserializeOwned>(client: &reqwest::Client, url: &str) -> Result<T> {
    debug!(url = %url, "GET");

    let response = send(client.get(url), "GET", url).await?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        error!(url = %url, status = %status, body = %body, "Unexpected response status");
        return Err(RelocationError::HttpStatus {
            method: "GET",
            url: url.to_string(),
            status,
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|source| RelocationError::Transport {
            method: "GET",
            url: url.to_string(),
            source,
        })?;

    serde_json::from_slice(&bytes).map_err(|source| RelocationError::Decode {
        url: url.to_string(),
        source,
    })
}
