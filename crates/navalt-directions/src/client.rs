//! Directions API HTTP client.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use navalt_core::{DirectionsRequestResult, DirectionsResponse, RouteOptions, RouteRequester};
use reqwest::Client;
use url::Url;

/// Retry delay after a server-side failure.
pub const SERVER_ERROR_RETRY_DELAY: Duration = Duration::from_secs(60);

const REDACTED: &str = "REDACTED";

/// HTTP client for the directions service.
pub struct DirectionsClient {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl DirectionsClient {
    /// Create a client sending every request to `base_url`, whatever base
    /// the route options were built against.
    pub fn new(
        base_url: impl Into<String>,
        access_token: Option<String>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .build()
            .context("Failed to create HTTP client")?;
        let access_token = access_token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token,
        })
    }

    pub fn request_url(&self, options: &RouteOptions) -> Result<Url> {
        let mut options = options.clone();
        options.base_url = self.base_url.clone();
        options
            .to_url(self.access_token.as_deref())
            .context("Failed to build directions request url")
    }
}

#[async_trait]
impl RouteRequester for DirectionsClient {
    async fn request_routes(&self, options: &RouteOptions) -> Result<DirectionsRequestResult> {
        let url = self.request_url(options)?;
        let logged_url = redact_access_token(&url);
        tracing::debug!("Requesting routes: {}", logged_url);

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Directions request to {} failed: {}", logged_url, e.without_url());
                return Ok(DirectionsRequestResult::RetryableError);
            }
        };

        let status = response.status().as_u16();
        if let Some(result) = classify_status(status) {
            tracing::warn!("Directions request to {} returned {}", logged_url, status);
            return Ok(result);
        }

        match response.json::<DirectionsResponse>().await {
            Ok(body) => {
                tracing::debug!("Directions response {:?} with {} routes", body.uuid, body.routes.len());
                Ok(DirectionsRequestResult::SuccessfulResponse(body))
            }
            Err(e) => {
                tracing::warn!("Failed to decode directions response: {}", e.without_url());
                Ok(DirectionsRequestResult::RetryableError)
            }
        }
    }
}

/// Map a failed HTTP status to its retry class. `None` means success, and
/// the body still has to be decoded.
pub fn classify_status(status: u16) -> Option<DirectionsRequestResult> {
    match status {
        200..=299 => None,
        400..=499 => Some(DirectionsRequestResult::NotRetryableError),
        500..=599 => Some(DirectionsRequestResult::RetryableErrorWithDelay(
            SERVER_ERROR_RETRY_DELAY,
        )),
        _ => Some(DirectionsRequestResult::RetryableError),
    }
}

/// Render `url` with any access token replaced, for logging.
pub fn redact_access_token(url: &Url) -> String {
    if !url.query_pairs().any(|(key, _)| key == "access_token") {
        return url.to_string();
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            let value = if key == "access_token" {
                REDACTED.to_string()
            } else {
                value.into_owned()
            };
            (key.into_owned(), value)
        })
        .collect();
    let mut redacted = url.clone();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}
