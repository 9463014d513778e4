//! HTTP client implementation

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::debug;

use crate::errors::DashError;

/// Raw response: status plus body text
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

/// HTTP client for backend communication
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Create a new HTTP client.
    ///
    /// `timeout` bounds a whole request/response exchange; `None` leaves it
    /// to the caller.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, DashError> {
        let mut builder = Client::builder().user_agent("deploydash");
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Make a JSON POST request.
    ///
    /// Non-2xx responses are returned, not turned into errors, so that the
    /// caller can read an error body. Only transport failures are `Err`.
    pub async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<RawResponse, DashError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        let body = response.text().await?;

        debug!("POST {} -> {}", url, status);
        Ok(RawResponse { status, body })
    }
}
