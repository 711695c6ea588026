//! ==============================================================================
//! fetch.rs - station payload fetcher
//! ==============================================================================
//!
//! purpose:
//!     the only place that talks to the network. the scheduler depends on the
//!     Fetcher trait so sweeps can be driven by canned payloads in tests.
//!
//! relationships:
//!     - used by: scheduler.rs, main.rs (builds HttpFetcher from [api] config)
//!     - produces: domain::RawPayload, error::FetchError
//!
//! ==============================================================================

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::RawPayload;
use crate::error::FetchError;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// one read request for one station
    async fn fetch(&self, station_id: &str) -> Result<RawPayload, FetchError>;
}

/// fetches `<base_url><station_id>` with reqwest
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        // gzip(true) sends Accept-Encoding: gzip and decodes the body
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    pub fn url_for(&self, station_id: &str) -> String {
        format!("{}{}", self.base_url, station_id)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, station_id: &str) -> Result<RawPayload, FetchError> {
        let url = self.url_for(station_id);
        tracing::debug!(station = station_id, %url, "[FETCH] getting data");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let value: serde_json::Value = serde_json::from_slice(&body)?;
        Ok(RawPayload::new(value))
    }
}
