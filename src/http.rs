//! HTTP point source.
//!
//! Issues one GET per fetch cycle with `band`, `min_samples` and `bbox`
//! query parameters. No explicit timeout is set beyond the transport
//! default, and failures are not retried: the next viewport or control
//! event is the retry trigger.

use futures::future::{BoxFuture, FutureExt};
use log::{debug, warn};
use reqwest::Client;
use serde_json::Value;
use std::time::Instant;

use crate::{FetchRequest, HeatError, PointSource, Result};

const MAX_IDLE_PER_HOST: usize = 4;

/// Fetches heat points from a JSON endpoint.
pub struct HttpPointSource {
    client: Client,
    endpoint: String,
    auth_header: Option<String>,
}

impl HttpPointSource {
    /// Create a source for the given endpoint URL.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .build()
            .map_err(|e| HeatError::fetch(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            auth_header: None,
        })
    }

    /// Attach a pre-formatted `Authorization` header value.
    ///
    /// Token acquisition is the host's concern; the value is sent verbatim.
    pub fn with_auth_header(mut self, auth_header: impl Into<String>) -> Self {
        self.auth_header = Some(auth_header.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch_points(&self, request: FetchRequest) -> Result<Value> {
        let start = Instant::now();
        let mut builder = self.client.get(&self.endpoint).query(&request.query_pairs()[..]);
        if let Some(auth) = &self.auth_header {
            builder = builder.header("Authorization", auth);
        }

        let response = builder.send().await.map_err(|e| {
            warn!("[HttpPointSource] Request error: {}", e);
            HeatError::fetch(format!("Request error: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                "[HttpPointSource] HTTP {} for band={} bbox={}",
                status,
                request.band,
                request.bbox.to_bbox_string()
            );
            return Err(HeatError::FetchFailure {
                message: status
                    .canonical_reason()
                    .unwrap_or("non-success response")
                    .to_string(),
                status_code: Some(status.as_u16()),
            });
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| HeatError::fetch(format!("Parse error: {}", e)))?;

        debug!(
            "[HttpPointSource] band={} bbox={} fetched in {} ms",
            request.band,
            request.bbox.to_bbox_string(),
            start.elapsed().as_millis()
        );
        Ok(body)
    }
}

impl PointSource for HttpPointSource {
    fn fetch(&self, request: &FetchRequest) -> BoxFuture<'_, Result<Value>> {
        self.fetch_points(*request).boxed()
    }
}
