//! `reqwest`-backed [`ListingsApi`].
//!
//! One client serves every pipeline; headers and query parameters come from the
//! [`QueryConfig`] on every request.

use std::collections::BTreeMap;
use std::time::Duration;

use listing_harvest_listing_models::QueryConfig;

use crate::{ListingsApi, ScrapeError};

/// Listings API client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpListingsApi {
    client: reqwest::Client,
}

impl HttpListingsApi {
    /// Creates a client with an optional per-request timeout.
    ///
    /// A timed-out request is reported like any other transport error; it
    /// is not retried.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Http`] if the client cannot be built.
    pub fn new(timeout: Option<Duration>) -> Result<Self, ScrapeError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

/// Builds a [`reqwest::header::HeaderMap`] from configured headers.
fn header_map(
    headers: &BTreeMap<String, String>,
) -> Result<reqwest::header::HeaderMap, ScrapeError> {
    let mut header_map = reqwest::header::HeaderMap::new();
    for (key, value) in headers {
        let name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| ScrapeError::Parse(format!("invalid header name '{key}': {e}")))?;
        let val = reqwest::header::HeaderValue::from_str(value)
            .map_err(|e| ScrapeError::Parse(format!("invalid header value '{value}': {e}")))?;
        header_map.insert(name, val);
    }
    Ok(header_map)
}

impl ListingsApi for HttpListingsApi {
    async fn fetch_page(&self, config: &QueryConfig) -> Result<serde_json::Value, ScrapeError> {
        let url = config.build_url();
        let headers = header_map(&config.headers)?;

        log::debug!("GET {url} page={}", config.params.page);

        let response = self
            .client
            .get(&url)
            .headers(headers)
            .query(&config.params)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}
