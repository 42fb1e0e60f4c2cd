#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Listings API client.
//!
//! Provides the [`ListingsApi`] trait (one GET per page), its `reqwest`
//! implementation ([`json_paginated::HttpListingsApi`]), and
//! [`paginate::fetch_listings`], which drives pagination for one query
//! configuration and yields validated listings lazily.
//!
//! There is no retry: a failed page ends pagination for that
//! configuration.

pub mod json_paginated;
pub mod paginate;

pub use paginate::fetch_listings;

use listing_harvest_listing_models::QueryConfig;

/// Errors that can occur while fetching a page of listings.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// The request failed, timed out, or returned a non-2xx status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body is not in the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Fetches one page of the listings API.
///
/// Implementations issue a single request for `config` (whose
/// `params.page` selects the page) and return the decoded JSON body.
pub trait ListingsApi: Send + Sync {
    /// Fetches the page currently selected by `config.params.page`.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if the request fails or the body cannot be
    /// decoded as JSON.
    fn fetch_page(
        &self,
        config: &QueryConfig,
    ) -> impl std::future::Future<Output = Result<serde_json::Value, ScrapeError>> + Send;
}

/// Pulls the listings out of a response body.
///
/// Listings live under `adverts`, normally an object keyed by listing id
/// (values are the listings, in body order). An array is accepted too.
///
/// # Errors
///
/// Returns [`ScrapeError::Parse`] if `adverts` is missing or is neither an
/// object nor an array.
pub fn extract_adverts(body: &serde_json::Value) -> Result<Vec<serde_json::Value>, ScrapeError> {
    match body.get("adverts") {
        Some(serde_json::Value::Object(map)) => Ok(map.values().cloned().collect()),
        Some(serde_json::Value::Array(items)) => Ok(items.clone()),
        Some(other) => Err(ScrapeError::Parse(format!(
            "expected `adverts` to be an object, got {other}"
        ))),
        None => Err(ScrapeError::Parse(
            "response does not contain `adverts`".to_owned(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn extracts_object_values_in_body_order() {
        let body = json!({"adverts": {"9": {"id": 9}, "1": {"id": 1}}});
        let adverts = extract_adverts(&body).unwrap();
        assert_eq!(adverts, vec![json!({"id": 9}), json!({"id": 1})]);
    }

    #[test]
    fn extracts_array() {
        let body = json!({"adverts": [{"id": 1}]});
        assert_eq!(extract_adverts(&body).unwrap().len(), 1);
    }

    #[test]
    fn empty_container_is_empty_page() {
        assert!(extract_adverts(&json!({"adverts": {}})).unwrap().is_empty());
        assert!(extract_adverts(&json!({"adverts": []})).unwrap().is_empty());
    }

    #[test]
    fn missing_or_scalar_container_is_an_error() {
        assert!(matches!(
            extract_adverts(&json!({"items": []})),
            Err(ScrapeError::Parse(_))
        ));
        assert!(matches!(
            extract_adverts(&json!({"adverts": null})),
            Err(ScrapeError::Parse(_))
        ));
    }
}
