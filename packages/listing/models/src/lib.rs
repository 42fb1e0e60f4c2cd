#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the listing harvester.
//!
//! A [`QueryConfig`] is one fully-specified query against the listings
//! API (listing template × city template). Raw listings received for it
//! are validated into [`ValidatedRecord`]s and then flattened into
//! [`OutputRow`]s, which is what ends up in the chunk files.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// First page requested for every query configuration.
pub const FIRST_PAGE: u32 = 1;

// ── Static templates ─────────────────────────────────────────────────────

/// One listing-type template: which endpoint to hit and what it returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingTemplate {
    /// Base endpoint URL (e.g. `"https://api.example.kz/a/ajax-map-list/map"`).
    pub url: String,
    /// Property type served by the endpoint (e.g. `"flat"`).
    pub property_type: String,
    /// Deal type served by the endpoint (e.g. `"sell"`, `"rent"`).
    pub deal_type: String,
    /// Rental duration, for rent endpoints only.
    #[serde(default)]
    pub duration: Option<String>,
}

/// One city template: the path segment and the API filter that selects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityTemplate {
    /// City name as written to the output.
    pub city: String,
    /// Path segment appended to the listing template URL.
    pub url_path: String,
    /// Bounding-box filter parameters, passed to the API verbatim.
    /// Numbers and booleans are accepted and kept as their text.
    #[serde(default, deserialize_with = "scalar_map")]
    pub params: BTreeMap<String, String>,
}

/// A scalar filter value as written in a config file.
#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl ScalarValue {
    fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Integer(i) => i.to_string(),
            // `{:?}` keeps the fraction, so `43.0` stays `"43.0"`.
            Self::Float(f) => format!("{f:?}"),
            Self::Bool(b) => b.to_string(),
        }
    }
}

fn scalar_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = BTreeMap::<String, ScalarValue>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| (key, value.into_text()))
        .collect())
}

// ── Query configuration ──────────────────────────────────────────────────

/// Query string parameters for one request.
///
/// `page` is kept as a dedicated field so the fetcher never has to poke
/// at a stringly-typed parameter bag. Filters are serialized first so the
/// wire order matches `filters..., page`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    /// City filter parameters (bounding box).
    #[serde(flatten)]
    pub filters: BTreeMap<String, String>,
    /// Current page, starting at [`FIRST_PAGE`].
    pub page: u32,
}

impl QueryParams {
    /// Creates parameters positioned at the first page. A `page` key in
    /// `filters` is dropped; the page counter always owns it.
    #[must_use]
    pub fn new(mut filters: BTreeMap<String, String>) -> Self {
        filters.remove("page");
        Self {
            filters,
            page: FIRST_PAGE,
        }
    }

    /// Moves to the next page.
    pub const fn advance_page(&mut self) {
        self.page = self.page.saturating_add(1);
    }

    /// Serializes the parameters to a JSON object string for provenance.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_owned())
    }
}

/// A fully-specified query: listing template × city template, plus the
/// shared header set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Base endpoint URL.
    pub url: String,
    /// City name.
    pub city: String,
    /// Path segment appended to [`Self::url`].
    pub url_path: String,
    /// Property type (e.g. `"flat"`).
    pub property_type: String,
    /// Deal type (e.g. `"sell"`).
    pub deal_type: String,
    /// Rental duration, if any.
    pub duration: Option<String>,
    /// HTTP headers sent with every request.
    pub headers: BTreeMap<String, String>,
    /// Query parameters, including the page counter.
    pub params: QueryParams,
}

impl QueryConfig {
    /// Combines a listing template, a city template and the shared headers.
    #[must_use]
    pub fn new(
        listing: &ListingTemplate,
        city: &CityTemplate,
        headers: &BTreeMap<String, String>,
    ) -> Self {
        Self {
            url: listing.url.clone(),
            city: city.city.clone(),
            url_path: city.url_path.clone(),
            property_type: listing.property_type.clone(),
            deal_type: listing.deal_type.clone(),
            duration: listing.duration.clone(),
            headers: headers.clone(),
            params: QueryParams::new(city.params.clone()),
        }
    }

    /// Builds the request URL: the base endpoint joined with the path
    /// segment by exactly one `/`.
    #[must_use]
    pub fn build_url(&self) -> String {
        let base = self.url.trim_end_matches('/');
        let path = self.url_path.trim_start_matches('/');
        if path.is_empty() {
            base.to_owned()
        } else {
            format!("{base}/{path}")
        }
    }

    /// Short tag used in log lines, e.g. `"flat/sell/almaty"`.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.duration {
            Some(duration) => format!(
                "{}/{}/{duration}/{}",
                self.property_type, self.deal_type, self.city
            ),
            None => format!("{}/{}/{}", self.property_type, self.deal_type, self.city),
        }
    }
}

// ── Records ──────────────────────────────────────────────────────────────

/// Geographic position of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

/// A listing that passed every field check.
#[derive(Debug, Clone)]
pub struct ValidatedRecord {
    /// Listing identifier.
    pub id: i64,
    /// Listing title; usually carries the `floor/total` pair.
    pub title: String,
    /// Free-text address.
    pub address: String,
    /// Number of rooms, when the listing states it.
    pub rooms: Option<i64>,
    /// Area in square meters.
    pub square: f64,
    /// Asking price.
    pub price: f64,
    /// Photo descriptors as received.
    pub photos: Vec<serde_json::Map<String, serde_json::Value>>,
    /// Seller type (owner, agency, ...).
    pub seller: String,
    /// Listing status tag.
    pub status: String,
    /// Storage tag.
    pub storage: String,
    /// Map position.
    pub position: GeoPosition,
    /// The query configuration this listing was fetched for, as it was
    /// when the listing's page was requested (so `config.params.page` is
    /// the emitting page).
    pub config: Arc<QueryConfig>,
}

/// A flat output row. One row per validated listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRow {
    pub id: i64,
    pub city: String,
    pub district: String,
    pub address: String,
    pub title: String,
    pub property: String,
    pub deal_type: String,
    pub duration: Option<String>,
    pub rooms: Option<i64>,
    pub square: f64,
    pub price: f64,
    pub number_of_photos: i64,
    pub seller: String,
    pub status: String,
    pub storage: String,
    pub latitude: f64,
    pub longitude: f64,
    pub floor: Option<i32>,
    pub total_floors: Option<i32>,
    pub url: String,
    /// JSON-serialized [`QueryParams`].
    pub params: String,
    /// Wall-clock time (UTC) at which the row was produced.
    pub extract_datetime: NaiveDateTime,
}

impl OutputRow {
    /// Column names, in file order.
    pub const COLUMNS: &'static [&'static str] = &[
        "id",
        "city",
        "district",
        "address",
        "title",
        "property",
        "deal_type",
        "duration",
        "rooms",
        "square",
        "price",
        "number_of_photos",
        "seller",
        "status",
        "storage",
        "latitude",
        "longitude",
        "floor",
        "total_floors",
        "url",
        "params",
        "extract_datetime",
    ];
}
