//! TOML harvest configuration.
//!
//! ```toml
//! [settings]
//! output_dir = "output"
//! boundaries_path = "districts.geojson"
//!
//! [headers]
//! Accept = "application/json"
//!
//! [[urls]]
//! url = "https://api.example.kz/a/ajax-map-list/map"
//! property_type = "flat"
//! deal_type = "sell"
//!
//! [[cities]]
//! city = "almaty"
//! url_path = "almaty"
//! [cities.params]
//! "lat[from]" = "43.1"
//! ```

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use listing_harvest_listing_models::{CityTemplate, ListingTemplate, QueryConfig};
use serde::Deserialize;

use crate::HarvestError;

/// Default rows per chunk file.
pub const DEFAULT_CHUNK_SIZE: usize = 3000;
/// Default number of query configurations processed at once.
pub const DEFAULT_CONCURRENCY: usize = 4;
/// Default pause after each listing, in milliseconds.
pub const DEFAULT_DELAY_MS: u64 = 50;

/// Run-wide settings (`[settings]`). Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root under which the `YYYYMM` partition directories live.
    pub output_dir: PathBuf,
    /// District boundary file (GeoJSON feature collection).
    pub boundaries_path: PathBuf,
    /// Rows per chunk file.
    pub chunk_size: usize,
    /// Maximum number of pipelines running at once.
    pub concurrency: usize,
    /// Pause after each listing, in milliseconds.
    pub delay_ms: u64,
    /// Per-request timeout in seconds; no timeout when unset.
    pub request_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            boundaries_path: PathBuf::from("districts.geojson"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            delay_ms: DEFAULT_DELAY_MS,
            request_timeout_secs: None,
        }
    }
}

impl Settings {
    /// Chunk size as a [`NonZeroUsize`].
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Config`] if `chunk_size` is zero.
    pub fn chunk_size(&self) -> Result<NonZeroUsize, HarvestError> {
        NonZeroUsize::new(self.chunk_size)
            .ok_or_else(|| HarvestError::Config("chunk_size must be greater than 0".to_string()))
    }

    #[must_use]
    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HarvestConfig {
    #[serde(default)]
    pub settings: Settings,
    /// Headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Listing templates.
    #[serde(default)]
    pub urls: Vec<ListingTemplate>,
    /// City templates.
    #[serde(default)]
    pub cities: Vec<CityTemplate>,
}

impl HarvestConfig {
    /// Reads and parses the configuration file at `path`.
    ///
    /// The result is not validated, so CLI overrides can still be applied;
    /// call [`Self::validate`] before running.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Io`] if the file cannot be read and
    /// [`HarvestError::Toml`] if it is not a valid configuration.
    pub fn load(path: &Path) -> Result<Self, HarvestError> {
        log::info!("Loading configuration from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Toml`] if the text is not a valid
    /// configuration.
    pub fn from_toml_str(contents: &str) -> Result<Self, HarvestError> {
        Ok(toml::from_str(contents)?)
    }

    /// Rejects configurations that cannot produce a meaningful run.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Config`] on a zero chunk size or
    /// concurrency, or when there are no listing or city templates.
    pub fn validate(&self) -> Result<(), HarvestError> {
        self.settings.chunk_size()?;
        if self.settings.concurrency == 0 {
            return Err(HarvestError::Config(
                "concurrency must be greater than 0".to_string(),
            ));
        }
        if self.urls.is_empty() {
            return Err(HarvestError::Config(
                "at least one [[urls]] entry is required".to_string(),
            ));
        }
        if self.cities.is_empty() {
            return Err(HarvestError::Config(
                "at least one [[cities]] entry is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Expands the templates into one query configuration per listing
    /// template × city template, listing templates outermost.
    #[must_use]
    pub fn query_configs(&self) -> Vec<QueryConfig> {
        let configs: Vec<QueryConfig> = self
            .urls
            .iter()
            .flat_map(|listing| {
                self.cities
                    .iter()
                    .map(move |city| QueryConfig::new(listing, city, &self.headers))
            })
            .collect();

        for config in &configs {
            log::debug!("[{}] Built URL {}", config.label(), config.build_url());
        }

        configs
    }
}
