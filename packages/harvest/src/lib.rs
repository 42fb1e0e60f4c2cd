#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Harvest orchestration.
//!
//! Loads the TOML configuration, expands it into one [`QueryConfig`] per
//! listing template × city template, and runs one pipeline per query
//! (fetch → validate → transform → chunked Parquet) with bounded
//! parallelism. A failing pipeline is logged and counted; the others keep
//! going.
//!
//! [`QueryConfig`]: listing_harvest_listing_models::QueryConfig

pub mod config;
pub mod pipeline;
pub mod progress;

pub use config::{HarvestConfig, Settings};
pub use pipeline::{RunSummary, run, run_pipeline, run_with_api};

use listing_harvest_scraper::ScrapeError;
use listing_harvest_spatial::SpatialError;
use listing_harvest_storage::StorageError;

/// Errors that can occur while configuring or running a harvest.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// The configuration is structurally valid TOML but unusable.
    #[error("Config error: {0}")]
    Config(String),

    /// The configuration file could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The district boundary file could not be loaded.
    #[error("Boundary error: {0}")]
    Spatial(#[from] SpatialError),

    /// Partition preparation or a chunk write failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The HTTP client could not be set up.
    #[error("Scrape error: {0}")]
    Scrape(#[from] ScrapeError),

    /// Async task join error.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
