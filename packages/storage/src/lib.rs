#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Output storage for harvested listings.
//!
//! Rows are written as Parquet chunk files into a per-month partition
//! directory (`<output_root>/<YYYYMM>/`). The partition is purged once at
//! the start of a run; after that, every writer only ever creates new,
//! uniquely named files, so concurrent writers need no coordination.

pub mod chunk;
pub mod partition;

pub use chunk::{ChunkBuffer, ChunkWriter};
pub use partition::{partition_dir, partition_name, prepare_partition};

/// Errors that can occur while preparing partitions or writing chunks.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `DuckDB` failed to stage or export a chunk.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),
}
