//! Parquet chunk files.
//!
//! Each chunk is staged into an in-memory `DuckDB` table and exported with
//! `COPY ... (FORMAT PARQUET)`. File names combine a random UUID with a
//! timestamp, so writers running in parallel never collide.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use chrono::Local;
use duckdb::Connection;
use listing_harvest_listing_models::OutputRow;

use crate::StorageError;

/// Column definitions, in [`OutputRow::COLUMNS`] order.
const COLUMN_TYPES: &[(&str, &str)] = &[
    ("id", "BIGINT"),
    ("city", "VARCHAR"),
    ("district", "VARCHAR"),
    ("address", "VARCHAR"),
    ("title", "VARCHAR"),
    ("property", "VARCHAR"),
    ("deal_type", "VARCHAR"),
    ("duration", "VARCHAR"),
    ("rooms", "BIGINT"),
    ("square", "DOUBLE"),
    ("price", "DOUBLE"),
    ("number_of_photos", "BIGINT"),
    ("seller", "VARCHAR"),
    ("status", "VARCHAR"),
    ("storage", "VARCHAR"),
    ("latitude", "DOUBLE"),
    ("longitude", "DOUBLE"),
    ("floor", "INTEGER"),
    ("total_floors", "INTEGER"),
    ("url", "VARCHAR"),
    ("params", "VARCHAR"),
    ("extract_datetime", "TIMESTAMP"),
];

/// Writes chunk files into one partition directory.
#[derive(Debug, Clone)]
pub struct ChunkWriter {
    dir: PathBuf,
}

impl ChunkWriter {
    /// Creates a writer for an already-prepared partition directory.
    #[must_use]
    pub const fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// The partition directory this writer writes into.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `rows` to a new Parquet file and returns its path.
    ///
    /// An empty slice writes nothing and returns `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if staging the rows or exporting the file
    /// fails.
    pub fn write_chunk(&self, rows: &[OutputRow]) -> Result<Option<PathBuf>, StorageError> {
        if rows.is_empty() {
            return Ok(None);
        }

        let path = self.dir.join(chunk_file_name());
        log::info!(
            "Saving output to {} rows count: {}",
            path.display(),
            rows.len()
        );

        let conn = Connection::open_in_memory()?;
        create_chunk_table(&conn)?;
        insert_rows(&conn, rows)?;

        let target = path.to_string_lossy().replace('\'', "''");
        conn.execute_batch(&format!("COPY chunk TO '{target}' (FORMAT PARQUET)"))?;

        Ok(Some(path))
    }
}

/// `output_<random>_<YYYYMMDDHHMMSS>.parquet`
fn chunk_file_name() -> String {
    format!(
        "output_{}_{}.parquet",
        uuid::Uuid::new_v4().simple(),
        Local::now().format("%Y%m%d%H%M%S")
    )
}

fn create_chunk_table(conn: &Connection) -> Result<(), StorageError> {
    let columns = COLUMN_TYPES
        .iter()
        .map(|(name, ty)| format!("\"{name}\" {ty}"))
        .collect::<Vec<_>>()
        .join(", ");
    conn.execute_batch(&format!("CREATE TABLE chunk ({columns});"))?;
    Ok(())
}

fn insert_rows(conn: &Connection, rows: &[OutputRow]) -> Result<(), StorageError> {
    let placeholders = COLUMN_TYPES
        .iter()
        .map(|(_, ty)| {
            if *ty == "TIMESTAMP" {
                "CAST(? AS TIMESTAMP)"
            } else {
                "?"
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    conn.execute_batch("BEGIN TRANSACTION;")?;
    let mut stmt = conn.prepare(&format!("INSERT INTO chunk VALUES ({placeholders})"))?;

    for row in rows {
        let extract_datetime = row
            .extract_datetime
            .format("%Y-%m-%d %H:%M:%S%.6f")
            .to_string();
        stmt.execute(duckdb::params![
            row.id,
            row.city,
            row.district,
            row.address,
            row.title,
            row.property,
            row.deal_type,
            row.duration,
            row.rooms,
            row.square,
            row.price,
            row.number_of_photos,
            row.seller,
            row.status,
            row.storage,
            row.latitude,
            row.longitude,
            row.floor,
            row.total_floors,
            row.url,
            row.params,
            extract_datetime,
        ])?;
    }

    conn.execute_batch("COMMIT;")?;
    Ok(())
}

/// Caller-side row accumulator that hands out full chunks.
///
/// Holds at most one chunk of rows at a time.
#[derive(Debug)]
pub struct ChunkBuffer {
    size: NonZeroUsize,
    rows: Vec<OutputRow>,
}

impl ChunkBuffer {
    /// Creates a buffer that emits chunks of `size` rows.
    #[must_use]
    pub fn new(size: NonZeroUsize) -> Self {
        Self {
            size,
            rows: Vec::with_capacity(size.get()),
        }
    }

    /// Adds a row; returns a full chunk when the buffer reaches `size`.
    pub fn push(&mut self, row: OutputRow) -> Option<Vec<OutputRow>> {
        self.rows.push(row);
        if self.rows.len() >= self.size.get() {
            Some(std::mem::replace(
                &mut self.rows,
                Vec::with_capacity(self.size.get()),
            ))
        } else {
            None
        }
    }

    /// Returns the remaining rows, or `None` if there are none.
    #[must_use]
    pub fn finish(self) -> Option<Vec<OutputRow>> {
        if self.rows.is_empty() {
            None
        } else {
            Some(self.rows)
        }
    }
}
