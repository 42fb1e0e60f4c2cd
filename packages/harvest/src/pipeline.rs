//! Per-query pipelines and the parallel run over all of them.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use futures::StreamExt as _;
use futures::stream;
use listing_harvest_listing::transform;
use listing_harvest_listing_models::{OutputRow, QueryConfig};
use listing_harvest_scraper::json_paginated::HttpListingsApi;
use listing_harvest_scraper::{ListingsApi, fetch_listings};
use listing_harvest_spatial::DistrictIndex;
use listing_harvest_storage::{ChunkBuffer, ChunkWriter, prepare_partition};

use crate::progress::ProgressCallback;
use crate::{HarvestConfig, HarvestError};

/// Outcome of a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Query configurations processed.
    pub configs: usize,
    /// Pipelines that returned an error or panicked.
    pub failed: usize,
    /// Rows written across all pipelines.
    pub rows: u64,
}

/// Runs one query configuration end to end: fetch every page, transform
/// each valid listing, and write the rows in chunks of `chunk_size`.
///
/// Returns the number of rows written. Fetch errors only end pagination;
/// a failed chunk write aborts this pipeline.
///
/// # Errors
///
/// Returns [`HarvestError::Storage`] if a chunk cannot be written and
/// [`HarvestError::Join`] if the blocking writer task fails.
pub async fn run_pipeline<A>(
    api: &A,
    config: QueryConfig,
    districts: &DistrictIndex,
    writer: &ChunkWriter,
    chunk_size: NonZeroUsize,
    delay: Duration,
) -> Result<u64, HarvestError>
where
    A: ListingsApi + ?Sized,
{
    let label = config.label();
    let listings = fetch_listings(api, config, delay);
    futures::pin_mut!(listings);

    let mut buffer = ChunkBuffer::new(chunk_size);
    let mut rows = 0_u64;

    while let Some(record) = listings.next().await {
        rows += 1;
        if let Some(chunk) = buffer.push(transform(&record, districts)) {
            write_chunk(writer, chunk).await?;
        }
    }

    if let Some(rest) = buffer.finish() {
        write_chunk(writer, rest).await?;
    }

    log::info!("[{label}] rows count: {rows}");
    Ok(rows)
}

/// Writes one chunk on the blocking pool.
async fn write_chunk(writer: &ChunkWriter, rows: Vec<OutputRow>) -> Result<(), HarvestError> {
    let writer = writer.clone();
    tokio::task::spawn_blocking(move || writer.write_chunk(&rows)).await??;
    Ok(())
}

/// Runs every query configuration in `config` against the live API.
///
/// # Errors
///
/// See [`run_with_api`]; additionally fails if the HTTP client cannot be
/// built.
pub async fn run(
    config: &HarvestConfig,
    progress: Arc<dyn ProgressCallback>,
) -> Result<RunSummary, HarvestError> {
    let api = Arc::new(HttpListingsApi::new(config.settings.request_timeout())?);
    run_with_api(api, config, progress).await
}

/// Runs every query configuration in `config` against `api`.
///
/// Startup happens in order and is fatal on failure: validate the
/// configuration, load the district index, prepare (purge) the current
/// month partition. Then one pipeline per query configuration is spawned,
/// at most `settings.concurrency` at a time. A pipeline that errors or
/// panics is logged and counted in [`RunSummary::failed`]; it does not
/// stop the others.
///
/// # Errors
///
/// Returns [`HarvestError::Config`] for an invalid configuration,
/// [`HarvestError::Spatial`] if the boundary file cannot be loaded, and
/// [`HarvestError::Storage`] if the partition cannot be prepared.
pub async fn run_with_api<A>(
    api: Arc<A>,
    config: &HarvestConfig,
    progress: Arc<dyn ProgressCallback>,
) -> Result<RunSummary, HarvestError>
where
    A: ListingsApi + 'static,
{
    config.validate()?;
    let settings = &config.settings;
    let chunk_size = settings.chunk_size()?;
    let delay = settings.delay();

    let query_configs = config.query_configs();
    log::info!(
        "Starting harvest of {} query configuration(s), concurrency={}",
        query_configs.len(),
        settings.concurrency
    );

    let districts = Arc::new(DistrictIndex::load(&settings.boundaries_path)?);

    let partition = prepare_partition(&settings.output_dir, &Local::now())?;
    let writer = ChunkWriter::new(partition);

    let mut summary = RunSummary {
        configs: query_configs.len(),
        ..RunSummary::default()
    };
    progress.set_total(summary.configs as u64);

    let outcomes: Vec<_> = stream::iter(query_configs.into_iter().map(|query| {
        let api = Arc::clone(&api);
        let districts = Arc::clone(&districts);
        let writer = writer.clone();
        let progress = Arc::clone(&progress);
        let label = query.label();

        async move {
            let handle = tokio::spawn(async move {
                run_pipeline(&*api, query, &districts, &writer, chunk_size, delay).await
            });
            let outcome = handle.await;
            progress.set_message(label.clone());
            progress.inc(1);
            (label, outcome)
        }
    }))
    .buffer_unordered(settings.concurrency)
    .collect()
    .await;

    for (label, outcome) in outcomes {
        match outcome {
            Ok(Ok(rows)) => summary.rows += rows,
            Ok(Err(e)) => {
                log::error!("[{label}] Pipeline failed: {e}");
                summary.failed += 1;
            }
            Err(e) => {
                log::error!("[{label}] Pipeline task failed: {e}");
                summary.failed += 1;
            }
        }
    }

    progress.finish(format!(
        "{} rows from {} configuration(s)",
        summary.rows, summary.configs
    ));
    log::info!(
        "Harvest finished: {} rows, {}/{} configuration(s) failed",
        summary.rows,
        summary.failed,
        summary.configs
    );

    Ok(summary)
}
