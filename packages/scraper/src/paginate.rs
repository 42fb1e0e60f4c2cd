//! Lazy pagination over one query configuration.
//!
//! ```text
//! START → FETCH_PAGE ─┬─ error ──────────────────────────────→ DONE
//!                     ├─ empty page ─────────────────────────→ DONE
//!                     └─ listings → validate/yield each → page += 1 → FETCH_PAGE
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use listing_harvest_listing::validate;
use listing_harvest_listing_models::{FIRST_PAGE, QueryConfig, ValidatedRecord};

use crate::{ListingsApi, extract_adverts};

/// Fetches every page for `config`, yielding valid listings as they are
/// read.
///
/// Pagination starts at page 1 and stops at the first empty page or the
/// first failed request (logged, not retried). Invalid listings are logged
/// and skipped. `delay` is awaited after every listing, valid or not, which
/// paces the next request.
///
/// The stream is not restartable; call again to start over from page 1.
pub fn fetch_listings<A>(
    api: &A,
    config: QueryConfig,
    delay: Duration,
) -> impl Stream<Item = ValidatedRecord> + Send + '_
where
    A: ListingsApi + ?Sized,
{
    async_stream::stream! {
        let mut config = config;
        config.params.page = FIRST_PAGE;

        let label = config.label();
        let url = config.build_url();
        log::info!("[{label}] Download {url} started");

        loop {
            let page = config.params.page;
            log::debug!("[{label}] Download {url} page number: {page} started");

            let body = match api.fetch_page(&config).await {
                Ok(body) => body,
                Err(e) => {
                    log::error!("[{label}] HTTP error on page {page}: {e}");
                    break;
                }
            };

            let adverts = match extract_adverts(&body) {
                Ok(adverts) => adverts,
                Err(e) => {
                    log::error!("[{label}] Unreadable response on page {page}: {e}");
                    break;
                }
            };

            log::debug!(
                "[{label}] Download {url} page number: {page} length of data: {} finished",
                adverts.len()
            );

            if adverts.is_empty() {
                break;
            }

            let snapshot = Arc::new(config.clone());
            for raw in &adverts {
                match validate(raw, &snapshot) {
                    Ok(record) => {
                        yield record;
                    }
                    Err(failure) => failure.log(&label),
                }
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            config.params.advance_page();
        }

        log::info!("[{label}] Download {url} is done");
    }
}
