use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use listing_harvest::progress::null_progress;
use listing_harvest::{HarvestConfig, HarvestError, RunSummary, run_with_api};
use listing_harvest_listing_models::QueryConfig;
use listing_harvest_scraper::{ListingsApi, ScrapeError};
use serde_json::{Value, json};

/// Canned pages per city; any page not listed is empty.
#[derive(Default)]
struct StubApi {
    pages: BTreeMap<String, Vec<Value>>,
    panic_for: Option<String>,
    calls: Mutex<Vec<(String, u32)>>,
}

impl StubApi {
    fn with_pages(city: &str, pages: Vec<Value>) -> Self {
        Self {
            pages: BTreeMap::from([(city.to_string(), pages)]),
            ..Self::default()
        }
    }
}

impl ListingsApi for StubApi {
    async fn fetch_page(&self, config: &QueryConfig) -> Result<Value, ScrapeError> {
        let page = config.params.page;
        self.calls
            .lock()
            .unwrap()
            .push((config.city.clone(), page));

        if self.panic_for.as_deref() == Some(config.city.as_str()) {
            panic!("stub exploded for {}", config.city);
        }
        if config.city == "offline" {
            return Err(ScrapeError::Parse("connection refused".to_string()));
        }

        let idx = usize::try_from(page - 1).unwrap();
        Ok(self
            .pages
            .get(&config.city)
            .and_then(|pages| pages.get(idx))
            .cloned()
            .unwrap_or_else(|| json!({"adverts": {}})))
    }
}

fn listing(id: i64, lat: f64, lon: f64) -> Value {
    json!({
        "id": id,
        "title": format!("2-room flat, 60 m², {}/9 floor", id % 9 + 1),
        "addressTitle": "Abay ave",
        "rooms": 2,
        "square": 60.0,
        "price": 30_000_000,
        "photos": [{"src": "a.jpg"}],
        "userType": "owner",
        "status": "active",
        "storage": "live",
        "map": {"lat": lat, "lon": lon}
    })
}

fn page(listings: Vec<Value>) -> Value {
    let adverts: serde_json::Map<String, Value> = listings
        .into_iter()
        .map(|l| (l["id"].to_string(), l))
        .collect();
    json!({ "adverts": adverts })
}

fn write_boundaries(dir: &Path) -> PathBuf {
    let square = |lon0: f64, lat0: f64, lon1: f64, lat1: f64| {
        json!({
            "type": "Polygon",
            "coordinates": [[
                [lon0, lat0], [lon1, lat0], [lon1, lat1], [lon0, lat1], [lon0, lat0]
            ]]
        })
    };
    let file = json!({
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "geometry": square(76.0, 43.0, 77.0, 44.0), "properties": {"id": "Bostandyk"}},
            {"type": "Feature", "geometry": square(77.0, 43.0, 78.0, 44.0), "properties": {"id": "Medeu"}},
        ]
    });
    let path = dir.join("districts.geojson");
    std::fs::write(&path, file.to_string()).unwrap();
    path
}

fn harvest_config(dir: &Path, cities: &[&str], chunk_size: usize) -> HarvestConfig {
    let mut toml = String::from(
        "[[urls]]\nurl = \"https://api.test/map\"\nproperty_type = \"flat\"\ndeal_type = \"sell\"\n",
    );
    for city in cities {
        toml.push_str(&format!(
            "\n[[cities]]\ncity = \"{city}\"\nurl_path = \"{city}\"\n"
        ));
    }
    let mut config = HarvestConfig::from_toml_str(&toml).unwrap();
    config.settings.output_dir = dir.join("output");
    config.settings.boundaries_path = write_boundaries(dir);
    config.settings.chunk_size = chunk_size;
    config.settings.delay_ms = 0;
    config
}

fn chunk_files(output_dir: &Path) -> Vec<PathBuf> {
    let partition = std::fs::read_dir(output_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| p.is_dir())
        .unwrap();
    let mut files: Vec<PathBuf> = std::fs::read_dir(partition)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();
    files
}

fn query_rows(path: &Path) -> Vec<(i64, String, String, bool)> {
    let conn = duckdb::Connection::open_in_memory().unwrap();
    let sql = format!(
        "SELECT id, district, params, extract_datetime IS NOT NULL FROM read_parquet('{}') ORDER BY id",
        path.to_string_lossy()
    );
    let mut stmt = conn.prepare(&sql).unwrap();
    stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))
        .unwrap()
        .map(Result::unwrap)
        .collect()
}

#[tokio::test]
async fn two_listings_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = harvest_config(dir.path(), &["almaty"], 3000);
    let api = Arc::new(StubApi::with_pages(
        "almaty",
        vec![page(vec![
            listing(101, 43.5, 76.5),
            listing(102, 43.5, 77.5),
        ])],
    ));

    let summary = run_with_api(Arc::clone(&api), &config, null_progress())
        .await
        .unwrap();

    assert_eq!(
        summary,
        RunSummary {
            configs: 1,
            failed: 0,
            rows: 2
        }
    );
    let files = chunk_files(&config.settings.output_dir);
    assert_eq!(files.len(), 1);
    let rows = query_rows(&files[0]);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].0, 101);
    assert_eq!(rows[0].1, "Bostandyk");
    assert_eq!(rows[1].1, "Medeu");
    assert!(rows.iter().all(|r| r.3));
    assert!(rows[0].2.contains("\"page\":1"));
    assert_eq!(
        *api.calls.lock().unwrap(),
        vec![("almaty".to_string(), 1), ("almaty".to_string(), 2)]
    );
}

#[tokio::test]
async fn rows_are_split_into_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let config = harvest_config(dir.path(), &["almaty"], 3);
    let api = Arc::new(StubApi::with_pages(
        "almaty",
        vec![
            page((1..=4).map(|id| listing(id, 43.5, 76.5)).collect()),
            page((5..=7).map(|id| listing(id, 43.5, 76.5)).collect()),
        ],
    ));

    let summary = run_with_api(api, &config, null_progress()).await.unwrap();

    assert_eq!(summary.rows, 7);
    let mut sizes: Vec<usize> = chunk_files(&config.settings.output_dir)
        .iter()
        .map(|f| query_rows(f).len())
        .collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![1, 3, 3]);
}

#[tokio::test]
async fn no_listings_writes_no_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = harvest_config(dir.path(), &["almaty"], 3);

    let summary = run_with_api(Arc::new(StubApi::default()), &config, null_progress())
        .await
        .unwrap();

    assert_eq!(summary.rows, 0);
    assert!(chunk_files(&config.settings.output_dir).is_empty());
}

#[tokio::test]
async fn second_run_in_same_month_replaces_first() {
    let dir = tempfile::tempdir().unwrap();
    let config = harvest_config(dir.path(), &["almaty"], 3000);
    let pages = vec![page(vec![listing(1, 43.5, 76.5)])];

    run_with_api(
        Arc::new(StubApi::with_pages("almaty", pages.clone())),
        &config,
        null_progress(),
    )
    .await
    .unwrap();
    let first = chunk_files(&config.settings.output_dir);

    run_with_api(
        Arc::new(StubApi::with_pages("almaty", pages)),
        &config,
        null_progress(),
    )
    .await
    .unwrap();
    let second = chunk_files(&config.settings.output_dir);

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_ne!(first, second);
    assert!(!first[0].exists());
}

#[tokio::test]
async fn failing_configs_do_not_stop_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let config = harvest_config(dir.path(), &["broken", "offline", "almaty"], 3000);
    let api = Arc::new(StubApi {
        panic_for: Some("broken".to_string()),
        ..StubApi::with_pages("almaty", vec![page(vec![listing(1, 43.5, 76.5)])])
    });

    let summary = run_with_api(api, &config, null_progress()).await.unwrap();

    // A transport error only ends pagination; the panic is the one failure.
    assert_eq!(
        summary,
        RunSummary {
            configs: 3,
            failed: 1,
            rows: 1
        }
    );
    assert_eq!(chunk_files(&config.settings.output_dir).len(), 1);
}

#[tokio::test]
async fn missing_boundary_file_fails_before_purging() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = harvest_config(dir.path(), &["almaty"], 3000);
    config.settings.boundaries_path = dir.path().join("nope.geojson");

    let result = run_with_api(Arc::new(StubApi::default()), &config, null_progress()).await;

    assert!(matches!(result, Err(HarvestError::Spatial(_))));
    assert!(!config.settings.output_dir.exists());
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = harvest_config(dir.path(), &["almaty"], 3000);
    config.settings.concurrency = 0;

    let result = run_with_api(Arc::new(StubApi::default()), &config, null_progress()).await;

    assert!(matches!(result, Err(HarvestError::Config(_))));
}
