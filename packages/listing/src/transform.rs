//! Record → output row flattening.

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use listing_harvest_listing_models::{OutputRow, ValidatedRecord};
use listing_harvest_spatial::DistrictIndex;
use regex::Regex;

/// `current/total` floor pair, e.g. `"3/9"`.
static FLOOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)/(\d+)").expect("valid regex"));

/// Extracts `(floor, total_floors)` from the first `current/total` pair in
/// `title`. Both are `None` when there is no pair or either number does
/// not fit.
#[must_use]
pub fn parse_floors(title: &str) -> (Option<i32>, Option<i32>) {
    let Some(caps) = FLOOR_RE.captures(title) else {
        return (None, None);
    };
    match (caps[1].parse::<i32>(), caps[2].parse::<i32>()) {
        (Ok(floor), Ok(total)) => (Some(floor), Some(total)),
        _ => (None, None),
    }
}

/// Flattens a record into an [`OutputRow`], stamped with the current UTC
/// time.
#[must_use]
pub fn transform(record: &ValidatedRecord, districts: &DistrictIndex) -> OutputRow {
    transform_at(record, districts, chrono::Utc::now().naive_utc())
}

/// Flattens a record into an [`OutputRow`] stamped with `now`.
#[must_use]
pub fn transform_at(
    record: &ValidatedRecord,
    districts: &DistrictIndex,
    now: NaiveDateTime,
) -> OutputRow {
    let config = &record.config;
    let url = config.build_url();

    log::trace!(
        "Flatten listing {} for {url} page number: {}",
        record.id,
        config.params.page
    );

    let (floor, total_floors) = parse_floors(&record.title);
    let district = districts
        .resolve(record.position.lat, record.position.lon)
        .to_owned();

    OutputRow {
        id: record.id,
        city: config.city.clone(),
        district,
        address: record.address.clone(),
        title: record.title.clone(),
        property: config.property_type.clone(),
        deal_type: config.deal_type.clone(),
        duration: config.duration.clone(),
        rooms: record.rooms,
        square: record.square,
        price: record.price,
        number_of_photos: i64::try_from(record.photos.len()).unwrap_or(i64::MAX),
        seller: record.seller.clone(),
        status: record.status.clone(),
        storage: record.storage.clone(),
        latitude: record.position.lat,
        longitude: record.position.lon,
        floor,
        total_floors,
        url,
        params: config.params.to_json(),
        extract_datetime: now,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use chrono::NaiveDate;
    use listing_harvest_listing_models::{
        CityTemplate, GeoPosition, ListingTemplate, QueryConfig,
    };
    use listing_harvest_spatial::{DISTRICT_NOT_FOUND, DistrictIndex};

    use super::*;

    fn districts() -> DistrictIndex {
        let file = serde_json::json!({
            "features": [{
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[76.0, 43.0], [77.0, 43.0], [77.0, 44.0], [76.0, 44.0], [76.0, 43.0]]]
                },
                "properties": {"id": "Almalinsky"}
            }]
        });
        DistrictIndex::from_geojson_str(&file.to_string()).unwrap()
    }

    fn record(title: &str, lat: f64, lon: f64) -> ValidatedRecord {
        let mut config = QueryConfig::new(
            &ListingTemplate {
                url: "https://api.test/map".to_string(),
                property_type: "flat".to_string(),
                deal_type: "rent".to_string(),
                duration: Some("daily".to_string()),
            },
            &CityTemplate {
                city: "almaty".to_string(),
                url_path: "almaty".to_string(),
                params: BTreeMap::from([("areas".to_string(), "bbox".to_string())]),
            },
            &BTreeMap::new(),
        );
        config.params.advance_page();
        config.params.advance_page();
        ValidatedRecord {
            id: 7,
            title: title.to_string(),
            address: "Tole bi 1".to_string(),
            rooms: None,
            square: 42.0,
            price: 250_000.0,
            photos: vec![serde_json::Map::new(); 3],
            seller: "agency".to_string(),
            status: "active".to_string(),
            storage: "live".to_string(),
            position: GeoPosition { lat, lon },
            config: Arc::new(config),
        }
    }

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, 3)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
    }

    #[test]
    fn parses_floor_pair_anywhere_in_title() {
        assert_eq!(parse_floors("2-room flat, 3/9 floor"), (Some(3), Some(9)));
        assert_eq!(parse_floors("3/9"), (Some(3), Some(9)));
    }

    #[test]
    fn uses_first_floor_pair_only() {
        assert_eq!(parse_floors("5/12 floor, block 1/2"), (Some(5), Some(12)));
    }

    #[test]
    fn no_floor_pair_yields_nulls() {
        assert_eq!(parse_floors("house with garden"), (None, None));
        assert_eq!(parse_floors("floor 3 of 9"), (None, None));
    }

    #[test]
    fn oversized_floor_numbers_yield_nulls() {
        assert_eq!(parse_floors("99999999999/1"), (None, None));
    }

    #[test]
    fn flattens_record_with_derived_fields() {
        let row = transform_at(&record("1-room, 4/5 floor", 43.5, 76.5), &districts(), stamp());
        assert_eq!(row.district, "Almalinsky");
        assert_eq!((row.floor, row.total_floors), (Some(4), Some(5)));
        assert_eq!(row.city, "almaty");
        assert_eq!(row.property, "flat");
        assert_eq!(row.duration.as_deref(), Some("daily"));
        assert_eq!(row.number_of_photos, 3);
        assert_eq!(row.url, "https://api.test/map/almaty");
        assert_eq!(row.extract_datetime, stamp());
        assert!((row.latitude - 43.5).abs() < f64::EPSILON);
    }

    #[test]
    fn params_are_copied_at_emission_page() {
        let row = transform_at(&record("x", 43.5, 76.5), &districts(), stamp());
        let params: serde_json::Value = serde_json::from_str(&row.params).unwrap();
        assert_eq!(params, serde_json::json!({"areas": "bbox", "page": 3}));
    }

    #[test]
    fn outside_point_gets_not_found_label() {
        let row = transform_at(&record("x", 10.0, 10.0), &districts(), stamp());
        assert_eq!(row.district, DISTRICT_NOT_FOUND);
    }

    #[test]
    fn transform_stamps_current_time() {
        let before = chrono::Utc::now().naive_utc();
        let row = transform(&record("x", 43.5, 76.5), &districts());
        assert!(row.extract_datetime >= before);
    }
}
