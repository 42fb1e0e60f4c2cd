#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory district index for listing enrichment.
//!
//! Loads district polygons from a `GeoJSON`-like boundary file once,
//! builds an R-tree over their envelopes, and answers point → district
//! lookups. When several polygons contain a point, the one that appears
//! first in the file wins.

use std::path::Path;

use geo::{BoundingRect, Contains, MultiPolygon};
use rstar::{AABB, RTree, RTreeObject};
use serde::Deserialize;

/// Returned when the containing polygon has no `id` property.
pub const UNKNOWN_DISTRICT: &str = "Unknown district";

/// Returned when no polygon contains the point.
pub const DISTRICT_NOT_FOUND: &str = "District not found";

/// Errors that can occur while loading a boundary file.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// The boundary file could not be read.
    #[error("I/O error reading boundary file: {0}")]
    Io(#[from] std::io::Error),

    /// The boundary file is not a valid feature collection.
    #[error("Malformed boundary file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level shape of the boundary file. Only `features` is required, so
/// plain `{"features": [...]}` files load as well as proper
/// `FeatureCollection`s.
#[derive(Deserialize)]
struct BoundaryFile {
    features: Vec<BoundaryFeature>,
}

#[derive(Deserialize)]
struct BoundaryFeature {
    geometry: Option<geojson::Geometry>,
    #[serde(default)]
    properties: Option<serde_json::Map<String, serde_json::Value>>,
}

/// A district polygon stored in the R-tree.
struct DistrictEntry {
    /// Position of the feature in the boundary file.
    order: usize,
    /// `None` when the feature has no `id` property.
    label: Option<String>,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for DistrictEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// District polygons indexed for point lookups.
///
/// Read-only after construction; share it behind an `Arc` across workers.
pub struct DistrictIndex {
    districts: RTree<DistrictEntry>,
}

impl DistrictIndex {
    /// Loads the boundary file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if the file is missing, unreadable, or not
    /// a feature collection.
    pub fn load(path: &Path) -> Result<Self, SpatialError> {
        let contents = std::fs::read_to_string(path)?;
        let index = Self::from_geojson_str(&contents)?;
        log::info!(
            "Loaded {} district polygons from {}",
            index.len(),
            path.display()
        );
        Ok(index)
    }

    /// Builds an index from boundary file contents.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Json`] if `contents` is not a feature
    /// collection.
    pub fn from_geojson_str(contents: &str) -> Result<Self, SpatialError> {
        let file: BoundaryFile = serde_json::from_str(contents)?;
        let mut entries = Vec::with_capacity(file.features.len());

        for (order, feature) in file.features.into_iter().enumerate() {
            let label = feature
                .properties
                .as_ref()
                .and_then(|props| props.get("id"))
                .and_then(id_label);

            let Some(polygon) = feature.geometry.and_then(to_multipolygon) else {
                log::warn!(
                    "Skipping boundary feature #{order} ({}): geometry is not a polygon",
                    label.as_deref().unwrap_or("no id")
                );
                continue;
            };

            entries.push(DistrictEntry {
                order,
                label,
                envelope: compute_envelope(&polygon),
                polygon,
            });
        }

        Ok(Self {
            districts: RTree::bulk_load(entries),
        })
    }

    /// Number of indexed polygons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.districts.size()
    }

    /// Whether the index holds no polygons.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.districts.size() == 0
    }

    /// Resolves the district label for a position.
    ///
    /// The point is built longitude-first. Returns [`UNKNOWN_DISTRICT`] if
    /// the first containing polygon has no `id`, or [`DISTRICT_NOT_FOUND`]
    /// if nothing contains the point.
    #[must_use]
    pub fn resolve(&self, lat: f64, lon: f64) -> &str {
        let point = geo::Point::new(lon, lat);
        let query_env = AABB::from_point([lon, lat]);

        self.districts
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.contains(&point))
            .min_by_key(|entry| entry.order)
            .map_or(DISTRICT_NOT_FOUND, |entry| {
                entry.label.as_deref().unwrap_or(UNKNOWN_DISTRICT)
            })
    }
}

/// Strings are used as-is; other scalar ids (numbers) keep their JSON text.
fn id_label(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`]. Handles both
/// `Polygon` and `MultiPolygon`.
fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}
