//! Raw listing validation.
//!
//! Converts an untyped JSON listing into a [`ValidatedRecord`]. Every
//! field is checked; a listing either passes completely or is rejected
//! with the full list of violated fields.

use std::fmt;
use std::sync::Arc;

use listing_harvest_listing_models::{GeoPosition, QueryConfig, ValidatedRecord};
use serde_json::{Map, Value};

/// One field that failed its check.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldViolation {
    /// Field path, e.g. `"price"` or `"map.lat"`.
    pub field: &'static str,
    /// What the field was expected to be.
    pub constraint: &'static str,
    /// The offending raw value; `None` when the field is absent.
    pub value: Option<Value>,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{} - expected {}, got {value}", self.field, self.constraint),
            None => write!(f, "{} - expected {}, field missing", self.field, self.constraint),
        }
    }
}

/// A listing rejected by [`validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailure {
    /// The raw `id` of the listing, if it had one.
    pub listing_id: Option<Value>,
    /// Every violated field, in check order. Never empty.
    pub violations: Vec<FieldViolation>,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "listing {} failed validation: {} invalid field(s)",
            id_display(self.listing_id.as_ref()),
            self.violations.len()
        )
    }
}

impl std::error::Error for ValidationFailure {}

impl ValidationFailure {
    /// Logs one error line per violated field.
    pub fn log(&self, label: &str) {
        let id = id_display(self.listing_id.as_ref());
        for violation in &self.violations {
            log::error!("[{label}] Validation error: listing id {id}: {violation}");
        }
    }

    /// Returns the violation for `field`, if any.
    #[must_use]
    pub fn violation(&self, field: &str) -> Option<&FieldViolation> {
        self.violations.iter().find(|v| v.field == field)
    }
}

fn id_display(id: Option<&Value>) -> String {
    id.map_or_else(|| "<none>".to_owned(), ToString::to_string)
}

/// Collects violations while pulling typed values out of a JSON object.
struct FieldReader<'a> {
    object: &'a Map<String, Value>,
    violations: Vec<FieldViolation>,
}

impl<'a> FieldReader<'a> {
    const fn new(object: &'a Map<String, Value>) -> Self {
        Self {
            object,
            violations: Vec::new(),
        }
    }

    fn fail(&mut self, field: &'static str, constraint: &'static str, value: Option<&Value>) {
        self.violations.push(FieldViolation {
            field,
            constraint,
            value: value.cloned(),
        });
    }

    /// Looks up a required key, recording a violation if it is absent.
    fn required(
        &mut self,
        key: &str,
        field: &'static str,
        constraint: &'static str,
    ) -> Option<&'a Value> {
        let value = self.object.get(key);
        if value.is_none() {
            self.fail(field, constraint, None);
        }
        value
    }

    fn string(&mut self, key: &str, field: &'static str) -> Option<String> {
        let value = self.required(key, field, "a string")?;
        if let Some(s) = value.as_str() {
            return Some(s.to_owned());
        }
        self.fail(field, "a string", Some(value));
        None
    }

    fn integer(&mut self, key: &str, field: &'static str) -> Option<i64> {
        let value = self.required(key, field, "an integer")?;
        let parsed = as_integer(value);
        if parsed.is_none() {
            self.fail(field, "an integer", Some(value));
        }
        parsed
    }

    /// Missing and `null` both mean "not stated".
    fn optional_integer(&mut self, key: &str, field: &'static str) -> Option<i64> {
        match self.object.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => {
                let parsed = as_integer(value);
                if parsed.is_none() {
                    self.fail(field, "an integer or null", Some(value));
                }
                parsed
            }
        }
    }

    fn number(&mut self, key: &str, field: &'static str) -> Option<f64> {
        let value = self.required(key, field, "a number")?;
        let parsed = as_number(value);
        if parsed.is_none() {
            self.fail(field, "a number", Some(value));
        }
        parsed
    }

    fn object_list(&mut self, key: &str, field: &'static str) -> Option<Vec<Map<String, Value>>> {
        let value = self.required(key, field, "a list of objects")?;
        let items = value.as_array().and_then(|items| {
            items
                .iter()
                .map(|item| item.as_object().cloned())
                .collect::<Option<Vec<_>>>()
        });
        if items.is_none() {
            self.fail(field, "a list of objects", Some(value));
        }
        items
    }

    fn position(&mut self) -> Option<GeoPosition> {
        let value = self.required("map", "map", "an object with lat and lon")?;
        let Some(map) = value.as_object() else {
            self.fail("map", "an object with lat and lon", Some(value));
            return None;
        };

        let mut inner = FieldReader::new(map);
        let lat = inner.number("lat", "map.lat");
        let lon = inner.number("lon", "map.lon");
        self.violations.append(&mut inner.violations);

        Some(GeoPosition { lat: lat?, lon: lon? })
    }
}

/// Largest magnitude below which every integral `f64` is exact.
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// Integral JSON numbers, floats with no fractional part, and integer
/// strings are accepted. Booleans are not.
#[allow(clippy::cast_possible_truncation)]
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT_INT)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// JSON numbers and numeric strings are accepted.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Validates one raw listing fetched for `config`.
///
/// # Errors
///
/// Returns a [`ValidationFailure`] listing every missing or mistyped
/// field. No partially-built record is ever returned.
pub fn validate(
    raw: &Value,
    config: &Arc<QueryConfig>,
) -> Result<ValidatedRecord, ValidationFailure> {
    let Some(object) = raw.as_object() else {
        return Err(ValidationFailure {
            listing_id: None,
            violations: vec![FieldViolation {
                field: "listing",
                constraint: "an object",
                value: Some(raw.clone()),
            }],
        });
    };

    let mut reader = FieldReader::new(object);
    let id = reader.integer("id", "id");
    let title = reader.string("title", "title");
    let address = reader.string("addressTitle", "addressTitle");
    let rooms = reader.optional_integer("rooms", "rooms");
    let square = reader.number("square", "square");
    let price = reader.number("price", "price");
    let photos = reader.object_list("photos", "photos");
    let seller = reader.string("userType", "userType");
    let status = reader.string("status", "status");
    let storage = reader.string("storage", "storage");
    let position = reader.position();

    let failure = |violations| ValidationFailure {
        listing_id: object.get("id").cloned(),
        violations,
    };

    if !reader.violations.is_empty() {
        return Err(failure(reader.violations));
    }

    match (id, title, address, square, price, photos, seller, status, storage, position) {
        (
            Some(id),
            Some(title),
            Some(address),
            Some(square),
            Some(price),
            Some(photos),
            Some(seller),
            Some(status),
            Some(storage),
            Some(position),
        ) => Ok(ValidatedRecord {
            id,
            title,
            address,
            rooms,
            square,
            price,
            photos,
            seller,
            status,
            storage,
            position,
            config: Arc::clone(config),
        }),
        // Every `None` above records a violation, so this is unreachable in
        // practice; report it rather than panic.
        _ => Err(failure(vec![FieldViolation {
            field: "listing",
            constraint: "all required fields",
            value: Some(raw.clone()),
        }])),
    }
}
