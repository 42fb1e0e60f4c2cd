#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Listing validation and flattening.
//!
//! [`validate`] turns a raw JSON listing into a typed record;
//! [`transform`] turns a typed record into the flat row that is written
//! to disk, resolving its district along the way.

pub mod transform;
pub mod validate;

pub use transform::{parse_floors, transform, transform_at};
pub use validate::{FieldViolation, ValidationFailure, validate};
