//! Location resolution for the fare estimator.
//!
//! Free text goes to a live geocoder first and to a built-in, ordered
//! gazetteer of known cities and landmarks second.

pub mod gazetteer;
pub mod providers;
pub mod resolver;
pub mod types;

pub use gazetteer::{Gazetteer, GazetteerEntry, GazetteerError, PlaceSpec};
pub use providers::{Geocoder, NominatimClient};
pub use resolver::GeoResolver;
pub use types::{
    Coordinate, CoordinateError, GeoError, LocationSource, ResolvedLocation, Suggestion,
};
