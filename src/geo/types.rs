//! Core types for the geo subsystem.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// A WGS84 point. Always within lat -90..90, lon -180..180.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        let lat_ok = lat.is_finite() && (-90.0..=90.0).contains(&lat);
        let lon_ok = lon.is_finite() && (-180.0..=180.0).contains(&lon);
        if !lat_ok || !lon_ok {
            return Err(CoordinateError::OutOfRange { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    /// Parse the text lat/lon pair a geocoder hands back.
    pub fn parse(lat: &str, lon: &str) -> Result<Self, CoordinateError> {
        let lat_v: f64 = lat
            .trim()
            .parse()
            .map_err(|_| CoordinateError::Unparseable(lat.to_string()))?;
        let lon_v: f64 = lon
            .trim()
            .parse()
            .map_err(|_| CoordinateError::Unparseable(lon.to_string()))?;
        Self::new(lat_v, lon_v)
    }

    /// `[lon, lat]`, the GeoJSON position order.
    pub fn to_position(self) -> [f64; 2] {
        [self.lon, self.lat]
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("coordinate out of range: {lat}, {lon}")]
    OutOfRange { lat: f64, lon: f64 },
    #[error("unparseable coordinate component '{0}'")]
    Unparseable(String),
}

/// How a location was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LocationSource {
    Geocoder,
    /// Matched the named gazetteer entry.
    Gazetteer(String),
}

impl LocationSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Gazetteer(_))
    }
}

impl fmt::Display for LocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Geocoder => write!(f, "Nominatim"),
            Self::Gazetteer(name) => write!(f, "Built-in ({})", name),
        }
    }
}

/// A resolved location with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub query: String,
    pub coordinate: Coordinate,
    pub source: LocationSource,
}

/// A single geocoder hit, before coordinate parsing. Ids arrive as numbers
/// from Nominatim but as strings from some mirrors, so both are kept raw.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeocodeCandidate {
    #[serde(default)]
    pub place_id: Option<Value>,
    #[serde(default)]
    pub osm_id: Option<Value>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub lat: String,
    #[serde(default)]
    pub lon: String,
}

impl GeocodeCandidate {
    /// `place_id`, else `osm_id`, as text. Empty strings and other JSON types
    /// count as absent.
    pub fn id(&self) -> Option<String> {
        [&self.place_id, &self.osm_id]
            .into_iter()
            .flatten()
            .find_map(|v| match v {
                Value::Number(n) => Some(n.to_string()),
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
    }
}

/// An autocomplete entry, as served on `/suggest`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub id: String,
    pub label: String,
    pub lat: f64,
    pub lon: f64,
}

/// Geocoding failures. None of these leave [`super::GeoResolver`] except
/// `NotFound`.
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid geocoder response: {0}")]
    InvalidResponse(String),
    #[error("location not found: '{0}'")]
    NotFound(String),
}
