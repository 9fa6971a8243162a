//! Route result types.

use crate::geo::Coordinate;
use serde::Serialize;
use thiserror::Error;

/// Distance, duration and the path between two points.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteResult {
    pub distance_km: f64,
    pub duration_min: f64,
    /// Polyline, at least two points.
    pub geometry: Vec<Coordinate>,
}

impl RouteResult {
    /// GeoJSON LineString for the response body.
    pub fn to_geojson(&self) -> GeoJsonLine {
        GeoJsonLine {
            kind: "LineString",
            coordinates: self.geometry.iter().map(|c| c.to_position()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoJsonLine {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RouteSource {
    Router,
    /// Great-circle estimate, straight-line geometry.
    Haversine,
}

/// Routing failures; always absorbed by [`super::RouteResolver`].
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid router response: {0}")]
    InvalidResponse(String),
    #[error("no route: {0}")]
    NoRoute(String),
}
