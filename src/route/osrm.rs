//! OSRM route service: response types, the `RouteProvider` seam, and the
//! HTTP client.
//!
//! See: <http://project-osrm.org/docs/v5.24.0/api/#route-service>

use super::types::RouteError;
use crate::geo::Coordinate;
use serde::Deserialize;
use std::time::Duration;

/// OSRM Route API response.
#[derive(Debug, Deserialize)]
pub struct RouteResponse {
    /// `"Ok"` on success, otherwise e.g. `"NoRoute"` or `"InvalidQuery"`.
    pub code: String,
    pub message: Option<String>,
    #[serde(default)]
    pub routes: Vec<OsrmRoute>,
}

impl RouteResponse {
    pub fn is_ok(&self) -> bool {
        self.code == "Ok"
    }
}

#[derive(Debug, Deserialize)]
pub struct OsrmRoute {
    /// Meters.
    #[serde(default)]
    pub distance: f64,
    /// Seconds.
    #[serde(default)]
    pub duration: f64,
    pub geometry: Option<LineString>,
}

/// GeoJSON LineString, positions in `[lon, lat]` order.
#[derive(Debug, Deserialize)]
pub struct LineString {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Vec<[f64; 2]>,
}

impl LineString {
    /// The polyline as coordinates; `None` if malformed or shorter than two points.
    pub fn to_path(&self) -> Option<Vec<Coordinate>> {
        if self.kind != "LineString" || self.coordinates.len() < 2 {
            return None;
        }
        self.coordinates
            .iter()
            .map(|[lon, lat]| Coordinate::new(*lat, *lon).ok())
            .collect()
    }
}

/// A route as the router reports it, before unit conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRoute {
    pub distance_m: f64,
    pub duration_s: f64,
    pub path: Option<Vec<Coordinate>>,
}

/// A driving-route service.
pub trait RouteProvider: Send + Sync {
    fn route(
        &self,
        from: Coordinate,
        to: Coordinate,
        timeout: Duration,
    ) -> Result<RawRoute, RouteError>;
}

/// Client for an OSRM `route/v1/driving` endpoint.
pub struct OsrmClient {
    agent: ureq::Agent,
    base_url: String,
}

impl OsrmClient {
    pub fn new(base_url: &str, user_agent: &str) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().user_agent(user_agent).build(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn route_url(&self, from: Coordinate, to: Coordinate) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}",
            self.base_url, from.lon, from.lat, to.lon, to.lat
        )
    }
}

impl RouteProvider for OsrmClient {
    fn route(
        &self,
        from: Coordinate,
        to: Coordinate,
        timeout: Duration,
    ) -> Result<RawRoute, RouteError> {
        let response: RouteResponse = self
            .agent
            .get(&self.route_url(from, to))
            .timeout(timeout)
            .query("overview", "full")
            .query("geometries", "geojson")
            .call()
            .map_err(|e| RouteError::Network(e.to_string()))?
            .into_json()
            .map_err(|e| RouteError::InvalidResponse(e.to_string()))?;

        first_route(response)
    }
}

fn first_route(response: RouteResponse) -> Result<RawRoute, RouteError> {
    if !response.is_ok() {
        return Err(RouteError::NoRoute(response.message.unwrap_or(response.code)));
    }
    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| RouteError::NoRoute("empty route list".into()))?;

    Ok(RawRoute {
        distance_m: route.distance,
        duration_s: route.duration,
        path: route.geometry.as_ref().and_then(LineString::to_path),
    })
}
