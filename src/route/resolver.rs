//! Route resolver — OSRM first, great-circle estimate second.
//!
//! Never fails. Whatever the path, the result is floored so that two
//! addresses collapsing onto one city centroid still price as a real trip.
//! [`recovery_route`] is the exception; it has its own zero-distance rule.

use super::osrm::{RawRoute, RouteProvider};
use super::types::{RouteError, RouteResult, RouteSource};
use crate::geo::Coordinate;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const ROUTE_TIMEOUT: Duration = Duration::from_secs(10);
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Distances under this are replaced by [`FLOOR_DISTANCE_KM`].
const MIN_DISTANCE_KM: f64 = 0.5;
const FLOOR_DISTANCE_KM: f64 = 5.0;
/// Durations under this are replaced by [`FLOOR_DURATION_MIN`].
const MIN_DURATION_MIN: f64 = 5.0;
const FLOOR_DURATION_MIN: f64 = 15.0;

/// Minutes per km assumed by the great-circle estimate, and its minimum.
const FALLBACK_MIN_PER_KM: f64 = 2.5;
const FALLBACK_MIN_DURATION: f64 = 10.0;

/// Recovery substitutes this for a zero great-circle distance.
const RECOVERY_DISTANCE_KM: f64 = 12.0;
const RECOVERY_MIN_DURATION: f64 = 15.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRoute {
    pub route: RouteResult,
    pub source: RouteSource,
}

#[derive(Clone)]
pub struct RouteResolver {
    provider: Option<Arc<dyn RouteProvider>>,
    timeout: Duration,
}

impl RouteResolver {
    /// `provider: None` always estimates.
    pub fn new(provider: Option<Arc<dyn RouteProvider>>) -> Self {
        Self {
            provider,
            timeout: ROUTE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn resolve(&self, pickup: Coordinate, drop: Coordinate) -> ResolvedRoute {
        if let Some(provider) = &self.provider {
            match provider
                .route(pickup, drop, self.timeout)
                .and_then(|raw| from_raw(raw, pickup, drop))
            {
                Ok(route) => {
                    let route = apply_floors(route);
                    info!(
                        distance_km = route.distance_km,
                        duration_min = route.duration_min,
                        points = route.geometry.len(),
                        "routed"
                    );
                    return ResolvedRoute {
                        route,
                        source: RouteSource::Router,
                    };
                }
                Err(e) => warn!(error = %e, "router failed, estimating great-circle route"),
            }
        }

        let route = apply_floors(estimate_route(pickup, drop));
        info!(
            distance_km = route.distance_km,
            duration_min = route.duration_min,
            "estimated route"
        );
        ResolvedRoute {
            route,
            source: RouteSource::Haversine,
        }
    }
}

fn from_raw(
    raw: RawRoute,
    pickup: Coordinate,
    drop: Coordinate,
) -> Result<RouteResult, RouteError> {
    let valid = |v: f64| v.is_finite() && v >= 0.0;
    if !valid(raw.distance_m) || !valid(raw.duration_s) {
        return Err(RouteError::InvalidResponse(format!(
            "distance {} m, duration {} s",
            raw.distance_m, raw.duration_s
        )));
    }
    Ok(RouteResult {
        distance_km: raw.distance_m / 1000.0,
        duration_min: raw.duration_s / 60.0,
        geometry: raw.path.unwrap_or_else(|| vec![pickup, drop]),
    })
}

/// Great-circle distance in km on a spherical earth.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Haversine distance, `max(10, 2.5·km)` minutes, straight-line geometry.
/// Not floored.
pub fn estimate_route(pickup: Coordinate, drop: Coordinate) -> RouteResult {
    let distance_km = haversine_km(pickup, drop);
    RouteResult {
        distance_km,
        duration_min: (distance_km * FALLBACK_MIN_PER_KM).max(FALLBACK_MIN_DURATION),
        geometry: vec![pickup, drop],
    }
}

/// Route for the recovery path. Unfloored: a zero distance becomes 12 km and
/// the duration is `max(15, 2.5·km)` minutes.
pub fn recovery_route(pickup: Coordinate, drop: Coordinate) -> RouteResult {
    let haversine = haversine_km(pickup, drop);
    let distance_km = if haversine > 0.0 && haversine.is_finite() {
        haversine
    } else {
        RECOVERY_DISTANCE_KM
    };
    RouteResult {
        distance_km,
        duration_min: (distance_km * FALLBACK_MIN_PER_KM).max(RECOVERY_MIN_DURATION),
        geometry: vec![pickup, drop],
    }
}

pub fn apply_floors(mut route: RouteResult) -> RouteResult {
    if route.distance_km < MIN_DISTANCE_KM {
        route.distance_km = FLOOR_DISTANCE_KM;
    }
    if route.duration_min < MIN_DURATION_MIN {
        route.duration_min = FLOOR_DURATION_MIN;
    }
    route
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub struct DownRouter;

    impl RouteProvider for DownRouter {
        fn route(
            &self,
            _: Coordinate,
            _: Coordinate,
            _: Duration,
        ) -> Result<RawRoute, RouteError> {
            Err(RouteError::Network("timed out".into()))
        }
    }

    /// Returns the same raw route for every request.
    pub struct FixedRouter(pub RawRoute);

    impl RouteProvider for FixedRouter {
        fn route(
            &self,
            _: Coordinate,
            _: Coordinate,
            _: Duration,
        ) -> Result<RawRoute, RouteError> {
            Ok(self.0.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use approx::assert_abs_diff_eq;

    const CHENNAI: Coordinate = Coordinate {
        lat: 13.0827,
        lon: 80.2707,
    };
    const SALEM: Coordinate = Coordinate {
        lat: 11.6643,
        lon: 78.146,
    };

    #[test]
    fn test_haversine_known_distance() {
        let d = haversine_km(CHENNAI, SALEM);
        assert!(d > 250.0 && d < 300.0, "Chennai-Salem {}", d);
        assert_abs_diff_eq!(haversine_km(SALEM, CHENNAI), d, epsilon = 1e-9);
        assert_abs_diff_eq!(haversine_km(CHENNAI, CHENNAI), 0.0);
    }

    #[test]
    fn test_router_success() {
        let path = vec![
            CHENNAI,
            Coordinate {
                lat: 12.5,
                lon: 79.5,
            },
            SALEM,
        ];
        let r = RouteResolver::new(Some(Arc::new(FixedRouter(RawRoute {
            distance_m: 340_000.0,
            duration_s: 18_000.0,
            path: Some(path.clone()),
        }))));
        let resolved = r.resolve(CHENNAI, SALEM);
        assert_eq!(resolved.source, RouteSource::Router);
        assert_abs_diff_eq!(resolved.route.distance_km, 340.0);
        assert_abs_diff_eq!(resolved.route.duration_min, 300.0);
        assert_eq!(resolved.route.geometry, path);
    }

    #[test]
    fn test_router_without_geometry_uses_straight_line() {
        let r = RouteResolver::new(Some(Arc::new(FixedRouter(RawRoute {
            distance_m: 8_000.0,
            duration_s: 1_200.0,
            path: None,
        }))));
        let resolved = r.resolve(CHENNAI, SALEM);
        assert_eq!(resolved.source, RouteSource::Router);
        assert_eq!(resolved.route.geometry, vec![CHENNAI, SALEM]);
    }

    #[test]
    fn test_router_failure_falls_back() {
        let r = RouteResolver::new(Some(Arc::new(DownRouter)));
        let resolved = r.resolve(CHENNAI, SALEM);
        assert_eq!(resolved.source, RouteSource::Haversine);
        assert_eq!(resolved.route.geometry, vec![CHENNAI, SALEM]);
        let d = resolved.route.distance_km;
        assert_abs_diff_eq!(resolved.route.duration_min, d * 2.5, epsilon = 1e-9);
    }

    #[test]
    fn test_nonsense_router_values_fall_back() {
        let r = RouteResolver::new(Some(Arc::new(FixedRouter(RawRoute {
            distance_m: f64::NAN,
            duration_s: 60.0,
            path: None,
        }))));
        assert_eq!(r.resolve(CHENNAI, SALEM).source, RouteSource::Haversine);
    }

    #[test]
    fn test_floors_on_zero_route() {
        let resolved = RouteResolver::new(None).resolve(CHENNAI, CHENNAI);
        assert_eq!(resolved.source, RouteSource::Haversine);
        assert_abs_diff_eq!(resolved.route.distance_km, 5.0);
        // max(10, 0) = 10 minutes is above the 5 minute trigger.
        assert_abs_diff_eq!(resolved.route.duration_min, 10.0);
    }

    #[test]
    fn test_floors_on_router_path() {
        let r = RouteResolver::new(Some(Arc::new(FixedRouter(RawRoute {
            distance_m: 300.0,
            duration_s: 120.0,
            path: None,
        }))));
        let resolved = r.resolve(CHENNAI, CHENNAI);
        assert_abs_diff_eq!(resolved.route.distance_km, 5.0);
        assert_abs_diff_eq!(resolved.route.duration_min, 15.0);
    }

    #[test]
    fn test_floor_bounds_hold_everywhere() {
        let r = RouteResolver::new(None);
        let points = [
            CHENNAI,
            SALEM,
            Coordinate::new(0.0, 0.0).unwrap(),
            Coordinate::new(89.9, 179.9).unwrap(),
            Coordinate::new(-89.9, -179.9).unwrap(),
            Coordinate::new(11.0168, 76.9558).unwrap(),
        ];
        for a in points {
            for b in points {
                let route = r.resolve(a, b).route;
                assert!(route.distance_km >= 0.5);
                assert!(route.duration_min >= 5.0);
                assert!(route.geometry.len() >= 2);
            }
        }
    }

    #[test]
    fn test_recovery_route_zero_distance() {
        let route = recovery_route(SALEM, SALEM);
        assert_abs_diff_eq!(route.distance_km, 12.0);
        assert_abs_diff_eq!(route.duration_min, 30.0);
        assert_eq!(route.geometry, vec![SALEM, SALEM]);
    }

    #[test]
    fn test_recovery_route_is_not_floored() {
        let near = Coordinate::new(13.0900, 80.2707).unwrap();
        let route = recovery_route(CHENNAI, near);
        // ~0.81 km stays as is; the 5 km floor does not apply here.
        assert!(route.distance_km > 0.5 && route.distance_km < 1.0);
        assert_abs_diff_eq!(route.duration_min, 15.0);

        let long = recovery_route(CHENNAI, SALEM);
        assert_abs_diff_eq!(long.duration_min, long.distance_km * 2.5, epsilon = 1e-9);
    }

    #[test]
    fn test_geojson_positions() {
        let route = estimate_route(CHENNAI, SALEM);
        let json = serde_json::to_value(route.to_geojson()).unwrap();
        assert_eq!(json["type"], "LineString");
        assert_eq!(json["coordinates"][0][0], 80.2707);
        assert_eq!(json["coordinates"][1][1], 11.6643);
    }
}
