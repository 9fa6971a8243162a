//! The estimation pipeline — the primary public API.
//!
//! Validating → ResolvingPickup → (spacing) → ResolvingDrop → Routing →
//! Computing → Done. Modeled failures end in `Failed`. Anything unexpected
//! (a collaborator panicking, a non-finite number reaching the result) goes
//! to `Recovering`, which retries with the gazetteer and a great-circle
//! route only.

use crate::fare::{is_outstation, FareEngine, FareTable, SurgePolicy};
use crate::geo::{Coordinate, GeoError, GeoResolver};
use crate::route::{recovery_route, GeoJsonLine, RouteResolver, RouteResult, RouteSource};
use serde::Serialize;
use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Minimum gap between the two geocoder requests of one estimate.
/// Nominatim's usage policy allows roughly one request per second.
pub const GEOCODE_SPACING: Duration = Duration::from_millis(1100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    ResolvingPickup,
    ResolvingDrop,
    Routing,
    Computing,
    Done,
    Failed,
    Recovering,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validating => "validating",
            Self::ResolvingPickup => "resolving-pickup",
            Self::ResolvingDrop => "resolving-drop",
            Self::Routing => "routing",
            Self::Computing => "computing",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Recovering => "recovering",
        };
        f.write_str(s)
    }
}

/// Errors a caller can see. All of them are client errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EstimateError {
    #[error("Please select valid pickup/drop location.")]
    EmptyInput,
    #[error("Could not find location: {0}. Please try a more specific address.")]
    InvalidLocation(String),
    #[error(
        "Unable to determine locations. Please use more specific addresses or city names."
    )]
    Unresolvable,
}

/// Why the primary run stopped.
#[derive(Debug)]
enum StageFailure {
    NotFound(String),
    Defect { stage: Stage, detail: String },
}

/// One finished estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub pickup: Coordinate,
    pub drop: Coordinate,
    pub route: RouteResult,
    pub surge_multiplier: f64,
    pub is_outstation: bool,
    pub fares: FareTable,
    /// A gazetteer coordinate or a great-circle route went into this result.
    pub is_estimated: bool,
}

/// Wire form of [`Estimate`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResponse {
    pub pickup: Coordinate,
    pub drop: Coordinate,
    pub route_geo_json: GeoJsonLine,
    pub distance_km: f64,
    pub duration_min: f64,
    pub surge_multiplier: f64,
    pub is_outstation: bool,
    pub fares: FareTable,
    pub estimated: bool,
}

impl Estimate {
    pub fn to_response(&self) -> EstimateResponse {
        EstimateResponse {
            pickup: self.pickup,
            drop: self.drop,
            route_geo_json: self.route.to_geojson(),
            distance_km: round2(self.route.distance_km),
            duration_min: round2(self.route.duration_min),
            surge_multiplier: self.surge_multiplier,
            is_outstation: self.is_outstation,
            fares: self.fares.clone(),
            estimated: self.is_estimated,
        }
    }

    /// Defect check before the result leaves the pipeline.
    fn check(&self) -> Result<(), String> {
        let route = &self.route;
        if !route.distance_km.is_finite() || !route.duration_min.is_finite() {
            return Err(format!(
                "non-finite route: {} km, {} min",
                route.distance_km, route.duration_min
            ));
        }
        if route.geometry.len() < 2 {
            return Err(format!("route geometry has {} points", route.geometry.len()));
        }
        if !(1.0..=2.0).contains(&self.surge_multiplier) {
            return Err(format!("surge {} out of range", self.surge_multiplier));
        }
        if let Some(q) = self.fares.quotes().iter().find(|q| !q.price.is_finite()) {
            return Err(format!(
                "non-finite fare for {} {}",
                q.provider, q.vehicle_class
            ));
        }
        Ok(())
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Orchestrates geocoding, routing and pricing for one request at a time.
/// Holds only shared, read-only collaborators; one instance serves every
/// request concurrently.
#[derive(Clone)]
pub struct EstimationPipeline {
    geo: GeoResolver,
    router: RouteResolver,
    surge: SurgePolicy,
    fares: FareEngine,
    spacing: Duration,
}

impl EstimationPipeline {
    pub fn new(geo: GeoResolver, router: RouteResolver, surge: SurgePolicy) -> Self {
        Self {
            geo,
            router,
            surge,
            fares: FareEngine,
            spacing: GEOCODE_SPACING,
        }
    }

    /// Widen the geocoder spacing. Values under [`GEOCODE_SPACING`] are raised to it.
    pub fn with_spacing(mut self, spacing: Duration) -> Self {
        self.spacing = spacing.max(GEOCODE_SPACING);
        self
    }

    pub fn geo(&self) -> &GeoResolver {
        &self.geo
    }

    pub fn estimate(&self, pickup: &str, drop: &str) -> Result<Estimate, EstimateError> {
        let (pickup, drop) = validate(pickup, drop)?;

        let stage = Cell::new(Stage::Validating);
        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| self.run(pickup, drop, &stage)));

        match outcome {
            Ok(Ok(estimate)) => {
                debug!(from = %stage.get(), to = %Stage::Done, "stage");
                info!(
                    pickup,
                    drop,
                    distance_km = estimate.route.distance_km,
                    surge = estimate.surge_multiplier,
                    estimated = estimate.is_estimated,
                    "estimate ready"
                );
                Ok(estimate)
            }
            Ok(Err(StageFailure::NotFound(query))) => {
                debug!(from = %stage.get(), to = %Stage::Failed, "stage");
                Err(EstimateError::InvalidLocation(query))
            }
            Ok(Err(StageFailure::Defect { stage: at, detail })) => {
                warn!(stage = %at, detail = %detail, "pipeline defect, recovering");
                self.recover(pickup, drop)
            }
            Err(payload) => {
                warn!(
                    stage = %stage.get(),
                    detail = %panic_message(payload.as_ref()),
                    "pipeline panicked, recovering"
                );
                self.recover(pickup, drop)
            }
        }
    }

    fn run(
        &self,
        pickup: &str,
        drop: &str,
        stage: &Cell<Stage>,
    ) -> Result<Estimate, StageFailure> {
        let enter = |next: Stage| {
            debug!(from = %stage.get(), to = %next, "stage");
            stage.set(next);
        };

        enter(Stage::ResolvingPickup);
        let from = self
            .geo
            .resolve(pickup)
            .map_err(|e| not_found(e, Stage::ResolvingPickup))?;

        if self.geo.is_online() {
            std::thread::sleep(self.spacing);
        }

        enter(Stage::ResolvingDrop);
        let to = self
            .geo
            .resolve(drop)
            .map_err(|e| not_found(e, Stage::ResolvingDrop))?;

        enter(Stage::Routing);
        let routed = self.router.resolve(from.coordinate, to.coordinate);

        enter(Stage::Computing);
        let is_estimated = from.source.is_fallback()
            || to.source.is_fallback()
            || routed.source == RouteSource::Haversine;
        let estimate = self.price(from.coordinate, to.coordinate, routed.route, is_estimated);
        estimate.check().map_err(|detail| StageFailure::Defect {
            stage: Stage::Computing,
            detail,
        })?;
        Ok(estimate)
    }

    /// Terminal safety net: gazetteer for both ends, great-circle route, no
    /// external calls. Always flagged as estimated. The route is not floored;
    /// two ends on one centroid price as a 12 km, 30 minute trip.
    pub fn recover(&self, pickup: &str, drop: &str) -> Result<Estimate, EstimateError> {
        debug!(to = %Stage::Recovering, "stage");
        let from = self.geo.lookup_gazetteer(pickup);
        let to = self.geo.lookup_gazetteer(drop);
        let (Some(from), Some(to)) = (from, to) else {
            warn!(pickup, drop, "recovery could not place both ends");
            return Err(EstimateError::Unresolvable);
        };

        let route = recovery_route(from.coordinate, to.coordinate);
        let estimate = self.price(from.coordinate, to.coordinate, route, true);
        info!(
            pickup,
            drop,
            distance_km = estimate.route.distance_km,
            "recovered estimate"
        );
        Ok(estimate)
    }

    fn price(
        &self,
        pickup: Coordinate,
        drop: Coordinate,
        route: RouteResult,
        is_estimated: bool,
    ) -> Estimate {
        let surge = self.surge.current_multiplier();
        let fares = self.fares.compute(route.distance_km, route.duration_min, surge);
        Estimate {
            pickup,
            drop,
            is_outstation: is_outstation(route.distance_km),
            route,
            surge_multiplier: surge,
            fares,
            is_estimated,
        }
    }
}

fn validate<'a>(pickup: &'a str, drop: &'a str) -> Result<(&'a str, &'a str), EstimateError> {
    let (pickup, drop) = (pickup.trim(), drop.trim());
    if pickup.is_empty() || drop.is_empty() {
        return Err(EstimateError::EmptyInput);
    }
    Ok((pickup, drop))
}

/// The resolver only reports `NotFound`; anything else is a defect.
fn not_found(e: GeoError, stage: Stage) -> StageFailure {
    match e {
        GeoError::NotFound(query) => StageFailure::NotFound(query),
        other => StageFailure::Defect {
            stage,
            detail: other.to_string(),
        },
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fare::{min_fare, Provider, OUTSTATION_FACTOR};
    use crate::geo::providers::Geocoder;
    use crate::geo::resolver::test_support::{DownGeocoder, ScriptedGeocoder};
    use crate::geo::types::GeocodeCandidate;
    use crate::geo::{Gazetteer, PlaceSpec};
    use crate::route::osrm::RawRoute;
    use crate::route::resolver::test_support::{DownRouter, FixedRouter};
    use crate::route::RouteProvider;
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;
    use std::time::Instant;

    struct PanickingGeocoder;

    impl Geocoder for PanickingGeocoder {
        fn search(
            &self,
            _: &str,
            _: usize,
            _: Duration,
        ) -> Result<Vec<GeocodeCandidate>, GeoError> {
            panic!("geocoder bug");
        }
    }

    fn pipeline(
        geocoder: Option<Arc<dyn Geocoder>>,
        router: Option<Arc<dyn RouteProvider>>,
    ) -> EstimationPipeline {
        EstimationPipeline::new(
            GeoResolver::new(Arc::new(Gazetteer::builtin()), geocoder),
            RouteResolver::new(router),
            SurgePolicy::default(),
        )
    }

    fn offline() -> EstimationPipeline {
        pipeline(None, None)
    }

    fn fixed_router(distance_m: f64, duration_s: f64) -> Arc<dyn RouteProvider> {
        Arc::new(FixedRouter(RawRoute {
            distance_m,
            duration_s,
            path: None,
        }))
    }

    #[test]
    fn test_empty_input_rejected() {
        let p = offline();
        assert_eq!(p.estimate("   ", "Salem"), Err(EstimateError::EmptyInput));
        assert_eq!(p.estimate("Chennai", ""), Err(EstimateError::EmptyInput));
    }

    #[test]
    fn test_unknown_pickup_names_input() {
        let err = offline().estimate(" xyznowhere ", "Salem").unwrap_err();
        assert_eq!(err, EstimateError::InvalidLocation("xyznowhere".into()));
        assert_eq!(
            err.to_string(),
            "Could not find location: xyznowhere. Please try a more specific address."
        );
    }

    #[test]
    fn test_unknown_drop_names_input() {
        let err = offline().estimate("Salem", "atlantis").unwrap_err();
        assert_eq!(err, EstimateError::InvalidLocation("atlantis".into()));
    }

    #[test]
    fn test_chennai_to_salem_with_services_down() {
        let geo: Arc<dyn Geocoder> = Arc::new(DownGeocoder);
        let p = pipeline(Some(geo), Some(Arc::new(DownRouter)));
        let started = Instant::now();
        let est = p.estimate("Chennai", "Salem").unwrap();
        assert!(started.elapsed() >= GEOCODE_SPACING);

        assert!(est.is_estimated);
        assert!(est.is_outstation);
        assert!(est.route.distance_km > 250.0 && est.route.distance_km < 300.0);
        assert_eq!(est.route.geometry, vec![est.pickup, est.drop]);

        let d = est.route.distance_km;
        let t = est.route.duration_min;
        let raw = 60.0 + d * 11.0 + t * 1.0;
        let expected = raw * est.surge_multiplier * OUTSTATION_FACTOR;
        assert_abs_diff_eq!(
            est.fares.get(Provider::RedTaxi, "micro").unwrap(),
            expected,
            epsilon = 0.01
        );
    }

    #[test]
    fn test_live_services_are_authoritative() {
        let geo = Arc::new(ScriptedGeocoder::new(vec![
            ("T Nagar", "13.0418", "80.2341"),
            ("Adyar", "13.0012", "80.2565"),
        ]));
        let p = pipeline(Some(geo.clone()), Some(fixed_router(5_000.0, 900.0)));

        let est = p.estimate("T Nagar", "Adyar").unwrap();
        assert!(!est.is_estimated);
        assert!(!est.is_outstation);
        assert_eq!(geo.calls(), 2);
        assert_abs_diff_eq!(est.route.distance_km, 5.0);
        assert_abs_diff_eq!(est.route.duration_min, 15.0);

        let micro = est.fares.get(Provider::RedTaxi, "micro").unwrap();
        let expected = (130.0 * est.surge_multiplier * 100.0).round() / 100.0;
        assert_abs_diff_eq!(micro, expected, epsilon = 0.01);
    }

    #[test]
    fn test_live_geocoder_with_router_down_is_estimated() {
        let geo = Arc::new(ScriptedGeocoder::new(vec![
            ("T Nagar", "13.0418", "80.2341"),
            ("Adyar", "13.0012", "80.2565"),
        ]));
        let p = pipeline(Some(geo.clone()), Some(Arc::new(DownRouter)));

        let est = p.estimate("T Nagar", "Adyar").unwrap();
        assert_eq!(geo.calls(), 2);
        assert_abs_diff_eq!(est.pickup.lat, 13.0418);
        assert_abs_diff_eq!(est.drop.lon, 80.2565);
        assert!(est.is_estimated);
        assert_eq!(est.route.geometry, vec![est.pickup, est.drop]);
        assert!(est.to_response().estimated);
    }

    #[test]
    fn test_gazetteer_ends_with_live_router_is_estimated() {
        let geo: Arc<dyn Geocoder> = Arc::new(DownGeocoder);
        let p = pipeline(Some(geo), Some(fixed_router(9_670.0, 1_260.0)));

        let est = p.estimate("Coimbatore Airport", "Coimbatore").unwrap();
        assert_abs_diff_eq!(est.pickup.lat, 11.0308);
        assert_abs_diff_eq!(est.drop.lat, 11.0168);
        assert_abs_diff_eq!(est.route.distance_km, 9.67);
        assert_abs_diff_eq!(est.route.duration_min, 21.0);
        assert!(est.is_estimated);
        assert!(est.to_response().estimated);
    }

    #[test]
    fn test_offline_is_always_estimated() {
        let est = offline()
            .estimate("Coimbatore Airport", "PSG Institute of Technology")
            .unwrap();
        assert!(est.is_estimated);
        assert_abs_diff_eq!(est.pickup.lat, 11.0308);
        assert!(!est.is_outstation);
        for q in est.fares.quotes() {
            assert!(q.price >= min_fare(q.vehicle_class));
        }
    }

    #[test]
    fn test_same_centroid_is_floored() {
        let est = offline()
            .estimate("Salem bus stand", "Salem railway station")
            .unwrap();
        assert_abs_diff_eq!(est.route.distance_km, 5.0);
        assert!(est.route.duration_min >= 5.0);
    }

    #[test]
    fn test_panic_recovers_from_gazetteer() {
        let geo: Arc<dyn Geocoder> = Arc::new(PanickingGeocoder);
        let p = pipeline(Some(geo), Some(Arc::new(DownRouter)));
        let est = p.estimate("Bangalore", "Bangalore Airport").unwrap();
        assert!(est.is_estimated);
        assert_abs_diff_eq!(est.drop.lat, 13.1986);
        assert_eq!(est.route.geometry.len(), 2);
    }

    #[test]
    fn test_panic_without_gazetteer_match_is_unresolvable() {
        let p = pipeline(Some(Arc::new(PanickingGeocoder)), None);
        assert_eq!(
            p.estimate("Chennai", "xyznowhere"),
            Err(EstimateError::Unresolvable)
        );
    }

    #[test]
    fn test_recover_stage_directly() {
        let p = offline();
        let est = p.recover("mumbai", "delhi").unwrap();
        assert!(est.is_estimated);
        assert!(est.is_outstation);
        assert_eq!(p.recover("mumbai", "gotham"), Err(EstimateError::Unresolvable));
    }

    #[test]
    fn test_recover_same_centroid_uses_fixed_distance() {
        let est = offline()
            .recover("Salem bus stand", "Salem junction")
            .unwrap();
        assert_abs_diff_eq!(est.route.distance_km, 12.0);
        assert_abs_diff_eq!(est.route.duration_min, 30.0);
        assert!(!est.is_outstation);
        assert_eq!(est.route.geometry, vec![est.pickup, est.drop]);
    }

    #[test]
    fn test_recover_short_trip_is_not_floored() {
        let extra = [PlaceSpec {
            name: "gandhipuram".into(),
            patterns: vec![vec!["gandhipuram".into()]],
            lat: 11.0183,
            lon: 76.9725,
        }];
        let gazetteer = Arc::new(Gazetteer::with_extra(&extra).unwrap());
        let p = EstimationPipeline::new(
            GeoResolver::new(gazetteer, None),
            RouteResolver::new(None),
            SurgePolicy::default(),
        );

        let est = p.recover("Gandhipuram", "Coimbatore").unwrap();
        // ~1.83 km great-circle; stays below the 5 km floor used elsewhere.
        assert!(est.route.distance_km > 1.5 && est.route.distance_km < 2.0);
        assert_abs_diff_eq!(est.route.duration_min, 15.0);
        assert!(est.is_estimated);
    }

    #[test]
    fn test_panic_on_same_centroid_recovers_with_fixed_distance() {
        let p = pipeline(Some(Arc::new(PanickingGeocoder)), None);
        let est = p.estimate("Coimbatore", "Kovai").unwrap();
        assert_abs_diff_eq!(est.route.distance_km, 12.0);
        assert_abs_diff_eq!(est.route.duration_min, 30.0);
    }

    #[test]
    fn test_spacing_cannot_shrink() {
        let p = offline().with_spacing(Duration::from_millis(10));
        assert_eq!(p.spacing, GEOCODE_SPACING);
        let p = offline().with_spacing(Duration::from_secs(2));
        assert_eq!(p.spacing, Duration::from_secs(2));
    }

    #[test]
    fn test_response_shape() {
        let est = offline().estimate("Chennai", "Salem").unwrap();
        let json = serde_json::to_value(est.to_response()).unwrap();
        assert_eq!(json["pickup"]["lat"], 13.0827);
        assert_eq!(json["routeGeoJson"]["type"], "LineString");
        assert_eq!(json["routeGeoJson"]["coordinates"][0][0], 80.2707);
        assert_eq!(json["estimated"], true);
        assert_eq!(json["isOutstation"], true);
        assert!(json["fares"]["redTaxi"]["micro"].is_number());
        let d = json["distanceKm"].as_f64().unwrap();
        assert_abs_diff_eq!(d, (d * 100.0).round() / 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_defect_check() {
        let mut est = offline().estimate("Chennai", "Salem").unwrap();
        assert!(est.check().is_ok());
        est.route.distance_km = f64::INFINITY;
        assert!(est.check().is_err());
    }
}
