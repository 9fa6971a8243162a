//! Location resolver — geocoder first, gazetteer second.
//!
//! Resolve flow:  Nominatim (1 result) → built-in gazetteer → NotFound
//! Suggest flow:  Nominatim (8 results) → empty list

use super::gazetteer::Gazetteer;
use super::providers::Geocoder;
use super::types::{Coordinate, GeoError, LocationSource, ResolvedLocation, Suggestion};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);
pub const SUGGEST_TIMEOUT: Duration = Duration::from_secs(8);
pub const SUGGEST_LIMIT: usize = 8;
/// Autocomplete queries shorter than this are answered with nothing.
pub const SUGGEST_MIN_CHARS: usize = 2;

/// Resolves free text to a coordinate with a gazetteer fallback.
#[derive(Clone)]
pub struct GeoResolver {
    geocoder: Option<Arc<dyn Geocoder>>,
    gazetteer: Arc<Gazetteer>,
    resolve_timeout: Duration,
    suggest_timeout: Duration,
}

impl GeoResolver {
    /// `geocoder: None` is offline mode: gazetteer only.
    pub fn new(gazetteer: Arc<Gazetteer>, geocoder: Option<Arc<dyn Geocoder>>) -> Self {
        Self {
            geocoder,
            gazetteer,
            resolve_timeout: RESOLVE_TIMEOUT,
            suggest_timeout: SUGGEST_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, resolve: Duration, suggest: Duration) -> Self {
        self.resolve_timeout = resolve;
        self.suggest_timeout = suggest;
        self
    }

    pub fn is_online(&self) -> bool {
        self.geocoder.is_some()
    }

    /// Resolve `query` through the fallback chain. The only error is
    /// [`GeoError::NotFound`]; upstream failures are demoted to the gazetteer.
    pub fn resolve(&self, query: &str) -> Result<ResolvedLocation, GeoError> {
        let query = query.trim();

        if let Some(geocoder) = &self.geocoder {
            match geocode_first(geocoder.as_ref(), query, self.resolve_timeout) {
                Ok(coordinate) => {
                    info!(
                        query,
                        lat = coordinate.lat,
                        lon = coordinate.lon,
                        "geocoded"
                    );
                    return Ok(ResolvedLocation {
                        query: query.to_string(),
                        coordinate,
                        source: LocationSource::Geocoder,
                    });
                }
                Err(e) => warn!(query, error = %e, "geocoder failed, trying gazetteer"),
            }
        }

        match self.lookup_gazetteer(query) {
            Some(loc) => {
                info!(
                    query,
                    lat = loc.coordinate.lat,
                    lon = loc.coordinate.lon,
                    source = %loc.source,
                    "resolved from gazetteer"
                );
                Ok(loc)
            }
            None => {
                warn!(query, "location not found");
                Err(GeoError::NotFound(query.to_string()))
            }
        }
    }

    /// Gazetteer-only resolution; never touches the network.
    pub fn lookup_gazetteer(&self, query: &str) -> Option<ResolvedLocation> {
        let query = query.trim();
        self.gazetteer.lookup(query).map(|entry| ResolvedLocation {
            query: query.to_string(),
            coordinate: entry.coordinate,
            source: LocationSource::Gazetteer(entry.name.clone()),
        })
    }

    /// Best-effort autocomplete. Never fails; any problem yields an empty list.
    pub fn suggest(&self, query: &str) -> Vec<Suggestion> {
        let query = query.trim();
        if query.chars().count() < SUGGEST_MIN_CHARS {
            return Vec::new();
        }

        let Some(geocoder) = &self.geocoder else {
            return self.gazetteer.suggestions(query, SUGGEST_LIMIT);
        };

        match geocoder.search(query, SUGGEST_LIMIT, self.suggest_timeout) {
            Ok(candidates) => candidates
                .into_iter()
                .enumerate()
                .filter(|(_, c)| !c.display_name.is_empty())
                .filter_map(|(i, c)| {
                    let coordinate = Coordinate::parse(&c.lat, &c.lon).ok()?;
                    let id = c.id().unwrap_or_else(|| format!("candidate-{}", i));
                    Some(Suggestion {
                        id,
                        label: c.display_name,
                        lat: coordinate.lat,
                        lon: coordinate.lon,
                    })
                })
                .collect(),
            Err(e) => {
                warn!(query, error = %e, "suggest failed");
                Vec::new()
            }
        }
    }
}

/// One lookup, first candidate only. Empty results and unparseable
/// coordinates are failures like any network error.
fn geocode_first(
    geocoder: &dyn Geocoder,
    query: &str,
    timeout: Duration,
) -> Result<Coordinate, GeoError> {
    let candidates = geocoder.search(query, 1, timeout)?;
    let first = candidates
        .into_iter()
        .next()
        .ok_or_else(|| GeoError::NotFound(query.to_string()))?;
    Coordinate::parse(&first.lat, &first.lon)
        .map_err(|e| GeoError::InvalidResponse(e.to_string()))
}
