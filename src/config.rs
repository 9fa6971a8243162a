//! Settings: defaults, then an optional JSON file, then CLI flags.
//!
//! Default file location: `<config dir>/cab-compare/config.json`
//! (e.g. `~/.config/cab-compare/config.json` on Linux).

use crate::fare::SurgePolicy;
use crate::geo::{
    Gazetteer, GazetteerError, GeoResolver, Geocoder, NominatimClient, PlaceSpec,
};
use crate::pipeline::{EstimationPipeline, GEOCODE_SPACING};
use crate::route::{OsrmClient, RouteProvider, RouteResolver};
use chrono_tz::Tz;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown timezone '{0}'. Use IANA format (e.g. Asia/Kolkata).")]
    InvalidTimezone(String),
    #[error(transparent)]
    InvalidEntry(#[from] GazetteerError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub geocoder_url: String,
    pub router_url: String,
    pub user_agent: String,
    pub geocode_timeout_secs: u64,
    pub suggest_timeout_secs: u64,
    pub route_timeout_secs: u64,
    pub geocode_spacing_ms: u64,
    /// IANA name for the surge clock; host local time when unset.
    pub timezone: Option<String>,
    /// Gazetteer and great-circle routing only.
    pub offline: bool,
    pub log_level: String,
    /// Extra gazetteer entries, matched before the built-in ones.
    pub gazetteer: Vec<PlaceSpec>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            geocoder_url: "https://nominatim.openstreetmap.org".into(),
            router_url: "https://router.project-osrm.org".into(),
            user_agent: "CabCompareFareApp/1.0 (Rust; fare estimation)".into(),
            geocode_timeout_secs: 10,
            suggest_timeout_secs: 8,
            route_timeout_secs: 10,
            geocode_spacing_ms: GEOCODE_SPACING.as_millis() as u64,
            timezone: None,
            offline: false,
            log_level: "info".into(),
            gazetteer: Vec::new(),
        }
    }
}

impl Settings {
    /// Load from `explicit`, or from the default path if that file exists,
    /// or fall back to defaults. Only an explicit path must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::load_from(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("cab-compare").join("config.json"))
    }

    pub fn timezone(&self) -> Result<Option<Tz>, ConfigError> {
        self.timezone
            .as_deref()
            .map(|name| {
                name.parse::<Tz>()
                    .map_err(|_| ConfigError::InvalidTimezone(name.to_string()))
            })
            .transpose()
    }

    pub fn gazetteer(&self) -> Result<Gazetteer, ConfigError> {
        Ok(Gazetteer::with_extra(&self.gazetteer)?)
    }

    /// Never below the geocoder's usage-policy minimum.
    pub fn geocode_spacing(&self) -> Duration {
        Duration::from_millis(self.geocode_spacing_ms).max(GEOCODE_SPACING)
    }

    /// Wire up the pipeline. Offline settings construct no HTTP clients.
    pub fn build_pipeline(&self) -> Result<EstimationPipeline, ConfigError> {
        let gazetteer = Arc::new(self.gazetteer()?);
        let surge = SurgePolicy::new(self.timezone()?);

        let geocoder: Option<Arc<dyn Geocoder>> = if self.offline {
            None
        } else {
            Some(Arc::new(NominatimClient::new(&self.geocoder_url, &self.user_agent)))
        };
        let router: Option<Arc<dyn RouteProvider>> = if self.offline {
            None
        } else {
            Some(Arc::new(OsrmClient::new(&self.router_url, &self.user_agent)))
        };

        let geo = GeoResolver::new(gazetteer, geocoder).with_timeouts(
            Duration::from_secs(self.geocode_timeout_secs),
            Duration::from_secs(self.suggest_timeout_secs),
        );
        let routes = RouteResolver::new(router)
            .with_timeout(Duration::from_secs(self.route_timeout_secs));

        Ok(EstimationPipeline::new(geo, routes, surge).with_spacing(self.geocode_spacing()))
    }
}
