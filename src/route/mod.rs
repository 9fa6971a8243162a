//! Driving distance, duration and path between two coordinates.

pub mod osrm;
pub mod resolver;
pub mod types;

pub use osrm::{OsrmClient, RawRoute, RouteProvider};
pub use resolver::{
    apply_floors, estimate_route, haversine_km, recovery_route, ResolvedRoute, RouteResolver,
};
pub use types::{GeoJsonLine, RouteError, RouteResult, RouteSource};
