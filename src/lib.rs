//! Cab Compare — ride fare estimates across RedTaxi, Ola and Uber.
//!
//! Free-text pickup/drop → coordinates (Nominatim, then a built-in
//! gazetteer) → route (OSRM, then a great-circle estimate) → a surge- and
//! outstation-aware fare table. Degraded results are flagged as estimates.

pub mod config;
pub mod fare;
pub mod geo;
pub mod logging;
pub mod pipeline;
pub mod route;
pub mod server;

pub use pipeline::{Estimate, EstimateError, EstimateResponse, EstimationPipeline};
