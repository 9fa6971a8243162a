//! Pricing: surge policy and the multi-provider fare engine.

pub mod engine;
pub mod surge;

pub use engine::{
    is_outstation, min_fare, FareEngine, FareQuote, FareTable, Provider, OUTSTATION_FACTOR,
    OUTSTATION_THRESHOLD_KM,
};
pub use surge::SurgePolicy;
