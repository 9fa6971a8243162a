//! Fare engine: distance/duration/surge → per-provider, per-class prices.
//!
//! `fare = max(raw · surge · outstation, min_fare[class])`, rounded to paise,
//! where `raw = base + km · per_km + min · per_min`.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Trips strictly longer than this are outstation.
pub const OUTSTATION_THRESHOLD_KM: f64 = 40.0;
pub const OUTSTATION_FACTOR: f64 = 1.15;
/// Floor for a class missing from [`MIN_FARES`].
pub const DEFAULT_MIN_FARE: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Provider {
    RedTaxi,
    Ola,
    Uber,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RedTaxi => write!(f, "RedTaxi"),
            Self::Ola => write!(f, "Ola"),
            Self::Uber => write!(f, "Uber"),
        }
    }
}

struct Rate {
    class: &'static str,
    base: f64,
    per_km: f64,
    per_min: f64,
}

const fn rate(class: &'static str, base: f64, per_km: f64, per_min: f64) -> Rate {
    Rate {
        class,
        base,
        per_km,
        per_min,
    }
}

const RATE_CARD: &[(Provider, &[Rate])] = &[
    (
        Provider::RedTaxi,
        &[
            rate("micro", 60.0, 11.0, 1.0),
            rate("sedan", 80.0, 14.0, 1.5),
            rate("suv", 100.0, 18.0, 2.0),
        ],
    ),
    (
        Provider::Ola,
        &[
            rate("mini", 50.0, 12.0, 1.0),
            rate("primeSedan", 75.0, 15.0, 1.5),
            rate("primeSUV", 95.0, 20.0, 2.0),
            rate("auto", 30.0, 9.0, 0.8),
        ],
    ),
    (
        Provider::Uber,
        &[
            rate("uberGo", 55.0, 13.0, 1.0),
            rate("premier", 85.0, 16.0, 1.5),
            rate("uberXL", 100.0, 19.0, 2.0),
            rate("auto", 35.0, 10.0, 0.8),
        ],
    ),
];

/// Keyed by class name alone; Ola and Uber autos share a floor.
const MIN_FARES: &[(&str, f64)] = &[
    ("micro", 60.0),
    ("sedan", 80.0),
    ("suv", 100.0),
    ("mini", 50.0),
    ("primeSedan", 75.0),
    ("primeSUV", 95.0),
    ("auto", 30.0),
    ("uberGo", 55.0),
    ("premier", 85.0),
    ("uberXL", 100.0),
];

pub fn min_fare(class: &str) -> f64 {
    MIN_FARES
        .iter()
        .find(|(c, _)| *c == class)
        .map(|(_, fare)| *fare)
        .unwrap_or(DEFAULT_MIN_FARE)
}

pub fn is_outstation(distance_km: f64) -> bool {
    distance_km > OUTSTATION_THRESHOLD_KM
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FareQuote {
    pub provider: Provider,
    pub vehicle_class: &'static str,
    pub price: f64,
}

/// All quotes for one trip. Serialises as `{provider: {class: price}}`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FareTable {
    quotes: Vec<FareQuote>,
}

impl FareTable {
    pub fn quotes(&self) -> &[FareQuote] {
        &self.quotes
    }

    pub fn get(&self, provider: Provider, class: &str) -> Option<f64> {
        self.quotes
            .iter()
            .find(|q| q.provider == provider && q.vehicle_class == class)
            .map(|q| q.price)
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

impl Serialize for FareTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut nested: BTreeMap<Provider, BTreeMap<&str, f64>> = BTreeMap::new();
        for q in &self.quotes {
            nested
                .entry(q.provider)
                .or_default()
                .insert(q.vehicle_class, q.price);
        }
        nested.serialize(serializer)
    }
}

/// Applies the static rate card.
#[derive(Debug, Clone, Copy, Default)]
pub struct FareEngine;

impl FareEngine {
    /// Inputs are finite and non-negative; the pipeline guarantees it.
    pub fn compute(&self, distance_km: f64, duration_min: f64, surge: f64) -> FareTable {
        let outstation = if is_outstation(distance_km) {
            OUTSTATION_FACTOR
        } else {
            1.0
        };

        let quotes = RATE_CARD
            .iter()
            .flat_map(|(provider, rates)| rates.iter().map(move |r| (*provider, r)))
            .map(|(provider, r)| {
                let raw = r.base + distance_km * r.per_km + duration_min * r.per_min;
                let after_surge = raw * surge * outstation;
                FareQuote {
                    provider,
                    vehicle_class: r.class,
                    price: round2(after_surge.max(min_fare(r.class))),
                }
            })
            .collect();

        FareTable { quotes }
    }
}
