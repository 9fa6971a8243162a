//! Built-in fallback gazetteer.
//!
//! An ordered list of (pattern, coordinate) entries. Evaluation is first
//! match wins, so compound landmarks ("coimbatore airport") sit ahead of the
//! bare city names they contain.

use super::types::{Coordinate, CoordinateError, Suggestion};
use serde::Deserialize;

struct BuiltinPlace {
    name: &'static str,
    /// Alternatives; the terms of one alternative must occur in this order.
    patterns: &'static [&'static [&'static str]],
    lat: f64,
    lon: f64,
}

const BUILTIN_PLACES: &[BuiltinPlace] = &[
    BuiltinPlace {
        name: "coimbatore airport",
        patterns: &[&["coimbatore", "airport"], &["airport", "coimbatore"]],
        lat: 11.0308,
        lon: 77.0432,
    },
    BuiltinPlace {
        name: "chennai airport",
        patterns: &[
            &["chennai", "airport"],
            &["airport", "chennai"],
            &["madras", "airport"],
        ],
        lat: 12.9944,
        lon: 80.1807,
    },
    BuiltinPlace {
        name: "bangalore airport",
        patterns: &[
            &["bangalore", "airport"],
            &["airport", "bangalore"],
            &["bengaluru", "airport"],
        ],
        lat: 13.1986,
        lon: 77.7066,
    },
    BuiltinPlace {
        name: "psg tech",
        patterns: &[&["psg", "institute"], &["psg", "technology"]],
        lat: 11.0168,
        lon: 76.9558,
    },
    BuiltinPlace {
        name: "coimbatore",
        patterns: &[&["coimbatore"], &["kovai"]],
        lat: 11.0168,
        lon: 76.9558,
    },
    BuiltinPlace {
        name: "chennai",
        patterns: &[&["chennai"], &["madras"]],
        lat: 13.0827,
        lon: 80.2707,
    },
    BuiltinPlace {
        name: "salem",
        patterns: &[&["salem"]],
        lat: 11.6643,
        lon: 78.146,
    },
    BuiltinPlace {
        name: "bangalore",
        patterns: &[&["bangalore"], &["bengaluru"]],
        lat: 12.9716,
        lon: 77.5946,
    },
    BuiltinPlace {
        name: "mumbai",
        patterns: &[&["mumbai"], &["bombay"]],
        lat: 19.076,
        lon: 72.8777,
    },
    BuiltinPlace {
        name: "delhi",
        patterns: &[&["delhi"], &["new delhi"]],
        lat: 28.6139,
        lon: 77.209,
    },
    BuiltinPlace {
        name: "hyderabad",
        patterns: &[&["hyderabad"]],
        lat: 17.385,
        lon: 78.4867,
    },
];

/// An extra entry supplied through the settings file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlaceSpec {
    pub name: String,
    /// `[["salem", "junction"]]` matches "Salem Junction" but not "Junction Road, Salem".
    pub patterns: Vec<Vec<String>>,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GazetteerEntry {
    pub name: String,
    patterns: Vec<Vec<String>>,
    pub coordinate: Coordinate,
}

impl GazetteerEntry {
    pub fn new(
        name: impl Into<String>,
        patterns: Vec<Vec<String>>,
        coordinate: Coordinate,
    ) -> Result<Self, GazetteerError> {
        let name = name.into();
        let patterns: Vec<Vec<String>> = patterns
            .into_iter()
            .map(|alt| {
                alt.into_iter()
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|alt| !alt.is_empty())
            .collect();
        if patterns.is_empty() {
            return Err(GazetteerError::EmptyPattern(name));
        }
        Ok(Self {
            name,
            patterns,
            coordinate,
        })
    }

    /// Case-insensitive. `lowered` must already be lowercase.
    fn matches(&self, lowered: &str) -> bool {
        self.patterns.iter().any(|alt| terms_in_order(lowered, alt))
    }
}

/// Each term must start after the end of the previous one, like `a.*b`.
fn terms_in_order(haystack: &str, terms: &[String]) -> bool {
    let mut from = 0;
    for term in terms {
        match haystack.get(from..).and_then(|rest| rest.find(term.as_str())) {
            Some(at) => from += at + term.len(),
            None => return false,
        }
    }
    true
}

#[derive(Debug, thiserror::Error)]
pub enum GazetteerError {
    #[error("gazetteer entry '{0}' has no usable pattern")]
    EmptyPattern(String),
    #[error("gazetteer entry '{name}': {source}")]
    Coordinate {
        name: String,
        #[source]
        source: CoordinateError,
    },
}

/// Process-wide, read-only fallback table.
#[derive(Debug, Clone)]
pub struct Gazetteer {
    entries: Vec<GazetteerEntry>,
}

impl Gazetteer {
    /// The built-in Indian city and landmark list.
    pub fn builtin() -> Self {
        let entries = BUILTIN_PLACES
            .iter()
            .map(|p| GazetteerEntry {
                name: p.name.to_string(),
                patterns: p
                    .patterns
                    .iter()
                    .map(|alt| alt.iter().map(|t| t.to_string()).collect())
                    .collect(),
                coordinate: Coordinate {
                    lat: p.lat,
                    lon: p.lon,
                },
            })
            .collect();
        Self { entries }
    }

    /// Built-in list with `extra` entries placed ahead of it, in order.
    pub fn with_extra(extra: &[PlaceSpec]) -> Result<Self, GazetteerError> {
        let mut entries = Vec::with_capacity(extra.len() + BUILTIN_PLACES.len());
        for spec in extra {
            let coordinate = Coordinate::new(spec.lat, spec.lon).map_err(|source| {
                GazetteerError::Coordinate {
                    name: spec.name.clone(),
                    source,
                }
            })?;
            entries.push(GazetteerEntry::new(
                spec.name.clone(),
                spec.patterns.clone(),
                coordinate,
            )?);
        }
        entries.extend(Self::builtin().entries);
        Ok(Self { entries })
    }

    /// First entry whose pattern matches `query`.
    pub fn lookup(&self, query: &str) -> Option<&GazetteerEntry> {
        let q = query.to_lowercase();
        self.entries.iter().find(|e| e.matches(&q))
    }

    /// Every matching entry, in priority order, as autocomplete entries.
    pub fn suggestions(&self, query: &str, limit: usize) -> Vec<Suggestion> {
        let q = query.to_lowercase();
        self.entries
            .iter()
            .filter(|e| e.matches(&q) || e.name.contains(q.as_str()))
            .take(limit)
            .map(|e| Suggestion {
                id: format!("builtin:{}", e.name),
                label: e.name.clone(),
                lat: e.coordinate.lat,
                lon: e.coordinate.lon,
            })
            .collect()
    }

    pub fn entries(&self) -> &[GazetteerEntry] {
        &self.entries
    }
}

impl Default for Gazetteer {
    fn default() -> Self {
        Self::builtin()
    }
}
