//! Time-of-day surge pricing.

use chrono::{Local, Timelike, Utc};
use chrono_tz::Tz;

/// Hard ceiling, whatever the bands say.
pub const MAX_SURGE: f64 = 2.0;
pub const PEAK_SURGE: f64 = 1.3;
pub const NIGHT_SURGE: f64 = 1.2;

/// Derives the demand multiplier from the local hour.
#[derive(Debug, Clone, Copy, Default)]
pub struct SurgePolicy {
    /// `None` reads the host's local clock.
    tz: Option<Tz>,
}

impl SurgePolicy {
    pub fn new(tz: Option<Tz>) -> Self {
        Self { tz }
    }

    pub fn current_hour(&self) -> u32 {
        match self.tz {
            Some(tz) => Utc::now().with_timezone(&tz).hour(),
            None => Local::now().hour(),
        }
    }

    pub fn current_multiplier(&self) -> f64 {
        Self::multiplier_for_hour(self.current_hour())
    }

    /// Morning and evening peaks 08–10 and 17–20, nights 22–05, inclusive.
    pub fn multiplier_for_hour(hour: u32) -> f64 {
        let surge = match hour {
            8..=10 | 17..=20 => PEAK_SURGE,
            h if h >= 22 || h <= 5 => NIGHT_SURGE,
            _ => 1.0,
        };
        surge.min(MAX_SURGE)
    }
}
