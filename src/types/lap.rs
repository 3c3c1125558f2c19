//! Lap records and per-driver aggregates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed lap, immutable once written.
///
/// The identity key ([`Lap::key`]) is globally unique across all time; the
/// store rejects resubmissions of the same key as no-ops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lap {
    /// Session this lap was driven in
    pub session_id: String,
    /// Driver display name as reported by the timing hardware
    pub driver_name: String,
    /// Kart number
    pub kart_number: u32,
    /// 1-based lap number within the session
    pub lap_number: u32,
    /// Lap time in integer milliseconds
    pub lap_time_ms: u64,
    /// When the feed tick carrying this lap was normalized
    pub recorded_at: DateTime<Utc>,
}

impl Lap {
    /// The dedup identity key for this lap.
    pub fn key(&self) -> LapKey {
        LapKey {
            session_id: self.session_id.clone(),
            driver_name: self.driver_name.clone(),
            kart_number: self.kart_number,
            lap_number: self.lap_number,
        }
    }
}

/// Identity key of a [`Lap`], used to reject resubmitted feed ticks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LapKey {
    pub session_id: String,
    pub driver_name: String,
    pub kart_number: u32,
    pub lap_number: u32,
}

/// Accumulated per-driver record of all laps and the derived best time.
///
/// Mutated only by the ingestion store, which serializes appends for the same
/// driver. `best_time_ms` always equals the minimum lap time over `laps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverRaceAggregate {
    pub driver_name: String,
    /// Append-only, kept ordered by lap number (then kart, then session)
    pub laps: Vec<Lap>,
    pub best_time_ms: u64,
    pub last_update: DateTime<Utc>,
}

impl DriverRaceAggregate {
    /// Create an empty aggregate. The store calls [`Self::apply`] with the
    /// first accepted lap immediately after; an empty aggregate is never
    /// exposed to readers.
    pub fn new(driver_name: impl Into<String>) -> Self {
        Self {
            driver_name: driver_name.into(),
            laps: Vec::new(),
            best_time_ms: 0,
            last_update: Utc::now(),
        }
    }

    /// Append a lap in lap-number order and recompute the derived fields.
    ///
    /// The feed may deliver laps out of order; insertion is by lap number,
    /// not arrival order. Deduplication happens in the store before this is
    /// called.
    pub fn apply(&mut self, lap: Lap) {
        let at = self.laps.partition_point(|existing| {
            (existing.lap_number, existing.kart_number, existing.session_id.as_str())
                <= (lap.lap_number, lap.kart_number, lap.session_id.as_str())
        });
        self.laps.insert(at, lap);

        self.best_time_ms =
            self.laps.iter().map(|l| l.lap_time_ms).min().unwrap_or(self.best_time_ms);
        self.last_update = Utc::now();
    }

    /// Total laps recorded for this driver.
    pub fn total_laps(&self) -> usize {
        self.laps.len()
    }
}
