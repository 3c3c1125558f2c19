//! Kart ranking snapshots.
//!
//! A snapshot is produced wholesale by one ranking run and never mutated
//! afterwards; the next run supersedes it with a fresh record. Readers always
//! see the latest complete snapshot, never a partial run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive date range a snapshot was computed over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// One kart's entry in a ranking snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KartRanking {
    /// Dense 1-based rank, consistent with the snapshot's sort order
    pub position: u32,
    pub kart_number: u32,
    /// Arithmetic mean of `top10_times_ms`, rounded to the nearest millisecond
    pub avg_top10_time_ms: u64,
    pub best_time_ms: u64,
    /// All laps this kart drove inside the snapshot window
    pub total_laps: u32,
    /// Ascending-sorted fastest laps in the window, at most 10
    pub top10_times_ms: Vec<u64>,
}

/// Immutable result of one ranking run over a rolling window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KartRankingSnapshot {
    pub generated_at: DateTime<Utc>,
    /// Rolling-window label, e.g. `"30d"`
    pub period: String,
    pub date_range: DateRange,
    /// Count of karts that appear in `rankings`
    pub total_karts_analyzed: u32,
    /// Sorted ascending by `avg_top10_time_ms` (ties: best time, then lap count)
    pub rankings: Vec<KartRanking>,
}

impl KartRankingSnapshot {
    /// Minutes elapsed between generation and `now`.
    pub fn age_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.generated_at).num_minutes()
    }

    /// The fastest kart in this snapshot, if any kart qualified.
    pub fn leader(&self) -> Option<&KartRanking> {
        self.rankings.first()
    }

    /// Condensed form for fan-out; the full snapshot stays behind the read
    /// endpoint.
    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            generated_at: self.generated_at,
            period: self.period.clone(),
            total_karts_analyzed: self.total_karts_analyzed,
            leader_kart: self.leader().map(|r| r.kart_number),
        }
    }
}

/// What live viewers receive when a new snapshot lands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub generated_at: DateTime<Utc>,
    pub period: String,
    pub total_karts_analyzed: u32,
    pub leader_kart: Option<u32>,
}
