//! Persistence contracts for laps, aggregates and ranking snapshots.
//!
//! [`TimingStore`] is the seam real backends implement; higher layers (the
//! ingestion service, the ranking engine) depend on this abstraction, not on
//! any concrete storage. The bundled [`MemoryTimingStore`] is the default
//! system of record and the reference for the contract's semantics.

pub mod memory;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::Result;
use crate::types::{DriverRaceAggregate, KartRankingSnapshot, Lap};

pub use memory::MemoryTimingStore;

/// Result of one ingestion attempt.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// `false` means the lap's identity key already existed; the call was a
    /// defined no-op, not an error.
    pub accepted: bool,
    /// The driver's aggregate after the call (unchanged when deduplicated).
    pub aggregate: DriverRaceAggregate,
}

/// Abstraction over the live-timing system of record.
///
/// Implementations must uphold the contract of §each method; in particular
/// ingestion must serialize appends for the same driver while letting
/// different drivers proceed independently, and duplicate identity keys must
/// deduplicate to no-ops.
#[async_trait::async_trait]
pub trait TimingStore: Send + Sync + 'static {
    /// Upsert one lap into its driver's aggregate, at most once per identity
    /// key.
    async fn ingest(&self, lap: Lap) -> Result<IngestOutcome>;

    /// Current aggregate for a driver, or `None` when no lap was ever
    /// accepted for them.
    async fn driver_aggregate(&self, driver_name: &str) -> Result<Option<DriverRaceAggregate>>;

    /// All laps with `recorded_at` inside `[from, to]`, in no particular
    /// order. Ranking input; tolerates eventual consistency with concurrent
    /// ingestion.
    async fn laps_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Lap>>;

    /// Persist a freshly computed snapshot as a new record. Prior snapshots
    /// are never updated in place.
    async fn put_snapshot(
        &self,
        snapshot: KartRankingSnapshot,
    ) -> Result<Arc<KartRankingSnapshot>>;

    /// Latest snapshot for a period label, or `None` when no run ever
    /// completed.
    async fn latest_snapshot(&self, period: &str) -> Result<Option<Arc<KartRankingSnapshot>>>;
}
