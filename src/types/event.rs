//! Events fanned out to live viewers.

use serde::{Deserialize, Serialize};

use super::{DriverRaceAggregate, SnapshotSummary};

/// One update pushed to every registered viewer connection.
///
/// Per-connection delivery order matches broadcast order; no ordering is
/// promised across connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BroadcastEvent {
    /// A new lap was accepted into a driver's aggregate
    LapIngested { aggregate: DriverRaceAggregate },
    /// A ranking run produced a fresh snapshot
    RankingUpdated { summary: SnapshotSummary },
}

impl BroadcastEvent {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BroadcastEvent::LapIngested { .. } => "lap_ingested",
            BroadcastEvent::RankingUpdated { .. } => "ranking_updated",
        }
    }
}
