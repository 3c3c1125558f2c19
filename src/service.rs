//! The operations external callers invoke.
//!
//! Thin glue (HTTP routes, socket handlers, admin scripts) lives outside this
//! crate and calls into [`TimingService`]. The service owns no state of its
//! own; it wires the normalizer, the store and the broadcaster together.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, trace};

use crate::broadcast::Broadcaster;
use crate::error::{FeedError, Result};
use crate::feed::{IngestRequest, IngestResponse, Normalizer, wire};
use crate::store::TimingStore;
use crate::types::{BroadcastEvent, DriverRaceAggregate, KartRankingSnapshot};

/// Latest ranking snapshot plus how stale it is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingsView {
    pub snapshot: KartRankingSnapshot,
    pub age_minutes: i64,
}

/// Entry point for ingestion and reads.
#[derive(Clone)]
pub struct TimingService {
    normalizer: Normalizer,
    store: Arc<dyn TimingStore>,
    broadcaster: Arc<Broadcaster>,
}

impl TimingService {
    pub fn new(store: Arc<dyn TimingStore>, broadcaster: Arc<Broadcaster>) -> Self {
        Self { normalizer: Normalizer::new(), store, broadcaster }
    }

    /// Handle one inbound feed tick.
    ///
    /// Malformed records are skipped and reported; accepted laps update their
    /// driver's aggregate and are fanned out to live viewers. Callers seeing
    /// a retryable error may resubmit the identical payload: deduplication
    /// turns the overlap into no-ops.
    pub async fn process_lap_data(&self, request: IngestRequest) -> Result<IngestResponse> {
        if request.action != wire::PROCESS_LAP_DATA {
            return Err(FeedError::InvalidAction { action: request.action });
        }

        let payload = request.session_data;
        let batch = self.normalizer.normalize(&payload.name, &payload.records)?;

        let mut accepted_count = 0;
        for lap in batch.laps {
            let outcome = self.store.ingest(lap).await?;
            if outcome.accepted {
                accepted_count += 1;
                self.broadcaster
                    .broadcast(BroadcastEvent::LapIngested { aggregate: outcome.aggregate })
                    .await;
            } else {
                trace!(driver = %outcome.aggregate.driver_name, "Resubmitted lap deduplicated");
            }
        }

        info!(
            session = %payload.name,
            accepted_count,
            skipped = batch.skipped.len(),
            "Processed feed tick"
        );

        Ok(IngestResponse { success: true, accepted_count, skipped: batch.skipped })
    }

    /// Latest ranking snapshot for a period, or `None` when no ranking run
    /// has ever completed (a distinct "no data yet" condition, not an error).
    pub async fn latest_rankings(&self, period: &str) -> Result<Option<RankingsView>> {
        let snapshot = self.store.latest_snapshot(period).await?;
        Ok(snapshot.map(|snapshot| RankingsView {
            age_minutes: snapshot.age_minutes(Utc::now()),
            snapshot: (*snapshot).clone(),
        }))
    }

    /// Current aggregate for a driver, or `None` for unknown drivers.
    pub async fn driver_aggregate(&self, driver_name: &str) -> Result<Option<DriverRaceAggregate>> {
        self.store.driver_aggregate(driver_name).await
    }
}
