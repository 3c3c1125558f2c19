//! In-memory system of record.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, trace};

use super::{IngestOutcome, TimingStore};
use crate::Result;
use crate::types::{DriverRaceAggregate, KartRankingSnapshot, Lap, LapKey};

/// Per-driver state behind its own lock.
///
/// The slot mutex is the per-driver exclusive section: the dedup check, the
/// ordered append and the best-time recompute happen atomically under it, so
/// concurrent delivery of the same driver's laps never loses an update.
#[derive(Debug)]
struct DriverSlot {
    aggregate: DriverRaceAggregate,
    seen: HashSet<LapKey>,
}

/// The bundled [`TimingStore`] backend: laps and aggregates in per-driver
/// slots, snapshots in an append-only list.
///
/// Ingestion of laps for different drivers proceeds without interference;
/// the outer map lock is held only long enough to find or create a slot.
#[derive(Debug, Default)]
pub struct MemoryTimingStore {
    drivers: RwLock<HashMap<String, Arc<Mutex<DriverSlot>>>>,
    snapshots: RwLock<Vec<Arc<KartRankingSnapshot>>>,
}

impl MemoryTimingStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot_for(&self, driver_name: &str) -> Arc<Mutex<DriverSlot>> {
        {
            let drivers = self.drivers.read().await;
            if let Some(slot) = drivers.get(driver_name) {
                return Arc::clone(slot);
            }
        }

        let mut drivers = self.drivers.write().await;
        Arc::clone(drivers.entry(driver_name.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(DriverSlot {
                aggregate: DriverRaceAggregate::new(driver_name),
                seen: HashSet::new(),
            }))
        }))
    }
}

#[async_trait::async_trait]
impl TimingStore for MemoryTimingStore {
    async fn ingest(&self, lap: Lap) -> Result<IngestOutcome> {
        let slot = self.slot_for(&lap.driver_name).await;
        let mut slot = slot.lock().await;

        let key = lap.key();
        if slot.seen.contains(&key) {
            trace!(driver = %lap.driver_name, lap = lap.lap_number, "Duplicate lap, no-op");
            return Ok(IngestOutcome { accepted: false, aggregate: slot.aggregate.clone() });
        }

        slot.seen.insert(key);
        slot.aggregate.apply(lap);

        Ok(IngestOutcome { accepted: true, aggregate: slot.aggregate.clone() })
    }

    async fn driver_aggregate(&self, driver_name: &str) -> Result<Option<DriverRaceAggregate>> {
        let slot = {
            let drivers = self.drivers.read().await;
            drivers.get(driver_name).cloned()
        };

        match slot {
            Some(slot) => Ok(Some(slot.lock().await.aggregate.clone())),
            None => Ok(None),
        }
    }

    async fn laps_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Lap>> {
        let slots: Vec<_> = {
            let drivers = self.drivers.read().await;
            drivers.values().cloned().collect()
        };

        // Slots are locked one at a time; a lap ingested mid-scan may or may
        // not be seen, which ranking tolerates and the next run resolves.
        let mut laps = Vec::new();
        for slot in slots {
            let slot = slot.lock().await;
            laps.extend(
                slot.aggregate
                    .laps
                    .iter()
                    .filter(|lap| lap.recorded_at >= from && lap.recorded_at <= to)
                    .cloned(),
            );
        }

        Ok(laps)
    }

    async fn put_snapshot(
        &self,
        snapshot: KartRankingSnapshot,
    ) -> Result<Arc<KartRankingSnapshot>> {
        let snapshot = Arc::new(snapshot);
        let mut snapshots = self.snapshots.write().await;
        snapshots.push(Arc::clone(&snapshot));
        debug!(
            period = %snapshot.period,
            karts = snapshot.total_karts_analyzed,
            "Persisted ranking snapshot"
        );
        Ok(snapshot)
    }

    async fn latest_snapshot(&self, period: &str) -> Result<Option<Arc<KartRankingSnapshot>>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .iter()
            .filter(|s| s.period == period)
            .max_by_key(|s| s.generated_at)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DateRange;
    use chrono::Duration;

    fn lap(driver: &str, kart: u32, number: u32, time_ms: u64) -> Lap {
        Lap {
            session_id: "heat-1".to_string(),
            driver_name: driver.to_string(),
            kart_number: kart,
            lap_number: number,
            lap_time_ms: time_ms,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn ingesting_the_same_lap_twice_stores_it_once() {
        let store = MemoryTimingStore::new();

        let first = store.ingest(lap("Ignacio", 19, 1, 39501)).await.unwrap();
        assert!(first.accepted);
        assert_eq!(first.aggregate.total_laps(), 1);

        let second = store.ingest(lap("Ignacio", 19, 1, 39501)).await.unwrap();
        assert!(!second.accepted);
        assert_eq!(second.aggregate.total_laps(), 1);
        assert_eq!(second.aggregate.best_time_ms, 39501);
    }

    #[tokio::test]
    async fn out_of_order_delivery_orders_by_lap_number() {
        let store = MemoryTimingStore::new();
        for number in [3u32, 1, 2] {
            store.ingest(lap("Ignacio", 19, number, 40000 + u64::from(number))).await.unwrap();
        }

        let aggregate = store.driver_aggregate("Ignacio").await.unwrap().unwrap();
        let numbers: Vec<u32> = aggregate.laps.iter().map(|l| l.lap_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn unknown_driver_reads_as_none() {
        let store = MemoryTimingStore::new();
        assert!(store.driver_aggregate("nobody").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_same_driver_ingestion_loses_nothing() {
        let store = Arc::new(MemoryTimingStore::new());

        let handles: Vec<_> = (1..=32u32)
            .map(|number| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.ingest(lap("Ignacio", 19, number, 39000 + u64::from(number))).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let aggregate = store.driver_aggregate("Ignacio").await.unwrap().unwrap();
        assert_eq!(aggregate.total_laps(), 32);
        assert_eq!(aggregate.best_time_ms, 39001);
        let numbers: Vec<u32> = aggregate.laps.iter().map(|l| l.lap_number).collect();
        assert_eq!(numbers, (1..=32).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn laps_between_respects_the_window() {
        let store = MemoryTimingStore::new();
        let now = Utc::now();

        let mut old = lap("Ignacio", 19, 1, 40000);
        old.recorded_at = now - Duration::days(60);
        let recent = lap("Ignacio", 19, 2, 41000);

        store.ingest(old).await.unwrap();
        store.ingest(recent).await.unwrap();

        let laps = store.laps_between(now - Duration::days(30), now).await.unwrap();
        assert_eq!(laps.len(), 1);
        assert_eq!(laps[0].lap_number, 2);
    }

    #[tokio::test]
    async fn latest_snapshot_is_per_period_and_monotonic() {
        let store = MemoryTimingStore::new();
        let now = Utc::now();
        let snapshot = |period: &str, generated_at| KartRankingSnapshot {
            generated_at,
            period: period.to_string(),
            date_range: DateRange { from: generated_at - Duration::days(30), to: generated_at },
            total_karts_analyzed: 0,
            rankings: vec![],
        };

        store.put_snapshot(snapshot("30d", now - Duration::hours(2))).await.unwrap();
        store.put_snapshot(snapshot("30d", now)).await.unwrap();
        store.put_snapshot(snapshot("7d", now - Duration::hours(1))).await.unwrap();

        let latest = store.latest_snapshot("30d").await.unwrap().unwrap();
        assert_eq!(latest.generated_at, now);

        let weekly = store.latest_snapshot("7d").await.unwrap().unwrap();
        assert_eq!(weekly.generated_at, now - Duration::hours(1));

        assert!(store.latest_snapshot("90d").await.unwrap().is_none());
    }
}
