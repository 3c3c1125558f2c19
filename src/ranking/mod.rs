//! Kart ranking over a rolling window of recent laps.
//!
//! Rankings are deliberately a periodic, cacheable batch product: the
//! [`RankingEngine`] computes immutable snapshots from the store, and the
//! [`scheduler`] owns the periodic task that publishes them. Nothing on the
//! ingestion path ever computes a ranking.

pub mod scheduler;

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::Result;
use crate::store::TimingStore;
use crate::types::{DateRange, KartRanking, KartRankingSnapshot};

pub use scheduler::{RankingChannels, RankingScheduler};

/// How many of a kart's fastest laps feed its average.
const TOP_TIMES_PER_KART: usize = 10;

/// Computes ranking snapshots from the lap store.
pub struct RankingEngine {
    store: Arc<dyn TimingStore>,
}

impl RankingEngine {
    pub fn new(store: Arc<dyn TimingStore>) -> Self {
        Self { store }
    }

    /// Compute a snapshot over the trailing `window_days` ending now.
    pub async fn compute_snapshot(&self, window_days: u32) -> Result<KartRankingSnapshot> {
        self.snapshot_at(Utc::now(), window_days).await
    }

    /// Compute a snapshot over `[now - window_days, now]` for an explicit
    /// `now`. Used for backfill and replay; `compute_snapshot` is the live
    /// entry point.
    pub async fn snapshot_at(
        &self,
        now: DateTime<Utc>,
        window_days: u32,
    ) -> Result<KartRankingSnapshot> {
        let from = now - Duration::days(i64::from(window_days));
        let laps = self.store.laps_between(from, now).await?;
        debug!(window_days, laps = laps.len(), "Computing ranking snapshot");

        let mut times_by_kart: HashMap<u32, Vec<u64>> = HashMap::new();
        for lap in &laps {
            times_by_kart.entry(lap.kart_number).or_default().push(lap.lap_time_ms);
        }

        // Karts with zero laps in the window simply have no entry here and
        // are excluded from the snapshot.
        let mut rankings: Vec<KartRanking> = times_by_kart
            .into_iter()
            .map(|(kart_number, mut times)| {
                times.sort_unstable();
                let total_laps = times.len() as u32;
                let best_time_ms = times[0];
                times.truncate(TOP_TIMES_PER_KART);
                let avg_top10_time_ms = mean_rounded(&times);
                KartRanking {
                    position: 0,
                    kart_number,
                    avg_top10_time_ms,
                    best_time_ms,
                    total_laps,
                    top10_times_ms: times,
                }
            })
            .collect();

        // Pace first; at equal pace the faster single lap wins, then the
        // kart with more data.
        rankings.sort_by_key(|r| (r.avg_top10_time_ms, r.best_time_ms, Reverse(r.total_laps)));
        for (index, ranking) in rankings.iter_mut().enumerate() {
            ranking.position = index as u32 + 1;
        }

        let snapshot = KartRankingSnapshot {
            generated_at: now,
            period: format!("{window_days}d"),
            date_range: DateRange { from, to: now },
            total_karts_analyzed: rankings.len() as u32,
            rankings,
        };

        info!(
            period = %snapshot.period,
            karts = snapshot.total_karts_analyzed,
            "Ranking snapshot computed"
        );
        Ok(snapshot)
    }
}

/// Arithmetic mean, rounded to the nearest millisecond.
fn mean_rounded(times: &[u64]) -> u64 {
    let n = times.len() as u64;
    let sum: u64 = times.iter().sum();
    (sum + n / 2) / n
}
