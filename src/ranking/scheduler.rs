//! The periodic ranking task.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::RankingEngine;
use crate::broadcast::Broadcaster;
use crate::config::RankingConfig;
use crate::store::TimingStore;
use crate::types::{BroadcastEvent, KartRankingSnapshot};

/// Result of spawning the ranking task.
pub struct RankingChannels {
    /// Receiver for the latest complete snapshot; only ever moves forward.
    pub snapshots: watch::Receiver<Option<Arc<KartRankingSnapshot>>>,
    /// Cancellation token for graceful shutdown.
    pub cancel: CancellationToken,
}

/// Spawns and manages the periodic ranking task.
///
/// The task ticks on the configured interval (missed ticks are delayed, not
/// burst), computes a snapshot under the configured time budget, persists it,
/// publishes it on the watch channel, and broadcasts a summary. A failed or
/// over-budget run is skipped wholesale; the previous snapshot keeps being
/// served and the task never dies on compute errors.
pub struct RankingScheduler;

impl RankingScheduler {
    /// Spawn the ranking task against the given store and broadcaster.
    pub fn spawn(
        store: Arc<dyn TimingStore>,
        broadcaster: Arc<Broadcaster>,
        config: RankingConfig,
    ) -> RankingChannels {
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let cancel = CancellationToken::new();

        let cancel_task = cancel.clone();
        tokio::spawn(async move {
            Self::ranking_task(store, broadcaster, config, snapshot_tx, cancel_task).await;
        });

        RankingChannels { snapshots: snapshot_rx, cancel }
    }

    async fn ranking_task(
        store: Arc<dyn TimingStore>,
        broadcaster: Arc<Broadcaster>,
        config: RankingConfig,
        snapshot_tx: watch::Sender<Option<Arc<KartRankingSnapshot>>>,
        cancel: CancellationToken,
    ) {
        info!(
            window_days = config.window_days,
            interval = ?config.interval,
            "Ranking task started"
        );

        let engine = RankingEngine::new(Arc::clone(&store));
        let mut ticker = interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut run_count = 0u64;
        let mut failure_streak = 0u32;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Ranking task cancelled");
                    break;
                }
                _ = ticker.tick() => {}
            }

            run_count += 1;
            let run = timeout(config.time_budget, engine.compute_snapshot(config.window_days));

            let snapshot = match run.await {
                Err(_elapsed) => {
                    failure_streak += 1;
                    warn!(
                        budget = ?config.time_budget,
                        "Ranking run exceeded its time budget, abandoned"
                    );
                    continue;
                }
                Ok(Err(e)) => {
                    failure_streak += 1;
                    warn!(error = %e, "Ranking run failed, keeping previous snapshot");
                    if failure_streak >= 5 {
                        error!(failure_streak, "Ranking runs keep failing");
                    }
                    continue;
                }
                Ok(Ok(snapshot)) => snapshot,
            };

            let stored = match store.put_snapshot(snapshot).await {
                Ok(stored) => stored,
                Err(e) => {
                    failure_streak += 1;
                    warn!(error = %e, "Persisting snapshot failed, keeping previous");
                    continue;
                }
            };

            failure_streak = 0;
            debug!(run_count, karts = stored.total_karts_analyzed, "Publishing snapshot");

            let summary = stored.summary();
            if snapshot_tx.send(Some(Arc::clone(&stored))).is_err() {
                debug!("Snapshot receiver dropped, shutting down");
                break;
            }

            broadcaster.broadcast(BroadcastEvent::RankingUpdated { summary }).await;
        }

        info!("Ranking task ended ({} runs)", run_count);
    }
}
