//! Live race-timing core for karting venues.
//!
//! Lapfeed ingests the raw timing feed posted by track-side hardware,
//! normalizes it into canonical lap records, deduplicates and persists them
//! per driver, fans updates out to connected real-time viewers, and
//! periodically recomputes a ranking of karts by recent pace.
//!
//! # Features
//!
//! - **Idempotent ingestion**: laps carry a unique identity key; resubmitted
//!   feed ticks deduplicate to no-ops, so callers can retry freely
//! - **Self-healing fan-out**: a dead viewer connection is dropped from the
//!   registry without disturbing the others
//! - **Periodic rankings**: snapshots are an immutable batch product served
//!   in O(1), never computed on a request path
//! - **Pluggable persistence**: the [`TimingStore`] trait abstracts the
//!   system of record; an in-memory backend is bundled
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lapfeed::{
//!     BroadcastEvent, ConnectionSink, CoreConfig, IngestRequest, Lapfeed, MemoryTimingStore,
//! };
//!
//! /// Hand events to the websocket gateway.
//! struct GatewaySink;
//!
//! #[async_trait::async_trait]
//! impl ConnectionSink for GatewaySink {
//!     async fn deliver(&self, connection_id: &str, event: &BroadcastEvent) -> lapfeed::Result<()> {
//!         // push `event` down the socket identified by `connection_id`
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(MemoryTimingStore::new());
//!     let handle = Lapfeed::start(store, Arc::new(GatewaySink), CoreConfig::default());
//!
//!     // Transport layer reports viewer connects:
//!     handle.registry().register("viewer-42");
//!
//!     // ...and forwards feed ticks:
//!     let request = IngestRequest::from_json(r#"{
//!         "action": "process_lap_data",
//!         "sessionData": { "name": "heat-1", "records": [
//!             { "N": "Ignacio", "K": 19, "L": 1, "T": 39.501 }
//!         ]}
//!     }"#)?;
//!     let response = handle.service().process_lap_data(request).await?;
//!     println!("accepted {} laps", response.accepted_count);
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod connection;
mod error;
pub mod feed;
pub mod ranking;
pub mod service;
pub mod store;
pub mod stream;
pub mod types;

// Core exports
pub use broadcast::Broadcaster;
pub use config::{BroadcastConfig, CoreConfig, RankingConfig};
pub use connection::{ConnectionRegistry, ConnectionSink};
pub use error::{FeedError, Result};
pub use feed::{IngestRequest, IngestResponse, NormalizedBatch, Normalizer};
pub use ranking::{RankingEngine, RankingScheduler};
pub use service::{RankingsView, TimingService};
pub use store::{IngestOutcome, MemoryTimingStore, TimingStore};
pub use types::*;

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Unified entry point wiring the live-timing core together.
///
/// [`Lapfeed::start`] builds the registry, broadcaster and service around the
/// given store and transport sink, and spawns the periodic ranking task. The
/// returned [`LapfeedHandle`] owns the lifecycle: dropping it (or calling
/// [`LapfeedHandle::shutdown`]) stops the ranking task.
pub struct Lapfeed;

impl Lapfeed {
    /// Start the core. Must be called within a tokio runtime.
    pub fn start(
        store: Arc<dyn TimingStore>,
        sink: Arc<dyn ConnectionSink>,
        config: CoreConfig,
    ) -> LapfeedHandle {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster =
            Arc::new(Broadcaster::new(Arc::clone(&registry), sink, config.broadcast));
        let service = TimingService::new(Arc::clone(&store), Arc::clone(&broadcaster));
        let channels = RankingScheduler::spawn(store, Arc::clone(&broadcaster), config.ranking);

        LapfeedHandle {
            service,
            registry,
            broadcaster,
            snapshots: channels.snapshots,
            cancel: channels.cancel,
        }
    }
}

/// Running live-timing core.
pub struct LapfeedHandle {
    service: TimingService,
    registry: Arc<ConnectionRegistry>,
    broadcaster: Arc<Broadcaster>,
    snapshots: watch::Receiver<Option<Arc<KartRankingSnapshot>>>,
    cancel: CancellationToken,
}

impl LapfeedHandle {
    /// The ingestion/read service for transports to call into.
    pub fn service(&self) -> &TimingService {
        &self.service
    }

    /// The registry the transport layer reports connects/disconnects to.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// The broadcaster, e.g. for in-process event subscriptions.
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Latest complete ranking snapshot, if any run finished yet.
    pub fn latest_snapshot(&self) -> Option<Arc<KartRankingSnapshot>> {
        self.snapshots.borrow().clone()
    }

    /// Ranking snapshots as a stream, one item per completed run.
    pub fn snapshot_updates(&self) -> impl Stream<Item = Arc<KartRankingSnapshot>> + 'static {
        WatchStream::new(self.snapshots.clone()).filter_map(|opt| async move { opt })
    }

    /// Stop the periodic ranking task. Idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for LapfeedHandle {
    fn drop(&mut self) {
        debug!("Dropping lapfeed handle");
        // Stop the ranking task on drop for clean shutdown
        self.cancel.cancel();
    }
}
