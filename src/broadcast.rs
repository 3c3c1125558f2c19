//! Fan-out of ingestion and ranking events to live viewers.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::config::BroadcastConfig;
use crate::connection::{ConnectionRegistry, ConnectionSink};
use crate::types::BroadcastEvent;

/// Pushes events to every registered viewer connection.
///
/// Deliveries to distinct connections run concurrently; a delivery that fails
/// or times out marks that connection dead and removes it from the registry
/// (self-healing), without disturbing the remaining connections or the
/// caller. Per-connection ordering follows [`Broadcaster::broadcast`] call
/// order.
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
    sink: Arc<dyn ConnectionSink>,
    events: broadcast::Sender<BroadcastEvent>,
    config: BroadcastConfig,
}

impl Broadcaster {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        sink: Arc<dyn ConnectionSink>,
        config: BroadcastConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        Self { registry, sink, events, config }
    }

    /// Deliver one event to every currently-registered connection.
    ///
    /// Never fails: dead connections are handled internally and everything
    /// else is the transport's business.
    pub async fn broadcast(&self, event: BroadcastEvent) {
        // In-process subscribers first; no receivers is fine.
        let _ = self.events.send(event.clone());

        let targets = self.registry.active();
        if targets.is_empty() {
            trace!(kind = event.kind(), "No viewer connections, skipping fan-out");
            return;
        }

        debug!(kind = event.kind(), connections = targets.len(), "Broadcasting event");

        let deliveries = targets.iter().map(|connection_id| {
            let event = &event;
            async move {
                let attempt = timeout(
                    self.config.delivery_timeout,
                    self.sink.deliver(connection_id, event),
                )
                .await;

                match attempt {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => {
                        warn!(%connection_id, %error, "Delivery failed, dropping connection");
                        self.registry.unregister(connection_id);
                    }
                    Err(_elapsed) => {
                        warn!(%connection_id, "Delivery timed out, dropping connection");
                        self.registry.unregister(connection_id);
                    }
                }
            }
        });

        join_all(deliveries).await;
    }

    /// Subscribe to the event stream in-process.
    ///
    /// Embedded dashboards use this instead of a registered connection. Slow
    /// consumers that only need the latest state can wrap the receiver in
    /// [`crate::stream::CoalesceExt::coalesce`].
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.events.subscribe()
    }

    /// The registry this broadcaster fans out to.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use crate::error::FeedError;
    use crate::types::DriverRaceAggregate;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Test sink that records deliveries and fails for chosen connections.
    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<HashMap<String, Vec<BroadcastEvent>>>,
        failing: Mutex<Vec<String>>,
        stall: Option<Duration>,
    }

    #[async_trait::async_trait]
    impl ConnectionSink for RecordingSink {
        async fn deliver(&self, connection_id: &str, event: &BroadcastEvent) -> Result<()> {
            if self.failing.lock().unwrap().iter().any(|id| id == connection_id) {
                if let Some(stall) = self.stall {
                    tokio::time::sleep(stall).await;
                }
                return Err(FeedError::delivery_failed(connection_id, "socket gone"));
            }
            self.delivered
                .lock()
                .unwrap()
                .entry(connection_id.to_string())
                .or_default()
                .push(event.clone());
            Ok(())
        }
    }

    fn lap_event(driver: &str) -> BroadcastEvent {
        BroadcastEvent::LapIngested { aggregate: DriverRaceAggregate::new(driver) }
    }

    fn broadcaster(sink: Arc<RecordingSink>) -> Broadcaster {
        let registry = Arc::new(ConnectionRegistry::new());
        let config = BroadcastConfig {
            delivery_timeout: Duration::from_millis(200),
            ..BroadcastConfig::default()
        };
        Broadcaster::new(registry, sink, config)
    }

    #[tokio::test]
    async fn one_dead_connection_does_not_stop_the_others() {
        let sink = Arc::new(RecordingSink {
            failing: Mutex::new(vec!["viewer-2".to_string()]),
            ..RecordingSink::default()
        });
        let broadcaster = broadcaster(Arc::clone(&sink));
        for id in ["viewer-1", "viewer-2", "viewer-3"] {
            broadcaster.registry().register(id);
        }

        broadcaster.broadcast(lap_event("Ignacio")).await;

        let delivered = sink.delivered.lock().unwrap();
        assert!(delivered.contains_key("viewer-1"));
        assert!(delivered.contains_key("viewer-3"));
        assert!(!delivered.contains_key("viewer-2"));
        drop(delivered);

        // The failing connection healed out of the registry.
        assert!(!broadcaster.registry().contains("viewer-2"));
        assert_eq!(broadcaster.registry().len(), 2);
    }

    #[tokio::test]
    async fn timeouts_count_as_dead_connections() {
        let sink = Arc::new(RecordingSink {
            failing: Mutex::new(vec!["viewer-slow".to_string()]),
            stall: Some(Duration::from_secs(10)),
            ..RecordingSink::default()
        });
        let broadcaster = broadcaster(Arc::clone(&sink));
        broadcaster.registry().register("viewer-slow");
        broadcaster.registry().register("viewer-fast");

        broadcaster.broadcast(lap_event("Ignacio")).await;

        assert!(!broadcaster.registry().contains("viewer-slow"));
        assert!(broadcaster.registry().contains("viewer-fast"));
    }

    #[tokio::test]
    async fn per_connection_order_matches_broadcast_order() {
        let sink = Arc::new(RecordingSink::default());
        let broadcaster = broadcaster(Arc::clone(&sink));
        broadcaster.registry().register("viewer-1");

        broadcaster.broadcast(lap_event("A")).await;
        broadcaster.broadcast(lap_event("B")).await;
        broadcaster.broadcast(lap_event("C")).await;

        let delivered = sink.delivered.lock().unwrap();
        let drivers: Vec<&str> = delivered["viewer-1"]
            .iter()
            .map(|event| match event {
                BroadcastEvent::LapIngested { aggregate } => aggregate.driver_name.as_str(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(drivers, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn in_process_subscribers_see_events() {
        let sink = Arc::new(RecordingSink::default());
        let broadcaster = broadcaster(sink);
        let mut subscription = broadcaster.subscribe();

        broadcaster.broadcast(lap_event("Ignacio")).await;

        let event = subscription.recv().await.unwrap();
        assert_eq!(event.kind(), "lap_ingested");
    }
}
