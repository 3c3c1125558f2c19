//! Transport seam for event delivery.

use crate::Result;
use crate::types::BroadcastEvent;

/// Trait for delivering events to a single viewer connection.
///
/// Implemented by the transport layer (websocket gateway, SSE hub, in-process
/// channel, ...). The broadcaster treats any error or timeout from
/// [`deliver`](ConnectionSink::deliver) as a dead connection: the id is
/// dropped from the registry and delivery to the remaining connections
/// continues undisturbed.
#[async_trait::async_trait]
pub trait ConnectionSink: Send + Sync + 'static {
    /// Deliver one event to one connection.
    ///
    /// Returns:
    /// - `Ok(())` - delivered (or queued) for this connection
    /// - `Err(e)` - the connection is unreachable; the broadcaster will
    ///   unregister it
    async fn deliver(&self, connection_id: &str, event: &BroadcastEvent) -> Result<()>;
}
