//! Runtime configuration for the live-timing core.
//!
//! Plain typed structs with sensible defaults, passed explicitly at
//! construction. Deployments that load configuration from files can
//! deserialize these directly.

use serde::Deserialize;
use std::time::Duration;

/// Top-level configuration for [`crate::Lapfeed::start`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub ranking: RankingConfig,
    pub broadcast: BroadcastConfig,
}

/// Configuration of the periodic ranking task.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Rolling window the snapshot covers, in days
    pub window_days: u32,
    /// How often a new snapshot is computed
    #[serde(with = "duration_secs")]
    pub interval: Duration,
    /// A run exceeding this budget is abandoned wholesale
    #[serde(with = "duration_secs")]
    pub time_budget: Duration,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            interval: Duration::from_secs(600),
            time_budget: Duration::from_secs(30),
        }
    }
}

impl RankingConfig {
    /// The label snapshots computed under this config carry, e.g. `"30d"`.
    pub fn period_label(&self) -> String {
        format!("{}d", self.window_days)
    }
}

/// Configuration of viewer fan-out.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// A delivery exceeding this is treated as a dead connection
    #[serde(with = "duration_secs")]
    pub delivery_timeout: Duration,
    /// Capacity of the in-process event subscription channel
    pub event_buffer: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self { delivery_timeout: Duration::from_secs(5), event_buffer: 64 }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
