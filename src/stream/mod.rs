//! Stream utilities for event consumers.

mod coalesce;

pub use coalesce::{Coalesce, CoalesceExt};
