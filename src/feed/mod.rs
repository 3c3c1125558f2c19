//! Timing-feed intake: wire shapes and normalization.
//!
//! The feed arrives as JSON payloads, one per timing tick, one record per
//! active driver. [`wire`] holds the tolerant wire shapes (short-code
//! aliases, number-or-clock-string times); [`normalizer`] turns them into
//! canonical [`crate::types::Lap`] records with a per-record skip report.

pub mod normalizer;
pub mod wire;

pub use normalizer::{NormalizedBatch, Normalizer};
pub use wire::{IngestRequest, IngestResponse, RawTimingRecord, SessionPayload, SkippedRecord};
