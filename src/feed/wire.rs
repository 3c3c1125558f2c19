//! Wire shapes of the raw timing feed.
//!
//! The track-side hardware posts one JSON payload per timing tick, one record
//! per active driver. Field names arrive either long-form (`"bestTime"`) or
//! as the hardware's short codes (`"B"`); both map onto the same canonical
//! fields here. Numeric time fields tolerate plain seconds (`39.501`) and
//! clock strings (`"1:02.345"`), because different firmware revisions send
//! both.
//!
//! The short-code mapping is pinned by the fixture tests at the bottom of
//! this file; changing an alias fails those tests loudly.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Action string of the ingestion endpoint.
pub const PROCESS_LAP_DATA: &str = "process_lap_data";

/// One inbound request to the ingestion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub action: String,
    pub session_data: SessionPayload,
}

impl IngestRequest {
    /// Decode a raw JSON body as handed over by the transport layer.
    pub fn from_json(body: &str) -> anyhow::Result<Self> {
        serde_json::from_str(body).context("Decoding ingestion request body")
    }
}

/// A named session payload: one feed tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    /// Session name/identifier
    pub name: String,
    /// One record per active driver, in track order
    pub records: Vec<RawTimingRecord>,
}

/// One driver's row in a feed tick. Not persisted; normalized into
/// [`crate::types::Lap`] records first.
///
/// Every field is optional on the wire; the normalizer decides which
/// omissions make a record malformed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTimingRecord {
    /// Driver display name
    #[serde(alias = "N")]
    pub name: Option<String>,
    /// Current position on track
    #[serde(alias = "P")]
    pub position: Option<RawCount>,
    /// Kart number
    #[serde(alias = "K")]
    pub kart: Option<RawCount>,
    /// Cumulative lap count so far; the lap just completed is lap N
    #[serde(alias = "L")]
    pub laps: Option<RawCount>,
    /// Best lap time of the session so far
    #[serde(alias = "B")]
    pub best_time: Option<RawTime>,
    /// Last/current lap time, the one a new `Lap` is minted from
    #[serde(alias = "T")]
    pub last_time: Option<RawTime>,
    /// Rolling average lap time; distinct from best and last, never a substitute
    #[serde(alias = "A")]
    pub average_time: Option<RawTime>,
    /// Gap to leader, free-form (e.g. `"+1.203"` or `"1 lap"`)
    #[serde(alias = "G")]
    pub gap: Option<String>,
}

/// A count field that some firmware sends as a number and some as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCount {
    Number(u32),
    Text(String),
}

impl RawCount {
    /// Coerce to an integer; `None` when the text form is not a number.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            RawCount::Number(n) => Some(*n),
            RawCount::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// A lap-time field: floating-point seconds or a clock string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTime {
    Seconds(f64),
    Text(String),
}

/// Why a time field could not be converted to milliseconds.
#[derive(Debug, Error, PartialEq)]
pub enum TimeFormatError {
    #[error("non-numeric time '{value}'")]
    NonNumeric { value: String },
    #[error("negative time {seconds}s")]
    Negative { seconds: f64 },
}

impl RawTime {
    /// Convert to integer milliseconds by rounding.
    ///
    /// Lap times are floating-point seconds in the feed; integer milliseconds
    /// give lossless, comparable ranking keys downstream.
    pub fn to_millis(&self) -> Result<u64, TimeFormatError> {
        let seconds = match self {
            RawTime::Seconds(s) => *s,
            RawTime::Text(text) => parse_clock(text)
                .ok_or_else(|| TimeFormatError::NonNumeric { value: text.clone() })?,
        };

        if !seconds.is_finite() {
            return Err(TimeFormatError::NonNumeric { value: seconds.to_string() });
        }
        if seconds < 0.0 {
            return Err(TimeFormatError::Negative { seconds });
        }

        Ok((seconds * 1000.0).round() as u64)
    }
}

/// Parse `"39.501"` or `"1:02.345"` into seconds.
fn parse_clock(text: &str) -> Option<f64> {
    let text = text.trim();
    match text.split_once(':') {
        Some((minutes, rest)) => {
            let minutes: u32 = minutes.parse().ok()?;
            let seconds: f64 = rest.parse().ok()?;
            if seconds < 0.0 {
                return None;
            }
            Some(f64::from(minutes) * 60.0 + seconds)
        }
        None => text.parse().ok(),
    }
}

/// One skipped record in an otherwise accepted batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRecord {
    /// Index of the record within the payload
    pub index: usize,
    /// Driver name, when the record carried one
    pub driver: Option<String>,
    pub reason: String,
}

/// Response of the ingestion endpoint: partial-success detail, never
/// all-or-nothing failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub success: bool,
    pub accepted_count: usize,
    pub skipped: Vec<SkippedRecord>,
}
