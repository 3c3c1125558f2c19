//! Normalization of raw feed ticks into canonical lap records.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::wire::{RawTimingRecord, SkippedRecord};
use crate::error::{FeedError, Result};
use crate::types::Lap;

/// Result of normalizing one feed tick.
///
/// One malformed record does not abort the batch: it lands in `skipped` with
/// its index and reason while the remaining records proceed.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub laps: Vec<Lap>,
    pub skipped: Vec<SkippedRecord>,
}

/// Turns raw timing records into [`Lap`] records.
///
/// The lap number derives from the record's cumulative lap count: the tick
/// reporting N laps for a driver carries that driver's lap N, timed by the
/// last/current lap field.
#[derive(Debug, Clone, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize one feed tick.
    ///
    /// All laps of the tick share one `recorded_at` stamp so a ranking window
    /// never splits a tick. Fails wholesale only when the payload itself is
    /// unusable (no session name); per-record problems are reported, not
    /// raised.
    pub fn normalize(
        &self,
        session_name: &str,
        records: &[RawTimingRecord],
    ) -> Result<NormalizedBatch> {
        if session_name.trim().is_empty() {
            return Err(FeedError::malformed("session payload", "empty session name"));
        }

        let recorded_at = Utc::now();
        let mut batch = NormalizedBatch::default();

        for (index, record) in records.iter().enumerate() {
            match normalize_record(session_name, record, recorded_at) {
                Ok(lap) => batch.laps.push(lap),
                Err(reason) => {
                    debug!(index, %reason, "Skipping malformed timing record");
                    batch.skipped.push(SkippedRecord {
                        index,
                        driver: record.name.clone(),
                        reason,
                    });
                }
            }
        }

        Ok(batch)
    }
}

fn normalize_record(
    session_id: &str,
    record: &RawTimingRecord,
    recorded_at: DateTime<Utc>,
) -> std::result::Result<Lap, String> {
    let driver_name = record
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or("missing driver name")?
        .to_string();

    let kart_number = record
        .kart
        .as_ref()
        .and_then(|k| k.as_u32())
        .ok_or("missing or invalid kart number")?;

    let lap_number = record
        .laps
        .as_ref()
        .and_then(|l| l.as_u32())
        .filter(|&n| n >= 1)
        .ok_or("missing or invalid lap count")?;

    let lap_time_ms = record
        .last_time
        .as_ref()
        .ok_or("missing lap time")?
        .to_millis()
        .map_err(|e| e.to_string())?;

    Ok(Lap {
        session_id: session_id.to_string(),
        driver_name,
        kart_number,
        lap_number,
        lap_time_ms,
        recorded_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::wire::{RawCount, RawTime};

    fn record(name: &str, kart: u32, laps: u32, last_time: f64) -> RawTimingRecord {
        RawTimingRecord {
            name: Some(name.to_string()),
            kart: Some(RawCount::Number(kart)),
            laps: Some(RawCount::Number(laps)),
            last_time: Some(RawTime::Seconds(last_time)),
            ..Default::default()
        }
    }

    #[test]
    fn lap_number_comes_from_the_cumulative_count() {
        let batch =
            Normalizer::new().normalize("heat-1", &[record("Ignacio", 19, 3, 42.026)]).unwrap();

        assert_eq!(batch.skipped.len(), 0);
        let lap = &batch.laps[0];
        assert_eq!(lap.lap_number, 3);
        assert_eq!(lap.kart_number, 19);
        assert_eq!(lap.lap_time_ms, 42026);
        assert_eq!(lap.session_id, "heat-1");
    }

    #[test]
    fn one_bad_record_does_not_abort_the_batch() {
        let mut nameless = record("", 5, 2, 41.0);
        nameless.name = None;
        let records = vec![
            record("Ignacio", 19, 1, 39.501),
            nameless,
            record("Marta", 7, 1, 40.2),
        ];

        let batch = Normalizer::new().normalize("heat-1", &records).unwrap();
        assert_eq!(batch.laps.len(), 2);
        assert_eq!(batch.skipped.len(), 1);
        assert_eq!(batch.skipped[0].index, 1);
        assert_eq!(batch.skipped[0].reason, "missing driver name");
    }

    #[test]
    fn skip_reasons_name_the_defect() {
        let mut no_kart = record("A", 1, 1, 40.0);
        no_kart.kart = None;
        let mut bad_kart = record("B", 1, 1, 40.0);
        bad_kart.kart = Some(RawCount::Text("pit".into()));
        let mut no_laps = record("C", 2, 1, 40.0);
        no_laps.laps = Some(RawCount::Number(0));
        let mut no_time = record("D", 3, 1, 40.0);
        no_time.last_time = None;
        let mut negative = record("E", 4, 1, 40.0);
        negative.last_time = Some(RawTime::Seconds(-0.5));
        let mut text_time = record("F", 5, 1, 40.0);
        text_time.last_time = Some(RawTime::Text("DNF".into()));

        let batch = Normalizer::new()
            .normalize("heat-1", &[no_kart, bad_kart, no_laps, no_time, negative, text_time])
            .unwrap();

        assert!(batch.laps.is_empty());
        let reasons: Vec<&str> = batch.skipped.iter().map(|s| s.reason.as_str()).collect();
        assert_eq!(reasons[0], "missing or invalid kart number");
        assert_eq!(reasons[1], "missing or invalid kart number");
        assert_eq!(reasons[2], "missing or invalid lap count");
        assert_eq!(reasons[3], "missing lap time");
        assert!(reasons[4].contains("negative"));
        assert!(reasons[5].contains("non-numeric"));
    }

    #[test]
    fn whitespace_names_are_missing_names() {
        let batch =
            Normalizer::new().normalize("heat-1", &[record("   ", 9, 1, 40.0)]).unwrap();
        assert!(batch.laps.is_empty());
        assert_eq!(batch.skipped[0].reason, "missing driver name");
    }

    #[test]
    fn empty_session_name_fails_wholesale() {
        let result = Normalizer::new().normalize("  ", &[record("Ignacio", 19, 1, 39.5)]);
        assert!(matches!(result, Err(FeedError::MalformedPayload { .. })));
    }

    #[test]
    fn all_laps_of_a_tick_share_one_timestamp() {
        let batch = Normalizer::new()
            .normalize("heat-1", &[record("A", 1, 1, 40.0), record("B", 2, 1, 41.0)])
            .unwrap();
        assert_eq!(batch.laps[0].recorded_at, batch.laps[1].recorded_at);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn any_finite_nonnegative_seconds_normalize(seconds in 0.0f64..36_000.0) {
                let batch = Normalizer::new()
                    .normalize("heat-1", &[record("Ignacio", 19, 1, seconds)])
                    .unwrap();
                prop_assert_eq!(batch.laps.len(), 1);
                // Rounding error stays within half a millisecond
                let delta = (batch.laps[0].lap_time_ms as f64 - seconds * 1000.0).abs();
                prop_assert!(delta <= 0.5);
            }

            #[test]
            fn negative_seconds_never_produce_laps(seconds in -36_000.0f64..-0.001) {
                let batch = Normalizer::new()
                    .normalize("heat-1", &[record("Ignacio", 19, 1, seconds)])
                    .unwrap();
                prop_assert!(batch.laps.is_empty());
                prop_assert_eq!(batch.skipped.len(), 1);
            }
        }
    }
}
