//! Forecast matching: pick the timeseries entry closest to a target time and
//! decide whether the match is usable.

use chrono::{DateTime, Utc};

use crate::errors::ForecastError;
use crate::services::yr::TimeseriesEntry;

/// Matches further than this from the target are not presented as forecasts.
pub const MAX_MATCH_DISTANCE_HOURS: f64 = 12.0;

/// The entry closest to a target time.
#[derive(Debug, Clone, Copy)]
pub struct MatchedEntry<'a> {
    pub entry: &'a TimeseriesEntry,
    /// `|entry.time - target| / 3600`
    pub time_difference_hours: f64,
}

/// Whether a matched forecast may be shown for its target time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub forecast_available: bool,
    pub time_has_passed: bool,
}

/// Find the entry whose timestamp is closest to `target`.
///
/// Linear scan; on a tie the first entry wins. Entries need not be sorted.
pub fn find_closest_entry(
    entries: &[TimeseriesEntry],
    target: DateTime<Utc>,
) -> Result<MatchedEntry<'_>, ForecastError> {
    let target_ms = target.timestamp_millis();
    let closest = entries
        .iter()
        .min_by_key(|e| (e.time.timestamp_millis() - target_ms).unsigned_abs())
        .ok_or(ForecastError::Matching)?;

    let delta_ms = (closest.time.timestamp_millis() - target_ms).unsigned_abs();
    Ok(MatchedEntry {
        entry: closest,
        time_difference_hours: delta_ms as f64 / 3_600_000.0,
    })
}

/// Availability policy: the target must still be ahead of `now` and the
/// match must be within [`MAX_MATCH_DISTANCE_HOURS`].
pub fn assess_availability(
    target: DateTime<Utc>,
    time_difference_hours: f64,
    now: DateTime<Utc>,
) -> Availability {
    let time_has_passed = target <= now;
    Availability {
        forecast_available: !time_has_passed && time_difference_hours <= MAX_MATCH_DISTANCE_HOURS,
        time_has_passed,
    }
}
