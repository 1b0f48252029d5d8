//! Route sampling and time mapping.
//!
//! A route is reduced to a bounded set of sample points spread evenly by
//! index, with the sample count driven by the trip duration. Each sample is
//! then given a target wall-clock time by linear interpolation across the
//! trip window, i.e. an assumed constant average speed.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;

use crate::errors::ForecastError;
use crate::services::geo::TrackPoint;

/// Fewest samples requested for a route with more than one point.
pub const MIN_SAMPLE_POINTS: usize = 2;

/// Most samples requested for any route.
pub const MAX_SAMPLE_POINTS: usize = 30;

/// Longest accepted trip (3 days).
pub const MAX_DURATION_HOURS: f64 = 72.0;

/// A route point chosen to anchor a forecast query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplePoint {
    pub point: TrackPoint,
    /// Position within the sample sequence (0-based)
    pub sequence_index: usize,
    /// Number of samples selected for the route
    pub total_samples: usize,
    /// Index of this point in the full route
    pub route_index: usize,
}

/// Planned ride window. `start_local` is wall-clock time at `utc_offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripWindow {
    pub start_local: NaiveDateTime,
    pub utc_offset: FixedOffset,
    pub duration_hours: f64,
}

impl TripWindow {
    /// Validate and build a trip window.
    pub fn new(
        start_local: NaiveDateTime,
        utc_offset: FixedOffset,
        duration_hours: f64,
    ) -> Result<Self, ForecastError> {
        // NaN passes range comparisons, so check finiteness first
        if !duration_hours.is_finite() {
            return Err(ForecastError::Geometry(
                "duration_hours must be a finite number".to_string(),
            ));
        }
        if duration_hours <= 0.0 || duration_hours > MAX_DURATION_HOURS {
            return Err(ForecastError::Geometry(format!(
                "duration_hours must be between 0 (exclusive) and {}",
                MAX_DURATION_HOURS as u64
            )));
        }
        Ok(Self {
            start_local,
            utc_offset,
            duration_hours,
        })
    }

    /// Local wall-clock time at which the trip ends.
    pub fn end_local(&self) -> NaiveDateTime {
        self.start_local + hours_to_duration(self.duration_hours)
    }
}

/// A sample point with the wall-clock time the rider is expected to pass it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastTarget {
    pub sample: SamplePoint,
    pub target_local: NaiveDateTime,
    pub target_utc: DateTime<Utc>,
}

/// Spacing between forecast samples for a trip of the given length.
pub fn sample_interval_hours(duration_hours: f64) -> f64 {
    if duration_hours <= 2.0 {
        0.5
    } else if duration_hours <= 6.0 {
        1.0
    } else {
        1.5
    }
}

/// How many samples to request: `clamp(ceil(d / interval) + 1, 2, 30)`.
///
/// This is an upper bound. `sample_indices` takes the interior indices from
/// `1..n-2`, so a route usually yields one sample fewer (4 for a 4 h trip).
pub fn points_to_fetch(duration_hours: f64) -> usize {
    let interval = sample_interval_hours(duration_hours);
    let raw = (duration_hours / interval).ceil() + 1.0;
    if !raw.is_finite() {
        return MIN_SAMPLE_POINTS;
    }
    (raw.max(0.0) as usize).clamp(MIN_SAMPLE_POINTS, MAX_SAMPLE_POINTS)
}

/// Route indices to sample for a route of `len` points.
///
/// Always index 0 and the last index; intermediate indices are
/// `i * floor(len / (n - 1))` for `i` in `1..n - 2`. Indices that would not
/// be strictly increasing (very short routes) are dropped.
pub fn sample_indices(len: usize, duration_hours: f64) -> Vec<usize> {
    match len {
        0 => return Vec::new(),
        1 => return vec![0],
        _ => {}
    }

    let n = points_to_fetch(duration_hours);
    let last = len - 1;
    let step = len / (n - 1);

    let mut indices = Vec::with_capacity(n);
    indices.push(0);
    for i in 1..n.saturating_sub(2) {
        let idx = i * step;
        if idx > indices[indices.len() - 1] && idx < last {
            indices.push(idx);
        }
    }
    indices.push(last);
    indices
}

/// Select evenly distributed sample points along a route.
pub fn select_sample_points(points: &[TrackPoint], duration_hours: f64) -> Vec<SamplePoint> {
    let indices = sample_indices(points.len(), duration_hours);
    let total = indices.len();
    indices
        .into_iter()
        .enumerate()
        .map(|(sequence_index, route_index)| SamplePoint {
            point: points[route_index],
            sequence_index,
            total_samples: total,
            route_index,
        })
        .collect()
}

/// Wall-clock target time for sample `index` of `total_samples`.
///
/// `start + (index / (total - 1)) * duration`; a single sample maps to start.
pub fn target_time(
    start_local: NaiveDateTime,
    duration_hours: f64,
    index: usize,
    total_samples: usize,
) -> NaiveDateTime {
    if total_samples <= 1 {
        return start_local;
    }
    let fraction = index as f64 / (total_samples - 1) as f64;
    start_local + hours_to_duration(duration_hours * fraction)
}

/// Interpret a local wall-clock time at a fixed offset as a UTC instant.
pub fn to_utc(local: NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    let utc_naive = local - Duration::seconds(i64::from(offset.local_minus_utc()));
    Utc.from_utc_datetime(&utc_naive)
}

/// Attach target times to every sample of a trip.
pub fn map_targets(samples: &[SamplePoint], trip: &TripWindow) -> Vec<ForecastTarget> {
    samples
        .iter()
        .map(|sample| {
            let target_local = target_time(
                trip.start_local,
                trip.duration_hours,
                sample.sequence_index,
                sample.total_samples,
            );
            ForecastTarget {
                sample: *sample,
                target_local,
                target_utc: to_utc(target_local, trip.utc_offset),
            }
        })
        .collect()
}

fn hours_to_duration(hours: f64) -> Duration {
    Duration::milliseconds((hours * 3_600_000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, 13)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn straight_route(len: usize) -> Vec<TrackPoint> {
        (0..len)
            .map(|i| TrackPoint::new(60.0 + i as f64 * 0.001, 10.0))
            .collect()
    }

    #[test]
    fn test_interval_tiers() {
        assert_eq!(sample_interval_hours(1.0), 0.5);
        assert_eq!(sample_interval_hours(2.0), 0.5);
        assert_eq!(sample_interval_hours(2.5), 1.0);
        assert_eq!(sample_interval_hours(6.0), 1.0);
        assert_eq!(sample_interval_hours(6.1), 1.5);
    }

    #[test]
    fn test_points_to_fetch() {
        assert_eq!(points_to_fetch(0.25), 2);
        assert_eq!(points_to_fetch(1.0), 3);
        assert_eq!(points_to_fetch(4.0), 5);
        assert_eq!(points_to_fetch(9.0), 7);
        assert_eq!(points_to_fetch(72.0), 30);
    }

    #[test]
    fn test_indices_include_ends_and_increase() {
        for &len in &[2usize, 3, 5, 17, 100, 1000, 5000] {
            for &duration in &[0.1, 1.0, 2.0, 3.5, 6.0, 8.0, 24.0, 72.0] {
                let indices = sample_indices(len, duration);
                assert_eq!(indices[0], 0);
                assert_eq!(*indices.last().unwrap(), len - 1);
                assert!(
                    (MIN_SAMPLE_POINTS..=MAX_SAMPLE_POINTS).contains(&indices.len()),
                    "len={} duration={} count={}",
                    len,
                    duration,
                    indices.len()
                );
                assert!(
                    indices.windows(2).all(|w| w[0] < w[1]),
                    "not strictly increasing for len={} duration={}: {:?}",
                    len,
                    duration,
                    indices
                );
                assert!(indices.len() <= points_to_fetch(duration));
            }
        }
    }

    #[test]
    fn test_indices_even_spacing() {
        // 4h → 5 requested, step floor(100 / 4) = 25
        assert_eq!(sample_indices(100, 4.0), vec![0, 25, 50, 99]);
    }

    #[test]
    fn test_indices_degenerate_routes() {
        assert!(sample_indices(0, 3.0).is_empty());
        assert_eq!(sample_indices(1, 3.0), vec![0]);
        assert_eq!(sample_indices(2, 24.0), vec![0, 1]);
    }

    #[test]
    fn test_three_point_route_one_hour() {
        let samples = select_sample_points(&straight_route(3), 1.0);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].route_index, 0);
        assert_eq!(samples[1].route_index, 2);
        assert!(samples.iter().all(|s| s.total_samples == 2));

        let trip = TripWindow::new(start(), FixedOffset::east_opt(0).unwrap(), 1.0).unwrap();
        let targets = map_targets(&samples, &trip);
        assert_eq!(targets[0].target_local, start());
        assert_eq!(targets[1].target_local, start() + Duration::hours(1));
    }

    #[test]
    fn test_target_time_linear() {
        assert_eq!(target_time(start(), 4.0, 0, 5), start());
        assert_eq!(target_time(start(), 4.0, 2, 5), start() + Duration::hours(2));
        assert_eq!(target_time(start(), 4.0, 4, 5), start() + Duration::hours(4));
    }

    #[test]
    fn test_target_time_single_sample() {
        assert_eq!(target_time(start(), 4.0, 0, 1), start());
    }

    #[test]
    fn test_target_time_fractional_hours() {
        assert_eq!(
            target_time(start(), 1.5, 1, 2),
            start() + Duration::minutes(90)
        );
    }

    #[test]
    fn test_to_utc_applies_offset() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let utc = to_utc(start(), offset);
        assert_eq!(utc.to_rfc3339(), "2026-06-13T06:00:00+00:00");
    }

    #[test]
    fn test_trip_window_validation() {
        let offset = FixedOffset::east_opt(0).unwrap();
        assert!(TripWindow::new(start(), offset, 0.0).is_err());
        assert!(TripWindow::new(start(), offset, -1.0).is_err());
        assert!(TripWindow::new(start(), offset, f64::NAN).is_err());
        assert!(TripWindow::new(start(), offset, 100.0).is_err());
        let trip = TripWindow::new(start(), offset, 3.0).unwrap();
        assert_eq!(trip.end_local(), start() + Duration::hours(3));
    }

    #[test]
    fn test_targets_monotonic() {
        let samples = select_sample_points(&straight_route(500), 7.0);
        let trip = TripWindow::new(start(), FixedOffset::east_opt(3600).unwrap(), 7.0).unwrap();
        let targets = map_targets(&samples, &trip);
        assert!(targets
            .windows(2)
            .all(|w| w[0].target_local <= w[1].target_local));
        assert_eq!(
            targets.last().unwrap().target_local,
            start() + Duration::hours(7)
        );
    }
}
