//! Derived weather quantities.
//!
//! Everything here is a pure function of forecast values and route geometry:
//! feels-like temperature, per-hour precipitation, human-readable symbol
//! descriptions, compass labels, and the wind effect a rider feels on each
//! route segment.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::helpers::{finite_or_zero, round_1dp};
use crate::services::geo::{bearing_degrees, haversine_distance_km, midpoint, TrackPoint};
use crate::services::yr::TimeseriesEntry;

/// Description used when no symbol code is available.
pub const UNKNOWN_DESCRIPTION: &str = "Ukjent";

/// Below this wind speed (m/s) the direction does not matter to a rider.
const LIGHT_WIND_MS: f64 = 2.0;

/// Calculate the "feels like" temperature.
///
/// - Wind chill (North American index) when T < 10°C and wind > 1.3 m/s:
///   `13.12 + 0.6215*T - 11.37*V^0.16 + 0.3965*T*V^0.16`, V in km/h.
/// - Heat index (Rothfusz regression, Celsius coefficients) when T > 20°C
///   and relative humidity > 40%.
/// - Otherwise the air temperature itself.
///
/// The two ranges are disjoint, so at most one adjustment applies.
pub fn calculate_feels_like(temperature_c: f64, wind_speed_ms: f64, humidity_pct: f64) -> f64 {
    let t = finite_or_zero(temperature_c, "temperature_c");
    let wind = finite_or_zero(wind_speed_ms, "wind_speed_ms");
    let rh = finite_or_zero(humidity_pct, "humidity_pct");

    if t < 10.0 && wind > 1.3 {
        let v016 = (wind * 3.6).powf(0.16);
        return 13.12 + 0.6215 * t - 11.37 * v016 + 0.3965 * t * v016;
    }

    if t > 20.0 && rh > 40.0 {
        return -8.784_694_755_56 + 1.611_394_11 * t + 2.338_548_838_89 * rh
            - 0.146_116_05 * t * rh
            - 0.012_308_094 * t * t
            - 0.016_424_827_777_8 * rh * rh
            + 0.002_211_732 * t * t * rh
            + 0.000_725_46 * t * rh * rh
            - 0.000_003_582 * t * t * rh * rh;
    }

    t
}

/// Precipitation in mm for the hour following an entry.
///
/// Prefers `next_1_hours`; otherwise spreads the 6 h or 12 h amount evenly,
/// rounded to 1 decimal place. Missing data counts as no precipitation.
pub fn normalize_precipitation(entry: &TimeseriesEntry) -> f64 {
    let amount = |period: &Option<crate::services::yr::Period>| {
        period
            .as_ref()
            .and_then(|p| p.details.as_ref())
            .and_then(|d| d.precipitation_amount)
            .filter(|v| v.is_finite())
    };

    if let Some(mm) = amount(&entry.data.next_1_hours) {
        return mm;
    }
    if let Some(mm) = amount(&entry.data.next_6_hours) {
        return round_1dp(mm / 6.0);
    }
    if let Some(mm) = amount(&entry.data.next_12_hours) {
        return round_1dp(mm / 12.0);
    }
    0.0
}

/// Norwegian label for a yr.no symbol code, if the code is known.
fn symbol_label(code: &str) -> Option<&'static str> {
    let label = match code {
        "clearsky_day" | "clearsky_polartwilight" => "Klarvær",
        "clearsky_night" => "Klar natt",
        "clearsky" => "Klarvær",
        "fair" => "Lettskyet",
        "partlycloudy" => "Delvis skyet",
        "cloudy" => "Skyet",
        "fog" => "Tåke",
        "lightrainshowers" => "Lette regnbyger",
        "rainshowers" => "Regnbyger",
        "heavyrainshowers" => "Kraftige regnbyger",
        "lightrainshowersandthunder" => "Lette regnbyger og torden",
        "rainshowersandthunder" => "Regnbyger og torden",
        "heavyrainshowersandthunder" => "Kraftige regnbyger og torden",
        "lightsleetshowers" => "Lette sluddbyger",
        "sleetshowers" => "Sluddbyger",
        "heavysleetshowers" => "Kraftige sluddbyger",
        "lightsleetshowersandthunder" => "Lette sluddbyger og torden",
        "sleetshowersandthunder" => "Sluddbyger og torden",
        "heavysleetshowersandthunder" => "Kraftige sluddbyger og torden",
        "lightsnowshowers" => "Lette snøbyger",
        "snowshowers" => "Snøbyger",
        "heavysnowshowers" => "Kraftige snøbyger",
        // yr.no spells this one with a double "s"
        "lightssnowshowersandthunder" | "lightsnowshowersandthunder" => "Lette snøbyger og torden",
        "snowshowersandthunder" => "Snøbyger og torden",
        "heavysnowshowersandthunder" => "Kraftige snøbyger og torden",
        "lightrain" => "Lett regn",
        "rain" => "Regn",
        "heavyrain" => "Kraftig regn",
        "lightrainandthunder" => "Lett regn og torden",
        "rainandthunder" => "Regn og torden",
        "heavyrainandthunder" => "Kraftig regn og torden",
        "lightsleet" => "Lett sludd",
        "sleet" => "Sludd",
        "heavysleet" => "Kraftig sludd",
        "lightsleetandthunder" => "Lett sludd og torden",
        "sleetandthunder" => "Sludd og torden",
        "heavysleetandthunder" => "Kraftig sludd og torden",
        "lightsnow" => "Lett snø",
        "snow" => "Snø",
        "heavysnow" => "Kraftig snø",
        "lightsnowandthunder" => "Lett snø og torden",
        "snowandthunder" => "Snø og torden",
        "heavysnowandthunder" => "Kraftig snø og torden",
        _ => return None,
    };
    Some(label)
}

/// Human-readable description of a yr.no symbol code.
///
/// Exact match first, then the code without its `_day`/`_night`/
/// `_polartwilight` suffix, then the raw code capitalized.
pub fn describe_symbol(symbol_code: Option<&str>) -> String {
    let code = match symbol_code.map(str::trim) {
        Some(c) if !c.is_empty() => c,
        _ => return UNKNOWN_DESCRIPTION.to_string(),
    };

    if let Some(label) = symbol_label(code) {
        return label.to_string();
    }

    let base = ["_day", "_night", "_polartwilight"]
        .iter()
        .find_map(|suffix| code.strip_suffix(suffix))
        .unwrap_or(code);
    if let Some(label) = symbol_label(base) {
        return label.to_string();
    }

    capitalize(code)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

const COMPASS_POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

/// 8-point compass label for a direction in degrees.
pub fn compass_point(degrees: f64) -> &'static str {
    let deg = finite_or_zero(degrees, "wind_direction").rem_euclid(360.0);
    let idx = (deg / 45.0).round() as usize % 8;
    COMPASS_POINTS[idx]
}

/// Wind direction formatted as `"<compass> (<degrees>°)"`, e.g. `"SW (225°)"`.
pub fn wind_direction_label(degrees: f64) -> String {
    let deg = finite_or_zero(degrees, "wind_direction");
    format!("{} ({}°)", compass_point(deg), deg.round() as i64)
}

/// How the wind acts on a rider moving along a bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WindEffect {
    Headwind,
    Tailwind,
    Crosswind,
    Light,
}

/// Classify wind relative to the direction of travel.
///
/// `wind_from_deg` is the meteorological direction the wind blows *from*.
pub fn classify_wind_effect(wind_from_deg: f64, bearing_deg: f64, wind_speed_ms: f64) -> WindEffect {
    if finite_or_zero(wind_speed_ms, "wind_speed") < LIGHT_WIND_MS {
        return WindEffect::Light;
    }

    let wind_to = (wind_from_deg + 180.0).rem_euclid(360.0);
    let mut diff = (wind_to - bearing_deg.rem_euclid(360.0)).abs();
    if diff > 180.0 {
        diff = 360.0 - diff;
    }

    if diff <= 45.0 {
        WindEffect::Tailwind
    } else if diff >= 135.0 {
        WindEffect::Headwind
    } else {
        WindEffect::Crosswind
    }
}

/// Wind at a forecast sample point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindSample {
    pub point: TrackPoint,
    pub speed_ms: f64,
    pub from_deg: f64,
}

/// Wind estimated at an arbitrary position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolatedWind {
    pub speed_ms: f64,
    pub from_deg: f64,
}

/// Inverse-distance-weighted wind between the two samples nearest to
/// `position`.
///
/// Directions more than 180° apart are unwrapped before averaging so that
/// e.g. 350° and 10° average to 0° rather than 180°.
pub fn interpolate_wind(position: &TrackPoint, samples: &[WindSample]) -> Option<InterpolatedWind> {
    let mut by_distance: Vec<(f64, &WindSample)> = samples
        .iter()
        .map(|s| (haversine_distance_km(position, &s.point), s))
        .filter(|(d, _)| d.is_finite())
        .collect();
    by_distance.sort_by(|a, b| a.0.total_cmp(&b.0));

    let (d1, s1) = *by_distance.first()?;
    let Some(&(d2, s2)) = by_distance.get(1) else {
        return Some(InterpolatedWind {
            speed_ms: s1.speed_ms,
            from_deg: s1.from_deg,
        });
    };

    if d1 <= f64::EPSILON {
        return Some(InterpolatedWind {
            speed_ms: s1.speed_ms,
            from_deg: s1.from_deg,
        });
    }

    let w1 = 1.0 / d1;
    let w2 = 1.0 / d2;
    let total = w1 + w2;

    let speed_ms = (s1.speed_ms * w1 + s2.speed_ms * w2) / total;

    let mut a1 = s1.from_deg;
    let mut a2 = s2.from_deg;
    if (a1 - a2).abs() > 180.0 {
        if a1 < a2 {
            a1 += 360.0;
        } else {
            a2 += 360.0;
        }
    }
    let from_deg = ((a1 * w1 + a2 * w2) / total).rem_euclid(360.0);

    Some(InterpolatedWind { speed_ms, from_deg })
}

/// Wind effect on one route segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SegmentWind {
    /// Index of the segment's first point in the route
    pub start_index: usize,
    pub from: TrackPoint,
    pub to: TrackPoint,
    /// Direction of travel in degrees
    pub bearing: f64,
    /// Interpolated wind speed in m/s (1 dp)
    pub wind_speed: f64,
    /// Interpolated wind direction in degrees (wind blowing from)
    pub wind_from_direction: f64,
    pub effect: WindEffect,
}

/// Wind effect for every pair of consecutive route points.
///
/// Wind is interpolated at each segment midpoint. Returns an empty list when
/// there are no wind samples or fewer than two route points.
pub fn segment_wind_effects(points: &[TrackPoint], samples: &[WindSample]) -> Vec<SegmentWind> {
    if samples.is_empty() {
        return Vec::new();
    }

    points
        .windows(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            let (from, to) = (pair[0], pair[1]);
            let wind = interpolate_wind(&midpoint(&from, &to), samples)?;
            let bearing = bearing_degrees(&from, &to);
            Some(SegmentWind {
                start_index: i,
                from,
                to,
                bearing: round_1dp(bearing),
                wind_speed: round_1dp(wind.speed_ms),
                wind_from_direction: round_1dp(wind.from_deg),
                effect: classify_wind_effect(wind.from_deg, bearing, wind.speed_ms),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::yr::{EntryData, Instant, InstantDetails, Period, PeriodDetails};

    fn entry_with_periods(
        next_1: Option<f64>,
        next_6: Option<f64>,
        next_12: Option<f64>,
    ) -> TimeseriesEntry {
        let period = |mm: Option<f64>| {
            mm.map(|amount| Period {
                summary: None,
                details: Some(PeriodDetails {
                    precipitation_amount: Some(amount),
                }),
            })
        };
        TimeseriesEntry {
            time: "2026-06-13T08:00:00Z".parse().unwrap(),
            data: EntryData {
                instant: Instant {
                    details: InstantDetails::default(),
                },
                next_1_hours: period(next_1),
                next_6_hours: period(next_6),
                next_12_hours: period(next_12),
            },
        }
    }

    // --- Feels-like ---

    #[test]
    fn test_feels_like_wind_chill() {
        let result = calculate_feels_like(0.0, 5.0, 80.0);
        assert!(result < 0.0, "wind chill should apply: {}", result);
    }

    #[test]
    fn test_feels_like_heat_index() {
        let result = calculate_feels_like(25.0, 3.0, 60.0);
        assert!((result - 25.0).abs() > 0.1, "heat index should apply: {}", result);
    }

    #[test]
    fn test_feels_like_neutral_range() {
        assert_eq!(calculate_feels_like(15.0, 8.0, 90.0), 15.0);
    }

    #[test]
    fn test_feels_like_calm_cold() {
        // Wind at or below 1.3 m/s: no chill
        assert_eq!(calculate_feels_like(-5.0, 1.3, 50.0), -5.0);
    }

    #[test]
    fn test_feels_like_dry_heat() {
        assert_eq!(calculate_feels_like(28.0, 1.0, 30.0), 28.0);
    }

    #[test]
    fn test_feels_like_nan_input() {
        assert_eq!(calculate_feels_like(f64::NAN, 5.0, 50.0), calculate_feels_like(0.0, 5.0, 50.0));
    }

    // --- Precipitation ---

    #[test]
    fn test_precipitation_prefers_next_hour() {
        assert_eq!(normalize_precipitation(&entry_with_periods(Some(0.7), Some(6.0), None)), 0.7);
    }

    #[test]
    fn test_precipitation_six_hour_average() {
        assert_eq!(normalize_precipitation(&entry_with_periods(None, Some(2.0), Some(9.0))), 0.3);
    }

    #[test]
    fn test_precipitation_twelve_hour_average() {
        assert_eq!(normalize_precipitation(&entry_with_periods(None, None, Some(3.0))), 0.3);
    }

    #[test]
    fn test_precipitation_missing() {
        assert_eq!(normalize_precipitation(&entry_with_periods(None, None, None)), 0.0);
    }

    // --- Descriptions ---

    #[test]
    fn test_describe_exact_match() {
        assert_eq!(describe_symbol(Some("clearsky_night")), "Klar natt");
        assert_eq!(describe_symbol(Some("cloudy")), "Skyet");
    }

    #[test]
    fn test_describe_strips_suffix() {
        assert_eq!(describe_symbol(Some("lightrainshowers_day")), "Lette regnbyger");
        assert_eq!(describe_symbol(Some("fair_polartwilight")), "Lettskyet");
        assert_eq!(describe_symbol(Some("partlycloudy_night")), "Delvis skyet");
    }

    #[test]
    fn test_describe_unknown_code() {
        assert_eq!(describe_symbol(Some("sandstorm_day")), "Sandstorm_day");
    }

    #[test]
    fn test_describe_missing_code() {
        assert_eq!(describe_symbol(None), UNKNOWN_DESCRIPTION);
        assert_eq!(describe_symbol(Some("  ")), UNKNOWN_DESCRIPTION);
    }

    // --- Compass ---

    #[test]
    fn test_wind_direction_label() {
        assert_eq!(wind_direction_label(0.0), "N (0°)");
        assert_eq!(wind_direction_label(225.0), "SW (225°)");
        assert_eq!(wind_direction_label(100.4), "E (100°)");
        assert_eq!(wind_direction_label(350.0), "N (350°)");
    }

    #[test]
    fn test_compass_point_boundaries() {
        assert_eq!(compass_point(22.4), "N");
        assert_eq!(compass_point(22.5), "NE");
        assert_eq!(compass_point(337.5), "N");
        assert_eq!(compass_point(-45.0), "NW");
    }

    // --- Wind effect ---

    #[test]
    fn test_tailwind() {
        // Heading north, wind from the south
        assert_eq!(classify_wind_effect(180.0, 0.0, 5.0), WindEffect::Tailwind);
    }

    #[test]
    fn test_headwind() {
        assert_eq!(classify_wind_effect(0.0, 0.0, 5.0), WindEffect::Headwind);
    }

    #[test]
    fn test_crosswind() {
        assert_eq!(classify_wind_effect(90.0, 0.0, 5.0), WindEffect::Crosswind);
    }

    #[test]
    fn test_light_wind_ignores_direction() {
        assert_eq!(classify_wind_effect(0.0, 0.0, 1.0), WindEffect::Light);
        assert_eq!(classify_wind_effect(180.0, 0.0, 1.9), WindEffect::Light);
    }

    #[test]
    fn test_wind_effect_wraps_around_north() {
        // Heading 350°, wind from 160° blows towards 340°: 10° off the bearing
        assert_eq!(classify_wind_effect(160.0, 350.0, 6.0), WindEffect::Tailwind);
    }

    #[test]
    fn test_wind_effect_boundaries() {
        // Exactly 45° and 135° off the direction of travel
        assert_eq!(classify_wind_effect(225.0, 0.0, 5.0), WindEffect::Tailwind);
        assert_eq!(classify_wind_effect(315.0, 0.0, 5.0), WindEffect::Headwind);
    }

    // --- Interpolation ---

    #[test]
    fn test_interpolate_single_sample() {
        let samples = [WindSample {
            point: TrackPoint::new(60.0, 10.0),
            speed_ms: 4.0,
            from_deg: 270.0,
        }];
        let wind = interpolate_wind(&TrackPoint::new(60.5, 10.0), &samples).unwrap();
        assert_eq!(wind.speed_ms, 4.0);
        assert_eq!(wind.from_deg, 270.0);
    }

    #[test]
    fn test_interpolate_no_samples() {
        assert!(interpolate_wind(&TrackPoint::new(60.0, 10.0), &[]).is_none());
    }

    #[test]
    fn test_interpolate_midway() {
        let samples = [
            WindSample {
                point: TrackPoint::new(60.0, 10.0),
                speed_ms: 2.0,
                from_deg: 90.0,
            },
            WindSample {
                point: TrackPoint::new(60.2, 10.0),
                speed_ms: 6.0,
                from_deg: 130.0,
            },
        ];
        let wind = interpolate_wind(&TrackPoint::new(60.1, 10.0), &samples).unwrap();
        assert!((wind.speed_ms - 4.0).abs() < 1e-6);
        assert!((wind.from_deg - 110.0).abs() < 1e-6);
    }

    #[test]
    fn test_interpolate_direction_across_north() {
        let samples = [
            WindSample {
                point: TrackPoint::new(60.0, 10.0),
                speed_ms: 5.0,
                from_deg: 350.0,
            },
            WindSample {
                point: TrackPoint::new(60.2, 10.0),
                speed_ms: 5.0,
                from_deg: 10.0,
            },
        ];
        let wind = interpolate_wind(&TrackPoint::new(60.1, 10.0), &samples).unwrap();
        let off_north = wind.from_deg.min(360.0 - wind.from_deg);
        assert!(off_north < 1e-6, "expected ~0°, got {}", wind.from_deg);
    }

    #[test]
    fn test_interpolate_on_sample_point() {
        let samples = [
            WindSample {
                point: TrackPoint::new(60.0, 10.0),
                speed_ms: 3.0,
                from_deg: 45.0,
            },
            WindSample {
                point: TrackPoint::new(61.0, 10.0),
                speed_ms: 9.0,
                from_deg: 200.0,
            },
        ];
        let wind = interpolate_wind(&TrackPoint::new(60.0, 10.0), &samples).unwrap();
        assert_eq!(wind.speed_ms, 3.0);
        assert_eq!(wind.from_deg, 45.0);
    }

    #[test]
    fn test_segment_wind_effects() {
        let route = vec![
            TrackPoint::new(60.0, 10.0),
            TrackPoint::new(60.1, 10.0),
            TrackPoint::new(60.0, 10.0),
        ];
        let samples = [WindSample {
            point: TrackPoint::new(60.05, 10.0),
            speed_ms: 6.0,
            from_deg: 180.0,
        }];
        let segments = segment_wind_effects(&route, &samples);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start_index, 0);
        assert_eq!(segments[0].effect, WindEffect::Tailwind);
        assert_eq!(segments[1].effect, WindEffect::Headwind);
    }

    #[test]
    fn test_segment_wind_effects_without_samples() {
        let route = vec![TrackPoint::new(60.0, 10.0), TrackPoint::new(60.1, 10.0)];
        assert!(segment_wind_effects(&route, &[]).is_empty());
    }
}
