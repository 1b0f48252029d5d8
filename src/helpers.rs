//! Shared numeric helpers for turning raw forecast values into display values.
//!
//! yr.no fields are all optional floats and occasionally absent. These helpers
//! give every conversion the same policy: non-finite input (NaN, ±Inf) becomes
//! zero with a warning instead of leaking into the response.

/// Replace a non-finite value with 0.0, logging the replacement.
pub(crate) fn finite_or_zero(v: f64, field: &str) -> f64 {
    if !v.is_finite() {
        tracing::warn!("{} received non-finite value {}, defaulting to 0", field, v);
        return 0.0;
    }
    v
}

/// Round to 1 decimal place (precipitation, UV index).
pub(crate) fn round_1dp(v: f64) -> f64 {
    if !v.is_finite() {
        tracing::warn!("round_1dp received non-finite value {}, defaulting to 0", v);
        return 0.0;
    }
    (v * 10.0).round() / 10.0
}

/// Round to the nearest integer for whole-unit fields (°C, %, m/s, hPa).
pub(crate) fn round_to_int(v: f64) -> i32 {
    if !v.is_finite() {
        tracing::warn!("round_to_int received non-finite value {}, defaulting to 0", v);
        return 0;
    }
    v.round() as i32
}

/// Convert an optional field, treating `None` as zero.
pub(crate) fn opt_or_zero(v: Option<f64>, field: &str) -> f64 {
    v.map(|x| finite_or_zero(x, field)).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_1dp_normal() {
        assert_eq!(round_1dp(3.14), 3.1);
    }

    #[test]
    fn test_round_1dp_rounds_up() {
        assert_eq!(round_1dp(3.16), 3.2);
    }

    #[test]
    fn test_round_1dp_nan() {
        assert_eq!(round_1dp(f64::NAN), 0.0);
    }

    #[test]
    fn test_round_to_int() {
        assert_eq!(round_to_int(-4.6), -5);
        assert_eq!(round_to_int(12.4), 12);
    }

    #[test]
    fn test_round_to_int_infinity() {
        assert_eq!(round_to_int(f64::INFINITY), 0);
        assert_eq!(round_to_int(f64::NEG_INFINITY), 0);
    }

    #[test]
    fn test_finite_or_zero() {
        assert_eq!(finite_or_zero(7.5, "wind_speed"), 7.5);
        assert_eq!(finite_or_zero(f64::NAN, "wind_speed"), 0.0);
    }

    #[test]
    fn test_opt_or_zero() {
        assert_eq!(opt_or_zero(None, "pressure"), 0.0);
        assert_eq!(opt_or_zero(Some(1013.2), "pressure"), 1013.2);
    }
}
