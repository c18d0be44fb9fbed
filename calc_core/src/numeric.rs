//! # Safe Arithmetic
//!
//! Every engine output crosses a stage boundary through the helpers in this
//! module. Two kinds of numeric leaves exist in a calculation result:
//!
//! - **Plain amounts** (revenue, cost, profit, percentages): must be finite.
//!   NaN and ±Infinity collapse to `0.0` via [`finite_or_zero`].
//! - **Sentinel periods/levels** (payback years, break-even points, leverage):
//!   `f64::INFINITY` is the documented "cannot recoup / cannot break even"
//!   value. NaN and -Infinity collapse to `+Infinity` via [`sentinel`].
//!
//! Note that `serde_json` writes non-finite floats as `null`, so a sentinel
//! leaf serializes as `null` in JSON output.
//!
//! ## Example
//!
//! ```rust
//! use calc_core::numeric::{finite_or_zero, margin_pct, sentinel};
//!
//! assert_eq!(finite_or_zero(f64::NAN), 0.0);
//! assert_eq!(sentinel(f64::NAN), f64::INFINITY);
//! assert_eq!(margin_pct(25.0, 100.0), 25.0);
//! assert_eq!(margin_pct(25.0, 0.5), 0.0); // revenue effectively zero
//! ```

/// Revenue magnitudes below this are treated as "no revenue" for every
/// derived percentage.
pub const MIN_REVENUE_MAGNITUDE: f64 = 1.0;

/// Replace NaN/±Infinity with 0.
#[inline]
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Normalize a sentinel-capable value: finite values and +Infinity pass
/// through, NaN and -Infinity become +Infinity.
#[inline]
pub fn sentinel(value: f64) -> f64 {
    if value.is_nan() || value == f64::NEG_INFINITY {
        f64::INFINITY
    } else {
        value
    }
}

/// Use `value` if it is finite and positive, otherwise `fallback`.
#[inline]
pub fn positive_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

/// `numerator / denominator`, or 0 when the quotient is not finite.
#[inline]
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    finite_or_zero(numerator / denominator)
}

/// `value * pct / 100` with both operands sanitized first.
#[inline]
pub fn pct_of(value: f64, pct: f64) -> f64 {
    finite_or_zero(finite_or_zero(value) * finite_or_zero(pct) / 100.0)
}

/// `amount * (100 - margin) / 100`: the cost share of a line whose gross
/// margin is `margin` percent.
#[inline]
pub fn cost_share(amount: f64, margin_pct: f64) -> f64 {
    finite_or_zero(finite_or_zero(amount) * (100.0 - finite_or_zero(margin_pct)) / 100.0)
}

/// Percentage of `part` relative to `revenue`, forced to exactly 0 when the
/// revenue magnitude is below [`MIN_REVENUE_MAGNITUDE`].
#[inline]
pub fn margin_pct(part: f64, revenue: f64) -> f64 {
    margin_pct_with(part, revenue, MIN_REVENUE_MAGNITUDE)
}

/// [`margin_pct`] with an explicit near-zero threshold.
#[inline]
pub fn margin_pct_with(part: f64, revenue: f64, min_magnitude: f64) -> f64 {
    let revenue = finite_or_zero(revenue);
    if revenue.abs() < min_magnitude {
        return 0.0;
    }
    finite_or_zero(finite_or_zero(part) / revenue * 100.0)
}

/// Years to recoup `investment` from an annual `profit`, or Infinity when
/// either is not positive.
#[inline]
pub fn payback_years(investment: f64, profit: f64) -> f64 {
    if profit > 0.0 && investment > 0.0 {
        sentinel(investment / profit)
    } else {
        f64::INFINITY
    }
}

/// Return on investment in percent, 0 when there is no investment.
#[inline]
pub fn roi_pct(profit: f64, investment: f64) -> f64 {
    if investment > 0.0 {
        finite_or_zero(profit / investment * 100.0)
    } else {
        0.0
    }
}

/// Sum of an iterator with every term sanitized.
pub fn safe_sum<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    finite_or_zero(values.into_iter().map(finite_or_zero).sum())
}

/// Stage-boundary sanitization applied by the orchestrator to every engine
/// output before it is handed to the next stage.
pub trait Sanitize {
    /// Return a copy with every plain leaf finite and every sentinel leaf
    /// either finite or +Infinity.
    fn sanitize(self) -> Self;
}

impl Sanitize for f64 {
    fn sanitize(self) -> Self {
        finite_or_zero(self)
    }
}

impl<T: Sanitize> Sanitize for Vec<T> {
    fn sanitize(self) -> Self {
        self.into_iter().map(Sanitize::sanitize).collect()
    }
}

impl<T: Sanitize> Sanitize for Option<T> {
    fn sanitize(self) -> Self {
        self.map(Sanitize::sanitize)
    }
}

/// Serde adapter for sentinel leaves: `+Infinity` is written as `null` and
/// `null` reads back as `+Infinity`.
pub mod serde_sentinel {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            s.serialize_f64(*value)
        } else {
            s.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::INFINITY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
    struct Period {
        #[serde(with = "serde_sentinel")]
        years: f64,
    }

    #[test]
    fn test_sentinel_serde() {
        let never = Period { years: f64::INFINITY };
        let json = serde_json::to_string(&never).unwrap();
        assert_eq!(json, r#"{"years":null}"#);
        assert_eq!(serde_json::from_str::<Period>(&json).unwrap(), never);

        let two = Period { years: 2.0 };
        let json = serde_json::to_string(&two).unwrap();
        assert_eq!(serde_json::from_str::<Period>(&json).unwrap(), two);
    }

    #[test]
    fn test_finite_or_zero() {
        assert_eq!(finite_or_zero(12.5), 12.5);
        assert_eq!(finite_or_zero(f64::NAN), 0.0);
        assert_eq!(finite_or_zero(f64::INFINITY), 0.0);
        assert_eq!(finite_or_zero(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_sentinel() {
        assert_eq!(sentinel(3.0), 3.0);
        assert_eq!(sentinel(f64::INFINITY), f64::INFINITY);
        assert_eq!(sentinel(f64::NEG_INFINITY), f64::INFINITY);
        assert_eq!(sentinel(f64::NAN), f64::INFINITY);
    }

    #[test]
    fn test_margin_guard() {
        assert_eq!(margin_pct(10.0, 0.0), 0.0);
        assert_eq!(margin_pct(-10.0, 0.99), 0.0);
        assert!((margin_pct(-50.0, 200.0) + 25.0).abs() < 1e-12);
        // magnitude, not sign, decides the guard
        assert!((margin_pct(10.0, -100.0) + 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_payback_sentinel() {
        assert_eq!(payback_years(100.0, 50.0), 2.0);
        assert_eq!(payback_years(100.0, 0.0), f64::INFINITY);
        assert_eq!(payback_years(100.0, -5.0), f64::INFINITY);
        assert_eq!(payback_years(0.0, 50.0), f64::INFINITY);
    }

    #[test]
    fn test_cost_share() {
        // 95% gross margin keeps 5% as cost
        assert!((cost_share(3_499_000.0, 95.0) - 174_950.0).abs() < 1e-6);
        assert_eq!(cost_share(f64::NAN, 50.0), 0.0);
        assert_eq!(cost_share(100.0, f64::NAN), 100.0);
    }

    #[test]
    fn test_safe_div_and_sum() {
        assert_eq!(safe_div(1.0, 0.0), 0.0);
        assert_eq!(safe_div(9.0, 3.0), 3.0);
        assert_eq!(safe_sum([1.0, f64::NAN, 2.0, f64::INFINITY]), 3.0);
    }

    #[test]
    fn test_positive_or() {
        assert_eq!(positive_or(0.0, 365.0), 365.0);
        assert_eq!(positive_or(-1.0, 365.0), 365.0);
        assert_eq!(positive_or(f64::NAN, 365.0), 365.0);
        assert_eq!(positive_or(360.0, 365.0), 360.0);
    }
}
