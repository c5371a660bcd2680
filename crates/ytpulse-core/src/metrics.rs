//! Engagement-rate arithmetic.
//!
//! Pure functions, no I/O. Rates are percentages rounded half-up to two
//! decimal places.

/// Rounds to two decimal places, half away from zero.
///
/// Engagement rates are non-negative, so this is plain half-up rounding.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Per-video engagement rate: `(likes + comments) / views * 100`.
///
/// Returns `0.0` whenever `views <= 0`, regardless of likes or comments.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn engagement_rate(likes: i64, comments: i64, views: i64) -> f64 {
    if views <= 0 {
        return 0.0;
    }
    round2(((likes + comments) as f64 / views as f64) * 100.0)
}

/// Channel-level engagement rate: unweighted arithmetic mean of the
/// per-video rates, rounded to two places.
///
/// Each video weighs equally regardless of its view count. Callers must
/// not pass an empty slice; the report pipeline rejects zero-video
/// channels before this is reached.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn channel_engagement_rate(rates: &[f64]) -> f64 {
    debug_assert!(!rates.is_empty(), "mean of zero video rates is undefined");
    let sum: f64 = rates.iter().sum();
    round2(sum / rates.len() as f64)
}
