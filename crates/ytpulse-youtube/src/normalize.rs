//! Channel-identifier normalization.

/// Canonical prefix of every YouTube channel ID.
pub const CHANNEL_ID_PREFIX: &str = "UC";

/// Returns the canonical, prefixed form of a raw channel identifier.
///
/// Trims surrounding whitespace and prepends `UC` unless the input
/// already starts with it. Idempotent: normalizing twice yields the
/// same value. An input that is exactly the prefix normalizes to
/// itself; the subsequent channel lookup simply fails with not-found.
#[must_use]
pub fn normalize_channel_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with(CHANNEL_ID_PREFIX) {
        trimmed.to_owned()
    } else {
        format!("{CHANNEL_ID_PREFIX}{trimmed}")
    }
}
