//! Best-effort parsing of feed timestamps.
//!
//! The feed delivers human-readable timestamps such as
//! `"September 08, 2025 at 02:39PM"`. Parsing never fails loudly: an
//! unparseable value is logged and the item is stored without a parsed
//! timestamp.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

const NAIVE_DATETIME_FORMATS: &[&str] = &[
  "%B %d, %Y %I:%M%p",
  "%B %d, %Y %I:%M %p",
  "%B %d, %Y %I:%M:%S%p",
  "%B %d, %Y %I:%M:%S %p",
  "%B %d, %Y %H:%M",
  "%Y-%m-%dT%H:%M:%S",
  "%Y-%m-%d %H:%M:%S",
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y-%m-%dT%H:%M",
  "%Y-%m-%d %H:%M",
  "%m/%d/%Y %H:%M:%S",
  "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%B %d, %Y", "%m/%d/%Y"];

const NAIVE_OUTPUT: &str = "%Y-%m-%dT%H:%M:%S";
const OFFSET_OUTPUT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Parse a raw feed timestamp into an ISO 8601 string.
///
/// Returns `None` for empty or unparseable input.
pub fn parse_timestamp(raw: &str) -> Option<String> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }

  let normalized = trimmed.replace(" at ", " ");
  let parsed = parse_normalized(&normalized);
  if parsed.is_none() {
    tracing::warn!(raw, "failed to parse timestamp");
  }
  parsed
}

fn parse_normalized(s: &str) -> Option<String> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.format(OFFSET_OUTPUT).to_string());
  }
  if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
    return Some(dt.format(OFFSET_OUTPUT).to_string());
  }

  NAIVE_DATETIME_FORMATS
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    .or_else(|| {
      DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
    .map(|dt| dt.format(NAIVE_OUTPUT).to_string())
}
