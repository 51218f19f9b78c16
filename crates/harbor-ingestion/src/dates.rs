//! Date normalization
//!
//! Every date stored on a document uses `DD/MM/YYYY`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

pub const DATE_FORMAT: &str = "%d/%m/%Y";

static DD_MM_YYYY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}/\d{2}/\d{4}$").unwrap());
static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").unwrap());
static ORDINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th)\b").unwrap());

const GENERIC_FORMATS: &[&str] = &[
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%d %B %Y",
    "%d %b %Y",
    "%d %B, %Y",
    "%d-%b-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
];

/// Normalize an extracted date string to `DD/MM/YYYY`.
///
/// `DD/MM/YYYY` passes through as-is and `YYYY-MM-DD` is reordered field by
/// field. Anything else is parsed against common formats; input that cannot
/// be parsed is returned unchanged.
pub fn normalize_date(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() || DD_MM_YYYY.is_match(trimmed) {
        return trimmed.to_string();
    }

    if let Some(caps) = ISO_DATE.captures(trimmed) {
        return format!("{}/{}/{}", &caps[3], &caps[2], &caps[1]);
    }

    match parse_generic(trimmed) {
        Some(date) => format_date(date),
        None => input.to_string(),
    }
}

/// Parse a stored `DD/MM/YYYY` date, tolerating the other accepted forms
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .ok()
        .or_else(|| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok())
        .or_else(|| parse_generic(trimmed))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_generic(input: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }

    let cleaned = ORDINAL.replace_all(input, "$1");
    GENERIC_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&cleaned, format).ok())
}
