use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

// "July 4, 2024"
static MONTH_DAY_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z]+)\.?\s+(\d{1,2}),\s*(\d{4})").unwrap());
// "4 July 2024"
static DAY_MONTH_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})\s+([A-Za-z]+)\.?\s+(\d{4})").unwrap());
// "12 июля 2024"
static RUSSIAN_DAY_MONTH_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})\s+(\p{Cyrillic}+)\s+(\d{4})").unwrap());

const ENGLISH_MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june",
    "july", "august", "september", "october", "november", "december",
];

/// Russian genitive month names as they appear after a day number.
const RUSSIAN_GENITIVE_MONTHS: [&str; 12] = [
    "января", "февраля", "марта", "апреля", "мая", "июня",
    "июля", "августа", "сентября", "октября", "ноября", "декабря",
];

fn month_number(name: &str) -> Option<u32> {
    let name = name.to_ascii_lowercase();
    if name.len() < 3 {
        return None;
    }
    ENGLISH_MONTHS
        .iter()
        .position(|m| *m == name || (name.len() == 3 && m.starts_with(&name)))
        .map(|i| i as u32 + 1)
}

fn build(year: &str, month: u32, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month, day.parse().ok()?)
}

fn month_day_year(text: &str) -> Option<NaiveDate> {
    MONTH_DAY_YEAR_RE
        .captures_iter(text)
        .find_map(|c| build(&c[3], month_number(&c[1])?, &c[2]))
}

fn day_month_year(text: &str) -> Option<NaiveDate> {
    DAY_MONTH_YEAR_RE
        .captures_iter(text)
        .find_map(|c| build(&c[3], month_number(&c[2])?, &c[1]))
}

fn russian_month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    RUSSIAN_GENITIVE_MONTHS
        .iter()
        .position(|m| *m == name)
        .map(|i| i as u32 + 1)
}

fn russian_day_month_year(text: &str) -> Option<NaiveDate> {
    RUSSIAN_DAY_MONTH_YEAR_RE
        .captures_iter(text)
        .find_map(|c| build(&c[3], russian_month_number(&c[2])?, &c[1]))
}

/// Parse a posting date written in English or Russian, possibly embedded in a sentence.
///
/// Shapes are tried in order: `Month D, Y`, then `D Month Y`, then `D Month Y`
/// with a Russian genitive month name. Host locale is never consulted.
pub fn parse_posted_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.contains(',') {
        if let Some(d) = month_day_year(text) {
            return Some(d);
        }
    }
    day_month_year(text).or_else(|| russian_day_month_year(text))
}

/// Reduce a stored date cell to a calendar date regardless of how it was written.
pub fn normalize_stored_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("n/a") {
        return None;
    }
    for fmt in ["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.date_naive())
        .or_else(|| parse_posted_date(raw))
}
