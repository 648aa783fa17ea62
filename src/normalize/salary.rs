use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

// Patterns run against text with whitespace and thousands separators removed.
static RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:from|от)(\d*)(?:to|до)(\d*)").unwrap());
static LOWER_BOUND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:from|от)(\d+)").unwrap());
static UPPER_BOUND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:to|до)(\d+)").unwrap());
static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)").unwrap());

const LOCAL_TOKENS: &[&str] = &["so'm", "soʻm", "so‘m", "сўм", "сум", "uzs"];
const USD_TOKENS: &[&str] = &["$", "usd"];
const RUB_TOKENS: &[&str] = &["₽", "rub", "руб"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Currency {
    Local,
    Usd,
    Rub,
}

/// Fixed conversion rates into the local currency.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Rates {
    pub usd: f64,
    pub rub: f64,
}

impl Default for Rates {
    fn default() -> Self {
        Self {
            usd: 13000.0,
            rub: 150.0,
        }
    }
}

/// Detect the currency by substring, checking local tokens first, then USD, then RUB.
pub fn detect_currency(text: &str) -> Option<Currency> {
    let lower = text.to_lowercase();
    let has = |tokens: &[&str]| tokens.iter().any(|t| lower.contains(t));
    if has(LOCAL_TOKENS) {
        Some(Currency::Local)
    } else if has(USD_TOKENS) {
        Some(Currency::Usd)
    } else if has(RUB_TOKENS) {
        Some(Currency::Rub)
    } else {
        None
    }
}

fn compact(text: &str) -> String {
    text.to_lowercase()
        .replace("none", "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && *c != '\u{a0}' && *c != '\u{202f}')
        .collect()
}

fn median(min: &str, max: &str) -> Option<u64> {
    // A missing bound takes the value of the other one; both missing is not a salary.
    let (min, max) = match (min.is_empty(), max.is_empty()) {
        (true, true) => return None,
        (true, false) => (max, max),
        (false, true) => (min, min),
        (false, false) => (min, max),
    };
    let min: u64 = min.parse().ok()?;
    let max: u64 = max.parse().ok()?;
    Some(min.checked_add(max)? / 2)
}

/// Extract the amount stated in the text, before any currency conversion.
pub fn parse_amount(text: &str) -> Option<u64> {
    let compacted = compact(text);
    if let Some(c) = RANGE_RE.captures(&compacted) {
        return median(&c[1], &c[2]);
    }
    if let Some(c) = LOWER_BOUND_RE.captures(&compacted) {
        return median(&c[1], "");
    }
    if let Some(c) = UPPER_BOUND_RE.captures(&compacted) {
        return median("", &c[1]);
    }
    AMOUNT_RE
        .captures(&compacted)
        .and_then(|c| c[1].parse().ok())
}

/// Parse a salary blob into a single amount in the local currency.
///
/// Ranges collapse to `floor((min + max) / 2)`. Unknown currency or no digits gives `None`.
pub fn parse_salary(text: &str, rates: &Rates) -> Option<u64> {
    if text.trim().is_empty() {
        return None;
    }
    let currency = detect_currency(text)?;
    let amount = parse_amount(text)?;
    match currency {
        Currency::Local => Some(amount),
        Currency::Usd => convert(amount, rates.usd),
        Currency::Rub => convert(amount, rates.rub),
    }
}

fn convert(amount: u64, rate: f64) -> Option<u64> {
    if !rate.is_finite() || rate < 0.0 {
        return None;
    }
    Some((amount as f64 * rate).floor() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates() -> Rates {
        Rates {
            usd: 12500.0,
            rub: 140.0,
        }
    }

    #[test]
    fn usd_range_uses_median() {
        assert_eq!(parse_salary("from 800 to 2 000 $ after taxes", &rates()), Some(1400 * 12500));
        assert_eq!(parse_salary("from 800 to 2000 $", &rates()), Some(1400 * 12500));
    }

    #[test]
    fn odd_range_floors() {
        assert_eq!(parse_salary("от 1 до 2 UZS", &rates()), Some(1));
    }

    #[test]
    fn rub_single_amount() {
        assert_eq!(parse_salary("15 000 ₽ after taxes", &rates()), Some(140 * 15000));
        assert_eq!(parse_salary("15000 ₽", &rates()), Some(140 * 15000));
    }

    #[test]
    fn local_currency_passes_through() {
        assert_eq!(parse_salary("10000000 so'm", &rates()), Some(10_000_000));
        assert_eq!(
            parse_salary("от 10 000 000 до 20 000 000 so'm до вычета налогов", &rates()),
            Some(15_000_000)
        );
    }

    #[test]
    fn missing_bound_takes_the_other() {
        assert_eq!(parse_salary("до 1 000 $ до вычета налогов", &rates()), Some(1000 * 12500));
        assert_eq!(parse_salary("from 3 000 000 so'm", &rates()), Some(3_000_000));
        assert_eq!(parse_salary("None UZS to 20800000 UZS", &rates()), Some(20_800_000));
    }

    #[test]
    fn range_without_bounds_is_na() {
        assert_eq!(parse_amount("from to UZS"), None);
    }

    #[test]
    fn local_currency_wins_over_usd() {
        assert_eq!(detect_currency("5 000 000 сум ($400)"), Some(Currency::Local));
    }

    #[test]
    fn unusable_input() {
        assert_eq!(parse_salary("", &rates()), None);
        assert_eq!(parse_salary("N/A", &rates()), None);
        assert_eq!(parse_salary("1000 EUR", &rates()), None);
        assert_eq!(parse_salary("зарплата не указана $", &rates()), None);
    }
}
