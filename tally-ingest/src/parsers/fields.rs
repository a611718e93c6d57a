//! Cell parsers for amounts and dates as they appear in bank exports.
//!
//! Amounts:  "4.50", "$1,200.00", "(12.50)" (accounting negative), "- $14.05"
//! Dates:    "2024-01-05", "01/05/2024", "1/5/24", "2024-01-05 00:00:00"

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

static AMOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").expect("valid amount regex"));

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y", "%Y/%m/%d", "%d.%m.%Y"];

/// Parse a money cell. Returns `None` for blanks and anything that is not a number.
///
/// Commas are thousands separators. A comma followed by only one or two
/// digits at the end ("1.200,50", "12,5") is a decimal comma and is rejected.
pub fn parse_amount(raw: &str) -> Option<f64> {
    if has_decimal_comma(raw) {
        return None;
    }
    let mut s: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '$' | '€' | '£' | ','))
        .collect();
    if s.is_empty() {
        return None;
    }

    if s.starts_with('(') && s.ends_with(')') {
        s = format!("-{}", &s[1..s.len() - 1]);
    }

    if !AMOUNT_RE.is_match(&s) {
        return None;
    }
    s.parse::<f64>().ok().filter(|a| a.is_finite())
}

fn has_decimal_comma(raw: &str) -> bool {
    let body = raw.trim().trim_end_matches(')').trim_end();
    match body.rfind([',', '.']) {
        Some(pos) if body[pos..].starts_with(',') => {
            let tail = &body[pos + 1..];
            (1..=2).contains(&tail.len()) && tail.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

/// Parse a date cell in any of the common export formats.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(d) = try_formats(s) {
        return Some(d);
    }
    // Timestamps: keep the date part
    let date_part = s.split(['T', ' ']).next()?;
    try_formats(date_part)
}

fn try_formats(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}
