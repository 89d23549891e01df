//! Calendar-date extraction from provider timestamps.
//!
//! Header dates vary by sending client, so [`parse_message_date`] tries a
//! series of formats before giving up. Whatever the format, the result is the
//! calendar date as written: the offset is dropped, not applied.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use mailrule_error::MailError;

const RULE_DATE_FORMAT: &str = "%Y-%m-%d";

const OFFSET_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
    "%d-%b-%Y %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S %z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M",
    "%d-%b-%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%a %b %e %H:%M:%S %Y",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d %b %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %B %Y",
];

/// Parses a `YYYY-MM-DD` literal from a rule.
pub fn parse_rule_date(value: &str) -> Result<NaiveDate, MailError> {
    NaiveDate::parse_from_str(value.trim(), RULE_DATE_FORMAT)
        .map_err(|e| MailError::date_parse(format!("rule value {value:?} is not YYYY-MM-DD: {e}")))
}

/// Parses a message timestamp in any of the formats mail providers emit.
pub fn parse_message_date(raw: &str) -> Result<NaiveDate, MailError> {
    let cleaned = strip_comments(raw);
    let text = strip_weekday(cleaned.trim());
    if text.is_empty() {
        return Err(MailError::date_parse(format!("message date {raw:?} is empty")));
    }

    let parsed = parse_with_offset(text)
        .or_else(|| parse_naive(text))
        .or_else(|| strip_zone_name(text).and_then(parse_naive));

    match parsed {
        Some(date) => Ok(date),
        None => Err(MailError::date_parse(format!(
            "message date {raw:?} has no recognizable format"
        ))),
    }
}

fn parse_with_offset(text: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(text, fmt).ok())
        .map(|dt| dt.date_naive())
}

fn parse_naive(text: &str) -> Option<NaiveDate> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        })
}

// Trailing zone abbreviations ("UTC", "CEST") are not all understood by the
// offset parsers; the offset is discarded anyway.
fn strip_zone_name(text: &str) -> Option<&str> {
    let (head, last) = text.rsplit_once(char::is_whitespace)?;
    if !last.is_empty() && last.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(head.trim_end())
    } else {
        None
    }
}

// chrono rejects a weekday that disagrees with the date; the written date wins.
fn strip_weekday(text: &str) -> &str {
    match text.split_once(',') {
        Some((day, rest)) if !day.is_empty() && day.chars().all(|c| c.is_ascii_alphabetic()) => {
            rest.trim_start()
        }
        _ => text,
    }
}

fn strip_comments(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for ch in raw.chars() {
        match ch {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}
