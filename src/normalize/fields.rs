//! Coercions for loosely typed JSON fields
//!
//! Directory servers are inconsistent about types: ids and weekdays
//! show up as numbers or numeric strings, durations as seconds or as
//! `HH:MM:SS`. Everything here returns `None` rather than failing.
use std::sync::LazyLock;

use chrono::NaiveTime;
use regex::Regex;
use serde_json::{Map, Value};

/// Separator used when several values were packed into one field.
pub const MULTIPLEX_DELIMITER: &str = "#@-@#";

pub const DEFAULT_DURATION_SECONDS: u32 = 3600;
pub const MAX_DURATION_SECONDS: u32 = 86_399;

static URL_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://+").expect("Invalid scheme regex"));

// Applied to the lowercased value, so `hotel:` inside a path is not a
// phone marker
static TEL_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^a-z])tel:").expect("Invalid tel regex"));

/// Non-empty, trimmed string value. Numbers are stringified.
pub fn string(raw: &Map<String, Value>, key: &str) -> Option<String> {
    let s = match raw.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if s.is_empty() { None } else { Some(s) }
}

pub fn unsigned(raw: &Map<String, Value>, key: &str) -> Option<u64> {
    match raw.get(key)? {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn signed(raw: &Map<String, Value>, key: &str) -> Option<i64> {
    match raw.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn float(raw: &Map<String, Value>, key: &str) -> Option<f64> {
    let f = match raw.get(key)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    if f.is_finite() { Some(f) } else { None }
}

/// Parses `HH:MM:SS` or `HH:MM`.
pub fn time_of_day(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// Meeting duration in seconds, clamped to `[0, 86400)`. Missing or
/// unparseable values fall back to one hour.
pub fn duration_seconds(raw: &Map<String, Value>, key: &str) -> u32 {
    let seconds = match raw.get(key) {
        Some(Value::String(s)) if s.contains(':') => hms_seconds(s),
        Some(_) => signed(raw, key),
        None => None,
    };
    match seconds {
        Some(s) if s < 0 => 0,
        Some(s) if s > i64::from(MAX_DURATION_SECONDS) => MAX_DURATION_SECONDS,
        Some(s) => s as u32,
        None => DEFAULT_DURATION_SECONDS,
    }
}

fn hms_seconds(s: &str) -> Option<i64> {
    let parts = s
        .trim()
        .split(':')
        .map(|p| p.parse::<i64>().ok())
        .collect::<Option<Vec<_>>>()?;
    let (h, m, s) = match parts.as_slice() {
        [h, m] => (*h, *m, 0),
        [h, m, s] => (*h, *m, *s),
        _ => return None,
    };
    h.checked_mul(3600)?
        .checked_add(m.checked_mul(60)?)?
        .checked_add(s)
}

/// Last segment of a multiplexed field, trimmed. `None` when empty.
pub fn last_segment(s: &str) -> Option<String> {
    let segment = s.rsplit(MULTIPLEX_DELIMITER).next().unwrap_or(s).trim();
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

/// Normalizes a virtual meeting link.
///
/// A `tel:` marker at the start of the value or after a non-letter
/// produces a `tel:` URL of whatever follows it. Anything else loses its scheme and gets
/// `https://`. Characters outside the URL safe set are percent-encoded
/// while existing escapes are left alone, so normalizing twice is a
/// no-op.
pub fn normalize_virtual_url(raw: &str) -> Option<String> {
    let value = last_segment(raw)?;
    let lower = value.to_ascii_lowercase();

    if let Some(marker) = TEL_MARKER.find(&lower) {
        let rest = value[marker.end()..].trim_start_matches('/').trim();
        if rest.is_empty() {
            return None;
        }
        return Some(format!("tel:{}", percent_encode_url(rest)));
    }

    let rest = URL_SCHEME.replace(&value, "");
    let rest = rest.trim_start_matches('/');
    if rest.is_empty() {
        return None;
    }
    Some(format!("https://{}", percent_encode_url(rest)))
}

fn percent_encode_url(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut buf = [0u8; 4];
    for ch in s.chars() {
        if ch.is_ascii_alphanumeric() || "-._~:/?#[]@!$&'()*+,;=%".contains(ch) {
            out.push(ch);
        } else {
            out.push_str(&urlencoding::encode(ch.encode_utf8(&mut buf)));
        }
    }
    out
}
