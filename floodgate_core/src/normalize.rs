//! Field normalization and timestamp parsing.
//!
//! Normalization is idempotent and side-effect free: applying it twice
//! yields the same event. It runs before validation, so the validation
//! checks can assume trimmed fields and an upper-cased severity.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{InvalidTimestampSnafu, ValidationError};
use crate::event::LogEvent;

/// Naive formats assumed to be UTC when no offset is present.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Normalize an event in place.
///
/// - trims `id`, `tenant_id`, `source`, `message`, `trace_id`, `span_id`,
///   and every metadata key and value
/// - lower-cases `source` and metadata keys
/// - upper-cases `severity`
pub fn normalize(event: &mut LogEvent) {
    event.id = event.id.trim().to_owned();
    event.tenant_id = event.tenant_id.trim().to_owned();
    event.source = event.source.trim().to_lowercase();
    event.message = event.message.trim().to_owned();
    event.severity = event.severity.trim().to_uppercase();
    event.trace_id = normalize_optional(event.trace_id.take());
    event.span_id = normalize_optional(event.span_id.take());

    if !event.metadata.is_empty() {
        let mut normalized = BTreeMap::new();
        for (key, value) in std::mem::take(&mut event.metadata) {
            normalized.insert(key.trim().to_lowercase(), value.trim().to_owned());
        }
        event.metadata = normalized;
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    let trimmed = value?.trim().to_owned();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Parse a client-supplied timestamp string into a UTC instant.
///
/// Formats are attempted in order: RFC 3339 (including fractional seconds
/// and a trailing `Z`), `YYYY-MM-DDTHH:MM:SS` and `YYYY-MM-DD HH:MM:SS`
/// (assumed UTC), RFC 1123/2822, and Unix date style
/// (`Mon Jan  2 15:04:05 UTC 2006`).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(parsed.and_utc());
        }
    }

    if let Ok(parsed) = DateTime::parse_from_rfc2822(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    if let Some(parsed) = parse_unix_date(raw) {
        return Ok(parsed);
    }

    InvalidTimestampSnafu.fail()
}

/// Parse `Mon Jan  2 15:04:05 UTC 2006`.
///
/// The zone column is accepted as any alphabetic abbreviation and read as
/// UTC; named zones carry no reliable offset.
fn parse_unix_date(raw: &str) -> Option<DateTime<Utc>> {
    let fields: Vec<&str> = raw.split_whitespace().collect();
    if fields.len() != 6 {
        return None;
    }
    if fields[4].is_empty() || !fields[4].chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let without_zone = format!(
        "{} {} {} {} {}",
        fields[0], fields[1], fields[2], fields[3], fields[5]
    );
    NaiveDateTime::parse_from_str(&without_zone, "%a %b %d %H:%M:%S %Y")
        .ok()
        .map(|naive| naive.and_utc())
}
