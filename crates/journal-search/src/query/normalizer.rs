//! Filter grammar and query normalization.
//!
//! Accepted filter tokens:
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `tag:<t>`, `#<t>` | entry must carry `<t>` |
//! | `!tag:<t>`, `!#<t>` | entry must not carry `<t>` |
//! | `?tag:<t>`, `?#<t>` | entry must carry at least one optional tag |
//! | `context_type:<v>`, `context_id:<v>`, `context_url:<v>` | exact match, last one wins |
//! | `created_at:<cmp><time>`, `updated_at:<cmp><time>` | `<cmp>` is `>=`, `<=`, `>` or `<` |
//!
//! Times are ISO-8601 or, failing that, Unix epoch seconds. Bad tokens are
//! dropped with a warning and never fail the query.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use tracing::{debug, warn};

use crate::types::{Bound, ContextField, SearchQuery, TimeField};

/// Prefixes that mark a free-text token as a filter in non-strict mode.
pub const FILTER_PREFIXES: [&str; 11] = [
    "context_type:",
    "context_id:",
    "context_url:",
    "tag:",
    "!tag:",
    "?tag:",
    "#",
    "!#",
    "?#",
    "created_at:",
    "updated_at:",
];

/// Comparators in match order, so `>=`/`<=` are not read as `>`/`<`.
const COMPARATORS: [(&str, Bound); 4] = [
    (">=", Bound::Gte),
    ("<=", Bound::Lte),
    (">", Bound::Gt),
    ("<", Bound::Lt),
];

const OFFSET_DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%z",
    "%Y%m%dT%H%M%S%z",
    "%Y%m%dT%H%M%z",
];

const NAIVE_DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S",
    "%Y%m%dT%H%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y%m%d"];

/// Stored timestamps are fixed-width, so bounds must fall in four-digit years.
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 0..=9999;

#[derive(Debug, Clone, PartialEq)]
enum Filter {
    RequiredTag(String),
    ForbiddenTag(String),
    OptionalTag(String),
    Context(ContextField, String),
    Time(TimeField, Bound, DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq)]
enum Rejection {
    Malformed,
    UnknownType(String),
    MissingComparator,
    UnparseableTime(String),
    TimeOutOfRange(DateTime<Utc>),
}

/// Parses a raw query and filter list into a [`SearchQuery`].
///
/// With `strict` unset, filter tokens found in `query` are moved into the
/// filter list and removed from the free text. With `strict` set, `query` is
/// kept verbatim (trimmed) and only `filters` is parsed.
pub fn normalize<S: AsRef<str>>(query: &str, filters: &[S], strict: bool) -> SearchQuery {
    let mut items: Vec<&str> = filters.iter().map(AsRef::as_ref).collect();
    let mut text = query.trim().to_string();

    if strict {
        debug!("strict filter mode is on");
    } else {
        let (embedded, residual): (Vec<&str>, Vec<&str>) =
            query.split_whitespace().partition(|token| is_filter_token(token));
        if !embedded.is_empty() {
            text = residual.join(" ");
            items.extend(embedded);
        }
        debug!(query = %text, filters = ?items, "strict filter mode is off");
    }

    let mut normalized = SearchQuery::new(text);
    for item in items {
        if item.is_empty() {
            continue;
        }
        match parse_filter(item) {
            Ok(filter) => apply(&mut normalized, filter),
            Err(Rejection::Malformed) => {
                warn!(filter = %item, "Skipping invalid filter item");
            }
            Err(Rejection::UnknownType(kind)) => {
                warn!(filter = %item, filter_type = %kind, "Skipping filter with invalid type");
            }
            Err(Rejection::MissingComparator) => {
                warn!(filter = %item, "Skipping invalid time filter");
            }
            Err(Rejection::UnparseableTime(raw)) => {
                warn!(filter = %item, value = %raw, "Skipping time filter with unparseable time");
            }
            Err(Rejection::TimeOutOfRange(at)) => {
                warn!(filter = %item, time = %at, "Skipping time filter outside years 0000-9999");
            }
        }
    }

    normalized
}

fn is_filter_token(token: &str) -> bool {
    FILTER_PREFIXES.iter().any(|prefix| token.starts_with(prefix))
}

fn apply(query: &mut SearchQuery, filter: Filter) {
    match filter {
        Filter::RequiredTag(tag) => {
            query.required_tags.insert(tag);
        }
        Filter::ForbiddenTag(tag) => {
            query.forbidden_tags.insert(tag);
        }
        Filter::OptionalTag(tag) => {
            query.optional_tags.insert(tag);
        }
        Filter::Context(field, value) => query.set_context(field, value),
        Filter::Time(field, bound, at) => query.bounds_mut(field).push(bound, at),
    }
}

/// Splits a token into `(type, value)`. Shorthand tag forms take precedence
/// over `key:value`; everything after the first colon is the value.
fn split_filter(item: &str) -> Option<(&str, &str)> {
    for (prefix, kind) in [("!#", "!tag"), ("?#", "?tag"), ("#", "tag")] {
        if let Some(rest) = item.strip_prefix(prefix) {
            if !rest.is_empty() {
                return Some((kind, rest));
            }
        }
    }
    item.split_once(':')
}

fn parse_filter(item: &str) -> Result<Filter, Rejection> {
    let (kind, value) = split_filter(item).ok_or(Rejection::Malformed)?;
    if value.is_empty() {
        return Err(Rejection::Malformed);
    }

    match kind {
        "tag" => Ok(Filter::RequiredTag(value.to_string())),
        "!tag" => Ok(Filter::ForbiddenTag(value.to_string())),
        "?tag" => Ok(Filter::OptionalTag(value.to_string())),
        "context_type" => Ok(Filter::Context(ContextField::Type, value.to_string())),
        "context_id" => Ok(Filter::Context(ContextField::Id, value.to_string())),
        "context_url" => Ok(Filter::Context(ContextField::Url, value.to_string())),
        "created_at" => parse_time_filter(TimeField::CreatedAt, value),
        "updated_at" => parse_time_filter(TimeField::UpdatedAt, value),
        other => Err(Rejection::UnknownType(other.to_string())),
    }
}

fn parse_time_filter(field: TimeField, value: &str) -> Result<Filter, Rejection> {
    let (bound, raw) = COMPARATORS
        .iter()
        .find_map(|(symbol, bound)| value.strip_prefix(symbol).map(|raw| (*bound, raw)))
        .ok_or(Rejection::MissingComparator)?;

    let at = parse_timestamp(raw).ok_or_else(|| Rejection::UnparseableTime(raw.to_string()))?;
    if !YEAR_RANGE.contains(&at.year()) {
        return Err(Rejection::TimeOutOfRange(at));
    }
    Ok(Filter::Time(field, bound, at))
}

/// ISO-8601 first (extended or basic, with offset, naive UTC, or date only),
/// then epoch seconds.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(at) = DateTime::parse_from_str(raw, format) {
            return Some(at.with_timezone(&Utc));
        }
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }

    let seconds = raw.parse::<i64>().ok()?;
    debug!(value = %raw, "Parsed time bound as an epoch timestamp");
    DateTime::from_timestamp(seconds, 0)
}
