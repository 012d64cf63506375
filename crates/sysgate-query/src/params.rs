//! Query-string validation.
//!
//! Absent (or empty) parameters mean "no constraint" and never fail; only
//! values that are present and malformed produce an [`ApiError`].

use chrono::{DateTime, Duration, Utc};

use crate::builder::{FilterBuilder, Predicate};
use crate::error::{ApiError, ErrorCode};
use crate::schema::Column;

/// Page size when `limit` is absent.
pub const DEFAULT_LIMIT: u32 = 10;

/// Largest accepted `limit`.
pub const MAX_LIMIT: u32 = 50_000;

/// Widest accepted date range, in days.
pub const MAX_RANGE_DAYS: i64 = 90;

/// Default look-back when `start_date` is absent, in hours.
pub const DEFAULT_WINDOW_HOURS: i64 = 24;

/// Largest valid severity.
pub const MAX_SEVERITY: u8 = 7;

/// Largest valid facility.
pub const MAX_FACILITY: u8 = 23;

const TIMESTAMP_HINT: &str = "Expected ISO 8601/RFC3339 format (e.g., 2025-02-15T10:00:00Z)";

/// A validated inclusive time band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    /// Lower bound.
    pub start: DateTime<Utc>,
    /// Upper bound.
    pub end: DateTime<Utc>,
}

/// Validated page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Rows per page, in `1..=MAX_LIMIT`.
    pub limit: u32,
    /// Rows to skip.
    pub offset: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ApiError::validation(field, "invalid format").with_details(TIMESTAMP_HINT))
}

/// Validates the optional `start_date` / `end_date` pair.
///
/// Defaults are `now - 24h` and `now`. Fails when start is after end or the
/// span is wider than [`MAX_RANGE_DAYS`]; exactly 90 days is accepted.
pub fn validate_date_range(
    start: Option<&str>,
    end: Option<&str>,
    now: DateTime<Utc>,
) -> Result<DateRange, ApiError> {
    let start = match start {
        Some(raw) => parse_timestamp("start_date", raw)?,
        None => now - Duration::hours(DEFAULT_WINDOW_HOURS),
    };
    let end = match end {
        Some(raw) => parse_timestamp("end_date", raw)?,
        None => now,
    };

    if start > end {
        return Err(ApiError::new(
            ErrorCode::InvalidDateRange,
            "start_date cannot be after end_date",
        ));
    }

    let span = end - start;
    if span > Duration::days(MAX_RANGE_DAYS) {
        let days = span.num_seconds() as f64 / 86_400.0;
        return Err(ApiError::new(
            ErrorCode::InvalidDateRange,
            format!("date range cannot exceed {MAX_RANGE_DAYS} days"),
        )
        .with_details(format!("Requested range: {days:.1} days")));
    }

    Ok(DateRange { start, end })
}

fn parse_integer(field: &str, raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::validation(field, format!("'{raw}' is not a valid integer")))
}

/// Validates the optional `limit` / `offset` pair.
pub fn validate_pagination(
    limit: Option<&str>,
    offset: Option<&str>,
) -> Result<Pagination, ApiError> {
    let mut page = Pagination::default();

    if let Some(raw) = offset {
        let value = parse_integer("offset", raw)?;
        page.offset = u64::try_from(value)
            .map_err(|_| ApiError::validation("offset", "must be non-negative"))?;
    }

    if let Some(raw) = limit {
        let value = parse_integer("limit", raw)?;
        if value <= 0 {
            return Err(ApiError::validation("limit", "must be greater than 0"));
        }
        page.limit = u32::try_from(value)
            .ok()
            .filter(|l| *l <= MAX_LIMIT)
            .ok_or_else(|| {
                ApiError::validation("limit", format!("cannot exceed {MAX_LIMIT}"))
                    .with_details(format!("Requested: {value}"))
            })?;
    }

    Ok(page)
}

fn parse_bounded(
    raws: &[String],
    max: u8,
    code: ErrorCode,
    field: &str,
    noun: &str,
) -> Result<Vec<u8>, ApiError> {
    raws.iter()
        .map(|raw| {
            raw.trim()
                .parse::<u8>()
                .ok()
                .filter(|v| *v <= max)
                .ok_or_else(|| {
                    ApiError::new(code, format!("'{raw}' is not a valid {noun} (0-{max})"))
                        .with_field(field)
                })
        })
        .collect()
}

/// Parses severity values; each must be in `0..=7`.
pub fn validate_severities(raws: &[String]) -> Result<Vec<u8>, ApiError> {
    parse_bounded(raws, MAX_SEVERITY, ErrorCode::InvalidSeverity, "Severity", "severity")
}

/// Parses facility values; each must be in `0..=23`.
pub fn validate_facilities(raws: &[String]) -> Result<Vec<u8>, ApiError> {
    parse_bounded(raws, MAX_FACILITY, ErrorCode::InvalidFacility, "Facility", "facility")
}

/// Raw query parameters, with repeated keys preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Decodes an `application/x-www-form-urlencoded` query string.
    #[must_use]
    pub fn parse(query: &str) -> Self {
        Self::from_pairs(
            url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned())),
        )
    }

    /// Collects already-decoded pairs. Empty values are dropped.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            pairs: pairs.into_iter().filter(|(_, v)| !v.is_empty()).collect(),
        }
    }

    /// First value for `key`.
    #[must_use]
    pub fn first(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key`, in order.
    #[must_use]
    pub fn all(&self, key: &str) -> Vec<String> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

/// The validated filter set shared by the logs and meta endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    /// Validated date band, always populated (defaults fill gaps).
    pub range: DateRange,
    /// Whether the caller supplied `start_date` or `end_date`.
    pub range_explicit: bool,
    /// Severities (from `Severity`, or the legacy `Priority` alias).
    pub severities: Vec<u8>,
    /// Facilities.
    pub facilities: Vec<u8>,
    /// Message substrings, OR-combined.
    pub messages: Vec<String>,
    /// Exact hosts.
    pub hosts: Vec<String>,
    /// Exact program tags.
    pub tags: Vec<String>,
}

impl LogFilter {
    /// Validates every filter parameter. The first invalid one is reported.
    pub fn from_params(params: &QueryParams, now: DateTime<Utc>) -> Result<Self, ApiError> {
        let start = params.first("start_date");
        let end = params.first("end_date");
        let range = validate_date_range(start, end, now)?;

        let mut severity_raw = params.all("Severity");
        if severity_raw.is_empty() {
            severity_raw = params.all("Priority");
        }

        Ok(Self {
            range,
            range_explicit: start.is_some() || end.is_some(),
            severities: validate_severities(&severity_raw)?,
            facilities: validate_facilities(&params.all("Facility"))?,
            messages: params.all("Message"),
            hosts: params.all("FromHost"),
            tags: params.all("SysLogTag"),
        })
    }

    /// Feeds the builder: date range, `FromHost`, severity, `Facility`,
    /// `Message`, `SysLogTag`.
    ///
    /// With `always_range` false the date band is added only when explicit.
    pub fn apply(&self, builder: &mut FilterBuilder, always_range: bool) {
        if always_range || self.range_explicit {
            builder.add_date_range(&self.range);
        }
        let facilities: Vec<i64> = self.facilities.iter().map(|f| i64::from(*f)).collect();
        builder
            .add_string_membership(&Column::FROM_HOST, &self.hosts)
            .add_severity_filter(&self.severities)
            .add_int_membership(&Column::FACILITY, &facilities)
            .add_substring_search(&Column::MESSAGE, &self.messages)
            .add_string_membership(&Column::SYSLOG_TAG, &self.tags);
    }

    /// Builds the predicate in one step.
    #[must_use]
    pub fn predicate(&self, always_range: bool) -> Predicate {
        let mut builder = FilterBuilder::new();
        self.apply(&mut builder, always_range);
        builder.build()
    }
}
