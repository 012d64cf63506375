//! # sysgate-query
//!
//! Turns untrusted query strings into parameterized SQL filters and raw
//! `SystemEvents` rows into normalized, labeled records.
//!
//! - [`params`]: bounds-checking of dates, pagination, severities, facilities
//! - [`builder`]: [`FilterBuilder`] producing a [`Predicate`] with positional args
//! - [`schema`]: the [`ColumnSet`] allow-list that gates every column identifier
//! - [`record`]: priority normalization and response bodies
//!
//! ## Example
//!
//! ```rust
//! use chrono::Utc;
//! use sysgate_query::{LogFilter, QueryParams};
//!
//! let params = QueryParams::parse("Severity=3&FromHost=web01");
//! let filter = LogFilter::from_params(&params, Utc::now())?;
//! let predicate = filter.predicate(true);
//! assert_eq!(
//!     predicate.clause(),
//!     "ReceivedAt BETWEEN ? AND ? AND FromHost IN (?) AND Priority MOD 8 IN (?)"
//! );
//! assert_eq!(predicate.args().len(), 4);
//! # Ok::<(), sysgate_query::ApiError>(())
//! ```

#![forbid(unsafe_code)]

pub mod builder;
pub mod error;
pub mod params;
pub mod record;
pub mod schema;

pub use builder::{FilterBuilder, MATCH_ALL, Predicate, SqlValue};
pub use error::{ApiError, ErrorCode};
pub use params::{
    DateRange, LogFilter, Pagination, QueryParams, validate_date_range, validate_facilities,
    validate_pagination, validate_severities,
};
pub use record::{
    LogEntry, LogsResponse, MetaResponse, MetaValue, MetaValues, RawLogRow, facility_label,
    normalize_priority, severity_label,
};
pub use schema::{Column, ColumnSet, TABLE};
