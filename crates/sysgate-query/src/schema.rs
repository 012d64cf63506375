//! Column allow-list for the `SystemEvents` table.
//!
//! Only values are bound as SQL parameters; column identifiers are spliced
//! into clause text. A [`Column`] can therefore only be obtained from a
//! [`ColumnSet`] built from the live schema, or from the fixed constants here.

use std::borrow::Cow;
use std::fmt;

use crate::error::{ApiError, ErrorCode};

/// The event table queried by the service.
pub const TABLE: &str = "SystemEvents";

/// Name of the computed `Priority MOD 8` column.
pub const VIRTUAL_SEVERITY: &str = "Severity";

/// Columns of the stock rsyslog `SystemEvents` table, in schema order.
pub const DEFAULT_COLUMNS: [&str; 24] = [
    "ID",
    "CustomerID",
    "ReceivedAt",
    "DeviceReportedTime",
    "Facility",
    "Priority",
    "FromHost",
    "Message",
    "NTSeverity",
    "Importance",
    "EventSource",
    "EventUser",
    "EventCategory",
    "EventID",
    "EventBinaryData",
    "MaxAvailable",
    "CurrUsage",
    "MinUsage",
    "MaxUsage",
    "InfoUnitID",
    "SysLogTag",
    "EventLogType",
    "GenericFileName",
    "SystemID",
];

const INTEGER_COLUMNS: [&str; 12] = [
    "Facility",
    "Priority",
    "NTSeverity",
    "Importance",
    "EventCategory",
    "EventID",
    "MaxAvailable",
    "CurrUsage",
    "MinUsage",
    "MaxUsage",
    "InfoUnitID",
    "SystemID",
];

/// An allow-listed column identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column(Cow<'static, str>);

impl Column {
    /// Arrival timestamp.
    pub const RECEIVED_AT: Self = Self(Cow::Borrowed("ReceivedAt"));
    /// Raw stored priority.
    pub const PRIORITY: Self = Self(Cow::Borrowed("Priority"));
    /// Stored facility.
    pub const FACILITY: Self = Self(Cow::Borrowed("Facility"));
    /// Sending host.
    pub const FROM_HOST: Self = Self(Cow::Borrowed("FromHost"));
    /// Program tag.
    pub const SYSLOG_TAG: Self = Self(Cow::Borrowed("SysLogTag"));
    /// Message body.
    pub const MESSAGE: Self = Self(Cow::Borrowed("Message"));
    /// Computed severity.
    pub const SEVERITY: Self = Self(Cow::Borrowed(VIRTUAL_SEVERITY));

    /// Returns the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the computed severity column.
    #[must_use]
    pub fn is_virtual_severity(&self) -> bool {
        self.as_str() == VIRTUAL_SEVERITY
    }

    /// Returns true for columns holding integer values.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        self.is_virtual_severity() || INTEGER_COLUMNS.contains(&self.as_str())
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The set of queryable column names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSet {
    names: Vec<String>,
}

impl ColumnSet {
    /// Builds the set from the names reported by the database schema.
    ///
    /// The virtual severity column is appended when the schema lacks it.
    pub fn from_schema<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        if !names.iter().any(|n| n == VIRTUAL_SEVERITY) {
            names.push(VIRTUAL_SEVERITY.to_string());
        }
        Self { names }
    }

    /// The stock rsyslog schema plus the virtual severity column.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_schema(DEFAULT_COLUMNS)
    }

    /// Returns every allowed name, in schema order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns true if `name` is allowed. Matching is exact.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Checks `name` against the allow-list.
    pub fn resolve(&self, name: &str) -> Result<Column, ApiError> {
        if let Some(known) = self.names.iter().find(|n| *n == name) {
            return Ok(Column(Cow::Owned(known.clone())));
        }
        Err(
            ApiError::new(ErrorCode::InvalidColumn, format!("Invalid column: {name}"))
                .with_details(format!("Available columns: {}", self.names.join(", "))),
        )
    }
}

impl Default for ColumnSet {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn builtin_includes_virtual_severity_once() {
        let set = ColumnSet::builtin();
        assert_eq!(set.names().len(), DEFAULT_COLUMNS.len() + 1);
        assert!(set.contains("Severity"));

        let set = ColumnSet::from_schema(["ID", "Severity"]);
        assert_eq!(set.names(), ["ID".to_string(), "Severity".to_string()]);
    }

    #[test_case("FromHost" ; "plain")]
    #[test_case("Severity" ; "virtual")]
    fn resolve_known(name: &str) {
        let column = ColumnSet::builtin().resolve(name).expect("known");
        assert_eq!(column.as_str(), name);
    }

    #[test_case("fromhost" ; "case differs")]
    #[test_case("FromHost; DROP TABLE SystemEvents" ; "injection")]
    #[test_case("" ; "empty")]
    fn resolve_unknown(name: &str) {
        let err = ColumnSet::builtin().resolve(name).expect_err("unknown");
        assert_eq!(err.code, ErrorCode::InvalidColumn);
        assert_eq!(err.message, format!("Invalid column: {name}"));
        assert!(err.details.as_deref().is_some_and(|d| d.starts_with("Available columns: ID, ")));
    }

    #[test_case(Column::FACILITY, true)]
    #[test_case(Column::SEVERITY, true)]
    #[test_case(Column::PRIORITY, true)]
    #[test_case(Column::FROM_HOST, false)]
    #[test_case(Column::RECEIVED_AT, false)]
    fn integer_classification(column: Column, expected: bool) {
        assert_eq!(column.is_integer(), expected);
    }

    #[test]
    fn constants_match_resolved_columns() {
        let set = ColumnSet::builtin();
        for constant in [
            Column::RECEIVED_AT,
            Column::PRIORITY,
            Column::FACILITY,
            Column::FROM_HOST,
            Column::SYSLOG_TAG,
            Column::MESSAGE,
            Column::SEVERITY,
        ] {
            assert_eq!(set.resolve(constant.as_str()).expect("known"), constant);
        }
    }
}
