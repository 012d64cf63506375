//! Syslog record decoding and response shapes.
//!
//! Rows come in two priority encodings. Modern writers store
//! `facility * 8 + severity` in `Priority` (always above 7 unless the
//! facility is `kern`); legacy writers store the bare severity there and
//! keep the facility in its own column. [`RawLogRow::decode`] normalizes
//! both so that `priority == facility * 8 + severity` on every entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// RFC 5424 severity names, indexed by severity.
pub const SEVERITY_LABELS: [&str; 8] = [
    "Emergency",
    "Alert",
    "Critical",
    "Error",
    "Warning",
    "Notice",
    "Info",
    "Debug",
];

/// RFC 5424 facility names, indexed by facility.
pub const FACILITY_LABELS: [&str; 24] = [
    "kern", "user", "mail", "daemon", "auth", "syslog", "lpr", "news", "uucp", "cron", "authpriv",
    "ftp", "ntp", "audit", "alert", "clock", "local0", "local1", "local2", "local3", "local4",
    "local5", "local6", "local7",
];

/// Label for a severity, or `""` when out of range.
#[must_use]
pub fn severity_label(severity: i64) -> &'static str {
    usize::try_from(severity)
        .ok()
        .and_then(|i| SEVERITY_LABELS.get(i))
        .copied()
        .unwrap_or_default()
}

/// Label for a facility, or `""` when out of range.
#[must_use]
pub fn facility_label(facility: i64) -> &'static str {
    usize::try_from(facility)
        .ok()
        .and_then(|i| FACILITY_LABELS.get(i))
        .copied()
        .unwrap_or_default()
}

/// A `SystemEvents` row as stored. Timestamps are already converted to UTC.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct RawLogRow {
    pub id: i64,
    pub customer_id: Option<i64>,
    pub received_at: Option<DateTime<Utc>>,
    pub device_reported_time: Option<DateTime<Utc>>,
    pub facility: i64,
    pub priority: i64,
    pub from_host: String,
    pub message: String,
    pub nt_severity: Option<i64>,
    pub importance: Option<i64>,
    pub event_source: Option<String>,
    pub event_user: Option<String>,
    pub event_category: Option<i64>,
    pub event_id: Option<i64>,
    pub event_binary_data: Option<String>,
    pub max_available: Option<i64>,
    pub curr_usage: Option<i64>,
    pub min_usage: Option<i64>,
    pub max_usage: Option<i64>,
    pub info_unit_id: Option<i64>,
    pub syslog_tag: Option<String>,
    pub event_log_type: Option<String>,
    pub generic_file_name: Option<String>,
    pub system_id: Option<i64>,
}

/// Splits a stored priority into `(facility, severity, priority)`.
///
/// `stored_facility` is used only for legacy rows. Out-of-range stored
/// values saturate instead of overflowing.
#[must_use]
pub const fn normalize_priority(stored_facility: i64, raw_priority: i64) -> (i64, i64, i64) {
    if raw_priority > 7 {
        (raw_priority / 8, raw_priority % 8, raw_priority)
    } else {
        (
            stored_facility,
            raw_priority,
            stored_facility.saturating_mul(8).saturating_add(raw_priority),
        )
    }
}

impl RawLogRow {
    /// Normalizes priority, facility and severity and attaches labels.
    #[must_use]
    pub fn decode(self) -> LogEntry {
        let (facility, severity, priority) = normalize_priority(self.facility, self.priority);
        LogEntry {
            id: self.id,
            customer_id: self.customer_id,
            received_at: self.received_at,
            device_reported_time: self.device_reported_time,
            facility,
            facility_label: facility_label(facility).to_string(),
            priority,
            severity,
            severity_label: severity_label(severity).to_string(),
            from_host: self.from_host,
            message: self.message,
            nt_severity: self.nt_severity,
            importance: self.importance,
            event_source: self.event_source,
            event_user: self.event_user,
            event_category: self.event_category,
            event_id: self.event_id,
            event_binary_data: self.event_binary_data,
            max_available: self.max_available,
            curr_usage: self.curr_usage,
            min_usage: self.min_usage,
            max_usage: self.max_usage,
            info_unit_id: self.info_unit_id,
            syslog_tag: self.syslog_tag,
            event_log_type: self.event_log_type,
            generic_file_name: self.generic_file_name,
            system_id: self.system_id,
        }
    }
}

/// A decoded log entry, serialized with the table's column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct LogEntry {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "CustomerID")]
    pub customer_id: Option<i64>,
    #[serde(rename = "ReceivedAt")]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(rename = "DeviceReportedTime")]
    pub device_reported_time: Option<DateTime<Utc>>,
    #[serde(rename = "Facility")]
    pub facility: i64,
    #[serde(rename = "Facility_Label")]
    pub facility_label: String,
    #[serde(rename = "Priority")]
    pub priority: i64,
    #[serde(rename = "Severity")]
    pub severity: i64,
    #[serde(rename = "Severity_Label")]
    pub severity_label: String,
    #[serde(rename = "FromHost")]
    pub from_host: String,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "NTSeverity")]
    pub nt_severity: Option<i64>,
    #[serde(rename = "Importance")]
    pub importance: Option<i64>,
    #[serde(rename = "EventSource")]
    pub event_source: Option<String>,
    #[serde(rename = "EventUser")]
    pub event_user: Option<String>,
    #[serde(rename = "EventCategory")]
    pub event_category: Option<i64>,
    #[serde(rename = "EventID")]
    pub event_id: Option<i64>,
    #[serde(rename = "EventBinaryData")]
    pub event_binary_data: Option<String>,
    #[serde(rename = "MaxAvailable")]
    pub max_available: Option<i64>,
    #[serde(rename = "CurrUsage")]
    pub curr_usage: Option<i64>,
    #[serde(rename = "MinUsage")]
    pub min_usage: Option<i64>,
    #[serde(rename = "MaxUsage")]
    pub max_usage: Option<i64>,
    #[serde(rename = "InfoUnitID")]
    pub info_unit_id: Option<i64>,
    #[serde(rename = "SysLogTag")]
    pub syslog_tag: Option<String>,
    #[serde(rename = "EventLogType")]
    pub event_log_type: Option<String>,
    #[serde(rename = "GenericFileName")]
    pub generic_file_name: Option<String>,
    #[serde(rename = "SystemID")]
    pub system_id: Option<i64>,
}

/// A distinct integer value with its label (facility and severity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaValue {
    /// The value.
    pub val: i64,
    /// Its RFC 5424 name, or `""`.
    pub label: String,
}

/// Distinct values of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValues {
    /// Facility or severity, labeled.
    Labeled(Vec<MetaValue>),
    /// Other integer columns.
    Integers(Vec<i64>),
    /// Text columns.
    Strings(Vec<String>),
}

impl MetaValues {
    /// Labels facility values.
    #[must_use]
    pub fn facilities(values: impl IntoIterator<Item = i64>) -> Self {
        Self::Labeled(
            values
                .into_iter()
                .map(|val| MetaValue {
                    val,
                    label: facility_label(val).to_string(),
                })
                .collect(),
        )
    }

    /// Labels severity values.
    #[must_use]
    pub fn severities(values: impl IntoIterator<Item = i64>) -> Self {
        Self::Labeled(
            values
                .into_iter()
                .map(|val| MetaValue {
                    val,
                    label: severity_label(val).to_string(),
                })
                .collect(),
        )
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Labeled(v) => v.len(),
            Self::Integers(v) => v.len(),
            Self::Strings(v) => v.len(),
        }
    }

    /// Returns true if there are no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Body of `GET /api/logs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogsResponse {
    /// Rows matching the filters, ignoring pagination.
    pub total: u64,
    /// Echoed offset.
    pub offset: u64,
    /// Echoed limit.
    pub limit: u32,
    /// The page.
    pub rows: Vec<LogEntry>,
}

/// Body of `GET /api/meta`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaResponse {
    /// Queryable column names.
    pub available_columns: Vec<String>,
    /// Usage hint.
    pub usage: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn raw(facility: i64, priority: i64) -> RawLogRow {
        RawLogRow {
            id: 1,
            facility,
            priority,
            from_host: "web01".to_string(),
            message: "hello".to_string(),
            ..RawLogRow::default()
        }
    }

    #[test]
    fn legacy_row_recomputes_priority() {
        let entry = raw(3, 2).decode();
        assert_eq!((entry.severity, entry.facility, entry.priority), (2, 3, 26));
        assert_eq!(entry.severity_label, "Critical");
        assert_eq!(entry.facility_label, "daemon");
    }

    #[test_case(0 ; "zero")]
    #[test_case(17 ; "stale")]
    fn modern_row_ignores_stored_facility(stored: i64) {
        let entry = raw(stored, 26).decode();
        assert_eq!((entry.severity, entry.facility, entry.priority), (2, 3, 26));
    }

    #[test]
    fn boundary_priority_seven_is_legacy() {
        let entry = raw(1, 7).decode();
        assert_eq!((entry.severity, entry.facility, entry.priority), (7, 1, 15));
        assert_eq!(entry.severity_label, "Debug");
    }

    #[test]
    fn out_of_range_labels_are_empty() {
        let entry = raw(40, 3).decode();
        assert_eq!(entry.facility_label, "");
        assert_eq!(entry.severity_label, "Error");
        assert_eq!(severity_label(-1), "");
        assert_eq!(facility_label(24), "");
        assert_eq!(facility_label(23), "local7");
    }

    #[test_case(i64::MAX, 3, i64::MAX ; "huge facility")]
    #[test_case(i64::MIN, 3, i64::MIN + 3 ; "negative facility")]
    #[test_case(i64::MAX / 8, 7, i64::MAX ; "sum at limit")]
    fn garbage_facility_saturates(facility: i64, priority: i64, expected: i64) {
        let entry = raw(facility, priority).decode();
        assert_eq!(entry.priority, expected);
        assert_eq!(entry.facility_label, "");
    }

    #[test]
    fn entry_serialises_with_column_names() {
        let json = serde_json::to_value(raw(4, 6).decode()).expect("serialize");
        assert_eq!(json["ID"], 1);
        assert_eq!(json["Facility_Label"], "auth");
        assert_eq!(json["Severity_Label"], "Info");
        assert_eq!(json["Priority"], 38);
        assert!(json["SysLogTag"].is_null());
        assert!(json.get("syslog_tag").is_none());
    }

    #[test]
    fn meta_values_serialise_untagged() {
        let json = serde_json::to_value(MetaValues::severities([0, 3])).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!([{"val": 0, "label": "Emergency"}, {"val": 3, "label": "Error"}])
        );
        let json = serde_json::to_value(MetaValues::Strings(vec!["web01".into()])).expect("serialize");
        assert_eq!(json, serde_json::json!(["web01"]));
    }

    proptest! {
        #[test]
        fn prop_decoded_priority_is_consistent(facility in 0i64..24, priority in 0i64..192) {
            let entry = raw(facility, priority).decode();
            prop_assert_eq!(entry.priority, entry.facility * 8 + entry.severity);
            prop_assert!((0..8).contains(&entry.severity));
            prop_assert!(!entry.severity_label.is_empty());
            prop_assert!(!entry.facility_label.is_empty());
        }
    }
}
