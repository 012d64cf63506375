//! In-memory [`LogRepository`] for tests.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use sysgate_query::{Column, LogEntry, MetaValues, Pagination, Predicate, RawLogRow};

use crate::db::{LogRepository, RepositoryError, label_integers};

/// Stores rows in a vector and records what it was asked.
///
/// Predicates are recorded, not evaluated; every row counts as matching.
#[derive(Debug, Default)]
pub(crate) struct MemoryRepository {
    rows: Mutex<Vec<RawLogRow>>,
    down: AtomicBool,
    predicates: Mutex<Vec<Predicate>>,
    pages: Mutex<Vec<Pagination>>,
}

impl MemoryRepository {
    pub(crate) fn with_rows(rows: Vec<RawLogRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    /// Makes every call fail as if the server went away.
    pub(crate) fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub(crate) fn last_predicate(&self) -> Option<Predicate> {
        self.predicates.lock().last().cloned()
    }

    pub(crate) fn last_page(&self) -> Option<Pagination> {
        self.pages.lock().last().copied()
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable {
                reason: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    fn record(&self, predicate: &Predicate) {
        self.predicates.lock().push(predicate.clone());
    }
}

/// A row received `minutes_ago` before a fixed instant.
pub(crate) fn sample_row(id: i64, host: &str, facility: i64, severity: i64, minutes_ago: i64) -> RawLogRow {
    RawLogRow {
        id,
        received_at: Some(base_time() - Duration::minutes(minutes_ago)),
        facility,
        priority: facility * 8 + severity,
        from_host: host.to_string(),
        message: format!("message {id}"),
        syslog_tag: Some("sshd".to_string()),
        ..RawLogRow::default()
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, 15, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

#[async_trait]
impl LogRepository for MemoryRepository {
    async fn ping(&self) -> Result<(), RepositoryError> {
        self.check()
    }

    async fn count_logs(&self, predicate: &Predicate) -> Result<u64, RepositoryError> {
        self.check()?;
        self.record(predicate);
        Ok(self.rows.lock().len() as u64)
    }

    async fn query_logs(
        &self,
        predicate: &Predicate,
        page: Pagination,
    ) -> Result<Vec<LogEntry>, RepositoryError> {
        self.check()?;
        self.record(predicate);
        self.pages.lock().push(page);

        let mut rows = self.rows.lock().clone();
        rows.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        Ok(rows
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .map(RawLogRow::decode)
            .collect())
    }

    async fn distinct_values(
        &self,
        column: &Column,
        predicate: &Predicate,
    ) -> Result<MetaValues, RepositoryError> {
        self.check()?;
        self.record(predicate);

        let entries: Vec<LogEntry> = self.rows.lock().iter().cloned().map(RawLogRow::decode).collect();
        let values = match column.as_str() {
            "Severity" => {
                let set: BTreeSet<i64> = entries.iter().map(|e| e.severity).collect();
                label_integers(column, set.into_iter().collect())
            }
            "Facility" => {
                let set: BTreeSet<i64> = entries.iter().map(|e| e.facility).collect();
                label_integers(column, set.into_iter().collect())
            }
            "FromHost" => {
                let set: BTreeSet<String> = entries.into_iter().map(|e| e.from_host).collect();
                MetaValues::Strings(set.into_iter().collect())
            }
            "SysLogTag" => {
                let set: BTreeSet<String> = entries.into_iter().filter_map(|e| e.syslog_tag).collect();
                MetaValues::Strings(set.into_iter().collect())
            }
            _ if column.is_integer() => MetaValues::Integers(Vec::new()),
            _ => MetaValues::Strings(Vec::new()),
        };
        Ok(values)
    }

    async fn delete_oldest(&self, batch: u32) -> Result<u64, RepositoryError> {
        self.check()?;
        let mut rows = self.rows.lock();
        rows.sort_by_key(|r| r.id);
        let n = rows.len().min(batch as usize);
        rows.drain(..n);
        Ok(n as u64)
    }
}
