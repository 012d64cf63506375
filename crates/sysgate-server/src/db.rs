//! Log storage access.
//!
//! Handlers talk to [`LogRepository`]; [`MySqlRepository`] is the production
//! implementation over the rsyslog `SystemEvents` table. Every filter value is
//! bound positionally; only allow-listed [`Column`] identifiers are spliced
//! into SQL text.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{MySql, Row};
use sysgate_query::schema::DEFAULT_COLUMNS;
use sysgate_query::{
    Column, ColumnSet, LogEntry, MetaValues, Pagination, Predicate, RawLogRow, SqlValue, TABLE,
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Most pooled connections.
pub const MAX_CONNECTIONS: u32 = 25;

/// Idle connections are closed after this long.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Connections are recycled after this long.
pub const MAX_LIFETIME: Duration = Duration::from_secs(5 * 60);

/// How long a request waits for a pooled connection.
pub const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The driver reported an error.
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// The store cannot serve requests.
    #[error("database unavailable: {reason}")]
    Unavailable {
        /// Why.
        reason: String,
    },
}

/// Read and retention access to stored syslog events.
#[async_trait]
pub trait LogRepository: Send + Sync {
    /// Checks connectivity.
    async fn ping(&self) -> Result<(), RepositoryError>;

    /// Counts rows matching `predicate`.
    async fn count_logs(&self, predicate: &Predicate) -> Result<u64, RepositoryError>;

    /// Returns one page of matching rows, newest first.
    async fn query_logs(
        &self,
        predicate: &Predicate,
        page: Pagination,
    ) -> Result<Vec<LogEntry>, RepositoryError>;

    /// Returns the sorted distinct non-null values of `column`.
    async fn distinct_values(
        &self,
        column: &Column,
        predicate: &Predicate,
    ) -> Result<MetaValues, RepositoryError>;

    /// Deletes up to `batch` of the oldest rows and returns how many went.
    async fn delete_oldest(&self, batch: u32) -> Result<u64, RepositoryError>;
}

/// Builds the page query for `predicate`.
#[must_use]
pub fn logs_sql(predicate: &Predicate) -> String {
    format!(
        "SELECT {} FROM {TABLE} WHERE {} ORDER BY {} DESC LIMIT ? OFFSET ?",
        DEFAULT_COLUMNS.join(", "),
        predicate.clause(),
        Column::RECEIVED_AT,
    )
}

/// Builds the count query for `predicate`.
#[must_use]
pub fn count_sql(predicate: &Predicate) -> String {
    format!("SELECT COUNT(*) FROM {TABLE} WHERE {}", predicate.clause())
}

/// Builds the distinct-value query for `column`.
#[must_use]
pub fn distinct_sql(column: &Column, predicate: &Predicate) -> String {
    if column.is_virtual_severity() {
        format!(
            "SELECT DISTINCT {} MOD 8 AS {column} FROM {TABLE} WHERE {} ORDER BY {column} ASC",
            Column::PRIORITY,
            predicate.clause(),
        )
    } else {
        format!(
            "SELECT DISTINCT {column} FROM {TABLE} WHERE {} AND {column} IS NOT NULL ORDER BY {column} ASC",
            predicate.clause(),
        )
    }
}

/// Labels or wraps raw distinct integers for `column`.
#[must_use]
pub fn label_integers(column: &Column, values: Vec<i64>) -> MetaValues {
    if column.is_virtual_severity() {
        MetaValues::severities(values)
    } else if *column == Column::FACILITY {
        MetaValues::facilities(values)
    } else {
        MetaValues::Integers(values)
    }
}

/// MySQL-backed repository.
#[derive(Debug, Clone)]
pub struct MySqlRepository {
    pool: MySqlPool,
}

impl MySqlRepository {
    /// Opens the connection pool.
    pub async fn connect(options: MySqlConnectOptions) -> Result<Self, RepositoryError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .idle_timeout(IDLE_TIMEOUT)
            .max_lifetime(MAX_LIFETIME)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;

        info!(max_connections = MAX_CONNECTIONS, "database pool established");
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    #[must_use]
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Reads the live column names of the event table.
    pub async fn load_columns(&self) -> Result<ColumnSet, RepositoryError> {
        let rows = sqlx::query(&format!("SHOW COLUMNS FROM {TABLE}"))
            .fetch_all(&self.pool)
            .await?;

        let mut names = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(name) = text(row, "Field")? {
                names.push(name);
            }
        }
        debug!(columns = names.len(), "loaded table schema");
        Ok(ColumnSet::from_schema(names))
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl LogRepository for MySqlRepository {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn count_logs(&self, predicate: &Predicate) -> Result<u64, RepositoryError> {
        let sql = count_sql(predicate);
        let row = bind_all(sqlx::query(&sql), predicate.args())
            .fetch_one(&self.pool)
            .await?;
        Ok(integer(&row, 0)?.map_or(0, |n| n.max(0) as u64))
    }

    async fn query_logs(
        &self,
        predicate: &Predicate,
        page: Pagination,
    ) -> Result<Vec<LogEntry>, RepositoryError> {
        let sql = logs_sql(predicate);
        let rows = bind_all(sqlx::query(&sql), predicate.args())
            .bind(i64::from(page.limit))
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            match decode_row(row) {
                Ok(raw) => entries.push(raw.decode()),
                Err(err) => warn!(error = %err, "skipping undecodable log row"),
            }
        }
        Ok(entries)
    }

    async fn distinct_values(
        &self,
        column: &Column,
        predicate: &Predicate,
    ) -> Result<MetaValues, RepositoryError> {
        let sql = distinct_sql(column, predicate);
        let rows = bind_all(sqlx::query(&sql), predicate.args())
            .fetch_all(&self.pool)
            .await?;

        if column.is_integer() {
            let mut values = Vec::with_capacity(rows.len());
            for row in &rows {
                match integer(row, 0) {
                    Ok(Some(v)) => values.push(v),
                    Ok(None) => {}
                    Err(err) => warn!(column = %column, error = %err, "skipping undecodable value"),
                }
            }
            return Ok(label_integers(column, values));
        }

        let mut values = Vec::with_capacity(rows.len());
        for row in &rows {
            match text(row, 0) {
                Ok(Some(v)) => values.push(v),
                Ok(None) => {}
                Err(err) => warn!(column = %column, error = %err, "skipping undecodable value"),
            }
        }
        Ok(MetaValues::Strings(values))
    }

    async fn delete_oldest(&self, batch: u32) -> Result<u64, RepositoryError> {
        let sql = format!("DELETE FROM {TABLE} ORDER BY ID ASC LIMIT ?");
        let result = sqlx::query(&sql)
            .bind(i64::from(batch))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn bind_all<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    args: &'q [SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for arg in args {
        query = match arg {
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
            SqlValue::Timestamp(ts) => query.bind(to_local(*ts)),
        };
    }
    query
}

/// rsyslog writes DATETIME columns in server-local time.
fn to_local(ts: DateTime<Utc>) -> NaiveDateTime {
    ts.with_timezone(&Local).naive_local()
}

fn from_local(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
}

/// Reads an integer column that may be declared signed or unsigned.
fn integer<I>(row: &MySqlRow, index: I) -> Result<Option<i64>, sqlx::Error>
where
    I: sqlx::ColumnIndex<MySqlRow> + Copy,
{
    match row.try_get::<Option<i64>, _>(index) {
        Ok(v) => Ok(v),
        Err(_) => row
            .try_get::<Option<u64>, _>(index)
            .map(|v| v.map(|n| n as i64)),
    }
}

/// Reads a text column, tolerating binary collations.
fn text<I>(row: &MySqlRow, index: I) -> Result<Option<String>, sqlx::Error>
where
    I: sqlx::ColumnIndex<MySqlRow> + Copy,
{
    match row.try_get::<Option<String>, _>(index) {
        Ok(v) => Ok(v),
        Err(_) => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .map(|v| v.map(|bytes| String::from_utf8_lossy(&bytes).into_owned())),
    }
}

fn timestamp(row: &MySqlRow, name: &str) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    Ok(row
        .try_get::<Option<NaiveDateTime>, _>(name)?
        .and_then(from_local))
}

fn decode_row(row: &MySqlRow) -> Result<RawLogRow, sqlx::Error> {
    Ok(RawLogRow {
        id: integer(row, "ID")?.unwrap_or_default(),
        customer_id: integer(row, "CustomerID")?,
        received_at: timestamp(row, "ReceivedAt")?,
        device_reported_time: timestamp(row, "DeviceReportedTime")?,
        facility: integer(row, "Facility")?.unwrap_or_default(),
        priority: integer(row, "Priority")?.unwrap_or_default(),
        from_host: text(row, "FromHost")?.unwrap_or_default(),
        message: text(row, "Message")?.unwrap_or_default(),
        nt_severity: integer(row, "NTSeverity")?,
        importance: integer(row, "Importance")?,
        event_source: text(row, "EventSource")?,
        event_user: text(row, "EventUser")?,
        event_category: integer(row, "EventCategory")?,
        event_id: integer(row, "EventID")?,
        event_binary_data: text(row, "EventBinaryData")?,
        max_available: integer(row, "MaxAvailable")?,
        curr_usage: integer(row, "CurrUsage")?,
        min_usage: integer(row, "MinUsage")?,
        max_usage: integer(row, "MaxUsage")?,
        info_unit_id: integer(row, "InfoUnitID")?,
        syslog_tag: text(row, "SysLogTag")?,
        event_log_type: text(row, "EventLogType")?,
        generic_file_name: text(row, "GenericFileName")?,
        system_id: integer(row, "SystemID")?,
    })
}
