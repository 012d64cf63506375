//! Parameterized `WHERE` clause construction.
//!
//! Clauses are joined with `AND`; arguments are kept in the exact order of
//! the `?` placeholders they bind to.

use chrono::{DateTime, Utc};

use crate::params::DateRange;
use crate::schema::Column;

/// The tautology emitted when no clause was added.
pub const MATCH_ALL: &str = "1=1";

/// A value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    /// Integer.
    Int(i64),
    /// Text.
    Text(String),
    /// UTC timestamp.
    Timestamp(DateTime<Utc>),
}

/// A finished predicate: clause text plus positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    clause: String,
    args: Vec<SqlValue>,
}

impl Predicate {
    /// A predicate matching every row.
    #[must_use]
    pub fn match_all() -> Self {
        Self {
            clause: MATCH_ALL.to_string(),
            args: Vec::new(),
        }
    }

    /// The clause text, suitable for splicing after `WHERE`.
    #[must_use]
    pub fn clause(&self) -> &str {
        &self.clause
    }

    /// Arguments in placeholder order.
    #[must_use]
    pub fn args(&self) -> &[SqlValue] {
        &self.args
    }

    /// Number of `?` placeholders in the clause text.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.clause.matches('?').count()
    }

    /// Returns true if this predicate constrains nothing.
    #[must_use]
    pub fn is_match_all(&self) -> bool {
        self.clause == MATCH_ALL
    }
}

impl Default for Predicate {
    fn default() -> Self {
        Self::match_all()
    }
}

/// Accumulates filter clauses. Every `add_*` with empty input is a no-op.
#[derive(Debug, Default)]
pub struct FilterBuilder {
    clauses: Vec<String>,
    args: Vec<SqlValue>,
}

impl FilterBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inclusive `ReceivedAt` band.
    pub fn add_date_range(&mut self, range: &DateRange) -> &mut Self {
        self.clauses
            .push(format!("{} BETWEEN ? AND ?", Column::RECEIVED_AT));
        self.args.push(SqlValue::Timestamp(range.start));
        self.args.push(SqlValue::Timestamp(range.end));
        self
    }

    /// Severity membership as `Priority MOD 8 IN (...)`.
    ///
    /// The modulo matches both priority encodings: legacy rows store the bare
    /// severity, modern rows store `facility * 8 + severity`.
    pub fn add_severity_filter(&mut self, severities: &[u8]) -> &mut Self {
        if severities.is_empty() {
            return self;
        }
        self.clauses.push(format!(
            "{} MOD 8 IN ({})",
            Column::PRIORITY,
            placeholders(severities.len())
        ));
        self.args
            .extend(severities.iter().map(|s| SqlValue::Int(i64::from(*s))));
        self
    }

    /// `column IN (...)` over integers.
    pub fn add_int_membership(&mut self, column: &Column, values: &[i64]) -> &mut Self {
        if values.is_empty() {
            return self;
        }
        self.clauses
            .push(format!("{column} IN ({})", placeholders(values.len())));
        self.args.extend(values.iter().copied().map(SqlValue::Int));
        self
    }

    /// `column IN (...)` over strings, matched exactly.
    pub fn add_string_membership(&mut self, column: &Column, values: &[String]) -> &mut Self {
        if values.is_empty() {
            return self;
        }
        self.clauses
            .push(format!("{column} IN ({})", placeholders(values.len())));
        self.args.extend(values.iter().cloned().map(SqlValue::Text));
        self
    }

    /// `(column LIKE ? OR ...)` with every term wrapped as `%term%`.
    pub fn add_substring_search(&mut self, column: &Column, terms: &[String]) -> &mut Self {
        if terms.is_empty() {
            return self;
        }
        let alternatives = vec![format!("{column} LIKE ?"); terms.len()];
        self.clauses
            .push(format!("({})", alternatives.join(" OR ")));
        self.args
            .extend(terms.iter().map(|t| SqlValue::Text(format!("%{t}%"))));
        self
    }

    /// Returns true if no clause has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Finishes the predicate.
    #[must_use]
    pub fn build(self) -> Predicate {
        if self.clauses.is_empty() {
            return Predicate::match_all();
        }
        Predicate {
            clause: self.clauses.join(" AND "),
            args: self.args,
        }
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}
