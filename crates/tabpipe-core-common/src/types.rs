//! Core data model for streaming tabular transfers.
//!
//! This module defines the engine's internal representation of schemas and
//! row data: [`LogicalType`], [`ColumnSpec`], [`Cell`], and [`RowBatch`].
//! Logical types are deliberately independent of either endpoint's native
//! representation; the [`crate::mapper`] module owns the conversions.

use chrono::{NaiveDate, NaiveDateTime};

/// The engine's internal scalar type tag.
///
/// Closed enum: every value that flows through a transfer carries one of
/// these tags, independent of how ClickHouse or a flat file represents it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
    /// UTF-8 text.
    String,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit IEEE float. Non-finite values are outside the encodable domain.
    Float64,
    /// Boolean, encoded as `true`/`false` in text form.
    Bool,
    /// Calendar date, encoded as `YYYY-MM-DD`.
    Date,
    /// Date and time without timezone, encoded as `YYYY-MM-DD HH:MM:SS`.
    DateTime,
}

impl LogicalType {
    /// Returns the display name used in schema listings and error messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalType::String => "String",
            LogicalType::Int64 => "Int64",
            LogicalType::Float64 => "Float64",
            LogicalType::Bool => "Bool",
            LogicalType::Date => "Date",
            LogicalType::DateTime => "DateTime",
        }
    }
}

impl std::fmt::Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One column of a resolved schema.
///
/// Produced by schema resolution, immutable thereafter. Column order is
/// significant: every [`RowBatch`] delivered to a sink matches the order of
/// the `Vec<ColumnSpec>` the sink was opened with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column name, unique within one table or file.
    pub name: String,
    /// The engine-internal scalar type.
    pub logical_type: LogicalType,
    /// Whether null cells are accepted for this column.
    pub nullable: bool,
}

impl ColumnSpec {
    /// Creates a new column spec.
    #[must_use]
    pub fn new(name: impl Into<String>, logical_type: LogicalType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable,
        }
    }
}

/// A typed scalar value carried by a [`Cell::Typed`] cell.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Str(String),
    Int64(i64),
    Float64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl ScalarValue {
    /// The logical type this value conforms to.
    #[must_use]
    pub fn logical_type(&self) -> LogicalType {
        match self {
            ScalarValue::Str(_) => LogicalType::String,
            ScalarValue::Int64(_) => LogicalType::Int64,
            ScalarValue::Float64(_) => LogicalType::Float64,
            ScalarValue::Bool(_) => LogicalType::Bool,
            ScalarValue::Date(_) => LogicalType::Date,
            ScalarValue::DateTime(_) => LogicalType::DateTime,
        }
    }
}

/// One tagged cell value.
///
/// Cells are transient: a reader produces them, the mapper validates them,
/// a writer consumes them. No component retains cells beyond one pipeline
/// step, which is what bounds a transfer's memory to one batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Absent value.
    Null,
    /// Raw text as read from the source, not yet validated.
    Text(String),
    /// A value validated against a logical type.
    Typed(ScalarValue),
}

impl Cell {
    /// Returns `true` for [`Cell::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

/// An ordered group of rows transferred and committed as one atomic unit.
///
/// Cell order within each row matches the column order the consuming sink
/// was opened with.
#[derive(Debug, Clone, PartialEq)]
pub struct RowBatch {
    /// Row data; inner vectors all have the same length.
    pub rows: Vec<Vec<Cell>>,
    /// Zero-based position of this batch within the whole transfer.
    pub batch_index: u64,
}

impl RowBatch {
    /// Creates a batch from rows and its position in the sequence.
    #[must_use]
    pub fn new(rows: Vec<Vec<Cell>>, batch_index: u64) -> Self {
        Self { rows, batch_index }
    }

    /// Number of rows in this batch.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` when the batch holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Pre-resolved connection parameters for a ClickHouse endpoint.
///
/// The engine performs no credential parsing; the caller supplies host,
/// port, database, user, and an optional bearer token already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConnection {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub jwt_token: Option<String>,
}

impl DbConnection {
    /// Creates a connection description for `host:port` with the given
    /// database, using the `default` user and no token.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            user: "default".to_string(),
            jwt_token: None,
        }
    }

    /// Set the user name.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Set a bearer token sent with every request.
    #[must_use]
    pub fn with_jwt_token(mut self, token: impl Into<String>) -> Self {
        self.jwt_token = Some(token.into());
        self
    }
}
