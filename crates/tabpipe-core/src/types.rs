//! Engine boundary types: descriptors, options, and results.
//!
//! These are the values the calling layer (CLI, service, …) exchanges with
//! the engine. Descriptors are owned by the caller and passed by value into
//! a [`crate::transfer::Transfer`]; the result is created once per
//! invocation and the engine holds no state after returning it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tabpipe_core_common::types::{DbConnection, LogicalType};

/// Default rows per batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;
/// Default per-batch read and write timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a transfer reads from.
#[derive(Debug, Clone)]
pub enum SourceDescriptor {
    /// A fixed column projection over one ClickHouse table.
    Database {
        connection: DbConnection,
        table: String,
        /// Selected columns, in output order. Must be a non-empty subset
        /// of the table's schema.
        columns: Vec<String>,
        /// Columns that make the query order stable across re-executions.
        /// Required for resumable reads, optional otherwise.
        order_by: Vec<String>,
    },
    /// A delimited flat file, already existing and already sanitized.
    File {
        path: PathBuf,
        delimiter: u8,
        has_header: bool,
        /// Selected columns, in output order.
        columns: Vec<String>,
    },
}

impl SourceDescriptor {
    /// The selected columns of either variant.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        match self {
            SourceDescriptor::Database { columns, .. }
            | SourceDescriptor::File { columns, .. } => columns,
        }
    }
}

/// Where a transfer writes to.
#[derive(Debug, Clone)]
pub enum SinkDescriptor {
    /// A ClickHouse table, created on demand when `create_if_missing`.
    Database {
        connection: DbConnection,
        table: String,
        create_if_missing: bool,
    },
    /// A delimited flat file; created or truncated unless resuming.
    File { path: PathBuf, delimiter: u8 },
}

/// Optional per-column rename and type override applied between source and
/// target schemas. Without a policy the mapping is 1:1 by name and type.
#[derive(Debug, Clone, Default)]
pub struct MappingPolicy {
    renames: HashMap<String, String>,
    type_overrides: HashMap<String, LogicalType>,
}

impl MappingPolicy {
    /// Create an empty policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rename a source column on the target side.
    #[must_use]
    pub fn rename(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.renames.insert(source.into(), target.into());
        self
    }

    /// Override the target logical type of a source column.
    #[must_use]
    pub fn override_type(mut self, source: impl Into<String>, logical_type: LogicalType) -> Self {
        self.type_overrides.insert(source.into(), logical_type);
        self
    }

    pub(crate) fn target_name<'a>(&'a self, source: &'a str) -> &'a str {
        self.renames.get(source).map_or(source, String::as_str)
    }

    pub(crate) fn target_type(&self, source: &str, fallback: LogicalType) -> LogicalType {
        self.type_overrides.get(source).copied().unwrap_or(fallback)
    }

    pub(crate) fn referenced_columns(&self) -> impl Iterator<Item = &str> {
        self.renames
            .keys()
            .chain(self.type_overrides.keys())
            .map(String::as_str)
    }
}

/// Knobs for one transfer invocation.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Rows per batch; must be at least 1 (default: 1000).
    pub batch_size: usize,
    /// Fail the transfer on the first cell decode failure instead of
    /// skipping the row (default: `false`).
    pub strict_mode: bool,
    /// Index of the first batch to read, with earlier batches assumed
    /// committed. Pass `last_committed_batch_index + 1` from a failed
    /// result to resume.
    pub resume_from_batch_index: Option<u64>,
    /// Per-batch read timeout (default: 30s).
    pub read_timeout: Duration,
    /// Per-batch write timeout (default: 30s).
    pub write_timeout: Duration,
    /// Optional rename/type-override mapping.
    pub mapping: Option<MappingPolicy>,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            strict_mode: false,
            resume_from_batch_index: None,
            read_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
            mapping: None,
        }
    }
}

impl TransferOptions {
    /// Create options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Enable or disable strict decoding.
    #[must_use]
    pub fn with_strict_mode(mut self, strict_mode: bool) -> Self {
        self.strict_mode = strict_mode;
        self
    }

    /// Resume from a batch index.
    #[must_use]
    pub fn with_resume_from(mut self, batch_index: u64) -> Self {
        self.resume_from_batch_index = Some(batch_index);
        self
    }

    /// Set the per-batch read timeout.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the per-batch write timeout.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Attach a mapping policy.
    #[must_use]
    pub fn with_mapping(mut self, mapping: MappingPolicy) -> Self {
        self.mapping = Some(mapping);
        self
    }
}

/// Terminal status of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// The whole source was committed.
    Success,
    /// The transfer stopped at a batch boundary (cancellation) with the
    /// reported progress durable.
    PartialFailure,
    /// The transfer aborted; batches up to `last_committed_batch_index`
    /// are durable, nothing later is.
    Failure,
}

/// Error kind and message as presented to the caller.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Stable kind label, e.g. `DecodingError`.
    pub kind: &'static str,
    /// Human-readable description.
    pub message: String,
}

/// Outcome of one transfer invocation.
///
/// `rows_transferred` always equals the summed row counts of the batches
/// with index at or below `last_committed_batch_index` that this
/// invocation committed.
#[derive(Debug, Clone)]
pub struct TransferResult {
    pub rows_transferred: u64,
    /// Rows skipped for per-cell decode failures in lenient mode.
    pub rows_invalid: u64,
    pub batches_committed: u64,
    /// Highest committed batch index, `None` when nothing was committed.
    pub last_committed_batch_index: Option<u64>,
    pub status: TransferStatus,
    pub error: Option<ErrorInfo>,
}
