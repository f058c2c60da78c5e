//! Error taxonomy for transfer operations.
//!
//! This module provides structured error handling using `thiserror`. Each
//! variant is one failure kind from the engine's taxonomy and carries the
//! context a caller needs to act on it (column names, row indexes, batch
//! indexes). The coordinator folds these into the final transfer result;
//! user-visible failures always include the kind, a readable message, and
//! the progress made before the failure.

use thiserror::Error;

/// Main error type for transfer operations.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The database endpoint is unreachable or rejected the credentials.
    #[error("connection to {endpoint} failed: {message}")]
    Connection {
        /// `host:port` of the endpoint.
        endpoint: String,
        /// The underlying failure description.
        message: String,
    },

    /// A table, column, or header required for schema resolution is missing.
    #[error("schema resolution failed for '{subject}': {message}")]
    Schema {
        /// The table name or file path being resolved.
        subject: String,
        message: String,
    },

    /// A native column type has no logical counterpart.
    ///
    /// Unmappable types fail resolution outright; they are never silently
    /// coerced to text.
    #[error("column '{column}' has unsupported native type '{native_type}'")]
    UnsupportedType {
        column: String,
        native_type: String,
    },

    /// The selected columns are not a non-empty subset of the source schema.
    #[error("invalid column selection: {message}")]
    ColumnSelection { message: String },

    /// A cell value is outside its logical type's encodable domain.
    #[error("cannot encode column '{column}' as {logical_type}: {message}")]
    Encoding {
        column: String,
        logical_type: &'static str,
        message: String,
    },

    /// A text cell failed to parse as its target logical type.
    ///
    /// Recoverable in lenient mode: the row is marked invalid and the
    /// transfer continues. In strict mode this aborts the batch.
    #[error("row {row_index}, column '{column}': cannot decode {value:?} as {logical_type}")]
    Decoding {
        column: String,
        /// Zero-based row index within the whole transfer.
        row_index: u64,
        logical_type: &'static str,
        /// The raw text that failed to parse.
        value: String,
    },

    /// Reading the next batch exceeded the configured read timeout.
    #[error("source read timed out after {seconds}s")]
    SourceTimeout { seconds: u64 },

    /// A batch commit failed. Committed batches are unaffected.
    #[error("write of batch {batch_index} failed: {message}")]
    Write { batch_index: u64, message: String },

    /// The sink table exists with an incompatible column set.
    #[error("target table '{table}' conflicts with the requested schema: {message}")]
    TargetConflict { table: String, message: String },

    /// The caller cancelled the transfer between batch boundaries.
    #[error("transfer cancelled after {batches_committed} committed batch(es)")]
    Cancelled { batches_committed: u64 },

    /// Invalid engine configuration (bad batch size, unresumable source, …).
    #[error("invalid option {option}: {message}")]
    Options { option: &'static str, message: String },

    /// An underlying I/O failure outside the more specific kinds above.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl TransferError {
    /// Stable machine-readable kind label, used in transfer results.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            TransferError::Connection { .. } => "ConnectionError",
            TransferError::Schema { .. } => "SchemaError",
            TransferError::UnsupportedType { .. } => "UnsupportedTypeError",
            TransferError::ColumnSelection { .. } => "ColumnSelectionError",
            TransferError::Encoding { .. } => "EncodingError",
            TransferError::Decoding { .. } => "DecodingError",
            TransferError::SourceTimeout { .. } => "SourceTimeoutError",
            TransferError::Write { .. } => "WriteError",
            TransferError::TargetConflict { .. } => "TargetConflictError",
            TransferError::Cancelled { .. } => "CancelledError",
            TransferError::Options { .. } => "OptionsError",
            TransferError::Io { .. } => "IoError",
        }
    }

    /// Wraps an I/O error with a short context string.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        TransferError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Type alias for Results using [`TransferError`].
pub type Result<T> = std::result::Result<T, TransferError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        let err = TransferError::Decoding {
            column: "age".to_string(),
            row_index: 12,
            logical_type: "Int64",
            value: "abc".to_string(),
        };
        assert_eq!(err.kind(), "DecodingError");
        assert!(err.to_string().contains("row 12"));
        assert!(err.to_string().contains("age"));

        let err = TransferError::Write {
            batch_index: 4,
            message: "insert rejected".to_string(),
        };
        assert_eq!(err.kind(), "WriteError");
        assert!(err.to_string().contains("batch 4"));
    }

    #[test]
    fn test_io_wrapping() {
        let inner = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = TransferError::io("opening sink file", inner);
        assert_eq!(err.kind(), "IoError");
        assert!(err.to_string().starts_with("opening sink file"));
    }
}
