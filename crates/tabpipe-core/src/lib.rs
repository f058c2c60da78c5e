//! `tabpipe-core` is the engine library for `tabpipe`: streaming tabular
//! data transfer between a ClickHouse database and delimited flat files.
//!
//! The engine boundary is small: build a [`transfer::Transfer`] from a
//! [`types::SourceDescriptor`], a [`types::SinkDescriptor`], and
//! [`types::TransferOptions`], then `run` it to obtain a
//! [`types::TransferResult`]. Everything around that boundary (HTTP
//! routing, upload handling, credential parsing) is the caller's concern.
//!
//! Internally the engine is a sequential batch pipeline with a bounded
//! read-ahead of one batch, so memory use is proportional to the batch
//! size, never the dataset size. Batches commit atomically; a failed or
//! cancelled transfer reports the last committed batch index so the caller
//! can resume without re-reading committed rows.

pub mod transfer;
pub mod types;

pub use transfer::Transfer;
pub use types::{
    MappingPolicy, SinkDescriptor, SourceDescriptor, TransferOptions, TransferResult,
    TransferStatus,
};

// Re-exported so callers can resolve schemas and list tables without
// depending on the endpoint crates directly.
pub use tabpipe_clickhouse::http::ClickHouseClient;
pub use tabpipe_clickhouse::schema as clickhouse_schema;
pub use tabpipe_core_common::error::{Result, TransferError};
pub use tabpipe_core_common::types::{Cell, ColumnSpec, DbConnection, LogicalType};
pub use tabpipe_flatfile::schema::{FileFormatOptions, resolve_file_schema};
