//! Common types and traits shared across `tabpipe` crates.
//!
//! This crate provides the core abstractions that are shared between
//! `tabpipe-core` and the endpoint implementation crates, preventing
//! circular dependencies:
//!
//! - **Data Model**: logical types, column specs, cells, and row batches.
//! - **Type Mapper**: the closed bidirectional table between logical types,
//!   ClickHouse native type names, and text-cell encodings.
//! - **Error Taxonomy**: the [`TransferError`] enum used by every component.
//! - **I/O Traits**: the pull-based [`BatchSource`] and commit-based
//!   [`BatchSink`] traits that endpoint crates implement.

pub mod error;
pub mod ident;
pub mod io;
pub mod mapper;
pub mod types;

// Re-export commonly used types
pub use error::{Result, TransferError};
pub use io::{BatchSink, BatchSource};
pub use types::{Cell, ColumnSpec, DbConnection, LogicalType, RowBatch, ScalarValue};
