//! Delimited flat-file endpoint for `tabpipe`.
//!
//! Implements the engine's [`BatchSource`](tabpipe_core_common::BatchSource)
//! and [`BatchSink`](tabpipe_core_common::BatchSink) traits over local
//! delimited files (CSV, TSV, and friends):
//!
//! - [`schema::resolve_file_schema`] samples a file and infers a column
//!   schema with a fixed type precedence.
//! - [`reader::FileSource`] streams records lazily with quoted-field
//!   support, never holding more than one batch in memory.
//! - [`writer::FileSink`] appends encoded rows batch by batch, flushing to
//!   durable storage on every commit.
//!
//! Paths are supplied already sanitized and (for sources) already existing;
//! this crate performs no upload handling or filename sanitization.

pub mod reader;
pub mod schema;
pub mod writer;

pub use reader::FileSource;
pub use schema::{FileFormatOptions, resolve_file_schema};
pub use writer::{FileSink, FileWriteOptions};
