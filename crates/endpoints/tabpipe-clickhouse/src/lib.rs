//! ClickHouse endpoint for `tabpipe`.
//!
//! Implements the engine's [`BatchSource`](tabpipe_core_common::BatchSource)
//! and [`BatchSink`](tabpipe_core_common::BatchSink) traits over the
//! ClickHouse HTTP interface:
//!
//! - [`http::ClickHouseClient`] issues statements and streams result
//!   bodies, authenticating with a user name and optional bearer token.
//! - [`schema`] resolves table schemas via `DESCRIBE TABLE` and lists
//!   tables via `SHOW TABLES`.
//! - [`reader::ClickHouseSource`] consumes a streamed `SELECT … FORMAT
//!   TabSeparated` response incrementally, one batch at a time.
//! - [`writer::ClickHouseSink`] creates the target table when asked and
//!   commits each batch as a single atomic insert block.
//!
//! All identifiers are validated against the engine's allow-listed grammar
//! before any statement is composed.

pub mod http;
pub mod reader;
pub mod schema;
pub mod tsv;
pub mod writer;

pub use http::ClickHouseClient;
pub use reader::ClickHouseSource;
pub use writer::ClickHouseSink;
