//! I/O traits for reading and writing row batches.
//!
//! This module defines the two traits endpoint implementations provide. A
//! [`BatchSource`] is a pull-based, finite, non-restartable sequence of
//! batches; a [`BatchSink`] durably commits batches one at a time. The
//! coordinator is the only caller of either.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ColumnSpec, RowBatch};

/// A pull-based lazy sequence of row batches.
///
/// Sources are finite and not restartable: once consumed, a fresh source
/// must be constructed to retry from the beginning. Implementations accept a
/// `resume_from_batch_index` at construction so a failed transfer can be
/// restarted from the last committed batch without re-reading committed
/// rows.
#[async_trait]
pub trait BatchSource: Send {
    /// Column specs of the rows this source produces, in cell order.
    fn schema(&self) -> &[ColumnSpec];

    /// Pulls the next batch of at most `max_rows` rows.
    ///
    /// Returns `Ok(None)` at the end of the sequence. Cells are produced in
    /// schema order; rows never span batches.
    ///
    /// # Errors
    ///
    /// Propagates endpoint read failures. Read timeouts are enforced by the
    /// caller wrapping this future, so implementations may await freely.
    async fn next_batch(&mut self, max_rows: usize) -> Result<Option<RowBatch>>;
}

/// A sink that durably commits row batches.
///
/// The target is acquired by the implementation's constructor (table
/// creation or file truncation happens there); the coordinator guarantees
/// [`BatchSink::finalize`] runs on every exit path, including after a
/// mid-transfer failure.
#[async_trait]
pub trait BatchSink: Send {
    /// Durably commits one batch.
    ///
    /// The batch is the atomic unit: when this returns `Ok`, every row in
    /// the batch is persisted; on `Err`, none are. Cells arrive validated
    /// and in the column order the sink was opened with.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TransferError::Write`] carrying the batch index.
    async fn commit_batch(&mut self, batch: &RowBatch) -> Result<()>;

    /// Flushes and releases the underlying file handle or connection.
    ///
    /// # Errors
    ///
    /// Propagates the final flush failure, if any.
    async fn finalize(&mut self) -> Result<()>;
}
