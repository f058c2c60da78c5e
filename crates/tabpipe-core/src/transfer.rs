//! The transfer coordinator.
//!
//! A [`Transfer`] runs one source-to-sink move through the state machine
//! `Idle → Resolving → Streaming → {Completed | Failed}`. Streaming is a
//! bounded pipeline of depth 2: a spawned reader task pulls batches and
//! hands them to the mapping/commit loop through a bounded channel, so
//! reading batch N+1 overlaps writing batch N while memory stays at
//! O(batch size). The coordinator is single-use; construct a new one per
//! invocation.

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use tabpipe_clickhouse::http::ClickHouseClient;
use tabpipe_clickhouse::schema as clickhouse_schema;
use tabpipe_clickhouse::{ClickHouseSink, ClickHouseSource};
use tabpipe_core_common::error::{Result, TransferError};
use tabpipe_core_common::io::{BatchSink, BatchSource};
use tabpipe_core_common::mapper;
use tabpipe_core_common::types::{Cell, ColumnSpec, RowBatch};
use tabpipe_flatfile::schema::{FileFormatOptions, resolve_file_schema};
use tabpipe_flatfile::{FileSink, FileSource, FileWriteOptions};

use crate::types::{
    ErrorInfo, SinkDescriptor, SourceDescriptor, TransferOptions, TransferResult, TransferStatus,
};

/// Capacity of the reader-to-writer handoff queue, in batches.
const PIPELINE_DEPTH: usize = 2;

/// One transfer invocation.
///
/// Owns its descriptors and options; [`Transfer::run`] consumes the value,
/// so a coordinator can never be reused across transfers.
pub struct Transfer {
    source: SourceDescriptor,
    sink: SinkDescriptor,
    options: TransferOptions,
}

#[derive(Debug, Default)]
struct Progress {
    rows_transferred: u64,
    rows_invalid: u64,
    batches_committed: u64,
    last_committed_batch_index: Option<u64>,
    cancelled: bool,
}

impl Transfer {
    /// Creates a coordinator for one source/sink pair.
    #[must_use]
    pub fn new(source: SourceDescriptor, sink: SinkDescriptor, options: TransferOptions) -> Self {
        Self {
            source,
            sink,
            options,
        }
    }

    /// Runs the transfer to completion, cancellation, or failure.
    ///
    /// Never panics and never returns early state: every error from the
    /// taxonomy is folded into the returned [`TransferResult`] together
    /// with the progress made before it. Cancellation is observed between
    /// batch boundaries only, so the reported counts are always durable.
    pub async fn run(self, cancel: &CancellationToken) -> TransferResult {
        let mut progress = Progress::default();
        let outcome = self.execute(cancel, &mut progress).await;

        let (status, error) = match outcome {
            Ok(()) if progress.cancelled => {
                let cancelled = TransferError::Cancelled {
                    batches_committed: progress.batches_committed,
                };
                (TransferStatus::PartialFailure, Some(cancelled))
            },
            Ok(()) => (TransferStatus::Success, None),
            Err(e) => (TransferStatus::Failure, Some(e)),
        };

        if let Some(error) = &error {
            warn!(
                "transfer ended with {}: {error} ({} row(s) transferred)",
                error.kind(),
                progress.rows_transferred
            );
        } else {
            info!(
                "transfer completed: {} row(s) in {} batch(es), {} invalid row(s) skipped",
                progress.rows_transferred, progress.batches_committed, progress.rows_invalid
            );
        }

        TransferResult {
            rows_transferred: progress.rows_transferred,
            rows_invalid: progress.rows_invalid,
            batches_committed: progress.batches_committed,
            last_committed_batch_index: progress.last_committed_batch_index,
            status,
            error: error.map(|e| ErrorInfo {
                kind: e.kind(),
                message: e.to_string(),
            }),
        }
    }

    async fn execute(self, cancel: &CancellationToken, progress: &mut Progress) -> Result<()> {
        // Idle: option validation before anything touches an endpoint.
        if self.options.batch_size == 0 {
            return Err(TransferError::Options {
                option: "batch_size",
                message: "must be at least 1".to_string(),
            });
        }
        let start_batch = self.options.resume_from_batch_index.unwrap_or(0);

        // Resolving: schemas on both sides, selection, mapping policy.
        debug!("resolving source schema");
        let (source, source_specs) = self.open_source(start_batch).await?;
        let target_specs = self.apply_mapping(&source_specs)?;

        debug!("acquiring sink target");
        let mut sink = self.open_sink(&target_specs, start_batch > 0).await?;

        // Streaming: the sink is finalized on every exit path.
        debug!("streaming batches (batch_size={})", self.options.batch_size);
        let streamed = stream_batches(
            source,
            sink.as_mut(),
            &target_specs,
            &self.options,
            cancel,
            progress,
        )
        .await;
        let finalized = sink.finalize().await;
        streamed?;
        finalized
    }

    async fn open_source(
        &self,
        start_batch: u64,
    ) -> Result<(Box<dyn BatchSource>, Vec<ColumnSpec>)> {
        match &self.source {
            SourceDescriptor::Database {
                connection,
                table,
                columns,
                order_by,
            } => {
                let client = ClickHouseClient::new(connection.clone())?;
                let resolved = clickhouse_schema::resolve_table_schema(&client, table).await?;
                let specs = validate_selection(columns, &resolved)?;
                let source = ClickHouseSource::open(
                    &client,
                    table,
                    &resolved,
                    columns,
                    order_by,
                    start_batch,
                    self.options.batch_size,
                )
                .await?;
                Ok((Box::new(source), specs))
            },
            SourceDescriptor::File {
                path,
                delimiter,
                has_header,
                columns,
            } => {
                let format = FileFormatOptions::default()
                    .with_delimiter(*delimiter)
                    .with_header(*has_header);
                let resolved = resolve_file_schema(path, &format).await?;
                let specs = validate_selection(columns, &resolved)?;
                let source = FileSource::open(
                    path,
                    &format,
                    &resolved,
                    columns,
                    start_batch,
                    self.options.batch_size,
                )
                .await?;
                Ok((Box::new(source), specs))
            },
        }
    }

    /// Applies the optional mapping policy to the projected source schema,
    /// or the 1:1 name/type mapping without one.
    fn apply_mapping(&self, source_specs: &[ColumnSpec]) -> Result<Vec<ColumnSpec>> {
        let Some(policy) = &self.options.mapping else {
            return Ok(source_specs.to_vec());
        };

        for referenced in policy.referenced_columns() {
            if !source_specs.iter().any(|spec| spec.name == referenced) {
                return Err(TransferError::ColumnSelection {
                    message: format!(
                        "mapping policy references column '{referenced}' outside the selection"
                    ),
                });
            }
        }

        let target: Vec<ColumnSpec> = source_specs
            .iter()
            .map(|spec| {
                ColumnSpec::new(
                    policy.target_name(&spec.name),
                    policy.target_type(&spec.name, spec.logical_type),
                    spec.nullable,
                )
            })
            .collect();

        for (idx, spec) in target.iter().enumerate() {
            if target[..idx].iter().any(|other| other.name == spec.name) {
                return Err(TransferError::ColumnSelection {
                    message: format!("mapping policy produces duplicate column '{}'", spec.name),
                });
            }
        }
        Ok(target)
    }

    async fn open_sink(
        &self,
        target_specs: &[ColumnSpec],
        append: bool,
    ) -> Result<Box<dyn BatchSink>> {
        match &self.sink {
            SinkDescriptor::Database {
                connection,
                table,
                create_if_missing,
            } => {
                let client = ClickHouseClient::new(connection.clone())?;
                let sink =
                    ClickHouseSink::begin(client, table, target_specs, *create_if_missing).await?;
                Ok(Box::new(sink))
            },
            SinkDescriptor::File { path, delimiter } => {
                let options = FileWriteOptions::default().with_delimiter(*delimiter);
                let sink = FileSink::create(path, options, target_specs, append).await?;
                Ok(Box::new(sink))
            },
        }
    }
}

/// Validates that `selected` is a non-empty, duplicate-free subset of the
/// resolved schema and returns the projected specs in selection order.
fn validate_selection(selected: &[String], resolved: &[ColumnSpec]) -> Result<Vec<ColumnSpec>> {
    if selected.is_empty() {
        return Err(TransferError::ColumnSelection {
            message: "no columns selected".to_string(),
        });
    }

    let mut specs = Vec::with_capacity(selected.len());
    for (idx, name) in selected.iter().enumerate() {
        if selected[..idx].contains(name) {
            return Err(TransferError::ColumnSelection {
                message: format!("column '{name}' selected twice"),
            });
        }
        let spec = resolved.iter().find(|spec| &spec.name == name).ok_or_else(|| {
            let available: Vec<&str> = resolved.iter().map(|s| s.name.as_str()).collect();
            TransferError::ColumnSelection {
                message: format!(
                    "column '{name}' not in source schema (available: {})",
                    available.join(", ")
                ),
            }
        })?;
        specs.push(spec.clone());
    }
    Ok(specs)
}

/// Validates one batch against the target schema.
///
/// Returns the mapped batch and the number of rows skipped as invalid. In
/// strict mode a decode failure aborts instead of skipping.
fn map_batch(
    batch: &RowBatch,
    target: &[ColumnSpec],
    batch_size: usize,
    strict_mode: bool,
) -> Result<(RowBatch, u64)> {
    let mut rows = Vec::with_capacity(batch.row_count());
    let mut invalid = 0u64;
    let base_row = batch.batch_index * batch_size as u64;

    'rows: for (offset, row) in batch.rows.iter().enumerate() {
        if row.len() != target.len() {
            return Err(TransferError::Encoding {
                column: String::new(),
                logical_type: "String",
                message: format!(
                    "row has {} cell(s), target schema has {}",
                    row.len(),
                    target.len()
                ),
            });
        }

        let row_index = base_row + offset as u64;
        let mut mapped: Vec<Cell> = Vec::with_capacity(row.len());
        for (cell, spec) in row.iter().zip(target) {
            match mapper::decode_cell(&spec.name, row_index, cell, spec.logical_type, spec.nullable)
            {
                Ok(cell) => mapped.push(cell),
                Err(error @ TransferError::Decoding { .. }) if !strict_mode => {
                    warn!("skipping invalid row: {error}");
                    invalid += 1;
                    continue 'rows;
                },
                Err(error) => return Err(error),
            }
        }
        rows.push(mapped);
    }

    Ok((RowBatch::new(rows, batch.batch_index), invalid))
}

/// The streaming loop: reader task → bounded queue → map → commit.
async fn stream_batches(
    mut source: Box<dyn BatchSource>,
    sink: &mut dyn BatchSink,
    target: &[ColumnSpec],
    options: &TransferOptions,
    cancel: &CancellationToken,
    progress: &mut Progress,
) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<Result<RowBatch>>(PIPELINE_DEPTH);
    let read_timeout = options.read_timeout;
    let batch_size = options.batch_size;
    let reader_cancel = cancel.clone();

    let reader = tokio::spawn(async move {
        loop {
            if reader_cancel.is_cancelled() {
                break;
            }
            let item = match timeout(read_timeout, source.next_batch(batch_size)).await {
                Err(_) => Err(TransferError::SourceTimeout {
                    seconds: read_timeout.as_secs(),
                }),
                Ok(Err(error)) => Err(error),
                Ok(Ok(None)) => break,
                Ok(Ok(Some(batch))) => Ok(batch),
            };
            let failed = item.is_err();
            if tx.send(item).await.is_err() || failed {
                break;
            }
        }
    });

    let outcome: Result<()> = loop {
        let received = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                progress.cancelled = true;
                break Ok(());
            },
            received = rx.recv() => received,
        };

        let batch = match received {
            None => break Ok(()),
            Some(Err(error)) => break Err(error),
            Some(Ok(batch)) => batch,
        };

        let (mapped, invalid) =
            match map_batch(&batch, target, batch_size, options.strict_mode) {
                Ok(mapped) => mapped,
                Err(error) => break Err(error),
            };
        progress.rows_invalid += invalid;

        match timeout(options.write_timeout, sink.commit_batch(&mapped)).await {
            Err(_) => {
                break Err(TransferError::Write {
                    batch_index: mapped.batch_index,
                    message: format!(
                        "commit timed out after {}s",
                        options.write_timeout.as_secs()
                    ),
                });
            },
            Ok(Err(error)) => break Err(error),
            Ok(Ok(())) => {
                progress.rows_transferred += mapped.row_count() as u64;
                progress.batches_committed += 1;
                progress.last_committed_batch_index = Some(mapped.batch_index);
            },
        }
    };

    reader.abort();
    outcome
}
