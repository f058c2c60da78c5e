//! Streaming batch reads from delimited files.
//!
//! [`FileSource`] wraps a `csv-async` record stream: buffered line scanning
//! with delimiter-aware field splitting, including quoted fields that
//! contain the delimiter. Records are pulled lazily, so memory stays
//! bounded by one batch regardless of file size.

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use log::debug;

use tabpipe_core_common::error::{Result, TransferError};
use tabpipe_core_common::io::BatchSource;
use tabpipe_core_common::types::{Cell, ColumnSpec, RowBatch};

use crate::schema::FileFormatOptions;

type RecordStream = csv_async::StringRecordsIntoStream<'static, tokio::fs::File>;

/// A finite, pull-based batch source over one delimited file.
///
/// Not restartable: construct a fresh source to read again. Resumption is
/// supported at construction by skipping the records covered by already
/// committed batches.
pub struct FileSource {
    schema: Vec<ColumnSpec>,
    /// File field index for each projected column, in selection order.
    projection: Vec<usize>,
    records: RecordStream,
    next_batch_index: u64,
    done: bool,
    path: String,
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("schema", &self.schema)
            .field("projection", &self.projection)
            .field("next_batch_index", &self.next_batch_index)
            .field("done", &self.done)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl FileSource {
    /// Opens a file source projecting `selected` columns out of `resolved`,
    /// positioned after the rows covered by batches before
    /// `resume_from_batch_index` (each of `batch_size` rows).
    ///
    /// `resolved` is the full file schema from
    /// [`crate::schema::resolve_file_schema`]; `selected` must be a subset
    /// of its names, already validated by the coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Schema`] if the file cannot be opened, a
    /// selected column is missing from the file, or skipping resume rows
    /// fails.
    pub async fn open(
        path: impl AsRef<Path>,
        options: &FileFormatOptions,
        resolved: &[ColumnSpec],
        selected: &[String],
        resume_from_batch_index: u64,
        batch_size: usize,
    ) -> Result<Self> {
        let path = path.as_ref();
        let schema_err = |message: String| TransferError::Schema {
            subject: path.display().to_string(),
            message,
        };

        let mut projection = Vec::with_capacity(selected.len());
        let mut schema = Vec::with_capacity(selected.len());
        for name in selected {
            let idx = resolved
                .iter()
                .position(|spec| &spec.name == name)
                .ok_or_else(|| schema_err(format!("selected column '{name}' not in file")))?;
            projection.push(idx);
            schema.push(resolved[idx].clone());
        }

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| schema_err(format!("cannot open file: {e}")))?;
        let reader = csv_async::AsyncReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(options.has_header)
            .create_reader(file);
        let mut records = reader.into_records();

        let skip = resume_from_batch_index * batch_size as u64;
        for n in 0..skip {
            match records.next().await {
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    return Err(schema_err(format!("cannot skip committed rows: {e}")));
                },
                None => {
                    return Err(schema_err(format!(
                        "file ends after {n} row(s), cannot resume from batch \
                         {resume_from_batch_index}"
                    )));
                },
            }
        }
        if skip > 0 {
            debug!("resuming file read after {skip} committed row(s)");
        }

        Ok(Self {
            schema,
            projection,
            records,
            next_batch_index: resume_from_batch_index,
            done: false,
            path: path.display().to_string(),
        })
    }

    fn project(&self, record: &csv_async::StringRecord) -> Result<Vec<Cell>> {
        self.projection
            .iter()
            .map(|&idx| {
                record
                    .get(idx)
                    .map(|field| Cell::Text(field.to_string()))
                    .ok_or_else(|| TransferError::Schema {
                        subject: self.path.clone(),
                        message: format!(
                            "record has {} field(s), expected at least {}",
                            record.len(),
                            idx + 1
                        ),
                    })
            })
            .collect()
    }
}

#[async_trait]
impl BatchSource for FileSource {
    fn schema(&self) -> &[ColumnSpec] {
        &self.schema
    }

    async fn next_batch(&mut self, max_rows: usize) -> Result<Option<RowBatch>> {
        if self.done {
            return Ok(None);
        }

        let mut rows = Vec::new();
        while rows.len() < max_rows {
            match self.records.next().await {
                Some(Ok(record)) => rows.push(self.project(&record)?),
                Some(Err(e)) => {
                    return Err(TransferError::Schema {
                        subject: self.path.clone(),
                        message: format!("malformed record: {e}"),
                    });
                },
                None => {
                    self.done = true;
                    break;
                },
            }
        }

        if rows.is_empty() {
            return Ok(None);
        }
        let batch = RowBatch::new(rows, self.next_batch_index);
        self.next_batch_index += 1;
        Ok(Some(batch))
    }
}
