//! Durable batch writes to delimited files.
//!
//! [`FileSink`] encodes each batch in memory with the synchronous `csv`
//! writer (which owns quoting rules), then appends the bytes to the file
//! and syncs them to durable storage before `commit_batch` returns. A crash
//! after a commit returns therefore never loses that batch.

use std::path::Path;

use async_trait::async_trait;
use log::debug;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use tabpipe_core_common::error::{Result, TransferError};
use tabpipe_core_common::io::BatchSink;
use tabpipe_core_common::mapper;
use tabpipe_core_common::types::{Cell, ColumnSpec, RowBatch};

/// Options for file sink output.
#[derive(Debug, Clone)]
pub struct FileWriteOptions {
    /// Field delimiter (default: `b','`).
    pub delimiter: u8,
    /// Text written for null cells (default: empty string).
    pub null_value: String,
}

impl Default for FileWriteOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            null_value: String::new(),
        }
    }
}

impl FileWriteOptions {
    /// Create new options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field delimiter.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the null value representation.
    #[must_use]
    pub fn with_null_value(mut self, null_value: impl Into<String>) -> Self {
        self.null_value = null_value.into();
        self
    }
}

/// A batch sink appending encoded rows to one delimited file.
pub struct FileSink {
    file: Option<File>,
    columns: Vec<ColumnSpec>,
    options: FileWriteOptions,
    path: String,
}

impl FileSink {
    /// Opens the sink target.
    ///
    /// With `append` false the destination is created or truncated and the
    /// header row is written (and synced) immediately. With `append` true,
    /// used when resuming a transfer, the existing file is opened as-is
    /// and no header is written.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Io`] when the destination cannot be opened
    /// or the header cannot be written.
    pub async fn create(
        path: impl AsRef<Path>,
        options: FileWriteOptions,
        columns: &[ColumnSpec],
        append: bool,
    ) -> Result<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let file = if append {
            OpenOptions::new()
                .append(true)
                .open(path)
                .await
                .map_err(|e| TransferError::io(format!("opening sink file '{display}'"), e))?
        } else {
            File::create(path)
                .await
                .map_err(|e| TransferError::io(format!("creating sink file '{display}'"), e))?
        };

        let mut sink = Self {
            file: Some(file),
            columns: columns.to_vec(),
            options,
            path: display,
        };

        if !append {
            let names: Vec<&str> = sink.columns.iter().map(|c| c.name.as_str()).collect();
            let header = sink.encode_records(std::iter::once(names))?;
            sink.append_durably(&header).await.map_err(|e| {
                TransferError::io(format!("writing header to '{}'", sink.path), e)
            })?;
        }

        Ok(sink)
    }

    /// Encodes records through the `csv` writer so quoting stays correct.
    fn encode_records<'a, I, R>(&self, records: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = &'a str>,
    {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.options.delimiter)
            .has_headers(false)
            .from_writer(Vec::new());
        for record in records {
            writer.write_record(record).map_err(|e| TransferError::Encoding {
                column: String::new(),
                logical_type: "String",
                message: format!("csv encoding failed: {e}"),
            })?;
        }
        writer.into_inner().map_err(|e| TransferError::Encoding {
            column: String::new(),
            logical_type: "String",
            message: format!("csv encoding failed: {e}"),
        })
    }

    async fn append_durably(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let file = self.file.as_mut().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "sink already finalized")
        })?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_data().await
    }

    fn encode_row(&self, row: &[Cell]) -> Result<Vec<String>> {
        if row.len() != self.columns.len() {
            return Err(TransferError::Encoding {
                column: String::new(),
                logical_type: "String",
                message: format!(
                    "row has {} cell(s), sink expects {}",
                    row.len(),
                    self.columns.len()
                ),
            });
        }

        row.iter()
            .zip(&self.columns)
            .map(|(cell, spec)| match cell {
                Cell::Null => Ok(self.options.null_value.clone()),
                Cell::Text(text) => Ok(text.clone()),
                Cell::Typed(value) => mapper::encode_cell(&spec.name, value, spec.logical_type),
            })
            .collect()
    }
}

#[async_trait]
impl BatchSink for FileSink {
    async fn commit_batch(&mut self, batch: &RowBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let encoded: Vec<Vec<String>> = batch
            .rows
            .iter()
            .map(|row| self.encode_row(row))
            .collect::<Result<_>>()?;
        let bytes = self.encode_records(
            encoded
                .iter()
                .map(|row| row.iter().map(String::as_str)),
        )?;

        self.append_durably(&bytes).await.map_err(|e| TransferError::Write {
            batch_index: batch.batch_index,
            message: format!("appending to '{}': {e}", self.path),
        })?;

        debug!(
            "committed batch {} ({} row(s)) to {}",
            batch.batch_index,
            batch.row_count(),
            self.path
        );
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            let io_err = |e| TransferError::io(format!("finalizing '{}'", self.path), e);
            file.flush().await.map_err(io_err)?;
            file.sync_all().await.map_err(io_err)?;
        }
        Ok(())
    }
}
