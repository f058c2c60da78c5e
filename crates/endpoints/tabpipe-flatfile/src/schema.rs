//! File schema resolution by sampling.
//!
//! Reads the header plus a bounded number of records and infers one logical
//! type per column, independently, using the fixed precedence from
//! [`mapper::INFERENCE_PRECEDENCE`]: the first type that every sampled
//! non-null value parses as wins, and a column with no non-null samples
//! defaults to `String`. Inferred columns are always nullable, since a
//! delimited file cannot promise otherwise.

use std::collections::HashSet;
use std::path::Path;

use futures::StreamExt;
use log::debug;

use tabpipe_core_common::error::{Result, TransferError};
use tabpipe_core_common::mapper::{self, INFERENCE_PRECEDENCE};
use tabpipe_core_common::types::{ColumnSpec, LogicalType};

/// Default number of records sampled after the header.
pub const DEFAULT_SAMPLE_ROWS: usize = 5;

/// Options shared by file schema resolution and the file reader.
#[derive(Debug, Clone)]
pub struct FileFormatOptions {
    /// Field delimiter (default: `b','`).
    pub delimiter: u8,
    /// Whether the first line is a header row (default: `true`).
    pub has_header: bool,
    /// Maximum number of records to sample for inference (default: 5).
    pub sample_rows: usize,
}

impl Default for FileFormatOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            sample_rows: DEFAULT_SAMPLE_ROWS,
        }
    }
}

impl FileFormatOptions {
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

    /// Set whether the first line is a header row.
    #[must_use]
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Set the number of records sampled for inference.
    #[must_use]
    pub fn with_sample_rows(mut self, sample_rows: usize) -> Self {
        self.sample_rows = sample_rows;
        self
    }
}

/// Resolves the schema of a delimited file by sampling.
///
/// # Errors
///
/// Returns [`TransferError::Schema`] when the file cannot be read, has no
/// header line, or declares the same column name twice.
pub async fn resolve_file_schema(
    path: impl AsRef<Path>,
    options: &FileFormatOptions,
) -> Result<Vec<ColumnSpec>> {
    let path = path.as_ref();
    let schema_err = |message: String| TransferError::Schema {
        subject: path.display().to_string(),
        message,
    };

    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| schema_err(format!("cannot open file: {e}")))?;

    let mut reader = csv_async::AsyncReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(options.has_header)
        .create_reader(file);

    let mut sample: Vec<csv_async::StringRecord> = Vec::new();

    let names: Vec<String> = if options.has_header {
        let headers = reader
            .headers()
            .await
            .map_err(|e| schema_err(format!("cannot read header line: {e}")))?;
        if headers.is_empty() || (headers.len() == 1 && headers.get(0) == Some("")) {
            return Err(schema_err("file has no header line".to_string()));
        }
        headers.iter().map(str::to_string).collect()
    } else {
        // Generate column names from the first record's width
        let mut records = reader.records();
        match records.next().await {
            Some(Ok(record)) => {
                let names = (0..record.len()).map(|i| format!("column_{i}")).collect();
                sample.push(record);
                names
            },
            Some(Err(e)) => return Err(schema_err(format!("cannot read first record: {e}"))),
            None => return Err(schema_err("file has no header line".to_string())),
        }
    };

    let mut seen = HashSet::new();
    for name in &names {
        if !seen.insert(name.as_str()) {
            return Err(schema_err(format!("duplicate column name '{name}'")));
        }
    }

    let mut records = reader.records();
    while sample.len() < options.sample_rows {
        match records.next().await {
            Some(Ok(record)) => sample.push(record),
            Some(Err(e)) => return Err(schema_err(format!("cannot sample records: {e}"))),
            None => break,
        }
    }

    let specs: Vec<ColumnSpec> = names
        .into_iter()
        .enumerate()
        .map(|(idx, name)| ColumnSpec::new(name, infer_column_type(&sample, idx), true))
        .collect();

    debug!(
        "resolved {} column(s) from {} sampled record(s) in {}",
        specs.len(),
        sample.len(),
        path.display()
    );
    Ok(specs)
}

/// Infers one column's logical type from the sampled records.
fn infer_column_type(sample: &[csv_async::StringRecord], col_idx: usize) -> LogicalType {
    let values: Vec<&str> = sample
        .iter()
        .filter_map(|record| record.get(col_idx))
        .filter(|value| !value.is_empty())
        .collect();

    if values.is_empty() {
        return LogicalType::String;
    }

    for logical in INFERENCE_PRECEDENCE {
        if values
            .iter()
            .all(|value| mapper::parse_scalar(value, logical).is_some())
        {
            return logical;
        }
    }
    LogicalType::String
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_infers_types_with_precedence() {
        let file = write_fixture(
            "id,price,flag,day,stamp,label\n\
             1,1.5,true,2024-01-01,2024-01-01 10:00:00,abc\n\
             2,2,false,2024-01-02,2024-01-02 11:30:00,def\n",
        );

        let specs = resolve_file_schema(file.path(), &FileFormatOptions::default())
            .await
            .unwrap();

        let types: Vec<LogicalType> = specs.iter().map(|s| s.logical_type).collect();
        assert_eq!(
            types,
            vec![
                LogicalType::Int64,
                LogicalType::Float64,
                LogicalType::Bool,
                LogicalType::Date,
                LogicalType::DateTime,
                LogicalType::String,
            ]
        );
        assert!(specs.iter().all(|s| s.nullable));
    }

    #[tokio::test]
    async fn test_int_wins_over_float_for_integers() {
        // "2" parses as both; Int64 has precedence when every value fits
        let file = write_fixture("n\n1\n2\n3\n");
        let specs = resolve_file_schema(file.path(), &FileFormatOptions::default())
            .await
            .unwrap();
        assert_eq!(specs[0].logical_type, LogicalType::Int64);
    }

    #[tokio::test]
    async fn test_empty_values_are_skipped() {
        let file = write_fixture("n\n\n5\n");
        let specs = resolve_file_schema(file.path(), &FileFormatOptions::default())
            .await
            .unwrap();
        assert_eq!(specs[0].logical_type, LogicalType::Int64);
    }

    #[tokio::test]
    async fn test_all_null_column_defaults_to_string() {
        let file = write_fixture("a,b\n1,\n2,\n");
        let specs = resolve_file_schema(file.path(), &FileFormatOptions::default())
            .await
            .unwrap();
        assert_eq!(specs[1].logical_type, LogicalType::String);
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let file = write_fixture("id,name\n1,a\n2,b\n");
        let options = FileFormatOptions::default();
        let first = resolve_file_schema(file.path(), &options).await.unwrap();
        let second = resolve_file_schema(file.path(), &options).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_file_fails() {
        let file = write_fixture("");
        let err = resolve_file_schema(file.path(), &FileFormatOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "SchemaError");
        assert!(err.to_string().contains("header"));
    }

    #[tokio::test]
    async fn test_duplicate_header_fails() {
        let file = write_fixture("id,id\n1,2\n");
        let err = resolve_file_schema(file.path(), &FileFormatOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("duplicate column name 'id'"));
    }

    #[tokio::test]
    async fn test_headerless_file_generates_names() {
        let file = write_fixture("1,a\n2,b\n");
        let options = FileFormatOptions::default().with_header(false);
        let specs = resolve_file_schema(file.path(), &options).await.unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "column_0");
        assert_eq!(specs[0].logical_type, LogicalType::Int64);
        assert_eq!(specs[1].name, "column_1");
        assert_eq!(specs[1].logical_type, LogicalType::String);
    }

    #[tokio::test]
    async fn test_tab_delimiter() {
        let file = write_fixture("id\tname\n1\tx\n");
        let options = FileFormatOptions::default().with_delimiter(b'\t');
        let specs = resolve_file_schema(file.path(), &options).await.unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "id");
    }
}
