//! Transactional batch inserts into a ClickHouse table.
//!
//! Each committed batch travels as one `INSERT INTO … FORMAT TabSeparated`
//! request, i.e. one insert block: either every row of the batch lands or
//! none do, which makes the batch the transfer's atomic commit unit.

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info};

use tabpipe_core_common::error::{Result, TransferError};
use tabpipe_core_common::io::BatchSink;
use tabpipe_core_common::types::{Cell, ColumnSpec, RowBatch};
use tabpipe_core_common::{ident, mapper};

use crate::http::ClickHouseClient;
use crate::schema::resolve_table_schema;
use crate::tsv;

/// A batch sink inserting into one ClickHouse table.
pub struct ClickHouseSink {
    client: ClickHouseClient,
    table: String,
    columns: Vec<ColumnSpec>,
    insert_statement: String,
}

impl ClickHouseSink {
    /// Acquires the sink target.
    ///
    /// With `create_if_missing` the table is created from the type mapper's
    /// native mapping, as `ENGINE = MergeTree() ORDER BY tuple()`. The
    /// existing table, whether created here or found, is then verified
    /// against `columns`; an incompatible column set is a
    /// [`TransferError::TargetConflict`].
    ///
    /// # Errors
    ///
    /// Identifier, connection, schema, and conflict errors as described.
    pub async fn begin(
        client: ClickHouseClient,
        table: &str,
        columns: &[ColumnSpec],
        create_if_missing: bool,
    ) -> Result<Self> {
        ident::validate_identifier("table", table)?;
        ident::validate_identifiers("column", columns.iter().map(|c| c.name.as_str()))?;

        if create_if_missing {
            let statement = build_create_table(table, columns);
            client.execute(&statement).await?;
            info!("ensured table {table} exists on {}", client.endpoint());
        }

        let existing = resolve_table_schema(&client, table).await?;
        check_compatibility(table, columns, &existing)?;

        Ok(Self {
            client,
            table: table.to_string(),
            columns: columns.to_vec(),
            insert_statement: build_insert_statement(table, columns),
        })
    }

    /// The table this sink writes to.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }
}

/// Builds the `CREATE TABLE IF NOT EXISTS` statement for a column set.
#[must_use]
pub fn build_create_table(table: &str, columns: &[ColumnSpec]) -> String {
    let defs: Vec<String> = columns
        .iter()
        .map(|spec| {
            let native = mapper::to_native(spec.logical_type);
            if spec.nullable {
                format!("{} Nullable({native})", spec.name)
            } else {
                format!("{} {native}", spec.name)
            }
        })
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {table} ({}) ENGINE = MergeTree() ORDER BY tuple()",
        defs.join(", ")
    )
}

/// Builds the per-batch insert statement.
#[must_use]
pub fn build_insert_statement(table: &str, columns: &[ColumnSpec]) -> String {
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    format!(
        "INSERT INTO {table} ({}) FORMAT TabSeparated",
        names.join(", ")
    )
}

/// Verifies that the existing table can accept the expected columns.
///
/// Extra columns on the target are fine (the insert names its columns);
/// a missing column, a type mismatch, or a non-nullable target for a
/// nullable source is a conflict.
fn check_compatibility(
    table: &str,
    expected: &[ColumnSpec],
    existing: &[ColumnSpec],
) -> Result<()> {
    for spec in expected {
        let found = existing.iter().find(|e| e.name == spec.name).ok_or_else(|| {
            TransferError::TargetConflict {
                table: table.to_string(),
                message: format!("column '{}' is missing", spec.name),
            }
        })?;
        if found.logical_type != spec.logical_type {
            return Err(TransferError::TargetConflict {
                table: table.to_string(),
                message: format!(
                    "column '{}' is {}, expected {}",
                    spec.name, found.logical_type, spec.logical_type
                ),
            });
        }
        if spec.nullable && !found.nullable {
            return Err(TransferError::TargetConflict {
                table: table.to_string(),
                message: format!("column '{}' cannot accept null values", spec.name),
            });
        }
    }
    Ok(())
}

/// Encodes one batch as a TabSeparated insert body.
///
/// # Errors
///
/// Returns [`TransferError::Encoding`] for width mismatches or values
/// outside their logical type's domain.
pub fn encode_insert_body(columns: &[ColumnSpec], batch: &RowBatch) -> Result<Bytes> {
    let mut body = String::new();
    for row in &batch.rows {
        if row.len() != columns.len() {
            return Err(TransferError::Encoding {
                column: String::new(),
                logical_type: "String",
                message: format!(
                    "row has {} cell(s), sink expects {}",
                    row.len(),
                    columns.len()
                ),
            });
        }
        for (idx, (cell, spec)) in row.iter().zip(columns).enumerate() {
            if idx > 0 {
                body.push('\t');
            }
            match cell {
                Cell::Null => body.push_str(tsv::NULL_MARKER),
                Cell::Text(text) => body.push_str(&tsv::escape(text)),
                Cell::Typed(value) => {
                    let encoded = mapper::encode_cell(&spec.name, value, spec.logical_type)?;
                    body.push_str(&tsv::escape(&encoded));
                },
            }
        }
        body.push('\n');
    }
    Ok(Bytes::from(body))
}

#[async_trait]
impl BatchSink for ClickHouseSink {
    async fn commit_batch(&mut self, batch: &RowBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let body = encode_insert_body(&self.columns, batch)?;
        self.client
            .insert(&self.insert_statement, body)
            .await
            .map_err(|e| TransferError::Write {
                batch_index: batch.batch_index,
                message: e.to_string(),
            })?;

        debug!(
            "committed batch {} ({} row(s)) into {}",
            batch.batch_index,
            batch.row_count(),
            self.table
        );
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        // The HTTP interface is stateless; nothing to release beyond the client.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabpipe_core_common::types::{LogicalType, ScalarValue};

    fn columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("id", LogicalType::Int64, false),
            ColumnSpec::new("name", LogicalType::String, true),
        ]
    }

    #[test]
    fn test_build_create_table() {
        assert_eq!(
            build_create_table("users", &columns()),
            "CREATE TABLE IF NOT EXISTS users (id Int64, name Nullable(String)) \
             ENGINE = MergeTree() ORDER BY tuple()"
        );
    }

    #[test]
    fn test_build_insert_statement() {
        assert_eq!(
            build_insert_statement("users", &columns()),
            "INSERT INTO users (id, name) FORMAT TabSeparated"
        );
    }

    #[test]
    fn test_encode_insert_body() {
        let batch = RowBatch::new(
            vec![
                vec![
                    Cell::Typed(ScalarValue::Int64(1)),
                    Cell::Typed(ScalarValue::Str("a\tb".to_string())),
                ],
                vec![Cell::Typed(ScalarValue::Int64(2)), Cell::Null],
            ],
            0,
        );
        let body = encode_insert_body(&columns(), &batch).unwrap();
        assert_eq!(&body[..], b"1\ta\\tb\n2\t\\N\n");
    }

    #[test]
    fn test_encode_rejects_width_mismatch() {
        let batch = RowBatch::new(vec![vec![Cell::Null]], 3);
        let err = encode_insert_body(&columns(), &batch).unwrap_err();
        assert_eq!(err.kind(), "EncodingError");
    }

    #[test]
    fn test_encode_rejects_non_finite_float() {
        let specs = vec![ColumnSpec::new("x", LogicalType::Float64, false)];
        let batch = RowBatch::new(
            vec![vec![Cell::Typed(ScalarValue::Float64(f64::INFINITY))]],
            0,
        );
        assert!(encode_insert_body(&specs, &batch).is_err());
    }

    #[test]
    fn test_compatibility_accepts_wider_target() {
        let existing = vec![
            ColumnSpec::new("id", LogicalType::Int64, false),
            ColumnSpec::new("name", LogicalType::String, true),
            ColumnSpec::new("extra", LogicalType::Float64, true),
        ];
        assert!(check_compatibility("t", &columns(), &existing).is_ok());
    }

    #[test]
    fn test_compatibility_rejects_missing_column() {
        let existing = vec![ColumnSpec::new("id", LogicalType::Int64, false)];
        let err = check_compatibility("t", &columns(), &existing).unwrap_err();
        assert_eq!(err.kind(), "TargetConflictError");
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_compatibility_rejects_type_mismatch() {
        let existing = vec![
            ColumnSpec::new("id", LogicalType::String, false),
            ColumnSpec::new("name", LogicalType::String, true),
        ];
        let err = check_compatibility("t", &columns(), &existing).unwrap_err();
        assert_eq!(err.kind(), "TargetConflictError");
    }

    #[test]
    fn test_compatibility_rejects_nullability_loss() {
        let existing = vec![
            ColumnSpec::new("id", LogicalType::Int64, false),
            ColumnSpec::new("name", LogicalType::String, false),
        ];
        let err = check_compatibility("t", &columns(), &existing).unwrap_err();
        assert!(err.to_string().contains("null"));
    }
}
