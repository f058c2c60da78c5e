//! Streaming batch reads from a ClickHouse table.
//!
//! One `SELECT … FORMAT TabSeparated` query per source; the response body
//! is consumed line by line, so the server streams and the engine never
//! materializes a result set. Resumption re-queries with an `OFFSET`
//! clause, which is only correct when the row order is stable across
//! executions. A resumable source therefore requires explicit `ORDER BY`
//! columns, and construction fails without them rather than silently
//! producing wrong rows.

use async_trait::async_trait;

use tabpipe_core_common::error::{Result, TransferError};
use tabpipe_core_common::io::BatchSource;
use tabpipe_core_common::types::{Cell, ColumnSpec, RowBatch};
use tabpipe_core_common::ident;

use crate::http::{ClickHouseClient, TsvLineStream};
use crate::tsv;

/// A finite, pull-based batch source over one ClickHouse table.
pub struct ClickHouseSource {
    schema: Vec<ColumnSpec>,
    lines: TsvLineStream,
    next_batch_index: u64,
    done: bool,
    table: String,
}

impl ClickHouseSource {
    /// Opens a source projecting `selected` columns of `table`, positioned
    /// after the rows covered by batches before `resume_from_batch_index`
    /// (each of `batch_size` rows).
    ///
    /// `resolved` is the table schema from
    /// [`crate::schema::resolve_table_schema`]. `order_by` names the
    /// columns that make the query order stable; it is mandatory when
    /// resuming and otherwise optional.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Options`] when resuming without `order_by`,
    /// [`TransferError::Schema`] for unknown selected columns or invalid
    /// identifiers, and connection errors from issuing the query.
    pub async fn open(
        client: &ClickHouseClient,
        table: &str,
        resolved: &[ColumnSpec],
        selected: &[String],
        order_by: &[String],
        resume_from_batch_index: u64,
        batch_size: usize,
    ) -> Result<Self> {
        ident::validate_identifier("table", table)?;
        ident::validate_identifiers("column", selected.iter().map(String::as_str))?;
        ident::validate_identifiers("column", order_by.iter().map(String::as_str))?;

        if resume_from_batch_index > 0 && order_by.is_empty() {
            return Err(TransferError::Options {
                option: "resume_from_batch_index",
                message: "resumable database reads require explicit ordering columns; offset \
                          re-queries over an unordered result are not stable"
                    .to_string(),
            });
        }

        let mut schema = Vec::with_capacity(selected.len());
        for name in selected {
            let spec = resolved
                .iter()
                .find(|spec| &spec.name == name)
                .ok_or_else(|| TransferError::Schema {
                    subject: table.to_string(),
                    message: format!("selected column '{name}' not in table"),
                })?;
            schema.push(spec.clone());
        }

        let offset = resume_from_batch_index * batch_size as u64;
        let query = build_select_query(table, selected, order_by, offset);
        let lines = client.query_streaming(&query).await?;

        Ok(Self {
            schema,
            lines,
            next_batch_index: resume_from_batch_index,
            done: false,
            table: table.to_string(),
        })
    }

    fn parse_row(&self, line: &str) -> Result<Vec<Cell>> {
        let fields = tsv::split_line(line);
        if fields.len() != self.schema.len() {
            return Err(TransferError::Schema {
                subject: self.table.clone(),
                message: format!(
                    "result row has {} field(s), expected {}",
                    fields.len(),
                    self.schema.len()
                ),
            });
        }
        Ok(fields
            .into_iter()
            .map(|field| field.map_or(Cell::Null, Cell::Text))
            .collect())
    }
}

/// Builds the projection query for one source.
///
/// Identifiers are validated by the caller; `offset > 0` requires a
/// non-empty `order_by`.
#[must_use]
pub fn build_select_query(
    table: &str,
    columns: &[String],
    order_by: &[String],
    offset: u64,
) -> String {
    let mut query = format!("SELECT {} FROM {table}", columns.join(", "));
    if !order_by.is_empty() {
        query.push_str(&format!(" ORDER BY {}", order_by.join(", ")));
    }
    if offset > 0 {
        query.push_str(&format!(" OFFSET {offset} ROWS"));
    }
    query.push_str(" FORMAT TabSeparated");
    query
}

#[async_trait]
impl BatchSource for ClickHouseSource {
    fn schema(&self) -> &[ColumnSpec] {
        &self.schema
    }

    async fn next_batch(&mut self, max_rows: usize) -> Result<Option<RowBatch>> {
        if self.done {
            return Ok(None);
        }

        let mut rows = Vec::new();
        while rows.len() < max_rows {
            match self.lines.next_line().await? {
                Some(line) if line.is_empty() => continue,
                Some(line) => rows.push(self.parse_row(&line)?),
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
