//! Display utilities for formatting CLI output.
//!
//! Table row structures and formatting functions for presenting schemas,
//! table listings, and transfer results in a human-readable format.

use tabled::{Table, Tabled};

use tabpipe_core::types::{TransferResult, TransferStatus};
use tabpipe_core::ColumnSpec;

/// Table row representation for displaying column schema information.
#[derive(Tabled)]
pub struct ColumnRow {
    /// Name of the column.
    #[tabled(rename = "Column")]
    pub name: String,
    /// Logical type of the column.
    #[tabled(rename = "Type")]
    pub logical_type: String,
    /// Whether the column can contain null values.
    #[tabled(rename = "Nullable")]
    pub nullable: String,
}

/// Display a resolved schema in a formatted table.
pub fn display_schema(subject: &str, specs: &[ColumnSpec]) {
    println!("\nSchema: {subject} ({} column(s))\n", specs.len());

    let rows: Vec<ColumnRow> = specs
        .iter()
        .map(|spec| ColumnRow {
            name: spec.name.clone(),
            logical_type: spec.logical_type.to_string(),
            nullable: if spec.nullable { "Yes" } else { "No" }.to_string(),
        })
        .collect();
    println!("{}", Table::new(rows));
}

/// Display the tables of a database, one per line.
pub fn display_tables(database: &str, tables: &[String]) {
    println!("\nTables in {database} ({} total):\n", tables.len());
    for table in tables {
        println!("  {table}");
    }
}

/// Display a transfer result summary.
pub fn display_result(result: &TransferResult) {
    let status = match result.status {
        TransferStatus::Success => "Success",
        TransferStatus::PartialFailure => "Partial failure",
        TransferStatus::Failure => "Failure",
    };
    println!("\nTransfer {status}");
    println!("  Rows transferred: {}", result.rows_transferred);
    if result.rows_invalid > 0 {
        println!("  Invalid rows skipped: {}", result.rows_invalid);
    }
    println!("  Batches committed: {}", result.batches_committed);
    if let Some(index) = result.last_committed_batch_index {
        println!("  Last committed batch: {index}");
    }
    if let Some(error) = &result.error {
        println!("  Error ({}): {}", error.kind, error.message);
        if result.last_committed_batch_index.is_some() {
            println!(
                "  Resume with --resume-from {}",
                result.last_committed_batch_index.unwrap() + 1
            );
        }
    }
}
