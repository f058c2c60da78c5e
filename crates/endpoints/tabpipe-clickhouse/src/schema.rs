//! Table schema resolution over the HTTP interface.
//!
//! `DESCRIBE TABLE` output is TabSeparated with the column name and native
//! type in the first two fields; the native type is mapped through the
//! engine's reverse type table. Unmappable native types fail resolution;
//! a column is never silently downgraded to text.

use log::debug;

use tabpipe_core_common::error::{Result, TransferError};
use tabpipe_core_common::types::ColumnSpec;
use tabpipe_core_common::{ident, mapper};

use crate::http::ClickHouseClient;
use crate::tsv;

/// Probes the connection with a trivial query.
///
/// # Errors
///
/// Returns [`TransferError::Connection`] when the endpoint is unreachable
/// or rejects the credentials.
pub async fn ping(client: &ClickHouseClient) -> Result<()> {
    client.execute("SELECT 1").await.map(|_| ())
}

/// Lists the tables of the connection's database.
///
/// # Errors
///
/// Propagates connection and server failures.
pub async fn list_tables(client: &ClickHouseClient) -> Result<Vec<String>> {
    let body = client.execute("SHOW TABLES FORMAT TabSeparated").await?;
    Ok(body
        .lines()
        .filter(|line| !line.is_empty())
        .map(tsv::unescape)
        .collect())
}

/// Resolves the ordered column schema of one table.
///
/// # Errors
///
/// Returns [`TransferError::Schema`] if the table does not exist or the
/// connection fails, and [`TransferError::UnsupportedType`] for native
/// column types outside the engine's closed table.
pub async fn resolve_table_schema(
    client: &ClickHouseClient,
    table: &str,
) -> Result<Vec<ColumnSpec>> {
    ident::validate_identifier("table", table)?;
    let body = client
        .execute(&format!("DESCRIBE TABLE {table} FORMAT TabSeparated"))
        .await?;
    let specs = parse_describe_output(table, &body)?;
    debug!("resolved {} column(s) for table {table}", specs.len());
    Ok(specs)
}

/// Parses `DESCRIBE TABLE … FORMAT TabSeparated` output.
///
/// # Errors
///
/// Returns [`TransferError::Schema`] for malformed output and
/// [`TransferError::UnsupportedType`] for unmappable native types.
pub fn parse_describe_output(table: &str, body: &str) -> Result<Vec<ColumnSpec>> {
    let mut specs = Vec::new();
    for line in body.lines().filter(|line| !line.is_empty()) {
        let fields = tsv::split_line(line);
        let (name, native) = match (fields.first(), fields.get(1)) {
            (Some(Some(name)), Some(Some(native))) => (name.clone(), native),
            _ => {
                return Err(TransferError::Schema {
                    subject: table.to_string(),
                    message: format!("malformed DESCRIBE output line: {line:?}"),
                });
            },
        };
        let (logical_type, nullable) = mapper::from_native(&name, native)?;
        specs.push(ColumnSpec::new(name, logical_type, nullable));
    }

    if specs.is_empty() {
        return Err(TransferError::Schema {
            subject: table.to_string(),
            message: "table has no columns".to_string(),
        });
    }
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabpipe_core_common::types::LogicalType;

    #[test]
    fn test_parse_describe_output() {
        let body = "id\tInt64\t\t\t\t\t\n\
                    name\tNullable(String)\t\t\t\t\t\n\
                    joined\tDateTime\t\t\t\t\t\n";
        let specs = parse_describe_output("users", body).unwrap();
        assert_eq!(
            specs,
            vec![
                ColumnSpec::new("id", LogicalType::Int64, false),
                ColumnSpec::new("name", LogicalType::String, true),
                ColumnSpec::new("joined", LogicalType::DateTime, false),
            ]
        );
    }

    #[test]
    fn test_parse_describe_is_idempotent() {
        let body = "id\tInt64\nname\tString\n";
        assert_eq!(
            parse_describe_output("t", body).unwrap(),
            parse_describe_output("t", body).unwrap()
        );
    }

    #[test]
    fn test_unsupported_native_type_names_column() {
        let body = "id\tInt64\ntags\tArray(String)\n";
        let err = parse_describe_output("t", body).unwrap_err();
        assert_eq!(err.kind(), "UnsupportedTypeError");
        assert!(err.to_string().contains("tags"));
        assert!(err.to_string().contains("Array(String)"));
    }

    #[test]
    fn test_empty_describe_output_fails() {
        let err = parse_describe_output("t", "").unwrap_err();
        assert_eq!(err.kind(), "SchemaError");
    }

    #[tokio::test]
    async fn test_invalid_table_identifier_rejected_before_any_request() {
        // Points at a closed port; the identifier check must fire first.
        let client = crate::http::ClickHouseClient::new(
            tabpipe_core_common::types::DbConnection::new("localhost", 1, "db"),
        )
        .unwrap();
        let err = resolve_table_schema(&client, "users; DROP TABLE users")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "SchemaError");
        assert!(err.to_string().contains("letters, digits"));
    }
}
