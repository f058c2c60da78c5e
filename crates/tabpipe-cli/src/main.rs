//! Command-line interface for `tabpipe`, a streaming tabular data transfer
//! tool for ClickHouse and delimited flat files.
//!
//! This binary is a thin façade over the [`tabpipe_core`] engine: it parses
//! arguments, configures logging, resolves descriptors, and delegates to
//! the transfer coordinator. Connection parameters arrive pre-resolved via
//! flags; the engine itself never parses credentials.
//!
//! # Available Commands
//!
//! - `transfer` - Move data between a ClickHouse table and a delimited file
//! - `schema` - Display the resolved schema of a table or file
//! - `tables` - List the tables of a database

use std::path::PathBuf;

use anyhow::{Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_log::LogTracer;
use tracing_subscriber::FmtSubscriber;

use tabpipe_core::types::DEFAULT_BATCH_SIZE;
use tabpipe_core::{
    DbConnection, SinkDescriptor, SourceDescriptor, Transfer, TransferOptions, TransferStatus,
    clickhouse_schema, ClickHouseClient, FileFormatOptions, resolve_file_schema,
};

mod display;

#[derive(Parser)]
#[command(
    name = "tabpipe",
    version,
    about = "Streaming tabular data transfer between ClickHouse and flat files",
    long_about = "tabpipe moves tabular data between a ClickHouse database and delimited flat \
                  files, in either direction, with bounded memory and per-batch atomic commits."
)]
struct Cli {
    /// Enable verbose (INFO level) logging output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug (DEBUG level) logging output with detailed diagnostics.
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Pre-resolved ClickHouse connection flags shared by the subcommands.
#[derive(Args)]
struct ConnectionArgs {
    /// ClickHouse host name.
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// ClickHouse HTTP port.
    #[arg(long, value_name = "PORT", default_value_t = 8123)]
    port: u16,

    /// Database the statements run against.
    #[arg(long, value_name = "DB")]
    database: Option<String>,

    /// User name for the `X-ClickHouse-User` header.
    #[arg(long, value_name = "USER", default_value = "default")]
    user: String,

    /// Bearer token sent with every request.
    #[arg(long, value_name = "TOKEN")]
    jwt_token: Option<String>,
}

impl ConnectionArgs {
    fn resolve(&self) -> Result<DbConnection> {
        let host = self
            .host
            .as_ref()
            .ok_or_else(|| anyhow!("--host is required for database endpoints"))?;
        let database = self
            .database
            .as_ref()
            .ok_or_else(|| anyhow!("--database is required for database endpoints"))?;
        let mut connection =
            DbConnection::new(host.clone(), self.port, database.clone()).with_user(&self.user);
        if let Some(token) = &self.jwt_token {
            connection = connection.with_jwt_token(token);
        }
        Ok(connection)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Moves data between a ClickHouse table and a delimited flat file.
    ///
    /// Exactly one `--from-*` and one `--to-*` endpoint must be given;
    /// either side may be the database or a file.
    Transfer {
        /// Read from this ClickHouse table.
        #[arg(long, value_name = "TABLE", conflicts_with = "from_file")]
        from_table: Option<String>,

        /// Read from this delimited file.
        #[arg(long, value_name = "PATH")]
        from_file: Option<PathBuf>,

        /// Write into this ClickHouse table.
        #[arg(long, value_name = "TABLE", conflicts_with = "to_file")]
        to_table: Option<String>,

        /// Write into this delimited file.
        #[arg(long, value_name = "PATH")]
        to_file: Option<PathBuf>,

        /// Columns to transfer, in output order.
        #[arg(long, value_name = "COLS", value_delimiter = ',', required = true)]
        columns: Vec<String>,

        /// Ordering columns for a database source; required when resuming.
        #[arg(long, value_name = "COLS", value_delimiter = ',')]
        order_by: Vec<String>,

        /// Field delimiter for file endpoints ("," ";" "|" or "tab").
        #[arg(long, value_name = "CHAR", default_value = ",")]
        delimiter: String,

        /// The source file has no header line.
        #[arg(long)]
        no_header: bool,

        /// Rows per batch.
        #[arg(long, value_name = "N", default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Fail the transfer on the first undecodable cell.
        #[arg(long)]
        strict: bool,

        /// Resume from this batch index (use last committed index + 1).
        #[arg(long, value_name = "BATCH")]
        resume_from: Option<u64>,

        /// Create the target table if it does not exist.
        #[arg(long)]
        create_table: bool,

        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Displays the resolved schema of a table or a delimited file.
    Schema {
        /// Resolve this ClickHouse table.
        #[arg(long, value_name = "TABLE", conflicts_with = "file")]
        table: Option<String>,

        /// Resolve this delimited file by sampling.
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,

        /// Field delimiter for file endpoints ("," ";" "|" or "tab").
        #[arg(long, value_name = "CHAR", default_value = ",")]
        delimiter: String,

        /// The file has no header line.
        #[arg(long)]
        no_header: bool,

        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Lists the tables of a database.
    Tables {
        #[command(flatten)]
        connection: ConnectionArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    // Bridge logs from the `log` crate to the `tracing` ecosystem.
    LogTracer::init()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Transfer {
            from_table,
            from_file,
            to_table,
            to_file,
            columns,
            order_by,
            delimiter,
            no_header,
            batch_size,
            strict,
            resume_from,
            create_table,
            connection,
        } => {
            let delimiter = parse_delimiter(&delimiter)?;
            let source = match (from_table, from_file) {
                (Some(table), None) => SourceDescriptor::Database {
                    connection: connection.resolve()?,
                    table,
                    columns,
                    order_by,
                },
                (None, Some(path)) => SourceDescriptor::File {
                    path,
                    delimiter,
                    has_header: !no_header,
                    columns,
                },
                _ => bail!("specify exactly one of --from-table or --from-file"),
            };
            let sink = match (to_table, to_file) {
                (Some(table), None) => SinkDescriptor::Database {
                    connection: connection.resolve()?,
                    table,
                    create_if_missing: create_table,
                },
                (None, Some(path)) => SinkDescriptor::File { path, delimiter },
                _ => bail!("specify exactly one of --to-table or --to-file"),
            };

            let mut options = TransferOptions::new()
                .with_batch_size(batch_size)
                .with_strict_mode(strict);
            if let Some(batch_index) = resume_from {
                options = options.with_resume_from(batch_index);
            }

            handle_transfer(source, sink, options).await?;
        },
        Commands::Schema {
            table,
            file,
            delimiter,
            no_header,
            connection,
        } => match (table, file) {
            (Some(table), None) => {
                let client = ClickHouseClient::new(connection.resolve()?)?;
                let specs = clickhouse_schema::resolve_table_schema(&client, &table).await?;
                display::display_schema(&table, &specs);
            },
            (None, Some(path)) => {
                let options = FileFormatOptions::default()
                    .with_delimiter(parse_delimiter(&delimiter)?)
                    .with_header(!no_header);
                let specs = resolve_file_schema(&path, &options).await?;
                display::display_schema(&path.display().to_string(), &specs);
            },
            _ => bail!("specify exactly one of --table or --file"),
        },
        Commands::Tables { connection } => {
            let connection = connection.resolve()?;
            let database = connection.database.clone();
            let client = ClickHouseClient::new(connection)?;
            let tables = clickhouse_schema::list_tables(&client).await?;
            display::display_tables(&database, &tables);
        },
    }

    Ok(())
}

async fn handle_transfer(
    source: SourceDescriptor,
    sink: SinkDescriptor,
    options: TransferOptions,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping at the next batch boundary");
            signal_cancel.cancel();
        }
    });

    info!("starting transfer");
    let result = Transfer::new(source, sink, options).run(&cancel).await;
    display::display_result(&result);

    match result.status {
        TransferStatus::Success => Ok(()),
        _ => {
            let message = result
                .error
                .map_or_else(|| "transfer did not complete".to_string(), |e| e.message);
            Err(anyhow!(message))
        },
    }
}

/// Parses a delimiter flag: one ASCII character, or "tab" / "\t".
fn parse_delimiter(value: &str) -> Result<u8> {
    match value {
        "tab" | "TAB" | "\\t" | "\t" => Ok(b'\t'),
        _ => {
            let bytes = value.as_bytes();
            if bytes.len() == 1 {
                Ok(bytes[0])
            } else {
                bail!("delimiter must be a single character (or \"tab\"), got {value:?}")
            }
        },
    }
}
