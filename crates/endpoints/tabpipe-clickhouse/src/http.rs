//! Thin client for the ClickHouse HTTP interface.
//!
//! Statements are POSTed to the endpoint with the target database as a
//! query parameter; authentication uses the `X-ClickHouse-User` header and
//! an optional `Authorization: Bearer` token. Small administrative results
//! (`DESCRIBE`, `SHOW TABLES`) are buffered; `SELECT` results are consumed
//! as a line stream so a result set is never materialized in memory;
//! insert bodies travel as pre-encoded `TabSeparated` bytes.

use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use log::debug;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio_util::io::StreamReader;
use url::Url;

use tabpipe_core_common::error::{Result, TransferError};
use tabpipe_core_common::types::DbConnection;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// A streamed, line-oriented query response body.
pub struct TsvLineStream {
    lines: Lines<BufReader<StreamReader<ByteStream, Bytes>>>,
}

impl TsvLineStream {
    /// Pulls the next line, `None` at the end of the body.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Io`] when the response stream breaks.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        self.lines
            .next_line()
            .await
            .map_err(|e| TransferError::io("reading query response", e))
    }
}

/// One ClickHouse HTTP endpoint with resolved credentials.
///
/// Cheap to clone; each transfer owns its own client, so independent
/// transfers never share mutable state.
#[derive(Debug, Clone)]
pub struct ClickHouseClient {
    http: reqwest::Client,
    url: Url,
    conn: DbConnection,
}

impl ClickHouseClient {
    /// Builds a client for the given pre-resolved connection.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Connection`] if the host/port do not form a
    /// valid endpoint URL or the HTTP client cannot be constructed.
    pub fn new(conn: DbConnection) -> Result<Self> {
        let endpoint = format!("{}:{}", conn.host, conn.port);
        let url = Url::parse(&format!("http://{endpoint}/")).map_err(|e| {
            TransferError::Connection {
                endpoint: endpoint.clone(),
                message: format!("invalid endpoint: {e}"),
            }
        })?;
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TransferError::Connection {
                endpoint,
                message: format!("cannot build HTTP client: {e}"),
            })?;
        Ok(Self { http, url, conn })
    }

    /// `host:port` of this endpoint, for error messages.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.conn.host, self.conn.port)
    }

    /// The database every statement runs against.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.conn.database
    }

    fn request(&self) -> reqwest::RequestBuilder {
        let mut request = self
            .http
            .post(self.url.clone())
            .query(&[("database", self.conn.database.as_str())])
            .header("X-ClickHouse-User", self.conn.user.as_str());
        if let Some(token) = &self.conn.jwt_token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        request
    }

    fn transport_error(&self, error: reqwest::Error) -> TransferError {
        TransferError::Connection {
            endpoint: self.endpoint(),
            message: error.to_string(),
        }
    }

    fn server_error(&self, status: StatusCode, body: &str) -> TransferError {
        let message = body.trim().to_string();
        if status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
            || message.contains("AUTHENTICATION_FAILED")
        {
            return TransferError::Connection {
                endpoint: self.endpoint(),
                message,
            };
        }
        if message.contains("UNKNOWN_TABLE")
            || message.contains("UNKNOWN_DATABASE")
            || message.contains("UNKNOWN_IDENTIFIER")
        {
            return TransferError::Schema {
                subject: self.conn.database.clone(),
                message,
            };
        }
        TransferError::io(
            format!("server at {} returned {status}", self.endpoint()),
            std::io::Error::other(message),
        )
    }

    /// Executes a statement and buffers the whole response body.
    ///
    /// Intended for administrative statements with small results; data
    /// reads go through [`ClickHouseClient::query_streaming`].
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Connection`] on transport or authentication
    /// failures and [`TransferError::Schema`] for unknown tables/databases.
    pub async fn execute(&self, statement: &str) -> Result<String> {
        debug!("executing against {}: {statement}", self.endpoint());
        let response = self
            .request()
            .body(statement.to_string())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(self.server_error(status, &body))
        }
    }

    /// Executes a query and returns its body as a line stream.
    ///
    /// # Errors
    ///
    /// As for [`ClickHouseClient::execute`]; mid-stream failures surface
    /// from [`TsvLineStream::next_line`].
    pub async fn query_streaming(&self, query: &str) -> Result<TsvLineStream> {
        debug!("streaming from {}: {query}", self.endpoint());
        let response = self
            .request()
            .body(query.to_string())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(|e| self.transport_error(e))?;
            return Err(self.server_error(status, &body));
        }

        let stream: ByteStream = response
            .bytes_stream()
            .map_err(std::io::Error::other)
            .boxed();
        Ok(TsvLineStream {
            lines: BufReader::new(StreamReader::new(stream)).lines(),
        })
    }

    /// Sends an insert statement with a pre-encoded data body.
    ///
    /// The statement travels as a query parameter and the body as the
    /// payload, which is how the HTTP interface separates `INSERT … FORMAT`
    /// from its data.
    ///
    /// # Errors
    ///
    /// As for [`ClickHouseClient::execute`].
    pub async fn insert(&self, statement: &str, body: Bytes) -> Result<()> {
        debug!(
            "inserting {} byte(s) via {}: {statement}",
            body.len(),
            self.endpoint()
        );
        let response = self
            .request()
            .query(&[("query", statement)])
            .body(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.map_err(|e| self.transport_error(e))?;
            Err(self.server_error(status, &body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ClickHouseClient {
        ClickHouseClient::new(DbConnection::new("localhost", 8123, "analytics")).unwrap()
    }

    #[test]
    fn test_endpoint_formatting() {
        let client = client();
        assert_eq!(client.endpoint(), "localhost:8123");
        assert_eq!(client.database(), "analytics");
    }

    #[test]
    fn test_invalid_host_is_connection_error() {
        let err = ClickHouseClient::new(DbConnection::new("bad host", 8123, "db")).unwrap_err();
        assert_eq!(err.kind(), "ConnectionError");
    }

    #[test]
    fn test_server_error_classification() {
        let client = client();

        let err = client.server_error(
            StatusCode::NOT_FOUND,
            "Code: 60. DB::Exception: UNKNOWN_TABLE",
        );
        assert_eq!(err.kind(), "SchemaError");

        let err = client.server_error(
            StatusCode::FORBIDDEN,
            "Code: 516. DB::Exception: AUTHENTICATION_FAILED",
        );
        assert_eq!(err.kind(), "ConnectionError");

        let err = client.server_error(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert_eq!(err.kind(), "IoError");
    }
}
