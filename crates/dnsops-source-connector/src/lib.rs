//! # Connector source
//!
//! A [`Source`] implementation that provides endpoints by connecting to a
//! remote TCP server. The server writes a single JSON array of endpoints
//! and closes the connection.
//!
//! The connector is a thin integration: it performs one connection per
//! `endpoints` call, reports failures in full, and never caches or
//! retries. Retry cadence is owned by the controller loop.

use async_trait::async_trait;
use dnsops_core::endpoint::Endpoint;
use dnsops_core::error::{Error, Result};
use dnsops_core::traits::Source;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tracing::{debug, error};

/// How long to wait for the remote server to accept a connection.
const DIAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches desired endpoints from a remote endpoint feed.
pub struct ConnectorSource {
    remote_server: String,
}

impl ConnectorSource {
    /// Creates a connector source reading from `remote_server`
    /// (`host:port`).
    pub fn new(remote_server: impl Into<String>) -> Self {
        Self {
            remote_server: remote_server.into(),
        }
    }
}

#[async_trait]
impl Source for ConnectorSource {
    async fn endpoints(&self) -> Result<Vec<Endpoint>> {
        let mut conn = tokio::time::timeout(DIAL_TIMEOUT, TcpStream::connect(&self.remote_server))
            .await
            .map_err(|_| {
                Error::source(
                    "connector",
                    format!("connection to {} timed out", self.remote_server),
                )
            })?
            .map_err(|e| {
                error!(server = %self.remote_server, error = %e, "connection error");
                Error::source("connector", e.to_string())
            })?;

        let mut payload = Vec::new();
        conn.read_to_end(&mut payload).await.map_err(|e| {
            error!(server = %self.remote_server, error = %e, "read error");
            Error::source("connector", e.to_string())
        })?;

        let endpoints: Vec<Endpoint> = serde_json::from_slice(&payload).map_err(|e| {
            error!(server = %self.remote_server, error = %e, "decode error");
            Error::source("connector", e.to_string())
        })?;

        debug!(count = endpoints.len(), "received endpoints");
        Ok(endpoints)
    }
}
