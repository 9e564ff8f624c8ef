//! Compute client trait for vsbot.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("No compute endpoint in service catalog: {0}")]
    Catalog(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("{0}")]
    Other(String),
}

impl ComputeError {
    pub fn other(s: impl Into<String>) -> Self {
        ComputeError::Other(s.into())
    }

    /// True when the provider reported that the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ComputeError::Status { status: 404, .. })
    }

    /// Raw diagnostic payload, as shown to the user inside failure messages.
    pub fn payload(&self) -> String {
        match self {
            ComputeError::Status { body, .. } if !body.is_empty() => body.clone(),
            other => serde_json::Value::String(other.to_string()).to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ComputeError>;

/// One network interface address of a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub addr: String,
    #[serde(default)]
    pub version: Option<u8>,
    #[serde(rename = "OS-EXT-IPS:type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// A provider-managed virtual server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
    /// Addresses keyed by network name.
    #[serde(default)]
    pub addresses: BTreeMap<String, Vec<Address>>,
}

impl Server {
    /// Addresses on the named network, in provider order.
    pub fn addresses_on(&self, network: &str) -> impl Iterator<Item = &str> {
        self.addresses
            .get(network)
            .into_iter()
            .flatten()
            .map(|a| a.addr.as_str())
    }
}

/// Compute provider.
///
/// Every call is a single round trip. Implementations never retry.
#[async_trait]
pub trait ComputeClient: Send + Sync {
    /// Provider name.
    fn name(&self) -> &str;

    /// Fetch the full current server collection.
    async fn list_servers(&self) -> Result<Vec<Server>>;

    async fn start_server(&self, server: &Server) -> Result<()>;

    async fn stop_server(&self, server: &Server) -> Result<()>;

    async fn reboot_server(&self, server: &Server) -> Result<()>;

    async fn destroy_server(&self, server: &Server) -> Result<()>;
}
