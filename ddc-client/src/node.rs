//! Storage node descriptors

use ddc_core::{DdcError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared capability of a storage node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeMode {
    /// Stores and serves everything
    Full,
    /// Stores pieces, slower to serve reads
    Storage,
    /// Serves reads only
    Cache,
}

impl NodeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeMode::Full => "full",
            NodeMode::Storage => "storage",
            NodeMode::Cache => "cache",
        }
    }
}

impl fmt::Display for NodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeMode {
    type Err = DdcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(NodeMode::Full),
            "storage" => Ok(NodeMode::Storage),
            "cache" => Ok(NodeMode::Cache),
            other => Err(DdcError::Configuration(format!("unknown node mode: {other}"))),
        }
    }
}

/// One storage node instance and how to reach it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Stable node id (the node's public key on chain)
    pub id: String,
    /// `host:port` of the gRPC API
    pub rpc_endpoint: String,
    /// Base URL of the HTTP API, used for liveness probes
    pub http_endpoint: String,
    #[serde(default)]
    pub secure: bool,
    pub mode: NodeMode,
    /// Overrides the mode-based priority; lower is preferred
    #[serde(default)]
    pub priority: Option<u32>,
}

impl NodeDescriptor {
    pub fn new(
        id: impl Into<String>,
        rpc_endpoint: impl Into<String>,
        http_endpoint: impl Into<String>,
        mode: NodeMode,
    ) -> Self {
        Self {
            id: id.into(),
            rpc_endpoint: rpc_endpoint.into(),
            http_endpoint: http_endpoint.into(),
            secure: false,
            mode,
            priority: None,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// gRPC URI with scheme, as tonic expects it
    pub fn rpc_uri(&self) -> String {
        if self.rpc_endpoint.contains("://") {
            self.rpc_endpoint.clone()
        } else if self.secure {
            format!("https://{}", self.rpc_endpoint)
        } else {
            format!("http://{}", self.rpc_endpoint)
        }
    }
}

impl fmt::Display for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.rpc_endpoint)
    }
}
