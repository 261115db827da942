//! Chain registry collaborator
//!
//! Buckets, clusters and storage nodes are registered on chain. The client only
//! reads them; writing (bucket creation, deposits) happens elsewhere.

use crate::node::{NodeDescriptor, NodeMode};
use async_trait::async_trait;
use ddc_core::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cluster ids are hex-encoded chain account ids
pub type ClusterId = String;

/// An on-chain allocation unit served by one cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub id: u64,
    pub cluster_id: ClusterId,
}

/// Properties a node declares when it registers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeProps {
    pub host: String,
    pub domain: Option<String>,
    pub rpc_port: u16,
    pub http_port: u16,
    pub secure: bool,
    pub mode: NodeMode,
}

/// A storage node as listed by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageNodeRecord {
    pub cluster_id: Option<ClusterId>,
    pub public_key: Vec<u8>,
    pub props: NodeProps,
}

impl StorageNodeRecord {
    /// Map declared properties to a routable descriptor.
    ///
    /// A non-empty domain takes precedence over the raw host.
    pub fn to_descriptor(&self) -> NodeDescriptor {
        let host = match &self.props.domain {
            Some(domain) if !domain.is_empty() => domain.as_str(),
            _ => self.props.host.as_str(),
        };
        let scheme = if self.props.secure { "https" } else { "http" };

        NodeDescriptor::new(
            hex::encode(&self.public_key),
            format!("{}:{}", host, self.props.rpc_port),
            format!("{}://{}:{}", scheme, host, self.props.http_port),
            self.props.mode,
        )
        .with_secure(self.props.secure)
    }
}

/// Read-only view of the chain
#[async_trait]
pub trait ChainRegistry: Send + Sync {
    /// Whether the chain connection can answer queries yet
    async fn is_ready(&self) -> bool {
        true
    }

    /// `None` when the bucket does not exist
    async fn get_bucket(&self, bucket_id: u64) -> Result<Option<Bucket>>;

    async fn list_storage_nodes(&self) -> Result<Vec<StorageNodeRecord>>;
}

/// Registry held in memory, for local clusters and embedding
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    buckets: RwLock<HashMap<u64, Bucket>>,
    nodes: RwLock<Vec<StorageNodeRecord>>,
    not_ready: AtomicBool,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bucket(&self, bucket_id: u64, cluster_id: impl Into<ClusterId>) {
        self.buckets.write().insert(
            bucket_id,
            Bucket {
                id: bucket_id,
                cluster_id: cluster_id.into(),
            },
        );
    }

    pub fn add_node(&self, record: StorageNodeRecord) {
        self.nodes.write().push(record);
    }

    pub fn set_ready(&self, ready: bool) {
        self.not_ready.store(!ready, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainRegistry for InMemoryRegistry {
    async fn is_ready(&self) -> bool {
        !self.not_ready.load(Ordering::SeqCst)
    }

    async fn get_bucket(&self, bucket_id: u64) -> Result<Option<Bucket>> {
        Ok(self.buckets.read().get(&bucket_id).cloned())
    }

    async fn list_storage_nodes(&self) -> Result<Vec<StorageNodeRecord>> {
        Ok(self.nodes.read().clone())
    }
}
