use super::{random_node, RouterOperation, RoutingStrategy};
use crate::cache::TopologyCache;
use crate::node::NodeDescriptor;
use crate::registry::{Bucket, ChainRegistry};
use async_trait::async_trait;
use ddc_core::{DdcError, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Candidates from on-chain topology: bucket → cluster → storage nodes
pub struct BlockchainStrategy {
    registry: Arc<dyn ChainRegistry>,
    topology: Arc<TopologyCache>,
}

impl BlockchainStrategy {
    pub fn new(registry: Arc<dyn ChainRegistry>, topology: Arc<TopologyCache>) -> Self {
        Self { registry, topology }
    }

    async fn bucket(&self, bucket_id: u64) -> Result<Bucket> {
        if let Some(bucket) = self.topology.bucket(bucket_id) {
            return Ok(bucket);
        }

        let bucket = self
            .registry
            .get_bucket(bucket_id)
            .await
            .map_err(|e| DdcError::TopologyResolution(format!("bucket {bucket_id}: {e}")))?
            .ok_or_else(|| {
                DdcError::TopologyResolution(format!("bucket {bucket_id} is not allocated"))
            })?;

        debug!(bucket_id, cluster_id = %bucket.cluster_id, "Resolved bucket");
        self.topology.insert_bucket(bucket.clone());
        Ok(bucket)
    }
}

#[async_trait]
impl RoutingStrategy for BlockchainStrategy {
    async fn is_ready(&self) -> bool {
        self.registry.is_ready().await
    }

    async fn get_nodes(&self, bucket_id: u64) -> Result<Vec<NodeDescriptor>> {
        let bucket = self.bucket(bucket_id).await?;
        if let Some(nodes) = self.topology.cluster_nodes(&bucket.cluster_id) {
            return Ok(nodes);
        }

        let nodes: Vec<NodeDescriptor> = self
            .registry
            .list_storage_nodes()
            .await
            .map_err(|e| DdcError::TopologyResolution(format!("storage nodes: {e}")))?
            .iter()
            .filter(|record| record.cluster_id.as_ref() == Some(&bucket.cluster_id))
            .map(|record| record.to_descriptor())
            .collect();

        // an empty cluster may still be joining, look again next time
        if !nodes.is_empty() {
            info!(
                cluster_id = %bucket.cluster_id,
                nodes = nodes.len(),
                "Resolved cluster topology"
            );
            self.topology
                .insert_cluster_nodes(bucket.cluster_id.clone(), nodes.clone());
        }
        Ok(nodes)
    }

    fn select(&self, _operation: RouterOperation, nodes: &[NodeDescriptor]) -> Option<NodeDescriptor> {
        random_node(nodes)
    }
}
