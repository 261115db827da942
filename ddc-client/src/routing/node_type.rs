use super::{RouterOperation, RoutingStrategy};
use crate::node::{NodeDescriptor, NodeMode};
use async_trait::async_trait;
use ddc_core::Result;
use std::sync::Arc;

/// Priority of a node mode for an operation; lower is preferred.
///
/// `None` means the mode cannot serve the operation at all (a cache node
/// never stores).
pub fn mode_priority(operation: RouterOperation, mode: NodeMode) -> Option<u32> {
    match (operation.is_read(), mode) {
        (true, NodeMode::Full) => Some(1),
        (true, NodeMode::Cache) => Some(1),
        (true, NodeMode::Storage) => Some(2),
        (false, NodeMode::Full) => Some(1),
        (false, NodeMode::Storage) => Some(1),
        (false, NodeMode::Cache) => None,
    }
}

/// Orders candidates by node capability.
///
/// Inapplicable modes are dropped before the inner strategy sees the list, so
/// latency probing is only spent on nodes that can serve the operation. The
/// inner result is then stably sorted by the node's own priority override or
/// the mode table, so incoming order breaks ties.
pub struct NodeTypeStrategy {
    inner: Arc<dyn RoutingStrategy>,
}

impl NodeTypeStrategy {
    pub fn new(inner: Arc<dyn RoutingStrategy>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl RoutingStrategy for NodeTypeStrategy {
    async fn is_ready(&self) -> bool {
        self.inner.is_ready().await
    }

    async fn get_nodes(&self, bucket_id: u64) -> Result<Vec<NodeDescriptor>> {
        self.inner.get_nodes(bucket_id).await
    }

    async fn marshal(
        &self,
        operation: RouterOperation,
        nodes: Vec<NodeDescriptor>,
    ) -> Vec<NodeDescriptor> {
        let capable = nodes
            .into_iter()
            .filter(|node| mode_priority(operation, node.mode).is_some())
            .collect();
        let nodes = self.inner.marshal(operation, capable).await;

        let mut ranked: Vec<(u32, NodeDescriptor)> = nodes
            .into_iter()
            .filter_map(|node| {
                let table = mode_priority(operation, node.mode)?;
                Some((node.priority.unwrap_or(table), node))
            })
            .collect();
        ranked.sort_by_key(|(priority, _)| *priority);
        ranked.into_iter().map(|(_, node)| node).collect()
    }
}
