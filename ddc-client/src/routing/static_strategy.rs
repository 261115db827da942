use super::{random_node, RouterOperation, RoutingStrategy};
use crate::node::NodeDescriptor;
use async_trait::async_trait;
use ddc_core::Result;

/// Fixed node list, the same for every bucket
#[derive(Debug, Clone)]
pub struct StaticStrategy {
    nodes: Vec<NodeDescriptor>,
}

impl StaticStrategy {
    pub fn new(nodes: Vec<NodeDescriptor>) -> Self {
        Self { nodes }
    }
}

#[async_trait]
impl RoutingStrategy for StaticStrategy {
    async fn get_nodes(&self, _bucket_id: u64) -> Result<Vec<NodeDescriptor>> {
        Ok(self.nodes.clone())
    }

    fn select(&self, _operation: RouterOperation, nodes: &[NodeDescriptor]) -> Option<NodeDescriptor> {
        random_node(nodes)
    }
}
