//! Node routing strategies
//!
//! A strategy supplies candidate nodes for a bucket, reorders them for an
//! operation, and picks one. Base strategies ([`StaticStrategy`],
//! [`BlockchainStrategy`]) supply candidates; [`PingStrategy`] and
//! [`NodeTypeStrategy`] wrap another strategy and refine its ordering.

mod blockchain;
mod node_type;
mod ping;
mod static_strategy;

pub use blockchain::BlockchainStrategy;
pub use node_type::{mode_priority, NodeTypeStrategy};
pub use ping::{HttpProber, NodeProber, PingStrategy, ProbeState, ProbeTable, Probing};
pub use static_strategy::StaticStrategy;

use crate::node::NodeDescriptor;
use async_trait::async_trait;
use ddc_core::Result;
use ddc_protocol::auth::Operation;
use rand::seq::SliceRandom;
use std::fmt;

/// Operations a node can be routed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouterOperation {
    ReadPiece,
    StorePiece,
    ReadDagNode,
    StoreDagNode,
    ReadCnsRecord,
    StoreCnsRecord,
}

impl RouterOperation {
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            RouterOperation::ReadPiece
                | RouterOperation::ReadDagNode
                | RouterOperation::ReadCnsRecord
        )
    }

    /// Token verb needed for this operation
    pub fn access(&self) -> Operation {
        if self.is_read() {
            Operation::Get
        } else {
            Operation::Put
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouterOperation::ReadPiece => "READ_PIECE",
            RouterOperation::StorePiece => "STORE_PIECE",
            RouterOperation::ReadDagNode => "READ_DAG_NODE",
            RouterOperation::StoreDagNode => "STORE_DAG_NODE",
            RouterOperation::ReadCnsRecord => "READ_CNS_RECORD",
            RouterOperation::StoreCnsRecord => "STORE_CNS_RECORD",
        }
    }
}

impl fmt::Display for RouterOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stage of the routing pipeline
#[async_trait]
pub trait RoutingStrategy: Send + Sync {
    /// Polled by the router before first use
    async fn is_ready(&self) -> bool {
        true
    }

    /// Full candidate set for a bucket
    async fn get_nodes(&self, bucket_id: u64) -> Result<Vec<NodeDescriptor>>;

    /// Filter and reorder candidates for `operation`
    async fn marshal(
        &self,
        _operation: RouterOperation,
        nodes: Vec<NodeDescriptor>,
    ) -> Vec<NodeDescriptor> {
        nodes
    }

    fn select(&self, _operation: RouterOperation, nodes: &[NodeDescriptor]) -> Option<NodeDescriptor> {
        nodes.first().cloned()
    }
}

/// Uniform random pick, used by the base strategies
pub(crate) fn random_node(nodes: &[NodeDescriptor]) -> Option<NodeDescriptor> {
    nodes.choose(&mut rand::thread_rng()).cloned()
}
