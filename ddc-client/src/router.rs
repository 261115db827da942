//! Router facade
//!
//! Single entry point for picking a storage node: waits for the strategy to be
//! ready, fetches candidates, drops the caller's exclusions, lets the strategy
//! order and select, mints a scoped token, and returns a bound [`StorageNode`].
//! The router never retries; callers re-route with the failed node excluded.

use crate::auth::TokenIssuer;
use crate::cache::TopologyCache;
use crate::config::ClientConfig;
use crate::config::{RouterConfig, StorageNodeConfig};
use crate::node::NodeDescriptor;
use crate::registry::ChainRegistry;
use crate::routing::{
    BlockchainStrategy, NodeTypeStrategy, PingStrategy, Probing, RoutingStrategy, StaticStrategy,
};
use crate::storage_node::StorageNode;
use crate::transport::NodeTransport;
use ddc_core::{DdcError, Result};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

pub use crate::routing::RouterOperation;

pub struct Router {
    strategy: Arc<dyn RoutingStrategy>,
    transport: Arc<dyn NodeTransport>,
    issuer: Arc<TokenIssuer>,
    config: RouterConfig,
    storage: StorageNodeConfig,
}

impl Router {
    pub fn new(
        strategy: Arc<dyn RoutingStrategy>,
        transport: Arc<dyn NodeTransport>,
        issuer: Arc<TokenIssuer>,
        config: RouterConfig,
        storage: StorageNodeConfig,
    ) -> Self {
        Self {
            strategy,
            transport,
            issuer,
            config,
            storage,
        }
    }

    /// Fixed node list → ping → node type
    pub fn with_static_nodes(
        nodes: Vec<NodeDescriptor>,
        probing: Probing,
        transport: Arc<dyn NodeTransport>,
        issuer: Arc<TokenIssuer>,
        config: &ClientConfig,
    ) -> Self {
        info!(nodes = nodes.len(), "Routing over static node list");
        let base = Arc::new(StaticStrategy::new(nodes));
        Self::new(
            pipeline(base, probing, config),
            transport,
            issuer,
            config.router.clone(),
            config.storage.clone(),
        )
    }

    /// Chain topology → ping → node type
    pub fn with_blockchain(
        registry: Arc<dyn ChainRegistry>,
        topology: Arc<TopologyCache>,
        probing: Probing,
        transport: Arc<dyn NodeTransport>,
        issuer: Arc<TokenIssuer>,
        config: &ClientConfig,
    ) -> Self {
        let base = Arc::new(BlockchainStrategy::new(registry, topology));
        Self::new(
            pipeline(base, probing, config),
            transport,
            issuer,
            config.router.clone(),
            config.storage.clone(),
        )
    }

    pub fn issuer(&self) -> &Arc<TokenIssuer> {
        &self.issuer
    }

    /// Pick a node for `operation` on `bucket_id`, never one listed in `exclude`
    pub async fn get_node(
        &self,
        operation: RouterOperation,
        bucket_id: u64,
        exclude: &[String],
    ) -> Result<StorageNode> {
        self.wait_ready().await?;

        let candidates: Vec<NodeDescriptor> = self
            .strategy
            .get_nodes(bucket_id)
            .await?
            .into_iter()
            .filter(|node| !exclude.contains(&node.id))
            .collect();
        let ordered = self.strategy.marshal(operation, candidates).await;

        let node = self
            .strategy
            .select(operation, &ordered)
            .ok_or_else(|| DdcError::NoNodesAvailable {
                operation: operation.to_string(),
                bucket_id,
            })?;

        // fails here, before any call, when our grant cannot cover the operation
        let token = self.issuer.issue(bucket_id, operation.access())?;

        debug!(
            node = %node.id,
            bucket_id,
            operation = %operation,
            excluded = exclude.len(),
            "Routed operation"
        );
        Ok(StorageNode::new(
            node,
            self.transport.clone(),
            self.issuer.clone(),
            self.storage.clone(),
        )
        .with_token(token))
    }

    async fn wait_ready(&self) -> Result<()> {
        let deadline = Instant::now() + self.config.readiness_timeout;
        loop {
            if self.strategy.is_ready().await {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DdcError::TopologyResolution(format!(
                    "routing not ready after {:?}",
                    self.config.readiness_timeout
                )));
            }
            tokio::time::sleep(self.config.readiness_poll).await;
        }
    }
}

fn pipeline(
    base: Arc<dyn RoutingStrategy>,
    probing: Probing,
    config: &ClientConfig,
) -> Arc<dyn RoutingStrategy> {
    let ping = Arc::new(PingStrategy::new(base, probing, config.ping.clone()));
    Arc::new(NodeTypeStrategy::new(ping))
}
