//! Latency-based node discovery
//!
//! Each node endpoint has one probe record: pending, healthy with a measured
//! latency, or failed. A call probes just enough unknown nodes synchronously to
//! reach the configured number of healthy nodes, schedules a few more probes in
//! the background, and returns the healthy nodes ordered by latency band.
//! Background results only show up in later calls. A call that is still short
//! of healthy nodes waits on probes other calls have in flight.

use super::{RouterOperation, RoutingStrategy};
use crate::config::PingConfig;
use crate::node::NodeDescriptor;
use async_trait::async_trait;
use ddc_core::{DdcError, Result};
use futures::future::join_all;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Probe record of one endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Pending,
    Healthy { latency: Duration },
    Failed { at: Instant },
}

/// Shared endpoint → probe record map.
///
/// Failures are remembered for `failure_ttl`, or forever when it is `None`.
/// Every change bumps a generation counter that callers can wait on.
#[derive(Debug)]
pub struct ProbeTable {
    states: RwLock<HashMap<String, ProbeState>>,
    failure_ttl: Option<Duration>,
    changes: watch::Sender<u64>,
}

impl Default for ProbeTable {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ProbeTable {
    pub fn new(failure_ttl: Option<Duration>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            states: RwLock::new(HashMap::new()),
            failure_ttl,
            changes,
        }
    }

    fn bump(&self) {
        self.changes.send_modify(|generation| *generation += 1);
    }

    /// Receiver that wakes on every later change to the table
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn is_live(&self, state: &ProbeState) -> bool {
        match (state, self.failure_ttl) {
            (ProbeState::Failed { at }, Some(ttl)) => at.elapsed() < ttl,
            _ => true,
        }
    }

    /// Current record; an expired failure reads as no record
    pub fn state(&self, endpoint: &str) -> Option<ProbeState> {
        self.states
            .read()
            .get(endpoint)
            .copied()
            .filter(|s| self.is_live(s))
    }

    pub fn latency(&self, endpoint: &str) -> Option<Duration> {
        match self.state(endpoint) {
            Some(ProbeState::Healthy { latency }) => Some(latency),
            _ => None,
        }
    }

    pub fn record(&self, endpoint: &str, state: ProbeState) {
        self.states.write().insert(endpoint.to_string(), state);
        self.bump();
    }

    /// Healthy and pending counts among `nodes`
    fn tally(&self, nodes: &[NodeDescriptor]) -> (usize, usize) {
        let states = self.states.read();
        nodes.iter().fold((0, 0), |(healthy, pending), node| {
            match states.get(&node.http_endpoint) {
                Some(ProbeState::Healthy { .. }) => (healthy + 1, pending),
                Some(ProbeState::Pending) => (healthy, pending + 1),
                _ => (healthy, pending),
            }
        })
    }

    /// Mark `endpoint` pending unless it already has a live record.
    /// Returns whether the caller now owns the probe.
    fn claim(&self, endpoint: &str) -> bool {
        let mut states = self.states.write();
        if let Some(state) = states.get(endpoint) {
            if self.is_live(state) {
                return false;
            }
        }
        states.insert(endpoint.to_string(), ProbeState::Pending);
        true
    }

    pub fn invalidate(&self, endpoint: &str) {
        self.states.write().remove(endpoint);
        self.bump();
    }

    pub fn clear(&self) {
        self.states.write().clear();
        self.bump();
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Liveness check against one node
#[async_trait]
pub trait NodeProber: Send + Sync {
    async fn probe(&self, node: &NodeDescriptor) -> Result<()>;
}

/// Probes `GET {http_endpoint}/info`
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DdcError::Configuration(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl NodeProber for HttpProber {
    async fn probe(&self, node: &NodeDescriptor) -> Result<()> {
        let url = format!("{}/info", node.http_endpoint.trim_end_matches('/'));
        self.client
            .get(&url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| DdcError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// Prober plus the table its results go to
#[derive(Clone)]
pub struct Probing {
    pub prober: Arc<dyn NodeProber>,
    pub table: Arc<ProbeTable>,
}

impl Probing {
    pub fn new(prober: Arc<dyn NodeProber>, table: Arc<ProbeTable>) -> Self {
        Self { prober, table }
    }

    /// HTTP probes with a fresh table
    pub fn http(config: &PingConfig) -> Result<Self> {
        Ok(Self {
            prober: Arc::new(HttpProber::new(config.probe_timeout)?),
            table: Arc::new(ProbeTable::new(config.failure_ttl)),
        })
    }

    async fn probe(&self, node: &NodeDescriptor, timeout: Duration) {
        let started = Instant::now();
        let outcome = match tokio::time::timeout(timeout, self.prober.probe(node)).await {
            Ok(Ok(())) => Ok(started.elapsed()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("no answer within {timeout:?}")),
        };

        match outcome {
            Ok(latency) => {
                debug!(
                    node = %node.id,
                    latency_ms = latency.as_millis() as u64,
                    "Probe succeeded"
                );
                self.table
                    .record(&node.http_endpoint, ProbeState::Healthy { latency });
            }
            Err(reason) => {
                let err = DdcError::PingFailure {
                    endpoint: node.http_endpoint.clone(),
                    reason,
                };
                warn!(node = %node.id, error = %err, "Probe failed");
                self.table.record(
                    &node.http_endpoint,
                    ProbeState::Failed { at: Instant::now() },
                );
            }
        }
    }
}

/// Keeps only healthy nodes, ordered by latency band
pub struct PingStrategy {
    inner: Arc<dyn RoutingStrategy>,
    probing: Probing,
    config: PingConfig,
}

impl PingStrategy {
    pub fn new(inner: Arc<dyn RoutingStrategy>, probing: Probing, config: PingConfig) -> Self {
        Self {
            inner,
            probing,
            config,
        }
    }

    pub fn table(&self) -> &Arc<ProbeTable> {
        &self.probing.table
    }

    /// Wait for probes owned by other calls until `nodes` holds enough
    /// healthy entries or none of them is pending any more.
    async fn await_pending(&self, nodes: &[NodeDescriptor]) {
        let table = &self.probing.table;
        let mut changes = table.subscribe();
        let settled = async {
            loop {
                let (healthy, pending) = table.tally(nodes);
                if pending == 0 || healthy >= self.config.min_healthy {
                    return;
                }
                if changes.changed().await.is_err() {
                    return;
                }
            }
        };

        let limit = self.config.background_delay + self.config.probe_timeout;
        if tokio::time::timeout(limit, settled).await.is_err() {
            debug!(?limit, "Gave up waiting on in-flight probes");
        }
    }
}

#[async_trait]
impl RoutingStrategy for PingStrategy {
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
        let nodes = self.inner.marshal(operation, nodes).await;
        let table = &self.probing.table;

        let healthy = nodes
            .iter()
            .filter(|n| table.latency(&n.http_endpoint).is_some())
            .count();

        let mut now = Vec::new();
        let mut later = Vec::new();
        for node in &nodes {
            if healthy + now.len() < self.config.min_healthy {
                if table.claim(&node.http_endpoint) {
                    now.push(node.clone());
                }
            } else if later.len() < self.config.background_cap {
                if table.claim(&node.http_endpoint) {
                    later.push(node.clone());
                }
            } else {
                break;
            }
        }

        if !now.is_empty() {
            debug!(count = now.len(), "Probing nodes before routing");
            let timeout = self.config.probe_timeout;
            // spawned so a dropped call cannot leave its claims pending
            let probes = now.into_iter().map(|node| {
                let probing = self.probing.clone();
                tokio::spawn(async move { probing.probe(&node, timeout).await })
            });
            for outcome in join_all(probes).await {
                if let Err(e) = outcome {
                    warn!(error = %e, "Probe task failed");
                }
            }
        }

        let scheduled: HashSet<String> = later.iter().map(|n| n.http_endpoint.clone()).collect();
        if !later.is_empty() {
            debug!(count = later.len(), "Scheduling background probes");
            let probing = self.probing.clone();
            let delay = self.config.background_delay;
            let timeout = self.config.probe_timeout;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                join_all(later.iter().map(|n| probing.probe(n, timeout))).await;
            });
        }

        let watched: Vec<NodeDescriptor> = nodes
            .iter()
            .filter(|n| !scheduled.contains(&n.http_endpoint))
            .cloned()
            .collect();
        self.await_pending(&watched).await;

        let mut ranked: Vec<(Duration, NodeDescriptor)> = nodes
            .into_iter()
            .filter_map(|n| table.latency(&n.http_endpoint).map(|latency| (latency, n)))
            .collect();
        ranked.shuffle(&mut rand::thread_rng());

        let band = self.config.latency_band.as_millis().max(1);
        ranked.sort_by_key(|(latency, _)| latency.as_millis() / band);
        ranked.into_iter().map(|(_, node)| node).collect()
    }
}
