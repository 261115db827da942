//! In-process caches for chain topology
//!
//! Buckets and cluster node lists rarely change once registered, so by default
//! entries never expire. A TTL can be configured, and entries can be dropped
//! explicitly when a caller learns they are stale.

use crate::config::CacheConfig;
use crate::node::NodeDescriptor;
use crate::registry::{Bucket, ClusterId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Map with an optional per-entry time-to-live
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, (V, Instant)>>,
    ttl: Option<Duration>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read();
        let (value, inserted) = entries.get(key)?;
        match self.ttl {
            Some(ttl) if inserted.elapsed() >= ttl => None,
            _ => Some(value.clone()),
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.write().insert(key, (value, Instant::now()));
    }

    pub fn invalidate(&self, key: &K) -> bool {
        self.entries.write().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of stored entries, expired or not
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Buckets by id and storage nodes by cluster id
#[derive(Debug)]
pub struct TopologyCache {
    buckets: TtlCache<u64, Bucket>,
    clusters: TtlCache<ClusterId, Vec<NodeDescriptor>>,
}

impl TopologyCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            buckets: TtlCache::new(config.topology_ttl),
            clusters: TtlCache::new(config.topology_ttl),
        }
    }

    pub fn bucket(&self, bucket_id: u64) -> Option<Bucket> {
        self.buckets.get(&bucket_id)
    }

    pub fn insert_bucket(&self, bucket: Bucket) {
        self.buckets.insert(bucket.id, bucket);
    }

    pub fn cluster_nodes(&self, cluster_id: &ClusterId) -> Option<Vec<NodeDescriptor>> {
        self.clusters.get(cluster_id)
    }

    pub fn insert_cluster_nodes(&self, cluster_id: ClusterId, nodes: Vec<NodeDescriptor>) {
        self.clusters.insert(cluster_id, nodes);
    }

    pub fn invalidate_bucket(&self, bucket_id: u64) {
        if self.buckets.invalidate(&bucket_id) {
            debug!(bucket_id, "Invalidated cached bucket");
        }
    }

    pub fn invalidate_cluster(&self, cluster_id: &ClusterId) {
        if self.clusters.invalidate(cluster_id) {
            debug!(cluster_id = %cluster_id, "Invalidated cached cluster nodes");
        }
    }

    pub fn clear(&self) {
        self.buckets.clear();
        self.clusters.clear();
    }
}

impl Default for TopologyCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
