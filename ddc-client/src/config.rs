//! Client configuration
//!
//! Every struct has a `Default` and a `from_env()` that reads `DDC_*`
//! variables and falls back to the default for anything unset or unparsable.

use ddc_core::{DEFAULT_PART_SIZE, STREAM_FRAME_SIZE};
use std::str::FromStr;
use std::time::Duration;

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_millis(key: &str, default: Duration) -> Duration {
    env_parse::<u64>(key)
        .map(Duration::from_millis)
        .unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    env_parse::<u64>(key)
        .map(Duration::from_secs)
        .unwrap_or(default)
}

/// Optional TTL in seconds; `0` or unset means "never expire"
fn env_ttl_secs(key: &str, default: Option<Duration>) -> Option<Duration> {
    match env_parse::<u64>(key) {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => default,
    }
}

/// Router behavior
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Interval between strategy readiness checks
    pub readiness_poll: Duration,
    /// Give up waiting for readiness after this long
    pub readiness_timeout: Duration,
    /// Lifetime of per-call auth tokens
    pub token_ttl: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            readiness_poll: Duration::from_millis(100),
            readiness_timeout: Duration::from_secs(30),
            token_ttl: Duration::from_secs(60),
        }
    }
}

impl RouterConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            readiness_poll: env_millis("DDC_READINESS_POLL_MS", d.readiness_poll),
            readiness_timeout: env_millis("DDC_READINESS_TIMEOUT_MS", d.readiness_timeout),
            token_ttl: env_secs("DDC_TOKEN_TTL_SECS", d.token_ttl),
        }
    }
}

/// Latency probing
#[derive(Debug, Clone)]
pub struct PingConfig {
    /// Probe synchronously until this many nodes are known healthy
    pub min_healthy: usize,
    /// Maximum background probes scheduled per call
    pub background_cap: usize,
    /// Delay before background probes start
    pub background_delay: Duration,
    /// Per-probe timeout
    pub probe_timeout: Duration,
    /// Width of a latency band; order within a band is random
    pub latency_band: Duration,
    /// How long a failed probe is remembered; `None` means forever
    pub failure_ttl: Option<Duration>,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            min_healthy: 3,
            background_cap: 5,
            background_delay: Duration::from_millis(500),
            probe_timeout: Duration::from_secs(2),
            latency_band: Duration::from_millis(100),
            failure_ttl: None,
        }
    }
}

impl PingConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            min_healthy: env_parse("DDC_PING_MIN_HEALTHY").unwrap_or(d.min_healthy),
            background_cap: env_parse("DDC_PING_BACKGROUND_CAP").unwrap_or(d.background_cap),
            background_delay: env_millis("DDC_PING_BACKGROUND_DELAY_MS", d.background_delay),
            probe_timeout: env_millis("DDC_PING_TIMEOUT_MS", d.probe_timeout),
            latency_band: env_millis("DDC_PING_LATENCY_BAND_MS", d.latency_band),
            failure_ttl: env_ttl_secs("DDC_PING_FAILURE_TTL_SECS", d.failure_ttl),
        }
    }
}

/// Topology caching
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// TTL for cached buckets and cluster node lists; `None` means forever
    pub topology_ttl: Option<Duration>,
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            topology_ttl: env_ttl_secs("DDC_TOPOLOGY_TTL_SECS", None),
        }
    }
}

/// Piece transfer sizing
#[derive(Debug, Clone)]
pub struct StorageNodeConfig {
    /// Pieces above this size are stored as multipart pieces
    pub part_size: usize,
    /// Body frame size on piece streams
    pub frame_size: usize,
}

impl Default for StorageNodeConfig {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            frame_size: STREAM_FRAME_SIZE,
        }
    }
}

impl StorageNodeConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            part_size: env_parse("DDC_PART_SIZE").unwrap_or(d.part_size),
            frame_size: env_parse("DDC_STREAM_FRAME_SIZE").unwrap_or(d.frame_size),
        }
    }
}

/// gRPC channel settings
#[derive(Debug, Clone)]
pub struct GrpcConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl GrpcConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            connect_timeout: env_secs("DDC_CONNECT_TIMEOUT_SECS", d.connect_timeout),
            request_timeout: env_secs("DDC_REQUEST_TIMEOUT_SECS", d.request_timeout),
        }
    }
}

/// Aggregate configuration for [`crate::DdcClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub router: RouterConfig,
    pub ping: PingConfig,
    pub cache: CacheConfig,
    pub storage: StorageNodeConfig,
    pub grpc: GrpcConfig,
    /// Attempts per operation, counting the first
    pub max_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            router: RouterConfig::default(),
            ping: PingConfig::default(),
            cache: CacheConfig::default(),
            storage: StorageNodeConfig::default(),
            grpc: GrpcConfig::default(),
            max_attempts: 3,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self {
            router: RouterConfig::from_env(),
            ping: PingConfig::from_env(),
            cache: CacheConfig::from_env(),
            storage: StorageNodeConfig::from_env(),
            grpc: GrpcConfig::from_env(),
            max_attempts: env_parse("DDC_MAX_ATTEMPTS").unwrap_or(3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.router.readiness_poll, Duration::from_millis(100));
        assert_eq!(config.ping.min_healthy, 3);
        assert_eq!(config.ping.failure_ttl, None);
        assert_eq!(config.cache.topology_ttl, None);
        assert_eq!(config.storage.part_size, 16 * 1024 * 1024);
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("DDC_PING_LATENCY_BAND_MS", "250");
        std::env::set_var("DDC_PING_FAILURE_TTL_SECS", "30");
        std::env::set_var("DDC_PING_MIN_HEALTHY", "not a number");

        let ping = PingConfig::from_env();
        assert_eq!(ping.latency_band, Duration::from_millis(250));
        assert_eq!(ping.failure_ttl, Some(Duration::from_secs(30)));
        assert_eq!(ping.min_healthy, 3);

        std::env::remove_var("DDC_PING_LATENCY_BAND_MS");
        std::env::remove_var("DDC_PING_FAILURE_TTL_SECS");
        std::env::remove_var("DDC_PING_MIN_HEALTHY");
    }

    #[test]
    fn test_zero_ttl_means_forever() {
        std::env::set_var("DDC_TOPOLOGY_TTL_SECS", "0");
        assert_eq!(CacheConfig::from_env().topology_ttl, None);
        std::env::remove_var("DDC_TOPOLOGY_TTL_SECS");
    }
}
