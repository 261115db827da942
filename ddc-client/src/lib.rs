//! DDC Client
//!
//! Routes piece, DAG and CNS operations to storage nodes of a DDC cluster.
//!
//! # Architecture
//!
//! ```text
//! DdcClient ──► Router ──► RoutingStrategy pipeline ──► StorageNode ──► NodeTransport
//!                 │          (base → ping → node type)        │
//!                 └─ TokenIssuer (signed AuthToken per call) ──┘
//! ```
//!
//! The client encrypts and decrypts content, retries reachability failures on
//! other nodes, and never retries integrity failures.

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod node;
pub mod registry;
pub mod router;
pub mod routing;
pub mod storage_node;
pub mod transport;

pub use auth::{AuthToken, AuthTokenBuilder, TokenError, TokenIssuer};
pub use cache::{TopologyCache, TtlCache};
pub use client::{Decryption, DdcClient, StoreOutcome, StoreRequest};
pub use config::{
    CacheConfig, ClientConfig, GrpcConfig, PingConfig, RouterConfig, StorageNodeConfig,
};
pub use node::{NodeDescriptor, NodeMode};
pub use registry::{Bucket, ChainRegistry, InMemoryRegistry, NodeProps, StorageNodeRecord};
pub use router::{Router, RouterOperation};
pub use routing::{
    BlockchainStrategy, HttpProber, NodeProber, NodeTypeStrategy, PingStrategy, ProbeState,
    ProbeTable, Probing, RoutingStrategy, StaticStrategy,
};
pub use storage_node::{ReadOptions, StorageNode, StoreOptions};
pub use transport::{GrpcTransport, NodeTransport, PieceStream, RawPieceFrames};
