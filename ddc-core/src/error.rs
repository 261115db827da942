//! Error types for DDC
//!
//! Provides a unified error type for all DDC client operations.

use thiserror::Error;

/// Result type alias for DDC operations
pub type Result<T> = std::result::Result<T, DdcError>;

/// Unified error type for DDC
#[derive(Error, Debug)]
pub enum DdcError {
    // ===== Routing Errors =====
    #[error("No nodes available for {operation} in bucket {bucket_id}")]
    NoNodesAvailable { operation: String, bucket_id: u64 },

    #[error("Topology resolution failed: {0}")]
    TopologyResolution(String),

    #[error("Ping to {endpoint} failed: {reason}")]
    PingFailure { endpoint: String, reason: String },

    // ===== Content Errors =====
    #[error("Content integrity check failed: expected {expected}, got {actual}")]
    ContentIntegrity { expected: String, actual: String },

    #[error("Invalid CID: {0}")]
    InvalidCid(String),

    #[error("Invalid piece: {0}")]
    InvalidPiece(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // ===== Authorization Errors =====
    #[error("Capability denied: {0}")]
    CapabilityDenied(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    // ===== Cryptography Errors =====
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    // ===== Network Errors =====
    #[error("Transport error: {0}")]
    Transport(String),

    // ===== I/O Errors =====
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ===== Serialization Errors =====
    #[error("Serialization error: {0}")]
    Serialization(String),

    // ===== Configuration Errors =====
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ===== Generic Errors =====
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DdcError {
    /// Whether the call may succeed against a different node.
    ///
    /// Only reachability failures qualify. Integrity, token, key and
    /// capability failures are returned to the caller unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DdcError::Transport(_))
    }
}

impl From<prost::DecodeError> for DdcError {
    fn from(err: prost::DecodeError) -> Self {
        DdcError::Serialization(err.to_string())
    }
}
