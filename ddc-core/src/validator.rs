//! Streaming integrity checks
//!
//! Bytes are hashed as they arrive; at the end of the stream the digest must
//! equal the trailing hash of the CID that was requested.

use crate::cid::Cid;
use crate::content::DagNode;
use crate::crypto::ContentHash;
use crate::error::{DdcError, Result};

/// Incremental Blake3 check of a byte stream against a CID
pub struct ContentValidator {
    expected: ContentHash,
    hasher: blake3::Hasher,
    bytes_seen: u64,
}

impl ContentValidator {
    pub fn new(cid: &Cid) -> Self {
        Self {
            expected: cid.content_hash(),
            hasher: blake3::Hasher::new(),
            bytes_seen: 0,
        }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.bytes_seen += chunk.len() as u64;
    }

    pub fn bytes_seen(&self) -> u64 {
        self.bytes_seen
    }

    /// Compare the accumulated digest with the CID.
    ///
    /// A mismatch means the received bytes must be discarded.
    pub fn finalize(self) -> Result<ContentHash> {
        let actual = ContentHash::from_hash(self.hasher.finalize());
        if actual != self.expected {
            return Err(DdcError::ContentIntegrity {
                expected: self.expected.to_hex(),
                actual: actual.to_hex(),
            });
        }
        Ok(actual)
    }
}

/// One-shot check of a complete buffer
pub fn validate(cid: &Cid, data: &[u8]) -> Result<()> {
    let mut validator = ContentValidator::new(cid);
    validator.update(data);
    validator.finalize().map(|_| ())
}

/// Check a DAG node by re-hashing its canonical encoding
pub fn validate_dag_node(cid: &Cid, node: &DagNode) -> Result<()> {
    validate(cid, &node.canonical_bytes())
}
