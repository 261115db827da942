//! DDC Core Library
//!
//! Content model shared by every DDC client component:
//! - Content identifiers (CID) with base32 text form
//! - Pieces, multipart pieces, DAG nodes and CNS records
//! - Streaming integrity validation against a CID
//! - Blake3 hashing and AES-GCM content encryption
//! - Hierarchical data-encryption-key derivation and key sealing
//! - Common error handling

pub mod cid;
pub mod content;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod seal;
pub mod validator;

pub use cid::{is_cid, Cid, Codec, ContentRef};
pub use content::{reassemble_parts, CnsRecord, DagNode, Link, MultipartPiece, Piece};
pub use crypto::{decrypt, encrypt, ContentHash, EncryptionKey};
pub use ddc_protocol::Tag;
pub use error::{DdcError, Result};
pub use keys::{DekPath, MasterKey};
pub use seal::{BoxKeypair, BoxPublicKey, SealedKey};
pub use validator::ContentValidator;

/// Part size constants
pub const MIN_PART_SIZE: usize = 1024; // 1 KB
pub const DEFAULT_PART_SIZE: usize = 16 * 1024 * 1024; // 16 MB

/// Size of a single body frame on piece streams
pub const STREAM_FRAME_SIZE: usize = 64 * 1024; // 64 KB
