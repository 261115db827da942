//! Content identifiers
//!
//! A CID is an opaque byte string whose trailing 32 bytes are the Blake3 hash
//! of the content it names. CIDs minted by this crate have the layout
//!
//! ```text
//! [ version: 0x01 ][ codec ][ hash fn: 0x1e ][ hash len: 0x20 ][ digest: 32 bytes ]
//! ```
//!
//! Text form is multibase base32: `b` followed by lowercase unpadded RFC 4648
//! base32. Hex (optionally `0x` prefixed) is accepted on input.

use crate::crypto::{ContentHash, HASH_SIZE};
use crate::error::{DdcError, Result};
use data_encoding::{BASE32_NOPAD, HEXLOWER_PERMISSIVE};
use std::fmt;
use std::str::FromStr;

pub const CID_VERSION: u8 = 0x01;

/// Multihash code for Blake3
pub const BLAKE3_CODE: u8 = 0x1e;

/// Multibase prefix of the base32 text form
pub const BASE32_PREFIX: char = 'b';

/// What the hashed bytes of a CID are
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Codec {
    /// Raw piece bytes
    Raw = 0x55,
    /// Ordered concatenation of part hashes
    Multipart = 0x0f,
    /// Canonical DAG node encoding
    DagNode = 0x70,
}

impl Codec {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x55 => Some(Codec::Raw),
            0x0f => Some(Codec::Multipart),
            0x70 => Some(Codec::DagNode),
            _ => None,
        }
    }
}

/// Content identifier
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid(Vec<u8>);

impl Cid {
    /// Mint a CID for an already computed hash
    pub fn new(codec: Codec, hash: &ContentHash) -> Self {
        let mut bytes = Vec::with_capacity(4 + HASH_SIZE);
        bytes.extend_from_slice(&[CID_VERSION, codec.code(), BLAKE3_CODE, HASH_SIZE as u8]);
        bytes.extend_from_slice(hash.as_bytes());
        Self(bytes)
    }

    /// Hash `data` and mint a CID for it
    pub fn from_data(codec: Codec, data: &[u8]) -> Self {
        Self::new(codec, &ContentHash::compute(data))
    }

    /// Wrap canonical bytes received from elsewhere.
    ///
    /// Anything longer than a bare hash is accepted; the prefix is not
    /// interpreted.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() <= HASH_SIZE {
            return Err(DdcError::InvalidCid(format!(
                "expected more than {} bytes, got {}",
                HASH_SIZE,
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    /// Parse the text form (base32 multibase, then hex)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if let Some(body) = s.strip_prefix(BASE32_PREFIX) {
            if let Ok(bytes) = BASE32_NOPAD.decode(body.to_ascii_uppercase().as_bytes()) {
                if bytes.len() > HASH_SIZE {
                    return Ok(Self(bytes));
                }
            }
        }

        let hex = s.strip_prefix("0x").unwrap_or(s);
        match HEXLOWER_PERMISSIVE.decode(hex.as_bytes()) {
            Ok(bytes) => Self::from_bytes(bytes),
            Err(_) => Err(DdcError::InvalidCid(format!("not a base32 or hex CID: {s}"))),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.clone()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// The codec, when the CID uses the layout minted by this crate
    pub fn codec(&self) -> Option<Codec> {
        if self.0.len() == 4 + HASH_SIZE && self.0[0] == CID_VERSION && self.0[2] == BLAKE3_CODE {
            Codec::from_code(self.0[1])
        } else {
            None
        }
    }

    /// Trailing 32 bytes
    pub fn content_hash(&self) -> ContentHash {
        let mut hash = [0u8; HASH_SIZE];
        hash.copy_from_slice(&self.0[self.0.len() - HASH_SIZE..]);
        ContentHash::from_bytes(hash)
    }

    /// Multibase base32 text form
    pub fn to_base32(&self) -> String {
        let mut s = String::with_capacity(1 + (self.0.len() * 8 + 4) / 5);
        s.push(BASE32_PREFIX);
        s.push_str(&BASE32_NOPAD.encode(&self.0).to_ascii_lowercase());
        s
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self.to_base32())
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base32())
    }
}

impl FromStr for Cid {
    type Err = DdcError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<Vec<u8>> for Cid {
    type Error = DdcError;

    fn try_from(bytes: Vec<u8>) -> Result<Self> {
        Self::from_bytes(bytes)
    }
}

impl AsRef<[u8]> for Cid {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Whether `s` should be treated as a CID rather than a CNS name.
///
/// Decided by decoded length alone, so a long name that happens to be valid
/// base32 or hex is classified as a CID.
pub fn is_cid(s: &str) -> bool {
    Cid::parse(s).is_ok()
}

/// What a read addresses: a CID, or a CNS name to resolve first
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentRef {
    Cid(Cid),
    Name(String),
}

impl ContentRef {
    pub fn parse(s: &str) -> Self {
        match Cid::parse(s) {
            Ok(cid) => ContentRef::Cid(cid),
            Err(_) => ContentRef::Name(s.to_string()),
        }
    }
}

impl From<Cid> for ContentRef {
    fn from(cid: Cid) -> Self {
        ContentRef::Cid(cid)
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentRef::Cid(cid) => write!(f, "{cid}"),
            ContentRef::Name(name) => write!(f, "{name}"),
        }
    }
}
