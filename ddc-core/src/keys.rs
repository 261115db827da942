//! Hierarchical data-encryption-key derivation
//!
//! A DEK for a path is a left fold of BLAKE2b-256 over the path's segments,
//! seeded with the master secret:
//!
//! ```text
//! k0 = master
//! ki = BLAKE2b-256(k(i-1) || utf8(segment_i))
//! ```
//!
//! So a key for `a` can derive the key for `a/b` but not for `a`'s siblings
//! or ancestors.

use crate::crypto::{EncryptionKey, KEY_SIZE};
use crate::error::{DdcError, Result};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use std::fmt;
use std::str::FromStr;

type Blake2b256 = Blake2b<U32>;

/// Separator between path segments
pub const PATH_SEPARATOR: char = '/';

/// A non-empty `/`-separated key path. Empty segments are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DekPath {
    segments: Vec<String>,
}

impl DekPath {
    pub fn parse(path: &str) -> Result<Self> {
        let segments: Vec<String> = path
            .split(PATH_SEPARATOR)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if segments.is_empty() {
            return Err(DdcError::KeyDerivation(format!(
                "path {path:?} has no segments"
            )));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// `self` followed by `child`
    pub fn join(&self, child: &DekPath) -> DekPath {
        let mut segments = self.segments.clone();
        segments.extend(child.segments.iter().cloned());
        DekPath { segments }
    }

    /// Whether `self` is `other` or nested beneath it
    pub fn starts_with(&self, other: &DekPath) -> bool {
        self.segments.starts_with(&other.segments)
    }
}

impl fmt::Display for DekPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl FromStr for DekPath {
    type Err = DdcError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Root secret every DEK is derived from
#[derive(Clone)]
pub struct MasterKey(Vec<u8>);

impl MasterKey {
    /// Rejects empty key material up front
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(DdcError::KeyDerivation(
                "master key material is empty".to_string(),
            ));
        }
        Ok(Self(bytes))
    }

    /// Parse hex (optionally `0x` prefixed) key material
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim().trim_start_matches("0x"))
            .map_err(|e| DdcError::KeyDerivation(e.to_string()))?;
        Self::new(bytes)
    }

    pub fn derive(&self, path: &DekPath) -> EncryptionKey {
        EncryptionKey::from_bytes(fold(&self.0, path))
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterKey([REDACTED])")
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl EncryptionKey {
    /// Continue the derivation below the path this key was derived for
    pub fn derive_child(&self, path: &DekPath) -> EncryptionKey {
        EncryptionKey::from_bytes(fold(self.as_bytes(), path))
    }
}

fn fold(seed: &[u8], path: &DekPath) -> [u8; KEY_SIZE] {
    // DekPath always holds at least one segment
    path.segments[1..]
        .iter()
        .fold(step(seed, &path.segments[0]), |key, segment| {
            step(&key, segment)
        })
}

fn step(running: &[u8], segment: &str) -> [u8; KEY_SIZE] {
    let mut hasher = Blake2b256::new();
    hasher.update(running);
    hasher.update(segment.as_bytes());
    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&hasher.finalize());
    key
}
