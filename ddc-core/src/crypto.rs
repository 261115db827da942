//! Cryptographic primitives for DDC
//!
//! Provides:
//! - Blake3 content hashing (the trailing 32 bytes of every CID)
//! - AES-256-GCM content encryption under a data encryption key

use crate::error::{DdcError, Result};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use std::fmt;

/// AES-256-GCM key size (32 bytes)
pub const KEY_SIZE: usize = 32;

/// AES-GCM nonce size (12 bytes / 96 bits)
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Size of a Blake3 digest
pub const HASH_SIZE: usize = 32;

/// Blake3 hash wrapper for content addressing
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(blake3::Hash);

impl ContentHash {
    /// Compute Blake3 hash of data
    pub fn compute(data: &[u8]) -> Self {
        Self(blake3::hash(data))
    }

    pub fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(blake3::Hash::from_bytes(bytes))
    }

    /// Create from a slice (validates length)
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; HASH_SIZE] = slice.try_into().map_err(|_| {
            DdcError::InvalidCid(format!(
                "hash must be {} bytes, got {}",
                HASH_SIZE,
                slice.len()
            ))
        })?;
        Ok(Self::from_bytes(bytes))
    }

    pub(crate) fn from_hash(hash: blake3::Hash) -> Self {
        Self(hash)
    }

    /// Get the raw hash bytes
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        self.0.as_bytes()
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }

    /// Verify that data matches this hash
    pub fn verify(&self, data: &[u8]) -> bool {
        self == &Self::compute(data)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// AES-256-GCM data encryption key (DEK)
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Generate a new random encryption key
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice (validates length)
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != KEY_SIZE {
            return Err(DdcError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: slice.len(),
            });
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(slice);
        Ok(Self(key))
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionKey([REDACTED])")
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

/// Encrypt content with AES-256-GCM.
///
/// Output layout is `nonce (12) || ciphertext || tag (16)`, which is what gets
/// stored as the piece body.
pub fn encrypt(plaintext: &[u8], key: &EncryptionKey) -> Result<Vec<u8>> {
    use rand::RngCore;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| DdcError::Encryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| DdcError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt content produced by [`encrypt`]
pub fn decrypt(data: &[u8], key: &EncryptionKey) -> Result<Vec<u8>> {
    if data.len() < NONCE_SIZE + TAG_SIZE {
        return Err(DdcError::Decryption(
            "Data too short for encrypted content".to_string(),
        ));
    }
    let (nonce, ciphertext) = data.split_at(NONCE_SIZE);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| DdcError::Decryption(e.to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| DdcError::Decryption("Authentication failed".to_string()))
}
