//! Sealing data encryption keys to X25519 box keys
//!
//! A DEK is sealed by the encryptor for one recipient:
//! 1. ECDH between the encryptor's secret and the recipient's public key
//! 2. Blake3 `derive_key` turns the shared secret into a wrapping key
//! 3. ChaCha20-Poly1305 encrypts the DEK, with the logical key path as AAD
//!
//! The recipient repeats the ECDH from their side with the encryptor's public
//! key, which travels with the sealed key. Sealed keys are stored as small side
//! pieces tagged with `nonce`, `encryptorPublicKey` and `logicalKey`.

use crate::content::Piece;
use crate::crypto::{EncryptionKey, NONCE_SIZE};
use crate::error::{DdcError, Result};
use crate::keys::DekPath;
use chacha20poly1305::aead::{Aead, KeyInit, OsRng, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use std::fmt;
use x25519_dalek::{PublicKey, StaticSecret};

/// Size of an X25519 public or secret key
pub const BOX_KEY_SIZE: usize = 32;

const WRAP_CONTEXT: &str = "ddc-client 2024-01-01 sealed data encryption key";

pub const TAG_NONCE: &str = "nonce";
pub const TAG_ENCRYPTOR: &str = "encryptorPublicKey";
pub const TAG_LOGICAL_KEY: &str = "logicalKey";

/// X25519 public key of a box keypair
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoxPublicKey([u8; BOX_KEY_SIZE]);

impl BoxPublicKey {
    pub fn from_bytes(bytes: [u8; BOX_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim().trim_start_matches("0x"))
            .map_err(|e| DdcError::Serialization(format!("invalid box public key: {e}")))?;
        let bytes: [u8; BOX_KEY_SIZE] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| DdcError::InvalidKeyLength {
                    expected: BOX_KEY_SIZE,
                    actual: bytes.len(),
                })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; BOX_KEY_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for BoxPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoxPublicKey({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for BoxPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// X25519 keypair used to seal and open DEKs
#[derive(Clone)]
pub struct BoxKeypair {
    secret: StaticSecret,
    public: BoxPublicKey,
}

impl BoxKeypair {
    pub fn generate() -> Self {
        Self::from_secret(StaticSecret::random_from_rng(OsRng))
    }

    pub fn from_seed(seed: [u8; BOX_KEY_SIZE]) -> Self {
        Self::from_secret(StaticSecret::from(seed))
    }

    fn from_secret(secret: StaticSecret) -> Self {
        let public = BoxPublicKey(PublicKey::from(&secret).to_bytes());
        Self { secret, public }
    }

    pub fn public(&self) -> BoxPublicKey {
        self.public
    }

    fn wrapping_key(&self, peer: &BoxPublicKey) -> [u8; 32] {
        let shared = self.secret.diffie_hellman(&PublicKey::from(peer.0));
        blake3::derive_key(WRAP_CONTEXT, shared.as_bytes())
    }
}

impl fmt::Debug for BoxKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoxKeypair({:?})", self.public)
    }
}

/// A DEK encrypted for one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedKey {
    pub nonce: [u8; NONCE_SIZE],
    pub encryptor: BoxPublicKey,
    pub ciphertext: Vec<u8>,
    /// Path the sealed DEK was derived for
    pub path: DekPath,
}

impl SealedKey {
    /// Seal `dek` (the key for `path`) from `encryptor` to `recipient`
    pub fn seal(
        dek: &EncryptionKey,
        path: &DekPath,
        encryptor: &BoxKeypair,
        recipient: &BoxPublicKey,
    ) -> Result<Self> {
        use rand::RngCore;

        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let cipher = ChaCha20Poly1305::new(&encryptor.wrapping_key(recipient).into());
        let aad = path.to_string();
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: dek.as_bytes(),
                    aad: aad.as_bytes(),
                },
            )
            .map_err(|e| DdcError::Encryption(e.to_string()))?;

        Ok(Self {
            nonce,
            encryptor: encryptor.public(),
            ciphertext,
            path: path.clone(),
        })
    }

    /// Recover the DEK with the recipient's keypair
    pub fn open(&self, recipient: &BoxKeypair) -> Result<EncryptionKey> {
        let cipher = ChaCha20Poly1305::new(&recipient.wrapping_key(&self.encryptor).into());
        let aad = self.path.to_string();
        let dek = cipher
            .decrypt(
                Nonce::from_slice(&self.nonce),
                Payload {
                    msg: &self.ciphertext,
                    aad: aad.as_bytes(),
                },
            )
            .map_err(|_| DdcError::Decryption("sealed key does not open".to_string()))?;
        EncryptionKey::from_slice(&dek)
    }

    /// Side piece carrying this sealed key
    pub fn to_piece(&self) -> Piece {
        Piece::new(self.ciphertext.clone())
            .with_tag(TAG_NONCE, hex::encode(self.nonce))
            .with_tag(TAG_ENCRYPTOR, self.encryptor.to_hex())
            .with_tag(TAG_LOGICAL_KEY, self.path.to_string())
    }

    pub fn from_piece(piece: &Piece) -> Result<Self> {
        let tag = |key: &str| {
            piece
                .tag(key)
                .ok_or_else(|| DdcError::InvalidPiece(format!("sealed key piece lacks `{key}` tag")))
        };

        let nonce_bytes =
            hex::decode(tag(TAG_NONCE)?).map_err(|e| DdcError::InvalidPiece(e.to_string()))?;
        let nonce: [u8; NONCE_SIZE] = nonce_bytes
            .as_slice()
            .try_into()
            .map_err(|_| DdcError::InvalidPiece(format!("bad nonce length {}", nonce_bytes.len())))?;

        Ok(Self {
            nonce,
            encryptor: BoxPublicKey::from_hex(tag(TAG_ENCRYPTOR)?)?,
            ciphertext: piece.data.to_vec(),
            path: DekPath::parse(tag(TAG_LOGICAL_KEY)?)?,
        })
    }
}
