//! Content model
//!
//! Pieces are the unit of storage. Anything larger than one part is stored as
//! ordered raw parts plus a multipart manifest listing their hashes. DAG nodes
//! and CNS records are small structured objects stored next to pieces.

use crate::cid::{Cid, Codec};
use crate::crypto::ContentHash;
use crate::error::{DdcError, Result};
use bytes::{Bytes, BytesMut};
use ddc_protocol::{auth, cns, dag, piece, Tag};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use prost::Message;

/// A content-addressed byte payload
#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    pub data: Bytes,
    pub tags: Vec<Tag>,
}

impl Piece {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Look up a tag value by key
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    /// CID over the raw bytes (tags are not hashed)
    pub fn cid(&self) -> Cid {
        Cid::from_data(Codec::Raw, &self.data)
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Split into ordered parts of `part_size` bytes; the last may be shorter.
    ///
    /// An empty piece yields a single empty part.
    pub fn split(&self, part_size: usize) -> Result<Vec<Piece>> {
        if part_size == 0 {
            return Err(DdcError::InvalidPiece("part size must be non-zero".into()));
        }
        if self.data.is_empty() {
            return Ok(vec![Piece::new(Bytes::new())]);
        }

        let parts = (0..self.data.len())
            .step_by(part_size)
            .map(|start| {
                let end = (start + part_size).min(self.data.len());
                Piece::new(self.data.slice(start..end))
            })
            .collect();
        Ok(parts)
    }
}

/// Ordered list of part hashes standing in for a large piece
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPiece {
    pub part_hashes: Vec<ContentHash>,
    pub part_size: u64,
    pub total_size: u64,
}

impl MultipartPiece {
    /// Build the manifest for parts produced by [`Piece::split`]
    pub fn from_parts(parts: &[Piece], part_size: u64) -> Self {
        Self {
            part_hashes: parts
                .iter()
                .map(|p| ContentHash::compute(&p.data))
                .collect(),
            part_size,
            total_size: parts.iter().map(|p| p.size() as u64).sum(),
        }
    }

    /// CID over the ordered concatenation of part hashes
    pub fn cid(&self) -> Cid {
        let mut hasher = blake3::Hasher::new();
        for hash in &self.part_hashes {
            hasher.update(hash.as_bytes());
        }
        Cid::new(Codec::Multipart, &ContentHash::from_hash(hasher.finalize()))
    }

    /// Raw-codec CID of each part, in order
    pub fn part_cids(&self) -> Vec<Cid> {
        self.part_hashes
            .iter()
            .map(|h| Cid::new(Codec::Raw, h))
            .collect()
    }

    /// Expected size of part `index`
    pub fn part_len(&self, index: usize) -> u64 {
        let offset = (index as u64).saturating_mul(self.part_size);
        self.total_size.saturating_sub(offset).min(self.part_size)
    }

    /// Check that the declared sizes agree with the number of parts
    pub fn validate(&self) -> Result<()> {
        if self.part_size == 0 {
            return Err(DdcError::InvalidPiece("part size must be non-zero".into()));
        }
        let expected = self.total_size.div_ceil(self.part_size).max(1);
        if expected != self.part_hashes.len() as u64 {
            return Err(DdcError::InvalidPiece(format!(
                "{} bytes in parts of {} need {} parts, manifest lists {}",
                self.total_size,
                self.part_size,
                expected,
                self.part_hashes.len()
            )));
        }
        Ok(())
    }

    pub fn to_proto(&self) -> piece::MultipartManifest {
        piece::MultipartManifest {
            part_hashes: self.part_hashes.iter().map(|h| h.as_bytes().to_vec()).collect(),
            part_size: self.part_size,
            total_size: self.total_size,
        }
    }

    pub fn from_proto(manifest: &piece::MultipartManifest) -> Result<Self> {
        let part_hashes = manifest
            .part_hashes
            .iter()
            .map(|h| ContentHash::from_slice(h))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            part_hashes,
            part_size: manifest.part_size,
            total_size: manifest.total_size,
        })
    }
}

/// Concatenate parts read back in manifest order.
///
/// Each part must hash to the manifest entry at its index and have the
/// expected length.
pub fn reassemble_parts(manifest: &MultipartPiece, parts: &[Bytes]) -> Result<Bytes> {
    manifest.validate()?;
    if parts.len() != manifest.part_hashes.len() {
        return Err(DdcError::InvalidPiece(format!(
            "expected {} parts, got {}",
            manifest.part_hashes.len(),
            parts.len()
        )));
    }

    for (index, (part, hash)) in parts.iter().zip(&manifest.part_hashes).enumerate() {
        if part.len() as u64 != manifest.part_len(index) {
            return Err(DdcError::InvalidPiece(format!(
                "part {} is {} bytes, expected {}",
                index,
                part.len(),
                manifest.part_len(index)
            )));
        }
        let actual = ContentHash::compute(part);
        if &actual != hash {
            return Err(DdcError::ContentIntegrity {
                expected: hash.to_hex(),
                actual: actual.to_hex(),
            });
        }
    }

    // sizes in the manifest are not covered by its CID; trust only the bytes
    let received: u64 = parts.iter().map(|p| p.len() as u64).sum();
    if received != manifest.total_size {
        return Err(DdcError::InvalidPiece(format!(
            "received {} bytes, manifest declares {}",
            received, manifest.total_size
        )));
    }

    let mut out = BytesMut::with_capacity(parts.iter().map(Bytes::len).sum());
    for part in parts {
        out.extend_from_slice(part);
    }
    Ok(out.freeze())
}

/// Named reference from a DAG node to other content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub cid: Cid,
    pub size: u64,
    pub name: String,
}

/// Directory-like content-addressed object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DagNode {
    pub data: Bytes,
    pub links: Vec<Link>,
    pub tags: Vec<Tag>,
}

impl DagNode {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn with_link(mut self, name: impl Into<String>, cid: Cid, size: u64) -> Self {
        self.links.push(Link {
            cid,
            size,
            name: name.into(),
        });
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn link(&self, name: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.name == name)
    }

    pub fn to_proto(&self) -> dag::DagNode {
        dag::DagNode {
            data: self.data.to_vec(),
            links: self
                .links
                .iter()
                .map(|l| dag::Link {
                    cid: l.cid.to_vec(),
                    size: l.size,
                    name: l.name.clone(),
                })
                .collect(),
            tags: self.tags.clone(),
        }
    }

    pub fn from_proto(node: dag::DagNode) -> Result<Self> {
        let links = node
            .links
            .into_iter()
            .map(|l| {
                Ok(Link {
                    cid: Cid::from_bytes(l.cid)?,
                    size: l.size,
                    name: l.name,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            data: Bytes::from(node.data),
            links,
            tags: node.tags,
        })
    }

    /// Protobuf encoding hashed into the CID
    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.to_proto().encode_to_vec()
    }

    pub fn cid(&self) -> Cid {
        Cid::from_data(Codec::DagNode, &self.canonical_bytes())
    }
}

/// Detached Ed25519 signature over a CNS binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSignature {
    pub signer: VerifyingKey,
    pub value: Signature,
}

/// Binding of a human-readable name to a CID within a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CnsRecord {
    pub cid: Cid,
    pub name: String,
    pub signature: Option<RecordSignature>,
}

impl CnsRecord {
    /// Create a record signed by `key`
    pub fn sign(cid: Cid, name: impl Into<String>, key: &SigningKey) -> Self {
        let name = name.into();
        let value = key.sign(&Self::signing_message(&name, &cid));
        Self {
            cid,
            name,
            signature: Some(RecordSignature {
                signer: key.verifying_key(),
                value,
            }),
        }
    }

    /// `u32be(len(name)) || name || cid`
    pub fn signing_message(name: &str, cid: &Cid) -> Vec<u8> {
        let mut msg = Vec::with_capacity(4 + name.len() + cid.as_bytes().len());
        msg.extend_from_slice(&(name.len() as u32).to_be_bytes());
        msg.extend_from_slice(name.as_bytes());
        msg.extend_from_slice(cid.as_bytes());
        msg
    }

    /// Check the signature covers exactly this `(name, cid)` pair.
    ///
    /// Whether the signer may bind names in the bucket is up to the node.
    pub fn verify(&self) -> Result<()> {
        let sig = self
            .signature
            .as_ref()
            .ok_or_else(|| DdcError::InvalidToken(format!("record {} is unsigned", self.name)))?;
        sig.signer
            .verify(&Self::signing_message(&self.name, &self.cid), &sig.value)
            .map_err(|e| DdcError::InvalidToken(format!("record {}: {}", self.name, e)))
    }

    pub fn to_proto(&self) -> cns::Record {
        cns::Record {
            cid: self.cid.to_vec(),
            name: self.name.clone(),
            signature: self.signature.as_ref().map(|s| auth::Signature {
                algorithm: auth::Algorithm::Ed25519 as i32,
                signer: s.signer.to_bytes().to_vec(),
                value: s.value.to_bytes().to_vec(),
            }),
        }
    }

    pub fn from_proto(record: cns::Record) -> Result<Self> {
        let signature = record
            .signature
            .map(|s| {
                let signer: [u8; 32] = s.signer.as_slice().try_into().map_err(|_| {
                    DdcError::InvalidKeyLength {
                        expected: 32,
                        actual: s.signer.len(),
                    }
                })?;
                let signer = VerifyingKey::from_bytes(&signer)
                    .map_err(|e| DdcError::InvalidToken(e.to_string()))?;
                let value = Signature::from_slice(&s.value)
                    .map_err(|e| DdcError::InvalidToken(e.to_string()))?;
                Ok::<_, DdcError>(RecordSignature { signer, value })
            })
            .transpose()?;
        Ok(Self {
            cid: Cid::from_bytes(record.cid)?,
            name: record.name,
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_piece_cid_ignores_tags() {
        let plain = Piece::new(&b"payload"[..]);
        let tagged = plain.clone().with_tag("kind", "test");
        assert_eq!(plain.cid(), tagged.cid());
        assert_eq!(tagged.tag("kind"), Some("test"));
    }

    #[test]
    fn test_split_and_reassemble() {
        let data: Vec<u8> = (0..300 * 1024).map(|i| (i % 251) as u8).collect();
        let piece = Piece::new(data.clone());

        let parts = piece.split(128 * 1024).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].size(), 44 * 1024);

        let manifest = MultipartPiece::from_parts(&parts, 128 * 1024);
        manifest.validate().unwrap();
        assert_eq!(manifest.total_size, data.len() as u64);

        let bodies: Vec<Bytes> = parts.iter().map(|p| p.data.clone()).collect();
        let joined = reassemble_parts(&manifest, &bodies).unwrap();
        assert_eq!(joined.as_ref(), data.as_slice());
    }

    #[test]
    fn test_empty_piece_is_one_part() {
        let parts = Piece::new(Bytes::new()).split(1024).unwrap();
        assert_eq!(parts.len(), 1);
        assert!(parts[0].data.is_empty());

        let manifest = MultipartPiece::from_parts(&parts, 1024);
        manifest.validate().unwrap();
    }

    #[test]
    fn test_zero_part_size_rejected() {
        assert!(Piece::new(&b"x"[..]).split(0).is_err());
    }

    #[test]
    fn test_reassemble_rejects_reordered_parts() {
        let piece = Piece::new(vec![1u8; 10].into_iter().chain(vec![2u8; 10]).collect::<Vec<_>>());
        let parts = piece.split(10).unwrap();
        let manifest = MultipartPiece::from_parts(&parts, 10);

        let swapped = vec![parts[1].data.clone(), parts[0].data.clone()];
        assert!(matches!(
            reassemble_parts(&manifest, &swapped),
            Err(DdcError::ContentIntegrity { .. })
        ));
    }

    #[test]
    fn test_reassemble_rejects_inflated_sizes() {
        let data: Vec<u8> = (0..300u32).map(|i| i as u8).collect();
        let parts = Piece::new(data).split(128).unwrap();
        let honest = MultipartPiece::from_parts(&parts, 128);

        // same part hashes, so the same CID, with sizes a node made up
        let inflated = MultipartPiece {
            part_hashes: honest.part_hashes.clone(),
            part_size: 1 << 62,
            total_size: (1 << 63) + 1,
        };
        inflated.validate().unwrap();
        assert_eq!(inflated.cid(), honest.cid());

        let bodies: Vec<Bytes> = parts.iter().map(|p| p.data.clone()).collect();
        assert!(matches!(
            reassemble_parts(&inflated, &bodies),
            Err(DdcError::InvalidPiece(_))
        ));
    }

    #[test]
    fn test_reassemble_rejects_total_beyond_parts() {
        let parts = Piece::new(vec![7u8; 20]).split(10).unwrap();
        let mut manifest = MultipartPiece::from_parts(&parts, 10);
        manifest.total_size = 19;

        let bodies: Vec<Bytes> = parts.iter().map(|p| p.data.clone()).collect();
        assert!(matches!(
            reassemble_parts(&manifest, &bodies),
            Err(DdcError::InvalidPiece(_))
        ));
    }

    #[test]
    fn test_manifest_validate_counts_parts() {
        let manifest = MultipartPiece {
            part_hashes: vec![ContentHash::compute(b"a")],
            part_size: 10,
            total_size: 25,
        };
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_multipart_cid_depends_on_order() {
        let a = ContentHash::compute(b"a");
        let b = ContentHash::compute(b"b");
        let ab = MultipartPiece {
            part_hashes: vec![a, b],
            part_size: 1,
            total_size: 2,
        };
        let ba = MultipartPiece {
            part_hashes: vec![b, a],
            ..ab.clone()
        };
        assert_ne!(ab.cid(), ba.cid());
        assert_eq!(ab.cid().codec(), Some(Codec::Multipart));
        assert_eq!(ab.part_cids()[0], Cid::new(Codec::Raw, &a));
    }

    #[test]
    fn test_dag_node_proto_roundtrip_keeps_cid() {
        let child = Cid::from_data(Codec::Raw, b"child");
        let node = DagNode::new(&b"dir"[..])
            .with_link("a.txt", child.clone(), 5)
            .with_tag("type", "dir");

        let decoded = DagNode::from_proto(node.to_proto()).unwrap();
        assert_eq!(decoded, node);
        assert_eq!(decoded.cid(), node.cid());
        assert_eq!(node.link("a.txt").map(|l| &l.cid), Some(&child));
    }

    #[test]
    fn test_cns_record_signature() {
        let key = SigningKey::generate(&mut OsRng);
        let cid = Cid::from_data(Codec::Raw, b"content");

        let record = CnsRecord::sign(cid.clone(), "home", &key);
        record.verify().unwrap();

        let decoded = CnsRecord::from_proto(record.to_proto()).unwrap();
        decoded.verify().unwrap();

        let mut renamed = record.clone();
        renamed.name = "other".to_string();
        assert!(renamed.verify().is_err());

        let mut repointed = record;
        repointed.cid = Cid::from_data(Codec::Raw, b"elsewhere");
        assert!(repointed.verify().is_err());
    }
}
