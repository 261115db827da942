//! Shared fixtures for ddc-client integration tests
//!
//! `MockCluster` stands in for a whole cluster behind a [`NodeTransport`]: all
//! nodes share one content store and check tokens the way a node would.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use ddc_client::auth::Operation;
use ddc_client::{
    AuthToken, ClientConfig, NodeDescriptor, NodeMode, NodeProber, NodeTransport, PieceStream,
    ProbeTable, Probing, RawPieceFrames, Router, TokenIssuer,
};
use ddc_core::{CnsRecord, DagNode, DdcError, MultipartPiece, Piece, Result, Tag};
use ddc_protocol::{cns, dag, piece};
use ed25519_dalek::{SigningKey, VerifyingKey};
use futures::{stream, StreamExt};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const BUCKET: u64 = 42;

enum Stored {
    Raw { data: Bytes, tags: Vec<Tag> },
    Multipart { manifest: piece::MultipartManifest, tags: Vec<Tag> },
}

#[derive(Default)]
struct Content {
    pieces: HashMap<Vec<u8>, Stored>,
    dag_nodes: HashMap<Vec<u8>, dag::DagNode>,
    names: HashMap<(u64, String), cns::Record>,
}

/// In-memory cluster transport
#[derive(Default)]
pub struct MockCluster {
    content: Mutex<Content>,
    down: Mutex<HashSet<String>>,
    calls: Mutex<Vec<(String, &'static str)>>,
    tokens: Mutex<Vec<AuthToken>>,
    owner: Mutex<Option<VerifyingKey>>,
    corrupt_reads: AtomicBool,
    attach_proof: AtomicBool,
    raw_uploads: AtomicUsize,
}

impl MockCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Calls to this node fail with a transport error
    pub fn take_down(&self, node_id: &str) {
        self.down.lock().insert(node_id.to_string());
    }

    /// Only accept token chains rooted at this key
    pub fn set_owner(&self, owner: VerifyingKey) {
        *self.owner.lock() = Some(owner);
    }

    /// Flip one bit in the first body byte of every raw read
    pub fn corrupt_reads(&self, on: bool) {
        self.corrupt_reads.store(on, Ordering::SeqCst);
    }

    pub fn attach_proof(&self, on: bool) {
        self.attach_proof.store(on, Ordering::SeqCst);
    }

    pub fn raw_uploads(&self) -> usize {
        self.raw_uploads.load(Ordering::SeqCst)
    }

    /// Node ids and methods of every call attempted, in order
    pub fn calls(&self) -> Vec<(String, &'static str)> {
        self.calls.lock().clone()
    }

    /// Tokens presented by calls that reached a live node, in order
    pub fn tokens(&self) -> Vec<AuthToken> {
        self.tokens.lock().clone()
    }

    pub fn called_nodes(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(id, _)| id.clone()).collect()
    }

    fn authorize(
        &self,
        node: &NodeDescriptor,
        method: &'static str,
        token: &AuthToken,
        operation: Operation,
        bucket_id: u64,
    ) -> Result<()> {
        self.calls.lock().push((node.id.clone(), method));
        if self.down.lock().contains(&node.id) {
            return Err(DdcError::Transport(format!("{} is unreachable", node.id)));
        }

        // what the node sees is the header form
        let token = AuthToken::from_base58(&token.to_base58())
            .map_err(|e| DdcError::CapabilityDenied(e.to_string()))?;
        self.tokens.lock().push(token.clone());
        token
            .verify()
            .map_err(|e| DdcError::CapabilityDenied(e.to_string()))?;
        if let Some(owner) = *self.owner.lock() {
            if token.root_signer() != &owner {
                return Err(DdcError::CapabilityDenied("not granted by owner".into()));
            }
        }
        if !token.allows(operation, bucket_id, None) {
            return Err(DdcError::CapabilityDenied(format!(
                "token does not allow {} on bucket {bucket_id}",
                operation.as_str()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl NodeTransport for MockCluster {
    async fn put_raw_piece(
        &self,
        node: &NodeDescriptor,
        token: &AuthToken,
        mut frames: RawPieceFrames,
    ) -> Result<piece::PutRawPieceResponse> {
        let first = frames
            .next()
            .await
            .ok_or_else(|| DdcError::InvalidPiece("empty upload".into()))?;
        let metadata = first
            .metadata
            .ok_or_else(|| DdcError::InvalidPiece("first frame lacks metadata".into()))?;
        self.authorize(node, "put_raw_piece", token, Operation::Put, metadata.bucket_id)?;

        let mut data = BytesMut::from(&first.content[..]);
        while let Some(frame) = frames.next().await {
            data.extend_from_slice(&frame.content);
        }
        if data.len() as u64 != metadata.size {
            return Err(DdcError::InvalidPiece("size mismatch".into()));
        }

        let cid = Piece::new(data.clone().freeze()).cid();
        self.raw_uploads.fetch_add(1, Ordering::SeqCst);
        self.content.lock().pieces.insert(
            cid.to_vec(),
            Stored::Raw {
                data: data.freeze(),
                tags: metadata.tags,
            },
        );
        Ok(piece::PutRawPieceResponse { cid: cid.into_bytes() })
    }

    async fn put_multipart_piece(
        &self,
        node: &NodeDescriptor,
        token: &AuthToken,
        request: piece::PutMultipartPieceRequest,
    ) -> Result<piece::PutMultipartPieceResponse> {
        self.authorize(node, "put_multipart_piece", token, Operation::Put, request.bucket_id)?;
        let proto = request
            .manifest
            .ok_or_else(|| DdcError::InvalidPiece("missing manifest".into()))?;
        let manifest = MultipartPiece::from_proto(&proto)?;
        manifest.validate()?;

        let mut content = self.content.lock();
        for part in manifest.part_cids() {
            if !content.pieces.contains_key(part.as_bytes()) {
                return Err(DdcError::NotFound(format!("part {part}")));
            }
        }
        let cid = manifest.cid();
        content.pieces.insert(
            cid.to_vec(),
            Stored::Multipart {
                manifest: proto,
                tags: request.tags,
            },
        );
        Ok(piece::PutMultipartPieceResponse { cid: cid.into_bytes() })
    }

    async fn get_piece(
        &self,
        node: &NodeDescriptor,
        token: &AuthToken,
        request: piece::GetPieceRequest,
    ) -> Result<PieceStream> {
        self.authorize(node, "get_piece", token, Operation::Get, request.bucket_id)?;
        let proof = self
            .attach_proof
            .load(Ordering::SeqCst)
            .then(|| vec![0xAA; 8]);

        let content = self.content.lock();
        let stored = content
            .pieces
            .get(&request.cid)
            .ok_or_else(|| DdcError::NotFound("piece".into()))?;

        let frames = match stored {
            Stored::Multipart { manifest, tags } => vec![piece::GetPieceResponse {
                header: Some(piece::PieceResponseHeader {
                    proof,
                    multipart: Some(manifest.clone()),
                    tags: tags.clone(),
                }),
                body: Bytes::new(),
            }],
            Stored::Raw { data, tags } => {
                let mut body = match request.range {
                    Some(range) => data.slice(range.start as usize..range.end as usize),
                    None => data.clone(),
                };
                if self.corrupt_reads.load(Ordering::SeqCst) && !body.is_empty() {
                    let mut flipped = body.to_vec();
                    flipped[0] ^= 0x01;
                    body = Bytes::from(flipped);
                }

                let mut frames = vec![piece::GetPieceResponse {
                    header: Some(piece::PieceResponseHeader {
                        proof,
                        multipart: None,
                        tags: tags.clone(),
                    }),
                    body: Bytes::new(),
                }];
                frames.extend(body.chunks(1000).map(|chunk| piece::GetPieceResponse {
                    header: None,
                    body: Bytes::copy_from_slice(chunk),
                }));
                frames
            }
        };
        Ok(stream::iter(frames.into_iter().map(Ok)).boxed())
    }

    async fn put_dag_node(
        &self,
        node: &NodeDescriptor,
        token: &AuthToken,
        request: dag::PutDagNodeRequest,
    ) -> Result<dag::PutDagNodeResponse> {
        self.authorize(node, "put_dag_node", token, Operation::Put, request.bucket_id)?;
        let proto = request
            .node
            .ok_or_else(|| DdcError::InvalidPiece("missing node".into()))?;
        let cid = DagNode::from_proto(proto.clone())?.cid();
        self.content.lock().dag_nodes.insert(cid.to_vec(), proto);
        Ok(dag::PutDagNodeResponse { cid: cid.into_bytes() })
    }

    async fn get_dag_node(
        &self,
        node: &NodeDescriptor,
        token: &AuthToken,
        request: dag::GetDagNodeRequest,
    ) -> Result<dag::GetDagNodeResponse> {
        self.authorize(node, "get_dag_node", token, Operation::Get, request.bucket_id)?;
        let content = self.content.lock();

        let mut current = content.dag_nodes.get(&request.cid).cloned();
        for segment in request.path.split('/').filter(|s| !s.is_empty()) {
            current = current
                .and_then(|n| n.links.into_iter().find(|l| l.name == segment))
                .and_then(|link| content.dag_nodes.get(&link.cid).cloned());
        }
        Ok(dag::GetDagNodeResponse { node: current })
    }

    async fn put_cns_record(
        &self,
        node: &NodeDescriptor,
        token: &AuthToken,
        request: cns::PutRecordRequest,
    ) -> Result<cns::PutRecordResponse> {
        self.authorize(node, "put_cns_record", token, Operation::Put, request.bucket_id)?;
        let proto = request
            .record
            .ok_or_else(|| DdcError::InvalidPiece("missing record".into()))?;
        CnsRecord::from_proto(proto.clone())?
            .verify()
            .map_err(|e| DdcError::CapabilityDenied(e.to_string()))?;
        self.content
            .lock()
            .names
            .insert((request.bucket_id, proto.name.clone()), proto);
        Ok(cns::PutRecordResponse {})
    }

    async fn get_cns_record(
        &self,
        node: &NodeDescriptor,
        token: &AuthToken,
        request: cns::GetRecordRequest,
    ) -> Result<cns::GetRecordResponse> {
        self.authorize(node, "get_cns_record", token, Operation::Get, request.bucket_id)?;
        let record = self
            .content
            .lock()
            .names
            .get(&(request.bucket_id, request.name))
            .cloned();
        Ok(cns::GetRecordResponse { record })
    }
}

/// Probe outcome per node id: `Some(latency)` answers, `None` fails.
/// Unknown nodes answer after 10ms.
#[derive(Default)]
pub struct ScriptedProber {
    script: HashMap<String, Option<u64>>,
    probes: AtomicUsize,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latency(mut self, node_id: &str, ms: u64) -> Self {
        self.script.insert(node_id.to_string(), Some(ms));
        self
    }

    pub fn failing(mut self, node_id: &str) -> Self {
        self.script.insert(node_id.to_string(), None);
        self
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeProber for ScriptedProber {
    async fn probe(&self, node: &NodeDescriptor) -> Result<()> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        match self.script.get(&node.id).copied().unwrap_or(Some(10)) {
            Some(ms) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(())
            }
            None => Err(DdcError::Transport(format!("{} refused", node.id))),
        }
    }
}

pub fn node(id: &str, mode: NodeMode) -> NodeDescriptor {
    NodeDescriptor::new(
        id,
        format!("{id}.test:9090"),
        format!("http://{id}.test:8080"),
        mode,
    )
}

/// `count` full nodes named `node-0`, `node-1`, ...
pub fn full_nodes(count: usize) -> Vec<NodeDescriptor> {
    (0..count)
        .map(|i| node(&format!("node-{i}"), NodeMode::Full))
        .collect()
}

pub fn signing_key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

pub fn issuer(seed: u8) -> Arc<TokenIssuer> {
    Arc::new(TokenIssuer::new(signing_key(seed), Duration::from_secs(60)))
}

pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.storage.part_size = 128 * 1024;
    config.storage.frame_size = 16 * 1024;
    config
}

pub fn probing(prober: ScriptedProber) -> Probing {
    Probing::new(Arc::new(prober), Arc::new(ProbeTable::new(None)))
}

pub fn static_router(
    nodes: Vec<NodeDescriptor>,
    cluster: Arc<MockCluster>,
    issuer: Arc<TokenIssuer>,
    prober: ScriptedProber,
) -> Router {
    Router::with_static_nodes(nodes, probing(prober), cluster, issuer, &test_config())
}
