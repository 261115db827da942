//! Protocol client bound to one storage node
//!
//! Every call carries a token from the shared [`TokenIssuer`], scoped to the
//! bucket and to `PUT` or `GET`.

use crate::auth::{AuthToken, Operation, TokenIssuer};
use crate::config::StorageNodeConfig;
use crate::node::NodeDescriptor;
use crate::transport::{NodeTransport, RawPieceFrames};
use bytes::{Bytes, BytesMut};
use ddc_core::validator::validate_dag_node;
use ddc_core::{
    reassemble_parts, Cid, CnsRecord, ContentRef, ContentValidator, DagNode, DdcError,
    MultipartPiece, Piece, Result, MIN_PART_SIZE,
};
use ddc_protocol::{cns, dag, piece};
use futures::{stream, StreamExt};
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, info};

/// Options for [`StorageNode::store_piece`]
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Bind this name to the stored CID with a signed CNS record
    pub name: Option<String>,
    /// Overrides the configured part size
    pub part_size: Option<usize>,
}

/// Options for [`StorageNode::read_piece`]
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Byte range; ranged reads are not checked against the CID
    pub range: Option<Range<u64>>,
}

/// One piece read off the wire, hashed as it arrived
struct Fetched {
    header: piece::PieceResponseHeader,
    body: Bytes,
    validator: ContentValidator,
}

pub struct StorageNode {
    node: NodeDescriptor,
    transport: Arc<dyn NodeTransport>,
    issuer: Arc<TokenIssuer>,
    /// Token minted when the node was routed
    routed: Option<AuthToken>,
    config: StorageNodeConfig,
}

impl StorageNode {
    pub fn new(
        node: NodeDescriptor,
        transport: Arc<dyn NodeTransport>,
        issuer: Arc<TokenIssuer>,
        config: StorageNodeConfig,
    ) -> Self {
        Self {
            node,
            transport,
            issuer,
            routed: None,
            config,
        }
    }

    /// Use `token` for calls it is scoped to instead of minting a new one
    pub fn with_token(mut self, token: AuthToken) -> Self {
        self.routed = Some(token);
        self
    }

    pub fn routed_token(&self) -> Option<&AuthToken> {
        self.routed.as_ref()
    }

    pub fn descriptor(&self) -> &NodeDescriptor {
        &self.node
    }

    pub fn id(&self) -> &str {
        &self.node.id
    }

    fn token(&self, bucket_id: u64, operation: Operation) -> Result<AuthToken> {
        match &self.routed {
            Some(token) if token.is_scoped_to(operation, bucket_id) && !token.is_expired() => {
                Ok(token.clone())
            }
            _ => Ok(self.issuer.issue(bucket_id, operation)?),
        }
    }

    /// Store a piece, split into parts when it exceeds the part size
    pub async fn store_piece(
        &self,
        bucket_id: u64,
        piece: Piece,
        options: StoreOptions,
    ) -> Result<Cid> {
        let part_size = options.part_size.unwrap_or(self.config.part_size);
        if part_size < MIN_PART_SIZE {
            return Err(DdcError::Configuration(format!(
                "part size {part_size} is below the minimum of {MIN_PART_SIZE}"
            )));
        }

        let cid = if piece.size() > part_size {
            self.store_multipart(bucket_id, &piece, part_size).await?
        } else {
            self.put_raw(bucket_id, &piece, None).await?
        };

        if let Some(name) = options.name {
            let record = CnsRecord::sign(cid.clone(), name, self.issuer.signing_key());
            self.store_cns_record(bucket_id, &record).await?;
        }

        info!(
            node = %self.node.id,
            bucket_id,
            cid = %cid,
            size = piece.size(),
            "Stored piece"
        );
        Ok(cid)
    }

    async fn put_raw(&self, bucket_id: u64, piece: &Piece, offset: Option<u64>) -> Result<Cid> {
        let expected = piece.cid();
        let token = self.token(bucket_id, Operation::Put)?;

        let metadata = piece::RawPieceMetadata {
            bucket_id,
            size: piece.size() as u64,
            is_multipart_part: offset.is_some(),
            offset: offset.unwrap_or(0),
            tags: piece.tags.clone(),
        };
        let frames = raw_piece_frames(metadata, piece.data.clone(), self.config.frame_size);
        let response = self
            .transport
            .put_raw_piece(&self.node, &token, frames)
            .await?;

        check_returned(&expected, response.cid)?;
        Ok(expected)
    }

    async fn store_multipart(&self, bucket_id: u64, piece: &Piece, part_size: usize) -> Result<Cid> {
        let parts = piece.split(part_size)?;
        let manifest = MultipartPiece::from_parts(&parts, part_size as u64);
        debug!(
            node = %self.node.id,
            parts = parts.len(),
            part_size,
            "Uploading multipart piece"
        );

        for (index, part) in parts.iter().enumerate() {
            let offset = (index * part_size) as u64;
            self.put_raw(bucket_id, part, Some(offset)).await?;
        }

        let token = self.token(bucket_id, Operation::Put)?;
        let request = piece::PutMultipartPieceRequest {
            bucket_id,
            manifest: Some(manifest.to_proto()),
            tags: piece.tags.clone(),
        };
        let response = self
            .transport
            .put_multipart_piece(&self.node, &token, request)
            .await?;

        let expected = manifest.cid();
        check_returned(&expected, response.cid)?;
        Ok(expected)
    }

    /// Read a piece's bytes by CID or name
    pub async fn read_piece(
        &self,
        bucket_id: u64,
        target: ContentRef,
        options: ReadOptions,
    ) -> Result<Bytes> {
        Ok(self
            .read_piece_with_tags(bucket_id, target, options)
            .await?
            .data)
    }

    /// Read a piece together with the tags the node stored for it
    pub async fn read_piece_with_tags(
        &self,
        bucket_id: u64,
        target: ContentRef,
        options: ReadOptions,
    ) -> Result<Piece> {
        let cid = self.resolve(bucket_id, target).await?;
        let Fetched {
            header,
            body,
            validator,
        } = self.fetch(bucket_id, &cid, options.range.as_ref()).await?;

        if let Some(manifest) = &header.multipart {
            let data = self.read_multipart(bucket_id, &cid, manifest).await?;
            let data = match &options.range {
                Some(range) => slice_range(&data, range)?,
                None => data,
            };
            return Ok(Piece {
                data,
                tags: header.tags,
            });
        }

        if options.range.is_some() {
            debug!(cid = %cid, "Ranged read, skipping content validation");
        } else if header.proof.is_some() {
            debug!(cid = %cid, "Node supplied a proof, skipping content validation");
        } else {
            validator.finalize()?;
        }

        Ok(Piece {
            data: body,
            tags: header.tags,
        })
    }

    async fn read_multipart(
        &self,
        bucket_id: u64,
        cid: &Cid,
        manifest: &piece::MultipartManifest,
    ) -> Result<Bytes> {
        let manifest = MultipartPiece::from_proto(manifest)?;
        manifest.validate()?;

        let actual = manifest.cid();
        if &actual != cid {
            return Err(DdcError::ContentIntegrity {
                expected: cid.to_string(),
                actual: actual.to_string(),
            });
        }

        let mut parts = Vec::with_capacity(manifest.part_hashes.len());
        for part_cid in manifest.part_cids() {
            let fetched = self.fetch(bucket_id, &part_cid, None).await?;
            if fetched.header.multipart.is_some() {
                return Err(DdcError::InvalidPiece(format!(
                    "part {part_cid} is itself a multipart piece"
                )));
            }
            fetched.validator.finalize()?;
            parts.push(fetched.body);
        }

        debug!(cid = %cid, parts = parts.len(), "Reassembling multipart piece");
        reassemble_parts(&manifest, &parts)
    }

    async fn fetch(&self, bucket_id: u64, cid: &Cid, range: Option<&Range<u64>>) -> Result<Fetched> {
        let token = self.token(bucket_id, Operation::Get)?;
        let request = piece::GetPieceRequest {
            bucket_id,
            cid: cid.to_vec(),
            range: range.map(|r| piece::Range {
                start: r.start,
                end: r.end,
            }),
        };
        let mut frames = self.transport.get_piece(&self.node, &token, request).await?;

        let mut header = None;
        let mut body = BytesMut::new();
        let mut validator = ContentValidator::new(cid);
        while let Some(frame) = frames.next().await {
            let frame = frame?;
            if frame.header.is_some() {
                header = frame.header;
            }
            validator.update(&frame.body);
            body.extend_from_slice(&frame.body);
        }

        Ok(Fetched {
            header: header.unwrap_or_default(),
            body: body.freeze(),
            validator,
        })
    }

    pub async fn store_dag_node(&self, bucket_id: u64, node: &DagNode) -> Result<Cid> {
        let expected = node.cid();
        let token = self.token(bucket_id, Operation::Put)?;
        let request = dag::PutDagNodeRequest {
            bucket_id,
            node: Some(node.to_proto()),
        };
        let response = self
            .transport
            .put_dag_node(&self.node, &token, request)
            .await?;

        check_returned(&expected, response.cid)?;
        debug!(node = %self.node.id, cid = %expected, links = node.links.len(), "Stored DAG node");
        Ok(expected)
    }

    /// Read a DAG node, or the node reached by following `path` from it.
    ///
    /// Only the root node (empty path) can be checked against the CID.
    pub async fn read_dag_node(
        &self,
        bucket_id: u64,
        target: ContentRef,
        path: &str,
    ) -> Result<DagNode> {
        let cid = self.resolve(bucket_id, target).await?;
        let token = self.token(bucket_id, Operation::Get)?;
        let request = dag::GetDagNodeRequest {
            bucket_id,
            cid: cid.to_vec(),
            path: path.to_string(),
        };
        let response = self
            .transport
            .get_dag_node(&self.node, &token, request)
            .await?;

        let node = response
            .node
            .ok_or_else(|| DdcError::NotFound(format!("DAG node {cid}")))?;
        let node = DagNode::from_proto(node)?;
        if path.is_empty() {
            validate_dag_node(&cid, &node)?;
        }
        Ok(node)
    }

    pub async fn store_cns_record(&self, bucket_id: u64, record: &CnsRecord) -> Result<()> {
        let token = self.token(bucket_id, Operation::Put)?;
        let request = cns::PutRecordRequest {
            bucket_id,
            record: Some(record.to_proto()),
        };
        self.transport
            .put_cns_record(&self.node, &token, request)
            .await?;

        debug!(name = %record.name, cid = %record.cid, "Bound CNS name");
        Ok(())
    }

    /// Look up a name; signed records are verified before they are returned
    pub async fn get_cns_record(&self, bucket_id: u64, name: &str) -> Result<Option<CnsRecord>> {
        let token = self.token(bucket_id, Operation::Get)?;
        let request = cns::GetRecordRequest {
            bucket_id,
            name: name.to_string(),
        };
        let response = self
            .transport
            .get_cns_record(&self.node, &token, request)
            .await?;

        let Some(record) = response.record else {
            return Ok(None);
        };
        let record = CnsRecord::from_proto(record)?;
        if record.name != name {
            return Err(DdcError::NotFound(format!(
                "node answered `{}` for name `{name}`",
                record.name
            )));
        }
        if record.signature.is_some() {
            record.verify()?;
        }
        Ok(Some(record))
    }

    pub async fn resolve_name(&self, bucket_id: u64, name: &str) -> Result<Cid> {
        self.get_cns_record(bucket_id, name)
            .await?
            .map(|record| record.cid)
            .ok_or_else(|| {
                DdcError::NotFound(format!("no CNS record for `{name}` in bucket {bucket_id}"))
            })
    }

    async fn resolve(&self, bucket_id: u64, target: ContentRef) -> Result<Cid> {
        match target {
            ContentRef::Cid(cid) => Ok(cid),
            ContentRef::Name(name) => self.resolve_name(bucket_id, &name).await,
        }
    }
}

impl std::fmt::Debug for StorageNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageNode")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

/// Metadata frame followed by content frames of at most `frame_size` bytes
fn raw_piece_frames(
    metadata: piece::RawPieceMetadata,
    data: Bytes,
    frame_size: usize,
) -> RawPieceFrames {
    let frame_size = frame_size.max(1);
    let header = piece::PutRawPieceRequest {
        metadata: Some(metadata),
        content: Bytes::new(),
    };
    let len = data.len();
    let body = (0..len).step_by(frame_size).map(move |start| piece::PutRawPieceRequest {
        metadata: None,
        content: data.slice(start..(start + frame_size).min(len)),
    });
    stream::iter(std::iter::once(header).chain(body)).boxed()
}

fn check_returned(expected: &Cid, returned: Vec<u8>) -> Result<()> {
    let returned = Cid::from_bytes(returned)?;
    if &returned != expected {
        return Err(DdcError::ContentIntegrity {
            expected: expected.to_string(),
            actual: returned.to_string(),
        });
    }
    Ok(())
}

fn slice_range(data: &Bytes, range: &Range<u64>) -> Result<Bytes> {
    if range.start > range.end || range.end > data.len() as u64 {
        return Err(DdcError::InvalidPiece(format!(
            "range {}..{} outside {} bytes",
            range.start,
            range.end,
            data.len()
        )));
    }
    Ok(data.slice(range.start as usize..range.end as usize))
}
