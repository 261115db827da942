//! High-level client
//!
//! Adds content encryption and key sharing on top of the [`Router`], and
//! re-routes reachability failures to other nodes. Integrity, capability and
//! key errors are returned as they are.

use crate::auth::TokenIssuer;
use crate::config::ClientConfig;
use crate::node::NodeDescriptor;
use crate::router::{Router, RouterOperation};
use crate::routing::Probing;
use crate::storage_node::{ReadOptions, StorageNode, StoreOptions};
use crate::transport::GrpcTransport;
use bytes::Bytes;
use ddc_core::{
    decrypt, encrypt, BoxKeypair, BoxPublicKey, Cid, CnsRecord, ContentRef, DagNode, DdcError,
    DekPath, EncryptionKey, MasterKey, Piece, Result, SealedKey,
};
use ed25519_dalek::SigningKey;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// A piece to store, with optional encryption under a key path
#[derive(Debug, Clone)]
pub struct StoreRequest {
    pub bucket_id: u64,
    pub piece: Piece,
    pub options: StoreOptions,
    /// Encrypt under the key derived for this path
    pub encrypt: Option<DekPath>,
}

impl StoreRequest {
    pub fn new(bucket_id: u64, piece: Piece) -> Self {
        Self {
            bucket_id,
            piece,
            options: StoreOptions::default(),
            encrypt: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.options.name = Some(name.into());
        self
    }

    pub fn part_size(mut self, part_size: usize) -> Self {
        self.options.part_size = Some(part_size);
        self
    }

    pub fn encrypt(mut self, path: DekPath) -> Self {
        self.encrypt = Some(path);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOutcome {
    pub cid: Cid,
    /// Side piece holding the DEK sealed to our own box key
    pub sealed_key: Option<Cid>,
}

/// How to recover the DEK of an encrypted piece
#[derive(Debug, Clone)]
pub enum Decryption {
    /// Owner: derive from the master key
    Derive(DekPath),
    /// Grantee: open a shared sealed key, then optionally descend below it
    Shared {
        sealed_key: Cid,
        sub_path: Option<DekPath>,
    },
}

pub struct DdcClient {
    router: Router,
    master: Option<MasterKey>,
    box_keys: Option<BoxKeypair>,
    max_attempts: u32,
}

impl DdcClient {
    pub fn new(router: Router, max_attempts: u32) -> Self {
        Self {
            router,
            master: None,
            box_keys: None,
            max_attempts: max_attempts.max(1),
        }
    }

    /// gRPC client over a fixed node list, probing nodes over HTTP
    pub fn connect(
        nodes: Vec<NodeDescriptor>,
        signer: SigningKey,
        config: &ClientConfig,
    ) -> Result<Self> {
        let transport = Arc::new(GrpcTransport::new(config.grpc.clone()));
        let issuer = Arc::new(TokenIssuer::new(signer, config.router.token_ttl));
        let router = Router::with_static_nodes(
            nodes,
            Probing::http(&config.ping)?,
            transport,
            issuer,
            config,
        );
        Ok(Self::new(router, config.max_attempts))
    }

    pub fn with_master_key(mut self, master: MasterKey) -> Self {
        self.master = Some(master);
        self
    }

    pub fn with_box_keypair(mut self, box_keys: BoxKeypair) -> Self {
        self.box_keys = Some(box_keys);
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn box_public_key(&self) -> Option<BoxPublicKey> {
        self.box_keys.as_ref().map(BoxKeypair::public)
    }

    fn master(&self) -> Result<&MasterKey> {
        self.master
            .as_ref()
            .ok_or_else(|| DdcError::Configuration("no master key configured".to_string()))
    }

    fn box_keys(&self) -> Result<&BoxKeypair> {
        self.box_keys
            .as_ref()
            .ok_or_else(|| DdcError::Configuration("no box keypair configured".to_string()))
    }

    /// Route `call` to a node, excluding each node that failed retryably
    async fn with_retry<T, F, Fut>(
        &self,
        operation: RouterOperation,
        bucket_id: u64,
        mut call: F,
    ) -> Result<T>
    where
        F: FnMut(StorageNode) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut excluded: Vec<String> = Vec::new();
        loop {
            let node = self
                .router
                .get_node(operation, bucket_id, &excluded)
                .await?;
            let node_id = node.id().to_string();

            match call(node).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && (excluded.len() as u32 + 1) < self.max_attempts => {
                    warn!(
                        node = %node_id,
                        operation = %operation,
                        attempt = excluded.len() + 1,
                        error = %e,
                        "Node call failed, re-routing"
                    );
                    excluded.push(node_id);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn put_piece(&self, bucket_id: u64, piece: Piece, options: StoreOptions) -> Result<Cid> {
        self.with_retry(RouterOperation::StorePiece, bucket_id, |node| {
            let piece = piece.clone();
            let options = options.clone();
            async move { node.store_piece(bucket_id, piece, options).await }
        })
        .await
    }

    async fn get_piece(
        &self,
        bucket_id: u64,
        target: ContentRef,
        options: ReadOptions,
    ) -> Result<Piece> {
        self.with_retry(RouterOperation::ReadPiece, bucket_id, |node| {
            let target = target.clone();
            let options = options.clone();
            async move { node.read_piece_with_tags(bucket_id, target, options).await }
        })
        .await
    }

    /// Store a piece, encrypting it first when the request names a key path.
    ///
    /// The DEK sealed to our own box key is stored before the content.
    pub async fn store(&self, request: StoreRequest) -> Result<StoreOutcome> {
        let StoreRequest {
            bucket_id,
            mut piece,
            options,
            encrypt: path,
        } = request;

        let sealed_key = match &path {
            Some(path) => {
                let dek = self.master()?.derive(path);
                let box_keys = self.box_keys()?;
                let sealed = SealedKey::seal(&dek, path, box_keys, &box_keys.public())?;
                let sealed_cid = self
                    .put_piece(bucket_id, sealed.to_piece(), StoreOptions::default())
                    .await?;

                piece.data = Bytes::from(encrypt(&piece.data, &dek)?);
                Some(sealed_cid)
            }
            None => None,
        };

        let cid = self.put_piece(bucket_id, piece, options).await?;
        info!(
            bucket_id,
            cid = %cid,
            encrypted = sealed_key.is_some(),
            "Stored content"
        );
        Ok(StoreOutcome { cid, sealed_key })
    }

    /// Read a piece by CID or name, decrypting it when asked
    pub async fn read(
        &self,
        bucket_id: u64,
        target: ContentRef,
        options: ReadOptions,
        decryption: Option<Decryption>,
    ) -> Result<Bytes> {
        if decryption.is_some() && options.range.is_some() {
            return Err(DdcError::Configuration(
                "ranged reads cannot be decrypted".to_string(),
            ));
        }

        let data = self.get_piece(bucket_id, target, options).await?.data;
        match decryption {
            None => Ok(data),
            Some(decryption) => {
                let dek = self.recover_key(bucket_id, decryption).await?;
                Ok(Bytes::from(decrypt(&data, &dek)?))
            }
        }
    }

    async fn recover_key(&self, bucket_id: u64, decryption: Decryption) -> Result<EncryptionKey> {
        match decryption {
            Decryption::Derive(path) => Ok(self.master()?.derive(&path)),
            Decryption::Shared {
                sealed_key,
                sub_path,
            } => {
                let side = self
                    .get_piece(bucket_id, sealed_key.into(), ReadOptions::default())
                    .await?;
                let dek = SealedKey::from_piece(&side)?.open(self.box_keys()?)?;
                Ok(match sub_path {
                    Some(sub) => dek.derive_child(&sub),
                    None => dek,
                })
            }
        }
    }

    /// Grant `recipient` the key for `path` and everything below it.
    ///
    /// Returns the CID of the side piece holding the sealed key.
    pub async fn share(
        &self,
        bucket_id: u64,
        path: &DekPath,
        recipient: &BoxPublicKey,
    ) -> Result<Cid> {
        let dek = self.master()?.derive(path);
        let sealed = SealedKey::seal(&dek, path, self.box_keys()?, recipient)?;
        let cid = self
            .put_piece(bucket_id, sealed.to_piece(), StoreOptions::default())
            .await?;
        info!(bucket_id, path = %path, recipient = %recipient.to_hex(), "Shared key");
        Ok(cid)
    }

    pub async fn store_dag_node(&self, bucket_id: u64, node: &DagNode) -> Result<Cid> {
        self.with_retry(RouterOperation::StoreDagNode, bucket_id, |storage| async move {
            storage.store_dag_node(bucket_id, node).await
        })
        .await
    }

    pub async fn read_dag_node(
        &self,
        bucket_id: u64,
        target: ContentRef,
        path: &str,
    ) -> Result<DagNode> {
        self.with_retry(RouterOperation::ReadDagNode, bucket_id, |storage| {
            let target = target.clone();
            async move { storage.read_dag_node(bucket_id, target, path).await }
        })
        .await
    }

    pub async fn resolve_name(&self, bucket_id: u64, name: &str) -> Result<Cid> {
        self.with_retry(RouterOperation::ReadCnsRecord, bucket_id, |storage| async move {
            storage.resolve_name(bucket_id, name).await
        })
        .await
    }

    /// Bind `name` to `cid`, signed with our identity key
    pub async fn store_cns_record(&self, bucket_id: u64, cid: Cid, name: &str) -> Result<()> {
        let record = CnsRecord::sign(cid, name, self.router.issuer().signing_key());
        self.with_retry(RouterOperation::StoreCnsRecord, bucket_id, |storage| {
            let record = &record;
            async move { storage.store_cns_record(bucket_id, record).await }
        })
        .await
    }
}
