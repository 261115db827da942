//! StorageNode against the in-memory cluster

mod common;

use common::*;
use ddc_client::auth::Operation;
use ddc_client::{
    AuthTokenBuilder, NodeMode, ReadOptions, StorageNode, StorageNodeConfig, StoreOptions,
    TokenIssuer,
};
use ddc_core::{Codec, ContentRef, DagNode, DdcError, Piece};
use std::sync::Arc;
use std::time::Duration;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

fn storage_node(cluster: Arc<MockCluster>, issuer: Arc<TokenIssuer>) -> StorageNode {
    StorageNode::new(
        node("node-0", NodeMode::Full),
        cluster,
        issuer,
        StorageNodeConfig {
            part_size: 128 * 1024,
            frame_size: 16 * 1024,
        },
    )
}

#[tokio::test]
async fn test_store_and_read_with_tags() {
    let cluster = MockCluster::new();
    let node = storage_node(cluster.clone(), issuer(1));

    let piece = Piece::new(payload(5000)).with_tag("content-type", "text/plain");
    let cid = node
        .store_piece(BUCKET, piece.clone(), StoreOptions::default())
        .await
        .unwrap();
    assert_eq!(cid, piece.cid());

    let read = node
        .read_piece_with_tags(BUCKET, cid.into(), ReadOptions::default())
        .await
        .unwrap();
    assert_eq!(read.data, piece.data);
    assert_eq!(read.tag("content-type"), Some("text/plain"));
    assert_eq!(cluster.raw_uploads(), 1);
}

#[tokio::test]
async fn test_flipped_bit_is_integrity_error() {
    let cluster = MockCluster::new();
    let node = storage_node(cluster.clone(), issuer(1));
    let data = payload(4096);
    let cid = node
        .store_piece(BUCKET, Piece::new(data.clone()), StoreOptions::default())
        .await
        .unwrap();

    cluster.corrupt_reads(true);
    let err = node
        .read_piece(BUCKET, cid.clone().into(), ReadOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DdcError::ContentIntegrity { .. }));
    assert!(!err.is_retryable());

    cluster.corrupt_reads(false);
    let read = node
        .read_piece(BUCKET, cid.into(), ReadOptions::default())
        .await
        .unwrap();
    assert_eq!(read.as_ref(), data.as_slice());
}

#[tokio::test]
async fn test_proof_and_range_skip_validation() {
    let cluster = MockCluster::new();
    let node = storage_node(cluster.clone(), issuer(1));
    let data = payload(4096);
    let cid = node
        .store_piece(BUCKET, Piece::new(data.clone()), StoreOptions::default())
        .await
        .unwrap();

    let ranged = node
        .read_piece(
            BUCKET,
            cid.clone().into(),
            ReadOptions {
                range: Some(100..200),
            },
        )
        .await
        .unwrap();
    assert_eq!(ranged.as_ref(), &data[100..200]);

    cluster.corrupt_reads(true);
    cluster.attach_proof(true);
    let read = node
        .read_piece(BUCKET, cid.into(), ReadOptions::default())
        .await
        .unwrap();
    assert_eq!(read.len(), data.len());
    assert_ne!(read.as_ref(), data.as_slice());
}

#[tokio::test]
async fn test_large_piece_goes_multipart() {
    let cluster = MockCluster::new();
    let node = storage_node(cluster.clone(), issuer(1));
    let data = payload(300 * 1024);

    let cid = node
        .store_piece(BUCKET, Piece::new(data.clone()), StoreOptions::default())
        .await
        .unwrap();
    assert_eq!(cid.codec(), Some(Codec::Multipart));
    assert_eq!(cluster.raw_uploads(), 3);

    let read = node
        .read_piece(BUCKET, cid.clone().into(), ReadOptions::default())
        .await
        .unwrap();
    assert_eq!(read.as_ref(), data.as_slice());

    // range across the first part boundary
    let start = 128 * 1024 - 10;
    let ranged = node
        .read_piece(
            BUCKET,
            cid.clone().into(),
            ReadOptions {
                range: Some(start as u64..(start + 20) as u64),
            },
        )
        .await
        .unwrap();
    assert_eq!(ranged.as_ref(), &data[start..start + 20]);

    cluster.corrupt_reads(true);
    let err = node
        .read_piece(BUCKET, cid.into(), ReadOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DdcError::ContentIntegrity { .. }));
}

#[tokio::test]
async fn test_part_size_below_minimum_rejected() {
    let node = storage_node(MockCluster::new(), issuer(1));
    let err = node
        .store_piece(
            BUCKET,
            Piece::new(payload(10)),
            StoreOptions {
                part_size: Some(16),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DdcError::Configuration(_)));
}

#[tokio::test]
async fn test_named_piece_resolves_through_cns() {
    let node = storage_node(MockCluster::new(), issuer(1));
    let data = payload(2048);

    let cid = node
        .store_piece(
            BUCKET,
            Piece::new(data.clone()),
            StoreOptions {
                name: Some("reports/q3".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(node.resolve_name(BUCKET, "reports/q3").await.unwrap(), cid);
    let record = node
        .get_cns_record(BUCKET, "reports/q3")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        record.signature.unwrap().signer,
        signing_key(1).verifying_key()
    );

    let read = node
        .read_piece(BUCKET, ContentRef::parse("reports/q3"), ReadOptions::default())
        .await
        .unwrap();
    assert_eq!(read.as_ref(), data.as_slice());

    let err = node.resolve_name(BUCKET, "missing").await.unwrap_err();
    assert!(matches!(err, DdcError::NotFound(_)));
}

#[tokio::test]
async fn test_dag_nodes_and_paths() {
    let node = storage_node(MockCluster::new(), issuer(1));

    let piece_cid = node
        .store_piece(BUCKET, Piece::new(payload(100)), StoreOptions::default())
        .await
        .unwrap();
    let child = DagNode::new(&b"child"[..]).with_link("data", piece_cid, 100);
    let child_cid = node.store_dag_node(BUCKET, &child).await.unwrap();
    let root = DagNode::new(&b"root"[..])
        .with_link("child", child_cid.clone(), 5)
        .with_tag("kind", "dir");
    let root_cid = node.store_dag_node(BUCKET, &root).await.unwrap();
    assert_eq!(root_cid.codec(), Some(Codec::DagNode));

    let read = node
        .read_dag_node(BUCKET, root_cid.clone().into(), "")
        .await
        .unwrap();
    assert_eq!(read, root);

    let followed = node
        .read_dag_node(BUCKET, root_cid.into(), "child")
        .await
        .unwrap();
    assert_eq!(followed.cid(), child_cid);
}

#[tokio::test]
async fn test_node_rejects_tokens_not_rooted_at_owner() {
    let cluster = MockCluster::new();
    cluster.set_owner(signing_key(9).verifying_key());
    let node = storage_node(cluster.clone(), issuer(1));

    let err = node
        .store_piece(BUCKET, Piece::new(payload(10)), StoreOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DdcError::CapabilityDenied(_)));
}

#[tokio::test]
async fn test_read_only_grant_cannot_store() {
    let owner = signing_key(9);
    let grantee = signing_key(10);
    let grant = AuthTokenBuilder::new(&owner)
        .operation(Operation::Get)
        .bucket(BUCKET)
        .subject(grantee.verifying_key())
        .can_delegate(true)
        .ttl(Duration::from_secs(3600))
        .build()
        .unwrap();

    let cluster = MockCluster::new();
    cluster.set_owner(owner.verifying_key());
    let issuer = Arc::new(TokenIssuer::new(grantee, Duration::from_secs(60)).with_base(grant));
    let node = storage_node(cluster.clone(), issuer);

    let err = node
        .store_piece(BUCKET, Piece::new(payload(10)), StoreOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DdcError::InvalidToken(_)));
    assert!(cluster.calls().is_empty());

    // reads are within the grant and pass the node's checks
    let err = node
        .read_piece(
            BUCKET,
            Piece::new(payload(10)).cid().into(),
            ReadOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DdcError::NotFound(_)));
}
