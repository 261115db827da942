//! DdcClient flows over the in-memory cluster

mod common;

use common::*;
use ddc_client::{
    Decryption, DdcClient, NodeDescriptor, ReadOptions, RouterOperation, StoreRequest,
};
use ddc_core::{BoxKeypair, ContentRef, DagNode, DdcError, DekPath, MasterKey, Piece};
use std::sync::Arc;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

fn client(cluster: Arc<MockCluster>, nodes: Vec<NodeDescriptor>, seed: u8) -> DdcClient {
    DdcClient::new(
        static_router(nodes, cluster, issuer(seed), ScriptedProber::new()),
        3,
    )
}

fn path(s: &str) -> DekPath {
    DekPath::parse(s).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_300kb_round_trip_in_three_parts() {
    let cluster = MockCluster::new();
    let client = client(cluster.clone(), full_nodes(3), 1);
    let data = payload(300 * 1024);

    let outcome = client
        .store(StoreRequest::new(BUCKET, Piece::new(data.clone())).part_size(128 * 1024))
        .await
        .unwrap();
    assert_eq!(cluster.raw_uploads(), 3);
    assert!(outcome.sealed_key.is_none());

    let read = client
        .read(BUCKET, outcome.cid.into(), ReadOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(read.as_ref(), data.as_slice());
}

#[tokio::test(start_paused = true)]
async fn test_encrypted_store_and_owner_read() {
    let cluster = MockCluster::new();
    let owner = client(cluster.clone(), full_nodes(2), 1)
        .with_master_key(MasterKey::new(vec![5u8; 32]).unwrap())
        .with_box_keypair(BoxKeypair::from_seed([6u8; 32]));
    let data = payload(10_000);

    let outcome = owner
        .store(
            StoreRequest::new(BUCKET, Piece::new(data.clone()))
                .name("photos/cat.jpg")
                .encrypt(path("photos/2024")),
        )
        .await
        .unwrap();
    assert!(outcome.sealed_key.is_some());

    let ciphertext = owner
        .read(BUCKET, outcome.cid.clone().into(), ReadOptions::default(), None)
        .await
        .unwrap();
    assert_ne!(ciphertext.as_ref(), data.as_slice());

    let plain = owner
        .read(
            BUCKET,
            ContentRef::parse("photos/cat.jpg"),
            ReadOptions::default(),
            Some(Decryption::Derive(path("photos/2024"))),
        )
        .await
        .unwrap();
    assert_eq!(plain.as_ref(), data.as_slice());

    // the self-sealed side piece opens to the same key
    let own = owner
        .read(
            BUCKET,
            outcome.cid.into(),
            ReadOptions::default(),
            Some(Decryption::Shared {
                sealed_key: outcome.sealed_key.unwrap(),
                sub_path: None,
            }),
        )
        .await
        .unwrap();
    assert_eq!(own.as_ref(), data.as_slice());
}

#[tokio::test(start_paused = true)]
async fn test_shared_path_reaches_descendants_not_siblings() {
    let cluster = MockCluster::new();
    let owner = client(cluster.clone(), full_nodes(2), 1)
        .with_master_key(MasterKey::new(b"owner master secret".to_vec()).unwrap())
        .with_box_keypair(BoxKeypair::from_seed([6u8; 32]));
    let grantee_keys = BoxKeypair::from_seed([7u8; 32]);
    let grantee_public = grantee_keys.public();
    let grantee = client(cluster.clone(), full_nodes(2), 2).with_box_keypair(grantee_keys);

    let photo = payload(3000);
    let doc = payload(2000);
    let photo_cid = owner
        .store(StoreRequest::new(BUCKET, Piece::new(photo.clone())).encrypt(path("photos/2024")))
        .await
        .unwrap()
        .cid;
    let doc_cid = owner
        .store(StoreRequest::new(BUCKET, Piece::new(doc)).encrypt(path("docs/2024")))
        .await
        .unwrap()
        .cid;

    let sealed = owner.share(BUCKET, &path("photos"), &grantee_public).await.unwrap();

    let read = grantee
        .read(
            BUCKET,
            photo_cid.into(),
            ReadOptions::default(),
            Some(Decryption::Shared {
                sealed_key: sealed.clone(),
                sub_path: Some(path("2024")),
            }),
        )
        .await
        .unwrap();
    assert_eq!(read.as_ref(), photo.as_slice());

    let err = grantee
        .read(
            BUCKET,
            doc_cid.into(),
            ReadOptions::default(),
            Some(Decryption::Shared {
                sealed_key: sealed,
                sub_path: Some(path("2024")),
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DdcError::Decryption(_)));
}

#[tokio::test(start_paused = true)]
async fn test_sealed_key_for_someone_else_does_not_open() {
    let cluster = MockCluster::new();
    let owner = client(cluster.clone(), full_nodes(1), 1)
        .with_master_key(MasterKey::new(vec![1u8; 16]).unwrap())
        .with_box_keypair(BoxKeypair::from_seed([6u8; 32]));
    let outsider = client(cluster.clone(), full_nodes(1), 3)
        .with_box_keypair(BoxKeypair::from_seed([8u8; 32]));

    let sealed = owner
        .share(BUCKET, &path("photos"), &BoxKeypair::from_seed([7u8; 32]).public())
        .await
        .unwrap();
    let stored = owner
        .store(StoreRequest::new(BUCKET, Piece::new(payload(50))).encrypt(path("photos")))
        .await
        .unwrap();

    let err = outsider
        .read(
            BUCKET,
            stored.cid.into(),
            ReadOptions::default(),
            Some(Decryption::Shared {
                sealed_key: sealed,
                sub_path: None,
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DdcError::Decryption(_)));
}

#[tokio::test(start_paused = true)]
async fn test_encryption_needs_keys() {
    let client = client(MockCluster::new(), full_nodes(1), 1);
    let err = client
        .store(StoreRequest::new(BUCKET, Piece::new(payload(10))).encrypt(path("a")))
        .await
        .unwrap_err();
    assert!(matches!(err, DdcError::Configuration(_)));

    let err = client
        .read(
            BUCKET,
            Piece::new(payload(10)).cid().into(),
            ReadOptions { range: Some(0..5) },
            Some(Decryption::Derive(path("a"))),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DdcError::Configuration(_)));
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_nodes_are_excluded_on_retry() {
    let cluster = MockCluster::new();
    cluster.take_down("node-0");
    cluster.take_down("node-1");
    let client = client(cluster.clone(), full_nodes(3), 1);

    let data = payload(1000);
    let outcome = client
        .store(StoreRequest::new(BUCKET, Piece::new(data.clone())))
        .await
        .unwrap();

    let calls = cluster.called_nodes();
    assert_eq!(calls.last().map(String::as_str), Some("node-2"));
    let mut attempted = calls.clone();
    attempted.dedup();
    assert_eq!(attempted.len(), calls.len(), "a failed node was retried");

    let read = client
        .read(BUCKET, outcome.cid.into(), ReadOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(read.as_ref(), data.as_slice());
}

#[tokio::test(start_paused = true)]
async fn test_attempts_are_bounded() {
    let cluster = MockCluster::new();
    for node in full_nodes(4) {
        cluster.take_down(&node.id);
    }
    let client = DdcClient::new(
        static_router(full_nodes(4), cluster.clone(), issuer(1), ScriptedProber::new()),
        2,
    );

    let err = client
        .store(StoreRequest::new(BUCKET, Piece::new(payload(10))))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(cluster.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_integrity_failure_is_not_retried() {
    let cluster = MockCluster::new();
    let client = client(cluster.clone(), full_nodes(3), 1);
    let cid = client
        .store(StoreRequest::new(BUCKET, Piece::new(payload(1000))))
        .await
        .unwrap()
        .cid;

    cluster.corrupt_reads(true);
    let before = cluster.calls().len();
    let err = client
        .read(BUCKET, cid.into(), ReadOptions::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, DdcError::ContentIntegrity { .. }));
    assert_eq!(cluster.calls().len(), before + 1);
}

#[tokio::test(start_paused = true)]
async fn test_dag_and_names_through_client() {
    let cluster = MockCluster::new();
    let client = client(cluster, full_nodes(2), 1);

    let leaf = client
        .store(StoreRequest::new(BUCKET, Piece::new(payload(64))))
        .await
        .unwrap()
        .cid;
    let dir = DagNode::new(&b""[..]).with_link("leaf", leaf.clone(), 64);
    let dir_cid = client.store_dag_node(BUCKET, &dir).await.unwrap();

    client
        .store_cns_record(BUCKET, dir_cid.clone(), "site/root")
        .await
        .unwrap();
    assert_eq!(client.resolve_name(BUCKET, "site/root").await.unwrap(), dir_cid);

    let read = client
        .read_dag_node(BUCKET, ContentRef::parse("site/root"), "")
        .await
        .unwrap();
    assert_eq!(read.link("leaf").map(|l| l.cid.clone()), Some(leaf));

    let node = client
        .router()
        .get_node(RouterOperation::ReadDagNode, BUCKET, &[])
        .await
        .unwrap();
    assert!(node.id().starts_with("node-"));
}
