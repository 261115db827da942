//! DDC Protocol Definitions
//!
//! Protobuf messages exchanged with storage nodes, derived with `prost`.
//!
//! # Services
//! - `PieceApi` - Store/read raw and multipart pieces
//! - `DagApi` - Store/read DAG nodes
//! - `CnsApi` - Bind and resolve content names
//!
//! Every call carries a base58 encoded [`auth::Token`] in the `token`
//! metadata entry.

/// Piece service messages
pub mod piece;

/// DAG service messages
pub mod dag;

/// Content name service messages
pub mod cns;

/// Auth token and signature messages
pub mod auth;

/// Shared tag message
pub mod common;

pub use common::Tag;

/// gRPC metadata key carrying the auth token
pub const TOKEN_METADATA_KEY: &str = "token";

/// Fully qualified gRPC method paths
pub mod paths {
    pub const PUT_RAW_PIECE: &str = "/ddc.piece.PieceApi/PutRawPiece";
    pub const PUT_MULTIPART_PIECE: &str = "/ddc.piece.PieceApi/PutMultipartPiece";
    pub const GET_PIECE: &str = "/ddc.piece.PieceApi/GetPiece";
    pub const PUT_DAG_NODE: &str = "/ddc.dag.DagApi/Put";
    pub const GET_DAG_NODE: &str = "/ddc.dag.DagApi/Get";
    pub const PUT_CNS_RECORD: &str = "/ddc.cns.CnsApi/Put";
    pub const GET_CNS_RECORD: &str = "/ddc.cns.CnsApi/Get";
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_token_chain_encoding() {
        let parent = auth::Token {
            payload: Some(auth::Payload {
                operations: vec![auth::Operation::Get as i32],
                expires_at: 1_000,
                bucket_id: Some(7),
                ..Default::default()
            }),
            signature: Some(auth::Signature {
                algorithm: auth::Algorithm::Ed25519 as i32,
                signer: vec![1; 32],
                value: vec![2; 64],
            }),
        };

        let child = auth::Token {
            payload: Some(auth::Payload {
                prev: Some(Box::new(parent.clone())),
                operations: vec![auth::Operation::Get as i32],
                expires_at: 900,
                ..Default::default()
            }),
            signature: None,
        };

        let bytes = child.encode_length_delimited_to_vec();
        let decoded = auth::Token::decode_length_delimited(bytes.as_slice()).unwrap();
        let prev = decoded.payload.unwrap().prev.unwrap();
        assert_eq!(*prev, parent);
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(auth::Operation::Put.as_str(), "PUT");
        assert_eq!(auth::Operation::try_from(2).unwrap(), auth::Operation::Get);
        assert!(auth::Operation::try_from(42).is_err());
    }
}
