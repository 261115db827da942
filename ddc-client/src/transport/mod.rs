//! Storage node transport
//!
//! The protocol client only needs these call shapes; the gRPC implementation
//! is [`GrpcTransport`], tests plug in an in-memory cluster.

mod grpc;

pub use grpc::GrpcTransport;

use crate::auth::AuthToken;
use crate::node::NodeDescriptor;
use async_trait::async_trait;
use ddc_core::{DdcError, Result};
use ddc_protocol::{cns, dag, piece};
use futures::stream::BoxStream;

/// Outgoing frames of a raw piece upload
pub type RawPieceFrames = BoxStream<'static, piece::PutRawPieceRequest>;

/// Incoming frames of a piece read
pub type PieceStream = BoxStream<'static, Result<piece::GetPieceResponse>>;

#[async_trait]
pub trait NodeTransport: Send + Sync {
    /// Client-streaming upload: metadata frame, then content frames
    async fn put_raw_piece(
        &self,
        node: &NodeDescriptor,
        token: &AuthToken,
        frames: RawPieceFrames,
    ) -> Result<piece::PutRawPieceResponse>;

    async fn put_multipart_piece(
        &self,
        node: &NodeDescriptor,
        token: &AuthToken,
        request: piece::PutMultipartPieceRequest,
    ) -> Result<piece::PutMultipartPieceResponse>;

    /// Server-streaming read: optional header frame, then body frames
    async fn get_piece(
        &self,
        node: &NodeDescriptor,
        token: &AuthToken,
        request: piece::GetPieceRequest,
    ) -> Result<PieceStream>;

    async fn put_dag_node(
        &self,
        node: &NodeDescriptor,
        token: &AuthToken,
        request: dag::PutDagNodeRequest,
    ) -> Result<dag::PutDagNodeResponse>;

    async fn get_dag_node(
        &self,
        node: &NodeDescriptor,
        token: &AuthToken,
        request: dag::GetDagNodeRequest,
    ) -> Result<dag::GetDagNodeResponse>;

    async fn put_cns_record(
        &self,
        node: &NodeDescriptor,
        token: &AuthToken,
        request: cns::PutRecordRequest,
    ) -> Result<cns::PutRecordResponse>;

    async fn get_cns_record(
        &self,
        node: &NodeDescriptor,
        token: &AuthToken,
        request: cns::GetRecordRequest,
    ) -> Result<cns::GetRecordResponse>;
}

/// Map a gRPC status onto the client error taxonomy
pub fn status_to_error(status: tonic::Status) -> DdcError {
    use tonic::Code;

    match status.code() {
        Code::PermissionDenied | Code::Unauthenticated => {
            DdcError::CapabilityDenied(status.message().to_string())
        }
        Code::NotFound => DdcError::NotFound(status.message().to_string()),
        code => DdcError::Transport(format!("{code:?}: {}", status.message())),
    }
}
