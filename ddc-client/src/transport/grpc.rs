//! tonic implementation of [`NodeTransport`]
//!
//! Messages are plain prost types, so calls go through `tonic::client::Grpc`
//! with a `ProstCodec` and the method paths from `ddc_protocol::paths`.

use super::{status_to_error, NodeTransport, PieceStream, RawPieceFrames};
use crate::auth::AuthToken;
use crate::config::GrpcConfig;
use crate::node::NodeDescriptor;
use async_trait::async_trait;
use ddc_core::{DdcError, Result};
use ddc_protocol::{cns, dag, paths, piece, TOKEN_METADATA_KEY};
use futures::StreamExt;
use http::uri::PathAndQuery;
use parking_lot::RwLock;
use std::collections::HashMap;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tracing::{debug, info};

/// gRPC transport with one pooled channel per node endpoint
pub struct GrpcTransport {
    config: GrpcConfig,
    channels: RwLock<HashMap<String, Channel>>,
}

impl GrpcTransport {
    pub fn new(config: GrpcConfig) -> Self {
        Self {
            config,
            channels: RwLock::new(HashMap::new()),
        }
    }

    async fn channel(&self, node: &NodeDescriptor) -> Result<Channel> {
        let cached = self.channels.read().get(&node.rpc_endpoint).cloned();
        if let Some(channel) = cached {
            return Ok(channel);
        }

        let uri = node.rpc_uri();
        debug!(node = %node.id, uri = %uri, "Connecting to storage node");

        let mut endpoint = Endpoint::from_shared(uri)
            .map_err(|e| DdcError::Transport(e.to_string()))?
            .connect_timeout(self.config.connect_timeout)
            .timeout(self.config.request_timeout);
        if node.secure {
            endpoint = endpoint
                .tls_config(ClientTlsConfig::new())
                .map_err(|e| DdcError::Transport(e.to_string()))?;
        }

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| DdcError::Transport(format!("{}: {}", node.rpc_endpoint, e)))?;

        self.channels
            .write()
            .insert(node.rpc_endpoint.clone(), channel.clone());
        info!(node = %node.id, endpoint = %node.rpc_endpoint, "Connected to storage node");
        Ok(channel)
    }

    async fn client(&self, node: &NodeDescriptor) -> Result<Grpc<Channel>> {
        let mut grpc = Grpc::new(self.channel(node).await?);
        grpc.ready().await.map_err(|e| {
            // drop the channel so the next call reconnects
            self.channels.write().remove(&node.rpc_endpoint);
            DdcError::Transport(e.to_string())
        })?;
        Ok(grpc)
    }

    fn request<T>(message: T, token: &AuthToken) -> Result<tonic::Request<T>> {
        let mut request = tonic::Request::new(message);
        let value = token
            .to_base58()
            .parse()
            .map_err(|_| DdcError::InvalidToken("token is not valid metadata".to_string()))?;
        request.metadata_mut().insert(TOKEN_METADATA_KEY, value);
        Ok(request)
    }

    async fn unary<Req, Resp>(
        &self,
        node: &NodeDescriptor,
        token: &AuthToken,
        path: &'static str,
        message: Req,
    ) -> Result<Resp>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self.client(node).await?;
        let response = grpc
            .unary(
                Self::request(message, token)?,
                PathAndQuery::from_static(path),
                ProstCodec::<Req, Resp>::default(),
            )
            .await
            .map_err(status_to_error)?;
        Ok(response.into_inner())
    }
}

#[async_trait]
impl NodeTransport for GrpcTransport {
    async fn put_raw_piece(
        &self,
        node: &NodeDescriptor,
        token: &AuthToken,
        frames: RawPieceFrames,
    ) -> Result<piece::PutRawPieceResponse> {
        let mut grpc = self.client(node).await?;
        let response = grpc
            .client_streaming(
                Self::request(frames, token)?,
                PathAndQuery::from_static(paths::PUT_RAW_PIECE),
                ProstCodec::<piece::PutRawPieceRequest, piece::PutRawPieceResponse>::default(),
            )
            .await
            .map_err(status_to_error)?;
        Ok(response.into_inner())
    }

    async fn put_multipart_piece(
        &self,
        node: &NodeDescriptor,
        token: &AuthToken,
        request: piece::PutMultipartPieceRequest,
    ) -> Result<piece::PutMultipartPieceResponse> {
        self.unary(node, token, paths::PUT_MULTIPART_PIECE, request)
            .await
    }

    async fn get_piece(
        &self,
        node: &NodeDescriptor,
        token: &AuthToken,
        request: piece::GetPieceRequest,
    ) -> Result<PieceStream> {
        let mut grpc = self.client(node).await?;
        let response = grpc
            .server_streaming(
                Self::request(request, token)?,
                PathAndQuery::from_static(paths::GET_PIECE),
                ProstCodec::<piece::GetPieceRequest, piece::GetPieceResponse>::default(),
            )
            .await
            .map_err(status_to_error)?;
        Ok(response
            .into_inner()
            .map(|frame| frame.map_err(status_to_error))
            .boxed())
    }

    async fn put_dag_node(
        &self,
        node: &NodeDescriptor,
        token: &AuthToken,
        request: dag::PutDagNodeRequest,
    ) -> Result<dag::PutDagNodeResponse> {
        self.unary(node, token, paths::PUT_DAG_NODE, request).await
    }

    async fn get_dag_node(
        &self,
        node: &NodeDescriptor,
        token: &AuthToken,
        request: dag::GetDagNodeRequest,
    ) -> Result<dag::GetDagNodeResponse> {
        self.unary(node, token, paths::GET_DAG_NODE, request).await
    }

    async fn put_cns_record(
        &self,
        node: &NodeDescriptor,
        token: &AuthToken,
        request: cns::PutRecordRequest,
    ) -> Result<cns::PutRecordResponse> {
        self.unary(node, token, paths::PUT_CNS_RECORD, request).await
    }

    async fn get_cns_record(
        &self,
        node: &NodeDescriptor,
        token: &AuthToken,
        request: cns::GetRecordRequest,
    ) -> Result<cns::GetRecordResponse> {
        self.unary(node, token, paths::GET_CNS_RECORD, request).await
    }
}
