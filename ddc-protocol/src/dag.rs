use crate::common::Tag;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Link {
    #[prost(bytes = "vec", tag = "1")]
    pub cid: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub size: u64,
    #[prost(string, tag = "3")]
    pub name: String,
}

/// Directory-like node. Its protobuf encoding is the canonical form hashed
/// into the node's CID.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DagNode {
    #[prost(bytes = "vec", tag = "1")]
    pub data: Vec<u8>,
    #[prost(message, repeated, tag = "2")]
    pub links: Vec<Link>,
    #[prost(message, repeated, tag = "3")]
    pub tags: Vec<Tag>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PutDagNodeRequest {
    #[prost(uint64, tag = "1")]
    pub bucket_id: u64,
    #[prost(message, optional, tag = "2")]
    pub node: Option<DagNode>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PutDagNodeResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub cid: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetDagNodeRequest {
    #[prost(uint64, tag = "1")]
    pub bucket_id: u64,
    #[prost(bytes = "vec", tag = "2")]
    pub cid: Vec<u8>,
    /// Slash-separated link names to follow from the root node
    #[prost(string, tag = "3")]
    pub path: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetDagNodeResponse {
    #[prost(message, optional, tag = "1")]
    pub node: Option<DagNode>,
}
