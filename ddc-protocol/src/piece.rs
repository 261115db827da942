use crate::common::Tag;

/// Header frame of a raw piece upload
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawPieceMetadata {
    #[prost(uint64, tag = "1")]
    pub bucket_id: u64,
    /// Total number of content bytes that follow
    #[prost(uint64, tag = "2")]
    pub size: u64,
    #[prost(bool, tag = "3")]
    pub is_multipart_part: bool,
    /// Byte offset of this part inside its multipart piece
    #[prost(uint64, tag = "4")]
    pub offset: u64,
    #[prost(message, repeated, tag = "5")]
    pub tags: Vec<Tag>,
}

/// One frame of the client-streaming `PutRawPiece` call.
///
/// The first frame carries `metadata` and no content; every following frame
/// carries content only.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PutRawPieceRequest {
    #[prost(message, optional, tag = "1")]
    pub metadata: Option<RawPieceMetadata>,
    #[prost(bytes = "bytes", tag = "2")]
    pub content: ::prost::bytes::Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PutRawPieceResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub cid: Vec<u8>,
}

/// Ordered list of part hashes making up a larger piece
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MultipartManifest {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub part_hashes: Vec<Vec<u8>>,
    #[prost(uint64, tag = "2")]
    pub part_size: u64,
    #[prost(uint64, tag = "3")]
    pub total_size: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PutMultipartPieceRequest {
    #[prost(uint64, tag = "1")]
    pub bucket_id: u64,
    #[prost(message, optional, tag = "2")]
    pub manifest: Option<MultipartManifest>,
    #[prost(message, repeated, tag = "3")]
    pub tags: Vec<Tag>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PutMultipartPieceResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub cid: Vec<u8>,
}

/// Half-open byte range `[start, end)`
#[derive(Clone, Copy, PartialEq, Eq, ::prost::Message)]
pub struct Range {
    #[prost(uint64, tag = "1")]
    pub start: u64,
    #[prost(uint64, tag = "2")]
    pub end: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetPieceRequest {
    #[prost(uint64, tag = "1")]
    pub bucket_id: u64,
    #[prost(bytes = "vec", tag = "2")]
    pub cid: Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub range: Option<Range>,
}

/// Metadata sent ahead of the body of a `GetPiece` stream
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PieceResponseHeader {
    /// Storage proof for the served bytes, when the node attaches one
    #[prost(bytes = "vec", optional, tag = "1")]
    pub proof: Option<Vec<u8>>,
    /// Present when the requested CID names a multipart piece; no body follows
    #[prost(message, optional, tag = "2")]
    pub multipart: Option<MultipartManifest>,
    #[prost(message, repeated, tag = "3")]
    pub tags: Vec<Tag>,
}

/// One frame of the server-streaming `GetPiece` call
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetPieceResponse {
    #[prost(message, optional, tag = "1")]
    pub header: Option<PieceResponseHeader>,
    #[prost(bytes = "bytes", tag = "2")]
    pub body: ::prost::bytes::Bytes,
}
