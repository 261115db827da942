use crate::auth::Signature;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Record {
    #[prost(bytes = "vec", tag = "1")]
    pub cid: Vec<u8>,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(message, optional, tag = "3")]
    pub signature: Option<Signature>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PutRecordRequest {
    #[prost(uint64, tag = "1")]
    pub bucket_id: u64,
    #[prost(message, optional, tag = "2")]
    pub record: Option<Record>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PutRecordResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetRecordRequest {
    #[prost(uint64, tag = "1")]
    pub bucket_id: u64,
    #[prost(string, tag = "2")]
    pub name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetRecordResponse {
    #[prost(message, optional, tag = "1")]
    pub record: Option<Record>,
}
