/// Operation verbs a token can grant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Operation {
    Unknown = 0,
    Put = 1,
    Get = 2,
    Delete = 3,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Unknown => "UNKNOWN",
            Operation::Put => "PUT",
            Operation::Get => "GET",
            Operation::Delete => "DELETE",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Algorithm {
    Ed25519 = 0,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Signature {
    #[prost(enumeration = "Algorithm", tag = "1")]
    pub algorithm: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub signer: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub value: Vec<u8>,
}

/// Signed content of one link in a token chain
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Payload {
    /// Parent token this link was delegated from
    #[prost(message, optional, boxed, tag = "1")]
    pub prev: Option<Box<Token>>,
    /// Public key allowed to sign the next link
    #[prost(bytes = "vec", optional, tag = "2")]
    pub subject: Option<Vec<u8>>,
    #[prost(bool, tag = "3")]
    pub can_delegate: bool,
    #[prost(uint64, optional, tag = "4")]
    pub bucket_id: Option<u64>,
    #[prost(enumeration = "Operation", repeated, tag = "5")]
    pub operations: Vec<i32>,
    /// Unix time in milliseconds
    #[prost(uint64, tag = "6")]
    pub expires_at: u64,
    #[prost(bytes = "vec", optional, tag = "7")]
    pub cid: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Token {
    #[prost(message, optional, tag = "1")]
    pub payload: Option<Payload>,
    #[prost(message, optional, tag = "2")]
    pub signature: Option<Signature>,
}
