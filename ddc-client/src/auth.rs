//! Capability tokens attached to every storage node call
//!
//! A token grants a set of operations, optionally bound to a bucket and a CID,
//! until an expiry time. Tokens can be chained: a holder whose token allows
//! delegation signs a narrower child token whose `prev` is the parent. Each
//! link may only narrow what its parent grants.
//!
//! Chain rules, checked before a child is signed and again on verify:
//! - the parent must allow delegation
//! - if the parent names a subject, only that key may sign the child
//! - operations must be a subset of the parent's
//! - expiry must not be later than the parent's
//! - a bucket or CID bound anywhere up the chain cannot be rebound

use chrono::Utc;
use ddc_core::{Cid, DdcError};
use ddc_protocol::auth as proto;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use parking_lot::Mutex;
use prost::Message;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub use ddc_protocol::auth::Operation;

/// Maximum number of links in a token chain
pub const MAX_CHAIN_DEPTH: usize = 8;

/// Token chain violations and decoding failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("parent token does not allow delegation")]
    DelegationNotAllowed,

    #[error("signer {signer} is not the subject of the parent token")]
    WrongSigner { signer: String },

    #[error("operation {0} is not granted by the parent token")]
    OperationNotGranted(&'static str),

    #[error("expiry {child} is later than parent expiry {parent}")]
    ExpiryExceedsParent { child: u64, parent: u64 },

    #[error("bucket already bound to {bound}, cannot rebind to {requested}")]
    BucketRebound { bound: u64, requested: u64 },

    #[error("CID already bound, cannot rebind")]
    CidRebound,

    #[error("token grants no operations")]
    NoOperations,

    #[error("token expired at {0}")]
    Expired(u64),

    #[error("token chain exceeds the maximum delegation depth")]
    ChainTooDeep,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("malformed token: {0}")]
    Malformed(String),
}

impl From<TokenError> for DdcError {
    fn from(err: TokenError) -> Self {
        DdcError::InvalidToken(err.to_string())
    }
}

type TokenResult<T> = std::result::Result<T, TokenError>;

fn now_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// A signed link of a capability chain
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub prev: Option<Box<AuthToken>>,
    /// Key allowed to sign a child of this token; `None` lets any holder delegate
    pub subject: Option<VerifyingKey>,
    pub can_delegate: bool,
    pub bucket_id: Option<u64>,
    pub operations: Vec<Operation>,
    /// Unix time in milliseconds
    pub expires_at: u64,
    pub cid: Option<Cid>,
    pub signer: VerifyingKey,
    pub signature: Signature,
}

impl AuthToken {
    /// Bucket bound by this link or any ancestor
    pub fn effective_bucket(&self) -> Option<u64> {
        self.bucket_id
            .or_else(|| self.prev.as_ref().and_then(|p| p.effective_bucket()))
    }

    /// CID bound by this link or any ancestor
    pub fn effective_cid(&self) -> Option<&Cid> {
        self.cid
            .as_ref()
            .or_else(|| self.prev.as_ref().and_then(|p| p.effective_cid()))
    }

    /// Signer of the first link, normally the bucket owner
    pub fn root_signer(&self) -> &VerifyingKey {
        match &self.prev {
            Some(prev) => prev.root_signer(),
            None => &self.signer,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= now_millis()
    }

    /// Whether this token was minted for exactly `operation` on `bucket_id`
    pub fn is_scoped_to(&self, operation: Operation, bucket_id: u64) -> bool {
        self.bucket_id == Some(bucket_id) && self.operations == [operation]
    }

    pub fn depth(&self) -> usize {
        1 + self.prev.as_ref().map_or(0, |p| p.depth())
    }

    /// Whether this token covers `operation` on `bucket_id` (and `cid`, when
    /// the chain binds one)
    pub fn allows(&self, operation: Operation, bucket_id: u64, cid: Option<&Cid>) -> bool {
        if !self.operations.contains(&operation) {
            return false;
        }
        if self.effective_bucket().is_some_and(|b| b != bucket_id) {
            return false;
        }
        match (self.effective_cid(), cid) {
            (Some(bound), Some(requested)) => bound == requested,
            (Some(_), None) => false,
            (None, _) => true,
        }
    }

    /// Check every signature and chain rule, and that no link has expired
    pub fn verify(&self) -> TokenResult<()> {
        self.verify_at(now_millis())
    }

    pub fn verify_at(&self, now_ms: u64) -> TokenResult<()> {
        if self.depth() > MAX_CHAIN_DEPTH {
            return Err(TokenError::ChainTooDeep);
        }
        if self.expires_at <= now_ms {
            return Err(TokenError::Expired(self.expires_at));
        }
        let payload = self.payload_proto();
        self.signer
            .verify(&payload.encode_to_vec(), &self.signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        if let Some(parent) = &self.prev {
            check_attenuation(
                parent,
                &self.signer,
                &self.operations,
                self.expires_at,
                self.bucket_id,
                self.cid.as_ref(),
            )?;
            parent.verify_at(now_ms)?;
        }
        Ok(())
    }

    fn payload_proto(&self) -> proto::Payload {
        proto::Payload {
            prev: self.prev.as_ref().map(|p| Box::new(p.to_proto())),
            subject: self.subject.map(|k| k.to_bytes().to_vec()),
            can_delegate: self.can_delegate,
            bucket_id: self.bucket_id,
            operations: self.operations.iter().map(|op| *op as i32).collect(),
            expires_at: self.expires_at,
            cid: self.cid.as_ref().map(Cid::to_vec),
        }
    }

    pub fn to_proto(&self) -> proto::Token {
        proto::Token {
            payload: Some(self.payload_proto()),
            signature: Some(proto::Signature {
                algorithm: proto::Algorithm::Ed25519 as i32,
                signer: self.signer.to_bytes().to_vec(),
                value: self.signature.to_bytes().to_vec(),
            }),
        }
    }

    pub fn from_proto(token: proto::Token) -> TokenResult<Self> {
        let payload = token
            .payload
            .ok_or_else(|| TokenError::Malformed("missing payload".into()))?;
        let signature = token
            .signature
            .ok_or_else(|| TokenError::Malformed("missing signature".into()))?;
        if signature.algorithm != proto::Algorithm::Ed25519 as i32 {
            return Err(TokenError::Malformed(format!(
                "unsupported signature algorithm {}",
                signature.algorithm
            )));
        }

        let prev = payload
            .prev
            .map(|p| AuthToken::from_proto(*p).map(Box::new))
            .transpose()?;
        let operations = payload
            .operations
            .iter()
            .map(|op| {
                Operation::try_from(*op)
                    .map_err(|_| TokenError::Malformed(format!("unknown operation {op}")))
            })
            .collect::<TokenResult<Vec<_>>>()?;
        let cid = payload
            .cid
            .map(|c| Cid::from_bytes(c).map_err(|e| TokenError::Malformed(e.to_string())))
            .transpose()?;

        Ok(Self {
            prev,
            subject: payload.subject.as_deref().map(verifying_key).transpose()?,
            can_delegate: payload.can_delegate,
            bucket_id: payload.bucket_id,
            operations,
            expires_at: payload.expires_at,
            cid,
            signer: verifying_key(&signature.signer)?,
            signature: Signature::from_slice(&signature.value)
                .map_err(|e| TokenError::Malformed(e.to_string()))?,
        })
    }

    /// Length-delimited wire form
    pub fn encode(&self) -> Vec<u8> {
        self.to_proto().encode_length_delimited_to_vec()
    }

    pub fn decode(bytes: &[u8]) -> TokenResult<Self> {
        let token = proto::Token::decode_length_delimited(bytes)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        Self::from_proto(token)
    }

    /// Text form carried in request metadata
    pub fn to_base58(&self) -> String {
        bs58::encode(self.encode()).into_string()
    }

    pub fn from_base58(s: &str) -> TokenResult<Self> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        Self::decode(&bytes)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("signer", &hex::encode(self.signer.as_bytes()))
            .field("operations", &self.operations)
            .field("bucket_id", &self.bucket_id)
            .field("expires_at", &self.expires_at)
            .field("depth", &self.depth())
            .finish()
    }
}

fn verifying_key(bytes: &[u8]) -> TokenResult<VerifyingKey> {
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| TokenError::Malformed(format!("public key is {} bytes", bytes.len())))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| TokenError::Malformed(e.to_string()))
}

fn check_attenuation(
    parent: &AuthToken,
    signer: &VerifyingKey,
    operations: &[Operation],
    expires_at: u64,
    bucket_id: Option<u64>,
    cid: Option<&Cid>,
) -> TokenResult<()> {
    if !parent.can_delegate {
        return Err(TokenError::DelegationNotAllowed);
    }
    if let Some(subject) = &parent.subject {
        if subject != signer {
            return Err(TokenError::WrongSigner {
                signer: hex::encode(signer.as_bytes()),
            });
        }
    }
    if let Some(op) = operations.iter().find(|op| !parent.operations.contains(op)) {
        return Err(TokenError::OperationNotGranted(op.as_str()));
    }
    if expires_at > parent.expires_at {
        return Err(TokenError::ExpiryExceedsParent {
            child: expires_at,
            parent: parent.expires_at,
        });
    }
    if let (Some(bound), Some(requested)) = (parent.effective_bucket(), bucket_id) {
        if bound != requested {
            return Err(TokenError::BucketRebound { bound, requested });
        }
    }
    if let (Some(bound), Some(requested)) = (parent.effective_cid(), cid) {
        if bound != requested {
            return Err(TokenError::CidRebound);
        }
    }
    Ok(())
}

/// Builds and signs a token, validating the chain first
pub struct AuthTokenBuilder<'a> {
    signer: &'a SigningKey,
    operations: Vec<Operation>,
    bucket_id: Option<u64>,
    cid: Option<Cid>,
    subject: Option<VerifyingKey>,
    can_delegate: bool,
    ttl: Duration,
    expires_at: Option<u64>,
    parent: Option<AuthToken>,
}

impl<'a> AuthTokenBuilder<'a> {
    pub fn new(signer: &'a SigningKey) -> Self {
        Self {
            signer,
            operations: Vec::new(),
            bucket_id: None,
            cid: None,
            subject: None,
            can_delegate: false,
            ttl: Duration::from_secs(60),
            expires_at: None,
            parent: None,
        }
    }

    pub fn operation(mut self, operation: Operation) -> Self {
        if !self.operations.contains(&operation) {
            self.operations.push(operation);
        }
        self
    }

    pub fn operations(self, operations: impl IntoIterator<Item = Operation>) -> Self {
        operations.into_iter().fold(self, |b, op| b.operation(op))
    }

    pub fn bucket(mut self, bucket_id: u64) -> Self {
        self.bucket_id = Some(bucket_id);
        self
    }

    pub fn cid(mut self, cid: Cid) -> Self {
        self.cid = Some(cid);
        self
    }

    pub fn subject(mut self, subject: VerifyingKey) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn can_delegate(mut self, can_delegate: bool) -> Self {
        self.can_delegate = can_delegate;
        self
    }

    /// Lifetime from now; ignored when an explicit expiry is set
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Absolute expiry in Unix milliseconds
    pub fn expires_at(mut self, expires_at: u64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn delegated_from(mut self, parent: AuthToken) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn build(self) -> TokenResult<AuthToken> {
        if self.operations.is_empty() {
            return Err(TokenError::NoOperations);
        }
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| now_millis() + self.ttl.as_millis() as u64);
        let signer = self.signer.verifying_key();

        if let Some(parent) = &self.parent {
            if parent.depth() >= MAX_CHAIN_DEPTH {
                return Err(TokenError::ChainTooDeep);
            }
            check_attenuation(
                parent,
                &signer,
                &self.operations,
                expires_at,
                self.bucket_id,
                self.cid.as_ref(),
            )?;
        }

        let mut token = AuthToken {
            prev: self.parent.map(Box::new),
            subject: self.subject,
            can_delegate: self.can_delegate,
            bucket_id: self.bucket_id,
            operations: self.operations,
            expires_at,
            cid: self.cid,
            signer,
            signature: Signature::from_bytes(&[0u8; 64]),
        };
        token.signature = self.signer.sign(&token.payload_proto().encode_to_vec());
        Ok(token)
    }
}

/// Mints short-lived per-call tokens for one client identity.
///
/// With a base token (access delegated by a bucket owner) every minted token
/// is chained under it; otherwise tokens are self-signed roots.
pub struct TokenIssuer {
    signer: SigningKey,
    base: Option<AuthToken>,
    ttl: Duration,
    last: Mutex<Option<AuthToken>>,
}

impl TokenIssuer {
    pub fn new(signer: SigningKey, ttl: Duration) -> Self {
        Self {
            signer,
            base: None,
            ttl,
            last: Mutex::new(None),
        }
    }

    pub fn with_base(mut self, base: AuthToken) -> Self {
        self.base = Some(base);
        self
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signer
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.signer.verifying_key()
    }

    /// Token scoped to `operation` on `bucket_id`.
    ///
    /// The previous token is reused while it has the same scope and at least a
    /// quarter of its lifetime left.
    pub fn issue(&self, bucket_id: u64, operation: Operation) -> TokenResult<AuthToken> {
        let now = now_millis();
        let margin = (self.ttl.as_millis() as u64) / 4;

        let mut last = self.last.lock();
        if let Some(token) = last.as_ref() {
            if token.bucket_id == Some(bucket_id)
                && token.operations == [operation]
                && token.expires_at > now + margin
            {
                return Ok(token.clone());
            }
        }

        let mut expires_at = now + self.ttl.as_millis() as u64;
        let mut builder = AuthTokenBuilder::new(&self.signer)
            .operation(operation)
            .bucket(bucket_id);
        if let Some(base) = &self.base {
            expires_at = expires_at.min(base.expires_at);
            builder = builder.delegated_from(base.clone());
        }
        let token = builder.expires_at(expires_at).build()?;

        debug!(bucket_id, operation = operation.as_str(), "Minted auth token");
        *last = Some(token.clone());
        Ok(token)
    }
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("signer", &hex::encode(self.public_key().as_bytes()))
            .field("delegated", &self.base.is_some())
            .field("ttl", &self.ttl)
            .finish()
    }
}
