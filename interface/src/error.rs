use crate::signer::SignerError;
use kite_metadata::{TypeId, SUPPORTED_VERSIONS};
use kite_rpc::TransportError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown type id {id}{}", .name.as_ref().map(|n| format!(" ({})", n)).unwrap_or_default())]
    UnknownTypeId { id: TypeId, name: Option<String> },
    #[error("value does not match type {ty}: expected {expected}, found {found}")]
    ValueShapeMismatch {
        ty: TypeId,
        expected: String,
        found: String,
    },
    #[error("unexpected end of input decoding {ty}: needed {needed} bytes, {available} available")]
    UnexpectedEof {
        ty: TypeId,
        needed: usize,
        available: usize,
    },
    #[error("{remaining} trailing bytes after decoding {ty} ({consumed} bytes consumed)")]
    TrailingBytes {
        ty: TypeId,
        consumed: usize,
        remaining: usize,
    },
    #[error("variant type {ty} has no variant with index {index}")]
    UnknownVariantIndex { ty: TypeId, index: u8 },
    #[error("invalid encoding of {ty}: {reason}")]
    InvalidEncoding { ty: TypeId, reason: String },
    #[error("type {ty} exceeds the recursion limit")]
    RecursionLimit { ty: TypeId },
    #[error("no supported metadata version: node offers {offered:?}, client supports {supported:?}")]
    UnsupportedMetadataVersion {
        offered: Vec<u32>,
        supported: Vec<u32>,
    },
    #[error("node did not return metadata V{0}")]
    MetadataUnavailable(u32),
    #[error("failed to parse metadata: {0}")]
    Metadata(kite_metadata::Error),
    #[error("call {pallet}::{call} not found")]
    CallNotFound { pallet: String, call: String },
    #[error("storage entry {pallet}::{item} not found")]
    StorageNotFound { pallet: String, item: String },
    #[error("constant {pallet}::{name} not found")]
    ConstantNotFound { pallet: String, name: String },
    #[error("parameters of {call} do not match: {reason}")]
    ParameterMismatch { call: String, reason: String },
    #[error("signed extension {0} is not supported")]
    UnsupportedSignedExtension(String),
    #[error("missing field: {0}")]
    BuilderMissingField(&'static str),
    #[error("failed to fetch nonce: {0}")]
    NonceFetchFailed(#[source] TransportError),
    #[error("failed to sign: {0}")]
    SignerFailed(#[from] SignerError),
    #[error("transport failed: {0}")]
    TransportFailed(#[from] TransportError),
    #[error("transaction rejected: {0}")]
    Rejected(String),
    #[error("invalid SS58 address: {0}")]
    InvalidAddress(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<kite_metadata::Error> for Error {
    fn from(err: kite_metadata::Error) -> Self {
        match err {
            kite_metadata::Error::UnknownTypeId { id, name } => Error::UnknownTypeId { id, name },
            kite_metadata::Error::UnsupportedMetadataVersion(version) => {
                Error::UnsupportedMetadataVersion {
                    offered: vec![version],
                    supported: SUPPORTED_VERSIONS.to_vec(),
                }
            }
            err => Error::Metadata(err),
        }
    }
}

impl From<parity_scale_codec::Error> for Error {
    fn from(err: parity_scale_codec::Error) -> Self {
        Error::Metadata(err.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::TransportFailed(err.into())
    }
}
