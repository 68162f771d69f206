//! Utilities to parse and process substrate metadata. Every supported metadata
//! version is converted into one unified [`Metadata`] snapshot that carries a
//! [`TypeTable`] of [`RuntimeType`]s, so callers never need to care which
//! version the node handed out.
//!
//! # Example
//!
//! ```
//! use kite_metadata::{parse_raw_metadata_with, Error, LegacyTypes};
//!
//! // Only V12, V13 and V14 are understood.
//! let raw = b"meta\x0b";
//! assert!(matches!(
//!     parse_raw_metadata_with(raw, &LegacyTypes::default()),
//!     Err(Error::UnsupportedMetadataVersion(11))
//! ));
//! ```
//!
//! Lookups by name and index are built on top of a [`Metadata`] snapshot by
//! the `kite` crate's `Registry`.

// INFO: The earliest metadata versions are available in the substrate repo at
// commit: a31c01b398d958ccf0a24d8c1c11fb073df66212

pub use self::legacy::LegacyTypes;
pub use self::ty::{
    BitOrder, BitStore, Field, Primitive, RuntimeType, TypeEntry, TypeId, TypeTable, Variant,
};
use parity_scale_codec::{Decode, Encode, Error as ScaleError};

pub type Result<T> = std::result::Result<T, Error>;

pub mod legacy;
pub mod ty;
pub mod version;

/// Metadata versions this crate is able to parse.
pub const SUPPORTED_VERSIONS: &[u32] = &[12, 13, 14];

/// The magic number that is prefixed in the runtime metadata returned by
/// JSON-RPC `state_getMetadata`. 'meta' = 0x6d657461.
const MAGIC_NUMBER: &[u8] = b"meta";

/// Errors that can occur when parsing Substrate metadata.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to decode raw metadata: {0}")]
    ParseRawMetadata(ScaleError),
    #[error("metadata blob is empty")]
    EmptyMetadata,
    #[error("metadata version {0} is not supported")]
    UnsupportedMetadataVersion(u32),
    #[error("unknown type id {id}{}", .name.as_ref().map(|n| format!(" ({})", n)).unwrap_or_default())]
    UnknownTypeId { id: TypeId, name: Option<String> },
    #[error("invalid legacy type name `{0}`")]
    InvalidTypeName(String),
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),
}

impl From<ScaleError> for Error {
    fn from(err: ScaleError) -> Self {
        Error::ParseRawMetadata(err)
    }
}

/// Parse the raw Substrate metadata, resolving legacy type names with the
/// default [`LegacyTypes`].
pub fn parse_raw_metadata<T: AsRef<[u8]>>(raw: T) -> Result<Metadata> {
    parse_raw_metadata_with(raw, &LegacyTypes::default())
}

/// Parse the raw Substrate metadata. Pre-V14 metadata only carries type names,
/// which get resolved with the given `legacy` type definitions.
pub fn parse_raw_metadata_with<T: AsRef<[u8]>>(raw: T, legacy: &LegacyTypes) -> Result<Metadata> {
    let raw = raw.as_ref();

    // Remove the magic number before decoding, if it exists. From the substrate
    // docs:
    // > "The hex blob that is returned by the JSON-RPCs state_getMetadata
    // > method starts with a hard-coded magic number, 0x6d657461, which
    // > represents "meta" in plain text."
    let slice = raw.strip_prefix(MAGIC_NUMBER).unwrap_or(raw);

    let (version, mut body) = slice.split_first().ok_or(Error::EmptyMetadata)?;
    let version = u32::from(*version);

    log::debug!("Parsing runtime metadata V{}", version);

    let metadata = match version {
        12 => version::v12::MetadataV12::decode(&mut body)?.into_metadata(legacy)?,
        13 => version::v13::MetadataV13::decode(&mut body)?.into_metadata(legacy)?,
        14 => version::v14::MetadataV14::decode(&mut body)?.into_metadata()?,
        _ => return Err(Error::UnsupportedMetadataVersion(version)),
    };

    if !body.is_empty() {
        return Err(Error::InvalidMetadata(format!(
            "{} trailing bytes after metadata V{}",
            body.len(),
            version
        )));
    }

    Ok(metadata)
}

/// Unified, immutable metadata snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// The metadata version this snapshot was parsed from.
    pub version: u32,
    pub types: TypeTable,
    pub pallets: Vec<PalletMetadata>,
    pub extrinsic: ExtrinsicFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PalletMetadata {
    pub name: String,
    pub index: u8,
    pub storage: Option<PalletStorage>,
    /// Variant type listing all calls of this pallet.
    pub calls: Option<TypeId>,
    /// Variant type listing all events of this pallet.
    pub events: Option<TypeId>,
    /// Variant type listing all errors of this pallet.
    pub errors: Option<TypeId>,
    pub constants: Vec<ConstantMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PalletStorage {
    pub prefix: String,
    pub entries: Vec<StorageEntryMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntryMetadata {
    pub name: String,
    pub modifier: StorageEntryModifier,
    /// One hasher per key. Empty for plain storage values.
    pub hashers: Vec<StorageHasher>,
    pub keys: Vec<TypeId>,
    pub value: TypeId,
    pub default: Vec<u8>,
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum StorageEntryModifier {
    Optional,
    Default,
}

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum StorageHasher {
    Blake2_128,
    Blake2_256,
    Blake2_128Concat,
    Twox128,
    Twox256,
    Twox64Concat,
    Identity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantMetadata {
    pub name: String,
    pub ty: TypeId,
    pub value: Vec<u8>,
    pub docs: Vec<String>,
}

/// How extrinsics of this runtime are shaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtrinsicFormat {
    /// The extrinsic format version, without the signed bit.
    pub version: u8,
    pub address_ty: Option<TypeId>,
    /// The outer call enum, one variant per pallet.
    pub call_ty: Option<TypeId>,
    pub signature_ty: Option<TypeId>,
    /// Signed extensions in the order they must appear on the wire.
    pub signed_extensions: Vec<SignedExtensionMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedExtensionMetadata {
    pub identifier: String,
    /// Type of the bytes placed inside the extrinsic.
    pub ty: TypeId,
    /// Type of the bytes only folded into the signing payload.
    pub additional_signed: TypeId,
}

impl Metadata {
    /// Resolves `ty` and expects it to be a variant type.
    pub fn variants(&self, ty: TypeId) -> Result<&[Variant]> {
        match self.types.resolve(ty)? {
            RuntimeType::Variant(variants) => Ok(variants),
            other => Err(Error::InvalidMetadata(format!(
                "expected variant type at {}, found {}",
                ty,
                other.kind()
            ))),
        }
    }
}
