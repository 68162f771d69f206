//! Metadata V12 differs from V13 only in lacking N-map storage entries.

use super::v13::{
    self, ErrorMetadata, EventMetadata, ExtrinsicMetadata, FunctionMetadata, ModuleConstantMetadata,
};
use crate::{LegacyTypes, Metadata, Result, StorageEntryModifier, StorageHasher};
use parity_scale_codec::{Decode, Encode};

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct MetadataV12 {
    pub modules: Vec<ModuleMetadata>,
    pub extrinsic: ExtrinsicMetadata,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct ModuleMetadata {
    pub name: String,
    pub storage: Option<StorageMetadata>,
    pub calls: Option<Vec<FunctionMetadata>>,
    pub events: Option<Vec<EventMetadata>>,
    pub constants: Vec<ModuleConstantMetadata>,
    pub errors: Vec<ErrorMetadata>,
    pub index: u8,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct StorageMetadata {
    pub prefix: String,
    pub entries: Vec<StorageEntryMetadata>,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct StorageEntryMetadata {
    pub name: String,
    pub modifier: StorageEntryModifier,
    pub ty: StorageEntryType,
    pub default: Vec<u8>,
    pub documentation: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub enum StorageEntryType {
    Plain(String),
    Map {
        hasher: StorageHasher,
        key: String,
        value: String,
        unused: bool,
    },
    DoubleMap {
        hasher: StorageHasher,
        key1: String,
        key2: String,
        value: String,
        key2_hasher: StorageHasher,
    },
}

impl From<StorageEntryType> for v13::StorageEntryType {
    fn from(val: StorageEntryType) -> Self {
        match val {
            StorageEntryType::Plain(value) => v13::StorageEntryType::Plain(value),
            StorageEntryType::Map {
                hasher,
                key,
                value,
                unused,
            } => v13::StorageEntryType::Map {
                hasher,
                key,
                value,
                unused,
            },
            StorageEntryType::DoubleMap {
                hasher,
                key1,
                key2,
                value,
                key2_hasher,
            } => v13::StorageEntryType::DoubleMap {
                hasher,
                key1,
                key2,
                value,
                key2_hasher,
            },
        }
    }
}

impl From<StorageEntryMetadata> for v13::StorageEntryMetadata {
    fn from(val: StorageEntryMetadata) -> Self {
        v13::StorageEntryMetadata {
            name: val.name,
            modifier: val.modifier,
            ty: val.ty.into(),
            default: val.default,
            documentation: val.documentation,
        }
    }
}

impl From<ModuleMetadata> for v13::ModuleMetadata {
    fn from(val: ModuleMetadata) -> Self {
        v13::ModuleMetadata {
            name: val.name,
            storage: val.storage.map(|storage| v13::StorageMetadata {
                prefix: storage.prefix,
                entries: storage.entries.into_iter().map(Into::into).collect(),
            }),
            calls: val.calls,
            events: val.events,
            constants: val.constants,
            errors: val.errors,
            index: val.index,
        }
    }
}

impl MetadataV12 {
    pub fn into_metadata(self, legacy: &LegacyTypes) -> Result<Metadata> {
        let modules = self.modules.into_iter().map(Into::into).collect();
        v13::convert(12, modules, self.extrinsic, legacy)
    }
}
