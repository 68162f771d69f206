//! Metadata V14, which ships a portable type registry. The layout mirrors the
//! `scale-info` portable form; type ids are compact encoded.

use crate::ty::{
    BitOrder, BitStore, Field, Primitive, RuntimeType, TypeEntry, TypeId, TypeTable, Variant,
};
use crate::{
    ConstantMetadata, Error, ExtrinsicFormat, Metadata, PalletStorage, Result,
    SignedExtensionMetadata, StorageEntryModifier, StorageHasher,
};
use parity_scale_codec::{Decode, Encode};

/// A compact encoded reference into the portable registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct Sym(#[codec(compact)] pub u32);

impl From<Sym> for TypeId {
    fn from(sym: Sym) -> Self {
        TypeId(sym.0)
    }
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct MetadataV14 {
    pub types: Vec<PortableType>,
    pub pallets: Vec<PalletMetadata>,
    pub extrinsic: ExtrinsicMetadata,
    /// The type of the `Runtime`.
    pub ty: Sym,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct PortableType {
    pub id: Sym,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct Type {
    pub path: Vec<String>,
    pub type_params: Vec<TypeParameter>,
    pub type_def: TypeDef,
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct TypeParameter {
    pub name: String,
    pub ty: Option<Sym>,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub enum TypeDef {
    Composite(Vec<FieldDef>),
    Variant(Vec<VariantDef>),
    Sequence(Sym),
    Array { len: u32, type_param: Sym },
    Tuple(Vec<Sym>),
    Primitive(PrimitiveDef),
    Compact(Sym),
    BitSequence { bit_store_type: Sym, bit_order_type: Sym },
}

#[derive(Debug, Clone, Copy, PartialEq, Encode, Decode)]
pub enum PrimitiveDef {
    Bool,
    Char,
    Str,
    U8,
    U16,
    U32,
    U64,
    U128,
    U256,
    I8,
    I16,
    I32,
    I64,
    I128,
    I256,
}

impl From<PrimitiveDef> for Primitive {
    fn from(val: PrimitiveDef) -> Self {
        match val {
            PrimitiveDef::Bool => Primitive::Bool,
            PrimitiveDef::Char => Primitive::Char,
            PrimitiveDef::Str => Primitive::Str,
            PrimitiveDef::U8 => Primitive::U8,
            PrimitiveDef::U16 => Primitive::U16,
            PrimitiveDef::U32 => Primitive::U32,
            PrimitiveDef::U64 => Primitive::U64,
            PrimitiveDef::U128 => Primitive::U128,
            PrimitiveDef::U256 => Primitive::U256,
            PrimitiveDef::I8 => Primitive::I8,
            PrimitiveDef::I16 => Primitive::I16,
            PrimitiveDef::I32 => Primitive::I32,
            PrimitiveDef::I64 => Primitive::I64,
            PrimitiveDef::I128 => Primitive::I128,
            PrimitiveDef::I256 => Primitive::I256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct FieldDef {
    pub name: Option<String>,
    pub ty: Sym,
    pub type_name: Option<String>,
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct VariantDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub index: u8,
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct PalletMetadata {
    pub name: String,
    pub storage: Option<PalletStorageMetadata>,
    pub calls: Option<Sym>,
    pub event: Option<Sym>,
    pub constants: Vec<PalletConstantMetadata>,
    pub error: Option<Sym>,
    pub index: u8,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct PalletStorageMetadata {
    pub prefix: String,
    pub entries: Vec<StorageEntryMetadata>,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct StorageEntryMetadata {
    pub name: String,
    pub modifier: StorageEntryModifier,
    pub ty: StorageEntryType,
    pub default: Vec<u8>,
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub enum StorageEntryType {
    Plain(Sym),
    Map {
        hashers: Vec<StorageHasher>,
        key: Sym,
        value: Sym,
    },
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct PalletConstantMetadata {
    pub name: String,
    pub ty: Sym,
    pub value: Vec<u8>,
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct ExtrinsicMetadata {
    pub ty: Sym,
    pub version: u8,
    pub signed_extensions: Vec<SignedExtensionDef>,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct SignedExtensionDef {
    pub identifier: String,
    pub ty: Sym,
    pub additional_signed: Sym,
}

fn convert_fields(fields: Vec<FieldDef>) -> Vec<Field> {
    fields
        .into_iter()
        .map(|field| Field {
            name: field.name,
            ty: field.ty.into(),
            type_name: field.type_name,
        })
        .collect()
}

impl MetadataV14 {
    pub fn into_metadata(self) -> Result<Metadata> {
        let types = convert_types(self.types)?;

        let mut pallets = vec![];
        for pallet in self.pallets {
            let storage = match pallet.storage {
                Some(storage) => {
                    let mut entries = vec![];
                    for entry in storage.entries {
                        entries.push(convert_storage_entry(&types, entry)?);
                    }

                    Some(PalletStorage {
                        prefix: storage.prefix,
                        entries,
                    })
                }
                None => None,
            };

            pallets.push(crate::PalletMetadata {
                name: pallet.name,
                index: pallet.index,
                storage,
                calls: pallet.calls.map(Into::into),
                events: pallet.event.map(Into::into),
                errors: pallet.error.map(Into::into),
                constants: pallet
                    .constants
                    .into_iter()
                    .map(|constant| ConstantMetadata {
                        name: constant.name,
                        ty: constant.ty.into(),
                        value: constant.value,
                        docs: constant.docs,
                    })
                    .collect(),
            });
        }

        let extrinsic_ty = types.get(self.extrinsic.ty.into());
        let param = |name: &str| extrinsic_ty.and_then(|entry| entry.param(name));

        let extrinsic = ExtrinsicFormat {
            version: self.extrinsic.version,
            address_ty: param("Address"),
            call_ty: param("Call"),
            signature_ty: param("Signature"),
            signed_extensions: self
                .extrinsic
                .signed_extensions
                .into_iter()
                .map(|ext| SignedExtensionMetadata {
                    identifier: ext.identifier,
                    ty: ext.ty.into(),
                    additional_signed: ext.additional_signed.into(),
                })
                .collect(),
        };

        if extrinsic.call_ty.is_none() {
            log::warn!("Extrinsic type does not declare its `Call` parameter");
        }

        Ok(Metadata {
            version: 14,
            types,
            pallets,
            extrinsic,
        })
    }
}

fn convert_types(portable: Vec<PortableType>) -> Result<TypeTable> {
    for (idx, ty) in portable.iter().enumerate() {
        if ty.id.0 as usize != idx {
            return Err(Error::InvalidMetadata(format!(
                "type registry is not sequential: expected id {}, found {}",
                idx, ty.id.0
            )));
        }
    }

    let mut table = TypeTable::new();
    for ty in &portable {
        let runtime_ty = match ty.ty.type_def.clone() {
            TypeDef::Composite(fields) => RuntimeType::Composite(convert_fields(fields)),
            TypeDef::Variant(variants) => RuntimeType::Variant(
                variants
                    .into_iter()
                    .map(|variant| Variant {
                        index: variant.index,
                        name: variant.name,
                        fields: convert_fields(variant.fields),
                        docs: variant.docs,
                    })
                    .collect(),
            ),
            TypeDef::Sequence(of) => RuntimeType::Sequence(of.into()),
            TypeDef::Array { len, type_param } => RuntimeType::Array {
                of: type_param.into(),
                len,
            },
            TypeDef::Tuple(elems) => RuntimeType::Tuple(elems.into_iter().map(Into::into).collect()),
            TypeDef::Primitive(prim) => RuntimeType::Primitive(prim.into()),
            TypeDef::Compact(of) => RuntimeType::Compact(of.into()),
            TypeDef::BitSequence {
                bit_store_type,
                bit_order_type,
            } => RuntimeType::BitSequence {
                store: bit_store(&portable, bit_store_type)?,
                order: bit_order(&portable, bit_order_type)?,
            },
        };

        table.push(TypeEntry {
            path: ty.ty.path.clone(),
            params: ty
                .ty
                .type_params
                .iter()
                .map(|param| (param.name.clone(), param.ty.map(Into::into)))
                .collect(),
            ty: runtime_ty,
        });
    }

    table.validate()?;
    Ok(table)
}

fn lookup(portable: &[PortableType], sym: Sym) -> Result<&Type> {
    portable
        .get(sym.0 as usize)
        .map(|ty| &ty.ty)
        .ok_or(Error::UnknownTypeId {
            id: sym.into(),
            name: None,
        })
}

fn bit_store(portable: &[PortableType], sym: Sym) -> Result<BitStore> {
    match lookup(portable, sym)?.type_def {
        TypeDef::Primitive(PrimitiveDef::U8) => Ok(BitStore::U8),
        TypeDef::Primitive(PrimitiveDef::U16) => Ok(BitStore::U16),
        TypeDef::Primitive(PrimitiveDef::U32) => Ok(BitStore::U32),
        TypeDef::Primitive(PrimitiveDef::U64) => Ok(BitStore::U64),
        _ => Err(Error::InvalidMetadata(format!(
            "unsupported bit store type #{}",
            sym.0
        ))),
    }
}

fn bit_order(portable: &[PortableType], sym: Sym) -> Result<BitOrder> {
    match lookup(portable, sym)?.path.last().map(|s| s.as_str()) {
        Some("Lsb0") => Ok(BitOrder::Lsb0),
        Some("Msb0") => Ok(BitOrder::Msb0),
        other => Err(Error::InvalidMetadata(format!(
            "unsupported bit order type {:?}",
            other
        ))),
    }
}

fn convert_storage_entry(
    types: &TypeTable,
    entry: StorageEntryMetadata,
) -> Result<crate::StorageEntryMetadata> {
    let (hashers, keys, value) = match entry.ty {
        StorageEntryType::Plain(value) => (vec![], vec![], value.into()),
        StorageEntryType::Map {
            hashers,
            key,
            value,
        } => {
            let key: TypeId = key.into();
            let keys = if hashers.len() > 1 {
                match types.resolve(key)? {
                    RuntimeType::Tuple(elems) if elems.len() == hashers.len() => elems.clone(),
                    _ => {
                        return Err(Error::InvalidMetadata(format!(
                            "storage entry {} has {} hashers but its key is not a matching tuple",
                            entry.name,
                            hashers.len()
                        )))
                    }
                }
            } else {
                vec![key]
            };

            (hashers, keys, value.into())
        }
    };

    Ok(crate::StorageEntryMetadata {
        name: entry.name,
        modifier: entry.modifier,
        hashers,
        keys,
        value,
        default: entry.default,
        docs: entry.docs,
    })
}
