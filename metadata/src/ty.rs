//! The runtime type model shared by every metadata version.
//!
//! Starting with V14, Substrate metadata ships its own type registry. Older
//! versions only carry type *names*, which get resolved into the same model by
//! [`LegacyTypes`](crate::legacy::LegacyTypes). Either way, callers only ever
//! see a [`TypeTable`] of [`RuntimeType`]s addressed by [`TypeId`].

use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Handle into the type table of a single [`Metadata`](crate::Metadata)
/// instance. Meaningless outside of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for TypeId {
    fn from(id: u32) -> Self {
        TypeId(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
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

impl Primitive {
    /// Width in bytes of the fixed-size numeric primitives. `None` for `Str`.
    pub fn width(&self) -> Option<usize> {
        use Primitive::*;

        match self {
            Bool | U8 | I8 => Some(1),
            U16 | I16 => Some(2),
            Char | U32 | I32 => Some(4),
            U64 | I64 => Some(8),
            U128 | I128 => Some(16),
            U256 | I256 => Some(32),
            Str => None,
        }
    }
    pub fn is_signed(&self) -> bool {
        use Primitive::*;

        matches!(self, I8 | I16 | I32 | I64 | I128 | I256)
    }
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Primitive::Bool | Primitive::Char | Primitive::Str)
    }
    /// Parses the primitive names used by legacy metadata.
    pub fn from_name(name: &str) -> Option<Self> {
        use Primitive::*;

        let prim = match name {
            "bool" => Bool,
            "char" => Char,
            "str" | "String" | "Text" => Str,
            "u8" => U8,
            "u16" => U16,
            "u32" => U32,
            "u64" => U64,
            "u128" => U128,
            "u256" | "U256" => U256,
            "i8" => I8,
            "i16" => I16,
            "i32" => I32,
            "i64" => I64,
            "i128" => I128,
            "i256" => I256,
            _ => return None,
        };

        Some(prim)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: Option<String>,
    pub ty: TypeId,
    /// The name of the type as written in the runtime source, if known.
    pub type_name: Option<String>,
}

impl Field {
    pub fn named<N: Into<String>>(name: N, ty: TypeId) -> Self {
        Field {
            name: Some(name.into()),
            ty,
            type_name: None,
        }
    }
    pub fn unnamed(ty: TypeId) -> Self {
        Field {
            name: None,
            ty,
            type_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// The wire tag of this variant.
    pub index: u8,
    pub name: String,
    pub fields: Vec<Field>,
    pub docs: Vec<String>,
}

/// Storage word of a bit sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitStore {
    U8,
    U16,
    U32,
    U64,
}

impl BitStore {
    pub fn bits(&self) -> usize {
        match self {
            BitStore::U8 => 8,
            BitStore::U16 => 16,
            BitStore::U32 => 32,
            BitStore::U64 => 64,
        }
    }
}

/// Order of the bits within a single storage word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOrder {
    Lsb0,
    Msb0,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeType {
    Primitive(Primitive),
    Compact(TypeId),
    Sequence(TypeId),
    Array { of: TypeId, len: u32 },
    Tuple(Vec<TypeId>),
    Composite(Vec<Field>),
    Variant(Vec<Variant>),
    BitSequence { store: BitStore, order: BitOrder },
}

impl RuntimeType {
    /// A short name of the shape, used in error reports.
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeType::Primitive(_) => "primitive",
            RuntimeType::Compact(_) => "compact",
            RuntimeType::Sequence(_) => "sequence",
            RuntimeType::Array { .. } => "array",
            RuntimeType::Tuple(_) => "tuple",
            RuntimeType::Composite(_) => "composite",
            RuntimeType::Variant(_) => "variant",
            RuntimeType::BitSequence { .. } => "bit sequence",
        }
    }
    /// All type ids directly referenced by this type.
    pub fn references(&self) -> Vec<TypeId> {
        match self {
            RuntimeType::Primitive(_) | RuntimeType::BitSequence { .. } => vec![],
            RuntimeType::Compact(of) | RuntimeType::Sequence(of) => vec![*of],
            RuntimeType::Array { of, .. } => vec![*of],
            RuntimeType::Tuple(ids) => ids.clone(),
            RuntimeType::Composite(fields) => fields.iter().map(|f| f.ty).collect(),
            RuntimeType::Variant(variants) => variants
                .iter()
                .flat_map(|v| v.fields.iter().map(|f| f.ty))
                .collect(),
        }
    }
}

/// A type table entry: the type definition plus its identifying path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeEntry {
    /// Fully qualified path, e.g. `["sp_runtime", "multiaddress", "MultiAddress"]`.
    pub path: Vec<String>,
    /// Generic parameters of the type, with their resolved type if any.
    pub params: Vec<(String, Option<TypeId>)>,
    pub ty: RuntimeType,
}

impl TypeEntry {
    pub fn new(ty: RuntimeType) -> Self {
        TypeEntry {
            path: vec![],
            params: vec![],
            ty,
        }
    }
    pub fn with_path<I, S>(self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TypeEntry {
            path: path.into_iter().map(Into::into).collect(),
            ..self
        }
    }
    pub fn param(&self, name: &str) -> Option<TypeId> {
        self.params
            .iter()
            .find(|(param, _)| param == name)
            .and_then(|(_, ty)| *ty)
    }
    /// The last segment of the path, if any.
    pub fn ident(&self) -> Option<&str> {
        self.path.last().map(|s| s.as_str())
    }
}

/// The complete type table of one metadata snapshot.
///
/// Ids are dense; an id can be allocated without a definition, in which case
/// resolving it fails with [`Error::UnknownTypeId`]. This is how unknown
/// legacy type names surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeTable {
    entries: Vec<Option<TypeEntry>>,
    unresolved: BTreeMap<TypeId, String>,
}

impl TypeTable {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    /// Appends a new entry and returns its id.
    pub fn push(&mut self, entry: TypeEntry) -> TypeId {
        let id = TypeId(self.entries.len() as u32);
        self.entries.push(Some(entry));
        id
    }
    /// Allocates an id for a type that will be defined later via [`TypeTable::define`].
    pub(crate) fn reserve(&mut self, name: &str) -> TypeId {
        let id = TypeId(self.entries.len() as u32);
        self.entries.push(None);
        self.unresolved.insert(id, name.to_string());
        id
    }
    pub(crate) fn define(&mut self, id: TypeId, entry: TypeEntry) {
        if let Some(slot) = self.entries.get_mut(id.0 as usize) {
            *slot = Some(entry);
            self.unresolved.remove(&id);
        }
    }
    pub fn get(&self, id: TypeId) -> Option<&TypeEntry> {
        self.entries.get(id.0 as usize).and_then(|e| e.as_ref())
    }
    pub fn resolve(&self, id: TypeId) -> Result<&RuntimeType> {
        self.get(id)
            .map(|entry| &entry.ty)
            .ok_or_else(|| Error::UnknownTypeId {
                id,
                name: self.unresolved.get(&id).cloned(),
            })
    }
    /// Names of legacy types that could not be resolved.
    pub fn unresolved(&self) -> impl Iterator<Item = (TypeId, &str)> {
        self.unresolved.iter().map(|(id, name)| (*id, name.as_str()))
    }
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &TypeEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(idx, entry)| entry.as_ref().map(|e| (TypeId(idx as u32), e)))
    }
    /// Finds the first type whose path ends with the given segments.
    pub fn find_by_path(&self, suffix: &[&str]) -> Option<TypeId> {
        self.iter()
            .find(|(_, entry)| {
                entry.path.len() >= suffix.len()
                    && entry.path[entry.path.len() - suffix.len()..]
                        .iter()
                        .zip(suffix)
                        .all(|(a, b)| a == b)
            })
            .map(|(id, _)| id)
    }
    /// Checks that every referenced id of every defined type exists.
    pub fn validate(&self) -> Result<()> {
        for (id, entry) in self.iter() {
            for reference in entry.ty.references() {
                if reference.0 as usize >= self.entries.len() {
                    return Err(Error::UnknownTypeId {
                        id: reference,
                        name: Some(format!("referenced by {}", id)),
                    });
                }
            }
        }

        Ok(())
    }
}
