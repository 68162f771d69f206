//! The runtime's types and pallets, indexed for lookups by name.
//!
//! A [`Registry`] wraps exactly one [`Metadata`] snapshot and never changes
//! after construction. When the runtime upgrades, build a new one.

use crate::chain::{Chain, Component, TypedValue};
use crate::codec;
use crate::common::ss58format::Ss58AddressFormat;
use crate::value::{Composite, Value};
use crate::{blake2b, Error, Result};
use kite_metadata::{
    ExtrinsicFormat, Metadata, PalletMetadata, RuntimeType, StorageEntryModifier, StorageHasher,
    TypeId, TypeTable, Variant as VariantDef,
};
use std::collections::HashMap;

/// Address format used if the runtime does not declare `System.SS58Prefix`.
pub const DEFAULT_SS58_PREFIX: u16 = 42;

/// A dispatchable call, resolved by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDescriptor {
    pub pallet: String,
    pub pallet_index: u8,
    pub name: String,
    pub call_index: u8,
    /// Parameters in wire order.
    pub params: Vec<(String, TypeId)>,
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageDescriptor {
    pub pallet: String,
    pub prefix: String,
    pub name: String,
    pub modifier: StorageEntryModifier,
    pub hashers: Vec<StorageHasher>,
    pub keys: Vec<TypeId>,
    pub value: TypeId,
    pub default: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantDescriptor {
    pub pallet: String,
    pub name: String,
    pub ty: TypeId,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct PalletDescriptor {
    pub name: String,
    pub index: u8,
    pub events: Option<TypeId>,
    pub errors: Option<TypeId>,
    calls: HashMap<String, CallDescriptor>,
    call_names: HashMap<u8, String>,
    storage: HashMap<String, StorageDescriptor>,
    constants: HashMap<String, ConstantDescriptor>,
}

impl PalletDescriptor {
    pub fn call(&self, name: &str) -> Option<&CallDescriptor> {
        self.calls.get(name)
    }
    pub fn call_by_index(&self, index: u8) -> Option<&CallDescriptor> {
        self.call_names
            .get(&index)
            .and_then(|name| self.calls.get(name))
    }
    pub fn calls(&self) -> impl Iterator<Item = &CallDescriptor> {
        self.calls.values()
    }
    pub fn storage(&self, name: &str) -> Option<&StorageDescriptor> {
        self.storage.get(name)
    }
    pub fn constant(&self, name: &str) -> Option<&ConstantDescriptor> {
        self.constants.get(name)
    }
}

/// An event or error variant together with its pallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantDescriptor<'a> {
    pub pallet: &'a str,
    pub pallet_index: u8,
    pub variant: &'a VariantDef,
}

/// A call to be dispatched, with its arguments given either by parameter name
/// or positionally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub pallet: String,
    pub name: String,
    pub args: Composite,
}

impl Call {
    pub fn new<P, N, A>(pallet: P, name: N, args: A) -> Self
    where
        P: Into<String>,
        N: Into<String>,
        A: Into<Composite>,
    {
        Call {
            pallet: pallet.into(),
            name: name.into(),
            args: args.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registry {
    metadata: Metadata,
    address_format: Ss58AddressFormat,
    pallets: HashMap<String, PalletDescriptor>,
    pallet_names: HashMap<u8, String>,
}

fn pallet_descriptor(metadata: &Metadata, pallet: &PalletMetadata) -> Result<PalletDescriptor> {
    let mut calls = HashMap::new();
    let mut call_names = HashMap::new();

    if let Some(ty) = pallet.calls {
        for variant in metadata.variants(ty)? {
            let params = variant
                .fields
                .iter()
                .enumerate()
                .map(|(idx, field)| {
                    let name = field.name.clone().unwrap_or_else(|| idx.to_string());
                    (name, field.ty)
                })
                .collect();

            call_names.insert(variant.index, variant.name.clone());
            calls.insert(
                variant.name.clone(),
                CallDescriptor {
                    pallet: pallet.name.clone(),
                    pallet_index: pallet.index,
                    name: variant.name.clone(),
                    call_index: variant.index,
                    params,
                    docs: variant.docs.clone(),
                },
            );
        }
    }

    let storage = pallet
        .storage
        .iter()
        .flat_map(|storage| {
            storage.entries.iter().map(move |entry| {
                (
                    entry.name.clone(),
                    StorageDescriptor {
                        pallet: pallet.name.clone(),
                        prefix: storage.prefix.clone(),
                        name: entry.name.clone(),
                        modifier: entry.modifier,
                        hashers: entry.hashers.clone(),
                        keys: entry.keys.clone(),
                        value: entry.value,
                        default: entry.default.clone(),
                    },
                )
            })
        })
        .collect();

    let constants = pallet
        .constants
        .iter()
        .map(|constant| {
            (
                constant.name.clone(),
                ConstantDescriptor {
                    pallet: pallet.name.clone(),
                    name: constant.name.clone(),
                    ty: constant.ty,
                    value: constant.value.clone(),
                },
            )
        })
        .collect();

    Ok(PalletDescriptor {
        name: pallet.name.clone(),
        index: pallet.index,
        events: pallet.events,
        errors: pallet.errors,
        calls,
        call_names,
        storage,
        constants,
    })
}

/// Applies `hasher` to the encoded storage key.
pub fn hash_key(hasher: StorageHasher, encoded: &[u8], dest: &mut Vec<u8>) {
    match hasher {
        StorageHasher::Blake2_128 => dest.extend_from_slice(&blake2b::<16>(encoded)),
        StorageHasher::Blake2_256 => dest.extend_from_slice(&blake2b::<32>(encoded)),
        StorageHasher::Blake2_128Concat => {
            dest.extend_from_slice(&blake2b::<16>(encoded));
            dest.extend_from_slice(encoded);
        }
        StorageHasher::Twox128 => dest.extend_from_slice(&sp_crypto_hashing::twox_128(encoded)),
        StorageHasher::Twox256 => dest.extend_from_slice(&sp_crypto_hashing::twox_256(encoded)),
        StorageHasher::Twox64Concat => {
            dest.extend_from_slice(&sp_crypto_hashing::twox_64(encoded));
            dest.extend_from_slice(encoded);
        }
        StorageHasher::Identity => dest.extend_from_slice(encoded),
    }
}

impl Registry {
    pub fn new(metadata: Metadata) -> Result<Self> {
        let mut pallets = HashMap::with_capacity(metadata.pallets.len());
        let mut pallet_names = HashMap::with_capacity(metadata.pallets.len());

        for pallet in &metadata.pallets {
            pallet_names.insert(pallet.index, pallet.name.clone());
            pallets.insert(pallet.name.clone(), pallet_descriptor(&metadata, pallet)?);
        }

        let mut registry = Registry {
            metadata,
            address_format: DEFAULT_SS58_PREFIX.into(),
            pallets,
            pallet_names,
        };

        if registry.find_constant("System", "SS58Prefix").is_some() {
            let prefix = registry.constant("System", "SS58Prefix")?;
            let prefix = prefix
                .as_u128()
                .and_then(|prefix| u16::try_from(prefix).ok())
                .ok_or_else(|| {
                    Error::Metadata(kite_metadata::Error::InvalidMetadata(format!(
                        "invalid SS58 prefix {:?}",
                        prefix
                    )))
                })?;

            registry.address_format = prefix.into();
        }

        log::debug!(
            "Built registry for metadata V{}: {} pallets, {} types, address format {}",
            registry.metadata.version,
            registry.pallets.len(),
            registry.metadata.types.len(),
            registry.address_format
        );

        Ok(registry)
    }
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
    pub fn types(&self) -> &TypeTable {
        &self.metadata.types
    }
    pub fn extrinsic_format(&self) -> &ExtrinsicFormat {
        &self.metadata.extrinsic
    }
    pub fn address_format(&self) -> Ss58AddressFormat {
        self.address_format
    }
    pub fn resolve(&self, ty: TypeId) -> Result<&RuntimeType> {
        Ok(self.metadata.types.resolve(ty)?)
    }
    pub fn find_pallet(&self, name: &str) -> Option<&PalletDescriptor> {
        self.pallets.get(name)
    }
    pub fn pallet_by_index(&self, index: u8) -> Option<&PalletDescriptor> {
        self.pallet_names
            .get(&index)
            .and_then(|name| self.pallets.get(name))
    }
    pub fn find_call(&self, pallet: &str, call: &str) -> Option<&CallDescriptor> {
        self.find_pallet(pallet).and_then(|p| p.call(call))
    }
    pub fn find_storage_key(&self, pallet: &str, item: &str) -> Option<&StorageDescriptor> {
        self.find_pallet(pallet).and_then(|p| p.storage(item))
    }
    pub fn find_constant(&self, pallet: &str, name: &str) -> Option<&ConstantDescriptor> {
        self.find_pallet(pallet).and_then(|p| p.constant(name))
    }
    pub fn call_by_index(&self, pallet: u8, call: u8) -> Option<&CallDescriptor> {
        self.pallet_by_index(pallet)
            .and_then(|p| p.call_by_index(call))
    }
    fn variant_by_index(
        &self,
        pallet: u8,
        index: u8,
        ty: impl Fn(&PalletDescriptor) -> Option<TypeId>,
    ) -> Result<Option<VariantDescriptor<'_>>> {
        let descriptor = match self.pallet_by_index(pallet) {
            Some(descriptor) => descriptor,
            None => return Ok(None),
        };

        let ty = match ty(descriptor) {
            Some(ty) => ty,
            None => return Ok(None),
        };

        Ok(self
            .metadata
            .variants(ty)?
            .iter()
            .find(|variant| variant.index == index)
            .map(|variant| VariantDescriptor {
                pallet: descriptor.name.as_str(),
                pallet_index: descriptor.index,
                variant,
            }))
    }
    /// The event emitted by pallet `pallet` with variant index `index`.
    pub fn event_by_index(&self, pallet: u8, index: u8) -> Result<Option<VariantDescriptor<'_>>> {
        self.variant_by_index(pallet, index, |p| p.events)
    }
    pub fn error_by_index(&self, pallet: u8, index: u8) -> Result<Option<VariantDescriptor<'_>>> {
        self.variant_by_index(pallet, index, |p| p.errors)
    }
    pub fn encode_to(&self, ty: TypeId, value: &Value, dest: &mut Vec<u8>) -> Result<()> {
        codec::encode_to(self.types(), ty, value, dest)
    }
    pub fn encode(&self, ty: TypeId, value: &Value) -> Result<Vec<u8>> {
        codec::encode(self.types(), ty, value)
    }
    pub fn decode(&self, ty: TypeId, input: &mut &[u8]) -> Result<Value> {
        codec::decode(self.types(), ty, input)
    }
    /// Decodes a value which must span all of `input`.
    pub fn decode_all(&self, ty: TypeId, input: &[u8]) -> Result<Value> {
        codec::decode_all(self.types(), ty, input)
    }
    /// Pairs the call's arguments with the parameter types, in wire order.
    fn bind_args(&self, descriptor: &CallDescriptor, args: &Composite) -> Result<Chain<TypedValue>> {
        let mismatch = |reason: String| Error::ParameterMismatch {
            call: format!("{}::{}", descriptor.pallet, descriptor.name),
            reason,
        };

        if args.len() != descriptor.params.len() {
            return Err(mismatch(format!(
                "expected {} arguments, got {}",
                descriptor.params.len(),
                args.len()
            )));
        }

        match args {
            Composite::Named(fields) => {
                if let Some((name, _)) = fields
                    .iter()
                    .find(|(name, _)| !descriptor.params.iter().any(|(param, _)| param == name))
                {
                    return Err(mismatch(format!("unknown parameter `{}`", name)));
                }

                descriptor
                    .params
                    .iter()
                    .map(|(name, ty)| {
                        args.get(name)
                            .map(|value| TypedValue::new(*ty, value.clone()))
                            .ok_or_else(|| mismatch(format!("missing parameter `{}`", name)))
                    })
                    .collect()
            }
            Composite::Unnamed(values) => Ok(descriptor
                .params
                .iter()
                .zip(values)
                .map(|((_, ty), value)| TypedValue::new(*ty, value.clone()))
                .collect()),
        }
    }
    /// Encodes the pallet index, the call index and the arguments.
    pub fn encode_call(&self, call: &Call) -> Result<Vec<u8>> {
        let descriptor =
            self.find_call(&call.pallet, &call.name)
                .ok_or_else(|| Error::CallNotFound {
                    pallet: call.pallet.clone(),
                    call: call.name.clone(),
                })?;

        let mut dest = vec![descriptor.pallet_index, descriptor.call_index];
        self.bind_args(descriptor, &call.args)?
            .encode_to(self, &mut dest)?;

        Ok(dest)
    }
    /// Decodes a call as produced by [`Registry::encode_call`], which must
    /// span all of `bytes`. Arguments are named by their parameters.
    pub fn decode_call(&self, bytes: &[u8]) -> Result<Call> {
        let mut input = bytes;
        let call = self.decode_call_from(&mut input)?;

        if !input.is_empty() {
            return Err(Error::TrailingBytes {
                ty: self.extrinsic_format().call_ty.unwrap_or(TypeId(0)),
                consumed: bytes.len() - input.len(),
                remaining: input.len(),
            });
        }

        Ok(call)
    }
    /// Like [`Registry::decode_call`], but only advances `input` past the
    /// call.
    pub fn decode_call_from(&self, input: &mut &[u8]) -> Result<Call> {
        let (pallet_index, call_index) = match *input {
            [pallet, call, ..] => (*pallet, *call),
            _ => {
                return Err(Error::UnexpectedEof {
                    ty: self.extrinsic_format().call_ty.unwrap_or(TypeId(0)),
                    needed: 2,
                    available: input.len(),
                })
            }
        };
        *input = &input[2..];

        let descriptor =
            self.call_by_index(pallet_index, call_index)
                .ok_or_else(|| Error::CallNotFound {
                    pallet: format!("#{}", pallet_index),
                    call: format!("#{}", call_index),
                })?;

        let mut chain: Chain<TypedValue> = descriptor
            .params
            .iter()
            .map(|(_, ty)| TypedValue::empty(*ty))
            .collect();
        chain.decode_from(self, input)?;

        let args = descriptor
            .params
            .iter()
            .zip(chain.into_inner())
            .map(|((name, _), tv)| (name.clone(), tv.value))
            .collect::<Vec<_>>();

        Ok(Call::new(
            descriptor.pallet.clone(),
            descriptor.name.clone(),
            args,
        ))
    }
    /// The storage key of `pallet::item`. `keys` may be a prefix of the
    /// declared keys, which yields the key prefix for iteration.
    pub fn storage_key(&self, pallet: &str, item: &str, keys: &[Value]) -> Result<Vec<u8>> {
        let descriptor =
            self.find_storage_key(pallet, item)
                .ok_or_else(|| Error::StorageNotFound {
                    pallet: pallet.to_string(),
                    item: item.to_string(),
                })?;

        if keys.len() > descriptor.keys.len() {
            return Err(Error::ParameterMismatch {
                call: format!("{}::{}", pallet, item),
                reason: format!(
                    "expected at most {} keys, got {}",
                    descriptor.keys.len(),
                    keys.len()
                ),
            });
        }

        let mut dest = vec![];
        dest.extend_from_slice(&sp_crypto_hashing::twox_128(descriptor.prefix.as_bytes()));
        dest.extend_from_slice(&sp_crypto_hashing::twox_128(descriptor.name.as_bytes()));

        for ((key, ty), hasher) in keys
            .iter()
            .zip(&descriptor.keys)
            .zip(&descriptor.hashers)
        {
            hash_key(*hasher, &self.encode(*ty, key)?, &mut dest);
        }

        Ok(dest)
    }
    /// Decodes a storage value as returned by the node. Missing values of
    /// entries with a default decode to that default.
    pub fn decode_storage_value(
        &self,
        pallet: &str,
        item: &str,
        raw: Option<&[u8]>,
    ) -> Result<Option<Value>> {
        let descriptor =
            self.find_storage_key(pallet, item)
                .ok_or_else(|| Error::StorageNotFound {
                    pallet: pallet.to_string(),
                    item: item.to_string(),
                })?;

        match (raw, descriptor.modifier) {
            (Some(raw), _) => self.decode_all(descriptor.value, raw).map(Some),
            (None, StorageEntryModifier::Default) => self
                .decode_all(descriptor.value, &descriptor.default)
                .map(Some),
            (None, StorageEntryModifier::Optional) => Ok(None),
        }
    }
    pub fn constant(&self, pallet: &str, name: &str) -> Result<Value> {
        let descriptor =
            self.find_constant(pallet, name)
                .ok_or_else(|| Error::ConstantNotFound {
                    pallet: pallet.to_string(),
                    name: name.to_string(),
                })?;

        self.decode_all(descriptor.ty, &descriptor.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{self, ids};
    use crate::value::Variant;

    fn transfer(dest: [u8; 32], value: u128) -> Call {
        Call::new(
            "Balances",
            "transfer_allow_death",
            vec![
                ("dest", Value::variant("Id", vec![Value::bytes(dest)])),
                ("value", Value::u128(value)),
            ],
        )
    }

    #[test]
    fn lookups_by_name_and_index() {
        let registry = test_utils::registry();

        let call = registry
            .find_call("Balances", "transfer_allow_death")
            .unwrap();
        assert_eq!(call.pallet_index, 5);
        assert_eq!(call.call_index, 0);
        assert_eq!(
            call.params,
            vec![
                ("dest".to_string(), ids::MULTI_ADDRESS),
                ("value".to_string(), ids::COMPACT_U128)
            ]
        );
        assert_eq!(registry.call_by_index(5, 0), Some(call));
        assert!(registry.find_call("Balances", "transfer").is_none());
        assert!(registry.find_call("Staking", "bond").is_none());

        let event = registry.event_by_index(5, 2).unwrap().unwrap();
        assert_eq!(event.pallet, "Balances");
        assert_eq!(event.variant.name, "Transfer");
        assert!(registry.event_by_index(5, 9).unwrap().is_none());

        let error = registry.error_by_index(5, 2).unwrap().unwrap();
        assert_eq!(error.variant.name, "InsufficientBalance");

        assert_eq!(u16::from(registry.address_format()), 42);
    }

    #[test]
    fn encode_call_by_name_and_position() {
        let registry = test_utils::registry();

        let encoded = registry.encode_call(&transfer([1; 32], 64)).unwrap();
        let mut expected = vec![5, 0, 0];
        expected.extend_from_slice(&[1; 32]);
        expected.extend_from_slice(&[0x01, 0x01]);
        assert_eq!(encoded, expected);

        // Named arguments in any order, positional in wire order.
        let swapped = Call::new(
            "Balances",
            "transfer_allow_death",
            vec![
                ("value", Value::u128(64)),
                ("dest", Value::variant("Id", vec![Value::bytes([1; 32])])),
            ],
        );
        assert_eq!(registry.encode_call(&swapped).unwrap(), expected);

        let positional = Call::new(
            "Balances",
            "transfer_allow_death",
            vec![
                Value::Variant(Variant::with_index(0, vec![Value::bytes([1; 32])])),
                Value::u128(64),
            ],
        );
        assert_eq!(registry.encode_call(&positional).unwrap(), expected);

        let decoded = registry.decode_call(&encoded).unwrap();
        assert_eq!(decoded.pallet, "Balances");
        assert_eq!(decoded.name, "transfer_allow_death");
        assert_eq!(decoded.args.get("value"), Some(&Value::u128(64)));

        let mut input = encoded.clone();
        input.push(0xff);
        match registry.decode_call(&input) {
            Err(Error::TrailingBytes {
                consumed, remaining, ..
            }) => {
                assert_eq!(consumed, encoded.len());
                assert_eq!(remaining, 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let mut cursor = input.as_slice();
        assert_eq!(registry.decode_call_from(&mut cursor).unwrap(), decoded);
        assert_eq!(cursor, &[0xff]);
    }

    #[test]
    fn call_errors() {
        let registry = test_utils::registry();

        assert!(matches!(
            registry.encode_call(&Call::new("Balances", "burn", Composite::default())),
            Err(Error::CallNotFound { .. })
        ));

        let missing = Call::new(
            "Balances",
            "transfer_allow_death",
            vec![("dest", Value::bytes([1; 32]))],
        );
        assert!(matches!(
            registry.encode_call(&missing),
            Err(Error::ParameterMismatch { .. })
        ));

        let misnamed = Call::new(
            "Balances",
            "transfer_allow_death",
            vec![
                ("dest", Value::variant("Id", vec![Value::bytes([1; 32])])),
                ("amount", Value::u128(1)),
            ],
        );
        assert!(matches!(
            registry.encode_call(&misnamed),
            Err(Error::ParameterMismatch { .. })
        ));

        // Negative balance.
        let negative = Call::new(
            "Balances",
            "transfer_allow_death",
            vec![
                ("dest", Value::variant("Id", vec![Value::bytes([1; 32])])),
                ("value", Value::i128(-1)),
            ],
        );
        assert!(matches!(
            registry.encode_call(&negative),
            Err(Error::ValueShapeMismatch { .. })
        ));

        assert!(matches!(
            registry.decode_call(&[9, 9]),
            Err(Error::CallNotFound { .. })
        ));
    }

    #[test]
    fn storage_keys() {
        let registry = test_utils::registry();

        let prefix = registry.storage_key("System", "Account", &[]).unwrap();
        assert_eq!(
            hex::encode(&prefix),
            "26aa394eea5630e07c48ae0c9558cef7b99d880ec681799c0cf30e8886371da9"
        );

        let key = registry
            .storage_key("System", "Account", &[Value::bytes([7; 32])])
            .unwrap();
        assert_eq!(key.len(), 32 + 16 + 32);
        assert_eq!(&key[..32], prefix.as_slice());
        assert_eq!(&key[32..48], &blake2b::<16>(&[7; 32]));
        assert_eq!(&key[48..], &[7; 32]);

        assert!(matches!(
            registry.storage_key("System", "Account", &[Value::bytes([7; 32]), Value::u128(1)]),
            Err(Error::ParameterMismatch { .. })
        ));
        assert!(matches!(
            registry.storage_key("System", "Events", &[]),
            Err(Error::StorageNotFound { .. })
        ));
    }

    #[test]
    fn hashers() {
        let mut dest = vec![];
        hash_key(StorageHasher::Twox64Concat, &[1, 2], &mut dest);
        assert_eq!(dest.len(), 10);
        assert_eq!(&dest[8..], &[1, 2]);

        let mut dest = vec![];
        hash_key(StorageHasher::Identity, &[1, 2], &mut dest);
        assert_eq!(dest, vec![1, 2]);

        let mut dest = vec![];
        hash_key(StorageHasher::Twox128, b"System", &mut dest);
        assert_eq!(hex::encode(dest), "26aa394eea5630e07c48ae0c9558cef7");
    }

    #[test]
    fn storage_values_and_constants() {
        let registry = test_utils::registry();

        // Default modifier: a missing value decodes to the default.
        let default = registry
            .decode_storage_value("System", "Account", None)
            .unwrap()
            .unwrap();
        assert_eq!(
            default,
            Value::named_composite(vec![("nonce", Value::u128(0)), ("free", Value::u128(0))])
        );

        let mut raw = 3u32.to_le_bytes().to_vec();
        raw.extend_from_slice(&100u128.to_le_bytes());
        let info = registry
            .decode_storage_value("System", "Account", Some(&raw))
            .unwrap()
            .unwrap();
        assert_eq!(info.as_composite().unwrap().get("nonce"), Some(&Value::u128(3)));

        raw.push(0);
        assert!(matches!(
            registry.decode_storage_value("System", "Account", Some(&raw)),
            Err(Error::TrailingBytes { .. })
        ));

        assert_eq!(
            registry.constant("Balances", "ExistentialDeposit").unwrap(),
            Value::u128(500)
        );
        assert!(matches!(
            registry.constant("Balances", "MaxLocks"),
            Err(Error::ConstantNotFound { .. })
        ));
    }
}
