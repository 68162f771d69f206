use crate::legacy::{LegacyTypes, Resolver, TypeExpr};
use crate::ty::{Field, RuntimeType, TypeEntry, TypeId, Variant};
use crate::{
    ConstantMetadata, ExtrinsicFormat, Metadata, PalletMetadata, PalletStorage, Result,
    SignedExtensionMetadata, StorageEntryModifier, StorageHasher,
};
use parity_scale_codec::{Decode, Encode};

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct MetadataV13 {
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
    NMap {
        keys: String,
        hashers: Vec<StorageHasher>,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct FunctionMetadata {
    pub name: String,
    pub arguments: Vec<FunctionArgumentMetadata>,
    pub documentation: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct FunctionArgumentMetadata {
    pub name: String,
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct EventMetadata {
    pub name: String,
    pub arguments: Vec<String>,
    pub documentation: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct ModuleConstantMetadata {
    pub name: String,
    pub ty: String,
    pub value: Vec<u8>,
    pub documentation: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct ErrorMetadata {
    pub name: String,
    pub documentation: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct ExtrinsicMetadata {
    pub version: u8,
    pub signed_extensions: Vec<String>,
}

impl MetadataV13 {
    pub fn into_metadata(self, legacy: &LegacyTypes) -> Result<Metadata> {
        convert(13, self.modules, self.extrinsic, legacy)
    }
}

/// Converts the module list shared by V12 and V13 into the unified model.
pub(crate) fn convert(
    version: u32,
    modules: Vec<ModuleMetadata>,
    extrinsic: ExtrinsicMetadata,
    legacy: &LegacyTypes,
) -> Result<Metadata> {
    let mut resolver = legacy.resolver();

    // Call arguments like `Box<<T as Config>::Call>` refer to the outer call
    // enum, which is only known once all modules were processed.
    let outer_call = resolver.reserve("Call");
    let mut outer_variants = vec![];
    let mut pallets = vec![];

    for module in modules {
        let calls = match module.calls {
            Some(calls) => {
                let mut variants = vec![];
                for (idx, call) in calls.into_iter().enumerate() {
                    let mut fields = vec![];
                    for arg in call.arguments {
                        fields.push(Field {
                            name: Some(arg.name),
                            ty: resolver.resolve(&arg.ty)?,
                            type_name: Some(arg.ty),
                        });
                    }

                    variants.push(Variant {
                        index: idx as u8,
                        name: call.name,
                        fields,
                        docs: call.documentation,
                    });
                }

                let id = resolver.push(
                    TypeEntry::new(RuntimeType::Variant(variants))
                        .with_path([module.name.as_str(), "Call"]),
                );

                outer_variants.push(Variant {
                    index: module.index,
                    name: module.name.clone(),
                    fields: vec![Field::unnamed(id)],
                    docs: vec![],
                });

                Some(id)
            }
            None => None,
        };

        let events = match module.events {
            Some(events) => {
                let mut variants = vec![];
                for (idx, event) in events.into_iter().enumerate() {
                    let mut fields = vec![];
                    for arg in event.arguments {
                        fields.push(Field {
                            name: None,
                            ty: resolver.resolve(&arg)?,
                            type_name: Some(arg),
                        });
                    }

                    variants.push(Variant {
                        index: idx as u8,
                        name: event.name,
                        fields,
                        docs: event.documentation,
                    });
                }

                Some(resolver.push(
                    TypeEntry::new(RuntimeType::Variant(variants))
                        .with_path([module.name.as_str(), "Event"]),
                ))
            }
            None => None,
        };

        let errors = if module.errors.is_empty() {
            None
        } else {
            let variants = module
                .errors
                .into_iter()
                .enumerate()
                .map(|(idx, error)| Variant {
                    index: idx as u8,
                    name: error.name,
                    fields: vec![],
                    docs: error.documentation,
                })
                .collect();

            Some(resolver.push(
                TypeEntry::new(RuntimeType::Variant(variants))
                    .with_path([module.name.as_str(), "Error"]),
            ))
        };

        let mut constants = vec![];
        for constant in module.constants {
            constants.push(ConstantMetadata {
                name: constant.name,
                ty: resolver.resolve(&constant.ty)?,
                value: constant.value,
                docs: constant.documentation,
            });
        }

        let storage = match module.storage {
            Some(storage) => {
                let mut entries = vec![];
                for entry in storage.entries {
                    entries.push(convert_storage_entry(&mut resolver, entry)?);
                }

                Some(PalletStorage {
                    prefix: storage.prefix,
                    entries,
                })
            }
            None => None,
        };

        pallets.push(PalletMetadata {
            name: module.name,
            index: module.index,
            storage,
            calls,
            events,
            errors,
            constants,
        });
    }

    resolver.define(
        outer_call,
        TypeEntry::new(RuntimeType::Variant(outer_variants)).with_path(["Call"]),
    );

    let address_ty = resolver.resolve("Address")?;
    let signature_ty = resolver.resolve("Signature")?;

    let mut signed_extensions = vec![];
    for identifier in extrinsic.signed_extensions {
        let (ty, additional_signed) = match resolver.legacy().signed_extension(&identifier) {
            Some((extra, additional)) => (resolver.resolve(extra)?, resolver.resolve(additional)?),
            None => {
                log::debug!("No type information for signed extension {}", identifier);
                (
                    resolver.reserve(&format!("{}::extra", identifier)),
                    resolver.reserve(&format!("{}::additional_signed", identifier)),
                )
            }
        };

        signed_extensions.push(SignedExtensionMetadata {
            identifier,
            ty,
            additional_signed,
        });
    }

    Ok(Metadata {
        version,
        types: resolver.finish(),
        pallets,
        extrinsic: ExtrinsicFormat {
            version: extrinsic.version,
            address_ty: Some(address_ty),
            call_ty: Some(outer_call),
            signature_ty: Some(signature_ty),
            signed_extensions,
        },
    })
}

fn convert_storage_entry(
    resolver: &mut Resolver<'_>,
    entry: StorageEntryMetadata,
) -> Result<crate::StorageEntryMetadata> {
    let (hashers, keys, value) = match entry.ty {
        StorageEntryType::Plain(value) => (vec![], vec![], resolver.resolve(&value)?),
        StorageEntryType::Map {
            hasher, key, value, ..
        } => (
            vec![hasher],
            vec![resolver.resolve(&key)?],
            resolver.resolve(&value)?,
        ),
        StorageEntryType::DoubleMap {
            hasher,
            key1,
            key2,
            value,
            key2_hasher,
        } => (
            vec![hasher, key2_hasher],
            vec![resolver.resolve(&key1)?, resolver.resolve(&key2)?],
            resolver.resolve(&value)?,
        ),
        StorageEntryType::NMap {
            keys,
            hashers,
            value,
        } => {
            let keys = match TypeExpr::parse(&keys)? {
                TypeExpr::Tuple(elems) if hashers.len() > 1 => elems
                    .iter()
                    .map(|elem| resolver.resolve(&elem.to_string()))
                    .collect::<Result<Vec<TypeId>>>()?,
                _ => vec![resolver.resolve(&keys)?],
            };

            (hashers, keys, resolver.resolve(&value)?)
        }
    };

    Ok(crate::StorageEntryMetadata {
        name: entry.name,
        modifier: entry.modifier,
        hashers,
        keys,
        value,
        default: entry.default,
        docs: entry.documentation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::Primitive;
    use crate::version::lookup;
    use crate::{parse_raw_metadata, Error};

    fn balances_module() -> ModuleMetadata {
        ModuleMetadata {
            name: "Balances".into(),
            storage: Some(StorageMetadata {
                prefix: "Balances".into(),
                entries: vec![
                    StorageEntryMetadata {
                        name: "TotalIssuance".into(),
                        modifier: StorageEntryModifier::Default,
                        ty: StorageEntryType::Plain("T::Balance".into()),
                        default: vec![0; 16],
                        documentation: vec![],
                    },
                    StorageEntryMetadata {
                        name: "Locks".into(),
                        modifier: StorageEntryModifier::Optional,
                        ty: StorageEntryType::NMap {
                            keys: "(T::AccountId, LockIdentifier)".into(),
                            hashers: vec![StorageHasher::Blake2_128Concat, StorageHasher::Twox64Concat],
                            value: "T::Balance".into(),
                        },
                        default: vec![0],
                        documentation: vec![],
                    },
                ],
            }),
            calls: Some(vec![
                FunctionMetadata {
                    name: "transfer".into(),
                    arguments: vec![
                        FunctionArgumentMetadata {
                            name: "dest".into(),
                            ty: "<T::Lookup as StaticLookup>::Source".into(),
                        },
                        FunctionArgumentMetadata {
                            name: "value".into(),
                            ty: "Compact<T::Balance>".into(),
                        },
                    ],
                    documentation: vec![" Transfer some liquid free balance.".into()],
                },
                FunctionMetadata {
                    name: "set_vote".into(),
                    arguments: vec![FunctionArgumentMetadata {
                        name: "threshold".into(),
                        ty: "VoteThreshold".into(),
                    }],
                    documentation: vec![],
                },
            ]),
            events: Some(vec![EventMetadata {
                name: "Transfer".into(),
                arguments: vec!["AccountId".into(), "AccountId".into(), "Balance".into()],
                documentation: vec![],
            }]),
            constants: vec![ModuleConstantMetadata {
                name: "ExistentialDeposit".into(),
                ty: "T::Balance".into(),
                value: 500u128.encode(),
                documentation: vec![],
            }],
            errors: vec![ErrorMetadata {
                name: "InsufficientBalance".into(),
                documentation: vec![],
            }],
            index: 5,
        }
    }

    fn sudo_module() -> ModuleMetadata {
        ModuleMetadata {
            name: "Sudo".into(),
            storage: None,
            calls: Some(vec![FunctionMetadata {
                name: "sudo".into(),
                arguments: vec![FunctionArgumentMetadata {
                    name: "call".into(),
                    ty: "Box<<T as Config>::Call>".into(),
                }],
                documentation: vec![],
            }]),
            events: None,
            constants: vec![],
            errors: vec![],
            index: 9,
        }
    }

    fn parse(meta: &MetadataV13) -> Result<Metadata> {
        let mut raw = b"meta".to_vec();
        raw.push(13);
        raw.extend(meta.encode());
        parse_raw_metadata(raw)
    }

    fn metadata() -> Metadata {
        let meta = MetadataV13 {
            modules: vec![balances_module(), sudo_module()],
            extrinsic: ExtrinsicMetadata {
                version: 4,
                signed_extensions: vec![
                    "CheckSpecVersion".into(),
                    "CheckNonce".into(),
                    "CheckUnknown".into(),
                ],
            },
        };

        parse(&meta).unwrap()
    }

    #[test]
    fn calls_use_positional_indexes() {
        let metadata = metadata();
        assert_eq!(metadata.version, 13);

        assert_eq!(lookup::pallet(&metadata, "Balances").index, 5);

        let transfer = lookup::call(&metadata, "Balances", "transfer");
        assert_eq!(transfer.index, 0);
        assert_eq!(
            transfer
                .fields
                .iter()
                .map(|field| field.name.as_deref())
                .collect::<Vec<_>>(),
            vec![Some("dest"), Some("value")]
        );

        let value = metadata.types.resolve(transfer.fields[1].ty).unwrap();
        assert!(matches!(value, RuntimeType::Compact(_)));

        let set_vote = lookup::call(&metadata, "Balances", "set_vote");
        assert_eq!(set_vote.index, 1);

        // Resolution of unknown types is deferred until use.
        assert!(matches!(
            metadata.types.resolve(set_vote.fields[0].ty),
            Err(Error::UnknownTypeId { .. })
        ));
    }

    #[test]
    fn outer_call_lists_pallets() {
        let metadata = metadata();
        let call_ty = metadata.extrinsic.call_ty.unwrap();
        let variants = metadata.variants(call_ty).unwrap();

        assert_eq!(
            variants
                .iter()
                .map(|v| (v.index, v.name.as_str()))
                .collect::<Vec<_>>(),
            vec![(5, "Balances"), (9, "Sudo")]
        );

        // `Box<Call>` resolves to the outer call enum.
        let sudo = lookup::call(&metadata, "Sudo", "sudo");
        assert_eq!(sudo.fields[0].ty, call_ty);
    }

    #[test]
    fn storage_and_constants() {
        let metadata = metadata();

        let (storage, locks) = lookup::storage(&metadata, "Balances", "Locks");
        assert_eq!(storage.prefix, "Balances");
        assert_eq!(locks.keys.len(), 2);
        assert_eq!(locks.hashers.len(), 2);

        let (_, total) = lookup::storage(&metadata, "Balances", "TotalIssuance");
        assert!(total.keys.is_empty());
        assert_eq!(
            metadata.types.resolve(total.value).unwrap(),
            &RuntimeType::Primitive(Primitive::U128)
        );

        let balances = lookup::pallet(&metadata, "Balances");
        assert_eq!(balances.constants[0].value, 500u128.encode());
        assert!(balances.errors.is_some());
        assert!(lookup::pallet(&metadata, "Sudo").errors.is_none());
    }

    #[test]
    fn signed_extensions_keep_order() {
        let metadata = metadata();
        let exts = &metadata.extrinsic.signed_extensions;

        assert_eq!(
            exts.iter().map(|e| e.identifier.as_str()).collect::<Vec<_>>(),
            vec!["CheckSpecVersion", "CheckNonce", "CheckUnknown"]
        );
        assert_eq!(
            metadata.types.resolve(exts[0].additional_signed).unwrap(),
            &RuntimeType::Primitive(Primitive::U32)
        );
        assert!(metadata.types.resolve(exts[2].ty).is_err());
    }
}
