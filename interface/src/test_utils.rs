//! A small but realistic V14 runtime shared by the unit tests: `System` at
//! index 0, `Balances` at index 5, `MultiAddress`/`MultiSignature` and the
//! usual signed extensions.

use crate::Registry;
use kite_metadata::version::v14::{
    ExtrinsicMetadata, FieldDef, MetadataV14, PalletConstantMetadata, PalletMetadata,
    PalletStorageMetadata, PortableType, PrimitiveDef, SignedExtensionDef, StorageEntryMetadata,
    StorageEntryType, Sym, Type, TypeDef, TypeParameter, VariantDef,
};
use kite_metadata::{Metadata, StorageEntryModifier, StorageHasher, TypeId};
use parity_scale_codec::Encode;

pub mod ids {
    use kite_metadata::TypeId;

    pub const UNIT: TypeId = TypeId(0);
    pub const BOOL: TypeId = TypeId(1);
    pub const U8: TypeId = TypeId(2);
    pub const U16: TypeId = TypeId(3);
    pub const U32: TypeId = TypeId(4);
    pub const U64: TypeId = TypeId(5);
    pub const U128: TypeId = TypeId(6);
    pub const STR: TypeId = TypeId(7);
    pub const BYTES: TypeId = TypeId(8);
    pub const COMPACT_U32: TypeId = TypeId(9);
    pub const COMPACT_U128: TypeId = TypeId(10);
    pub const ARRAY_4: TypeId = TypeId(11);
    pub const ARRAY_32: TypeId = TypeId(12);
    pub const ARRAY_64: TypeId = TypeId(13);
    pub const ARRAY_65: TypeId = TypeId(14);
    pub const ACCOUNT_ID: TypeId = TypeId(15);
    pub const H256: TypeId = TypeId(16);
    pub const MULTI_ADDRESS: TypeId = TypeId(17);
    pub const MULTI_SIGNATURE: TypeId = TypeId(18);
    pub const SYSTEM_CALL: TypeId = TypeId(19);
    pub const BALANCES_CALL: TypeId = TypeId(20);
    pub const RUNTIME_CALL: TypeId = TypeId(21);
    pub const SYSTEM_EVENT: TypeId = TypeId(22);
    pub const BALANCES_EVENT: TypeId = TypeId(23);
    pub const SYSTEM_ERROR: TypeId = TypeId(24);
    pub const BALANCES_ERROR: TypeId = TypeId(25);
    pub const ACCOUNT_INFO: TypeId = TypeId(26);
    pub const MODULE_ERROR: TypeId = TypeId(27);
    pub const DISPATCH_ERROR: TypeId = TypeId(28);
    pub const ERA: TypeId = TypeId(29);
    pub const CHECK_MORTALITY: TypeId = TypeId(30);
    pub const CHECK_NONCE: TypeId = TypeId(31);
    pub const CHARGE_TX: TypeId = TypeId(32);
    pub const EXTRINSIC: TypeId = TypeId(33);
}

/// Signed extensions of [`registry`], as `(identifier, extra, additional signed)`.
pub const DEFAULT_EXTENSIONS: &[(&str, TypeId, TypeId)] = &[
    ("CheckNonce", ids::CHECK_NONCE, ids::UNIT),
    ("ChargeTransactionPayment", ids::CHARGE_TX, ids::UNIT),
    ("CheckSpecVersion", ids::UNIT, ids::U32),
    ("CheckGenesis", ids::UNIT, ids::H256),
];

fn sym(id: TypeId) -> Sym {
    Sym(id.0)
}

fn named(name: &str, ty: TypeId) -> FieldDef {
    FieldDef {
        name: Some(name.into()),
        ty: sym(ty),
        type_name: None,
        docs: vec![],
    }
}

fn unnamed(ty: TypeId) -> FieldDef {
    FieldDef {
        name: None,
        ty: sym(ty),
        type_name: None,
        docs: vec![],
    }
}

fn variant(index: u8, name: &str, fields: Vec<FieldDef>) -> VariantDef {
    VariantDef {
        name: name.into(),
        fields,
        index,
        docs: vec![],
    }
}

fn prim(prim: PrimitiveDef) -> TypeDef {
    TypeDef::Primitive(prim)
}

fn array(len: u32, of: TypeId) -> TypeDef {
    TypeDef::Array {
        len,
        type_param: sym(of),
    }
}

fn era() -> TypeDef {
    let mut variants = vec![variant(0, "Immortal", vec![])];
    for index in 1..=255u8 {
        variants.push(variant(
            index,
            &format!("Mortal{}", index),
            vec![unnamed(ids::U8)],
        ));
    }
    TypeDef::Variant(variants)
}

fn ty(id: TypeId, path: &[&str], type_def: TypeDef) -> PortableType {
    PortableType {
        id: sym(id),
        ty: Type {
            path: path.iter().map(|s| s.to_string()).collect(),
            type_params: vec![],
            type_def,
            docs: vec![],
        },
    }
}

fn types() -> Vec<PortableType> {
    use self::ids::*;

    let mut types = vec![
        ty(UNIT, &[], TypeDef::Tuple(vec![])),
        ty(BOOL, &[], prim(PrimitiveDef::Bool)),
        ty(U8, &[], prim(PrimitiveDef::U8)),
        ty(U16, &[], prim(PrimitiveDef::U16)),
        ty(U32, &[], prim(PrimitiveDef::U32)),
        ty(U64, &[], prim(PrimitiveDef::U64)),
        ty(U128, &[], prim(PrimitiveDef::U128)),
        ty(STR, &[], prim(PrimitiveDef::Str)),
        ty(BYTES, &[], TypeDef::Sequence(sym(U8))),
        ty(COMPACT_U32, &[], TypeDef::Compact(sym(U32))),
        ty(COMPACT_U128, &[], TypeDef::Compact(sym(U128))),
        ty(ARRAY_4, &[], array(4, U8)),
        ty(ARRAY_32, &[], array(32, U8)),
        ty(ARRAY_64, &[], array(64, U8)),
        ty(ARRAY_65, &[], array(65, U8)),
        ty(
            ACCOUNT_ID,
            &["sp_core", "crypto", "AccountId32"],
            TypeDef::Composite(vec![unnamed(ARRAY_32)]),
        ),
        ty(
            H256,
            &["primitive_types", "H256"],
            TypeDef::Composite(vec![unnamed(ARRAY_32)]),
        ),
        ty(
            MULTI_ADDRESS,
            &["sp_runtime", "multiaddress", "MultiAddress"],
            TypeDef::Variant(vec![
                variant(0, "Id", vec![unnamed(ACCOUNT_ID)]),
                variant(1, "Index", vec![unnamed(COMPACT_U32)]),
                variant(2, "Raw", vec![unnamed(BYTES)]),
                variant(3, "Address32", vec![unnamed(ARRAY_32)]),
            ]),
        ),
        ty(
            MULTI_SIGNATURE,
            &["sp_runtime", "MultiSignature"],
            TypeDef::Variant(vec![
                variant(0, "Ed25519", vec![unnamed(ARRAY_64)]),
                variant(1, "Sr25519", vec![unnamed(ARRAY_64)]),
                variant(2, "Ecdsa", vec![unnamed(ARRAY_65)]),
            ]),
        ),
        ty(
            SYSTEM_CALL,
            &["frame_system", "pallet", "Call"],
            TypeDef::Variant(vec![
                variant(0, "remark", vec![named("remark", BYTES)]),
                variant(1, "set_heap_pages", vec![named("pages", U64)]),
                variant(7, "remark_with_event", vec![named("remark", BYTES)]),
            ]),
        ),
        ty(
            BALANCES_CALL,
            &["pallet_balances", "pallet", "Call"],
            TypeDef::Variant(vec![
                variant(
                    0,
                    "transfer_allow_death",
                    vec![named("dest", MULTI_ADDRESS), named("value", COMPACT_U128)],
                ),
                variant(
                    3,
                    "transfer_keep_alive",
                    vec![named("dest", MULTI_ADDRESS), named("value", COMPACT_U128)],
                ),
            ]),
        ),
        ty(
            RUNTIME_CALL,
            &["kitchensink_runtime", "RuntimeCall"],
            TypeDef::Variant(vec![
                variant(0, "System", vec![unnamed(SYSTEM_CALL)]),
                variant(5, "Balances", vec![unnamed(BALANCES_CALL)]),
            ]),
        ),
        ty(
            SYSTEM_EVENT,
            &["frame_system", "pallet", "Event"],
            TypeDef::Variant(vec![
                variant(0, "ExtrinsicSuccess", vec![]),
                variant(1, "ExtrinsicFailed", vec![named("dispatch_error", DISPATCH_ERROR)]),
                variant(3, "NewAccount", vec![named("account", ACCOUNT_ID)]),
            ]),
        ),
        ty(
            BALANCES_EVENT,
            &["pallet_balances", "pallet", "Event"],
            TypeDef::Variant(vec![
                variant(
                    0,
                    "Endowed",
                    vec![named("account", ACCOUNT_ID), named("free_balance", U128)],
                ),
                variant(
                    1,
                    "DustLost",
                    vec![named("account", ACCOUNT_ID), named("amount", U128)],
                ),
                variant(
                    2,
                    "Transfer",
                    vec![
                        named("from", ACCOUNT_ID),
                        named("to", ACCOUNT_ID),
                        named("amount", U128),
                    ],
                ),
            ]),
        ),
        ty(
            SYSTEM_ERROR,
            &["frame_system", "pallet", "Error"],
            TypeDef::Variant(vec![
                variant(0, "InvalidSpecName", vec![]),
                variant(1, "SpecVersionNeedsToIncrease", vec![]),
                variant(5, "CallFiltered", vec![]),
            ]),
        ),
        ty(
            BALANCES_ERROR,
            &["pallet_balances", "pallet", "Error"],
            TypeDef::Variant(vec![
                variant(0, "VestingBalance", vec![]),
                variant(1, "LiquidityRestrictions", vec![]),
                variant(2, "InsufficientBalance", vec![]),
                variant(3, "ExistentialDeposit", vec![]),
            ]),
        ),
        ty(
            ACCOUNT_INFO,
            &["frame_system", "AccountInfo"],
            TypeDef::Composite(vec![named("nonce", U32), named("free", U128)]),
        ),
        ty(
            MODULE_ERROR,
            &["sp_runtime", "ModuleError"],
            TypeDef::Composite(vec![named("index", U8), named("error", ARRAY_4)]),
        ),
        ty(
            DISPATCH_ERROR,
            &["sp_runtime", "DispatchError"],
            TypeDef::Variant(vec![
                variant(0, "Other", vec![]),
                variant(1, "CannotLookup", vec![]),
                variant(2, "BadOrigin", vec![]),
                variant(3, "Module", vec![unnamed(MODULE_ERROR)]),
            ]),
        ),
        ty(ERA, &["sp_runtime", "generic", "era", "Era"], era()),
        ty(
            CHECK_MORTALITY,
            &["frame_system", "extensions", "check_mortality", "CheckMortality"],
            TypeDef::Composite(vec![unnamed(ERA)]),
        ),
        ty(
            CHECK_NONCE,
            &["frame_system", "extensions", "check_nonce", "CheckNonce"],
            TypeDef::Composite(vec![unnamed(COMPACT_U32)]),
        ),
        ty(
            CHARGE_TX,
            &["pallet_transaction_payment", "ChargeTransactionPayment"],
            TypeDef::Composite(vec![unnamed(COMPACT_U128)]),
        ),
        ty(
            EXTRINSIC,
            &["sp_runtime", "generic", "unchecked_extrinsic", "UncheckedExtrinsic"],
            TypeDef::Sequence(sym(U8)),
        ),
    ];

    let extrinsic = &mut types[EXTRINSIC.0 as usize].ty;
    extrinsic.type_params = [
        ("Address", MULTI_ADDRESS),
        ("Call", RUNTIME_CALL),
        ("Signature", MULTI_SIGNATURE),
        ("Extra", UNIT),
    ]
    .iter()
    .map(|(name, ty)| TypeParameter {
        name: name.to_string(),
        ty: Some(sym(*ty)),
    })
    .collect();

    types
}

fn constant(name: &str, ty: TypeId, value: Vec<u8>) -> PalletConstantMetadata {
    PalletConstantMetadata {
        name: name.into(),
        ty: sym(ty),
        value,
        docs: vec![],
    }
}

fn pallets() -> Vec<PalletMetadata> {
    vec![
        PalletMetadata {
            name: "System".into(),
            storage: Some(PalletStorageMetadata {
                prefix: "System".into(),
                entries: vec![
                    StorageEntryMetadata {
                        name: "Account".into(),
                        modifier: StorageEntryModifier::Default,
                        ty: StorageEntryType::Map {
                            hashers: vec![StorageHasher::Blake2_128Concat],
                            key: sym(ids::ACCOUNT_ID),
                            value: sym(ids::ACCOUNT_INFO),
                        },
                        default: vec![0; 20],
                        docs: vec![" The full account information for a particular account ID.".into()],
                    },
                    StorageEntryMetadata {
                        name: "Number".into(),
                        modifier: StorageEntryModifier::Default,
                        ty: StorageEntryType::Plain(sym(ids::U32)),
                        default: vec![0; 4],
                        docs: vec![],
                    },
                ],
            }),
            calls: Some(sym(ids::SYSTEM_CALL)),
            event: Some(sym(ids::SYSTEM_EVENT)),
            constants: vec![
                constant("BlockHashCount", ids::U32, 2400u32.encode()),
                constant("SS58Prefix", ids::U16, 42u16.encode()),
            ],
            error: Some(sym(ids::SYSTEM_ERROR)),
            index: 0,
        },
        PalletMetadata {
            name: "Balances".into(),
            storage: Some(PalletStorageMetadata {
                prefix: "Balances".into(),
                entries: vec![StorageEntryMetadata {
                    name: "TotalIssuance".into(),
                    modifier: StorageEntryModifier::Default,
                    ty: StorageEntryType::Plain(sym(ids::U128)),
                    default: vec![0; 16],
                    docs: vec![],
                }],
            }),
            calls: Some(sym(ids::BALANCES_CALL)),
            event: Some(sym(ids::BALANCES_EVENT)),
            constants: vec![constant("ExistentialDeposit", ids::U128, 500u128.encode())],
            error: Some(sym(ids::BALANCES_ERROR)),
            index: 5,
        },
    ]
}

pub fn v14_with_extensions(extensions: &[(&str, TypeId, TypeId)]) -> MetadataV14 {
    MetadataV14 {
        types: types(),
        pallets: pallets(),
        extrinsic: ExtrinsicMetadata {
            ty: sym(ids::EXTRINSIC),
            version: 4,
            signed_extensions: extensions
                .iter()
                .map(|(identifier, ty, additional_signed)| SignedExtensionDef {
                    identifier: identifier.to_string(),
                    ty: sym(*ty),
                    additional_signed: sym(*additional_signed),
                })
                .collect(),
        },
        ty: sym(ids::UNIT),
    }
}

pub fn metadata() -> Metadata {
    v14_with_extensions(DEFAULT_EXTENSIONS)
        .into_metadata()
        .unwrap()
}

pub fn registry() -> Registry {
    Registry::new(metadata()).unwrap()
}

pub fn registry_with_extensions(extensions: &[(&str, TypeId, TypeId)]) -> Registry {
    Registry::new(v14_with_extensions(extensions).into_metadata().unwrap()).unwrap()
}

/// The metadata as returned by `state_getMetadata`: magic, version, blob.
pub fn raw_metadata() -> Vec<u8> {
    let mut raw = b"meta".to_vec();
    raw.push(14);
    v14_with_extensions(DEFAULT_EXTENSIONS).encode_to(&mut raw);
    raw
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
