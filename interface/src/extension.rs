//! Signed extensions.
//!
//! Every runtime declares an ordered list of signed extensions in its
//! metadata. Each contributes two values: the *extra*, placed inside the
//! extrinsic, and the *additional signed* data, which is only part of the
//! signing payload. [`ExtensionParams`] binds the built-in extensions to the
//! types the runtime declares, in the runtime's order.

use crate::chain::{Chain, Component};
use crate::common::Era;
use crate::registry::Registry;
use crate::value::{Composite, Value, Variant};
use crate::{Error, Result};
use kite_metadata::SignedExtensionMetadata;
use sp_core::H256;
use std::fmt;

pub trait SignedExtension: fmt::Debug + Send + Sync {
    fn identifier(&self) -> &str;
    /// Value placed on the wire.
    fn extra(&self) -> Value {
        Value::unit()
    }
    /// Value only folded into the signing payload.
    fn additional_signed(&self) -> Value {
        Value::unit()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckNonZeroSender;

impl SignedExtension for CheckNonZeroSender {
    fn identifier(&self) -> &str {
        "CheckNonZeroSender"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckSpecVersion(pub u32);

impl SignedExtension for CheckSpecVersion {
    fn identifier(&self) -> &str {
        "CheckSpecVersion"
    }
    fn additional_signed(&self) -> Value {
        self.0.into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckTxVersion(pub u32);

impl SignedExtension for CheckTxVersion {
    fn identifier(&self) -> &str {
        "CheckTxVersion"
    }
    fn additional_signed(&self) -> Value {
        self.0.into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckGenesis(pub H256);

impl SignedExtension for CheckGenesis {
    fn identifier(&self) -> &str {
        "CheckGenesis"
    }
    fn additional_signed(&self) -> Value {
        Value::bytes(self.0.as_bytes())
    }
}

/// The transaction's era. `checkpoint` is the hash of the era's birth block,
/// or the genesis hash for immortal transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckMortality {
    pub era: Era,
    pub checkpoint: H256,
}

impl SignedExtension for CheckMortality {
    fn identifier(&self) -> &str {
        "CheckMortality"
    }
    fn extra(&self) -> Value {
        self.era.to_value()
    }
    fn additional_signed(&self) -> Value {
        Value::bytes(self.checkpoint.as_bytes())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckNonce(pub u64);

impl SignedExtension for CheckNonce {
    fn identifier(&self) -> &str {
        "CheckNonce"
    }
    fn extra(&self) -> Value {
        self.0.into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckWeight;

impl SignedExtension for CheckWeight {
    fn identifier(&self) -> &str {
        "CheckWeight"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargeTransactionPayment(pub u128);

impl SignedExtension for ChargeTransactionPayment {
    fn identifier(&self) -> &str {
        "ChargeTransactionPayment"
    }
    fn extra(&self) -> Value {
        self.0.into()
    }
}

/// Tip, optionally paid in an asset other than the native token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeAssetTxPayment {
    pub tip: u128,
    pub asset_id: Option<Value>,
}

impl SignedExtension for ChargeAssetTxPayment {
    fn identifier(&self) -> &str {
        "ChargeAssetTxPayment"
    }
    fn extra(&self) -> Value {
        let asset_id = match &self.asset_id {
            Some(id) => Value::some(id.clone()),
            None => Value::none(),
        };

        Value::named_composite(vec![("tip", Value::u128(self.tip)), ("asset_id", asset_id)])
    }
}

/// Commits to the hash of the metadata the transaction was built with. The
/// check is disabled without a hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckMetadataHash {
    pub hash: Option<[u8; 32]>,
}

impl SignedExtension for CheckMetadataHash {
    fn identifier(&self) -> &str {
        "CheckMetadataHash"
    }
    fn extra(&self) -> Value {
        let mode = match self.hash {
            Some(_) => Variant::new(1, "Enabled", Composite::default()),
            None => Variant::new(0, "Disabled", Composite::default()),
        };

        Value::named_composite(vec![("mode", Value::Variant(mode))])
    }
    fn additional_signed(&self) -> Value {
        match self.hash {
            Some(hash) => Value::some(Value::bytes(hash)),
            None => Value::none(),
        }
    }
}

/// An extension given as plain values, for extensions without a built-in
/// counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicExtension {
    pub identifier: String,
    pub extra: Value,
    pub additional_signed: Value,
}

impl DynamicExtension {
    pub fn new<I: Into<String>>(identifier: I, extra: Value, additional_signed: Value) -> Self {
        DynamicExtension {
            identifier: identifier.into(),
            extra,
            additional_signed,
        }
    }
}

impl SignedExtension for DynamicExtension {
    fn identifier(&self) -> &str {
        &self.identifier
    }
    fn extra(&self) -> Value {
        self.extra.clone()
    }
    fn additional_signed(&self) -> Value {
        self.additional_signed.clone()
    }
}

/// An extension bound to the types the runtime declares for it.
#[derive(Debug)]
pub struct BoundExtension {
    pub meta: SignedExtensionMetadata,
    pub ext: Box<dyn SignedExtension>,
}

impl BoundExtension {
    /// An extension whose values are yet to be decoded.
    pub fn placeholder(meta: SignedExtensionMetadata) -> Self {
        let ext = DynamicExtension::new(meta.identifier.clone(), Value::unit(), Value::unit());
        BoundExtension {
            meta,
            ext: Box::new(ext),
        }
    }
    pub fn identifier(&self) -> &str {
        &self.meta.identifier
    }
}

impl Component for BoundExtension {
    fn encode_to(&self, registry: &Registry, dest: &mut Vec<u8>) -> Result<()> {
        registry.encode_to(self.meta.ty, &self.ext.extra(), dest)
    }
    /// Only the extra is on the wire, the additional signed data of decoded
    /// extensions stays unknown.
    fn decode_from(&mut self, registry: &Registry, input: &mut &[u8]) -> Result<()> {
        let extra = registry.decode(self.meta.ty, input)?;
        self.ext = Box::new(DynamicExtension::new(
            self.meta.identifier.clone(),
            extra,
            Value::unit(),
        ));
        Ok(())
    }
    fn additional_signed_to(&self, registry: &Registry, dest: &mut Vec<u8>) -> Result<()> {
        registry.encode_to(self.meta.additional_signed, &self.ext.additional_signed(), dest)
    }
}

/// The chain of placeholders for decoding the extensions of an extrinsic.
pub fn decoding_chain(registry: &Registry) -> Chain<BoundExtension> {
    registry
        .extrinsic_format()
        .signed_extensions
        .iter()
        .cloned()
        .map(BoundExtension::placeholder)
        .collect()
}

/// Parameters of the built-in extensions.
///
/// Extensions are instantiated for whatever the runtime declares; a declared
/// extension whose parameter was never set fails with
/// [`Error::BuilderMissingField`].
#[derive(Debug, Clone, Default)]
pub struct ExtensionParams {
    nonce: Option<u64>,
    spec_version: Option<u32>,
    tx_version: Option<u32>,
    genesis: Option<H256>,
    mortality: Option<CheckMortality>,
    tip: u128,
    asset_id: Option<Value>,
    metadata_hash: Option<[u8; 32]>,
    custom: Vec<DynamicExtension>,
}

impl ExtensionParams {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn nonce(self, nonce: u64) -> Self {
        Self {
            nonce: Some(nonce),
            ..self
        }
    }
    pub fn spec_version(self, version: u32) -> Self {
        Self {
            spec_version: Some(version),
            ..self
        }
    }
    pub fn tx_version(self, version: u32) -> Self {
        Self {
            tx_version: Some(version),
            ..self
        }
    }
    pub fn genesis(self, genesis: H256) -> Self {
        Self {
            genesis: Some(genesis),
            ..self
        }
    }
    /// Set the era and the hash of its birth block. Immortal, checkpointed at
    /// genesis, by default.
    pub fn era(self, era: Era, checkpoint: H256) -> Self {
        Self {
            mortality: Some(CheckMortality { era, checkpoint }),
            ..self
        }
    }
    pub fn tip(self, tip: u128) -> Self {
        Self { tip, ..self }
    }
    pub fn asset_id(self, asset_id: Value) -> Self {
        Self {
            asset_id: Some(asset_id),
            ..self
        }
    }
    pub fn metadata_hash(self, hash: [u8; 32]) -> Self {
        Self {
            metadata_hash: Some(hash),
            ..self
        }
    }
    /// Use `ext` for the extension with the same identifier, replacing the
    /// built-in one if any.
    pub fn custom(mut self, ext: DynamicExtension) -> Self {
        self.custom.retain(|existing| existing.identifier != ext.identifier);
        self.custom.push(ext);
        self
    }
    fn built_in(
        &self,
        registry: &Registry,
        meta: &SignedExtensionMetadata,
    ) -> Result<Box<dyn SignedExtension>> {
        let ext: Box<dyn SignedExtension> = match meta.identifier.as_str() {
            "CheckNonZeroSender" => Box::new(CheckNonZeroSender),
            "CheckSpecVersion" => Box::new(CheckSpecVersion(
                self.spec_version
                    .ok_or(Error::BuilderMissingField("spec_version"))?,
            )),
            "CheckTxVersion" => Box::new(CheckTxVersion(
                self.tx_version.ok_or(Error::BuilderMissingField("tx_version"))?,
            )),
            "CheckGenesis" => Box::new(CheckGenesis(
                self.genesis.ok_or(Error::BuilderMissingField("genesis"))?,
            )),
            "CheckMortality" | "CheckEra" => {
                let mortality = match self.mortality {
                    Some(mortality) => mortality,
                    None => CheckMortality {
                        era: Era::Immortal,
                        checkpoint: self.genesis.ok_or(Error::BuilderMissingField("genesis"))?,
                    },
                };
                Box::new(mortality)
            }
            "CheckNonce" => Box::new(CheckNonce(
                self.nonce.ok_or(Error::BuilderMissingField("nonce"))?,
            )),
            "CheckWeight" => Box::new(CheckWeight),
            "ChargeTransactionPayment" => Box::new(ChargeTransactionPayment(self.tip)),
            "ChargeAssetTxPayment" => Box::new(ChargeAssetTxPayment {
                tip: self.tip,
                asset_id: self.asset_id.clone(),
            }),
            "CheckMetadataHash" => Box::new(CheckMetadataHash {
                hash: self.metadata_hash,
            }),
            other => {
                // Extensions that contribute no bytes at all, e.g. the many
                // `PrevalidateAttests`-style checks, need no parameters.
                let is_empty = |ty| {
                    registry
                        .encode(ty, &Value::unit())
                        .map(|bytes| bytes.is_empty())
                        .unwrap_or(false)
                };

                if is_empty(meta.ty) && is_empty(meta.additional_signed) {
                    log::debug!("Passing through empty signed extension {}", other);
                    Box::new(DynamicExtension::new(other, Value::unit(), Value::unit()))
                } else {
                    return Err(Error::UnsupportedSignedExtension(other.to_string()));
                }
            }
        };

        Ok(ext)
    }
    /// Instantiates every extension the runtime declares, in its order.
    pub fn build(&self, registry: &Registry) -> Result<Chain<BoundExtension>> {
        registry
            .extrinsic_format()
            .signed_extensions
            .iter()
            .map(|meta| -> Result<BoundExtension> {
                let custom = self.custom.iter().find(|c| c.identifier == meta.identifier);
                let ext: Box<dyn SignedExtension> = match custom {
                    Some(custom) => Box::new(custom.clone()),
                    None => self.built_in(registry, meta)?,
                };

                Ok(BoundExtension {
                    meta: meta.clone(),
                    ext,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{self, ids};

    fn params() -> ExtensionParams {
        ExtensionParams::new()
            .nonce(5)
            .spec_version(30)
            .tx_version(2)
            .genesis(H256::repeat_byte(0x11))
    }

    #[test]
    fn chain_follows_declared_order() {
        let registry = test_utils::registry();
        let chain = params().build(&registry).unwrap();

        let identifiers: Vec<_> = chain.iter().map(|ext| ext.identifier()).collect();
        assert_eq!(
            identifiers,
            vec!["CheckNonce", "ChargeTransactionPayment", "CheckSpecVersion", "CheckGenesis"]
        );

        assert_eq!(chain.encode(&registry).unwrap(), vec![0x14, 0x00]);

        let mut additional = 30u32.to_le_bytes().to_vec();
        additional.extend_from_slice(&[0x11; 32]);
        assert_eq!(chain.additional_signed(&registry).unwrap(), additional);
    }

    #[test]
    fn reordered_metadata_changes_output() {
        let registry = test_utils::registry_with_extensions(&[
            ("CheckGenesis", ids::UNIT, ids::H256),
            ("CheckSpecVersion", ids::UNIT, ids::U32),
            ("ChargeTransactionPayment", ids::CHARGE_TX, ids::UNIT),
            ("CheckNonce", ids::CHECK_NONCE, ids::UNIT),
        ]);
        let chain = params().build(&registry).unwrap();

        assert_eq!(chain.encode(&registry).unwrap(), vec![0x00, 0x14]);

        let mut additional = vec![0x11; 32];
        additional.extend_from_slice(&30u32.to_le_bytes());
        assert_eq!(chain.additional_signed(&registry).unwrap(), additional);
    }

    #[test]
    fn missing_parameters() {
        let registry = test_utils::registry();

        let err = ExtensionParams::new()
            .spec_version(30)
            .genesis(H256::zero())
            .build(&registry)
            .unwrap_err();
        assert!(matches!(err, Error::BuilderMissingField("nonce")));
    }

    #[test]
    fn mortality_defaults_to_immortal_at_genesis() {
        let registry = test_utils::registry_with_extensions(&[(
            "CheckMortality",
            ids::CHECK_MORTALITY,
            ids::H256,
        )]);

        let chain = params().build(&registry).unwrap();
        assert_eq!(chain.encode(&registry).unwrap(), vec![0x00]);
        assert_eq!(chain.additional_signed(&registry).unwrap(), vec![0x11; 32]);

        let era = Era::mortal(64, 1_000);
        let chain = params()
            .era(era, H256::repeat_byte(0x22))
            .build(&registry)
            .unwrap();
        assert_eq!(
            chain.encode(&registry).unwrap(),
            parity_scale_codec::Encode::encode(&era)
        );
        assert_eq!(chain.additional_signed(&registry).unwrap(), vec![0x22; 32]);
    }

    #[test]
    fn unknown_extensions() {
        let registry = test_utils::registry_with_extensions(&[
            ("CheckNonce", ids::CHECK_NONCE, ids::UNIT),
            ("PrevalidateAttests", ids::UNIT, ids::UNIT),
        ]);
        let chain = params().build(&registry).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.encode(&registry).unwrap(), vec![0x14]);

        let registry =
            test_utils::registry_with_extensions(&[("ChargeSponsored", ids::U32, ids::UNIT)]);
        assert!(matches!(
            params().build(&registry),
            Err(Error::UnsupportedSignedExtension(id)) if id == "ChargeSponsored"
        ));

        // A custom value makes it usable.
        let chain = params()
            .custom(DynamicExtension::new("ChargeSponsored", Value::u128(9), Value::unit()))
            .build(&registry)
            .unwrap();
        assert_eq!(chain.encode(&registry).unwrap(), vec![9, 0, 0, 0]);
    }

    #[test]
    fn custom_overrides_built_in() {
        let registry = test_utils::registry();
        let chain = params()
            .custom(DynamicExtension::new("CheckNonce", Value::u128(1), Value::unit()))
            .custom(DynamicExtension::new("CheckNonce", Value::u128(7), Value::unit()))
            .build(&registry)
            .unwrap();

        assert_eq!(chain.encode(&registry).unwrap(), vec![0x1c, 0x00]);
    }

    #[test]
    fn decoding_chain_reads_extras() {
        let registry = test_utils::registry();
        let mut chain = decoding_chain(&registry);

        let mut input = &[0x14, 0x00, 0xff][..];
        chain.decode_from(&registry, &mut input).unwrap();
        assert_eq!(input, &[0xff]);

        let extras: Vec<_> = chain.iter().map(|ext| ext.ext.extra()).collect();
        assert_eq!(extras[0], Value::unnamed_composite(vec![Value::u128(5)]));
    }

    #[test]
    fn metadata_hash_values() {
        let disabled = CheckMetadataHash { hash: None };
        assert_eq!(disabled.additional_signed(), Value::none());

        let enabled = CheckMetadataHash {
            hash: Some([3; 32]),
        };
        let extra = enabled.extra();
        let mode = extra.as_composite().unwrap().get("mode").unwrap();
        assert_eq!(mode.as_variant().unwrap().name, "Enabled");
    }
}
