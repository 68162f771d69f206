//! Signed and unsigned transactions to be submitted to the network.
//!
//! A transaction moves through three types:
//!
//! 1. [`UnsignedTransaction`]: a call, nothing else.
//! 2. [`PartialTransaction`]: signed extensions bound, signing payload built.
//! 3. [`SignedTransaction`]: signature attached, ready to be submitted.
//!
//! Submitting is up to the [`Client`](crate::Client), which hands out a
//! [`TransactionProgress`] for watched submissions.

use crate::chain::{Chain, Component};
use crate::common::AccountId32;
use crate::compact;
use crate::extension::{decoding_chain, BoundExtension, ExtensionParams};
use crate::registry::{Call, Registry};
use crate::signer::{Signature, Signer};
use crate::value::Value;
use crate::{blake2b, Error, Result};
use kite_metadata::{RuntimeType, TypeId};
use kite_rpc::{Subscription, TransportError};
use serde::{Deserialize, Serialize};
use sp_core::H256;
use std::sync::Arc;

/// Signing payloads longer than this are hashed with blake2-256 before
/// signing. A payload of exactly this length is signed as is.
pub const SIGNING_PAYLOAD_HASH_THRESHOLD: usize = 256;

/// Bit of the version byte marking a signed extrinsic.
const SIGNED_BIT: u8 = 0b1000_0000;

/// The bytes a signature commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningPayload {
    pub call: Vec<u8>,
    /// Extension bytes placed on the wire.
    pub extra: Vec<u8>,
    /// Extension bytes only part of the payload.
    pub additional: Vec<u8>,
}

impl SigningPayload {
    pub fn new(call: Vec<u8>, extra: Vec<u8>, additional: Vec<u8>) -> Self {
        SigningPayload {
            call,
            extra,
            additional,
        }
    }
    pub fn encoded(&self) -> Vec<u8> {
        let mut payload =
            Vec::with_capacity(self.call.len() + self.extra.len() + self.additional.len());
        payload.extend_from_slice(&self.call);
        payload.extend_from_slice(&self.extra);
        payload.extend_from_slice(&self.additional);
        payload
    }
    /// The bytes handed to the signer.
    pub fn to_sign(&self) -> Vec<u8> {
        let payload = self.encoded();
        if payload.len() > SIGNING_PAYLOAD_HASH_THRESHOLD {
            blake2b::<32>(&payload).to_vec()
        } else {
            payload
        }
    }
}

/// The signature section of an extrinsic, in encoded form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSection {
    pub address: Vec<u8>,
    pub signature: Vec<u8>,
    pub extra: Vec<u8>,
}

/// A transaction in its wire format. Referred to as "UncheckedExtrinsic" in
/// Substrate vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extrinsic {
    /// Format version, without the signed bit.
    pub version: u8,
    pub signature: Option<SignatureSection>,
    pub call: Vec<u8>,
}

/// An extrinsic decoded back into values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedExtrinsic {
    pub version: u8,
    pub signature: Option<DecodedSignature>,
    pub call: Call,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSignature {
    pub address: Value,
    pub signature: Value,
    /// The extras of every signed extension, by identifier.
    pub extensions: Vec<(String, Value)>,
}

fn format_type(ty: Option<TypeId>, what: &str) -> Result<TypeId> {
    ty.ok_or_else(|| {
        Error::Metadata(kite_metadata::Error::InvalidMetadata(format!(
            "metadata declares no extrinsic {} type",
            what
        )))
    })
}

impl Extrinsic {
    pub fn unsigned(version: u8, call: Vec<u8>) -> Self {
        Extrinsic {
            version,
            signature: None,
            call,
        }
    }
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
    /// The length prefixed encoding, as submitted to the node.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = vec![];
        match &self.signature {
            Some(sig) => {
                body.push(self.version | SIGNED_BIT);
                body.extend_from_slice(&sig.address);
                body.extend_from_slice(&sig.signature);
                body.extend_from_slice(&sig.extra);
            }
            None => body.push(self.version),
        }
        body.extend_from_slice(&self.call);

        let mut encoded = compact::encode(body.len() as u128);
        encoded.extend(body);
        encoded
    }
    /// Blake2-256 of the encoded extrinsic, the hash the node reports.
    pub fn hash(&self) -> H256 {
        H256(blake2b::<32>(&self.encode()))
    }
    /// Decodes a length prefixed extrinsic, e.g. as found in a block.
    pub fn decode(registry: &Registry, bytes: &[u8]) -> Result<DecodedExtrinsic> {
        let format = registry.extrinsic_format();
        let call_ty = format_type(format.call_ty, "call")?;

        let mut input = bytes;
        let len = compact::decode_len(call_ty, &mut input)?;
        if input.len() < len {
            return Err(Error::UnexpectedEof {
                ty: call_ty,
                needed: len,
                available: input.len(),
            });
        }
        if input.len() > len {
            return Err(Error::TrailingBytes {
                ty: call_ty,
                consumed: bytes.len() - (input.len() - len),
                remaining: input.len() - len,
            });
        }

        let (first, mut body) = input.split_first().ok_or(Error::UnexpectedEof {
            ty: call_ty,
            needed: 1,
            available: 0,
        })?;

        let version = first & !SIGNED_BIT;
        if version != format.version {
            return Err(Error::InvalidEncoding {
                ty: call_ty,
                reason: format!(
                    "extrinsic version {} (runtime uses {})",
                    version, format.version
                ),
            });
        }

        let signature = if first & SIGNED_BIT != 0 {
            let address = registry.decode(format_type(format.address_ty, "address")?, &mut body)?;
            let signature =
                registry.decode(format_type(format.signature_ty, "signature")?, &mut body)?;

            let mut extensions = decoding_chain(registry);
            extensions.decode_from(registry, &mut body)?;

            Some(DecodedSignature {
                address,
                signature,
                extensions: extensions
                    .into_inner()
                    .into_iter()
                    .map(|ext| (ext.meta.identifier.clone(), ext.ext.extra()))
                    .collect(),
            })
        } else {
            None
        };

        let call = registry.decode_call(body)?;

        Ok(DecodedExtrinsic {
            version,
            signature,
            call,
        })
    }
}

/// `account` as value of the runtime's address type: `MultiAddress::Id` if
/// the address is a variant type, the plain account id otherwise.
fn address_value(registry: &Registry, ty: TypeId, account: &AccountId32) -> Result<Value> {
    match registry.resolve(ty)? {
        RuntimeType::Variant(variants) => {
            let id = variants
                .iter()
                .find(|v| v.name == "Id")
                .ok_or_else(|| Error::ValueShapeMismatch {
                    ty,
                    expected: "address with an `Id` variant".into(),
                    found: "account id".into(),
                })?;

            Ok(Value::Variant(crate::value::Variant::new(
                id.index,
                id.name.clone(),
                vec![account.to_value()],
            )))
        }
        _ => Ok(account.to_value()),
    }
}

/// `signature` as value of the runtime's signature type: a `MultiSignature`
/// variant, or the plain signature bytes.
fn signature_value(registry: &Registry, ty: TypeId, signature: &Signature) -> Result<Value> {
    match registry.resolve(ty)? {
        RuntimeType::Variant(_) => Ok(signature.to_value()),
        _ => Ok(Value::bytes(&signature.bytes)),
    }
}

/// A call without extensions. Can be submitted as is, e.g. for inherents, or
/// extended to be signed.
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    registry: Arc<Registry>,
    call: Call,
}

impl UnsignedTransaction {
    pub fn new(registry: Arc<Registry>, call: Call) -> Self {
        UnsignedTransaction { registry, call }
    }
    pub fn call(&self) -> &Call {
        &self.call
    }
    pub fn to_extrinsic(&self) -> Result<Extrinsic> {
        Ok(Extrinsic::unsigned(
            self.registry.extrinsic_format().version,
            self.registry.encode_call(&self.call)?,
        ))
    }
    /// Binds the runtime's signed extensions and builds the signing payload.
    pub fn with_extensions(self, params: &ExtensionParams) -> Result<PartialTransaction> {
        let call = self.registry.encode_call(&self.call)?;
        let extensions = params.build(&self.registry)?;

        let payload = SigningPayload::new(
            call,
            extensions.encode(&self.registry)?,
            extensions.additional_signed(&self.registry)?,
        );

        log::debug!(
            "Built signing payload for {}::{} ({} bytes)",
            self.call.pallet,
            self.call.name,
            payload.encoded().len()
        );

        Ok(PartialTransaction {
            registry: self.registry,
            call: self.call,
            extensions,
            payload,
        })
    }
}

/// A transaction waiting for its signature.
#[derive(Debug)]
pub struct PartialTransaction {
    registry: Arc<Registry>,
    call: Call,
    extensions: Chain<BoundExtension>,
    payload: SigningPayload,
}

impl PartialTransaction {
    pub fn signing_payload(&self) -> &SigningPayload {
        &self.payload
    }
    pub fn extensions(&self) -> &Chain<BoundExtension> {
        &self.extensions
    }
    pub async fn sign<S: Signer + ?Sized>(self, signer: &S) -> Result<SignedTransaction> {
        let signature = signer.sign(&self.payload.to_sign()).await?;
        self.attach_signature(signer.account_id(), signature)
    }
    /// Assembles the extrinsic from a signature created elsewhere.
    pub fn attach_signature(
        self,
        account: AccountId32,
        signature: Signature,
    ) -> Result<SignedTransaction> {
        let format = self.registry.extrinsic_format();
        let address_ty = format_type(format.address_ty, "address")?;
        let signature_ty = format_type(format.signature_ty, "signature")?;

        let address = self
            .registry
            .encode(address_ty, &address_value(&self.registry, address_ty, &account)?)?;
        let signature = self.registry.encode(
            signature_ty,
            &signature_value(&self.registry, signature_ty, &signature)?,
        )?;

        let extrinsic = Extrinsic {
            version: format.version,
            signature: Some(SignatureSection {
                address,
                signature,
                extra: self.payload.extra,
            }),
            call: self.payload.call,
        };

        let encoded = extrinsic.encode();
        let hash = H256(blake2b::<32>(&encoded));

        Ok(SignedTransaction {
            call: self.call,
            signer: account,
            extrinsic,
            encoded,
            hash,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    call: Call,
    signer: AccountId32,
    extrinsic: Extrinsic,
    encoded: Vec<u8>,
    hash: H256,
}

impl SignedTransaction {
    pub fn call(&self) -> &Call {
        &self.call
    }
    pub fn signer(&self) -> &AccountId32 {
        &self.signer
    }
    pub fn extrinsic(&self) -> &Extrinsic {
        &self.extrinsic
    }
    /// The length prefixed extrinsic.
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }
    pub fn hash(&self) -> H256 {
        self.hash
    }
}

/// Status updates of a watched transaction, as reported by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionStatus {
    Future,
    Ready,
    Broadcast(Vec<String>),
    InBlock(H256),
    Retracted(H256),
    FinalityTimeout(H256),
    Finalized(H256),
    Usurped(H256),
    Dropped,
    Invalid,
}

impl TransactionStatus {
    /// Whether the node sends no further updates after this one.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Finalized(_)
                | TransactionStatus::Invalid
                | TransactionStatus::Dropped
                | TransactionStatus::Usurped(_)
                | TransactionStatus::FinalityTimeout(_)
        )
    }
    /// Whether `json` names one of the statuses above, regardless of whether
    /// its payload is well-formed.
    fn is_known(json: &serde_json::Value) -> bool {
        const KNOWN: &[&str] = &[
            "future",
            "ready",
            "broadcast",
            "inBlock",
            "retracted",
            "finalityTimeout",
            "finalized",
            "usurped",
            "dropped",
            "invalid",
        ];

        let name = match json {
            serde_json::Value::String(name) => Some(name.as_str()),
            serde_json::Value::Object(map) if map.len() == 1 => map.keys().next().map(String::as_str),
            _ => None,
        };

        name.map_or(false, |name| KNOWN.contains(&name))
    }
}

/// Status stream of a submitted transaction. Dropping it before a terminal
/// status unsubscribes.
#[derive(Debug)]
pub struct TransactionProgress {
    hash: H256,
    subscription: Option<Subscription>,
}

impl TransactionProgress {
    pub fn new(hash: H256, subscription: Subscription) -> Self {
        TransactionProgress {
            hash,
            subscription: Some(subscription),
        }
    }
    pub fn hash(&self) -> H256 {
        self.hash
    }
    /// The next status. A terminal status is delivered once, after which the
    /// stream ends. Statuses this client does not know are skipped.
    pub async fn next(&mut self) -> Option<Result<TransactionStatus>> {
        loop {
            let subscription = self.subscription.as_mut()?;

            let status = match subscription.next().await {
                Some(Ok(json)) => match serde_json::from_value::<TransactionStatus>(json.clone()) {
                    Ok(status) => Ok(status),
                    Err(_) if !TransactionStatus::is_known(&json) => {
                        log::warn!("Transaction {:?}: skipping unknown status {}", self.hash, json);
                        continue;
                    }
                    Err(err) => Err(Error::from(err)),
                },
                Some(Err(err)) => Err(err.into()),
                None => {
                    // The node closed the subscription itself.
                    if let Some(subscription) = self.subscription.take() {
                        subscription.finish();
                    }
                    return Some(Err(TransportError::SubscriptionClosed.into()));
                }
            };

            match &status {
                Ok(status) if !status.is_terminal() => {
                    log::debug!("Transaction {:?}: {:?}", self.hash, status);
                }
                Ok(status) => {
                    log::info!("Transaction {:?}: {:?}", self.hash, status);
                    if let Some(subscription) = self.subscription.take() {
                        subscription.finish();
                    }
                }
                Err(err) => {
                    log::warn!("Transaction {:?}: {}", self.hash, err);
                    // Dropping unsubscribes, the node still watches.
                    drop(self.subscription.take());
                }
            }

            return Some(status);
        }
    }
    /// Waits until the transaction is finalized and returns the block hash.
    pub async fn wait_for_finalized(mut self) -> Result<H256> {
        while let Some(status) = self.next().await {
            match status? {
                TransactionStatus::Finalized(block) => return Ok(block),
                status if status.is_terminal() => {
                    return Err(Error::Rejected(format!("{:?}", status)))
                }
                _ => {}
            }
        }

        Err(TransportError::SubscriptionClosed.into())
    }
}
