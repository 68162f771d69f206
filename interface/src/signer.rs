//! Signers produce the signature over a transaction's signing payload.
//!
//! Keys never have to live in this process: anything implementing [`Signer`]
//! works, e.g. a hardware wallet or a remote service. [`PairSigner`] covers
//! the common case of a local key pair.

use crate::common::{AccountId32, MultiKeyPair};
use crate::value::{Value, Variant};
use async_trait::async_trait;
use sp_core::crypto::Pair;
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("signer refused to sign: {0}")]
    Refused(String),
    #[error("signer unavailable: {0}")]
    Unavailable(String),
}

/// The variants of `MultiSignature`, with their wire index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    Ed25519 = 0,
    Sr25519 = 1,
    Ecdsa = 2,
}

impl SignatureScheme {
    pub fn name(&self) -> &'static str {
        match self {
            SignatureScheme::Ed25519 => "Ed25519",
            SignatureScheme::Sr25519 => "Sr25519",
            SignatureScheme::Ecdsa => "Ecdsa",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub scheme: SignatureScheme,
    pub bytes: Vec<u8>,
}

impl Signature {
    /// The signature as `MultiSignature` value.
    pub fn to_value(&self) -> Value {
        Value::Variant(Variant::new(
            self.scheme as u8,
            self.scheme.name(),
            vec![Value::bytes(&self.bytes)],
        ))
    }
}

#[async_trait]
pub trait Signer: Send + Sync {
    /// The account the signatures are attributed to.
    fn account_id(&self) -> AccountId32;
    async fn sign(&self, payload: &[u8]) -> Result<Signature, SignerError>;
}

/// Signs with a local key pair.
#[derive(Clone)]
pub struct PairSigner {
    pair: MultiKeyPair,
    account: AccountId32,
}

impl PairSigner {
    pub fn new<P: Into<MultiKeyPair>>(pair: P) -> Self {
        let pair = pair.into();
        let account = AccountId32::from(&pair);

        PairSigner { pair, account }
    }
    pub fn pair(&self) -> &MultiKeyPair {
        &self.pair
    }
    pub fn sign_sync(&self, payload: &[u8]) -> Signature {
        match &self.pair {
            MultiKeyPair::Ed25519(pair) => Signature {
                scheme: SignatureScheme::Ed25519,
                bytes: pair.sign(payload).0.to_vec(),
            },
            MultiKeyPair::Sr25519(pair) => Signature {
                scheme: SignatureScheme::Sr25519,
                bytes: pair.sign(payload).0.to_vec(),
            },
            MultiKeyPair::Ecdsa(pair) => Signature {
                scheme: SignatureScheme::Ecdsa,
                bytes: pair.sign(payload).0.to_vec(),
            },
        }
    }
    /// Checks `signature` over `payload` against this signer's public key.
    pub fn verify(&self, payload: &[u8], signature: &Signature) -> bool {
        let bytes = signature.bytes.as_slice();

        match (&self.pair, signature.scheme) {
            (MultiKeyPair::Ed25519(pair), SignatureScheme::Ed25519) => {
                sp_core::ed25519::Signature::try_from(bytes)
                    .map(|sig| sp_core::ed25519::Pair::verify(&sig, payload, &pair.public()))
                    .unwrap_or(false)
            }
            (MultiKeyPair::Sr25519(pair), SignatureScheme::Sr25519) => {
                sp_core::sr25519::Signature::try_from(bytes)
                    .map(|sig| sp_core::sr25519::Pair::verify(&sig, payload, &pair.public()))
                    .unwrap_or(false)
            }
            (MultiKeyPair::Ecdsa(pair), SignatureScheme::Ecdsa) => {
                sp_core::ecdsa::Signature::try_from(bytes)
                    .map(|sig| sp_core::ecdsa::Pair::verify(&sig, payload, &pair.public()))
                    .unwrap_or(false)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for PairSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PairSigner")
            .field("account", &hex::encode(self.account.to_bytes()))
            .finish()
    }
}

#[async_trait]
impl Signer for PairSigner {
    fn account_id(&self) -> AccountId32 {
        self.account
    }
    async fn sign(&self, payload: &[u8]) -> Result<Signature, SignerError> {
        Ok(self.sign_sync(payload))
    }
}
