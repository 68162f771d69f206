use self::ss58format::{Ss58AddressFormat, Ss58Codec};
use crate::value::{Composite, Value, Variant};
use crate::{blake2b, Error, Result};
use parity_scale_codec::{Decode, Encode, Error as ScaleError, Input, Output};
use sp_core::crypto::Pair;

pub mod ss58format;
/// Re-export of the [`parity-scale-codec`](https://crates.io/crates/parity-scale-codec) crate.
pub mod scale {
    pub use parity_scale_codec::*;
}

pub type Sr25519 = sp_core::sr25519::Pair;
pub type Ed25519 = sp_core::ed25519::Pair;
pub type Ecdsa = sp_core::ecdsa::Pair;

pub struct KeyPairBuilder<T>(std::marker::PhantomData<T>);

impl<T: Pair> KeyPairBuilder<T> {
    pub fn generate() -> (T, T::Seed) {
        T::generate()
    }
    pub fn from_seed(seed: &T::Seed) -> T {
        T::from_seed(seed)
    }
    pub fn from_phrase(
        phrase: &str,
        password: Option<&str>,
    ) -> std::result::Result<(T, T::Seed), sp_core::crypto::SecretStringError> {
        T::from_phrase(phrase, password)
    }
}

#[derive(Clone)]
pub enum MultiKeyPair {
    Ed25519(Ed25519),
    Sr25519(Sr25519),
    Ecdsa(Ecdsa),
}

impl From<Ed25519> for MultiKeyPair {
    fn from(val: Ed25519) -> Self {
        MultiKeyPair::Ed25519(val)
    }
}

impl From<Sr25519> for MultiKeyPair {
    fn from(val: Sr25519) -> Self {
        MultiKeyPair::Sr25519(val)
    }
}

impl From<Ecdsa> for MultiKeyPair {
    fn from(val: Ecdsa) -> Self {
        MultiKeyPair::Ecdsa(val)
    }
}

/// Transaction lifetime. See
/// <https://docs.substrate.io/reference/transaction-format/> for the wire
/// format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Era {
    Immortal,
    /// Valid for `period` blocks, starting at the block where
    /// `number % period == phase`.
    Mortal { period: u64, phase: u64 },
}

impl Era {
    /// A mortal era valid for (at least) `period` blocks starting at
    /// `current`. The period is rounded up to a power of two within
    /// `4..=65536`, the phase is quantized so it survives encoding.
    pub fn mortal(period: u64, current: u64) -> Self {
        let period = period
            .checked_next_power_of_two()
            .unwrap_or(1 << 16)
            .clamp(4, 1 << 16);
        let phase = current % period;
        let quantize_factor = (period >> 12).max(1);
        let quantized_phase = phase / quantize_factor * quantize_factor;

        Era::Mortal {
            period,
            phase: quantized_phase,
        }
    }
    pub fn is_immortal(&self) -> bool {
        matches!(self, Era::Immortal)
    }
    /// The block number from where the period of mortality begins. The
    /// corresponding block hash required for the final transaction must be
    /// retrieved from the blockchain.
    pub fn birth(&self, current: u64) -> u64 {
        match *self {
            Era::Immortal => 0,
            Era::Mortal { period, phase } => (current.max(phase) - phase) / period * period + phase,
        }
    }
    /// The first block at which the transaction is no longer valid.
    pub fn death(&self, current: u64) -> u64 {
        match *self {
            Era::Immortal => u64::MAX,
            Era::Mortal { period, .. } => self.birth(current) + period,
        }
    }
    /// The era as a value of the runtime's `Era` type, which is a variant
    /// type whose index is the first encoded byte.
    pub fn to_value(&self) -> Value {
        let encoded = self.encode();
        match encoded.as_slice() {
            [first, second] => {
                Value::Variant(Variant::with_index(*first, vec![Value::u128(*second as u128)]))
            }
            _ => Value::Variant(Variant::with_index(0, Composite::default())),
        }
    }
    pub fn from_value(value: &Value) -> Result<Self> {
        let invalid = || Error::InvalidEncoding {
            ty: kite_metadata::TypeId(0),
            reason: format!("not an era: {:?}", value),
        };

        let variant = value.as_variant().ok_or_else(invalid)?;
        let mut raw = vec![variant.index];
        if variant.index != 0 {
            let second = variant
                .fields
                .at(0)
                .and_then(Value::as_u128)
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(invalid)?;
            raw.push(second);
        }

        Era::decode(&mut raw.as_slice()).map_err(|_| invalid())
    }
}

impl Encode for Era {
    fn encode_to<T: Output + ?Sized>(&self, output: &mut T) {
        match *self {
            Era::Immortal => output.push_byte(0),
            Era::Mortal { period, phase } => {
                let quantize_factor = (period >> 12).max(1);
                let encoded = period.trailing_zeros().saturating_sub(1).clamp(1, 15) as u16
                    | ((phase / quantize_factor) << 4) as u16;
                encoded.encode_to(output);
            }
        }
    }
}

impl Decode for Era {
    fn decode<I: Input>(input: &mut I) -> std::result::Result<Self, ScaleError> {
        let first = input.read_byte()?;
        if first == 0 {
            return Ok(Era::Immortal);
        }

        let encoded = first as u64 + ((input.read_byte()? as u64) << 8);
        let period = 2 << (encoded % (1 << 4));
        let quantize_factor = (period >> 12).max(1);
        let phase = (encoded >> 4) * quantize_factor;

        if period >= 4 && phase < period {
            Ok(Era::Mortal { period, phase })
        } else {
            Err("Invalid period and phase".into())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Encode, Decode)]
pub struct AccountId32([u8; 32]);

impl AccountId32 {
    pub fn new(bytes: [u8; 32]) -> Self {
        AccountId32(bytes)
    }
    pub fn from_ss58_address(address: &str) -> Result<Self> {
        Self::from_string(address)
    }
    pub fn to_ss58_address(&self, format: Ss58AddressFormat) -> String {
        self.to_string_with_version(format)
    }
    /// Returns the underlying public key or the blake2b hash in case of ECDSA.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }
    pub fn to_value(&self) -> Value {
        Value::bytes(self.0)
    }
}

impl AsRef<[u8]> for AccountId32 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsMut<[u8]> for AccountId32 {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl Ss58Codec for AccountId32 {}

impl From<[u8; 32]> for AccountId32 {
    fn from(bytes: [u8; 32]) -> Self {
        AccountId32(bytes)
    }
}

impl From<&MultiKeyPair> for AccountId32 {
    fn from(pair: &MultiKeyPair) -> Self {
        let mut bytes = [0; 32];
        match pair {
            MultiKeyPair::Ed25519(pair) => bytes.copy_from_slice(pair.public().as_ref()),
            MultiKeyPair::Sr25519(pair) => bytes.copy_from_slice(pair.public().as_ref()),
            MultiKeyPair::Ecdsa(pair) => bytes = blake2b::<32>(pair.public().as_ref()),
        }
        AccountId32(bytes)
    }
}

impl From<MultiKeyPair> for AccountId32 {
    fn from(pair: MultiKeyPair) -> Self {
        (&pair).into()
    }
}
