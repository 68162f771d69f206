//! Dynamic, self-describing values.
//!
//! A [`Value`] mirrors the shape of a
//! [`RuntimeType`](kite_metadata::RuntimeType) without carrying the type
//! itself. Values are produced by decoding bytes against a type id, or built by
//! the caller to be encoded against one.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Char(char),
    Str(String),
    Number(Number),
    /// A sequence or array of `u8`.
    Bytes(Vec<u8>),
    Sequence(Vec<Value>),
    Composite(Composite),
    Variant(Variant),
    BitSequence(Vec<bool>),
}

/// Integers up to 256 bits. Values that fit 128 bits always use the 128-bit
/// representations, the 256-bit ones hold little-endian bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Number {
    U128(u128),
    I128(i128),
    U256([u8; 32]),
    I256([u8; 32]),
}

impl Number {
    pub fn as_u128(&self) -> Option<u128> {
        match *self {
            Number::U128(n) => Some(n),
            Number::I128(n) => u128::try_from(n).ok(),
            Number::U256(bytes) => {
                if bytes[16..].iter().all(|b| *b == 0) {
                    let mut low = [0; 16];
                    low.copy_from_slice(&bytes[..16]);
                    Some(u128::from_le_bytes(low))
                } else {
                    None
                }
            }
            Number::I256(_) => None,
        }
    }
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Number::U128(n) => i128::try_from(n).ok(),
            Number::I128(n) => Some(n),
            _ => None,
        }
    }
    /// Little-endian two's complement representation in 32 bytes.
    pub fn to_le_bytes_256(&self) -> [u8; 32] {
        let mut out = [0; 32];
        match *self {
            Number::U128(n) => out[..16].copy_from_slice(&n.to_le_bytes()),
            Number::I128(n) => {
                out[..16].copy_from_slice(&n.to_le_bytes());
                if n < 0 {
                    out[16..].copy_from_slice(&[0xff; 16]);
                }
            }
            Number::U256(bytes) | Number::I256(bytes) => out = bytes,
        }
        out
    }
    pub fn is_negative(&self) -> bool {
        match *self {
            Number::I128(n) => n < 0,
            Number::I256(bytes) => bytes[31] & 0x80 != 0,
            _ => false,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::U128(n) => write!(f, "{}", n),
            Number::I128(n) => write!(f, "{}", n),
            Number::U256(bytes) | Number::I256(bytes) => {
                write!(f, "0x{}", hex::encode(bytes.iter().rev().copied().collect::<Vec<_>>()))
            }
        }
    }
}

/// Fields of a struct-like value or a variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Composite {
    Named(Vec<(String, Value)>),
    Unnamed(Vec<Value>),
}

impl Default for Composite {
    fn default() -> Self {
        Composite::Unnamed(vec![])
    }
}

impl Composite {
    pub fn len(&self) -> usize {
        match self {
            Composite::Named(fields) => fields.len(),
            Composite::Unnamed(fields) => fields.len(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn values(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            Composite::Named(fields) => Box::new(fields.iter().map(|(_, v)| v)),
            Composite::Unnamed(fields) => Box::new(fields.iter()),
        }
    }
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Composite::Named(fields) => fields.into_iter().map(|(_, v)| v).collect(),
            Composite::Unnamed(fields) => fields,
        }
    }
    /// Field by name. Always `None` for unnamed composites.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Composite::Named(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            Composite::Unnamed(_) => None,
        }
    }
    pub fn at(&self, idx: usize) -> Option<&Value> {
        self.values().nth(idx)
    }
}

impl From<Vec<Value>> for Composite {
    fn from(values: Vec<Value>) -> Self {
        Composite::Unnamed(values)
    }
}

impl<S: Into<String>> From<Vec<(S, Value)>> for Composite {
    fn from(fields: Vec<(S, Value)>) -> Self {
        Composite::Named(fields.into_iter().map(|(n, v)| (n.into(), v)).collect())
    }
}

/// A variant value. Encoding selects the variant by `name`, or by `index` if
/// the name is empty. Decoded variants carry both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub name: String,
    pub index: u8,
    pub fields: Composite,
}

impl Variant {
    pub fn new<N: Into<String>, F: Into<Composite>>(index: u8, name: N, fields: F) -> Self {
        Variant {
            name: name.into(),
            index,
            fields: fields.into(),
        }
    }
    pub fn named<N: Into<String>, F: Into<Composite>>(name: N, fields: F) -> Self {
        Self::new(0, name, fields)
    }
    pub fn with_index<F: Into<Composite>>(index: u8, fields: F) -> Self {
        Self::new(index, String::new(), fields)
    }
}

impl Value {
    pub fn u128(n: u128) -> Self {
        Value::Number(Number::U128(n))
    }
    pub fn i128(n: i128) -> Self {
        Value::Number(Number::I128(n))
    }
    pub fn bytes<B: AsRef<[u8]>>(bytes: B) -> Self {
        Value::Bytes(bytes.as_ref().to_vec())
    }
    pub fn string<S: Into<String>>(s: S) -> Self {
        Value::Str(s.into())
    }
    /// The empty tuple.
    pub fn unit() -> Self {
        Value::Composite(Composite::Unnamed(vec![]))
    }
    pub fn named_composite<S: Into<String>>(fields: Vec<(S, Value)>) -> Self {
        Value::Composite(fields.into())
    }
    pub fn unnamed_composite(values: Vec<Value>) -> Self {
        Value::Composite(Composite::Unnamed(values))
    }
    pub fn variant<N: Into<String>>(name: N, values: Vec<Value>) -> Self {
        Value::Variant(Variant::named(name, values))
    }
    /// `Option::None` of any `Option<T>` type.
    pub fn none() -> Self {
        Value::Variant(Variant::new(0, "None", Composite::default()))
    }
    pub fn some(value: Value) -> Self {
        Value::Variant(Variant::new(1, "Some", vec![value]))
    }
    /// A short name of the shape, used in error reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Str(_) => "string",
            Value::Number(_) => "number",
            Value::Bytes(_) => "bytes",
            Value::Sequence(_) => "sequence",
            Value::Composite(_) => "composite",
            Value::Variant(_) => "variant",
            Value::BitSequence(_) => "bit sequence",
        }
    }
    pub fn as_u128(&self) -> Option<u128> {
        match self {
            Value::Number(n) => n.as_u128(),
            _ => None,
        }
    }
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
    pub fn as_composite(&self) -> Option<&Composite> {
        match self {
            Value::Composite(c) => Some(c),
            _ => None,
        }
    }
    pub fn as_variant(&self) -> Option<&Variant> {
        match self {
            Value::Variant(v) => Some(v),
            _ => None,
        }
    }
    /// Unwraps single-field composites, e.g. `AccountId32([u8; 32])` into its
    /// bytes.
    pub fn peel(&self) -> &Value {
        match self {
            Value::Composite(c) if c.len() == 1 => c.values().next().map(Value::peel).unwrap_or(self),
            _ => self,
        }
    }
}

macro_rules! from_unsigned {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::u128(n as u128)
                }
            }
        )*
    };
}

macro_rules! from_signed {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::i128(n as i128)
                }
            }
        )*
    };
}

from_unsigned!(u8, u16, u32, u64, u128);
from_signed!(i8, i16, i32, i64, i128);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

impl<const N: usize> From<[u8; N]> for Value {
    fn from(bytes: [u8; N]) -> Self {
        Value::Bytes(bytes.to_vec())
    }
}

impl From<Composite> for Value {
    fn from(c: Composite) -> Self {
        Value::Composite(c)
    }
}

impl From<Variant> for Value {
    fn from(v: Variant) -> Self {
        Value::Variant(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_conversions() {
        assert_eq!(Number::I128(-1).as_u128(), None);
        assert_eq!(Number::I128(5).as_u128(), Some(5));
        assert_eq!(Number::U128(u128::MAX).as_i128(), None);

        let mut wide = [0; 32];
        wide[0] = 7;
        assert_eq!(Number::U256(wide).as_u128(), Some(7));
        wide[20] = 1;
        assert_eq!(Number::U256(wide).as_u128(), None);

        assert_eq!(Number::I128(-1).to_le_bytes_256(), [0xff; 32]);
        assert!(Number::I256([0xff; 32]).is_negative());
    }

    #[test]
    fn composite_access() {
        let c: Composite = vec![("dest", Value::u128(1)), ("value", Value::u128(2))].into();

        assert_eq!(c.len(), 2);
        assert_eq!(c.get("value"), Some(&Value::u128(2)));
        assert_eq!(c.at(0), Some(&Value::u128(1)));
        assert_eq!(c.get("other"), None);
    }

    #[test]
    fn peel_single_field_wrappers() {
        let account = Value::unnamed_composite(vec![Value::bytes([1; 32])]);
        assert_eq!(account.peel(), &Value::bytes([1; 32]));

        let pair = Value::unnamed_composite(vec![Value::u128(1), Value::u128(2)]);
        assert_eq!(pair.peel(), &pair);
    }
}
