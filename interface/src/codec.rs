//! Encoding and decoding of [`Value`]s against the runtime's types.
//!
//! Both directions walk the resolved [`RuntimeType`] and the value together.
//! Any structural difference between the two is reported as
//! [`Error::ValueShapeMismatch`]; nothing is coerced silently, with one
//! exception: a composite or tuple with a single field accepts the field's
//! value directly, so `AccountId32([u8; 32])` can be given as plain bytes.

use crate::compact;
use crate::value::{Composite, Number, Value, Variant};
use crate::{Error, Result};
use kite_metadata::{BitOrder, BitStore, Field, Primitive, RuntimeType, TypeId, TypeTable};
use parity_scale_codec::Encode;

/// Maximum nesting of types. Deeper types are rejected rather than risking a
/// stack overflow on malicious metadata or input.
pub const MAX_DEPTH: usize = 128;

/// Longest sequence of zero-sized elements accepted on decode. Their length
/// is not bounded by the input.
pub const MAX_ZERO_SIZED_LEN: usize = 1 << 16;

/// Encodes `value` as type `ty`, appending to `dest`.
pub fn encode_to(types: &TypeTable, ty: TypeId, value: &Value, dest: &mut Vec<u8>) -> Result<()> {
    Encoder { types }.encode(ty, value, dest, 0)
}

pub fn encode(types: &TypeTable, ty: TypeId, value: &Value) -> Result<Vec<u8>> {
    let mut dest = vec![];
    encode_to(types, ty, value, &mut dest)?;
    Ok(dest)
}

/// Decodes a value of type `ty`, advancing `input` past the consumed bytes.
pub fn decode(types: &TypeTable, ty: TypeId, input: &mut &[u8]) -> Result<Value> {
    Decoder { types }.decode(ty, input, 0)
}

/// Decodes a value of type `ty` which must span all of `input`.
pub fn decode_all(types: &TypeTable, ty: TypeId, input: &[u8]) -> Result<Value> {
    let mut cursor = input;
    let value = decode(types, ty, &mut cursor)?;

    if !cursor.is_empty() {
        return Err(Error::TrailingBytes {
            ty,
            consumed: input.len() - cursor.len(),
            remaining: cursor.len(),
        });
    }

    Ok(value)
}

fn mismatch<E: Into<String>, F: Into<String>>(ty: TypeId, expected: E, found: F) -> Error {
    Error::ValueShapeMismatch {
        ty,
        expected: expected.into(),
        found: found.into(),
    }
}

fn primitive_name(prim: Primitive) -> &'static str {
    match prim {
        Primitive::Bool => "bool",
        Primitive::Char => "char",
        Primitive::Str => "str",
        Primitive::U8 => "u8",
        Primitive::U16 => "u16",
        Primitive::U32 => "u32",
        Primitive::U64 => "u64",
        Primitive::U128 => "u128",
        Primitive::U256 => "u256",
        Primitive::I8 => "i8",
        Primitive::I16 => "i16",
        Primitive::I32 => "i32",
        Primitive::I64 => "i64",
        Primitive::I128 => "i128",
        Primitive::I256 => "i256",
    }
}

fn check_depth(ty: TypeId, depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        Err(Error::RecursionLimit { ty })
    } else {
        Ok(())
    }
}

/// Whether values of `ty` always encode to zero bytes, like `()` or an empty
/// struct.
fn is_zero_sized(types: &TypeTable, ty: TypeId, depth: usize) -> Result<bool> {
    check_depth(ty, depth)?;

    let all = |ids: &mut dyn Iterator<Item = TypeId>| -> Result<bool> {
        for id in ids {
            if !is_zero_sized(types, id, depth + 1)? {
                return Ok(false);
            }
        }
        Ok(true)
    };

    match types.resolve(ty)? {
        RuntimeType::Tuple(ids) => all(&mut ids.iter().copied()),
        RuntimeType::Composite(fields) => all(&mut fields.iter().map(|f| f.ty)),
        RuntimeType::Array { len: 0, .. } => Ok(true),
        RuntimeType::Array { of, .. } => is_zero_sized(types, *of, depth + 1),
        _ => Ok(false),
    }
}

fn is_u8(types: &TypeTable, ty: TypeId) -> Result<bool> {
    Ok(matches!(
        types.resolve(ty)?,
        RuntimeType::Primitive(Primitive::U8)
    ))
}

/// The primitive behind a compact type, looking through single-field
/// wrappers like `Perbill(u32)`. Returns the number of wrappers as well.
fn compact_primitive(types: &TypeTable, ty: TypeId) -> Result<(Primitive, usize)> {
    let mut current = ty;
    for wrappers in 0..MAX_DEPTH {
        match types.resolve(current)? {
            RuntimeType::Primitive(prim) if prim.is_numeric() => return Ok((*prim, wrappers)),
            RuntimeType::Composite(fields) if fields.len() == 1 => current = fields[0].ty,
            RuntimeType::Tuple(elems) if elems.len() == 1 => current = elems[0],
            other => {
                return Err(Error::InvalidEncoding {
                    ty,
                    reason: format!("compact of non-numeric {}", other.kind()),
                })
            }
        }
    }

    Err(Error::RecursionLimit { ty })
}

/// Range of the unsigned/signed primitive, checking that `n` fits.
fn fits(prim: Primitive, n: &Number) -> bool {
    match prim {
        Primitive::U8 => n.as_u128().map_or(false, |n| n <= u8::MAX as u128),
        Primitive::U16 => n.as_u128().map_or(false, |n| n <= u16::MAX as u128),
        Primitive::U32 => n.as_u128().map_or(false, |n| n <= u32::MAX as u128),
        Primitive::U64 => n.as_u128().map_or(false, |n| n <= u64::MAX as u128),
        Primitive::U128 => n.as_u128().is_some(),
        Primitive::U256 => !n.is_negative(),
        Primitive::I8 => n.as_i128().map_or(false, |n| i8::try_from(n).is_ok()),
        Primitive::I16 => n.as_i128().map_or(false, |n| i16::try_from(n).is_ok()),
        Primitive::I32 => n.as_i128().map_or(false, |n| i32::try_from(n).is_ok()),
        Primitive::I64 => n.as_i128().map_or(false, |n| i64::try_from(n).is_ok()),
        Primitive::I128 => n.as_i128().is_some(),
        Primitive::I256 => match n {
            Number::U256(bytes) => bytes[31] & 0x80 == 0,
            _ => true,
        },
        Primitive::Bool | Primitive::Char | Primitive::Str => false,
    }
}

struct Encoder<'a> {
    types: &'a TypeTable,
}

impl<'a> Encoder<'a> {
    fn encode(&self, ty: TypeId, value: &Value, dest: &mut Vec<u8>, depth: usize) -> Result<()> {
        check_depth(ty, depth)?;

        match self.types.resolve(ty)? {
            RuntimeType::Primitive(prim) => self.encode_primitive(ty, *prim, value, dest),
            RuntimeType::Compact(inner) => self.encode_compact(ty, *inner, value, dest),
            RuntimeType::Sequence(of) => match value {
                Value::Bytes(bytes) if is_u8(self.types, *of)? => {
                    bytes.encode_to(dest);
                    Ok(())
                }
                Value::Sequence(items) => {
                    compact::encode_to(items.len() as u128, dest);
                    for item in items {
                        self.encode(*of, item, dest, depth + 1)?;
                    }
                    Ok(())
                }
                other => Err(mismatch(ty, "sequence", other.kind())),
            },
            RuntimeType::Array { of, len } => {
                let len = *len as usize;
                match value {
                    Value::Bytes(bytes) if is_u8(self.types, *of)? => {
                        if bytes.len() != len {
                            return Err(mismatch(
                                ty,
                                format!("{} bytes", len),
                                format!("{} bytes", bytes.len()),
                            ));
                        }
                        dest.extend_from_slice(bytes);
                        Ok(())
                    }
                    Value::Sequence(items) => {
                        if items.len() != len {
                            return Err(mismatch(
                                ty,
                                format!("{} elements", len),
                                format!("{} elements", items.len()),
                            ));
                        }
                        for item in items {
                            self.encode(*of, item, dest, depth + 1)?;
                        }
                        Ok(())
                    }
                    other => Err(mismatch(ty, "array", other.kind())),
                }
            }
            RuntimeType::Tuple(elems) => match value {
                Value::Composite(composite) if !(elems.len() == 1 && composite.len() != 1) => {
                    if composite.len() != elems.len() {
                        return Err(mismatch(
                            ty,
                            format!("tuple of {}", elems.len()),
                            format!("{} values", composite.len()),
                        ));
                    }
                    for (elem, value) in elems.iter().zip(composite.values()) {
                        self.encode(*elem, value, dest, depth + 1)?;
                    }
                    Ok(())
                }
                value if elems.len() == 1 => self.encode(elems[0], value, dest, depth + 1),
                other => Err(mismatch(ty, "tuple", other.kind())),
            },
            RuntimeType::Composite(fields) => match value {
                Value::Composite(composite) if !(fields.len() == 1 && composite.len() != 1) => {
                    self.encode_fields(ty, fields, composite, dest, depth)
                }
                value if fields.len() == 1 => self.encode(fields[0].ty, value, dest, depth + 1),
                other => Err(mismatch(ty, "composite", other.kind())),
            },
            RuntimeType::Variant(variants) => {
                let variant = match value {
                    Value::Variant(variant) => variant,
                    other => return Err(mismatch(ty, "variant", other.kind())),
                };

                let def = if variant.name.is_empty() {
                    variants.iter().find(|v| v.index == variant.index)
                } else {
                    variants.iter().find(|v| v.name == variant.name)
                };

                let def = def.ok_or_else(|| {
                    let found = if variant.name.is_empty() {
                        format!("variant index {}", variant.index)
                    } else {
                        format!("variant {}", variant.name)
                    };
                    let expected = variants
                        .iter()
                        .map(|v| v.name.as_str())
                        .collect::<Vec<_>>()
                        .join(" | ");
                    mismatch(ty, expected, found)
                })?;

                dest.push(def.index);
                self.encode_fields(ty, &def.fields, &variant.fields, dest, depth)
            }
            RuntimeType::BitSequence { store, order } => match value {
                Value::BitSequence(bits) => {
                    encode_bits(*store, *order, bits, dest);
                    Ok(())
                }
                other => Err(mismatch(ty, "bit sequence", other.kind())),
            },
        }
    }
    fn encode_fields(
        &self,
        ty: TypeId,
        fields: &[Field],
        composite: &Composite,
        dest: &mut Vec<u8>,
        depth: usize,
    ) -> Result<()> {
        if composite.len() != fields.len() {
            return Err(mismatch(
                ty,
                format!("{} fields", fields.len()),
                format!("{} fields", composite.len()),
            ));
        }

        match composite {
            Composite::Named(_) if fields.iter().all(|f| f.name.is_some()) => {
                for field in fields {
                    let name = field.name.as_deref().unwrap_or_default();
                    let value = composite
                        .get(name)
                        .ok_or_else(|| mismatch(ty, format!("field `{}`", name), "missing field"))?;
                    self.encode(field.ty, value, dest, depth + 1)?;
                }
            }
            _ => {
                for (field, value) in fields.iter().zip(composite.values()) {
                    self.encode(field.ty, value, dest, depth + 1)?;
                }
            }
        }

        Ok(())
    }
    fn encode_primitive(
        &self,
        ty: TypeId,
        prim: Primitive,
        value: &Value,
        dest: &mut Vec<u8>,
    ) -> Result<()> {
        match (prim, value) {
            (Primitive::Bool, Value::Bool(b)) => dest.push(u8::from(*b)),
            (Primitive::Char, Value::Char(c)) => (*c as u32).encode_to(dest),
            (Primitive::Str, Value::Str(s)) => s.encode_to(dest),
            (prim, Value::Number(n)) if prim.is_numeric() => {
                if !fits(prim, n) {
                    return Err(mismatch(
                        ty,
                        primitive_name(prim),
                        format!("{} (out of range)", n),
                    ));
                }

                let width = prim.width().unwrap_or(32);
                dest.extend_from_slice(&n.to_le_bytes_256()[..width]);
            }
            (prim, other) => return Err(mismatch(ty, primitive_name(prim), other.kind())),
        }

        Ok(())
    }
    fn encode_compact(&self, ty: TypeId, inner: TypeId, value: &Value, dest: &mut Vec<u8>) -> Result<()> {
        let (prim, _) = compact_primitive(self.types, inner)?;

        let n = match value.peel() {
            Value::Number(n) => n,
            other => return Err(mismatch(ty, "compact number", other.kind())),
        };

        if prim.is_signed() || !fits(prim, n) {
            return Err(mismatch(
                ty,
                format!("compact {}", primitive_name(prim)),
                format!("{}", n),
            ));
        }

        let n = n.as_u128().ok_or_else(|| Error::InvalidEncoding {
            ty,
            reason: "compact integers beyond 128 bits are not supported".into(),
        })?;

        compact::encode_to(n, dest);
        Ok(())
    }
}

struct Decoder<'a> {
    types: &'a TypeTable,
}

fn take<'b>(ty: TypeId, input: &mut &'b [u8], len: usize) -> Result<&'b [u8]> {
    if input.len() < len {
        return Err(Error::UnexpectedEof {
            ty,
            needed: len,
            available: input.len(),
        });
    }

    let (head, tail) = input.split_at(len);
    *input = tail;
    Ok(head)
}

impl<'a> Decoder<'a> {
    fn decode(&self, ty: TypeId, input: &mut &[u8], depth: usize) -> Result<Value> {
        check_depth(ty, depth)?;

        match self.types.resolve(ty)? {
            RuntimeType::Primitive(prim) => self.decode_primitive(ty, *prim, input),
            RuntimeType::Compact(inner) => {
                let (prim, wrappers) = compact_primitive(self.types, *inner)?;
                let n = Number::U128(compact::decode(ty, input)?);

                if !fits(prim, &n) {
                    return Err(Error::InvalidEncoding {
                        ty,
                        reason: format!("compact value {} exceeds {}", n, primitive_name(prim)),
                    });
                }

                let mut value = Value::Number(n);
                for _ in 0..wrappers {
                    value = Value::unnamed_composite(vec![value]);
                }
                Ok(value)
            }
            RuntimeType::Sequence(of) => {
                let len = compact::decode_len(ty, input)?;
                if is_u8(self.types, *of)? {
                    Ok(Value::Bytes(take(ty, input, len)?.to_vec()))
                } else if is_zero_sized(self.types, *of, depth)? {
                    if len > MAX_ZERO_SIZED_LEN {
                        return Err(Error::InvalidEncoding {
                            ty,
                            reason: format!("{} zero-sized elements", len),
                        });
                    }
                    let item = self.decode(*of, input, depth + 1)?;
                    Ok(Value::Sequence(vec![item; len]))
                } else {
                    // Every element takes at least one byte.
                    if len > input.len() {
                        return Err(Error::UnexpectedEof {
                            ty,
                            needed: len,
                            available: input.len(),
                        });
                    }
                    let mut items = Vec::with_capacity(len);
                    for _ in 0..len {
                        items.push(self.decode(*of, input, depth + 1)?);
                    }
                    Ok(Value::Sequence(items))
                }
            }
            RuntimeType::Array { of, len } => {
                let len = *len as usize;
                if is_u8(self.types, *of)? {
                    Ok(Value::Bytes(take(ty, input, len)?.to_vec()))
                } else {
                    let mut items = Vec::with_capacity(len.min(input.len()));
                    for _ in 0..len {
                        items.push(self.decode(*of, input, depth + 1)?);
                    }
                    Ok(Value::Sequence(items))
                }
            }
            RuntimeType::Tuple(elems) => {
                let mut values = Vec::with_capacity(elems.len());
                for elem in elems {
                    values.push(self.decode(*elem, input, depth + 1)?);
                }
                Ok(Value::Composite(Composite::Unnamed(values)))
            }
            RuntimeType::Composite(fields) => Ok(Value::Composite(
                self.decode_fields(fields, input, depth)?,
            )),
            RuntimeType::Variant(variants) => {
                let index = take(ty, input, 1)?[0];
                let def = variants
                    .iter()
                    .find(|v| v.index == index)
                    .ok_or(Error::UnknownVariantIndex { ty, index })?;

                Ok(Value::Variant(Variant {
                    name: def.name.clone(),
                    index,
                    fields: self.decode_fields(&def.fields, input, depth)?,
                }))
            }
            RuntimeType::BitSequence { store, order } => {
                Ok(Value::BitSequence(decode_bits(ty, *store, *order, input)?))
            }
        }
    }
    fn decode_fields(&self, fields: &[Field], input: &mut &[u8], depth: usize) -> Result<Composite> {
        let named = !fields.is_empty() && fields.iter().all(|f| f.name.is_some());

        if named {
            let mut values = Vec::with_capacity(fields.len());
            for field in fields {
                let value = self.decode(field.ty, input, depth + 1)?;
                values.push((field.name.clone().unwrap_or_default(), value));
            }
            Ok(Composite::Named(values))
        } else {
            let mut values = Vec::with_capacity(fields.len());
            for field in fields {
                values.push(self.decode(field.ty, input, depth + 1)?);
            }
            Ok(Composite::Unnamed(values))
        }
    }
    fn decode_primitive(&self, ty: TypeId, prim: Primitive, input: &mut &[u8]) -> Result<Value> {
        let value = match prim {
            Primitive::Bool => match take(ty, input, 1)?[0] {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                b => {
                    return Err(Error::InvalidEncoding {
                        ty,
                        reason: format!("invalid bool byte {:#04x}", b),
                    })
                }
            },
            Primitive::Char => {
                let mut raw = [0; 4];
                raw.copy_from_slice(take(ty, input, 4)?);
                let code = u32::from_le_bytes(raw);
                Value::Char(char::from_u32(code).ok_or_else(|| Error::InvalidEncoding {
                    ty,
                    reason: format!("invalid char {:#x}", code),
                })?)
            }
            Primitive::Str => {
                let len = compact::decode_len(ty, input)?;
                let bytes = take(ty, input, len)?;
                Value::Str(String::from_utf8(bytes.to_vec()).map_err(|err| {
                    Error::InvalidEncoding {
                        ty,
                        reason: err.to_string(),
                    }
                })?)
            }
            prim => {
                let width = prim.width().unwrap_or(32);
                let bytes = take(ty, input, width)?;

                Value::Number(match prim {
                    Primitive::U256 | Primitive::I256 => {
                        let mut raw = [0; 32];
                        raw.copy_from_slice(bytes);
                        if prim == Primitive::U256 {
                            Number::U256(raw)
                        } else {
                            Number::I256(raw)
                        }
                    }
                    prim if prim.is_signed() => {
                        // Sign-extend into 16 bytes.
                        let fill = if bytes[width - 1] & 0x80 != 0 { 0xff } else { 0 };
                        let mut raw = [fill; 16];
                        raw[..width].copy_from_slice(bytes);
                        Number::I128(i128::from_le_bytes(raw))
                    }
                    _ => {
                        let mut raw = [0; 16];
                        raw[..width].copy_from_slice(bytes);
                        Number::U128(u128::from_le_bytes(raw))
                    }
                })
            }
        };

        Ok(value)
    }
}

fn bit_position(order: BitOrder, bits_per_word: usize, idx: usize) -> usize {
    match order {
        BitOrder::Lsb0 => idx % bits_per_word,
        BitOrder::Msb0 => bits_per_word - 1 - idx % bits_per_word,
    }
}

fn encode_bits(store: BitStore, order: BitOrder, bits: &[bool], dest: &mut Vec<u8>) {
    compact::encode_to(bits.len() as u128, dest);

    let word_bits = store.bits();
    let words = (bits.len() + word_bits - 1) / word_bits;
    for word_idx in 0..words {
        let mut word: u64 = 0;
        for (offset, bit) in bits[word_idx * word_bits..]
            .iter()
            .take(word_bits)
            .enumerate()
        {
            if *bit {
                word |= 1 << bit_position(order, word_bits, offset);
            }
        }
        dest.extend_from_slice(&word.to_le_bytes()[..word_bits / 8]);
    }
}

fn decode_bits(ty: TypeId, store: BitStore, order: BitOrder, input: &mut &[u8]) -> Result<Vec<bool>> {
    let len = compact::decode_len(ty, input)?;

    let word_bits = store.bits();
    let word_bytes = word_bits / 8;
    let needed = len
        .div_ceil(word_bits)
        .checked_mul(word_bytes)
        .ok_or(Error::UnexpectedEof {
            ty,
            needed: usize::MAX,
            available: input.len(),
        })?;
    let raw = take(ty, input, needed)?;

    let mut bits = Vec::with_capacity(len);
    for (word_idx, chunk) in raw.chunks(word_bytes).enumerate() {
        let mut buf = [0; 8];
        buf[..word_bytes].copy_from_slice(chunk);
        let word = u64::from_le_bytes(buf);

        for offset in 0..word_bits {
            if word_idx * word_bits + offset >= len {
                break;
            }
            bits.push(word & (1 << bit_position(order, word_bits, offset)) != 0);
        }
    }

    Ok(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kite_metadata::{TypeEntry, Variant as VariantDef};

    struct Types {
        table: TypeTable,
    }

    impl Types {
        fn new() -> Self {
            Types {
                table: TypeTable::new(),
            }
        }
        fn add(&mut self, ty: RuntimeType) -> TypeId {
            self.table.push(TypeEntry::new(ty))
        }
        fn prim(&mut self, prim: Primitive) -> TypeId {
            self.add(RuntimeType::Primitive(prim))
        }
        fn round_trip(&self, ty: TypeId, value: Value) -> Vec<u8> {
            let encoded = encode(&self.table, ty, &value).unwrap();
            let decoded = decode_all(&self.table, ty, &encoded).unwrap();
            assert_eq!(decoded, value);
            encoded
        }
    }

    #[test]
    fn primitives() {
        let mut t = Types::new();
        let b = t.prim(Primitive::Bool);
        let u16_id = t.prim(Primitive::U16);
        let i32_id = t.prim(Primitive::I32);
        let s = t.prim(Primitive::Str);
        let c = t.prim(Primitive::Char);
        let u256 = t.prim(Primitive::U256);

        assert_eq!(t.round_trip(b, Value::Bool(true)), vec![1]);
        assert_eq!(t.round_trip(u16_id, Value::u128(0x1234)), vec![0x34, 0x12]);
        assert_eq!(t.round_trip(i32_id, Value::i128(-2)), vec![0xfe, 0xff, 0xff, 0xff]);
        assert_eq!(t.round_trip(s, Value::string("abc")), vec![12, b'a', b'b', b'c']);
        t.round_trip(c, Value::Char('k'));

        let mut wide = [0; 32];
        wide[31] = 0x80;
        assert_eq!(t.round_trip(u256, Value::Number(Number::U256(wide))), wide.to_vec());

        assert!(matches!(
            encode(&t.table, u16_id, &Value::u128(70_000)),
            Err(Error::ValueShapeMismatch { .. })
        ));
        assert!(matches!(
            encode(&t.table, b, &Value::u128(1)),
            Err(Error::ValueShapeMismatch { .. })
        ));
        assert!(matches!(
            decode_all(&t.table, b, &[2]),
            Err(Error::InvalidEncoding { .. })
        ));
    }

    #[test]
    fn sequences_arrays_and_tuples() {
        let mut t = Types::new();
        let u8_id = t.prim(Primitive::U8);
        let u32_id = t.prim(Primitive::U32);
        let bytes = t.add(RuntimeType::Sequence(u8_id));
        let words = t.add(RuntimeType::Sequence(u32_id));
        let arr = t.add(RuntimeType::Array { of: u8_id, len: 4 });
        let tuple = t.add(RuntimeType::Tuple(vec![u32_id, bytes]));
        let unit = t.add(RuntimeType::Tuple(vec![]));

        assert_eq!(t.round_trip(bytes, Value::bytes([1, 2])), vec![8, 1, 2]);
        assert_eq!(
            t.round_trip(words, Value::Sequence(vec![Value::u128(1)])),
            vec![4, 1, 0, 0, 0]
        );
        assert_eq!(t.round_trip(arr, Value::bytes([9; 4])), vec![9; 4]);
        t.round_trip(
            tuple,
            Value::unnamed_composite(vec![Value::u128(7), Value::bytes([])]),
        );
        assert!(t.round_trip(unit, Value::unit()).is_empty());

        assert!(matches!(
            encode(&t.table, arr, &Value::bytes([1; 3])),
            Err(Error::ValueShapeMismatch { .. })
        ));
    }

    #[test]
    fn composites_and_transparency() {
        let mut t = Types::new();
        let u8_id = t.prim(Primitive::U8);
        let u64_id = t.prim(Primitive::U64);
        let raw = t.add(RuntimeType::Array { of: u8_id, len: 32 });
        let account = t.add(RuntimeType::Composite(vec![Field::unnamed(raw)]));
        let info = t.add(RuntimeType::Composite(vec![
            Field::named("who", account),
            Field::named("amount", u64_id),
        ]));

        let value = Value::named_composite(vec![
            ("who", Value::unnamed_composite(vec![Value::bytes([3; 32])])),
            ("amount", Value::u128(10)),
        ]);
        let encoded = t.round_trip(info, value);
        assert_eq!(encoded.len(), 40);

        // Fields are matched by name, not position.
        let swapped = Value::named_composite(vec![
            ("amount", Value::u128(10)),
            ("who", Value::bytes([3; 32])),
        ]);
        assert_eq!(encode(&t.table, info, &swapped).unwrap(), encoded);

        let missing = Value::named_composite(vec![
            ("amount", Value::u128(10)),
            ("whom", Value::bytes([3; 32])),
        ]);
        assert!(matches!(
            encode(&t.table, info, &missing),
            Err(Error::ValueShapeMismatch { .. })
        ));
    }

    #[test]
    fn variant_tags() {
        let mut t = Types::new();
        let u8_id = t.prim(Primitive::U8);
        let variants = (0..=255u8)
            .map(|idx| VariantDef {
                index: idx,
                name: format!("V{}", idx),
                fields: if idx % 2 == 0 {
                    vec![]
                } else {
                    vec![Field::unnamed(u8_id)]
                },
                docs: vec![],
            })
            .collect();
        let ty = t.add(RuntimeType::Variant(variants));

        for idx in 0..=255u8 {
            let fields = if idx % 2 == 0 {
                vec![]
            } else {
                vec![Value::u128(idx as u128)]
            };
            let value = Value::Variant(Variant::new(idx, format!("V{}", idx), fields.clone()));
            let encoded = t.round_trip(ty, value);
            assert_eq!(encoded[0], idx);

            // Selecting by index gives the same bytes.
            let by_index = Value::Variant(Variant::with_index(idx, fields));
            assert_eq!(encode(&t.table, ty, &by_index).unwrap(), encoded);
        }

        let mut sparse = Types::new();
        let ty = sparse.add(RuntimeType::Variant(vec![VariantDef {
            index: 3,
            name: "Only".into(),
            fields: vec![],
            docs: vec![],
        }]));

        assert!(matches!(
            decode_all(&sparse.table, ty, &[4]),
            Err(Error::UnknownVariantIndex { index: 4, .. })
        ));
        assert!(matches!(
            encode(&sparse.table, ty, &Value::variant("Other", Vec::<Value>::new())),
            Err(Error::ValueShapeMismatch { .. })
        ));
    }

    #[test]
    fn compact_of_wrapper() {
        let mut t = Types::new();
        let u32_id = t.prim(Primitive::U32);
        let perbill = t.add(RuntimeType::Composite(vec![Field::unnamed(u32_id)]));
        let compact = t.add(RuntimeType::Compact(perbill));
        let compact_u32 = t.add(RuntimeType::Compact(u32_id));

        assert_eq!(
            t.round_trip(compact, Value::unnamed_composite(vec![Value::u128(64)])),
            vec![0x01, 0x01]
        );
        assert_eq!(t.round_trip(compact_u32, Value::u128(1)), vec![0x04]);

        // 2^32 does not fit the u32 behind the compact.
        let too_big = crate::compact::encode(1 << 32);
        assert!(matches!(
            decode_all(&t.table, compact_u32, &too_big),
            Err(Error::InvalidEncoding { .. })
        ));
    }

    #[test]
    fn bit_sequences() {
        let mut t = Types::new();
        let lsb = t.add(RuntimeType::BitSequence {
            store: BitStore::U8,
            order: BitOrder::Lsb0,
        });
        let msb = t.add(RuntimeType::BitSequence {
            store: BitStore::U8,
            order: BitOrder::Msb0,
        });
        let wide = t.add(RuntimeType::BitSequence {
            store: BitStore::U32,
            order: BitOrder::Lsb0,
        });

        let bits = vec![true, false, true, true, false, false, false, false, true];
        assert_eq!(
            t.round_trip(lsb, Value::BitSequence(bits.clone())),
            vec![36, 0b0000_1101, 0b0000_0001]
        );
        assert_eq!(
            t.round_trip(msb, Value::BitSequence(bits.clone())),
            vec![36, 0b1011_0000, 0b1000_0000]
        );
        assert_eq!(
            t.round_trip(wide, Value::BitSequence(bits)),
            vec![36, 0b0000_1101, 0b0000_0001, 0, 0]
        );
        assert_eq!(t.round_trip(lsb, Value::BitSequence(vec![])), vec![0]);
    }

    #[test]
    fn hostile_lengths() {
        let mut t = Types::new();
        let bits = t.add(RuntimeType::BitSequence {
            store: BitStore::U8,
            order: BitOrder::Lsb0,
        });
        let unit = t.add(RuntimeType::Tuple(vec![]));
        let units = t.add(RuntimeType::Sequence(unit));
        let u16_id = t.prim(Primitive::U16);
        let numbers = t.add(RuntimeType::Sequence(u16_id));

        // Compact u64::MAX as the bit count.
        let mut input = vec![0x13];
        input.extend_from_slice(&[0xff; 8]);
        assert!(matches!(
            decode_all(&t.table, bits, &input),
            Err(Error::UnexpectedEof { .. })
        ));

        // Compact 20_000_000 elements that take no bytes.
        let huge = parity_scale_codec::Compact(20_000_000u32).encode();
        assert!(matches!(
            decode_all(&t.table, units, &huge),
            Err(Error::InvalidEncoding { .. })
        ));
        assert_eq!(
            decode_all(&t.table, units, &[12]).unwrap(),
            Value::Sequence(vec![Value::unit(); 3])
        );

        // More elements announced than bytes left.
        match decode_all(&t.table, numbers, &huge) {
            Err(Error::UnexpectedEof {
                needed, available, ..
            }) => {
                assert_eq!(needed, 20_000_000);
                assert_eq!(available, 0);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn eof_and_trailing_bytes() {
        let mut t = Types::new();
        let u32_id = t.prim(Primitive::U32);

        match decode_all(&t.table, u32_id, &[1, 2]) {
            Err(Error::UnexpectedEof {
                ty,
                needed,
                available,
            }) => {
                assert_eq!(ty, u32_id);
                assert_eq!(needed, 4);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        match decode_all(&t.table, u32_id, &[1, 0, 0, 0, 9]) {
            Err(Error::TrailingBytes {
                consumed,
                remaining,
                ..
            }) => {
                assert_eq!(consumed, 4);
                assert_eq!(remaining, 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let mut input = &[1, 0, 0, 0, 9][..];
        assert_eq!(decode(&t.table, u32_id, &mut input).unwrap(), Value::u128(1));
        assert_eq!(input, &[9]);
    }

    #[test]
    fn dangling_and_recursive_types() {
        let mut t = Types::new();
        let seq = t.add(RuntimeType::Sequence(TypeId(42)));
        assert!(matches!(
            encode(&t.table, seq, &Value::Sequence(vec![Value::u128(1)])),
            Err(Error::UnknownTypeId { id: TypeId(42), .. })
        ));

        // A composite containing itself.
        let mut t = Types::new();
        let me = TypeId(0);
        t.add(RuntimeType::Composite(vec![Field::unnamed(me)]));
        assert!(matches!(
            decode_all(&t.table, me, &[0; 8]),
            Err(Error::RecursionLimit { .. })
        ));
    }
}
