//! Ordered composition of heterogeneous components.
//!
//! Call parameters and signed extensions are both lists whose length and
//! element shapes are only known at runtime. Each element implements
//! [`Component`], and a [`Chain`] of components is itself a component that
//! applies every operation to its elements in order and concatenates the
//! results.

use crate::registry::Registry;
use crate::value::Value;
use crate::Result;
use kite_metadata::TypeId;

/// Something that contributes bytes to an encoded structure.
pub trait Component {
    /// Bytes placed on the wire.
    fn encode_to(&self, registry: &Registry, dest: &mut Vec<u8>) -> Result<()>;
    /// Reads this component back from `input`, replacing its current state.
    fn decode_from(&mut self, registry: &Registry, input: &mut &[u8]) -> Result<()>;
    /// Bytes only folded into the signing payload. Empty for most components.
    fn additional_signed_to(&self, _registry: &Registry, _dest: &mut Vec<u8>) -> Result<()> {
        Ok(())
    }
    fn encode(&self, registry: &Registry) -> Result<Vec<u8>> {
        let mut dest = vec![];
        self.encode_to(registry, &mut dest)?;
        Ok(dest)
    }
    fn additional_signed(&self, registry: &Registry) -> Result<Vec<u8>> {
        let mut dest = vec![];
        self.additional_signed_to(registry, &mut dest)?;
        Ok(dest)
    }
}

impl<C: Component + ?Sized> Component for Box<C> {
    fn encode_to(&self, registry: &Registry, dest: &mut Vec<u8>) -> Result<()> {
        (**self).encode_to(registry, dest)
    }
    fn decode_from(&mut self, registry: &Registry, input: &mut &[u8]) -> Result<()> {
        (**self).decode_from(registry, input)
    }
    fn additional_signed_to(&self, registry: &Registry, dest: &mut Vec<u8>) -> Result<()> {
        (**self).additional_signed_to(registry, dest)
    }
}

/// N components applied in order. The order is significant and never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain<C>(Vec<C>);

impl<C> Default for Chain<C> {
    fn default() -> Self {
        Chain(vec![])
    }
}

impl<C> Chain<C> {
    pub fn new(components: Vec<C>) -> Self {
        Chain(components)
    }
    pub fn push(&mut self, component: C) {
        self.0.push(component)
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &C> {
        self.0.iter()
    }
    pub fn into_inner(self) -> Vec<C> {
        self.0
    }
}

impl<C> FromIterator<C> for Chain<C> {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        Chain(iter.into_iter().collect())
    }
}

impl<C: Component> Component for Chain<C> {
    fn encode_to(&self, registry: &Registry, dest: &mut Vec<u8>) -> Result<()> {
        for component in &self.0 {
            component.encode_to(registry, dest)?;
        }
        Ok(())
    }
    fn decode_from(&mut self, registry: &Registry, input: &mut &[u8]) -> Result<()> {
        for component in &mut self.0 {
            component.decode_from(registry, input)?;
        }
        Ok(())
    }
    fn additional_signed_to(&self, registry: &Registry, dest: &mut Vec<u8>) -> Result<()> {
        for component in &self.0 {
            component.additional_signed_to(registry, dest)?;
        }
        Ok(())
    }
}

/// A dynamic value bound to the type it is encoded as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedValue {
    pub ty: TypeId,
    pub value: Value,
}

impl TypedValue {
    pub fn new<V: Into<Value>>(ty: TypeId, value: V) -> Self {
        TypedValue {
            ty,
            value: value.into(),
        }
    }
    /// A placeholder to be filled by [`Component::decode_from`].
    pub fn empty(ty: TypeId) -> Self {
        TypedValue {
            ty,
            value: Value::unit(),
        }
    }
}

impl Component for TypedValue {
    fn encode_to(&self, registry: &Registry, dest: &mut Vec<u8>) -> Result<()> {
        registry.encode_to(self.ty, &self.value, dest)
    }
    fn decode_from(&mut self, registry: &Registry, input: &mut &[u8]) -> Result<()> {
        self.value = registry.decode(self.ty, input)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{self, ids};

    #[derive(Debug)]
    struct Fixed {
        wire: Vec<u8>,
        signed: Vec<u8>,
    }

    impl Fixed {
        fn new(wire: &[u8], signed: &[u8]) -> Self {
            Fixed {
                wire: wire.to_vec(),
                signed: signed.to_vec(),
            }
        }
    }

    impl Component for Fixed {
        fn encode_to(&self, _: &Registry, dest: &mut Vec<u8>) -> Result<()> {
            dest.extend_from_slice(&self.wire);
            Ok(())
        }
        fn decode_from(&mut self, _: &Registry, input: &mut &[u8]) -> Result<()> {
            let len = self.wire.len().min(input.len());
            self.wire = input[..len].to_vec();
            *input = &input[len..];
            Ok(())
        }
        fn additional_signed_to(&self, _: &Registry, dest: &mut Vec<u8>) -> Result<()> {
            dest.extend_from_slice(&self.signed);
            Ok(())
        }
    }

    #[test]
    fn empty_chain_contributes_nothing() {
        let registry = test_utils::registry();
        let chain: Chain<Fixed> = Chain::default();

        assert!(chain.encode(&registry).unwrap().is_empty());
        assert!(chain.additional_signed(&registry).unwrap().is_empty());
    }

    #[test]
    fn chain_concatenates_in_order() {
        let registry = test_utils::registry();
        let a = || Fixed::new(&[1], &[0xa]);
        let b = || Fixed::new(&[2, 2], &[]);
        let c = || Fixed::new(&[3], &[0xc, 0xc]);

        let chain = Chain::new(vec![a(), b(), c()]);
        let mut manual = vec![];
        for part in [a(), b(), c()] {
            manual.extend(part.encode(&registry).unwrap());
        }
        assert_eq!(chain.encode(&registry).unwrap(), manual);
        assert_eq!(chain.encode(&registry).unwrap(), vec![1, 2, 2, 3]);
        assert_eq!(
            chain.additional_signed(&registry).unwrap(),
            vec![0xa, 0xc, 0xc]
        );

        let reordered = Chain::new(vec![c(), a(), b()]);
        assert_ne!(
            reordered.encode(&registry).unwrap(),
            chain.encode(&registry).unwrap()
        );
        assert_ne!(
            reordered.additional_signed(&registry).unwrap(),
            chain.additional_signed(&registry).unwrap()
        );
    }

    #[test]
    fn boxed_components_mix_shapes() {
        let registry = test_utils::registry();
        let chain: Chain<Box<dyn Component>> = Chain::new(vec![
            Box::new(TypedValue::new(ids::U32, 7u32)),
            Box::new(Fixed::new(&[0xff], &[1])),
            Box::new(TypedValue::new(ids::COMPACT_U128, 1u128)),
        ]);

        assert_eq!(
            chain.encode(&registry).unwrap(),
            vec![7, 0, 0, 0, 0xff, 0x04]
        );
        assert_eq!(chain.additional_signed(&registry).unwrap(), vec![1]);
    }

    #[test]
    fn decode_fills_typed_values() {
        let registry = test_utils::registry();
        let mut chain = Chain::new(vec![
            TypedValue::empty(ids::U32),
            TypedValue::empty(ids::BYTES),
        ]);

        let mut input = &[9, 0, 0, 0, 8, 0xaa, 0xbb, 0x42][..];
        chain.decode_from(&registry, &mut input).unwrap();

        assert_eq!(input, &[0x42]);
        let values: Vec<_> = chain.iter().map(|tv| tv.value.clone()).collect();
        assert_eq!(values, vec![Value::u128(9), Value::bytes([0xaa, 0xbb])]);
    }
}
