// Copyright 2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use serde::{Serialize, Serializer};

/// Trait for numeric types usable as register payloads.
pub trait Numeric:
    Sized
    + Copy
    + PartialEq
    + Eq
    + std::ops::BitAnd<Output = Self>
    + std::ops::BitOr<Output = Self>
    + std::ops::Not<Output = Self>
    + std::fmt::Binary
    + std::fmt::Debug
{
    /// Number of bits for type
    const BITS: u32;
    /// All-zero value
    const ZERO: Self;
    /// Value of bit at pos
    fn bit(&self, pos: u32) -> bool;
}

macro_rules! impl_numeric {
    ($type:tt) => {
        impl Numeric for $type {
            const BITS: u32 = $type::BITS;
            const ZERO: Self = 0;
            fn bit(&self, pos: u32) -> bool {
                (self & (1 << pos)) != 0
            }
        }
    };
}

impl_numeric!(u8);
impl_numeric!(u16);
impl_numeric!(u32);
impl_numeric!(u64);
impl_numeric!(u128);

/// A `(mask, expected-value)` pair over a single register.
///
/// The comparison law is always `(observed & mask) == expect`. A zero mask
/// means "don't care": no bit is selected and the comparison trivially holds.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
pub struct BitField<V: Numeric> {
    /// Bits selected for comparison.
    pub mask: V,
    /// Expected value of the selected bits.
    pub expect: V,
}

impl<V: Numeric> BitField<V> {
    /// Expectation over the given bits.
    pub fn new(mask: V, expect: V) -> Self {
        Self { mask, expect }
    }

    /// Expectation that selects no bits.
    pub fn dont_care() -> Self {
        Self {
            mask: V::ZERO,
            expect: V::ZERO,
        }
    }

    /// Whether no bits are selected.
    pub fn is_dont_care(&self) -> bool {
        self.mask == V::ZERO
    }

    /// The observed value restricted to the selected bits.
    pub fn masked(&self, observed: V) -> V {
        observed & self.mask
    }

    /// The masked-equality law.
    pub fn matches(&self, observed: V) -> bool {
        self.masked(observed) == self.expect
    }

    /// Renders expected vs. observed bits with a caret under each diverging
    /// position.
    #[rustfmt::skip]
    pub fn diff_string(&self, observed: V) -> String {
        let masked = self.masked(observed);
        let mut diff = String::new();
        for i in (0..V::BITS).rev() {
            diff.push(match self.expect.bit(i) == masked.bit(i) {
                true => ' ',
                false => '^',
            });
        }

        format!(
            "* expected: 0b{expect:0width$b}\n\
             * observed: 0b{masked:0width$b}\n\
             * diff    :   {diff}",
            expect = self.expect,
            masked = masked,
            width = V::BITS as usize,
        )
    }
}

impl<V: Numeric> Serialize for BitField<V> {
    /// Serialize mask and expected value into a single tri-state bitmap
    /// string, e.g. `"0b01xx"` for mask `0b1100`, expect `0b0100`.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut bitmap_str = Vec::with_capacity(V::BITS as usize + 2);
        bitmap_str.push(b'0');
        bitmap_str.push(b'b');

        for i in (0..V::BITS).rev() {
            match self.mask.bit(i) {
                true => bitmap_str.push(b'0' + u8::from(self.expect.bit(i))),
                false => bitmap_str.push(b'x'),
            }
        }

        // # Safety:
        // We know that bitmap_str contains only ASCII characters
        let s = unsafe { std::str::from_utf8_unchecked(&bitmap_str) };

        serializer.serialize_str(s)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_masked_equality() {
        let field = BitField::<u32>::new(0b1111_0000, 0b1010_0000);
        assert!(field.matches(0b1010_0101));
        assert!(field.matches(0b1010_0000));
        assert!(!field.matches(0b0010_0000));
    }

    #[test]
    fn test_dont_care_matches_anything() {
        let field = BitField::<u32>::dont_care();
        assert!(field.is_dont_care());
        assert!(field.matches(0));
        assert!(field.matches(u32::MAX));
    }

    #[test]
    #[rustfmt::skip]
    fn test_diff_string() {
        let field = BitField::<u8>::new(0b0000_1111, 0b0000_0101);
        assert_eq!(
            field.diff_string(0b0000_0000),
            "* expected: 0b00000101\n\
             * observed: 0b00000000\n\
             * diff    :        ^ ^"
        );
    }

    #[test]
    fn test_bitfield_serialize() {
        let field = BitField::<u8> {
            mask: 0b11110000,
            expect: 0b01010000,
        };
        let serialized = serde_json::to_string(&field).unwrap();
        assert_eq!(&serialized, "\"0b0101xxxx\"");
    }

    #[test]
    fn test_bitfield_serialize_dont_care() {
        let field = BitField::<u8>::dont_care();
        let serialized = serde_json::to_string(&field).unwrap();
        assert_eq!(&serialized, "\"0bxxxxxxxx\"");
    }

    proptest! {
        // Flipping any single masked bit of a matching observation must
        // break the match; flipping unmasked bits must not.
        #[test]
        fn test_single_bit_flip(mask: u32, observed: u32, pos in 0u32..32) {
            let field = BitField::<u32>::new(mask, observed & mask);
            prop_assert!(field.matches(observed));

            let flipped = observed ^ (1 << pos);
            if mask.bit(pos) {
                prop_assert!(!field.matches(flipped));
            } else {
                prop_assert!(field.matches(flipped));
            }
        }
    }
}
