//! The numeric scalar family.
//!
//! One sealed trait covers the ten fixed-width numeric types so scalar
//! accessors and [`Numbers`](crate::lists::Numbers) containers share a
//! single dispatch point: wire tags, byte width, little-endian codec, and
//! the final-40 representation for values of 32 bits or fewer.
//!
//! Values of width ≤ 4 bytes ride in the header's final-40 as their
//! unsigned bit pattern, zero-extended (`-1i32` → `0xFFFF_FFFF`, floats
//! by IEEE-754 bits); readers reinterpret the low `WIDTH` bytes. 64-bit
//! values use an 8-byte payload instead and report no final-40 form.

use crate::lists::numbers::{NumberListSlot, Numbers};
use crate::schema::field_type::FieldType;

mod sealed {
    pub trait Sealed {}
}

/// A fixed-width numeric Claw scalar: i8..i64, u8..u64, f32, f64.
pub trait ClawNumber:
    sealed::Sealed + Copy + Default + PartialEq + std::fmt::Debug + Send + Sync + 'static
{
    /// Scalar wire tag.
    const WIRE_TYPE: FieldType;
    /// List wire tag.
    const LIST_TYPE: FieldType;
    /// Encoded width in bytes: 1, 2, 4, or 8.
    const WIDTH: usize;

    /// Writes exactly `WIDTH` little-endian bytes.
    fn write_le(self, dst: &mut [u8]);

    /// Reads exactly `WIDTH` little-endian bytes.
    fn read_le(src: &[u8]) -> Self;

    /// The value as final-40 bits, or `None` for 64-bit types.
    fn final_40(self) -> Option<u64>;

    /// Rebuilds the value from final-40 bits (types of width ≤ 4 only;
    /// 64-bit types never take this path and return zero).
    fn from_final_40(bits: u64) -> Self;

    /// Whether the encoded form is all-zero bytes. Bit-pattern based so
    /// `-0.0` counts as non-zero and survives zero-type-compression.
    fn is_wire_zero(self) -> bool;

    /// Bit-pattern equality; distinguishes NaN payloads where `==` cannot.
    fn bits_eq(a: Self, b: Self) -> bool;

    #[doc(hidden)]
    fn wrap_list(list: Numbers<Self>) -> NumberListSlot;
    #[doc(hidden)]
    fn list_ref(slot: &NumberListSlot) -> Option<&Numbers<Self>>;
    #[doc(hidden)]
    fn list_mut(slot: &mut NumberListSlot) -> Option<&mut Numbers<Self>>;
}

macro_rules! int_number {
    ($t:ty, $ut:ty, $width:expr, $wire:ident, $list:ident, $variant:ident) => {
        impl sealed::Sealed for $t {}

        impl ClawNumber for $t {
            const WIRE_TYPE: FieldType = FieldType::$wire;
            const LIST_TYPE: FieldType = FieldType::$list;
            const WIDTH: usize = $width;

            #[inline]
            fn write_le(self, dst: &mut [u8]) {
                dst[..$width].copy_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn read_le(src: &[u8]) -> $t {
                let mut raw = [0u8; $width];
                raw.copy_from_slice(&src[..$width]);
                <$t>::from_le_bytes(raw)
            }

            #[inline]
            fn final_40(self) -> Option<u64> {
                if $width <= 4 {
                    Some((self as $ut) as u64)
                } else {
                    None
                }
            }

            #[inline]
            fn from_final_40(bits: u64) -> $t {
                (bits as $ut) as $t
            }

            #[inline]
            fn is_wire_zero(self) -> bool {
                self == 0
            }

            #[inline]
            fn bits_eq(a: $t, b: $t) -> bool {
                a == b
            }

            fn wrap_list(list: Numbers<$t>) -> NumberListSlot {
                NumberListSlot::$variant(list)
            }

            fn list_ref(slot: &NumberListSlot) -> Option<&Numbers<$t>> {
                match slot {
                    NumberListSlot::$variant(l) => Some(l),
                    _ => None,
                }
            }

            fn list_mut(slot: &mut NumberListSlot) -> Option<&mut Numbers<$t>> {
                match slot {
                    NumberListSlot::$variant(l) => Some(l),
                    _ => None,
                }
            }
        }
    };
}

int_number!(i8, u8, 1, Int8, ListInt8, I8);
int_number!(i16, u16, 2, Int16, ListInt16, I16);
int_number!(i32, u32, 4, Int32, ListInt32, I32);
int_number!(i64, u64, 8, Int64, ListInt64, I64);
int_number!(u8, u8, 1, Uint8, ListUint8, U8);
int_number!(u16, u16, 2, Uint16, ListUint16, U16);
int_number!(u32, u32, 4, Uint32, ListUint32, U32);
int_number!(u64, u64, 8, Uint64, ListUint64, U64);

macro_rules! float_number {
    ($t:ty, $bits:ty, $width:expr, $wire:ident, $list:ident, $variant:ident) => {
        impl sealed::Sealed for $t {}

        impl ClawNumber for $t {
            const WIRE_TYPE: FieldType = FieldType::$wire;
            const LIST_TYPE: FieldType = FieldType::$list;
            const WIDTH: usize = $width;

            #[inline]
            fn write_le(self, dst: &mut [u8]) {
                dst[..$width].copy_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn read_le(src: &[u8]) -> $t {
                let mut raw = [0u8; $width];
                raw.copy_from_slice(&src[..$width]);
                <$t>::from_le_bytes(raw)
            }

            #[inline]
            fn final_40(self) -> Option<u64> {
                if $width <= 4 {
                    Some(self.to_bits() as u64)
                } else {
                    None
                }
            }

            #[inline]
            fn from_final_40(bits: u64) -> $t {
                <$t>::from_bits(bits as $bits)
            }

            #[inline]
            fn is_wire_zero(self) -> bool {
                self.to_bits() == 0
            }

            #[inline]
            fn bits_eq(a: $t, b: $t) -> bool {
                a.to_bits() == b.to_bits()
            }

            fn wrap_list(list: Numbers<$t>) -> NumberListSlot {
                NumberListSlot::$variant(list)
            }

            fn list_ref(slot: &NumberListSlot) -> Option<&Numbers<$t>> {
                match slot {
                    NumberListSlot::$variant(l) => Some(l),
                    _ => None,
                }
            }

            fn list_mut(slot: &mut NumberListSlot) -> Option<&mut Numbers<$t>> {
                match slot {
                    NumberListSlot::$variant(l) => Some(l),
                    _ => None,
                }
            }
        }
    };
}

float_number!(f32, u32, 4, Float32, ListFloat32, F32);
float_number!(f64, u64, 8, Float64, ListFloat64, F64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_and_tags() {
        assert_eq!(<i8 as ClawNumber>::WIDTH, 1);
        assert_eq!(<u16 as ClawNumber>::WIDTH, 2);
        assert_eq!(<f32 as ClawNumber>::WIDTH, 4);
        assert_eq!(<u64 as ClawNumber>::WIDTH, 8);
        assert_eq!(<i32 as ClawNumber>::WIRE_TYPE, FieldType::Int32);
        assert_eq!(<i32 as ClawNumber>::LIST_TYPE, FieldType::ListInt32);
    }

    #[test]
    fn negative_values_zero_extend() {
        assert_eq!((-1i8).final_40(), Some(0xFF));
        assert_eq!((-1i16).final_40(), Some(0xFFFF));
        assert_eq!((-1i32).final_40(), Some(0xFFFF_FFFF));
        assert_eq!(i8::from_final_40(0xFF), -1);
        assert_eq!(i32::from_final_40(0xFFFF_FFFF), -1);
    }

    #[test]
    fn sixty_four_bit_types_have_no_final_40() {
        assert_eq!(1i64.final_40(), None);
        assert_eq!(1u64.final_40(), None);
        assert_eq!(1f64.final_40(), None);
        assert_eq!(7u32.final_40(), Some(7));
    }

    #[test]
    fn float32_uses_ieee_bits() {
        assert_eq!(1.5f32.final_40(), Some(1.5f32.to_bits() as u64));
        assert!(f32::bits_eq(f32::from_final_40(f32::NAN.to_bits() as u64), f32::NAN));
    }

    #[test]
    fn negative_zero_is_not_wire_zero() {
        assert!(0.0f32.is_wire_zero());
        assert!(!(-0.0f32).is_wire_zero());
        assert!(0.0f64.is_wire_zero());
        assert!(!(-0.0f64).is_wire_zero());
        assert!(0u8.is_wire_zero());
        assert!(!(-1i64).is_wire_zero());
    }

    #[test]
    fn le_roundtrip_all_widths() {
        let mut buf = [0u8; 8];
        (-2i16).write_le(&mut buf);
        assert_eq!(i16::read_le(&buf), -2);
        0xDEAD_BEEFu32.write_le(&mut buf);
        assert_eq!(u32::read_le(&buf), 0xDEAD_BEEF);
        (-7.25f64).write_le(&mut buf);
        assert_eq!(f64::read_le(&buf), -7.25);
    }
}
