//! The generic 8-byte header.
//!
//! Every value on the wire starts with one of these. The logical layout,
//! bit positions with LSB = 0 over the little-endian u64 view:
//!
//! ```text
//! bits [0..16)   field number (u16)
//! bits [16..24)  field type tag (u8)
//! bits [24..64)  final-40 (u40) — meaning depends on the field type
//! ```
//!
//! Final-40 holds the value itself for scalars of 32 bits or fewer, a
//! byte length for string/bytes, an item count for lists, and the total
//! encoded size for structs.

use std::fmt;
use std::io::{self, Write};

use crate::bits;
use crate::error::{Error, Result};
use crate::schema::field_type::FieldType;

/// Size of a generic header on the wire.
pub const HEADER_SIZE: usize = 8;

/// Largest value final-40 can carry: 2^40 − 1.
pub const MAX_FINAL40: u64 = (1u64 << 40) - 1;

const FIELD_NUM_LO: u32 = 0;
const FIELD_NUM_HI: u32 = 16;
const FIELD_TYPE_LO: u32 = 16;
const FIELD_TYPE_HI: u32 = 24;
const FINAL40_LO: u32 = 24;
const FINAL40_HI: u32 = 64;

/// Packed (field-number, field-type, final-40) view over 8 bytes.
///
/// The byte array is the wire representation; accessors go through the
/// u64 view so the packing stays identical on every host.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct GenericHeader {
    raw: [u8; HEADER_SIZE],
}

impl GenericHeader {
    /// A header with the given number and type and a zero final-40.
    pub fn new(field_num: u16, field_type: FieldType) -> GenericHeader {
        let mut h = GenericHeader { raw: [0; HEADER_SIZE] };
        h.set_field_num(field_num);
        h.set_field_type(field_type);
        h
    }

    /// Wraps 8 wire bytes.
    #[inline]
    pub fn from_bytes(raw: [u8; HEADER_SIZE]) -> GenericHeader {
        GenericHeader { raw }
    }

    /// Reads a header from a slice at `offset`.
    ///
    /// # Panics
    ///
    /// Panics when fewer than 8 bytes remain; the decoder checks first.
    pub fn read_at(src: &[u8], offset: usize) -> GenericHeader {
        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&src[offset..offset + HEADER_SIZE]);
        GenericHeader { raw }
    }

    /// The wire bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; HEADER_SIZE] {
        &self.raw
    }

    #[inline]
    fn load(&self) -> u64 {
        u64::from_le_bytes(self.raw)
    }

    #[inline]
    fn store(&mut self, word: u64) {
        self.raw = word.to_le_bytes();
    }

    /// Field number, bits [0..16).
    #[inline]
    pub fn field_num(&self) -> u16 {
        bits::get_bits(self.load(), bits::mask(FIELD_NUM_LO, FIELD_NUM_HI), FIELD_NUM_LO) as u16
    }

    /// Stamps the field number.
    #[inline]
    pub fn set_field_num(&mut self, num: u16) {
        let word = bits::set_value(num as u64, self.load(), FIELD_NUM_LO, FIELD_NUM_HI);
        self.store(word);
    }

    /// Raw field-type tag, bits [16..24). Serialized literally; decode
    /// with [`FieldType::from_u8`] when the field is known to the schema.
    #[inline]
    pub fn field_type(&self) -> u8 {
        bits::get_bits(self.load(), bits::mask(FIELD_TYPE_LO, FIELD_TYPE_HI), FIELD_TYPE_LO) as u8
    }

    /// Stamps the field type.
    #[inline]
    pub fn set_field_type(&mut self, ft: FieldType) {
        let word = bits::set_value(ft.as_u8() as u64, self.load(), FIELD_TYPE_LO, FIELD_TYPE_HI);
        self.store(word);
    }

    /// The 40-bit trailing value, bits [24..64).
    #[inline]
    pub fn final_40(&self) -> u64 {
        bits::get_bits(self.load(), bits::mask(FINAL40_LO, FINAL40_HI), FINAL40_LO)
    }

    /// Writes the 40-bit trailing value. The range is cleared before the
    /// new value is merged so no old bits survive.
    pub fn set_final_40(&mut self, value: u64) -> Result<()> {
        if value > MAX_FINAL40 {
            return Err(Error::OutOfRange(format!(
                "final-40 value {value} exceeds {MAX_FINAL40}"
            )));
        }
        let word = bits::set_value(value, self.load(), FINAL40_LO, FINAL40_HI);
        self.store(word);
        Ok(())
    }

    /// Infallible final-40 write for values already capped upstream
    /// (list counts, blob lengths, and scalar bit patterns are all
    /// enforced at their entry points).
    ///
    /// # Panics
    ///
    /// Panics when `value` exceeds the cap; that is a runtime bug, not
    /// caller input.
    #[inline]
    pub(crate) fn put_final_40(&mut self, value: u64) {
        let word = bits::set_value(value, self.load(), FINAL40_LO, FINAL40_HI);
        self.store(word);
    }

    /// Writes the header to a byte sink.
    #[inline]
    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.raw)
    }
}

impl fmt::Debug for GenericHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericHeader")
            .field("field_num", &self.field_num())
            .field("field_type", &self.field_type())
            .field("final_40", &self.final_40())
            .finish()
    }
}
