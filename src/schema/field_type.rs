//! Wire field types.
//!
//! A field type is a single byte, serialized literally as the second byte
//! of a generic header. Scalars occupy 0–14; list types mirror them at
//! +40, so `is_list` is a simple range test.

/// Distance between a scalar tag and its list counterpart.
pub const LIST_OFFSET: u8 = 40;

/// The 30 Claw wire types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    Unknown = 0,
    Bool = 1,
    Int8 = 2,
    Int16 = 3,
    Int32 = 4,
    Int64 = 5,
    Uint8 = 6,
    Uint16 = 7,
    Uint32 = 8,
    Uint64 = 9,
    Float32 = 10,
    Float64 = 11,
    String = 12,
    Bytes = 13,
    Struct = 14,
    ListBools = 41,
    ListInt8 = 42,
    ListInt16 = 43,
    ListInt32 = 44,
    ListInt64 = 45,
    ListUint8 = 46,
    ListUint16 = 47,
    ListUint32 = 48,
    ListUint64 = 49,
    ListFloat32 = 50,
    ListFloat64 = 51,
    ListStrings = 52,
    ListBytes = 53,
    ListStructs = 54,
}

impl FieldType {
    /// Decodes a wire tag byte. Returns `None` for bytes outside the
    /// defined set (the decoder treats those as malformed for known
    /// fields; unknown trailing fields are never type-decoded).
    pub fn from_u8(tag: u8) -> Option<FieldType> {
        use FieldType::*;
        Some(match tag {
            0 => Unknown,
            1 => Bool,
            2 => Int8,
            3 => Int16,
            4 => Int32,
            5 => Int64,
            6 => Uint8,
            7 => Uint16,
            8 => Uint32,
            9 => Uint64,
            10 => Float32,
            11 => Float64,
            12 => String,
            13 => Bytes,
            14 => Struct,
            41 => ListBools,
            42 => ListInt8,
            43 => ListInt16,
            44 => ListInt32,
            45 => ListInt64,
            46 => ListUint8,
            47 => ListUint16,
            48 => ListUint32,
            49 => ListUint64,
            50 => ListFloat32,
            51 => ListFloat64,
            52 => ListStrings,
            53 => ListBytes,
            54 => ListStructs,
            _ => return None,
        })
    }

    /// The literal wire tag.
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// `true` for the 14 list types (tags 41..=54).
    #[inline]
    pub fn is_list(self) -> bool {
        (41..=54).contains(&(self as u8))
    }

    /// `true` for non-list, non-unknown types.
    #[inline]
    pub fn is_scalar(self) -> bool {
        let t = self as u8;
        (1..=14).contains(&t)
    }

    /// `true` for the ten fixed-width numeric scalars.
    #[inline]
    pub fn is_number(self) -> bool {
        let t = self as u8;
        (2..=11).contains(&t)
    }

    /// `true` for numeric scalars whose value lives in an 8-byte payload
    /// rather than the header's final-40.
    #[inline]
    pub fn is_sixty_four(self) -> bool {
        matches!(self, FieldType::Int64 | FieldType::Uint64 | FieldType::Float64)
    }

    /// The element type of a list type (`ListInt32` → `Int32`).
    pub fn list_elem(self) -> Option<FieldType> {
        if !self.is_list() {
            return None;
        }
        FieldType::from_u8(self as u8 - LIST_OFFSET)
    }

    /// The list type for a scalar (`Int32` → `ListInt32`).
    pub fn list_of(self) -> Option<FieldType> {
        if !self.is_scalar() {
            return None;
        }
        FieldType::from_u8(self as u8 + LIST_OFFSET)
    }
}
