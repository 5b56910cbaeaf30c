//! Per-field storage cells.
//!
//! A slot is (optional header, payload). A missing header with no
//! payload means "unset". Scalars of 32 bits or fewer live entirely in
//! the header; 64-bit scalars add an 8-byte word; strings and bytes add
//! a blob. Nested messages and lists carry their own headers, so their
//! slots hold only the payload variant.

use crate::lists::numbers::NumberListSlot;
use crate::lists::{Bools, Bytes, Strings, Structs};
use crate::message::ClawStruct;
use crate::wire::header::{GenericHeader, HEADER_SIZE};
use crate::wire::padding::{size_with_padding, ZERO_WORD};

/// What a set field holds besides its header.
pub(crate) enum Payload {
    /// Value (if any) lives in the header.
    None,
    /// 8-byte little-endian payload of a 64-bit scalar.
    Word([u8; 8]),
    /// Unpadded string/bytes payload.
    Blob(Vec<u8>),
    /// Nested message; it owns its own header and size cell.
    Struct(Box<ClawStruct>),
    Bools(Bools),
    Numbers(NumberListSlot),
    BytesList(Bytes),
    StringsList(Strings),
    Structs(Structs),
}

pub(crate) struct Slot {
    pub header: Option<GenericHeader>,
    pub payload: Payload,
}

impl Slot {
    pub fn empty() -> Slot {
        Slot { header: None, payload: Payload::None }
    }

    pub fn clear(&mut self) {
        *self = Slot::empty();
    }

    /// Bytes this slot contributes to its message's encoding under the
    /// given zero-type-compression policy: the field's own header, its
    /// payload, and padding to the 8-byte boundary.
    pub fn wire_size(&self, compress_zero: bool) -> u64 {
        match (&self.header, &self.payload) {
            (None, Payload::None) => 0,
            (Some(h), Payload::None) => {
                if compress_zero && h.final_40() == 0 {
                    0
                } else {
                    HEADER_SIZE as u64
                }
            }
            (Some(_), Payload::Word(word)) => {
                if compress_zero && *word == ZERO_WORD {
                    0
                } else {
                    2 * HEADER_SIZE as u64
                }
            }
            (Some(_), Payload::Blob(blob)) => (HEADER_SIZE + size_with_padding(blob.len())) as u64,
            (_, Payload::Struct(child)) => child.total(),
            (_, Payload::Bools(l)) => l.wire_size(),
            (_, Payload::Numbers(l)) => l.wire_size(),
            (_, Payload::BytesList(l)) => l.wire_size(),
            (_, Payload::StringsList(l)) => l.wire_size(),
            (_, Payload::Structs(l)) => l.wire_size(),
            (None, _) => 0,
        }
    }
}

/// Field-by-field equality under a compression policy. Slots that would
/// not encode (unset, or an empty lazily-created list) compare equal
/// regardless of in-memory representation.
pub(crate) fn slot_eq(a: &Slot, b: &Slot, compress_zero: bool) -> bool {
    let a_absent = a.wire_size(compress_zero) == 0;
    let b_absent = b.wire_size(compress_zero) == 0;
    if a_absent || b_absent {
        return a_absent == b_absent;
    }
    match (&a.payload, &b.payload) {
        (Payload::None, Payload::None) => a.header == b.header,
        (Payload::Word(x), Payload::Word(y)) => a.header == b.header && x == y,
        (Payload::Blob(x), Payload::Blob(y)) => a.header == b.header && x == y,
        (Payload::Struct(x), Payload::Struct(y)) => x == y,
        (Payload::Bools(x), Payload::Bools(y)) => x == y,
        (Payload::Numbers(x), Payload::Numbers(y)) => x == y,
        (Payload::BytesList(x), Payload::BytesList(y)) => x == y,
        (Payload::StringsList(x), Payload::StringsList(y)) => x == y,
        (Payload::Structs(x), Payload::Structs(y)) => x == y,
        _ => false,
    }
}
