//! Deterministic marshal.
//!
//! Fields are written in ascending field-number order, which is slot
//! order; each field's header is re-stamped with its slot index on the
//! way out. A message decoded and never modified replays its retained
//! raw buffer verbatim instead of re-encoding.

use std::io::Write;

use tracing::trace;

use crate::error::{Error, Result};
use crate::lists::numbers::with_numbers;
use crate::lists::Numbers;
use crate::message::ClawStruct;
use crate::number::ClawNumber;
use crate::schema::field_type::FieldType;
use crate::slot::{Payload, Slot};
use crate::wire::endian::put_u32;
use crate::wire::header::HEADER_SIZE;
use crate::wire::padding::{is_aligned, pad_slice, size_with_padding, ZERO_WORD};

/// Writes `msg` to `w` and returns bytes written. Fails with
/// `InternalInvariant` when the running total disagrees with what was
/// actually produced.
pub(crate) fn marshal<W: Write + ?Sized>(msg: &ClawStruct, w: &mut W) -> Result<usize> {
    let total = msg.total();
    if !is_aligned(total as usize) {
        return Err(Error::InternalInvariant(format!(
            "message total {total} is not 8-byte aligned"
        )));
    }

    // Fast path: a decoded, unmodified message is byte-identical to its
    // input.
    if let Some(raw) = &msg.raw {
        if !msg.cell.is_modified() {
            if raw.buf.len() as u64 != total {
                return Err(Error::InternalInvariant(format!(
                    "retained raw buffer is {} bytes, total is {total}",
                    raw.buf.len()
                )));
            }
            w.write_all(&raw.buf)?;
            trace!(bytes = raw.buf.len(), "marshal replayed raw buffer");
            return Ok(raw.buf.len());
        }
    }

    let written = encode_message(msg, msg.field_num(), w)?;
    if written as u64 != total {
        return Err(Error::InternalInvariant(format!(
            "marshal wrote {written} bytes, running total is {total}"
        )));
    }
    trace!(bytes = written, fields = msg.field_count(), "marshal encoded message");
    Ok(written)
}

/// Encodes one message: stamped header, fields in slot order, excess.
fn encode_message<W: Write + ?Sized>(
    msg: &ClawStruct,
    field_num: u16,
    w: &mut W,
) -> Result<usize> {
    let mut header = msg.header;
    header.set_field_num(field_num);
    header.set_final_40(msg.total())?;
    header.write_to(w)?;
    let mut written = HEADER_SIZE;

    for (idx, slot) in msg.slots.iter().enumerate() {
        written += encode_field(msg, idx as u16, slot, w)?;
    }

    if !msg.excess.is_empty() {
        w.write_all(&msg.excess)?;
        written += msg.excess.len();
    }
    Ok(written)
}

/// Per-field dispatch keyed on the mapping's declared type.
fn encode_field<W: Write + ?Sized>(
    msg: &ClawStruct,
    num: u16,
    slot: &Slot,
    w: &mut W,
) -> Result<usize> {
    let descr = msg
        .mapping
        .field(num)
        .ok_or_else(|| Error::InternalInvariant(format!("slot {num} has no descriptor")))?;

    use FieldType as FT;
    match descr.field_type() {
        FT::Bool
        | FT::Int8
        | FT::Int16
        | FT::Int32
        | FT::Uint8
        | FT::Uint16
        | FT::Uint32
        | FT::Float32 => encode_scalar(msg.compress_zero, num, slot, w),
        FT::Int64 | FT::Uint64 | FT::Float64 => encode_scalar64(msg.compress_zero, num, slot, w),
        FT::String | FT::Bytes => encode_blob(num, slot, w),
        FT::Struct => match &slot.payload {
            Payload::Struct(child) => encode_message(child, num, w),
            _ => Ok(0),
        },
        FT::ListBools => match &slot.payload {
            Payload::Bools(l) => {
                if l.is_empty() {
                    return Ok(0);
                }
                let mut h = *l.header();
                h.set_field_num(num);
                h.write_to(w)?;
                w.write_all(l.data())?;
                Ok(HEADER_SIZE + l.data().len())
            }
            _ => Ok(0),
        },
        FT::ListInt8
        | FT::ListInt16
        | FT::ListInt32
        | FT::ListInt64
        | FT::ListUint8
        | FT::ListUint16
        | FT::ListUint32
        | FT::ListUint64
        | FT::ListFloat32
        | FT::ListFloat64 => match &slot.payload {
            Payload::Numbers(l) => with_numbers!(l, inner => encode_numbers(inner, num, w)),
            _ => Ok(0),
        },
        FT::ListStrings => match &slot.payload {
            Payload::StringsList(l) => {
                if l.is_empty() {
                    return Ok(0);
                }
                let mut h = *l.header();
                h.set_field_num(num);
                h.write_to(w)?;
                for entry in l.entries() {
                    put_u32(w, entry.len() as u32)?;
                    w.write_all(entry.as_bytes())?;
                }
                w.write_all(pad_slice(l.data_size()))?;
                Ok(HEADER_SIZE + size_with_padding(l.data_size()))
            }
            _ => Ok(0),
        },
        FT::ListBytes => match &slot.payload {
            Payload::BytesList(l) => {
                if l.is_empty() {
                    return Ok(0);
                }
                let mut h = *l.header();
                h.set_field_num(num);
                h.write_to(w)?;
                for entry in l.entries() {
                    put_u32(w, entry.len() as u32)?;
                    w.write_all(entry)?;
                }
                w.write_all(pad_slice(l.data_size()))?;
                Ok(HEADER_SIZE + size_with_padding(l.data_size()))
            }
            _ => Ok(0),
        },
        FT::ListStructs => match &slot.payload {
            Payload::Structs(l) => {
                if l.is_empty() {
                    return Ok(0);
                }
                // Element headers carry the list index as a u16.
                if l.elems().len() > u16::MAX as usize + 1 {
                    return Err(Error::OutOfRange(format!(
                        "struct list of {} elements exceeds the u16 index space",
                        l.elems().len()
                    )));
                }
                let mut h = *l.header();
                h.set_field_num(num);
                h.write_to(w)?;
                let mut written = HEADER_SIZE;
                for (i, elem) in l.elems().iter().enumerate() {
                    written += encode_message(elem, i as u16, w)?;
                }
                Ok(written)
            }
            _ => Ok(0),
        },
        FT::Unknown => Err(Error::InternalInvariant(format!(
            "field {num} has no wire type"
        ))),
    }
}

/// Header-resident scalars. With zero-type-compression on, an all-zero
/// final-40 writes nothing (unreachable for slots counted under the
/// set-time policy, kept as the last line of defense).
fn encode_scalar<W: Write + ?Sized>(
    compress_zero: bool,
    num: u16,
    slot: &Slot,
    w: &mut W,
) -> Result<usize> {
    let Some(h) = &slot.header else { return Ok(0) };
    let mut h = *h;
    h.set_field_num(num);
    if compress_zero && h.final_40() == 0 {
        return Ok(0);
    }
    h.write_to(w)?;
    Ok(HEADER_SIZE)
}

/// 64-bit scalars: header plus an 8-byte payload word.
fn encode_scalar64<W: Write + ?Sized>(
    compress_zero: bool,
    num: u16,
    slot: &Slot,
    w: &mut W,
) -> Result<usize> {
    match (&slot.header, &slot.payload) {
        (Some(h), Payload::Word(word)) => {
            if compress_zero && *word == ZERO_WORD {
                return Ok(0);
            }
            let mut h = *h;
            h.set_field_num(num);
            h.write_to(w)?;
            w.write_all(word)?;
            Ok(2 * HEADER_SIZE)
        }
        _ => Ok(0),
    }
}

/// String/bytes: header, payload, zero padding to the word boundary.
fn encode_blob<W: Write + ?Sized>(num: u16, slot: &Slot, w: &mut W) -> Result<usize> {
    match (&slot.header, &slot.payload) {
        (Some(h), Payload::Blob(blob)) => {
            if blob.is_empty() {
                return Ok(0);
            }
            let mut h = *h;
            h.set_field_num(num);
            h.write_to(w)?;
            w.write_all(blob)?;
            w.write_all(pad_slice(blob.len()))?;
            Ok(HEADER_SIZE + size_with_padding(blob.len()))
        }
        _ => Ok(0),
    }
}

/// Numeric list: packed little-endian elements plus trailing padding.
fn encode_numbers<N: ClawNumber, W: Write + ?Sized>(
    list: &Numbers<N>,
    num: u16,
    w: &mut W,
) -> Result<usize> {
    if list.is_empty() {
        return Ok(0);
    }
    let mut h = *list.header();
    h.set_field_num(num);
    h.write_to(w)?;
    let mut tmp = ZERO_WORD;
    for v in list.iter() {
        v.write_le(&mut tmp);
        w.write_all(&tmp[..N::WIDTH])?;
    }
    let data = list.len() * N::WIDTH;
    w.write_all(pad_slice(data))?;
    Ok(HEADER_SIZE + size_with_padding(data))
}
