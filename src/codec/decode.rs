//! Unmarshal.
//!
//! Decoding is two-phase. The scan walks the payload computing each
//! field's offset and on-wire size without materializing values,
//! enforcing strictly increasing field numbers and every size/alignment
//! rule; any field number past the mapping's count turns the remainder
//! into opaque excess. Materialize then builds slots from the recorded
//! spans. The root retains the raw buffer and the span index so an
//! unmodified message re-encodes by replay.

use std::io::Read;
use std::sync::Arc;

use tracing::debug;

use crate::chain::SizeCell;
use crate::error::{Error, Result};
use crate::lists::{Bools, Bytes, Numbers, Strings, Structs};
use crate::message::{ClawStruct, FieldSpan, RawState};
use crate::number::ClawNumber;
use crate::schema::field_type::FieldType;
use crate::schema::mapping::{FieldDescr, Mapping};
use crate::slot::{Payload, Slot};
use crate::wire::endian::read_u32;
use crate::wire::header::{GenericHeader, HEADER_SIZE};
use crate::wire::padding::{is_aligned, size_with_padding, ZERO_WORD};

/// Reads one message from a byte source.
pub(crate) fn unmarshal<R: Read + ?Sized>(
    mapping: &Arc<Mapping>,
    r: &mut R,
    compress_zero: bool,
) -> Result<ClawStruct> {
    let mut head = [0u8; HEADER_SIZE];
    read_wire(r, &mut head, "message header")?;
    let header = GenericHeader::from_bytes(head);
    let size = validate_top(&header)? as usize;

    let mut buf = vec![0u8; size];
    buf[..HEADER_SIZE].copy_from_slice(&head);
    read_wire(r, &mut buf[HEADER_SIZE..], "message payload")?;

    let (msg, _) = decode_message(mapping, &buf, compress_zero, true)?;
    Ok(msg)
}

/// Decodes one message from the front of `bytes`; trailing bytes beyond
/// the declared size are left for the caller.
pub(crate) fn from_bytes(
    mapping: &Arc<Mapping>,
    bytes: &[u8],
    compress_zero: bool,
) -> Result<ClawStruct> {
    if bytes.len() < HEADER_SIZE {
        return Err(Error::malformed("message header truncated"));
    }
    let header = GenericHeader::read_at(bytes, 0);
    let size = validate_top(&header)? as usize;
    if size > bytes.len() {
        return Err(Error::Malformed(format!(
            "declared size {size} exceeds available {} bytes",
            bytes.len()
        )));
    }
    let (msg, _) = decode_message(mapping, &bytes[..size], compress_zero, true)?;
    Ok(msg)
}

fn read_wire<R: Read + ?Sized>(r: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => Error::Malformed(format!("{what} truncated")),
        _ => Error::Io(e),
    })
}

/// Top-level header checks shared by the stream and slice entry points.
fn validate_top(header: &GenericHeader) -> Result<u64> {
    if header.field_type() != FieldType::Struct.as_u8() {
        return Err(Error::Malformed(format!(
            "top-level field type {} is not a struct",
            header.field_type()
        )));
    }
    let size = header.final_40();
    if size < HEADER_SIZE as u64 || !is_aligned(size as usize) {
        return Err(Error::Malformed(format!(
            "struct size {size} is not a positive multiple of 8"
        )));
    }
    Ok(size)
}

/// Decodes one full struct encoding. `buf` spans exactly the struct,
/// header included. The bool result reports whether any field was
/// dropped by zero-type-compression, which disqualifies raw retention
/// up the whole tree.
fn decode_message(
    mapping: &Arc<Mapping>,
    buf: &[u8],
    compress_zero: bool,
    retain_raw: bool,
) -> Result<(ClawStruct, bool)> {
    let header = GenericHeader::read_at(buf, 0);
    let size = validate_top(&header)?;
    if size != buf.len() as u64 {
        return Err(Error::Malformed(format!(
            "struct declares {size} bytes but spans {}",
            buf.len()
        )));
    }
    let payload = &buf[HEADER_SIZE..];

    let (spans, excess_start) = scan(mapping, payload)?;

    let mut msg = ClawStruct::new(Arc::clone(mapping));
    msg.header = header;
    msg.compress_zero = compress_zero;

    let mut dropped = false;
    let mut kept: u64 = 0;
    for span in &spans {
        let descr = mapping.field(span.field_num).ok_or_else(|| {
            Error::InternalInvariant(format!("scanned field {} has no descriptor", span.field_num))
        })?;
        let body = &payload[span.offset..span.offset + span.size];
        kept += materialize(&mut msg, descr, body, compress_zero, &mut dropped)?;
    }

    match excess_start {
        Some(at) => {
            msg.excess = payload[at..].to_vec();
            kept += msg.excess.len() as u64;
        }
        None => {}
    }

    msg.cell.set_total(HEADER_SIZE as u64 + kept);
    let field_count = spans.len();
    if dropped {
        // The raw bytes no longer match the in-memory message.
        msg.cell.mark_modified();
    } else if retain_raw {
        msg.raw = Some(RawState { buf: buf.to_vec(), index: spans });
    }

    debug!(
        mapping = mapping.name(),
        bytes = buf.len(),
        fields = field_count,
        excess = msg.excess.len(),
        "decoded message"
    );
    Ok((msg, dropped))
}

/// Scan phase: per-field `(number, offset, size)` records plus the
/// offset where unknown trailing fields begin, if any.
fn scan(mapping: &Arc<Mapping>, payload: &[u8]) -> Result<(Vec<FieldSpan>, Option<usize>)> {
    let mut spans = Vec::new();
    let mut off = 0usize;
    let mut last: Option<u16> = None;

    while off < payload.len() {
        if payload.len() - off < HEADER_SIZE {
            return Err(Error::malformed("field header truncated"));
        }
        let h = GenericHeader::read_at(payload, off);
        let num = h.field_num();

        // Unknown-field passthrough: everything from here on is opaque.
        if num as usize >= mapping.len() {
            return Ok((spans, Some(off)));
        }
        if let Some(prev) = last {
            if num <= prev {
                return Err(Error::Malformed(format!(
                    "field number {num} does not increase after {prev}"
                )));
            }
        }
        last = Some(num);

        let descr = mapping.field(num).ok_or_else(|| {
            Error::InternalInvariant(format!("field {num} vanished from the mapping"))
        })?;
        if h.field_type() != descr.field_type().as_u8() {
            return Err(Error::Malformed(format!(
                "field {num} carries type {} but the schema declares {:?}",
                h.field_type(),
                descr.field_type()
            )));
        }

        let size = field_wire_size(descr.field_type(), &h, payload, off)?;
        spans.push(FieldSpan { field_num: num, offset: off, size });
        off += size;
    }
    Ok((spans, None))
}

/// Computes one field's on-wire size from its header, validating that
/// the payload actually holds it.
fn field_wire_size(
    ft: FieldType,
    h: &GenericHeader,
    payload: &[u8],
    off: usize,
) -> Result<usize> {
    let remaining = (payload.len() - off) as u64;
    let head = HEADER_SIZE as u64;

    use FieldType as FT;
    let size = match ft {
        FT::Bool
        | FT::Int8
        | FT::Int16
        | FT::Int32
        | FT::Uint8
        | FT::Uint16
        | FT::Uint32
        | FT::Float32 => head,

        FT::Int64 | FT::Uint64 | FT::Float64 => {
            if remaining < 2 * head {
                return Err(Error::malformed("64-bit field truncated"));
            }
            2 * head
        }

        FT::String | FT::Bytes => {
            let len = h.final_40();
            if len == 0 {
                return Err(Error::malformed("zero-length string/bytes field on wire"));
            }
            if head + len > remaining {
                return Err(Error::malformed("string/bytes payload truncated"));
            }
            let size = head + size_with_padding(len as usize) as u64;
            if size > remaining {
                return Err(Error::malformed("string/bytes padding missing"));
            }
            size
        }

        FT::Struct => {
            let size = h.final_40();
            if size < head || !is_aligned(size as usize) {
                return Err(Error::Malformed(format!(
                    "nested struct size {size} is not a positive multiple of 8"
                )));
            }
            if size > remaining {
                return Err(Error::malformed("nested struct truncated"));
            }
            size
        }

        FT::ListBools => {
            let count = list_count(h)?;
            let size = head + count.div_ceil(64) * head;
            if size > remaining {
                return Err(Error::malformed("bool list payload shorter than declared"));
            }
            size
        }

        FT::ListInt8
        | FT::ListInt16
        | FT::ListInt32
        | FT::ListInt64
        | FT::ListUint8
        | FT::ListUint16
        | FT::ListUint32
        | FT::ListUint64
        | FT::ListFloat32
        | FT::ListFloat64 => {
            let count = list_count(h)?;
            let data = count * number_width(ft) as u64;
            if head + data > remaining {
                return Err(Error::malformed("number list payload shorter than declared"));
            }
            let size = head + size_with_padding(data as usize) as u64;
            if size > remaining {
                return Err(Error::malformed("number list padding missing"));
            }
            size
        }

        FT::ListStrings | FT::ListBytes => {
            let count = list_count(h)?;
            let mut o = off + HEADER_SIZE;
            for _ in 0..count {
                if payload.len() - o < 4 {
                    return Err(Error::malformed("bytes list entry length truncated"));
                }
                let len = read_u32(payload, o) as usize;
                o += 4;
                if payload.len() - o < len {
                    return Err(Error::malformed("bytes list entry truncated"));
                }
                o += len;
            }
            let data = o - (off + HEADER_SIZE);
            let size = head + size_with_padding(data) as u64;
            if size > remaining {
                return Err(Error::malformed("bytes list padding missing"));
            }
            size
        }

        FT::ListStructs => {
            let count = list_count(h)?;
            let mut o = off + HEADER_SIZE;
            for _ in 0..count {
                if payload.len() - o < HEADER_SIZE {
                    return Err(Error::malformed("struct list element header truncated"));
                }
                let eh = GenericHeader::read_at(payload, o);
                if eh.field_type() != FT::Struct.as_u8() {
                    return Err(Error::Malformed(format!(
                        "struct list element carries type {}",
                        eh.field_type()
                    )));
                }
                let esz = eh.final_40() as usize;
                if esz < HEADER_SIZE || !is_aligned(esz) {
                    return Err(Error::malformed("struct list element size invalid"));
                }
                if payload.len() - o < esz {
                    return Err(Error::malformed("struct list element truncated"));
                }
                o += esz;
            }
            (o - off) as u64
        }

        FT::Unknown => {
            return Err(Error::malformed("field with unknown wire type"));
        }
    };
    Ok(size as usize)
}

fn list_count(h: &GenericHeader) -> Result<u64> {
    let count = h.final_40();
    if count == 0 {
        // Empty lists are never encoded; a zero count is corrupt.
        return Err(Error::malformed("list with zero item count on wire"));
    }
    Ok(count)
}

fn number_width(ft: FieldType) -> usize {
    use FieldType as FT;
    match ft {
        FT::ListInt8 | FT::ListUint8 => 1,
        FT::ListInt16 | FT::ListUint16 => 2,
        FT::ListInt32 | FT::ListUint32 | FT::ListFloat32 => 4,
        _ => 8,
    }
}

/// Materialize phase: builds the slot for one scanned field and returns
/// its contribution to the running total.
fn materialize(
    msg: &mut ClawStruct,
    descr: &FieldDescr,
    body: &[u8],
    compress_zero: bool,
    dropped: &mut bool,
) -> Result<u64> {
    let h = GenericHeader::read_at(body, 0);
    let idx = descr.field_num() as usize;
    let cell_tail = [Arc::clone(&msg.cell)];

    use FieldType as FT;
    let contribution = match descr.field_type() {
        FT::Bool
        | FT::Int8
        | FT::Int16
        | FT::Int32
        | FT::Uint8
        | FT::Uint16
        | FT::Uint32
        | FT::Float32 => {
            if compress_zero && h.final_40() == 0 {
                *dropped = true;
                return Ok(0);
            }
            msg.slots[idx] = Slot { header: Some(h), payload: Payload::None };
            HEADER_SIZE as u64
        }

        FT::Int64 | FT::Uint64 | FT::Float64 => {
            let mut word = ZERO_WORD;
            word.copy_from_slice(&body[HEADER_SIZE..2 * HEADER_SIZE]);
            if compress_zero && word == ZERO_WORD {
                *dropped = true;
                return Ok(0);
            }
            msg.slots[idx] = Slot { header: Some(h), payload: Payload::Word(word) };
            2 * HEADER_SIZE as u64
        }

        FT::String => {
            let len = h.final_40() as usize;
            let blob = body[HEADER_SIZE..HEADER_SIZE + len].to_vec();
            std::str::from_utf8(&blob).map_err(|e| {
                Error::Malformed(format!("string field {idx} holds invalid UTF-8: {e}"))
            })?;
            msg.slots[idx] = Slot { header: Some(h), payload: Payload::Blob(blob) };
            body.len() as u64
        }

        FT::Bytes => {
            let len = h.final_40() as usize;
            let blob = body[HEADER_SIZE..HEADER_SIZE + len].to_vec();
            msg.slots[idx] = Slot { header: Some(h), payload: Payload::Blob(blob) };
            body.len() as u64
        }

        FT::Struct => {
            let child_map = child_mapping(msg, descr)?;
            let (mut child, child_dropped) =
                decode_message(&child_map, body, compress_zero, false)?;
            *dropped |= child_dropped;
            child.adopt(&cell_tail);
            let contribution = child.total();
            msg.slots[idx] = Slot { header: None, payload: Payload::Struct(Box::new(child)) };
            contribution
        }

        FT::ListBools => {
            let count = h.final_40() as usize;
            let mut l = Bools::from_wire(h, body[HEADER_SIZE..].to_vec(), count);
            l.adopt(&cell_tail);
            msg.slots[idx] = Slot { header: None, payload: Payload::Bools(l) };
            body.len() as u64
        }

        FT::ListInt8 => number_list::<i8>(msg, idx, h, body, &cell_tail),
        FT::ListInt16 => number_list::<i16>(msg, idx, h, body, &cell_tail),
        FT::ListInt32 => number_list::<i32>(msg, idx, h, body, &cell_tail),
        FT::ListInt64 => number_list::<i64>(msg, idx, h, body, &cell_tail),
        FT::ListUint8 => number_list::<u8>(msg, idx, h, body, &cell_tail),
        FT::ListUint16 => number_list::<u16>(msg, idx, h, body, &cell_tail),
        FT::ListUint32 => number_list::<u32>(msg, idx, h, body, &cell_tail),
        FT::ListUint64 => number_list::<u64>(msg, idx, h, body, &cell_tail),
        FT::ListFloat32 => number_list::<f32>(msg, idx, h, body, &cell_tail),
        FT::ListFloat64 => number_list::<f64>(msg, idx, h, body, &cell_tail),

        FT::ListBytes => {
            let entries = blob_entries(h, body);
            let mut l = Bytes::from_wire(h, entries);
            l.adopt(&cell_tail);
            msg.slots[idx] = Slot { header: None, payload: Payload::BytesList(l) };
            body.len() as u64
        }

        FT::ListStrings => {
            let mut entries = Vec::with_capacity(h.final_40() as usize);
            for raw in blob_entries(h, body) {
                let s = String::from_utf8(raw).map_err(|e| {
                    Error::Malformed(format!("string list {idx} holds invalid UTF-8: {e}"))
                })?;
                entries.push(s);
            }
            let mut l = Strings::from_wire(h, entries);
            l.adopt(&cell_tail);
            msg.slots[idx] = Slot { header: None, payload: Payload::StringsList(l) };
            body.len() as u64
        }

        FT::ListStructs => {
            let child_map = child_mapping(msg, descr)?;
            let count = h.final_40() as usize;
            let mut elems = Vec::with_capacity(count);
            let mut o = HEADER_SIZE;
            for _ in 0..count {
                let eh = GenericHeader::read_at(body, o);
                let esz = eh.final_40() as usize;
                let (elem, elem_dropped) =
                    decode_message(&child_map, &body[o..o + esz], compress_zero, false)?;
                *dropped |= elem_dropped;
                elems.push(elem);
                o += esz;
            }
            let mut l = Structs::from_wire(h, child_map, elems);
            l.adopt(&cell_tail);
            let contribution = l.wire_size();
            msg.slots[idx] = Slot { header: None, payload: Payload::Structs(l) };
            contribution
        }

        FT::Unknown => {
            return Err(Error::InternalInvariant(format!(
                "field {idx} reached materialize with no wire type"
            )));
        }
    };
    Ok(contribution)
}

fn child_mapping(msg: &ClawStruct, descr: &FieldDescr) -> Result<Arc<Mapping>> {
    descr
        .child()
        .ok_or_else(|| {
            Error::InternalInvariant(format!(
                "struct field {} lacks a child mapping",
                descr.field_num()
            ))
        })
        .map(|c| c.resolve(msg.mapping()))
}

fn number_list<N: ClawNumber>(
    msg: &mut ClawStruct,
    idx: usize,
    h: GenericHeader,
    body: &[u8],
    cell_tail: &[Arc<SizeCell>],
) -> u64 {
    let count = h.final_40() as usize;
    let items = (0..count)
        .map(|i| N::read_le(&body[HEADER_SIZE + i * N::WIDTH..]))
        .collect();
    let mut l = Numbers::<N>::from_wire(h, items);
    l.adopt(cell_tail);
    msg.slots[idx] = Slot { header: None, payload: Payload::Numbers(N::wrap_list(l)) };
    body.len() as u64
}

/// Splits a bytes/strings list payload into its entries. Sizes were
/// validated during scan.
fn blob_entries(h: GenericHeader, body: &[u8]) -> Vec<Vec<u8>> {
    let count = h.final_40() as usize;
    let mut entries = Vec::with_capacity(count);
    let mut o = HEADER_SIZE;
    for _ in 0..count {
        let len = read_u32(body, o) as usize;
        o += 4;
        entries.push(body[o..o + len].to_vec());
        o += len;
    }
    entries
}
