//! The in-memory message.
//!
//! A [`ClawStruct`] owns its field slots, its unknown-field excess
//! buffer, and a shared size cell holding the running wire total. The
//! total always counts the message header plus every present field's
//! header, payload, and padding, so `total % 8 == 0` and
//! `header.final_40 == total` hold after every mutation.
//!
//! Size changes anywhere in the tree propagate additively through the
//! ancestor cell chain (see [`crate::chain`]); ownership itself only
//! ever flows downward, so attach takes children by value and delete
//! drops them.

use std::io::{Read, Write};
use std::sync::Arc;

use crate::chain::{self, Chain, SizeCell};
use crate::codec;
use crate::error::{Error, Result};
use crate::lists::{Bools, Bytes, Numbers, Strings, Structs};
use crate::number::ClawNumber;
use crate::schema::field_type::FieldType;
use crate::schema::mapping::{FieldDescr, Mapping};
use crate::slot::{slot_eq, Payload, Slot};
use crate::wire::header::{GenericHeader, HEADER_SIZE, MAX_FINAL40};
use crate::wire::padding::ZERO_WORD;

/// One entry of a decoded message's field-offset index: where the field
/// sits in the retained raw buffer and how many bytes it spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpan {
    pub field_num: u16,
    /// Byte offset within the payload (after the message header).
    pub offset: usize,
    /// On-wire size including the field's own header and padding.
    pub size: usize,
}

/// Raw-buffer state retained by a decode: the exact input bytes plus the
/// per-field index. While the message stays unmodified, marshal replays
/// the buffer verbatim.
pub(crate) struct RawState {
    pub buf: Vec<u8>,
    pub index: Vec<FieldSpan>,
}

/// A message instance of one mapping.
pub struct ClawStruct {
    pub(crate) mapping: Arc<Mapping>,
    pub(crate) header: GenericHeader,
    pub(crate) slots: Vec<Slot>,
    /// Unknown trailing fields read from the wire, re-encoded verbatim.
    pub(crate) excess: Vec<u8>,
    pub(crate) cell: Arc<SizeCell>,
    /// Ancestor size cells, nearest first; empty for a root.
    pub(crate) ancestors: Chain,
    pub(crate) compress_zero: bool,
    pub(crate) raw: Option<RawState>,
}

impl ClawStruct {
    /// An empty message. Its total is the bare 8-byte header.
    pub fn new(mapping: Arc<Mapping>) -> ClawStruct {
        let mut header = GenericHeader::new(0, FieldType::Struct);
        header.put_final_40(HEADER_SIZE as u64);
        let slots = (0..mapping.len()).map(|_| Slot::empty()).collect();
        ClawStruct {
            mapping,
            header,
            slots,
            excess: Vec::new(),
            cell: SizeCell::new(HEADER_SIZE as u64),
            ancestors: Vec::new(),
            compress_zero: true,
            raw: None,
        }
    }

    /// The schema this message instantiates.
    pub fn mapping(&self) -> &Arc<Mapping> {
        &self.mapping
    }

    /// Number of fields in the mapping.
    pub fn field_count(&self) -> usize {
        self.slots.len()
    }

    /// Running wire size in bytes, message header included.
    pub fn total(&self) -> u64 {
        self.cell.total()
    }

    /// The message's own header with final-40 stamped from the live
    /// total, so `header().final_40() == total()` always holds.
    pub fn header(&self) -> GenericHeader {
        let mut h = self.header;
        h.put_final_40(self.total());
        h
    }

    /// Field number this message carries within its parent (0 for a
    /// detached root).
    pub fn field_num(&self) -> u16 {
        self.header.field_num()
    }

    /// Unknown-field bytes preserved from decode.
    pub fn excess(&self) -> &[u8] {
        &self.excess
    }

    /// Whether the field would appear in this message's encoding. With
    /// zero-type-compression disabled, scalars explicitly set to zero
    /// count as present.
    pub fn has(&self, field: u16) -> bool {
        self.slots
            .get(field as usize)
            .map(|s| s.wire_size(self.compress_zero) > 0)
            .unwrap_or(false)
    }

    /// Current zero-type-compression policy (on by default).
    pub fn zero_type_compression(&self) -> bool {
        self.compress_zero
    }

    /// Switches zero-type-compression. Turning it on removes scalar
    /// slots whose value is zero, keeping `total` equal to the encoded
    /// size; turning it off only affects future sets (a zero slot
    /// cannot exist while compression is on).
    pub fn set_zero_type_compression(&mut self, on: bool) {
        if on == self.compress_zero {
            return;
        }
        self.compress_zero = on;
        if !on {
            return;
        }
        let mut delta = 0i64;
        let mut changed = false;
        for slot in &mut self.slots {
            let zero = match (&slot.header, &slot.payload) {
                (Some(h), Payload::None) => h.final_40() == 0,
                (Some(_), Payload::Word(w)) => *w == ZERO_WORD,
                _ => false,
            };
            if zero {
                delta -= slot.wire_size(false) as i64;
                slot.clear();
                changed = true;
            }
        }
        if changed {
            self.add_to_total(delta);
            self.touch();
        }
    }

    /// Whether a decode-time raw buffer is still held.
    pub fn raw_retained(&self) -> bool {
        self.raw.is_some()
    }

    /// Whether this message (or any descendant) was mutated since it
    /// was created or decoded.
    pub fn modified(&self) -> bool {
        self.cell.is_modified()
    }

    /// The per-field offset index retained by decode, if any.
    pub fn wire_index(&self) -> Option<&[FieldSpan]> {
        self.raw.as_ref().map(|r| r.index.as_slice())
    }

    // ── scalar accessors ─────────────────────────────────────────────────────

    /// Reads a bool field; unset reads as `false`.
    pub fn get_bool(&self, field: u16) -> Result<bool> {
        self.expect_type(field, FieldType::Bool)?;
        Ok(self.slots[field as usize]
            .header
            .map(|h| h.final_40() & 1 == 1)
            .unwrap_or(false))
    }

    /// Writes a bool field. The value rides in bit 24 of the header.
    pub fn set_bool(&mut self, field: u16, value: bool) -> Result<()> {
        self.expect_type(field, FieldType::Bool)?;
        let idx = field as usize;
        let old = self.slots[idx].wire_size(self.compress_zero);
        if !value && self.compress_zero {
            self.slots[idx].clear();
        } else {
            let mut h = GenericHeader::new(field, FieldType::Bool);
            h.put_final_40(value as u64);
            self.slots[idx] = Slot { header: Some(h), payload: Payload::None };
        }
        let new = self.slots[idx].wire_size(self.compress_zero);
        self.add_to_total(new as i64 - old as i64);
        self.touch();
        Ok(())
    }

    /// Reads a numeric field; unset reads as zero. The numeric type must
    /// match the descriptor exactly.
    pub fn get_number<N: ClawNumber>(&self, field: u16) -> Result<N> {
        self.expect_type(field, N::WIRE_TYPE)?;
        let slot = &self.slots[field as usize];
        Ok(match (&slot.header, &slot.payload) {
            (Some(h), Payload::None) => N::from_final_40(h.final_40()),
            (Some(_), Payload::Word(w)) => N::read_le(w),
            _ => N::default(),
        })
    }

    /// Writes a numeric field. Values of 32 bits or fewer ride in the
    /// header's final-40; 64-bit values take an 8-byte payload.
    pub fn set_number<N: ClawNumber>(&mut self, field: u16, value: N) -> Result<()> {
        self.expect_type(field, N::WIRE_TYPE)?;
        let idx = field as usize;
        let old = self.slots[idx].wire_size(self.compress_zero);
        if value.is_wire_zero() && self.compress_zero {
            self.slots[idx].clear();
        } else {
            let mut h = GenericHeader::new(field, N::WIRE_TYPE);
            match value.final_40() {
                Some(bits) => {
                    h.put_final_40(bits);
                    self.slots[idx] = Slot { header: Some(h), payload: Payload::None };
                }
                None => {
                    let mut word = ZERO_WORD;
                    value.write_le(&mut word);
                    self.slots[idx] = Slot { header: Some(h), payload: Payload::Word(word) };
                }
            }
        }
        let new = self.slots[idx].wire_size(self.compress_zero);
        self.add_to_total(new as i64 - old as i64);
        self.touch();
        Ok(())
    }

    /// Reads a bytes field; `None` when unset.
    pub fn get_bytes(&self, field: u16) -> Result<Option<&[u8]>> {
        self.expect_type(field, FieldType::Bytes)?;
        match &self.slots[field as usize].payload {
            Payload::Blob(b) => Ok(Some(b.as_slice())),
            _ => Ok(None),
        }
    }

    /// Writes a bytes field. Empty values are forbidden; the wire cannot
    /// distinguish "set but empty" from "never set".
    pub fn set_bytes(&mut self, field: u16, value: &[u8]) -> Result<()> {
        self.expect_type(field, FieldType::Bytes)?;
        self.set_blob(field, FieldType::Bytes, value)
    }

    /// Reads a string field; `None` when unset.
    pub fn get_string(&self, field: u16) -> Result<Option<&str>> {
        self.expect_type(field, FieldType::String)?;
        match &self.slots[field as usize].payload {
            Payload::Blob(b) => std::str::from_utf8(b)
                .map(Some)
                .map_err(|e| Error::Malformed(format!("string field {field} holds invalid UTF-8: {e}"))),
            _ => Ok(None),
        }
    }

    /// Writes a string field. Empty values are forbidden.
    pub fn set_string(&mut self, field: u16, value: &str) -> Result<()> {
        self.expect_type(field, FieldType::String)?;
        self.set_blob(field, FieldType::String, value.as_bytes())
    }

    fn set_blob(&mut self, field: u16, ft: FieldType, value: &[u8]) -> Result<()> {
        if value.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "field {field}: empty {} cannot be set; delete the field instead",
                if ft == FieldType::String { "string" } else { "bytes" }
            )));
        }
        if value.len() as u64 > MAX_FINAL40 {
            return Err(Error::OutOfRange(format!(
                "field {field}: {} bytes exceed the final-40 cap",
                value.len()
            )));
        }
        let idx = field as usize;
        let old = self.slots[idx].wire_size(self.compress_zero);
        let mut h = GenericHeader::new(field, ft);
        h.put_final_40(value.len() as u64);
        self.slots[idx] = Slot { header: Some(h), payload: Payload::Blob(value.to_vec()) };
        let new = self.slots[idx].wire_size(self.compress_zero);
        self.add_to_total(new as i64 - old as i64);
        self.touch();
        Ok(())
    }

    // ── nested struct ────────────────────────────────────────────────────────

    /// Borrows a nested message; `None` when unset.
    pub fn get_struct(&self, field: u16) -> Result<Option<&ClawStruct>> {
        self.expect_type(field, FieldType::Struct)?;
        match &self.slots[field as usize].payload {
            Payload::Struct(c) => Ok(Some(c)),
            _ => Ok(None),
        }
    }

    /// Mutably borrows a nested message; `None` when unset. Mutations
    /// propagate through the child's own cell chain.
    pub fn get_struct_mut(&mut self, field: u16) -> Result<Option<&mut ClawStruct>> {
        self.expect_type(field, FieldType::Struct)?;
        match &mut self.slots[field as usize].payload {
            Payload::Struct(c) => Ok(Some(c)),
            _ => Ok(None),
        }
    }

    /// Attaches a child message. The child must be unattached and carry
    /// the field's mapping; replacing an existing child first subtracts
    /// the old child's total.
    pub fn set_struct(&mut self, field: u16, child: ClawStruct) -> Result<()> {
        let child_map = {
            let d = self.expect_type(field, FieldType::Struct)?;
            d.child()
                .ok_or_else(|| Error::InternalInvariant("struct field lacks a child mapping".into()))?
                .resolve(&self.mapping)
        };
        if !Arc::ptr_eq(child.mapping(), &child_map) {
            return Err(Error::TypeMismatch(format!(
                "field {field} holds {}, not {}",
                child_map.name(),
                child.mapping().name()
            )));
        }
        if child.is_attached() {
            return Err(Error::AlreadyAttached);
        }
        let idx = field as usize;
        let old = self.slots[idx].wire_size(self.compress_zero);
        let mut child = child;
        child.stamp_field_num(field);
        child.disarm_raw();
        let tail = self.chain_tail();
        child.adopt(&tail);
        self.slots[idx] = Slot { header: None, payload: Payload::Struct(Box::new(child)) };
        let new = self.slots[idx].wire_size(self.compress_zero);
        self.add_to_total(new as i64 - old as i64);
        self.touch();
        Ok(())
    }

    /// Detaches and returns a child message, clearing its parent link
    /// so it can live on as a root or be attached elsewhere. `None`
    /// when the field is unset.
    pub fn take_struct(&mut self, field: u16) -> Result<Option<ClawStruct>> {
        self.expect_type(field, FieldType::Struct)?;
        let idx = field as usize;
        if !matches!(self.slots[idx].payload, Payload::Struct(_)) {
            return Ok(None);
        }
        let slot = std::mem::replace(&mut self.slots[idx], Slot::empty());
        match slot.payload {
            Payload::Struct(mut child) => {
                child.retract(self.ancestors.len() + 1);
                child.stamp_field_num(0);
                self.add_to_total(-(child.total() as i64));
                self.touch();
                Ok(Some(*child))
            }
            _ => Err(Error::InternalInvariant("struct slot changed under take".into())),
        }
    }

    // ── lists ────────────────────────────────────────────────────────────────

    /// Borrows a bool list; `None` until one exists.
    pub fn bools(&self, field: u16) -> Result<Option<&Bools>> {
        self.expect_type(field, FieldType::ListBools)?;
        match &self.slots[field as usize].payload {
            Payload::Bools(l) => Ok(Some(l)),
            _ => Ok(None),
        }
    }

    /// Mutably borrows a bool list, creating an empty one on first use.
    pub fn bools_mut(&mut self, field: u16) -> Result<&mut Bools> {
        self.expect_type(field, FieldType::ListBools)?;
        let idx = field as usize;
        if !matches!(self.slots[idx].payload, Payload::Bools(_)) {
            let mut l = Bools::new();
            l.stamp(field);
            l.adopt(&self.chain_tail());
            self.slots[idx] = Slot { header: None, payload: Payload::Bools(l) };
        }
        match &mut self.slots[idx].payload {
            Payload::Bools(l) => Ok(l),
            _ => Err(Error::InternalInvariant("bool list slot corrupted".into())),
        }
    }

    /// Attaches a bool list built standalone.
    pub fn set_bools(&mut self, field: u16, list: Bools) -> Result<()> {
        self.expect_type(field, FieldType::ListBools)?;
        if list.is_attached() {
            return Err(Error::AlreadyAttached);
        }
        let mut list = list;
        list.stamp(field);
        self.install_list(field, |tail| {
            list.adopt(tail);
            Payload::Bools(list)
        })
    }

    /// Borrows a numeric list; `None` until one exists.
    pub fn numbers<N: ClawNumber>(&self, field: u16) -> Result<Option<&Numbers<N>>> {
        self.expect_type(field, N::LIST_TYPE)?;
        match &self.slots[field as usize].payload {
            Payload::Numbers(slot) => Ok(N::list_ref(slot)),
            _ => Ok(None),
        }
    }

    /// Mutably borrows a numeric list, creating an empty one on first use.
    pub fn numbers_mut<N: ClawNumber>(&mut self, field: u16) -> Result<&mut Numbers<N>> {
        self.expect_type(field, N::LIST_TYPE)?;
        let idx = field as usize;
        if !matches!(self.slots[idx].payload, Payload::Numbers(_)) {
            let mut l = Numbers::<N>::new();
            l.stamp(field);
            l.adopt(&self.chain_tail());
            self.slots[idx] = Slot { header: None, payload: Payload::Numbers(N::wrap_list(l)) };
        }
        match &mut self.slots[idx].payload {
            Payload::Numbers(slot) => N::list_mut(slot)
                .ok_or_else(|| Error::InternalInvariant("number list slot corrupted".into())),
            _ => Err(Error::InternalInvariant("number list slot corrupted".into())),
        }
    }

    /// Attaches a numeric list built standalone.
    pub fn set_numbers<N: ClawNumber>(&mut self, field: u16, list: Numbers<N>) -> Result<()> {
        self.expect_type(field, N::LIST_TYPE)?;
        if list.is_attached() {
            return Err(Error::AlreadyAttached);
        }
        let mut list = list;
        list.stamp(field);
        self.install_list(field, |tail| {
            list.adopt(tail);
            Payload::Numbers(N::wrap_list(list))
        })
    }

    /// Borrows a bytes list; `None` until one exists.
    pub fn bytes_list(&self, field: u16) -> Result<Option<&Bytes>> {
        self.expect_type(field, FieldType::ListBytes)?;
        match &self.slots[field as usize].payload {
            Payload::BytesList(l) => Ok(Some(l)),
            _ => Ok(None),
        }
    }

    /// Mutably borrows a bytes list, creating an empty one on first use.
    pub fn bytes_list_mut(&mut self, field: u16) -> Result<&mut Bytes> {
        self.expect_type(field, FieldType::ListBytes)?;
        let idx = field as usize;
        if !matches!(self.slots[idx].payload, Payload::BytesList(_)) {
            let mut l = Bytes::new();
            l.stamp(field);
            l.adopt(&self.chain_tail());
            self.slots[idx] = Slot { header: None, payload: Payload::BytesList(l) };
        }
        match &mut self.slots[idx].payload {
            Payload::BytesList(l) => Ok(l),
            _ => Err(Error::InternalInvariant("bytes list slot corrupted".into())),
        }
    }

    /// Attaches a bytes list built standalone.
    pub fn set_bytes_list(&mut self, field: u16, list: Bytes) -> Result<()> {
        self.expect_type(field, FieldType::ListBytes)?;
        if list.is_attached() {
            return Err(Error::AlreadyAttached);
        }
        let mut list = list;
        list.stamp(field);
        self.install_list(field, |tail| {
            list.adopt(tail);
            Payload::BytesList(list)
        })
    }

    /// Borrows a string list; `None` until one exists.
    pub fn strings(&self, field: u16) -> Result<Option<&Strings>> {
        self.expect_type(field, FieldType::ListStrings)?;
        match &self.slots[field as usize].payload {
            Payload::StringsList(l) => Ok(Some(l)),
            _ => Ok(None),
        }
    }

    /// Mutably borrows a string list, creating an empty one on first use.
    pub fn strings_mut(&mut self, field: u16) -> Result<&mut Strings> {
        self.expect_type(field, FieldType::ListStrings)?;
        let idx = field as usize;
        if !matches!(self.slots[idx].payload, Payload::StringsList(_)) {
            let mut l = Strings::new();
            l.stamp(field);
            l.adopt(&self.chain_tail());
            self.slots[idx] = Slot { header: None, payload: Payload::StringsList(l) };
        }
        match &mut self.slots[idx].payload {
            Payload::StringsList(l) => Ok(l),
            _ => Err(Error::InternalInvariant("string list slot corrupted".into())),
        }
    }

    /// Attaches a string list built standalone.
    pub fn set_strings(&mut self, field: u16, list: Strings) -> Result<()> {
        self.expect_type(field, FieldType::ListStrings)?;
        if list.is_attached() {
            return Err(Error::AlreadyAttached);
        }
        let mut list = list;
        list.stamp(field);
        self.install_list(field, |tail| {
            list.adopt(tail);
            Payload::StringsList(list)
        })
    }

    /// Borrows a struct list; `None` until one exists.
    pub fn structs(&self, field: u16) -> Result<Option<&Structs>> {
        self.expect_type(field, FieldType::ListStructs)?;
        match &self.slots[field as usize].payload {
            Payload::Structs(l) => Ok(Some(l)),
            _ => Ok(None),
        }
    }

    /// Mutably borrows a struct list, creating an empty one on first use.
    pub fn structs_mut(&mut self, field: u16) -> Result<&mut Structs> {
        let child_map = {
            let d = self.expect_type(field, FieldType::ListStructs)?;
            d.child()
                .ok_or_else(|| Error::InternalInvariant("struct list lacks a child mapping".into()))?
                .resolve(&self.mapping)
        };
        let idx = field as usize;
        if !matches!(self.slots[idx].payload, Payload::Structs(_)) {
            let mut l = Structs::new(child_map);
            l.stamp(field);
            l.adopt(&self.chain_tail());
            self.slots[idx] = Slot { header: None, payload: Payload::Structs(l) };
        }
        match &mut self.slots[idx].payload {
            Payload::Structs(l) => Ok(l),
            _ => Err(Error::InternalInvariant("struct list slot corrupted".into())),
        }
    }

    /// Attaches a struct list built standalone. Its mapping must equal
    /// the field's child mapping.
    pub fn set_structs(&mut self, field: u16, list: Structs) -> Result<()> {
        let child_map = {
            let d = self.expect_type(field, FieldType::ListStructs)?;
            d.child()
                .ok_or_else(|| Error::InternalInvariant("struct list lacks a child mapping".into()))?
                .resolve(&self.mapping)
        };
        if !Arc::ptr_eq(list.mapping(), &child_map) {
            return Err(Error::TypeMismatch(format!(
                "field {field} holds a list of {}, not {}",
                child_map.name(),
                list.mapping().name()
            )));
        }
        if list.is_attached() {
            return Err(Error::AlreadyAttached);
        }
        let mut list = list;
        list.stamp(field);
        self.install_list(field, |tail| {
            list.adopt(tail);
            Payload::Structs(list)
        })
    }

    // ── delete ───────────────────────────────────────────────────────────────

    /// Removes a field of any kind, subtracting its full wire size.
    /// Deleting an unset field is a no-op.
    pub fn delete(&mut self, field: u16) -> Result<()> {
        self.descr(field)?;
        let idx = field as usize;
        if self.slots[idx].header.is_none() && matches!(self.slots[idx].payload, Payload::None) {
            return Ok(());
        }
        let old = self.slots[idx].wire_size(self.compress_zero);
        self.slots[idx].clear();
        if old > 0 {
            self.add_to_total(-(old as i64));
        }
        self.touch();
        Ok(())
    }

    // ── must_* wrappers ──────────────────────────────────────────────────────

    /// Like [`get_bool`](Self::get_bool) but panics on error.
    pub fn must_get_bool(&self, field: u16) -> bool {
        match self.get_bool(field) {
            Ok(v) => v,
            Err(e) => panic!("get_bool({field}): {e}"),
        }
    }

    /// Like [`set_bool`](Self::set_bool) but panics on error.
    pub fn must_set_bool(&mut self, field: u16, value: bool) {
        if let Err(e) = self.set_bool(field, value) {
            panic!("set_bool({field}): {e}");
        }
    }

    /// Like [`get_number`](Self::get_number) but panics on error.
    pub fn must_get_number<N: ClawNumber>(&self, field: u16) -> N {
        match self.get_number(field) {
            Ok(v) => v,
            Err(e) => panic!("get_number({field}): {e}"),
        }
    }

    /// Like [`set_number`](Self::set_number) but panics on error.
    pub fn must_set_number<N: ClawNumber>(&mut self, field: u16, value: N) {
        if let Err(e) = self.set_number(field, value) {
            panic!("set_number({field}): {e}");
        }
    }

    /// Like [`get_bytes`](Self::get_bytes) but panics on error; unset
    /// reads as the empty slice.
    pub fn must_get_bytes(&self, field: u16) -> &[u8] {
        match self.get_bytes(field) {
            Ok(v) => v.unwrap_or(&[]),
            Err(e) => panic!("get_bytes({field}): {e}"),
        }
    }

    /// Like [`set_bytes`](Self::set_bytes) but panics on error.
    pub fn must_set_bytes(&mut self, field: u16, value: &[u8]) {
        if let Err(e) = self.set_bytes(field, value) {
            panic!("set_bytes({field}): {e}");
        }
    }

    /// Like [`get_string`](Self::get_string) but panics on error; unset
    /// reads as the empty string.
    pub fn must_get_string(&self, field: u16) -> &str {
        match self.get_string(field) {
            Ok(v) => v.unwrap_or(""),
            Err(e) => panic!("get_string({field}): {e}"),
        }
    }

    /// Like [`set_string`](Self::set_string) but panics on error.
    pub fn must_set_string(&mut self, field: u16, value: &str) {
        if let Err(e) = self.set_string(field, value) {
            panic!("set_string({field}): {e}");
        }
    }

    // ── marshal / unmarshal ──────────────────────────────────────────────────

    /// Writes the wire form to `w` and returns bytes written.
    pub fn marshal<W: Write + ?Sized>(&self, w: &mut W) -> Result<usize> {
        codec::encode::marshal(self, w)
    }

    /// Marshals into a fresh vector.
    pub fn marshal_to_vec(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.total() as usize);
        self.marshal(&mut out)?;
        Ok(out)
    }

    /// Reads one message from a byte source.
    pub fn unmarshal<R: Read + ?Sized>(mapping: &Arc<Mapping>, r: &mut R) -> Result<ClawStruct> {
        codec::decode::unmarshal(mapping, r, true)
    }

    /// Like [`unmarshal`](Self::unmarshal) with an explicit
    /// zero-type-compression policy for the decoded message.
    pub fn unmarshal_with<R: Read + ?Sized>(
        mapping: &Arc<Mapping>,
        r: &mut R,
        zero_type_compression: bool,
    ) -> Result<ClawStruct> {
        codec::decode::unmarshal(mapping, r, zero_type_compression)
    }

    /// Decodes one message from the front of `bytes`.
    pub fn from_bytes(mapping: &Arc<Mapping>, bytes: &[u8]) -> Result<ClawStruct> {
        codec::decode::from_bytes(mapping, bytes, true)
    }

    /// Like [`from_bytes`](Self::from_bytes) with an explicit
    /// zero-type-compression policy for the decoded message.
    pub fn from_bytes_with(
        mapping: &Arc<Mapping>,
        bytes: &[u8],
        zero_type_compression: bool,
    ) -> Result<ClawStruct> {
        codec::decode::from_bytes(mapping, bytes, zero_type_compression)
    }

    // ── internal plumbing ────────────────────────────────────────────────────

    fn descr(&self, field: u16) -> Result<&FieldDescr> {
        self.mapping.field(field).ok_or(Error::OutOfBounds {
            index: field as usize,
            len: self.mapping.len(),
        })
    }

    fn expect_type(&self, field: u16, want: FieldType) -> Result<&FieldDescr> {
        let d = self.descr(field)?;
        if d.field_type() != want {
            return Err(Error::TypeMismatch(format!(
                "field {field} ({}) is {:?}, accessed as {:?}",
                d.name(),
                d.field_type(),
                want
            )));
        }
        Ok(d)
    }

    /// Applies a byte delta to this message and every ancestor.
    fn add_to_total(&self, delta: i64) {
        self.cell.add(delta);
        chain::add_all(&self.ancestors, delta);
    }

    /// Marks this message and every ancestor modified and drops the
    /// decode-time raw buffer; the encoder fast path stays off for good.
    fn touch(&mut self) {
        self.raw = None;
        self.cell.mark_modified();
        chain::mark_all(&self.ancestors);
    }

    /// The cell path a directly-owned child or list extends its chain
    /// with: this message's cell, then its ancestors.
    fn chain_tail(&self) -> Vec<Arc<SizeCell>> {
        let mut tail = Vec::with_capacity(1 + self.ancestors.len());
        tail.push(Arc::clone(&self.cell));
        tail.extend(self.ancestors.iter().cloned());
        tail
    }

    /// Shared attach tail for `set_*` list operations: swaps the slot
    /// payload in, applies the size delta, marks the tree modified.
    fn install_list(&mut self, field: u16, build: impl FnOnce(&[Arc<SizeCell>]) -> Payload) -> Result<()> {
        let idx = field as usize;
        let old = self.slots[idx].wire_size(self.compress_zero);
        let tail = self.chain_tail();
        self.slots[idx] = Slot { header: None, payload: build(&tail) };
        let new = self.slots[idx].wire_size(self.compress_zero);
        self.add_to_total(new as i64 - old as i64);
        self.touch();
        Ok(())
    }

    pub(crate) fn is_attached(&self) -> bool {
        !self.ancestors.is_empty()
    }

    pub(crate) fn stamp_field_num(&mut self, num: u16) {
        self.header.set_field_num(num);
    }

    /// Drops a retained raw buffer without marking the tree modified;
    /// used when an attach re-stamps the header and the buffer's first
    /// bytes go stale.
    pub(crate) fn disarm_raw(&mut self) {
        self.raw = None;
    }

    /// Extends every cell chain in this subtree with `tail` (the new
    /// ancestor path, nearest first).
    pub(crate) fn adopt(&mut self, tail: &[Arc<SizeCell>]) {
        self.ancestors.extend_from_slice(tail);
        for slot in &mut self.slots {
            match &mut slot.payload {
                Payload::Struct(c) => c.adopt(tail),
                Payload::Bools(l) => l.adopt(tail),
                Payload::Numbers(l) => l.adopt(tail),
                Payload::BytesList(l) => l.adopt(tail),
                Payload::StringsList(l) => l.adopt(tail),
                Payload::Structs(l) => l.adopt(tail),
                _ => {}
            }
        }
    }

    /// Removes the outermost `n` cells from every chain in this subtree.
    pub(crate) fn retract(&mut self, n: usize) {
        let keep = self.ancestors.len() - n;
        self.ancestors.truncate(keep);
        for slot in &mut self.slots {
            match &mut slot.payload {
                Payload::Struct(c) => c.retract(n),
                Payload::Bools(l) => l.retract(n),
                Payload::Numbers(l) => l.retract(n),
                Payload::BytesList(l) => l.retract(n),
                Payload::StringsList(l) => l.retract(n),
                Payload::Structs(l) => l.retract(n),
                _ => {}
            }
        }
    }
}

impl PartialEq for ClawStruct {
    /// Field-by-field semantic equality: same mapping, equal present
    /// fields, equal excess bytes. Lazy-decode state and compression
    /// flags are representation, not value.
    fn eq(&self, other: &ClawStruct) -> bool {
        Arc::ptr_eq(&self.mapping, &other.mapping)
            && self.excess == other.excess
            && self
                .slots
                .iter()
                .zip(&other.slots)
                .all(|(a, b)| slot_eq(a, b, self.compress_zero))
    }
}

impl std::fmt::Debug for ClawStruct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClawStruct")
            .field("mapping", &self.mapping.name())
            .field("total", &self.total())
            .field("fields_set", &(0..self.slots.len() as u16).filter(|&i| self.has(i)).count())
            .field("excess", &self.excess.len())
            .finish()
    }
}
