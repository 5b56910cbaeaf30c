//! List of nested messages.
//!
//! Payload is the concatenation of each element's full struct encoding;
//! there is no framing between elements. Element headers carry the list
//! index as their field number, which caps a struct list at the u16
//! field-number space.

use std::sync::Arc;

use crate::chain::{self, Chain, SizeCell};
use crate::error::{Error, Result};
use crate::message::ClawStruct;
use crate::schema::field_type::FieldType;
use crate::schema::mapping::Mapping;
use crate::wire::header::{GenericHeader, HEADER_SIZE};

/// Largest number of elements a struct list can hold: element field
/// numbers are u16 on the wire.
pub const MAX_STRUCT_LIST_LEN: usize = u16::MAX as usize + 1;

/// A list of messages sharing one mapping.
pub struct Structs {
    header: GenericHeader,
    mapping: Arc<Mapping>,
    elems: Vec<ClawStruct>,
    chain: Chain,
}

impl Structs {
    /// An empty, unattached list of `mapping`-typed elements.
    pub fn new(mapping: Arc<Mapping>) -> Structs {
        Structs {
            header: GenericHeader::new(0, FieldType::ListStructs),
            mapping,
            elems: Vec::new(),
            chain: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// The element type's mapping.
    pub fn mapping(&self) -> &Arc<Mapping> {
        &self.mapping
    }

    /// Borrows element `i`.
    pub fn get(&self, i: usize) -> Result<&ClawStruct> {
        self.elems
            .get(i)
            .ok_or(Error::OutOfBounds { index: i, len: self.elems.len() })
    }

    /// Mutably borrows element `i`. Mutations propagate through the
    /// element's own cell chain.
    pub fn get_mut(&mut self, i: usize) -> Result<&mut ClawStruct> {
        let len = self.elems.len();
        self.elems
            .get_mut(i)
            .ok_or(Error::OutOfBounds { index: i, len })
    }

    /// Appends an element. The element must be unattached and carry this
    /// list's mapping; its header is stamped with the list index.
    pub fn append(&mut self, mut elem: ClawStruct) -> Result<()> {
        if !Arc::ptr_eq(elem.mapping(), &self.mapping) {
            return Err(Error::TypeMismatch(format!(
                "struct list of {} cannot hold a {} element",
                self.mapping.name(),
                elem.mapping().name()
            )));
        }
        if elem.is_attached() {
            return Err(Error::AlreadyAttached);
        }
        if self.elems.len() >= MAX_STRUCT_LIST_LEN {
            return Err(Error::OutOfRange(format!(
                "struct list exceeds {MAX_STRUCT_LIST_LEN} elements"
            )));
        }
        let old = self.wire_size();
        elem.stamp_field_num(self.elems.len() as u16);
        elem.disarm_raw();
        elem.adopt(&self.chain);
        self.elems.push(elem);
        self.header.set_final_40(self.elems.len() as u64)?;
        chain::add_all(&self.chain, self.wire_size() as i64 - old as i64);
        chain::mark_all(&self.chain);
        Ok(())
    }

    /// Lazy iterator over all elements.
    pub fn iter(&self) -> impl Iterator<Item = &ClawStruct> {
        self.elems.iter()
    }

    /// Lazy iterator over `[from, to)`. Bounds are checked here, once.
    pub fn range(&self, from: usize, to: usize) -> Result<impl Iterator<Item = &ClawStruct>> {
        if from > to || to > self.elems.len() {
            return Err(Error::OutOfBounds { index: to, len: self.elems.len() });
        }
        Ok(self.elems[from..to].iter())
    }

    /// Encoded size: list header plus every element's total, zero when
    /// empty. Element totals are live atomic reads, so a mutation deep in
    /// an element is reflected immediately.
    pub(crate) fn wire_size(&self) -> u64 {
        if self.elems.is_empty() {
            0
        } else {
            HEADER_SIZE as u64 + self.elems.iter().map(|e| e.total()).sum::<u64>()
        }
    }

    pub(crate) fn header(&self) -> &GenericHeader {
        &self.header
    }

    pub(crate) fn elems(&self) -> &[ClawStruct] {
        &self.elems
    }

    pub(crate) fn stamp(&mut self, field_num: u16) {
        self.header.set_field_num(field_num);
    }

    pub(crate) fn from_wire(
        header: GenericHeader,
        mapping: Arc<Mapping>,
        elems: Vec<ClawStruct>,
    ) -> Structs {
        Structs { header, mapping, elems, chain: Vec::new() }
    }

    pub(crate) fn is_attached(&self) -> bool {
        !self.chain.is_empty()
    }

    pub(crate) fn adopt(&mut self, tail: &[Arc<SizeCell>]) {
        self.chain.extend_from_slice(tail);
        for e in &mut self.elems {
            e.adopt(tail);
        }
    }

    pub(crate) fn retract(&mut self, n: usize) {
        let keep = self.chain.len() - n;
        self.chain.truncate(keep);
        for e in &mut self.elems {
            e.retract(n);
        }
    }
}

impl PartialEq for Structs {
    fn eq(&self, other: &Structs) -> bool {
        self.elems == other.elems
    }
}

impl std::fmt::Debug for Structs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Structs")
            .field("mapping", &self.mapping.name())
            .field("len", &self.elems.len())
            .finish()
    }
}
