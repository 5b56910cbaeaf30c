//! Byte-blob list.
//!
//! Payload is a concatenation of `(u32 length LE, raw bytes)` per entry,
//! with one trailing pad to the next 8-byte boundary. Individual entries
//! may be empty; the list as a whole encodes only when it has entries.

use std::sync::Arc;

use crate::chain::{self, Chain, SizeCell};
use crate::error::{Error, Result};
use crate::schema::field_type::FieldType;
use crate::wire::header::{GenericHeader, HEADER_SIZE, MAX_FINAL40};
use crate::wire::padding::size_with_padding;

/// Per-entry length prefix width.
pub(crate) const ENTRY_PREFIX: usize = 4;

/// A list of byte blobs.
pub struct Bytes {
    header: GenericHeader,
    entries: Vec<Vec<u8>>,
    /// Σ (4 + entry length); the unpadded payload size.
    data_size: usize,
    chain: Chain,
}

impl Bytes {
    /// An empty, unattached list.
    pub fn new() -> Bytes {
        Bytes::with_type(FieldType::ListBytes)
    }

    /// Shared constructor: string lists ride the same layout under the
    /// `ListStrings` tag.
    pub(crate) fn with_type(ft: FieldType) -> Bytes {
        Bytes {
            header: GenericHeader::new(0, ft),
            entries: Vec::new(),
            data_size: 0,
            chain: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Borrows entry `i`.
    pub fn get(&self, i: usize) -> Result<&[u8]> {
        self.entries
            .get(i)
            .map(|v| v.as_slice())
            .ok_or(Error::OutOfBounds { index: i, len: self.entries.len() })
    }

    /// Overwrites entry `i`.
    pub fn set(&mut self, i: usize, value: &[u8]) -> Result<()> {
        if i >= self.entries.len() {
            return Err(Error::OutOfBounds { index: i, len: self.entries.len() });
        }
        Self::check_entry(value)?;
        let old = self.wire_size();
        self.data_size = self.data_size - self.entries[i].len() + value.len();
        self.entries[i] = value.to_vec();
        chain::add_all(&self.chain, self.wire_size() as i64 - old as i64);
        chain::mark_all(&self.chain);
        Ok(())
    }

    /// Appends one entry.
    pub fn append(&mut self, value: &[u8]) -> Result<()> {
        Self::check_entry(value)?;
        if self.entries.len() as u64 + 1 > MAX_FINAL40 {
            return Err(Error::OutOfRange("bytes list exceeds 2^40 - 1 items".into()));
        }
        let old = self.wire_size();
        self.entries.push(value.to_vec());
        self.data_size += ENTRY_PREFIX + value.len();
        self.header.set_final_40(self.entries.len() as u64)?;
        chain::add_all(&self.chain, self.wire_size() as i64 - old as i64);
        chain::mark_all(&self.chain);
        Ok(())
    }

    /// Appends every entry from `values`.
    pub fn extend<'a, I: IntoIterator<Item = &'a [u8]>>(&mut self, values: I) -> Result<()> {
        for v in values {
            self.append(v)?;
        }
        Ok(())
    }

    /// Materializes the list as host-native vectors.
    pub fn slice(&self) -> Vec<Vec<u8>> {
        self.entries.clone()
    }

    /// Lazy iterator over all entries.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.iter().map(|v| v.as_slice())
    }

    /// Lazy iterator over `[from, to)`. Bounds are checked here, once.
    pub fn range(&self, from: usize, to: usize) -> Result<impl Iterator<Item = &[u8]>> {
        if from > to || to > self.entries.len() {
            return Err(Error::OutOfBounds { index: to, len: self.entries.len() });
        }
        Ok(self.entries[from..to].iter().map(|v| v.as_slice()))
    }

    fn check_entry(value: &[u8]) -> Result<()> {
        if value.len() > u32::MAX as usize {
            return Err(Error::OutOfRange(format!(
                "bytes list entry of {} bytes exceeds u32",
                value.len()
            )));
        }
        Ok(())
    }

    /// Encoded size: header plus padded entry data, zero when empty.
    pub(crate) fn wire_size(&self) -> u64 {
        if self.entries.is_empty() {
            0
        } else {
            (HEADER_SIZE + size_with_padding(self.data_size)) as u64
        }
    }

    pub(crate) fn data_size(&self) -> usize {
        self.data_size
    }

    pub(crate) fn header(&self) -> &GenericHeader {
        &self.header
    }

    pub(crate) fn entries(&self) -> &[Vec<u8>] {
        &self.entries
    }

    pub(crate) fn stamp(&mut self, field_num: u16) {
        self.header.set_field_num(field_num);
    }

    pub(crate) fn from_wire(header: GenericHeader, entries: Vec<Vec<u8>>) -> Bytes {
        let data_size = entries.iter().map(|e| ENTRY_PREFIX + e.len()).sum();
        Bytes { header, entries, data_size, chain: Vec::new() }
    }

    pub(crate) fn is_attached(&self) -> bool {
        !self.chain.is_empty()
    }

    pub(crate) fn adopt(&mut self, tail: &[Arc<SizeCell>]) {
        self.chain.extend_from_slice(tail);
    }

    pub(crate) fn retract(&mut self, n: usize) {
        let keep = self.chain.len() - n;
        self.chain.truncate(keep);
    }
}

impl Default for Bytes {
    fn default() -> Bytes {
        Bytes::new()
    }
}

impl PartialEq for Bytes {
    fn eq(&self, other: &Bytes) -> bool {
        self.entries == other.entries
    }
}

impl std::fmt::Debug for Bytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bytes")
            .field("len", &self.entries.len())
            .field("data_size", &self.data_size)
            .finish()
    }
}
