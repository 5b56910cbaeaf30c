//! Fixed-width numeric lists.
//!
//! Payload is a packed little-endian array of `N::WIDTH`-byte elements,
//! padded up to an 8-byte boundary on the wire.

use std::sync::Arc;

use crate::chain::{self, Chain, SizeCell};
use crate::error::{Error, Result};
use crate::number::ClawNumber;
use crate::wire::header::{GenericHeader, HEADER_SIZE, MAX_FINAL40};
use crate::wire::padding::size_with_padding;

/// A list of one numeric type.
pub struct Numbers<N: ClawNumber> {
    header: GenericHeader,
    items: Vec<N>,
    chain: Chain,
}

impl<N: ClawNumber> Numbers<N> {
    /// An empty, unattached list.
    pub fn new() -> Numbers<N> {
        Numbers {
            header: GenericHeader::new(0, N::LIST_TYPE),
            items: Vec::new(),
            chain: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Reads item `i`.
    pub fn get(&self, i: usize) -> Result<N> {
        self.items
            .get(i)
            .copied()
            .ok_or(Error::OutOfBounds { index: i, len: self.items.len() })
    }

    /// Overwrites item `i`.
    pub fn set(&mut self, i: usize, value: N) -> Result<()> {
        let len = self.items.len();
        match self.items.get_mut(i) {
            Some(slot) => {
                *slot = value;
                chain::mark_all(&self.chain);
                Ok(())
            }
            None => Err(Error::OutOfBounds { index: i, len }),
        }
    }

    /// Appends one value.
    pub fn append(&mut self, value: N) -> Result<()> {
        if self.items.len() as u64 + 1 > MAX_FINAL40 {
            return Err(Error::OutOfRange("number list exceeds 2^40 - 1 items".into()));
        }
        let old = self.wire_size();
        self.items.push(value);
        self.header.set_final_40(self.items.len() as u64)?;
        chain::add_all(&self.chain, self.wire_size() as i64 - old as i64);
        chain::mark_all(&self.chain);
        Ok(())
    }

    /// Appends every value from `values`.
    pub fn extend<I: IntoIterator<Item = N>>(&mut self, values: I) -> Result<()> {
        for v in values {
            self.append(v)?;
        }
        Ok(())
    }

    /// Borrows the items as a host-native slice.
    pub fn as_slice(&self) -> &[N] {
        &self.items
    }

    /// Materializes the list as a host-native vector.
    pub fn slice(&self) -> Vec<N> {
        self.items.clone()
    }

    /// Lazy iterator over all items.
    pub fn iter(&self) -> impl Iterator<Item = N> + '_ {
        self.items.iter().copied()
    }

    /// Lazy iterator over `[from, to)`. Bounds are checked here, once.
    pub fn range(&self, from: usize, to: usize) -> Result<impl Iterator<Item = N> + '_> {
        if from > to || to > self.items.len() {
            return Err(Error::OutOfBounds { index: to, len: self.items.len() });
        }
        Ok(self.items[from..to].iter().copied())
    }

    /// Encoded size: header plus padded element bytes, zero when empty.
    pub(crate) fn wire_size(&self) -> u64 {
        if self.items.is_empty() {
            0
        } else {
            (HEADER_SIZE + size_with_padding(self.items.len() * N::WIDTH)) as u64
        }
    }

    pub(crate) fn header(&self) -> &GenericHeader {
        &self.header
    }

    pub(crate) fn stamp(&mut self, field_num: u16) {
        self.header.set_field_num(field_num);
    }

    pub(crate) fn from_wire(header: GenericHeader, items: Vec<N>) -> Numbers<N> {
        Numbers { header, items, chain: Vec::new() }
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

impl<N: ClawNumber> Default for Numbers<N> {
    fn default() -> Numbers<N> {
        Numbers::new()
    }
}

impl<N: ClawNumber> PartialEq for Numbers<N> {
    fn eq(&self, other: &Numbers<N>) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(&other.items)
                .all(|(a, b)| N::bits_eq(*a, *b))
    }
}

impl<N: ClawNumber> std::fmt::Debug for Numbers<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Numbers")
            .field("type", &N::LIST_TYPE)
            .field("len", &self.items.len())
            .finish()
    }
}

/// Type-erased numeric list as it sits in a field slot. The
/// [`ClawNumber`] impls know their own variant, so typed access never
/// guesses.
#[derive(Debug, PartialEq)]
pub enum NumberListSlot {
    I8(Numbers<i8>),
    I16(Numbers<i16>),
    I32(Numbers<i32>),
    I64(Numbers<i64>),
    U8(Numbers<u8>),
    U16(Numbers<u16>),
    U32(Numbers<u32>),
    U64(Numbers<u64>),
    F32(Numbers<f32>),
    F64(Numbers<f64>),
}

/// Dispatches an expression over every `NumberListSlot` variant.
macro_rules! with_numbers {
    ($slot:expr, $l:ident => $body:expr) => {
        match $slot {
            $crate::lists::numbers::NumberListSlot::I8($l) => $body,
            $crate::lists::numbers::NumberListSlot::I16($l) => $body,
            $crate::lists::numbers::NumberListSlot::I32($l) => $body,
            $crate::lists::numbers::NumberListSlot::I64($l) => $body,
            $crate::lists::numbers::NumberListSlot::U8($l) => $body,
            $crate::lists::numbers::NumberListSlot::U16($l) => $body,
            $crate::lists::numbers::NumberListSlot::U32($l) => $body,
            $crate::lists::numbers::NumberListSlot::U64($l) => $body,
            $crate::lists::numbers::NumberListSlot::F32($l) => $body,
            $crate::lists::numbers::NumberListSlot::F64($l) => $body,
        }
    };
}
pub(crate) use with_numbers;

impl NumberListSlot {
    pub(crate) fn len(&self) -> usize {
        with_numbers!(self, l => l.len())
    }

    pub(crate) fn wire_size(&self) -> u64 {
        with_numbers!(self, l => l.wire_size())
    }

    pub(crate) fn header(&self) -> &GenericHeader {
        with_numbers!(self, l => l.header())
    }

    pub(crate) fn stamp(&mut self, field_num: u16) {
        with_numbers!(self, l => l.stamp(field_num));
    }

    pub(crate) fn adopt(&mut self, tail: &[Arc<SizeCell>]) {
        with_numbers!(self, l => l.adopt(tail));
    }

    pub(crate) fn retract(&mut self, n: usize) {
        with_numbers!(self, l => l.retract(n));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_slice() {
        let mut n = Numbers::<u32>::new();
        n.extend([1, 2, 3]).unwrap();
        assert_eq!(n.slice(), vec![1, 2, 3]);
        assert_eq!(n.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn wire_size_pads_to_words() {
        let mut n = Numbers::<u16>::new();
        assert_eq!(n.wire_size(), 0);
        n.append(1).unwrap();
        // header + one padded word of 2-byte elements
        assert_eq!(n.wire_size(), 16);
        n.extend([2, 3, 4]).unwrap();
        assert_eq!(n.wire_size(), 16);
        n.append(5).unwrap();
        assert_eq!(n.wire_size(), 24);
    }

    #[test]
    fn wide_elements_cost_full_words() {
        let mut n = Numbers::<f64>::new();
        n.extend([1.0, 2.0]).unwrap();
        assert_eq!(n.wire_size(), 8 + 16);
    }

    #[test]
    fn get_set_bounds() {
        let mut n = Numbers::<i8>::new();
        n.append(-4).unwrap();
        assert_eq!(n.get(0).unwrap(), -4);
        n.set(0, 9).unwrap();
        assert_eq!(n.get(0).unwrap(), 9);
        assert!(matches!(n.get(1), Err(Error::OutOfBounds { .. })));
        assert!(matches!(n.set(1, 0), Err(Error::OutOfBounds { .. })));
    }

    #[test]
    fn range_iterator_half_open() {
        let mut n = Numbers::<i32>::new();
        n.extend([10, 20, 30, 40]).unwrap();
        let got: Vec<i32> = n.range(1, 3).unwrap().collect();
        assert_eq!(got, vec![20, 30]);
        assert!(n.range(2, 1).is_err());
        assert!(n.range(0, 5).is_err());
    }

    #[test]
    fn nan_equality_is_bitwise() {
        let mut a = Numbers::<f32>::new();
        let mut b = Numbers::<f32>::new();
        a.append(f32::NAN).unwrap();
        b.append(f32::NAN).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn slot_dispatch() {
        let mut n = Numbers::<u16>::new();
        n.extend([1, 2, 3]).unwrap();
        let slot = <u16 as ClawNumber>::wrap_list(n);
        assert_eq!(slot.len(), 3);
        assert!(<u16 as ClawNumber>::list_ref(&slot).is_some());
        assert!(<u32 as ClawNumber>::list_ref(&slot).is_none());
    }

    #[test]
    fn chain_receives_deltas() {
        let cell = SizeCell::new(8);
        let mut n = Numbers::<u64>::new();
        n.adopt(&[Arc::clone(&cell)]);
        n.append(1).unwrap();
        assert_eq!(cell.total(), 8 + 16);
        n.append(2).unwrap();
        assert_eq!(cell.total(), 8 + 24);
    }
}
