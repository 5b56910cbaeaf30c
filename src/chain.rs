//! Size-propagation cells.
//!
//! Ownership in a message tree flows strictly downward; size and dirty
//! information flow upward through shared atomic cells instead of parent
//! pointers. Every message owns one [`SizeCell`] and carries the cells of
//! its ancestors, nearest first. A mutation deep in the tree adds its
//! byte delta to every cell on the path so no ancestor ever observes a
//! torn running total, and marks the same cells modified so retained
//! raw-buffer shortcuts disarm.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// One message's running wire size plus its modification flag.
pub(crate) struct SizeCell {
    total: AtomicU64,
    modified: AtomicBool,
}

impl SizeCell {
    pub fn new(total: u64) -> Arc<SizeCell> {
        Arc::new(SizeCell {
            total: AtomicU64::new(total),
            modified: AtomicBool::new(false),
        })
    }

    #[inline]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Release);
    }

    /// Adds a signed byte delta. Two's-complement wrapping on the
    /// unsigned atomic makes negative deltas exact.
    #[inline]
    pub fn add(&self, delta: i64) {
        if delta != 0 {
            self.total.fetch_add(delta as u64, Ordering::AcqRel);
        }
    }

    #[inline]
    pub fn mark_modified(&self) {
        self.modified.store(true, Ordering::Release);
    }

    #[inline]
    pub fn clear_modified(&self) {
        self.modified.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_modified(&self) -> bool {
        self.modified.load(Ordering::Acquire)
    }
}

impl fmt::Debug for SizeCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SizeCell")
            .field("total", &self.total())
            .field("modified", &self.is_modified())
            .finish()
    }
}

/// Ancestor cells, nearest first. Lists carry the full chain including
/// the owning message's own cell.
pub(crate) type Chain = Vec<Arc<SizeCell>>;

/// Applies a delta to every cell on a path.
pub(crate) fn add_all(cells: &[Arc<SizeCell>], delta: i64) {
    if delta == 0 {
        return;
    }
    for cell in cells {
        cell.add(delta);
    }
}

/// Marks every cell on a path modified.
pub(crate) fn mark_all(cells: &[Arc<SizeCell>]) {
    for cell in cells {
        cell.mark_modified();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_signed() {
        let c = SizeCell::new(8);
        c.add(16);
        assert_eq!(c.total(), 24);
        c.add(-24);
        assert_eq!(c.total(), 0);
    }

    #[test]
    fn chain_add_hits_every_cell() {
        let chain: Chain = vec![SizeCell::new(8), SizeCell::new(100)];
        add_all(&chain, 24);
        assert_eq!(chain[0].total(), 32);
        assert_eq!(chain[1].total(), 124);
    }

    #[test]
    fn modification_flag_transitions() {
        let c = SizeCell::new(8);
        assert!(!c.is_modified());
        mark_all(&[Arc::clone(&c)]);
        assert!(c.is_modified());
        c.clear_modified();
        assert!(!c.is_modified());
    }
}
