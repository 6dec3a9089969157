//! Per-counter shard storage
//!
//! One cache-padded atomic per slot plus a retired accumulator. Each slot has
//! a single writer (the thread bound to it), so every access is `Relaxed`.
//! Arithmetic wraps: decrements below zero are a caller error, not a panic.
//!
//! The slot array lives behind an [`ArcSwap`] so writers never take a lock.
//! Static slots are allocated once per initialization and shared by every
//! layout after that; resizing the dynamic pool swaps in a new layout that
//! reuses the same static cells, so a static slot is never relocated.

use arc_swap::ArcSwap;
use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type Cells = [CachePadded<AtomicU64>];

fn zeroed(len: usize) -> impl Iterator<Item = CachePadded<AtomicU64>> {
    (0..len).map(|_| CachePadded::new(AtomicU64::new(0)))
}

/// Static cells followed by dynamic cells
struct Layout {
    statics: Arc<Cells>,
    dynamics: Box<Cells>,
}

impl Layout {
    fn new(static_len: usize, dynamic_len: usize) -> Self {
        Self {
            statics: zeroed(static_len).collect(),
            dynamics: zeroed(dynamic_len).collect(),
        }
    }

    #[inline]
    fn cell(&self, slot: usize) -> Option<&AtomicU64> {
        match slot.checked_sub(self.statics.len()) {
            None => Some(&*self.statics[slot]),
            Some(offset) => self.dynamics.get(offset).map(|cell| &**cell),
        }
    }

    fn len(&self) -> usize {
        self.statics.len() + self.dynamics.len()
    }

    fn cells(&self) -> impl Iterator<Item = &AtomicU64> {
        self.statics
            .iter()
            .chain(self.dynamics.iter())
            .map(|cell| &**cell)
    }
}

/// Raw slot values for one counter
pub struct SlotStorage {
    layout: ArcSwap<Layout>,
    retired: CachePadded<AtomicU64>,
}

impl SlotStorage {
    /// Create storage with zeroed static and dynamic slots
    pub fn new(static_len: usize, dynamic_len: usize) -> Self {
        Self {
            layout: ArcSwap::from_pointee(Layout::new(static_len, dynamic_len)),
            retired: CachePadded::new(AtomicU64::new(0)),
        }
    }

    /// Number of provisioned slots
    pub fn len(&self) -> usize {
        self.layout.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn static_len(&self) -> usize {
        self.layout.load().statics.len()
    }

    /// Apply a signed delta to one slot
    ///
    /// Writes to an unprovisioned slot are dropped.
    #[inline]
    pub fn add(&self, slot: usize, delta: i64) {
        if let Some(cell) = self.layout.load().cell(slot) {
            cell.fetch_add(delta as u64, Ordering::Relaxed);
        }
    }

    /// Value of one slot, 0 if not provisioned
    #[inline]
    pub fn load(&self, slot: usize) -> u64 {
        self.layout
            .load()
            .cell(slot)
            .map(|cell| cell.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn retired(&self) -> u64 {
        self.retired.load(Ordering::Relaxed)
    }

    /// Sum of all live slots plus the retired accumulator
    pub fn aggregate(&self) -> u64 {
        self.layout
            .load()
            .cells()
            .fold(self.retired(), |sum, cell| {
                sum.wrapping_add(cell.load(Ordering::Relaxed))
            })
    }

    fn carry(&self, cell: &AtomicU64) -> u64 {
        let value = cell.swap(0, Ordering::Relaxed);
        self.retired.fetch_add(value, Ordering::Relaxed);
        value
    }

    /// Move one slot's value into the retired accumulator
    ///
    /// Returns the carried value.
    pub fn retire(&self, slot: usize) -> u64 {
        match self.layout.load().cell(slot) {
            Some(cell) => self.carry(cell),
            None => 0,
        }
    }

    /// Replace the dynamic cells with `len` zeroed ones
    ///
    /// Whatever the old dynamic cells held is carried into the retired
    /// accumulator after the swap. Static cells are shared with the new
    /// layout untouched. Callers serialize resizes.
    pub fn resize_dynamic(&self, len: usize) -> u64 {
        let statics = self.layout.load().statics.clone();
        let old = self.layout.swap(Arc::new(Layout {
            statics,
            dynamics: zeroed(len).collect(),
        }));

        old.dynamics
            .iter()
            .fold(0u64, |carried, cell| carried.wrapping_add(self.carry(cell)))
    }

    /// Drop everything and start over with zeroed slots
    pub fn reset(&self, static_len: usize, dynamic_len: usize) {
        self.layout
            .store(Arc::new(Layout::new(static_len, dynamic_len)));
        self.retired.store(0, Ordering::Relaxed);
    }

    /// Copy of every live slot
    pub fn live_values(&self) -> Vec<u64> {
        self.layout
            .load()
            .cells()
            .map(|cell| cell.load(Ordering::Relaxed))
            .collect()
    }
}

impl std::fmt::Debug for SlotStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotStorage")
            .field("live", &self.live_values())
            .field("retired", &self.retired())
            .finish()
    }
}
