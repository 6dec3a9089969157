//! Dynamic slot pool
//!
//! Slot indices `[base, base + len)` handed out to transient threads.
//! Uses a bitset for tracking free slots; acquisition claims the lowest
//! free index with a CAS, release sets the bit back.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::error::{CounterError, Result};

/// Free-list over the dynamic slot range
#[derive(Debug)]
pub struct DynamicPool {
    /// First dynamic slot index (the static slot count)
    base: usize,
    /// Number of dynamic slots
    len: usize,
    /// 1 = free, 0 = acquired; each word tracks 64 slots
    free_bitset: Box<[AtomicU64]>,
    /// Number of acquired slots
    acquired: AtomicUsize,
}

impl DynamicPool {
    /// Create a pool of `len` free slots starting at `base`
    pub fn new(base: usize, len: usize) -> Self {
        let num_words = (len + 63) / 64;

        let free_bitset: Vec<AtomicU64> = (0..num_words)
            .map(|i| {
                // Bits past `len` stay clear so they are never handed out
                if i == num_words - 1 && len % 64 != 0 {
                    AtomicU64::new((1u64 << (len % 64)) - 1)
                } else {
                    AtomicU64::new(u64::MAX)
                }
            })
            .collect();

        Self {
            base,
            len,
            free_bitset: free_bitset.into_boxed_slice(),
            acquired: AtomicUsize::new(0),
        }
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// One past the last dynamic slot index
    pub fn end(&self) -> usize {
        self.base + self.len
    }

    pub fn contains(&self, slot: usize) -> bool {
        slot >= self.base && slot < self.end()
    }

    /// Number of slots currently handed out
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::Relaxed)
    }

    /// Claim the lowest free slot
    ///
    /// Returns None if every slot is taken.
    pub fn acquire(&self) -> Option<usize> {
        for (word_idx, word) in self.free_bitset.iter().enumerate() {
            loop {
                let current = word.load(Ordering::Acquire);
                if current == 0 {
                    break;
                }

                let bit_idx = current.trailing_zeros() as usize;
                let mask = 1u64 << bit_idx;

                if word
                    .compare_exchange(current, current & !mask, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    self.acquired.fetch_add(1, Ordering::Relaxed);
                    return Some(self.base + word_idx * 64 + bit_idx);
                }
                // CAS failed, retry with updated value
            }
        }

        None
    }

    /// Return a slot to the pool
    pub fn release(&self, slot: usize) -> Result<()> {
        if !self.contains(slot) {
            return Err(CounterError::NotDynamicSlot(slot));
        }

        let idx = slot - self.base;
        let mask = 1u64 << (idx % 64);
        let previous = self.free_bitset[idx / 64].fetch_or(mask, Ordering::Release);
        if previous & mask != 0 {
            return Err(CounterError::SlotNotAcquired(slot));
        }

        self.acquired.fetch_sub(1, Ordering::Relaxed);
        Ok(())
    }
}
