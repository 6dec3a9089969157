//! Append-only table readable without locks
//!
//! Entries live in buckets of doubling size, so growing never moves an
//! existing entry and a reader holding `&T` is never invalidated. Pushes
//! must be serialized by the caller; lookups and iteration are wait-free.

use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Bucket `b` holds `2^b` entries
const BUCKETS: usize = usize::BITS as usize;

type Bucket<T> = Box<[OnceCell<T>]>;

/// Indexed, append-only storage
pub struct AppendTable<T> {
    buckets: [OnceCell<Bucket<T>>; BUCKETS],
    len: AtomicUsize,
}

#[inline]
fn locate(index: usize) -> Option<(usize, usize)> {
    let position = index.checked_add(1)?;
    let bucket = (usize::BITS - 1 - position.leading_zeros()) as usize;
    Some((bucket, position - (1 << bucket)))
}

impl<T> AppendTable<T> {
    pub fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| OnceCell::new()),
            len: AtomicUsize::new(0),
        }
    }

    /// Number of published entries
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `value`, returning its index
    ///
    /// Callers must not push concurrently.
    pub fn push(&self, value: T) -> usize {
        let index = self.len.load(Ordering::Relaxed);
        // usize::MAX entries can never be allocated, so locate cannot fail here
        let (bucket, offset) = locate(index).unwrap_or((BUCKETS - 1, 0));
        let cells = self.buckets[bucket]
            .get_or_init(|| (0..1usize << bucket).map(|_| OnceCell::new()).collect());

        // Pushes are serialized, so the cell is still empty
        let _ = cells[offset].set(value);
        self.len.store(index + 1, Ordering::Release);
        index
    }

    /// Entry at `index`, if published
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        let (bucket, offset) = locate(index)?;
        self.buckets.get(bucket)?.get()?.get(offset)?.get()
    }

    /// Every published entry in index order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        (0..self.len()).filter_map(move |index| self.get(index))
    }
}

impl<T> Default for AppendTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for AppendTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppendTable").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_buckets_double() {
        assert_eq!(locate(0), Some((0, 0)));
        assert_eq!(locate(1), Some((1, 0)));
        assert_eq!(locate(2), Some((1, 1)));
        assert_eq!(locate(3), Some((2, 0)));
        assert_eq!(locate(6), Some((2, 3)));
        assert_eq!(locate(7), Some((3, 0)));
        assert_eq!(locate(usize::MAX), None);
    }

    #[test]
    fn test_push_and_get() {
        let table = AppendTable::new();
        for i in 0..100u32 {
            assert_eq!(table.push(i * 2), i as usize);
        }
        assert_eq!(table.len(), 100);
        assert_eq!(table.get(0), Some(&0));
        assert_eq!(table.get(99), Some(&198));
        assert_eq!(table.get(100), None);
        assert_eq!(table.get(u32::MAX as usize), None);
        assert_eq!(table.iter().count(), 100);
    }

    #[test]
    fn test_references_survive_growth() {
        let table = AppendTable::new();
        table.push(String::from("first"));
        let first = table.get(0).unwrap();
        for i in 0..64 {
            table.push(i.to_string());
        }
        assert_eq!(first, "first");
    }

    #[test]
    fn test_readers_see_published_entries() {
        let table = AppendTable::new();
        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..1000usize {
                    table.push(i);
                }
            });
            s.spawn(|| {
                let mut seen = 0;
                while seen < 1000 {
                    let len = table.len();
                    for index in seen..len {
                        assert_eq!(table.get(index), Some(&index));
                    }
                    seen = len;
                }
            });
        });
    }
}
