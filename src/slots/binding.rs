//! Thread to slot binding table
//!
//! The map is the source of truth. Each thread caches its own resolution
//! and revalidates it against a generation counter that every binding
//! change bumps, so the hot path reads no shared lock. A thread's entries
//! are removed when the thread exits.

use dashmap::DashMap;
use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

/// Where a bound slot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// Chosen by the caller, durable across unbind
    Static,
    /// Drawn from the dynamic pool
    Dynamic,
}

/// A thread's current slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub slot: usize,
    pub kind: SlotKind,
}

type BindingMap = DashMap<ThreadId, Binding>;

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy)]
struct Cached {
    table: u64,
    generation: u64,
    slot: usize,
}

/// Maps this thread has an entry in, cleaned up on thread exit
struct ExitHook {
    thread: ThreadId,
    maps: Vec<Weak<BindingMap>>,
}

impl ExitHook {
    fn watch(&mut self, map: &Arc<BindingMap>) {
        self.maps.retain(|weak| weak.strong_count() > 0);
        if !self.maps.iter().any(|weak| weak.as_ptr() == Arc::as_ptr(map)) {
            self.maps.push(Arc::downgrade(map));
        }
    }
}

impl Drop for ExitHook {
    fn drop(&mut self) {
        for map in self.maps.iter().filter_map(Weak::upgrade) {
            map.remove(&self.thread);
        }
    }
}

thread_local! {
    static CACHED: Cell<Cached> = const {
        Cell::new(Cached { table: 0, generation: 0, slot: 0 })
    };
    static EXIT_HOOK: RefCell<ExitHook> = RefCell::new(ExitHook {
        thread: thread::current().id(),
        maps: Vec::new(),
    });
}

/// Bindings for every thread that has claimed a slot
///
/// Threads without an entry resolve to slot 0.
#[derive(Debug)]
pub struct ThreadBindings {
    id: u64,
    map: Arc<BindingMap>,
    generation: AtomicU64,
}

impl ThreadBindings {
    pub fn new() -> Self {
        Self {
            id: NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed),
            map: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    fn changed(&self) {
        self.generation.fetch_add(1, Ordering::Release);
    }

    /// Binding of the calling thread
    pub fn current(&self) -> Option<Binding> {
        self.map.get(&thread::current().id()).map(|entry| *entry)
    }

    /// Slot the calling thread writes to
    #[inline]
    pub fn current_slot(&self) -> usize {
        let generation = self.generation.load(Ordering::Acquire);
        let cached = CACHED.with(Cell::get);
        if cached.table == self.id && cached.generation == generation {
            return cached.slot;
        }

        let slot = self.current().map(|binding| binding.slot).unwrap_or(0);
        CACHED.with(|cell| {
            cell.set(Cached {
                table: self.id,
                generation,
                slot,
            })
        });
        slot
    }

    /// Bind the calling thread, returning any previous binding
    pub fn bind(&self, binding: Binding) -> Option<Binding> {
        // Unavailable only while the thread is being torn down
        let _ = EXIT_HOOK.try_with(|hook| hook.borrow_mut().watch(&self.map));
        let previous = self.map.insert(thread::current().id(), binding);
        self.changed();
        previous
    }

    /// Detach the calling thread
    pub fn unbind_current(&self) -> Option<Binding> {
        let removed = self
            .map
            .remove(&thread::current().id())
            .map(|(_, binding)| binding);
        self.changed();
        removed
    }

    /// Detach whichever threads are bound to `slot`
    pub fn unbind_slot(&self, slot: usize) {
        self.map.retain(|_, binding| binding.slot != slot);
        self.changed();
    }

    /// Keep only static bindings below `static_slots`
    pub fn retain_static(&self, static_slots: usize) {
        self.map
            .retain(|_, binding| binding.kind == SlotKind::Static && binding.slot < static_slots);
        self.changed();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for ThreadBindings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbound_thread_uses_slot_zero() {
        let bindings = ThreadBindings::new();
        assert_eq!(bindings.current(), None);
        assert_eq!(bindings.current_slot(), 0);
    }

    #[test]
    fn test_bindings_are_per_thread() {
        let bindings = ThreadBindings::new();
        bindings.bind(Binding { slot: 1, kind: SlotKind::Static });

        std::thread::scope(|s| {
            s.spawn(|| {
                assert_eq!(bindings.current_slot(), 0);
                bindings.bind(Binding { slot: 4, kind: SlotKind::Dynamic });
                assert_eq!(bindings.current_slot(), 4);
                bindings.unbind_slot(4);
                assert_eq!(bindings.current_slot(), 0);
            });
        });

        assert_eq!(bindings.current_slot(), 1);
        bindings.retain_static(1);
        assert!(bindings.is_empty());
        assert_eq!(bindings.current_slot(), 0);
    }

    #[test]
    fn test_cached_slot_follows_other_thread_changes() {
        let bindings = ThreadBindings::new();
        bindings.bind(Binding { slot: 3, kind: SlotKind::Dynamic });
        assert_eq!(bindings.current_slot(), 3);

        std::thread::scope(|s| {
            s.spawn(|| bindings.unbind_slot(3));
        });
        assert_eq!(bindings.current_slot(), 0);
    }

    #[test]
    fn test_cache_is_per_table() {
        let a = ThreadBindings::new();
        let b = ThreadBindings::new();
        a.bind(Binding { slot: 2, kind: SlotKind::Static });

        assert_eq!(a.current_slot(), 2);
        assert_eq!(b.current_slot(), 0);
        assert_eq!(a.current_slot(), 2);
    }

    #[test]
    fn test_exited_thread_is_pruned() {
        let bindings = Arc::new(ThreadBindings::new());

        let worker = {
            let bindings = bindings.clone();
            std::thread::spawn(move || {
                bindings.bind(Binding { slot: 1, kind: SlotKind::Static });
                assert_eq!(bindings.len(), 1);
            })
        };
        worker.join().unwrap();

        assert!(bindings.is_empty());
    }
}
