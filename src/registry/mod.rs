//! Name tree and counter registry
//!
//! Maps dotted names to counter definitions. Names are unique and never
//! removed; the handle of a counter is its position in registration order.

mod definition;
mod handle;
mod name;

use std::collections::BTreeMap;
use std::ops::Bound;

pub use definition::{CombineHandler, CounterDef, CounterKind, Strategy};
pub use handle::{CounterHandle, ThreadSelector};
pub use name::{ancestors, join, segment_prefix_match, SEPARATOR};

use crate::error::{CounterError, Result};

/// Registered counters, indexed by handle and by name
#[derive(Debug, Default)]
pub struct Registry {
    defs: Vec<CounterDef>,
    by_name: BTreeMap<String, CounterHandle>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new counter
    pub fn insert(&mut self, name: &str, strategy: Strategy) -> Result<CounterHandle> {
        if self.by_name.contains_key(name) {
            return Err(CounterError::DuplicateName(name.to_string()));
        }

        let handle = CounterHandle::from_index(self.defs.len());
        self.defs.push(CounterDef::new(name, strategy));
        self.by_name.insert(name.to_string(), handle);
        Ok(handle)
    }

    pub fn get(&self, handle: CounterHandle) -> Option<&CounterDef> {
        self.defs.get(handle.index())
    }

    pub fn contains(&self, handle: CounterHandle) -> bool {
        handle.index() < self.defs.len()
    }

    pub fn lookup(&self, name: &str) -> Option<CounterHandle> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Counters a gather walk over `subtree` has to visit
    ///
    /// Every counter inside the subtree, plus vivifier counters sitting above
    /// it (their synthesized keys may land inside). Ancestors come first, then
    /// the subtree in name order.
    pub fn matching(&self, subtree: &str) -> Vec<CounterHandle> {
        let mut found: Vec<CounterHandle> = ancestors(subtree)
            .filter_map(|prefix| self.by_name.get(prefix).copied())
            .filter(|handle| matches!(self.defs[handle.index()].strategy, Strategy::Vivify(_)))
            .collect();

        found.extend(
            self.by_name
                .range::<str, _>((Bound::Included(subtree), Bound::Unbounded))
                .take_while(|(name, _)| name.starts_with(subtree))
                .filter(|(name, _)| segment_prefix_match(subtree, name))
                .map(|(_, handle)| *handle),
        );

        found
    }
}
