//! Counter engine
//!
//! Owns every counter definition and its shard storage. Increments and
//! reads never take the registry lock: each counter's storage sits in an
//! append-only table reachable by handle, and the caller's slot comes from a
//! per-thread cache. Registration and slot lifecycle changes take the
//! registry lock exclusively so they serialize among themselves.
//!
//! Until [`Engine::initialize`] runs the engine is in bootstrap mode: counters
//! can be created and bumped, all writing to a single implicit slot 0.
//! Initialization throws those values away.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{CounterError, Result};
use crate::gather::Vivifier;
use crate::registry::{
    CombineHandler, CounterHandle, CounterKind, Registry, Strategy, ThreadSelector,
};
use crate::slots::{AppendTable, Binding, DynamicPool, SlotKind, SlotStorage, ThreadBindings};

/// Process-wide engine
static GLOBAL: Lazy<Arc<Engine>> = Lazy::new(|| Arc::new(Engine::new()));

/// Engine lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Before [`Engine::initialize`]; one implicit slot
    Bootstrap,
    Initialized,
}

/// State guarded by the registry lock
struct State {
    mode: Mode,
    static_slots: usize,
    registry: Registry,
    pool: DynamicPool,
}

/// What the hot path needs for one counter
struct Counter {
    strategy: Strategy,
    storage: SlotStorage,
}

/// Registry of sharded counters
pub struct Engine {
    state: RwLock<State>,
    /// Indexed by handle, appended under the registry write lock
    counters: AppendTable<Counter>,
    bindings: ThreadBindings,
    fold_static_on_unbind: AtomicBool,
}

/// Point-in-time copy of one counter's raw storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub name: String,
    pub kind: CounterKind,
    pub live: Vec<u64>,
    pub retired: u64,
}

impl CounterSnapshot {
    /// Sum of live slots plus retired
    pub fn aggregate(&self) -> u64 {
        self.live
            .iter()
            .fold(self.retired, |sum, value| sum.wrapping_add(*value))
    }
}

impl Engine {
    /// Create an engine in bootstrap mode
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                mode: Mode::Bootstrap,
                static_slots: 1,
                registry: Registry::new(),
                pool: DynamicPool::new(1, 0),
            }),
            counters: AppendTable::new(),
            bindings: ThreadBindings::new(),
            fold_static_on_unbind: AtomicBool::new(false),
        }
    }

    /// The process-wide engine
    pub fn global() -> &'static Arc<Engine> {
        &GLOBAL
    }

    /// Initialize and size the dynamic pool from configuration
    pub fn apply_config(&self, config: &EngineConfig) {
        self.set_fold_static_on_unbind(config.fold_static_on_unbind);
        self.initialize(config.effective_static_slots());
        self.prepare_dynamic_pool(config.dynamic_slots);
    }

    // Registration

    /// Register a plain counter, returning [`CounterHandle::INVALID`] on failure
    pub fn create(&self, name: &str) -> CounterHandle {
        self.try_create(name).unwrap_or(CounterHandle::INVALID)
    }

    /// Register a counter whose value comes from `handler`
    pub fn create_with_combine_handler<H>(&self, name: &str, handler: H) -> CounterHandle
    where
        H: CombineHandler + 'static,
    {
        self.try_create_with_combine_handler(name, handler)
            .unwrap_or(CounterHandle::INVALID)
    }

    /// Register a counter that synthesizes child keys during gather walks
    pub fn create_with_vivifier<V>(&self, name: &str, vivifier: V) -> CounterHandle
    where
        V: Vivifier + 'static,
    {
        self.try_create_with_vivifier(name, vivifier)
            .unwrap_or(CounterHandle::INVALID)
    }

    pub fn try_create(&self, name: &str) -> Result<CounterHandle> {
        self.register(name, Strategy::Plain)
    }

    pub fn try_create_with_combine_handler<H>(&self, name: &str, handler: H) -> Result<CounterHandle>
    where
        H: CombineHandler + 'static,
    {
        self.register(name, Strategy::Combine(Arc::new(handler)))
    }

    pub fn try_create_with_vivifier<V>(&self, name: &str, vivifier: V) -> Result<CounterHandle>
    where
        V: Vivifier + 'static,
    {
        self.register(name, Strategy::Vivify(Arc::new(vivifier)))
    }

    fn register(&self, name: &str, strategy: Strategy) -> Result<CounterHandle> {
        let kind = strategy.kind();
        let mut state = self.state.write();

        let handle = match state.registry.insert(name, strategy.clone()) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(name, error = %e, "Counter registration rejected");
                return Err(e);
            }
        };

        let index = self.counters.push(Counter {
            strategy,
            storage: SlotStorage::new(state.static_slots, state.pool.len()),
        });
        debug_assert_eq!(index, handle.index());
        debug!(name, %handle, kind = kind.as_str(), mode = ?state.mode, "Counter registered");
        Ok(handle)
    }

    #[inline]
    fn counter(&self, handle: CounterHandle) -> Option<&Counter> {
        self.counters.get(handle.index())
    }

    /// Whether `handle` refers to a registered counter
    pub fn is_valid(&self, handle: CounterHandle) -> bool {
        handle.is_valid() && self.counter(handle).is_some()
    }

    pub fn lookup(&self, name: &str) -> Option<CounterHandle> {
        self.state.read().registry.lookup(name)
    }

    pub fn name(&self, handle: CounterHandle) -> Option<Arc<str>> {
        self.state
            .read()
            .registry
            .get(handle)
            .map(|def| def.name.clone())
    }

    pub fn kind(&self, handle: CounterHandle) -> Option<CounterKind> {
        self.counter(handle).map(|counter| counter.strategy.kind())
    }

    pub fn counter_count(&self) -> usize {
        self.counters.len()
    }

    // Lifecycle

    /// Leave bootstrap mode with `static_slots` static slots
    ///
    /// Every counter is re-provisioned with zeroed storage and the dynamic
    /// pool is emptied. Calling it again starts over the same way. A count
    /// of 0 is treated as 1, since slot 0 always exists.
    pub fn initialize(&self, static_slots: usize) {
        let static_slots = if static_slots == 0 {
            warn!("Static slot count 0 requested, using 1");
            1
        } else {
            static_slots
        };

        let mut state = self.state.write();
        let previous = state.mode;
        state.mode = Mode::Initialized;
        state.static_slots = static_slots;
        state.pool = DynamicPool::new(static_slots, 0);
        for counter in self.counters.iter() {
            counter.storage.reset(static_slots, 0);
        }
        self.bindings.retain_static(static_slots);

        info!(
            static_slots,
            counters = state.registry.len(),
            previous = ?previous,
            "Counter engine initialized"
        );
    }

    pub fn mode(&self) -> Mode {
        self.state.read().mode
    }

    pub fn static_slots(&self) -> usize {
        self.state.read().static_slots
    }

    pub fn dynamic_slots(&self) -> usize {
        self.state.read().pool.len()
    }

    /// Number of dynamic slots currently acquired
    pub fn dynamic_slots_in_use(&self) -> usize {
        self.state.read().pool.acquired()
    }

    /// Number of threads holding a binding
    pub fn bound_threads(&self) -> usize {
        self.bindings.len()
    }

    /// When set, unbinding a static slot carries its values into the
    /// retired accumulator like a dynamic release does
    pub fn set_fold_static_on_unbind(&self, fold: bool) {
        self.fold_static_on_unbind.store(fold, Ordering::Relaxed);
    }

    /// Bind the calling thread to static slot `slot`
    ///
    /// The binding lasts until [`Engine::unbind_static`], a rebind, a
    /// re-initialize that drops the slot, or the thread's exit.
    pub fn bind_static(&self, slot: usize) -> Result<()> {
        let state = self.state.write();
        if slot >= state.static_slots {
            warn!(slot, static_slots = state.static_slots, "Static slot out of range");
            return Err(CounterError::StaticSlotOutOfRange {
                slot,
                static_slots: state.static_slots,
            });
        }

        if let Some(previous) = self.bindings.bind(Binding { slot, kind: SlotKind::Static }) {
            debug!(slot, previous = previous.slot, "Thread rebound");
        }
        debug!(slot, "Thread bound to static slot");
        Ok(())
    }

    /// Detach the calling thread from static slot `slot`
    ///
    /// The slot keeps its values and stays queryable by index. Fails with
    /// [`CounterError::SlotNotBound`] if the thread is not bound to `slot`.
    pub fn unbind_static(&self, slot: usize) -> Result<()> {
        let state = self.state.write();
        let static_slots = state.static_slots;
        if slot >= static_slots {
            return Err(CounterError::StaticSlotOutOfRange { slot, static_slots });
        }

        match self.bindings.current() {
            Some(Binding { slot: bound, kind: SlotKind::Static }) if bound == slot => {
                self.bindings.unbind_current();
            }
            other => {
                warn!(slot, bound = ?other, "Thread not bound to this static slot");
                return Err(CounterError::SlotNotBound(slot));
            }
        }

        if self.fold_static_on_unbind.load(Ordering::Relaxed) {
            for counter in self.counters.iter() {
                counter.storage.retire(slot);
            }
        }
        debug!(slot, "Thread unbound from static slot");
        Ok(())
    }

    /// Resize the dynamic pool to `count` slots
    ///
    /// Every dynamic slot is retired, so no index carries a value into
    /// whichever thread acquires it next. Static slots are not moved.
    /// Outstanding slot ids from the previous configuration become stale.
    pub fn prepare_dynamic_pool(&self, count: usize) {
        let mut state = self.state.write();
        let base = state.static_slots;
        let outstanding = state.pool.acquired();

        for counter in self.counters.iter() {
            counter.storage.resize_dynamic(count);
        }
        state.pool = DynamicPool::new(base, count);

        if outstanding > 0 {
            warn!(outstanding, "Dynamic pool resized with slots still acquired");
        }
        debug!(base, count, "Dynamic slot pool prepared");
    }

    /// Take a dynamic slot and bind the calling thread to it
    ///
    /// The binding lasts until the slot is released, the pool is rebuilt by
    /// a re-initialize, or the thread exits. Exiting does not return the
    /// slot to the pool.
    pub fn acquire_dynamic_slot(&self) -> Result<usize> {
        let state = self.state.write();
        let slot = match state.pool.acquire() {
            Some(slot) => slot,
            None => {
                warn!(dynamic_slots = state.pool.len(), "Dynamic slot pool exhausted");
                return Err(CounterError::PoolExhausted);
            }
        };

        self.bindings.bind(Binding { slot, kind: SlotKind::Dynamic });
        debug!(slot, "Dynamic slot acquired");
        Ok(slot)
    }

    /// Retire a dynamic slot's values and return it to the pool
    ///
    /// Afterwards the slot's history only shows up in aggregate reads.
    pub fn release_dynamic_slot(&self, slot: usize) -> Result<()> {
        let state = self.state.write();
        if let Err(e) = state.pool.release(slot) {
            warn!(slot, error = %e, "Dynamic slot release rejected");
            return Err(e);
        }

        for counter in self.counters.iter() {
            counter.storage.retire(slot);
        }
        self.bindings.unbind_slot(slot);
        debug!(slot, "Dynamic slot released");
        Ok(())
    }

    // Mutation and reads

    /// Context for the calling thread's slot
    #[inline]
    pub fn shard(&self) -> Shard<'_> {
        Shard {
            engine: self,
            slot: self.bindings.current_slot(),
        }
    }

    /// Context for an explicit slot
    pub fn shard_at(&self, slot: usize) -> Shard<'_> {
        Shard { engine: self, slot }
    }

    /// Slot the calling thread writes to
    pub fn current_slot(&self) -> usize {
        self.bindings.current_slot()
    }

    #[inline]
    pub fn increment(&self, handle: CounterHandle) {
        self.shard().add(handle, 1);
    }

    #[inline]
    pub fn decrement(&self, handle: CounterHandle) {
        self.shard().add(handle, -1);
    }

    #[inline]
    pub fn add(&self, handle: CounterHandle, delta: i64) {
        self.shard().add(handle, delta);
    }

    /// Like [`Engine::add`], but reports an unknown handle
    pub fn try_add(&self, handle: CounterHandle, delta: i64) -> Result<()> {
        self.shard().try_add(handle, delta)
    }

    /// Value of the calling thread's own slot
    ///
    /// Combine-handler counters report the handler's output instead.
    pub fn get(&self, handle: CounterHandle) -> u64 {
        self.shard().get(handle)
    }

    /// Like [`Engine::get`], but reports an unknown handle
    pub fn try_get(&self, handle: CounterHandle) -> Result<u64> {
        self.shard().try_get(handle)
    }

    /// Value resolved for `selector`
    ///
    /// Invalid handles read as 0.
    pub fn value(&self, handle: CounterHandle, selector: impl Into<ThreadSelector>) -> u64 {
        self.try_value(handle, selector).unwrap_or(0)
    }

    /// Value resolved for `selector`, or [`CounterError::InvalidHandle`]
    ///
    /// No lock is held while a combine handler runs, so it may call back
    /// into the engine.
    pub fn try_value(
        &self,
        handle: CounterHandle,
        selector: impl Into<ThreadSelector>,
    ) -> Result<u64> {
        let counter = self.counter(handle).ok_or(CounterError::InvalidHandle)?;
        let selector = selector.into();

        Ok(match &counter.strategy {
            Strategy::Combine(handler) => handler.combine(selector),
            Strategy::Plain | Strategy::Vivify(_) => match selector {
                ThreadSelector::All => counter.storage.aggregate(),
                ThreadSelector::Slot(slot) => counter.storage.load(slot),
            },
        })
    }

    /// Copy of a counter's raw storage
    pub fn snapshot(&self, handle: CounterHandle) -> Option<CounterSnapshot> {
        let counter = self.counter(handle)?;
        let name = self.name(handle)?;
        Some(CounterSnapshot {
            name: name.to_string(),
            kind: counter.strategy.kind(),
            live: counter.storage.live_values(),
            retired: counter.storage.retired(),
        })
    }

    /// Handles and strategies of every counter a walk over `subtree` visits
    pub(crate) fn matching(&self, subtree: &str) -> Vec<(CounterHandle, Arc<str>, Strategy)> {
        let state = self.state.read();
        state
            .registry
            .matching(subtree)
            .into_iter()
            .filter_map(|handle| {
                let def = state.registry.get(handle)?;
                Some((handle, def.name.clone(), def.strategy.clone()))
            })
            .collect()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Engine")
            .field("mode", &state.mode)
            .field("static_slots", &state.static_slots)
            .field("dynamic_slots", &state.pool.len())
            .field("counters", &state.registry.len())
            .finish()
    }
}

/// A slot resolved once for a run of mutations and reads
///
/// Built by [`Engine::shard`] for the calling thread, or
/// [`Engine::shard_at`] for a slot the caller tracks itself.
#[derive(Debug, Clone, Copy)]
pub struct Shard<'a> {
    engine: &'a Engine,
    slot: usize,
}

impl<'a> Shard<'a> {
    pub fn slot(&self) -> usize {
        self.slot
    }

    #[inline]
    pub fn increment(&self, handle: CounterHandle) {
        self.add(handle, 1);
    }

    #[inline]
    pub fn decrement(&self, handle: CounterHandle) {
        self.add(handle, -1);
    }

    /// Apply `delta` to this slot; invalid handles are ignored
    #[inline]
    pub fn add(&self, handle: CounterHandle, delta: i64) {
        if let Some(counter) = self.engine.counter(handle) {
            counter.storage.add(self.slot, delta);
        }
    }

    pub fn try_add(&self, handle: CounterHandle, delta: i64) -> Result<()> {
        let counter = self.engine.counter(handle).ok_or(CounterError::InvalidHandle)?;
        counter.storage.add(self.slot, delta);
        Ok(())
    }

    pub fn get(&self, handle: CounterHandle) -> u64 {
        self.engine.value(handle, ThreadSelector::Slot(self.slot))
    }

    pub fn try_get(&self, handle: CounterHandle) -> Result<u64> {
        self.engine.try_value(handle, ThreadSelector::Slot(self.slot))
    }
}
