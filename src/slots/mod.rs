//! Slot storage and lifecycle
//!
//! Per-thread shards for every counter, the lock-free table that holds them,
//! the dynamic slot pool, and the map from threads to the slot they write.

mod binding;
mod pool;
mod storage;
mod table;

pub use binding::{Binding, SlotKind, ThreadBindings};
pub use pool::DynamicPool;
pub use storage::SlotStorage;
pub use table::AppendTable;
