//! Shard Counters - per-thread sharded counters with hierarchical names
//!
//! Counters are registered under dotted names and bumped from any thread
//! without contention: each thread writes its own slot. Reads either look
//! at one slot or aggregate every slot plus the values carried forward from
//! released slots. A gather walk reports a subtree of the name tree as text
//! key/value pairs, with room for counters whose value comes from a handler
//! and counters that synthesize their own child keys.

pub mod config;
pub mod engine;
pub mod error;
pub mod exporter;
pub mod gather;
pub mod registry;
pub mod slots;
pub mod startup;
pub mod util;

pub use config::Config;
pub use engine::{CounterSnapshot, Engine, Mode, Shard};
pub use error::CounterError;
pub use gather::{Report, Sink, Vivifier, VivifyNode};
pub use registry::{
    segment_prefix_match, CombineHandler, CounterHandle, CounterKind, ThreadSelector,
};
pub use startup::start;

/// Crate version for display
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
