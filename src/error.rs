//! Error types for counter operations

use thiserror::Error;

/// Errors reported by registry and slot lifecycle operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CounterError {
    /// A counter with this name already exists
    #[error("counter name already registered: {0}")]
    DuplicateName(String),

    /// The handle does not refer to a registered counter
    #[error("invalid counter handle")]
    InvalidHandle,

    /// Static slot id outside `[0, static_slots)`
    #[error("static slot {slot} out of range (static slots: {static_slots})")]
    StaticSlotOutOfRange { slot: usize, static_slots: usize },

    /// Slot id outside the current dynamic range
    #[error("slot {0} is not a dynamic slot")]
    NotDynamicSlot(usize),

    /// The calling thread is not bound to this static slot
    #[error("thread is not bound to static slot {0}")]
    SlotNotBound(usize),

    /// Dynamic slot released without being acquired
    #[error("dynamic slot {0} is not acquired")]
    SlotNotAcquired(usize),

    /// No free dynamic slots left
    #[error("dynamic slot pool exhausted")]
    PoolExhausted,
}

pub type Result<T> = std::result::Result<T, CounterError>;
