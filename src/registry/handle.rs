//! Counter handles and thread selectors

/// Opaque reference to a registered counter
///
/// Handles stay valid for the life of the engine that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CounterHandle(u32);

impl CounterHandle {
    /// Handle returned when registration fails
    pub const INVALID: CounterHandle = CounterHandle(u32::MAX);

    pub(crate) fn from_index(index: usize) -> Self {
        debug_assert!(index < u32::MAX as usize);
        Self(index as u32)
    }

    /// Get the raw index
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// Whether this is anything other than [`CounterHandle::INVALID`]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl Default for CounterHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl std::fmt::Display for CounterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "#{}", self.0)
        } else {
            f.write_str("#invalid")
        }
    }
}

/// Which shard(s) a read resolves against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadSelector {
    /// Sum of every slot plus the retired accumulator
    All,
    /// A single slot
    Slot(usize),
}

impl ThreadSelector {
    /// Integer form, with `-1` meaning [`ThreadSelector::All`]
    pub fn as_raw(&self) -> i64 {
        match self {
            ThreadSelector::All => -1,
            ThreadSelector::Slot(slot) => *slot as i64,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, ThreadSelector::All)
    }
}

impl From<i64> for ThreadSelector {
    fn from(raw: i64) -> Self {
        if raw < 0 {
            ThreadSelector::All
        } else {
            ThreadSelector::Slot(raw as usize)
        }
    }
}

impl From<i32> for ThreadSelector {
    fn from(raw: i32) -> Self {
        ThreadSelector::from(raw as i64)
    }
}

impl std::fmt::Display for ThreadSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_handle() {
        assert!(!CounterHandle::INVALID.is_valid());
        assert!(!CounterHandle::default().is_valid());
        assert!(CounterHandle::from_index(0).is_valid());
    }

    #[test]
    fn test_selector_from_raw() {
        assert_eq!(ThreadSelector::from(-1i64), ThreadSelector::All);
        assert_eq!(ThreadSelector::from(-7i32), ThreadSelector::All);
        assert_eq!(ThreadSelector::from(3i64), ThreadSelector::Slot(3));
        assert_eq!(ThreadSelector::All.to_string(), "-1");
        assert_eq!(ThreadSelector::Slot(99).as_raw(), 99);
    }
}
