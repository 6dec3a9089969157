//! Counter definitions and value-resolution strategies

use std::sync::Arc;

use super::handle::ThreadSelector;
use crate::gather::Vivifier;

/// Replaces normal value resolution for a counter
///
/// Called with the selector of the read: the caller's own slot for
/// [`Engine::get`](crate::Engine::get), or whatever a gather walk asked for.
/// Implementations must be safe to call concurrently and reentrantly.
pub trait CombineHandler: Send + Sync {
    fn combine(&self, selector: ThreadSelector) -> u64;
}

impl<F> CombineHandler for F
where
    F: Fn(ThreadSelector) -> u64 + Send + Sync,
{
    fn combine(&self, selector: ThreadSelector) -> u64 {
        self(selector)
    }
}

/// How a counter's observable value is produced
#[derive(Clone)]
pub enum Strategy {
    /// Sharded sum of raw storage
    Plain,
    /// Handler output; raw storage is written but never read
    Combine(Arc<dyn CombineHandler>),
    /// Raw storage plus keys synthesized during a gather walk
    Vivify(Arc<dyn Vivifier>),
}

impl Strategy {
    pub fn kind(&self) -> CounterKind {
        match self {
            Strategy::Plain => CounterKind::Plain,
            Strategy::Combine(_) => CounterKind::Combine,
            Strategy::Vivify(_) => CounterKind::Vivify,
        }
    }
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind().as_str())
    }
}

/// Counter kind, without the attached callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterKind {
    Plain,
    Combine,
    Vivify,
}

impl CounterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterKind::Plain => "plain",
            CounterKind::Combine => "combine",
            CounterKind::Vivify => "vivify",
        }
    }
}

/// A registered counter
#[derive(Debug, Clone)]
pub struct CounterDef {
    pub name: Arc<str>,
    pub strategy: Strategy,
}

impl CounterDef {
    pub fn new(name: &str, strategy: Strategy) -> Self {
        Self {
            name: Arc::from(name),
            strategy,
        }
    }

    pub fn kind(&self) -> CounterKind {
        self.strategy.kind()
    }
}
