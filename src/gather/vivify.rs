//! Vivifier callbacks
//!
//! A vivifier counter owns its whole corner of the name tree during a gather
//! walk: the engine hands it a [`VivifyNode`] and emits nothing on its behalf.

use std::fmt::Display;

use super::sink::Sink;
use crate::engine::Engine;
use crate::registry::{join, segment_prefix_match, CounterHandle, ThreadSelector};

/// Synthesizes keys under a counter's name on demand
pub trait Vivifier: Send + Sync {
    fn vivify(&self, node: &mut VivifyNode<'_>);
}

impl<F> Vivifier for F
where
    F: Fn(&mut VivifyNode<'_>) + Send + Sync,
{
    fn vivify(&self, node: &mut VivifyNode<'_>) {
        self(node)
    }
}

/// One vivifier invocation within a gather walk
pub struct VivifyNode<'a> {
    engine: &'a Engine,
    handle: CounterHandle,
    subtree: &'a str,
    name: &'a str,
    selector: ThreadSelector,
    flags: u32,
    sink: &'a mut dyn Sink,
}

impl<'a> VivifyNode<'a> {
    pub(crate) fn new(
        engine: &'a Engine,
        handle: CounterHandle,
        subtree: &'a str,
        name: &'a str,
        selector: ThreadSelector,
        flags: u32,
        sink: &'a mut dyn Sink,
    ) -> Self {
        Self {
            engine,
            handle,
            subtree,
            name,
            selector,
            flags,
            sink,
        }
    }

    pub fn engine(&self) -> &'a Engine {
        self.engine
    }

    pub fn handle(&self) -> CounterHandle {
        self.handle
    }

    /// Subtree the walk was asked for
    pub fn subtree(&self) -> &'a str {
        self.subtree
    }

    /// Name of the counter this vivifier is attached to
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn selector(&self) -> ThreadSelector {
        self.selector
    }

    /// Caller-supplied flags passed through the walk
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Counter value for the walk's selector, resolved like a plain counter
    pub fn value(&self) -> u64 {
        self.engine.value(self.handle, self.selector)
    }

    /// Whether a fully-qualified key falls inside the requested subtree
    pub fn wants(&self, key: &str) -> bool {
        segment_prefix_match(self.subtree, key)
    }

    /// Emit a fully-qualified key if it is inside the requested subtree
    pub fn emit(&mut self, key: &str, value: impl Display) -> bool {
        if !self.wants(key) {
            return false;
        }
        self.sink.report(key, &value.to_string());
        true
    }

    /// Emit `<name>.<suffix>` if it is inside the requested subtree
    pub fn emit_child(&mut self, suffix: &str, value: impl Display) -> bool {
        let key = join(self.name, suffix);
        self.emit(&key, value)
    }

    /// Emit the counter's own key with its plain value
    pub fn emit_own_value(&mut self) -> bool {
        let value = self.value();
        let name = self.name;
        self.emit(name, value)
    }
}

impl std::fmt::Debug for VivifyNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VivifyNode")
            .field("handle", &self.handle)
            .field("subtree", &self.subtree)
            .field("name", &self.name)
            .field("selector", &self.selector)
            .field("flags", &self.flags)
            .finish()
    }
}
