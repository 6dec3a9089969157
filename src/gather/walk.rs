//! Subtree walk over the registry

use tracing::trace;

use super::sink::{Report, Sink};
use super::vivify::VivifyNode;
use crate::engine::Engine;
use crate::registry::{Strategy, ThreadSelector};

/// Sink adapter that counts emitted pairs
struct Counting<'s> {
    inner: &'s mut dyn Sink,
    emitted: usize,
}

impl Sink for Counting<'_> {
    fn report(&mut self, key: &str, value: &str) {
        self.emitted += 1;
        self.inner.report(key, value);
    }
}

impl Engine {
    /// Report every counter inside `subtree` to `sink`
    ///
    /// An empty subtree selects everything. Plain and combine-handler
    /// counters are reported under their own name with the value resolved
    /// for `selector`. Vivifier counters are handed a [`VivifyNode`] and
    /// report whatever they choose, filtered to the subtree; `flags` is
    /// passed through to them untouched.
    ///
    /// No lock is held across the walk, so values from different counters
    /// may come from slightly different moments. Returns the number of
    /// pairs reported.
    pub fn gather<S: Sink>(
        &self,
        subtree: &str,
        sink: &mut S,
        selector: impl Into<ThreadSelector>,
        flags: u32,
    ) -> usize {
        let selector = selector.into();
        let mut counting = Counting {
            inner: sink,
            emitted: 0,
        };

        let matches = self.matching(subtree);
        for (handle, name, strategy) in &matches {
            match strategy {
                Strategy::Vivify(vivifier) => {
                    let mut node = VivifyNode::new(
                        self,
                        *handle,
                        subtree,
                        name,
                        selector,
                        flags,
                        &mut counting,
                    );
                    vivifier.vivify(&mut node);
                }
                Strategy::Plain => {
                    let value = self.value(*handle, selector);
                    counting.report(name, &value.to_string());
                }
                Strategy::Combine(handler) => {
                    let value = handler.combine(selector);
                    counting.report(name, &value.to_string());
                }
            }
        }

        trace!(
            subtree,
            selector = %selector,
            counters = matches.len(),
            emitted = counting.emitted,
            "Gather complete"
        );
        counting.emitted
    }

    /// Gather into a fresh [`Report`]
    pub fn report(&self, subtree: &str, selector: impl Into<ThreadSelector>, flags: u32) -> Report {
        let mut report = Report::new();
        self.gather(subtree, &mut report, selector, flags);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::segment_prefix_match;

    #[test]
    fn test_gather_plain_counters() {
        let engine = Engine::new();
        engine.initialize(1);
        let a = engine.create("hello.world");
        let b = engine.create("hello.city");
        engine.create("hi.there");
        engine.add(a, 2);
        engine.add(b, 5);

        let report = engine.report("hello", ThreadSelector::All, 0);
        assert_eq!(report.len(), 2);
        assert_eq!(report.get_u64("hello.world"), Some(2));
        assert_eq!(report.get_u64("hello.city"), Some(5));

        assert!(engine.report("hel", ThreadSelector::All, 0).is_empty());
        assert_eq!(engine.report("", ThreadSelector::All, 0).len(), 3);
    }

    #[test]
    fn test_gather_closure_sink_and_count() {
        let engine = Engine::new();
        engine.initialize(1);
        engine.create("a.b");
        engine.create("a.c");

        let mut keys = Vec::new();
        let emitted = engine.gather("a", &mut |key: &str, _: &str| keys.push(key.to_string()), -1i64, 0);
        assert_eq!(emitted, 2);
        assert_eq!(keys, vec!["a.b", "a.c"]);
    }

    #[test]
    fn test_vivifier_emissions_are_filtered() {
        let engine = Engine::new();
        engine.initialize(1);
        engine.create_with_vivifier("v", |node: &mut VivifyNode<'_>| {
            node.emit_own_value();
            node.emit_child("x.one", 1);
            node.emit_child("y.two", 2);
            node.emit("elsewhere", 3);
        });

        let all = engine.report("", ThreadSelector::All, 0);
        assert_eq!(all.len(), 4);
        assert_eq!(all.get_u64("v"), Some(0));
        assert!(all.contains("elsewhere"));

        let x = engine.report("v.x", ThreadSelector::All, 0);
        assert_eq!(x.keys().collect::<Vec<_>>(), vec!["v.x.one"]);
        assert!(x.keys().all(|k| segment_prefix_match("v.x", k)));
    }

    #[test]
    fn test_vivifier_may_reenter_engine() {
        let engine = Engine::new();
        engine.initialize(1);
        let h = engine.create_with_vivifier("r", |node: &mut VivifyNode<'_>| {
            let engine = node.engine();
            engine.create("r.created.during.walk");
            let own = engine.get(node.handle());
            node.emit_child("own", own);
        });
        engine.add(h, 9);

        let report = engine.report("r", ThreadSelector::All, 0);
        assert_eq!(report.get_u64("r.own"), Some(9));
        assert!(engine.lookup("r.created.during.walk").is_some());
    }
}
