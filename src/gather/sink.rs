//! Gather output sinks

use serde::Serialize;
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Receives the key/value pairs produced by a gather walk
///
/// Any state the receiver needs (the caller's context) lives in the
/// implementor. Closures taking `(&str, &str)` are sinks.
pub trait Sink {
    fn report(&mut self, key: &str, value: &str);
}

impl<F> Sink for F
where
    F: FnMut(&str, &str),
{
    fn report(&mut self, key: &str, value: &str) {
        self(key, value)
    }
}

/// Sink that keeps every reported pair, ordered by key
///
/// A key reported twice keeps the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Report {
    entries: BTreeMap<String, String>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Value parsed as an unsigned integer
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key)?.parse().ok()
    }

    /// Value parsed as a signed integer
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key)?.parse().ok()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Render as a pretty JSON object
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Sink for Report {
    fn report(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}

impl<'a> IntoIterator for &'a Report {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_collects_pairs() {
        let mut report = Report::new();
        report.report("hello.world", "12345");
        report.report("this.path.is.thread", "-1");
        report.report("hello.world", "7");

        assert_eq!(report.len(), 2);
        assert_eq!(report.get_u64("hello.world"), Some(7));
        assert_eq!(report.get_u64("this.path.is.thread"), None);
        assert_eq!(report.get_i64("this.path.is.thread"), Some(-1));
        assert_eq!(report.keys().collect::<Vec<_>>(), vec!["hello.world", "this.path.is.thread"]);
    }

    #[test]
    fn test_report_json() {
        let mut report = Report::new();
        report.report("a.b", "1");
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["a.b"], "1");
    }

    #[test]
    fn test_closure_is_sink() {
        let mut seen = Vec::new();
        let mut sink = |key: &str, value: &str| seen.push(format!("{key}={value}"));
        sink.report("x", "1");
        assert_eq!(seen, vec!["x=1"]);
    }
}
