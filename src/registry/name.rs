//! Hierarchical counter names
//!
//! Names are dotted paths (`hello.world`). Subtree filters are anchored to
//! whole segments: `hello` selects `hello.world` but `hel` selects nothing.

/// Separator between name segments
pub const SEPARATOR: char = '.';

/// Check whether `name` lies inside the subtree selected by `filter`
///
/// An empty filter selects everything. Otherwise `name` must start with
/// `filter` and the match must end on a segment boundary.
#[inline]
pub fn segment_prefix_match(filter: &str, name: &str) -> bool {
    if filter.is_empty() {
        return true;
    }

    match name.strip_prefix(filter) {
        Some(rest) => rest.is_empty() || rest.starts_with(SEPARATOR),
        None => false,
    }
}

/// Join a parent name and a relative child path
pub fn join(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        return child.to_string();
    }
    if child.is_empty() {
        return parent.to_string();
    }

    let mut full = String::with_capacity(parent.len() + 1 + child.len());
    full.push_str(parent);
    full.push(SEPARATOR);
    full.push_str(child);
    full
}

/// Proper segment-aligned ancestors of `name`, shortest first
///
/// `a.b.c` yields `a` then `a.b`.
pub fn ancestors(name: &str) -> impl Iterator<Item = &str> {
    name.match_indices(SEPARATOR).map(move |(idx, _)| &name[..idx])
}
