//! Introspection walk
//!
//! Reports counters inside a subtree as text key/value pairs, handing
//! vivifier counters their own node to fill in.

mod sink;
mod vivify;
mod walk;

pub use sink::{Report, Sink};
pub use vivify::{Vivifier, VivifyNode};
