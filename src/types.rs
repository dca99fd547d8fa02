//! Core type definitions shared across the crate.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Opaque node identifier, unique within the process.
///
/// Used for diagnostics only ([`Display`](std::fmt::Display) output and tracing fields); node
/// identity is the node itself, see [`Node::ptr_eq`](crate::Node::ptr_eq).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        NodeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
