//! Node Selector: picks which node in the current topology a request goes to next, and advances
//! on failure.
//!
//! `0 <= current_index < len(nodes)` always holds, for any non-empty node list — enforced by
//! taking the index modulo the list length on every read and advance.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::node::NodeAddress;

/// Round-robin-on-failure node selection. Cheap to clone (shares the same index counter), so every
/// session/executor caller observes the same rotation.
#[derive(Debug)]
pub(crate) struct NodeSelector {
    index: AtomicUsize,
}

impl NodeSelector {
    pub(crate) fn new() -> Self {
        Self {
            index: AtomicUsize::new(0),
        }
    }

    /// Returns the node this selector currently favors. `nodes` must be non-empty; callers hold
    /// this invariant by refusing to commit a topology with zero nodes.
    pub(crate) fn current_node<'a>(&self, nodes: &'a [NodeAddress]) -> &'a NodeAddress {
        let index = self.index.load(Ordering::Acquire) % nodes.len();
        &nodes[index]
    }

    pub(crate) fn current_index(&self, node_count: usize) -> usize {
        self.index.load(Ordering::Acquire) % node_count
    }

    /// Advances past the current node, wrapping modulo the list length. A no-op on a single-node
    /// topology (it wraps back to the same index).
    pub(crate) fn on_failure(&self, node_count: usize) {
        if node_count == 0 {
            return;
        }
        self.index.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
            Some((current + 1) % node_count)
        }).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Scheme;

    fn nodes(n: usize) -> Vec<NodeAddress> {
        (0..n)
            .map(|i| NodeAddress::new(Scheme::Http, format!("node-{i}"), 8080, "Foo"))
            .collect()
    }

    #[test]
    fn starts_at_first_node() {
        let selector = NodeSelector::new();
        let nodes = nodes(3);
        assert_eq!(selector.current_node(&nodes).host, "node-0");
    }

    #[test]
    fn on_failure_advances_and_wraps() {
        let selector = NodeSelector::new();
        let nodes = nodes(3);
        selector.on_failure(nodes.len());
        assert_eq!(selector.current_node(&nodes).host, "node-1");
        selector.on_failure(nodes.len());
        selector.on_failure(nodes.len());
        assert_eq!(selector.current_node(&nodes).host, "node-0");
    }

    #[test]
    fn index_always_in_bounds() {
        let selector = NodeSelector::new();
        let nodes = nodes(2);
        for _ in 0..10 {
            selector.on_failure(nodes.len());
            let index = selector.current_index(nodes.len());
            assert!(index < nodes.len());
        }
    }

    #[test]
    fn single_node_topology_is_stable() {
        let selector = NodeSelector::new();
        let nodes = nodes(1);
        selector.on_failure(nodes.len());
        assert_eq!(selector.current_node(&nodes).host, "node-0");
    }
}
