//! Per-document anchor table.

use crate::reader::Mark;
use std::collections::HashMap;

/// What an anchor name is bound to: the ordinal of the node within its
/// document and where the anchor was written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct AnchorBinding {
    pub node: usize,
    pub mark: Mark,
}

/// Anchor names visible in the current document. Later definitions shadow
/// earlier ones.
#[derive(Debug, Default)]
pub(crate) struct AnchorTable {
    bindings: HashMap<String, AnchorBinding>,
    nodes: usize,
}

impl AnchorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a node of the current document and return its ordinal.
    pub fn next_node(&mut self) -> usize {
        let node = self.nodes;
        self.nodes += 1;
        node
    }

    /// Bind `name` to `node`. Returns the binding it shadows, if any.
    pub fn define(&mut self, name: &str, node: usize, mark: Mark) -> Option<AnchorBinding> {
        self.bindings
            .insert(name.to_string(), AnchorBinding { node, mark })
    }

    pub fn resolve(&self, name: &str) -> Option<AnchorBinding> {
        self.bindings.get(name).copied()
    }

    /// Forget every binding at a document boundary.
    pub fn clear(&mut self) {
        self.bindings.clear();
        self.nodes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_resolve() {
        let mut table = AnchorTable::new();
        let node = table.next_node();
        assert_eq!(table.define("a", node, Mark::default()), None);
        assert_eq!(table.resolve("a").map(|b| b.node), Some(0));
        assert_eq!(table.resolve("b"), None);
    }

    #[test]
    fn test_redefinition_shadows() {
        let mut table = AnchorTable::new();
        let first = table.next_node();
        let second = table.next_node();
        table.define("a", first, Mark::default());
        let shadowed = table.define("a", second, Mark::default());
        assert_eq!(shadowed.map(|b| b.node), Some(first));
        assert_eq!(table.resolve("a").map(|b| b.node), Some(second));
    }

    #[test]
    fn test_clear_forgets_everything() {
        let mut table = AnchorTable::new();
        let node = table.next_node();
        table.define("a", node, Mark::default());
        table.clear();
        assert_eq!(table.resolve("a"), None);
        assert_eq!(table.next_node(), 0);
    }
}
