//! Tree navigation and lazy node collections

use super::{NodeArena, NodeId, NodeKind};

/// Which nodes a collection yields
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindFilter {
    /// Every node
    Any,
    /// Nodes of one kind
    Only(NodeKind),
}

impl KindFilter {
    /// Whether a kind passes the filter
    pub fn matches(self, kind: NodeKind) -> bool {
        match self {
            KindFilter::Any => true,
            KindFilter::Only(k) => k == kind,
        }
    }
}

impl From<NodeKind> for KindFilter {
    fn from(kind: NodeKind) -> Self {
        KindFilter::Only(kind)
    }
}

/// Live view of the matching children or descendants of a node.
///
/// Nothing is collected up front; every call to [`NodeCollection::iter`]
/// walks the tree again from the start.
#[derive(Clone, Copy)]
pub struct NodeCollection<'a> {
    arena: &'a NodeArena,
    node: NodeId,
    filter: KindFilter,
    recursive: bool,
}

impl<'a> NodeCollection<'a> {
    /// Start a fresh walk
    pub fn iter(&self) -> NodeIter<'a> {
        NodeIter {
            arena: self.arena,
            filter: self.filter,
            recursive: self.recursive,
            stack: vec![self.arena.children(self.node).iter()],
        }
    }

    /// Number of matching nodes
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    /// Whether nothing matches
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// First matching node
    pub fn first(&self) -> Option<NodeId> {
        self.iter().next()
    }

    /// Last matching node
    pub fn last(&self) -> Option<NodeId> {
        self.iter().last()
    }

    /// Matching node at `index` in document order
    pub fn get(&self, index: usize) -> Option<NodeId> {
        self.iter().nth(index)
    }

    /// Snapshot of the matching handles, for use across mutations
    pub fn to_vec(&self) -> Vec<NodeId> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for NodeCollection<'a> {
    type Item = NodeId;
    type IntoIter = NodeIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &NodeCollection<'a> {
    type Item = NodeId;
    type IntoIter = NodeIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Pre-order walk with an explicit stack
pub struct NodeIter<'a> {
    arena: &'a NodeArena,
    filter: KindFilter,
    recursive: bool,
    stack: Vec<std::slice::Iter<'a, NodeId>>,
}

impl<'a> Iterator for NodeIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(&id) => {
                    if self.recursive {
                        let children = self.arena.children(id);
                        if !children.is_empty() {
                            self.stack.push(children.iter());
                        }
                    }
                    if let Ok(kind) = self.arena.kind(id) {
                        if self.filter.matches(kind) {
                            return Some(id);
                        }
                    }
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// Walk from a node's parent up to the root
pub struct Ancestors<'a> {
    arena: &'a NodeArena,
    current: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.current?;
        self.current = self.arena.parent(id);
        Some(id)
    }
}

impl NodeArena {
    /// Matching children (or all descendants when `recursive`) in document order
    pub fn child_nodes(
        &self,
        node: NodeId,
        filter: impl Into<KindFilter>,
        recursive: bool,
    ) -> NodeCollection<'_> {
        NodeCollection {
            arena: self,
            node,
            filter: filter.into(),
            recursive,
        }
    }

    /// Proper ancestors, nearest first
    pub fn ancestors(&self, node: NodeId) -> Ancestors<'_> {
        Ancestors {
            arena: self,
            current: self.parent(node),
        }
    }

    /// Nearest proper ancestor of a kind
    pub fn ancestor(&self, node: NodeId, kind: NodeKind) -> Option<NodeId> {
        self.ancestors(node)
            .find(|id| self.kind(*id).ok() == Some(kind))
    }

    /// First child
    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.children(node).first().copied()
    }

    /// Last child
    pub fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.children(node).last().copied()
    }

    /// Next sibling
    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let index = self.index_in_parent(node)?;
        self.children(parent).get(index + 1).copied()
    }

    /// Previous sibling
    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let index = self.index_in_parent(node)?;
        if index == 0 {
            return None;
        }
        self.children(parent).get(index - 1).copied()
    }

    /// Whether `ancestor` is `node` or one of its ancestors
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|a| a == ancestor)
    }
}
