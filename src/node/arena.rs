//! Node storage and structural edits

use super::data::*;
use super::{allows_child, NodeData, NodeId, NodeKind};
use crate::error::{Error, Result};
use std::collections::HashMap;

/// A node: kind-specific data plus its place in the tree
#[derive(Clone, Debug)]
pub struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

impl Node {
    /// Parent handle, `None` for the root and detached nodes
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Ordered child handles
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Node payload
    pub fn data(&self) -> &NodeData {
        &self.data
    }

    /// Node kind
    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }
}

/// Owned copy of a subtree, used to clone within or across arenas
struct Subtree {
    source: NodeId,
    data: NodeData,
    children: Vec<Subtree>,
}

/// Owner of every node of one document
#[derive(Clone, Debug)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    /// Create an arena holding only the document root
    pub fn new() -> Self {
        NodeArena {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                data: NodeData::Document,
            }],
        }
    }

    /// The document root
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of allocated nodes, attached or not
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// An arena always holds its root
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether the handle belongs to this arena
    pub fn contains(&self, id: NodeId) -> bool {
        id.slot() < self.nodes.len()
    }

    /// Look up a node
    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.slot()).ok_or(Error::NodeNotFound(id.0))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id.slot()).ok_or(Error::NodeNotFound(id.0))
    }

    /// Kind of a node
    pub fn kind(&self, id: NodeId) -> Result<NodeKind> {
        Ok(self.get(id)?.kind())
    }

    /// Payload of a node
    pub fn data(&self, id: NodeId) -> Result<&NodeData> {
        Ok(&self.get(id)?.data)
    }

    /// Mutable payload of a node; the kind cannot change through it
    pub fn data_mut(&mut self, id: NodeId) -> Result<&mut NodeData> {
        Ok(&mut self.get_mut(id)?.data)
    }

    /// Parent of a node
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.slot()).and_then(|n| n.parent)
    }

    /// Children of a node (empty for unknown handles)
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.slot())
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the node is reachable from the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root() {
                return true;
            }
            match self.parent(current) {
                Some(p) => current = p,
                None => return false,
            }
        }
    }

    /// Position of a node among its siblings
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    // === Creation ===

    /// Allocate a node of `kind`, optionally appended to `parent`
    pub fn create(&mut self, kind: NodeKind, parent: Option<NodeId>) -> Result<NodeId> {
        self.create_with(NodeData::new(kind), parent)
    }

    /// Allocate a node with the given payload, optionally appended to `parent`
    pub fn create_with(&mut self, data: NodeData, parent: Option<NodeId>) -> Result<NodeId> {
        let kind = data.kind();
        if kind == NodeKind::Document {
            return Err(Error::InvalidChild(
                "a document has exactly one root".into(),
            ));
        }
        if let Some(parent) = parent {
            let parent_kind = self.kind(parent)?;
            if !allows_child(parent_kind, self.sdt_context(parent), kind) {
                return Err(illegal(parent_kind, kind));
            }
        }
        let id = self.alloc(data);
        if let Some(parent) = parent {
            self.nodes[parent.slot()].children.push(id);
            self.nodes[id.slot()].parent = Some(parent);
        }
        Ok(id)
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    // === Structural edits ===

    /// Append `child` as the last child of `parent`
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.validate_attach(parent, child)?;
        self.detach(child);
        self.attach_at(parent, None, child);
        Ok(())
    }

    /// Insert `child` under `parent` right before `reference`
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) -> Result<()> {
        self.insert_relative(parent, child, reference, 0)
    }

    /// Insert `child` under `parent` right after `reference`
    pub fn insert_after(&mut self, parent: NodeId, child: NodeId, reference: NodeId) -> Result<()> {
        self.insert_relative(parent, child, reference, 1)
    }

    /// Insert `child` at `index` among the children of `parent`
    pub fn insert_at(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        self.validate_attach(parent, child)?;
        let mut index = index;
        if self.parent(child) == Some(parent) {
            if let Some(old) = self.index_in_parent(child) {
                if old < index {
                    index -= 1;
                }
            }
        }
        self.detach(child);
        let len = self.children(parent).len();
        self.attach_at(parent, Some(index.min(len)), child);
        Ok(())
    }

    fn insert_relative(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: NodeId,
        offset: usize,
    ) -> Result<()> {
        if child == reference {
            return Err(Error::InvalidChild(
                "a node cannot be inserted next to itself".into(),
            ));
        }
        if self.parent(reference) != Some(parent) {
            return Err(Error::InvalidChild(format!(
                "{} is not a child of {}",
                reference, parent
            )));
        }
        self.validate_attach(parent, child)?;
        self.detach(child);
        let index = self
            .index_in_parent(reference)
            .ok_or(Error::NodeNotFound(reference.0))?;
        self.attach_at(parent, Some(index + offset), child);
        Ok(())
    }

    /// Detach a node (and its subtree) from its parent.
    ///
    /// The subtree stays allocated and can be attached again.
    pub fn remove(&mut self, node: NodeId) -> Result<()> {
        self.get(node)?;
        if node == self.root() {
            return Err(Error::InvalidChild(
                "the document root cannot be removed".into(),
            ));
        }
        self.detach(node);
        Ok(())
    }

    /// Detach every child of a node
    pub fn remove_all_children(&mut self, node: NodeId) -> Result<()> {
        let children = std::mem::take(&mut self.get_mut(node)?.children);
        for child in children {
            self.nodes[child.slot()].parent = None;
        }
        Ok(())
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.slot()].parent.take() {
            self.nodes[parent.slot()].children.retain(|c| *c != node);
        }
    }

    fn attach_at(&mut self, parent: NodeId, index: Option<usize>, child: NodeId) {
        let children = &mut self.nodes[parent.slot()].children;
        match index {
            Some(i) if i < children.len() => children.insert(i, child),
            _ => children.push(child),
        }
        self.nodes[child.slot()].parent = Some(parent);
    }

    /// Check that `child` may be attached under `parent` without changing anything
    fn validate_attach(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_kind = self.kind(parent)?;
        let child_kind = self.kind(child)?;
        if child == self.root() {
            return Err(Error::InvalidChild(
                "the document root cannot be a child".into(),
            ));
        }
        let mut current = Some(parent);
        while let Some(node) = current {
            if node == child {
                return Err(Error::InvalidChild(format!(
                    "{} is an ancestor of {}",
                    child, parent
                )));
            }
            current = self.parent(node);
        }

        let context = self.sdt_context(parent);
        if !allows_child(parent_kind, context, child_kind) {
            return Err(illegal(parent_kind, child_kind));
        }

        if child_kind == NodeKind::StructuredDocumentTag {
            let inline = match parent_kind {
                NodeKind::Paragraph => Some(true),
                NodeKind::StructuredDocumentTag => context,
                _ => Some(false),
            };
            if let Some(inline) = inline {
                self.validate_sdt_content(child, inline)?;
            }
        }
        Ok(())
    }

    fn validate_sdt_content(&self, sdt: NodeId, inline: bool) -> Result<()> {
        for &child in self.children(sdt) {
            let kind = self.kind(child)?;
            if !allows_child(NodeKind::StructuredDocumentTag, Some(inline), kind) {
                return Err(Error::InvalidChild(format!(
                    "{:?} cannot appear in a {} structured document tag",
                    kind,
                    if inline { "inline" } else { "block" }
                )));
            }
            if kind == NodeKind::StructuredDocumentTag {
                self.validate_sdt_content(child, inline)?;
            }
        }
        Ok(())
    }

    /// Inline-ness of an SDT: decided by its nearest non-SDT ancestor.
    ///
    /// Returns `None` for non-SDT nodes' own context too; callers only
    /// consult it for SDT parents.
    pub(crate) fn sdt_context(&self, node: NodeId) -> Option<bool> {
        if self.kind(node).ok()? != NodeKind::StructuredDocumentTag {
            return None;
        }
        let mut current = self.parent(node);
        while let Some(id) = current {
            match self.kind(id).ok()? {
                NodeKind::StructuredDocumentTag => current = self.parent(id),
                kind => return Some(kind == NodeKind::Paragraph),
            }
        }
        None
    }

    /// Whether an SDT is an inline (run-level) tag
    pub fn is_inline_sdt(&self, node: NodeId) -> bool {
        self.sdt_context(node) == Some(true)
    }

    // === Cloning ===

    /// Clone a node. Deep clones copy the whole subtree with fresh handles.
    ///
    /// The clone is detached.
    pub fn clone_node(&mut self, node: NodeId, deep: bool) -> Result<NodeId> {
        let mut map = HashMap::new();
        let tree = self.snapshot(node, deep)?;
        Ok(self.materialize(tree, &mut map))
    }

    /// Copy a node from another arena into this one (detached)
    pub fn import_node(&mut self, source: &NodeArena, node: NodeId, deep: bool) -> Result<NodeId> {
        let mut map = HashMap::new();
        self.import_node_mapped(source, node, deep, &mut map)
    }

    /// Like [`NodeArena::import_node`], recording source -> copy handles
    pub(crate) fn import_node_mapped(
        &mut self,
        source: &NodeArena,
        node: NodeId,
        deep: bool,
        map: &mut HashMap<NodeId, NodeId>,
    ) -> Result<NodeId> {
        let tree = source.snapshot(node, deep)?;
        Ok(self.materialize(tree, map))
    }

    /// Deep clone recording source -> copy handles
    pub(crate) fn clone_node_mapped(
        &mut self,
        node: NodeId,
        map: &mut HashMap<NodeId, NodeId>,
    ) -> Result<NodeId> {
        let tree = self.snapshot(node, true)?;
        Ok(self.materialize(tree, map))
    }

    fn snapshot(&self, node: NodeId, deep: bool) -> Result<Subtree> {
        let n = self.get(node)?;
        if n.kind() == NodeKind::Document {
            return Err(Error::InvalidChild(
                "the document root cannot be cloned".into(),
            ));
        }
        let children = if deep {
            n.children
                .iter()
                .map(|c| self.snapshot(*c, true))
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };
        Ok(Subtree {
            source: node,
            data: n.data.clone(),
            children,
        })
    }

    fn materialize(&mut self, tree: Subtree, map: &mut HashMap<NodeId, NodeId>) -> NodeId {
        let id = self.alloc(tree.data);
        map.insert(tree.source, id);
        for child in tree.children {
            let child_id = self.materialize(child, map);
            self.nodes[child_id.slot()].parent = Some(id);
            self.nodes[id.slot()].children.push(child_id);
        }
        id
    }

    // === Minimum structure ===

    /// Add the children a container needs to be valid for Word.
    ///
    /// Document -> Section -> Body -> Paragraph and
    /// Table -> Row -> Cell -> Paragraph.
    pub fn ensure_minimum(&mut self, container: NodeId) -> Result<()> {
        match self.kind(container)? {
            NodeKind::Document => {
                let section = self.last_child_of_kind(container, NodeKind::Section);
                let section = match section {
                    Some(s) => s,
                    None => self.create(NodeKind::Section, Some(container))?,
                };
                self.ensure_minimum(section)
            }
            NodeKind::Section => {
                let body = match self.last_child_of_kind(container, NodeKind::Body) {
                    Some(b) => b,
                    None => self.create(NodeKind::Body, Some(container))?,
                };
                self.ensure_minimum(body)
            }
            NodeKind::Body | NodeKind::Cell => {
                let last_is_paragraph = self
                    .last_child(container)
                    .map(|c| self.kind(c).ok() == Some(NodeKind::Paragraph))
                    .unwrap_or(false);
                if !last_is_paragraph {
                    self.create(NodeKind::Paragraph, Some(container))?;
                }
                Ok(())
            }
            NodeKind::Table => {
                if self.last_child_of_kind(container, NodeKind::Row).is_none() {
                    self.create(NodeKind::Row, Some(container))?;
                }
                let rows: Vec<NodeId> = self.children_of_kind(container, NodeKind::Row);
                for row in rows {
                    self.ensure_minimum(row)?;
                }
                Ok(())
            }
            NodeKind::Row => {
                if self.last_child_of_kind(container, NodeKind::Cell).is_none() {
                    self.create(NodeKind::Cell, Some(container))?;
                }
                let cells: Vec<NodeId> = self.children_of_kind(container, NodeKind::Cell);
                for cell in cells {
                    self.ensure_minimum(cell)?;
                }
                Ok(())
            }
            kind => Err(Error::InvalidChild(format!(
                "minimum structure is not defined for {:?}",
                kind
            ))),
        }
    }

    /// Direct children of a given kind
    pub fn children_of_kind(&self, node: NodeId, kind: NodeKind) -> Vec<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .filter(|c| self.kind(*c).ok() == Some(kind))
            .collect()
    }

    fn last_child_of_kind(&self, node: NodeId, kind: NodeKind) -> Option<NodeId> {
        self.children(node)
            .iter()
            .rev()
            .copied()
            .find(|c| self.kind(*c).ok() == Some(kind))
    }
}

impl Default for NodeArena {
    fn default() -> Self {
        Self::new()
    }
}

fn illegal(parent: NodeKind, child: NodeKind) -> Error {
    Error::InvalidChild(format!("{:?} cannot contain {:?}", parent, child))
}

macro_rules! kind_accessors {
    ($($name:ident, $name_mut:ident, $variant:ident, $ty:ty;)*) => {
        impl NodeArena {
            $(
                #[doc = concat!("Typed access to a `", stringify!($variant), "` node")]
                pub fn $name(&self, id: NodeId) -> Result<&$ty> {
                    match self.data(id)? {
                        NodeData::$variant(d) => Ok(d),
                        other => Err(Error::WrongKind {
                            expected: NodeKind::$variant,
                            found: other.kind(),
                        }),
                    }
                }

                #[doc = concat!("Typed mutable access to a `", stringify!($variant), "` node")]
                pub fn $name_mut(&mut self, id: NodeId) -> Result<&mut $ty> {
                    match self.data_mut(id)? {
                        NodeData::$variant(d) => Ok(d),
                        other => Err(Error::WrongKind {
                            expected: NodeKind::$variant,
                            found: other.kind(),
                        }),
                    }
                }
            )*
        }
    };
}

kind_accessors! {
    section, section_mut, Section, Section;
    paragraph, paragraph_mut, Paragraph, Paragraph;
    run, run_mut, Run, Run;
    table, table_mut, Table, Table;
    row, row_mut, Row, Row;
    cell, cell_mut, Cell, Cell;
    sdt, sdt_mut, StructuredDocumentTag, Sdt;
    shape, shape_mut, Shape, Shape;
    comment, comment_mut, Comment, Comment;
}

impl NodeArena {
    /// Any of the three field characters
    pub fn field_char(&self, id: NodeId) -> Result<&FieldChar> {
        match self.data(id)? {
            NodeData::FieldStart(f) | NodeData::FieldSeparator(f) | NodeData::FieldEnd(f) => Ok(f),
            other => Err(Error::WrongKind {
                expected: NodeKind::FieldStart,
                found: other.kind(),
            }),
        }
    }

    /// Foreign node payload
    pub fn foreign(&self, id: NodeId) -> Result<&crate::xml::RawXmlNode> {
        match self.data(id)? {
            NodeData::Foreign(raw) => Ok(raw),
            other => Err(Error::WrongKind {
                expected: NodeKind::Foreign,
                found: other.kind(),
            }),
        }
    }

    /// Run formatting carried by an inline node (run, field char, shape)
    pub fn inline_format(&self, id: NodeId) -> Option<&crate::format::RunFormat> {
        match self.data(id).ok()? {
            NodeData::Run(r) => Some(&r.format),
            NodeData::FieldStart(f) | NodeData::FieldSeparator(f) | NodeData::FieldEnd(f) => {
                Some(&f.format)
            }
            NodeData::Shape(s) => Some(&s.format),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn body(arena: &mut NodeArena) -> NodeId {
        let root = arena.root();
        let section = arena.create(NodeKind::Section, Some(root)).unwrap();
        arena.create(NodeKind::Body, Some(section)).unwrap()
    }

    #[test]
    fn test_ensure_minimum_on_empty_document() {
        let mut arena = NodeArena::new();
        let root = arena.root();
        arena.ensure_minimum(root).unwrap();

        let section = arena.children(root);
        assert_eq!(section.len(), 1);
        let body = arena.children(section[0]);
        assert_eq!(body.len(), 1);
        let paragraph = arena.children(body[0]);
        assert_eq!(paragraph.len(), 1);
        assert_eq!(arena.kind(paragraph[0]).unwrap(), NodeKind::Paragraph);
        assert_eq!(arena.len(), 4);
    }

    #[test]
    fn test_create_rejects_illegal_kind() {
        let mut arena = NodeArena::new();
        let body = body(&mut arena);
        let before = arena.len();

        let err = arena.create(NodeKind::Run, Some(body)).unwrap_err();
        assert!(matches!(err, Error::InvalidChild(_)));
        assert_eq!(arena.len(), before);
    }

    #[test]
    fn test_cycle_is_rejected_without_change() {
        let mut arena = NodeArena::new();
        let body = body(&mut arena);
        let table = arena.create(NodeKind::Table, Some(body)).unwrap();
        let row = arena.create(NodeKind::Row, Some(table)).unwrap();
        let cell = arena.create(NodeKind::Cell, Some(row)).unwrap();
        let inner = arena.create(NodeKind::Table, Some(cell)).unwrap();

        // Moving the outer table into its own descendant
        let err = arena.append_child(cell, table).unwrap_err();
        assert!(matches!(err, Error::InvalidChild(_)));
        assert_eq!(arena.parent(table), Some(body));
        assert_eq!(arena.children(cell), &[inner]);
    }

    #[test]
    fn test_moving_attached_node_detaches_first() {
        let mut arena = NodeArena::new();
        let body = body(&mut arena);
        let p1 = arena.create(NodeKind::Paragraph, Some(body)).unwrap();
        let p2 = arena.create(NodeKind::Paragraph, Some(body)).unwrap();
        let run = arena.create(NodeKind::Run, Some(p1)).unwrap();

        arena.append_child(p2, run).unwrap();
        assert!(arena.children(p1).is_empty());
        assert_eq!(arena.children(p2), &[run]);

        arena.insert_before(body, p2, p1).unwrap();
        assert_eq!(arena.children(body), &[p2, p1]);
    }

    #[test]
    fn test_remove_keeps_node_allocated() {
        let mut arena = NodeArena::new();
        let body = body(&mut arena);
        let p = arena.create(NodeKind::Paragraph, Some(body)).unwrap();
        let run = arena.create(NodeKind::Run, Some(p)).unwrap();

        arena.remove(p).unwrap();
        assert!(arena.children(body).is_empty());
        assert!(!arena.is_attached(run));
        assert_eq!(arena.children(p), &[run]);

        let root = arena.root();
        assert!(matches!(arena.remove(root), Err(Error::InvalidChild(_))));
    }

    #[test]
    fn test_deep_clone_gets_fresh_handles() {
        let mut arena = NodeArena::new();
        let body = body(&mut arena);
        let p = arena.create(NodeKind::Paragraph, Some(body)).unwrap();
        let run = arena
            .create_with(NodeData::Run(Run::new("hello")), Some(p))
            .unwrap();

        let copy = arena.clone_node(p, true).unwrap();
        assert_ne!(copy, p);
        assert_eq!(arena.parent(copy), None);
        let copied_run = arena.children(copy)[0];
        assert_ne!(copied_run, run);
        assert_eq!(arena.run(copied_run).unwrap().text(), "hello");

        arena.run_mut(copied_run).unwrap().set_text("changed");
        assert_eq!(arena.run(run).unwrap().text(), "hello");

        let shallow = arena.clone_node(p, false).unwrap();
        assert!(arena.children(shallow).is_empty());
    }

    #[test]
    fn test_wrong_kind_accessor() {
        let mut arena = NodeArena::new();
        let body = body(&mut arena);
        let p = arena.create(NodeKind::Paragraph, Some(body)).unwrap();

        match arena.run(p) {
            Err(Error::WrongKind { expected, found }) => {
                assert_eq!(expected, NodeKind::Run);
                assert_eq!(found, NodeKind::Paragraph);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_sdt_level_follows_context() {
        let mut arena = NodeArena::new();
        let body = body(&mut arena);
        let p = arena.create(NodeKind::Paragraph, Some(body)).unwrap();
        let inline = arena
            .create(NodeKind::StructuredDocumentTag, Some(p))
            .unwrap();
        assert!(arena.is_inline_sdt(inline));
        assert!(arena.create(NodeKind::Run, Some(inline)).is_ok());
        assert!(arena.create(NodeKind::Paragraph, Some(inline)).is_err());

        let block = arena
            .create(NodeKind::StructuredDocumentTag, Some(body))
            .unwrap();
        assert!(!arena.is_inline_sdt(block));
        assert!(arena.create(NodeKind::Paragraph, Some(block)).is_ok());

        // A block tag holding a paragraph cannot move into a paragraph
        assert!(arena.append_child(p, block).is_err());
    }

    #[test]
    fn test_import_from_other_arena() {
        let mut source = NodeArena::new();
        let body_src = body(&mut source);
        let p = source.create(NodeKind::Paragraph, Some(body_src)).unwrap();
        source
            .create_with(NodeData::Run(Run::new("x")), Some(p))
            .unwrap();

        let mut dest = NodeArena::new();
        let copy = dest.import_node(&source, p, true).unwrap();
        assert_eq!(dest.kind(copy).unwrap(), NodeKind::Paragraph);
        assert_eq!(dest.children(copy).len(), 1);
    }
}
