//! Document object model
//!
//! All nodes of one document live in a [`NodeArena`] and are addressed by
//! [`NodeId`] handles. Handles are never reused, so a handle to a removed
//! node never aliases a newer node.

mod arena;
mod data;
mod text;
mod traverse;

pub use arena::{Node, NodeArena};
pub use data::{
    BreakType, Cell, Comment, FieldChar, ListItem, NodeData, Paragraph, Row, Run, RunContent,
    Sdt, SdtType, Section, Shape, Table, XmlMapping,
};
pub use text::{CELL_END, FIELD_END, FIELD_SEPARATOR, FIELD_START, PARAGRAPH_END};
pub use traverse::{Ancestors, KindFilter, NodeCollection, NodeIter};

/// Stable handle of a node within its arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Raw index of the handle
    pub fn index(self) -> u32 {
        self.0
    }

    fn slot(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Closed set of node kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Section,
    Body,
    Paragraph,
    Run,
    Table,
    Row,
    Cell,
    FieldStart,
    FieldSeparator,
    FieldEnd,
    StructuredDocumentTag,
    Shape,
    Comment,
    /// Preserved unrecognized markup
    Foreign,
}

impl NodeKind {
    /// Kinds that may have children
    pub fn is_composite(self) -> bool {
        matches!(
            self,
            NodeKind::Document
                | NodeKind::Section
                | NodeKind::Body
                | NodeKind::Paragraph
                | NodeKind::Table
                | NodeKind::Row
                | NodeKind::Cell
                | NodeKind::StructuredDocumentTag
                | NodeKind::Comment
        )
    }

    /// Kinds that live inside paragraphs
    pub fn is_inline(self) -> bool {
        matches!(
            self,
            NodeKind::Run
                | NodeKind::FieldStart
                | NodeKind::FieldSeparator
                | NodeKind::FieldEnd
                | NodeKind::Shape
        )
    }

    /// Field start, separator or end
    pub fn is_field_char(self) -> bool {
        matches!(
            self,
            NodeKind::FieldStart | NodeKind::FieldSeparator | NodeKind::FieldEnd
        )
    }
}

const BLOCK_CHILDREN: &[NodeKind] = &[
    NodeKind::Paragraph,
    NodeKind::Table,
    NodeKind::StructuredDocumentTag,
    NodeKind::Foreign,
];

const INLINE_CHILDREN: &[NodeKind] = &[
    NodeKind::Run,
    NodeKind::FieldStart,
    NodeKind::FieldSeparator,
    NodeKind::FieldEnd,
    NodeKind::StructuredDocumentTag,
    NodeKind::Shape,
    NodeKind::Foreign,
];

const PARAGRAPH_CHILDREN: &[NodeKind] = &[
    NodeKind::Run,
    NodeKind::FieldStart,
    NodeKind::FieldSeparator,
    NodeKind::FieldEnd,
    NodeKind::StructuredDocumentTag,
    NodeKind::Shape,
    NodeKind::Comment,
    NodeKind::Foreign,
];

/// Whether `child` may be placed directly under `parent`.
///
/// `inline_sdt` tells whether an SDT parent sits inside a paragraph;
/// `None` (a detached SDT) accepts both block and inline content.
pub(crate) fn allows_child(parent: NodeKind, inline_sdt: Option<bool>, child: NodeKind) -> bool {
    match parent {
        NodeKind::Document => child == NodeKind::Section,
        NodeKind::Section => child == NodeKind::Body,
        NodeKind::Body | NodeKind::Cell => BLOCK_CHILDREN.contains(&child),
        NodeKind::Paragraph => PARAGRAPH_CHILDREN.contains(&child),
        NodeKind::Table => matches!(child, NodeKind::Row | NodeKind::Foreign),
        NodeKind::Row => matches!(child, NodeKind::Cell | NodeKind::Foreign),
        NodeKind::Comment => child == NodeKind::Paragraph,
        NodeKind::StructuredDocumentTag => match inline_sdt {
            Some(true) => INLINE_CHILDREN.contains(&child),
            Some(false) => BLOCK_CHILDREN.contains(&child),
            None => INLINE_CHILDREN.contains(&child) || BLOCK_CHILDREN.contains(&child),
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legality_table() {
        assert!(allows_child(NodeKind::Body, None, NodeKind::Table));
        assert!(!allows_child(NodeKind::Body, None, NodeKind::Run));
        assert!(allows_child(NodeKind::Paragraph, None, NodeKind::Comment));
        assert!(!allows_child(NodeKind::Run, None, NodeKind::Run));
        assert!(allows_child(
            NodeKind::StructuredDocumentTag,
            Some(true),
            NodeKind::Run
        ));
        assert!(!allows_child(
            NodeKind::StructuredDocumentTag,
            Some(true),
            NodeKind::Paragraph
        ));
        assert!(!allows_child(
            NodeKind::StructuredDocumentTag,
            Some(false),
            NodeKind::Run
        ));
    }
}
