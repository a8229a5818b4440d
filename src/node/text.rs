//! Plain and control-character text of subtrees

use super::{BreakType, NodeArena, NodeData, NodeId, RunContent};
use crate::xml::RawXmlNode;

/// Field start control character
pub const FIELD_START: char = '\u{13}';
/// Field separator control character
pub const FIELD_SEPARATOR: char = '\u{14}';
/// Field end control character
pub const FIELD_END: char = '\u{15}';
/// Paragraph end control character
pub const PARAGRAPH_END: char = '\r';
/// Cell end control character
pub const CELL_END: char = '\u{7}';

struct TextWalker<'a> {
    arena: &'a NodeArena,
    /// Control-character output instead of visible text
    range: bool,
    /// One entry per open field: `true` while inside its code
    fields: Vec<bool>,
    out: String,
    pending_break: bool,
}

impl TextWalker<'_> {
    fn in_code(&self) -> bool {
        self.fields.last().copied().unwrap_or(false)
    }

    fn walk(&mut self, node: NodeId, is_root: bool) {
        let arena = self.arena;
        let Ok(data) = arena.data(node) else {
            return;
        };
        match data {
            NodeData::Paragraph(_) => {
                if self.pending_break {
                    self.out.push('\n');
                    self.pending_break = false;
                }
                self.walk_children(node);
                if self.range {
                    self.out.push(PARAGRAPH_END);
                } else {
                    self.pending_break = true;
                }
            }
            NodeData::Run(run) => {
                if self.range {
                    push_range_run(&mut self.out, &run.content);
                } else if !self.in_code() {
                    self.out.push_str(&run.text());
                }
            }
            NodeData::FieldStart(_) => {
                if self.range {
                    self.out.push(FIELD_START);
                }
                self.fields.push(true);
            }
            NodeData::FieldSeparator(_) => {
                if self.range {
                    self.out.push(FIELD_SEPARATOR);
                }
                if let Some(top) = self.fields.last_mut() {
                    *top = false;
                }
            }
            NodeData::FieldEnd(_) => {
                if self.range {
                    self.out.push(FIELD_END);
                }
                self.fields.pop();
            }
            NodeData::Cell(_) => {
                self.walk_children(node);
                if self.range {
                    self.out.push(CELL_END);
                }
            }
            NodeData::Comment(_) if !is_root => {}
            NodeData::Foreign(raw) => {
                if self.range || !self.in_code() {
                    push_foreign_text(&mut self.out, raw);
                }
            }
            NodeData::Shape(_) => {}
            _ => self.walk_children(node),
        }
    }

    fn walk_children(&mut self, node: NodeId) {
        let arena = self.arena;
        for &child in arena.children(node) {
            self.walk(child, false);
        }
    }
}

fn push_range_run(out: &mut String, content: &[RunContent]) {
    for c in content {
        match c {
            RunContent::Text(t) => out.push_str(t),
            RunContent::Tab => out.push('\t'),
            RunContent::Break(BreakType::TextWrapping) | RunContent::CarriageReturn => {
                out.push('\u{b}')
            }
            RunContent::Break(BreakType::Page) => out.push('\u{c}'),
            RunContent::Break(BreakType::Column) => out.push('\u{e}'),
            RunContent::NoBreakHyphen => out.push('\u{1e}'),
            RunContent::SoftHyphen => out.push('\u{1f}'),
            RunContent::Unknown(_) => {}
        }
    }
}

/// Text of `w:t` descendants of preserved markup (hyperlinks, smart tags)
fn push_foreign_text(out: &mut String, raw: &RawXmlNode) {
    if let RawXmlNode::Element(e) = raw {
        if e.local_name() == "t" {
            out.push_str(&e.text());
            return;
        }
        for child in &e.children {
            push_foreign_text(out, child);
        }
    }
}

impl NodeArena {
    /// Visible text of a subtree.
    ///
    /// Paragraphs are separated by `\n`; field codes and comments are skipped.
    pub fn text(&self, node: NodeId) -> String {
        self.walk_text(node, false)
    }

    /// Text with Word control characters: field start/separator/end
    /// (`\u{13}`, `\u{14}`, `\u{15}`), paragraph end `\r`, cell end `\u{7}`.
    pub fn range_text(&self, node: NodeId) -> String {
        self.walk_text(node, true)
    }

    fn walk_text(&self, node: NodeId, range: bool) -> String {
        let mut walker = TextWalker {
            arena: self,
            range,
            fields: Vec::new(),
            out: String::new(),
            pending_break: false,
        };
        walker.walk(node, true);
        walker.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{FieldChar, NodeKind, Run};
    use pretty_assertions::assert_eq;

    fn paragraph_with(arena: &mut NodeArena, body: NodeId, items: Vec<NodeData>) -> NodeId {
        let p = arena.create(NodeKind::Paragraph, Some(body)).unwrap();
        for data in items {
            arena.create_with(data, Some(p)).unwrap();
        }
        p
    }

    #[test]
    fn test_text_joins_paragraphs() {
        let mut arena = NodeArena::new();
        let root = arena.root();
        arena.ensure_minimum(root).unwrap();
        let body = arena.child_nodes(root, NodeKind::Body, true).first().unwrap();
        let first = arena.first_child(body).unwrap();
        arena
            .create_with(NodeData::Run(Run::new("Hello")), Some(first))
            .unwrap();
        paragraph_with(&mut arena, body, vec![NodeData::Run(Run::new("World"))]);

        assert_eq!(arena.text(root), "Hello\nWorld");
        assert_eq!(arena.range_text(root), "Hello\rWorld\r");
    }

    #[test]
    fn test_field_code_hidden_from_visible_text() {
        let mut arena = NodeArena::new();
        let root = arena.root();
        arena.ensure_minimum(root).unwrap();
        let body = arena.child_nodes(root, NodeKind::Body, true).first().unwrap();
        let p = paragraph_with(
            &mut arena,
            body,
            vec![
                NodeData::Run(Run::new("Page ")),
                NodeData::FieldStart(FieldChar::default()),
                NodeData::Run(Run::new(" PAGE ")),
                NodeData::FieldSeparator(FieldChar::default()),
                NodeData::Run(Run::new("3")),
                NodeData::FieldEnd(FieldChar::default()),
            ],
        );

        assert_eq!(arena.text(p), "Page 3");
        assert_eq!(arena.range_text(p), "Page \u{13} PAGE \u{14}3\u{15}\r");
    }

    #[test]
    fn test_cell_end_marker() {
        let mut arena = NodeArena::new();
        let root = arena.root();
        arena.ensure_minimum(root).unwrap();
        let body = arena.child_nodes(root, NodeKind::Body, true).first().unwrap();
        let table = arena.create(NodeKind::Table, Some(body)).unwrap();
        arena.ensure_minimum(table).unwrap();
        let cell_p = arena
            .child_nodes(table, NodeKind::Paragraph, true)
            .first()
            .unwrap();
        arena
            .create_with(NodeData::Run(Run::new("x")), Some(cell_p))
            .unwrap();

        assert_eq!(arena.range_text(table), "x\r\u{7}");
        assert_eq!(arena.text(table), "x");
    }
}
