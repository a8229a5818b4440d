//! Accepting and rejecting revisions

use std::collections::HashMap;

use super::{tracking_order, FormatChange, RevisionKind, RevisionTracker};
use crate::error::{Error, Result};
use crate::node::{NodeArena, NodeData, NodeId, NodeKind};

impl RevisionTracker {
    /// Keep every change and drop all revisions
    pub fn accept_all(&mut self, arena: &mut NodeArena) -> Result<()> {
        self.resolve_all(arena, true)
    }

    /// Undo every change and drop all revisions
    pub fn reject_all(&mut self, arena: &mut NodeArena) -> Result<()> {
        self.resolve_all(arena, false)
    }

    /// Keep one change
    pub fn accept(&mut self, arena: &mut NodeArena, id: u32) -> Result<()> {
        self.resolve(arena, id, true)
    }

    /// Undo one change
    pub fn reject(&mut self, arena: &mut NodeArena, id: u32) -> Result<()> {
        self.resolve(arena, id, false)
    }

    /// Inline nodes first, then paragraph marks, then rows; document order
    /// within each category
    fn resolve_all(&mut self, arena: &mut NodeArena, accept: bool) -> Result<()> {
        let position: HashMap<NodeId, usize> = tracking_order(arena)
            .into_iter()
            .enumerate()
            .map(|(i, n)| (n, i))
            .collect();

        let mut pending: Vec<(u8, usize, u32)> = self
            .revisions
            .iter()
            .map(|r| {
                let category = match arena.kind(r.node) {
                    Ok(kind) if kind.is_inline() => 0,
                    Ok(NodeKind::Paragraph) => 1,
                    _ => 2,
                };
                let pos = position.get(&r.node).copied().unwrap_or(usize::MAX);
                (category, pos, r.id)
            })
            .collect();
        pending.sort_unstable();

        log::debug!(
            "{} {} revisions",
            if accept { "accepting" } else { "rejecting" },
            pending.len()
        );
        for (_, _, id) in pending {
            // Earlier resolutions may have removed the node
            if self.get(id).is_some() {
                self.resolve(arena, id, accept)?;
            }
        }
        self.revisions.clear();
        Ok(())
    }

    fn resolve(&mut self, arena: &mut NodeArena, id: u32, accept: bool) -> Result<()> {
        let index = self
            .revisions
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| Error::MissingReference(format!("revision {}", id)))?;
        let revision = self.revisions.remove(index);

        let remove = if accept {
            revision.kind.removes_on_accept()
        } else {
            revision.kind.removes_on_reject()
        };
        if remove {
            return self.remove_tracked(arena, revision.node);
        }
        if let (false, RevisionKind::FormatChange(change)) = (accept, revision.kind) {
            restore_format(arena, revision.node, change)?;
        }
        Ok(())
    }

    fn remove_tracked(&mut self, arena: &mut NodeArena, node: NodeId) -> Result<()> {
        if !arena.is_attached(node) {
            self.forget_subtree(arena, node);
            return Ok(());
        }
        match arena.kind(node)? {
            NodeKind::Paragraph => self.remove_paragraph_mark(arena, node),
            NodeKind::Row => {
                let table = arena.parent(node);
                self.forget_subtree(arena, node);
                arena.remove(node)?;
                if let Some(table) = table {
                    if arena.children_of_kind(table, NodeKind::Row).is_empty() {
                        self.remove_container_child(arena, table)?;
                    }
                }
                Ok(())
            }
            _ => {
                self.forget_subtree(arena, node);
                arena.remove(node)
            }
        }
    }

    /// The paragraph's remaining content joins the following paragraph;
    /// an empty paragraph is removed.
    fn remove_paragraph_mark(&mut self, arena: &mut NodeArena, paragraph: NodeId) -> Result<()> {
        let next = arena
            .next_sibling(paragraph)
            .filter(|n| arena.kind(*n).ok() == Some(NodeKind::Paragraph));
        let content = arena.children(paragraph).to_vec();

        match next {
            Some(next) => {
                for (index, child) in content.into_iter().enumerate() {
                    arena.insert_at(next, index, child)?;
                }
                self.remove_container_child(arena, paragraph)
            }
            None if content.is_empty() => self.remove_container_child(arena, paragraph),
            None => Ok(()),
        }
    }

    /// Remove a block node, keeping its container valid
    fn remove_container_child(&mut self, arena: &mut NodeArena, node: NodeId) -> Result<()> {
        let parent = arena.parent(node);
        self.forget_subtree(arena, node);
        arena.remove(node)?;
        if let Some(parent) = parent {
            let needs_content = matches!(arena.kind(parent)?, NodeKind::Body | NodeKind::Cell);
            if needs_content && arena.children(parent).is_empty() {
                arena.ensure_minimum(parent)?;
            }
        }
        Ok(())
    }
}

fn restore_format(arena: &mut NodeArena, node: NodeId, change: FormatChange) -> Result<()> {
    match (arena.data_mut(node)?, change) {
        (NodeData::Run(run), FormatChange::Run { style, format }) => {
            run.style = style;
            run.format = format;
        }
        (NodeData::Paragraph(p), FormatChange::Paragraph { style, format }) => {
            p.style = style;
            p.format = format;
        }
        (data, _) => {
            log::warn!(
                "format change on {} does not match its {:?} node",
                node,
                data.kind()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::RunFormat;
    use crate::node::Run;
    use pretty_assertions::assert_eq;

    fn body_with(texts: &[&str]) -> (NodeArena, Vec<NodeId>) {
        let mut arena = NodeArena::new();
        let root = arena.root();
        arena.ensure_minimum(root).unwrap();
        let body = arena.child_nodes(root, NodeKind::Body, true).first().unwrap();
        let first = arena.first_child(body).unwrap();
        arena.remove(first).unwrap();
        let mut paragraphs = Vec::new();
        for text in texts {
            let p = arena.create(NodeKind::Paragraph, Some(body)).unwrap();
            arena
                .create_with(NodeData::Run(Run::new(*text)), Some(p))
                .unwrap();
            paragraphs.push(p);
        }
        (arena, paragraphs)
    }

    #[test]
    fn test_deleted_paragraph_mark_merges_into_next() {
        let (mut arena, paragraphs) = body_with(&["Hello ", "world"]);
        let mut tracker = RevisionTracker::new();
        tracker.add(paragraphs[0], RevisionKind::Deletion, "Ann", None);

        assert_eq!(
            tracker
                .text_in_view(&arena, crate::revision::RevisionView::Original)
                .unwrap(),
            "Hello \nworld"
        );
        tracker.accept_all(&mut arena).unwrap();
        assert_eq!(arena.text(arena.root()), "Hello world");
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_rejected_format_change_restores() {
        let (mut arena, paragraphs) = body_with(&["x"]);
        let run = arena.first_child(paragraphs[0]).unwrap();
        arena.run_mut(run).unwrap().format = RunFormat::default().with_bold(true);

        let mut tracker = RevisionTracker::new();
        let id = tracker.add(
            run,
            RevisionKind::FormatChange(FormatChange::Run {
                style: None,
                format: RunFormat::default(),
            }),
            "Ann",
            None,
        );
        tracker.reject(&mut arena, id).unwrap();
        assert_eq!(arena.run(run).unwrap().format, RunFormat::default());
        assert!(tracker.reject(&mut arena, id).is_err());
    }

    #[test]
    fn test_rejected_row_insertion_removes_empty_table() {
        let (mut arena, paragraphs) = body_with(&["before"]);
        let body = arena.parent(paragraphs[0]).unwrap();
        let table = arena.create(NodeKind::Table, Some(body)).unwrap();
        arena.ensure_minimum(table).unwrap();
        let row = arena.first_child(table).unwrap();

        let mut tracker = RevisionTracker::new();
        tracker.add(row, RevisionKind::Insertion, "Ann", None);
        tracker.reject_all(&mut arena).unwrap();

        assert!(!arena.is_attached(table));
        assert_eq!(arena.children(body), &[paragraphs[0]]);
    }
}
