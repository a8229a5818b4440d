//! Edits that record revisions while tracking is on

use super::{is_trackable, FormatChange, RevisionKind, RevisionTracker, RevisionType};
use crate::error::Result;
use crate::format::{ParagraphFormat, RunFormat};
use crate::node::{KindFilter, NodeArena, NodeId};

/// `node` and its descendants that can carry revisions, in pre-order
pub(crate) fn trackable_subtree(arena: &NodeArena, node: NodeId) -> Vec<NodeId> {
    std::iter::once(node)
        .chain(arena.child_nodes(node, KindFilter::Any, true))
        .filter(|n| arena.kind(*n).map(is_trackable).unwrap_or(false))
        .collect()
}

impl RevisionTracker {
    /// Record insertions for a freshly attached subtree.
    ///
    /// Does nothing unless tracking.
    pub fn track_insertion(&mut self, arena: &NodeArena, node: NodeId) {
        if !self.is_tracking() {
            return;
        }
        for n in trackable_subtree(arena, node) {
            self.record(n, RevisionKind::Insertion);
        }
    }

    /// Remove a node, or mark it deleted while tracking.
    ///
    /// Removing content that is itself a pending insertion drops it outright.
    pub fn remove_node(&mut self, arena: &mut NodeArena, node: NodeId) -> Result<()> {
        let trackable = trackable_subtree(arena, node);
        let own_insertion = self.has(node, RevisionType::Insertion);
        if !self.is_tracking() || trackable.is_empty() || own_insertion {
            self.forget_subtree(arena, node);
            return arena.remove(node);
        }
        for n in trackable {
            if !self.has(n, RevisionType::Deletion) {
                self.record(n, RevisionKind::Deletion);
            }
        }
        Ok(())
    }

    /// Replace the text of a run.
    ///
    /// While tracking the old run is marked deleted and a new run with the
    /// same formatting is inserted after it; the returned handle is the run
    /// now holding the text.
    pub fn replace_run_text(
        &mut self,
        arena: &mut NodeArena,
        run: NodeId,
        text: &str,
    ) -> Result<NodeId> {
        if !self.is_tracking() || self.has(run, RevisionType::Insertion) {
            arena.run_mut(run)?.set_text(text);
            return Ok(run);
        }
        let parent = arena
            .parent(run)
            .ok_or_else(|| crate::error::Error::InvalidChild(format!("{} is detached", run)))?;
        let replacement = arena.clone_node(run, false)?;
        arena.run_mut(replacement)?.set_text(text);
        arena.insert_after(parent, replacement, run)?;
        self.record(run, RevisionKind::Deletion);
        self.record(replacement, RevisionKind::Insertion);
        Ok(replacement)
    }

    /// Set the style and direct formatting of a run
    pub fn set_run_format(
        &mut self,
        arena: &mut NodeArena,
        node: NodeId,
        style: Option<String>,
        format: RunFormat,
    ) -> Result<()> {
        let run = arena.run(node)?;
        let changed = run.style != style || run.format != format;
        if changed && !self.has(node, RevisionType::FormatChange) {
            let previous = FormatChange::Run {
                style: run.style.clone(),
                format: run.format.clone(),
            };
            self.record(node, RevisionKind::FormatChange(previous));
        }
        let run = arena.run_mut(node)?;
        run.style = style;
        run.format = format;
        Ok(())
    }

    /// Set the style and direct formatting of a paragraph
    pub fn set_paragraph_format(
        &mut self,
        arena: &mut NodeArena,
        node: NodeId,
        style: Option<String>,
        format: ParagraphFormat,
    ) -> Result<()> {
        let p = arena.paragraph(node)?;
        let changed = p.style != style || p.format != format;
        if changed && !self.has(node, RevisionType::FormatChange) {
            let previous = FormatChange::Paragraph {
                style: p.style.clone(),
                format: p.format.clone(),
            };
            self.record(node, RevisionKind::FormatChange(previous));
        }
        let p = arena.paragraph_mut(node)?;
        p.style = style;
        p.format = format;
        Ok(())
    }

    /// Move a node under `parent` at `index`.
    ///
    /// While tracking the original stays in place marked as moved from, and
    /// a copy marked as moved to is inserted; the copy is returned.
    pub fn move_node(
        &mut self,
        arena: &mut NodeArena,
        node: NodeId,
        parent: NodeId,
        index: usize,
    ) -> Result<NodeId> {
        if !self.is_tracking() {
            arena.insert_at(parent, index, node)?;
            return Ok(node);
        }
        let copy = arena.clone_node(node, true)?;
        arena.insert_at(parent, index, copy)?;
        for n in trackable_subtree(arena, node) {
            self.record(n, RevisionKind::MoveFrom);
        }
        for n in trackable_subtree(arena, copy) {
            self.record(n, RevisionKind::MoveTo);
        }
        Ok(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeData, NodeKind, Run};
    use crate::revision::RevisionView;
    use pretty_assertions::assert_eq;

    fn document() -> (NodeArena, NodeId, NodeId) {
        let mut arena = NodeArena::new();
        let root = arena.root();
        arena.ensure_minimum(root).unwrap();
        let body = arena.child_nodes(root, NodeKind::Body, true).first().unwrap();
        let p = arena.first_child(body).unwrap();
        arena
            .create_with(NodeData::Run(Run::new("Hello")), Some(p))
            .unwrap();
        (arena, body, p)
    }

    #[test]
    fn test_tracked_edits_are_symmetric() {
        let (mut arena, body, p) = document();
        let root = arena.root();
        let mut tracker = RevisionTracker::new();
        tracker.start_tracking("Ann", None);

        let run = arena.first_child(p).unwrap();
        tracker.replace_run_text(&mut arena, run, "Goodbye").unwrap();
        let added = arena.create(NodeKind::Paragraph, Some(body)).unwrap();
        arena
            .create_with(NodeData::Run(Run::new("world")), Some(added))
            .unwrap();
        tracker.track_insertion(&arena, added);

        assert_eq!(
            tracker.text_in_view(&arena, RevisionView::Original).unwrap(),
            "Hello"
        );
        assert_eq!(
            tracker.text_in_view(&arena, RevisionView::Final).unwrap(),
            "Goodbye\nworld"
        );

        let mut rejected = arena.clone();
        let mut rejected_tracker = tracker.clone();
        rejected_tracker.reject_all(&mut rejected).unwrap();
        assert_eq!(rejected.text(rejected.root()), "Hello");
        assert!(rejected_tracker.is_empty());

        tracker.accept_all(&mut arena).unwrap();
        assert_eq!(arena.text(root), "Goodbye\nworld");
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_removing_own_insertion_is_immediate() {
        let (mut arena, _, p) = document();
        let mut tracker = RevisionTracker::new();
        tracker.start_tracking("Ann", None);
        let run = arena
            .create_with(NodeData::Run(Run::new("!")), Some(p))
            .unwrap();
        tracker.track_insertion(&arena, run);
        tracker.remove_node(&mut arena, run).unwrap();

        assert!(tracker.is_empty());
        assert_eq!(arena.text(p), "Hello");
    }

    #[test]
    fn test_tracked_move() {
        let (mut arena, body, p) = document();
        let second = arena.create(NodeKind::Paragraph, Some(body)).unwrap();
        let mut tracker = RevisionTracker::new();
        tracker.start_tracking("Ann", None);

        let run = arena.first_child(p).unwrap();
        let copy = tracker.move_node(&mut arena, run, second, 0).unwrap();
        assert_ne!(copy, run);
        assert!(tracker.has(run, RevisionType::MoveFrom));
        assert!(tracker.has(copy, RevisionType::MoveTo));

        tracker.accept_all(&mut arena).unwrap();
        assert!(arena.children(p).is_empty());
        assert_eq!(arena.text(second), "Hello");
        assert_eq!(arena.children(second), &[copy]);
    }
}
