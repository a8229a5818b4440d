//! Tracked changes
//!
//! A [`RevisionTracker`] records pending revisions against arena nodes.
//! Trackable nodes are inline nodes (runs, field characters, shapes),
//! paragraph marks (the paragraph node itself) and table rows. Resolving a
//! revision either keeps the change (accept) or undoes it (reject).

mod compare;
mod edit;
mod resolve;

pub use compare::{compare, CompareGranularity, CompareOptions};

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::format::{ParagraphFormat, RunFormat};
use crate::node::{NodeArena, NodeId, NodeKind};

/// Formatting in effect before a format change
#[derive(Clone, Debug, PartialEq)]
pub enum FormatChange {
    /// Previous character style and direct run formatting (w:rPrChange)
    Run {
        style: Option<String>,
        format: RunFormat,
    },
    /// Previous paragraph style and direct paragraph formatting (w:pPrChange)
    Paragraph {
        style: Option<String>,
        format: ParagraphFormat,
    },
}

/// What a revision did
#[derive(Clone, Debug, PartialEq)]
pub enum RevisionKind {
    Insertion,
    Deletion,
    FormatChange(FormatChange),
    /// Source side of a move; resolves like a deletion
    MoveFrom,
    /// Destination side of a move; resolves like an insertion
    MoveTo,
}

/// Kind of a revision without its payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RevisionType {
    Insertion,
    Deletion,
    FormatChange,
    MoveFrom,
    MoveTo,
}

impl RevisionKind {
    /// Payload-free kind
    pub fn revision_type(&self) -> RevisionType {
        match self {
            RevisionKind::Insertion => RevisionType::Insertion,
            RevisionKind::Deletion => RevisionType::Deletion,
            RevisionKind::FormatChange(_) => RevisionType::FormatChange,
            RevisionKind::MoveFrom => RevisionType::MoveFrom,
            RevisionKind::MoveTo => RevisionType::MoveTo,
        }
    }

    /// Whether accepting removes the node
    fn removes_on_accept(&self) -> bool {
        matches!(self, RevisionKind::Deletion | RevisionKind::MoveFrom)
    }

    /// Whether rejecting removes the node
    fn removes_on_reject(&self) -> bool {
        matches!(self, RevisionKind::Insertion | RevisionKind::MoveTo)
    }
}

/// One pending revision
#[derive(Clone, Debug, PartialEq)]
pub struct Revision {
    pub id: u32,
    /// Revised node
    pub node: NodeId,
    pub kind: RevisionKind,
    pub author: String,
    /// `None` when timestamps are suppressed
    pub date: Option<DateTime<Utc>>,
}

/// Which state of the document to look at
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RevisionView {
    /// As if every revision were rejected
    Original,
    /// As if every revision were accepted
    #[default]
    Final,
}

/// Adjacent revisions of the same kind and author
#[derive(Clone, Debug, PartialEq)]
pub struct RevisionGroup {
    pub revision_type: RevisionType,
    pub author: String,
    /// Revision ids in document order
    pub revisions: Vec<u32>,
    /// Text of the revised inline nodes
    pub text: String,
}

#[derive(Clone, Debug)]
struct TrackingSession {
    author: String,
    date: Option<DateTime<Utc>>,
}

/// Pending revisions of one document
#[derive(Clone, Debug, Default)]
pub struct RevisionTracker {
    revisions: Vec<Revision>,
    next_id: u32,
    session: Option<TrackingSession>,
}

impl RevisionTracker {
    /// Tracker with no revisions, not tracking
    pub fn new() -> Self {
        Self::default()
    }

    /// Record edits as revisions from now on. `date = None` suppresses
    /// timestamps.
    pub fn start_tracking(&mut self, author: impl Into<String>, date: Option<DateTime<Utc>>) {
        self.session = Some(TrackingSession {
            author: author.into(),
            date,
        });
    }

    /// Stop recording edits; pending revisions stay
    pub fn stop_tracking(&mut self) {
        self.session = None;
    }

    /// Whether edits are being recorded
    pub fn is_tracking(&self) -> bool {
        self.session.is_some()
    }

    /// All pending revisions in recording order
    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    /// Number of pending revisions
    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    /// Whether there are no pending revisions
    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    /// Revision by id
    pub fn get(&self, id: u32) -> Option<&Revision> {
        self.revisions.iter().find(|r| r.id == id)
    }

    /// Revisions recorded on a node
    pub fn revisions_for(&self, node: NodeId) -> impl Iterator<Item = &Revision> {
        self.revisions.iter().filter(move |r| r.node == node)
    }

    /// Whether a node carries a revision of `revision_type`
    pub fn has(&self, node: NodeId, revision_type: RevisionType) -> bool {
        self.revisions_for(node)
            .any(|r| r.kind.revision_type() == revision_type)
    }

    /// Add a revision with explicit attribution and return its id
    pub fn add(
        &mut self,
        node: NodeId,
        kind: RevisionKind,
        author: impl Into<String>,
        date: Option<DateTime<Utc>>,
    ) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.revisions.push(Revision {
            id,
            node,
            kind,
            author: author.into(),
            date,
        });
        id
    }

    /// Add a revision attributed to the tracking session, if any
    pub(crate) fn record(&mut self, node: NodeId, kind: RevisionKind) -> Option<u32> {
        let session = self.session.clone()?;
        Some(self.add(node, kind, session.author, session.date))
    }

    /// Drop every revision on `node` and its descendants
    pub(crate) fn forget_subtree(&mut self, arena: &NodeArena, node: NodeId) {
        self.revisions
            .retain(|r| !arena.is_ancestor_or_self(node, r.node));
    }

    /// Copy revisions of `source` whose nodes appear in `map`
    pub(crate) fn import_from(&mut self, source: &RevisionTracker, map: &HashMap<NodeId, NodeId>) {
        for revision in &source.revisions {
            if let Some(&node) = map.get(&revision.node) {
                self.add(
                    node,
                    revision.kind.clone(),
                    revision.author.clone(),
                    revision.date,
                );
            }
        }
    }

    /// Text of the document with every revision accepted or rejected,
    /// leaving this document untouched
    pub fn text_in_view(&self, arena: &NodeArena, view: RevisionView) -> Result<String> {
        let mut arena = arena.clone();
        let mut tracker = self.clone();
        match view {
            RevisionView::Final => tracker.accept_all(&mut arena)?,
            RevisionView::Original => tracker.reject_all(&mut arena)?,
        }
        Ok(arena.text(arena.root()))
    }

    /// Revisions clustered into runs of adjacent revisions with the same
    /// kind and author
    pub fn revision_groups(&self, arena: &NodeArena) -> Vec<RevisionGroup> {
        let order = tracking_order(arena);
        let position: HashMap<NodeId, usize> =
            order.iter().enumerate().map(|(i, n)| (*n, i)).collect();

        let mut ordered: Vec<(usize, &Revision)> = self
            .revisions
            .iter()
            .filter_map(|r| position.get(&r.node).map(|p| (*p, r)))
            .collect();
        ordered.sort_by_key(|(p, r)| (*p, r.id));

        let mut groups: Vec<RevisionGroup> = Vec::new();
        let mut last_position: Option<usize> = None;
        for (pos, revision) in ordered {
            let revision_type = revision.kind.revision_type();
            let adjacent = last_position.map(|l| pos <= l + 1).unwrap_or(false);
            let text = match arena.run(revision.node) {
                Ok(run) => run.text(),
                Err(_) => String::new(),
            };
            match groups.last_mut() {
                Some(group)
                    if adjacent
                        && group.revision_type == revision_type
                        && group.author == revision.author =>
                {
                    group.revisions.push(revision.id);
                    group.text.push_str(&text);
                }
                _ => groups.push(RevisionGroup {
                    revision_type,
                    author: revision.author.clone(),
                    revisions: vec![revision.id],
                    text,
                }),
            }
            last_position = Some(pos);
        }
        groups
    }
}

/// Whether revisions can be recorded on a node kind
pub fn is_trackable(kind: NodeKind) -> bool {
    kind.is_inline() || matches!(kind, NodeKind::Paragraph | NodeKind::Row)
}

/// Trackable nodes of the attached tree in document order; a paragraph
/// mark and a row end come after their content
pub(crate) fn tracking_order(arena: &NodeArena) -> Vec<NodeId> {
    fn walk(arena: &NodeArena, node: NodeId, out: &mut Vec<NodeId>) {
        let Ok(kind) = arena.kind(node) else {
            return;
        };
        if kind.is_inline() {
            out.push(node);
            return;
        }
        for &child in arena.children(node) {
            walk(arena, child, out);
        }
        if matches!(kind, NodeKind::Paragraph | NodeKind::Row) {
            out.push(node);
        }
    }
    let mut out = Vec::new();
    walk(arena, arena.root(), &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeData, Run};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_requires_session() {
        let mut tracker = RevisionTracker::new();
        let node = NodeId(3);
        assert_eq!(tracker.record(node, RevisionKind::Insertion), None);

        tracker.start_tracking("Ann", None);
        assert!(tracker.is_tracking());
        let id = tracker.record(node, RevisionKind::Insertion).unwrap();
        assert_eq!(tracker.get(id).unwrap().author, "Ann");
        assert!(tracker.has(node, RevisionType::Insertion));

        tracker.stop_tracking();
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_groups_split_on_author_and_gap() {
        let mut arena = NodeArena::new();
        let root = arena.root();
        arena.ensure_minimum(root).unwrap();
        let p = arena.child_nodes(root, NodeKind::Paragraph, true).first().unwrap();
        let runs: Vec<NodeId> = ["a", "b", "c", "d"]
            .iter()
            .map(|t| {
                arena
                    .create_with(NodeData::Run(Run::new(*t)), Some(p))
                    .unwrap()
            })
            .collect();

        let mut tracker = RevisionTracker::new();
        tracker.add(runs[0], RevisionKind::Insertion, "Ann", None);
        tracker.add(runs[1], RevisionKind::Insertion, "Ann", None);
        tracker.add(runs[2], RevisionKind::Insertion, "Bob", None);

        let groups = tracker.revision_groups(&arena);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].text, "ab");
        assert_eq!(groups[0].revisions, vec![0, 1]);
        assert_eq!(groups[1].author, "Bob");

        tracker.add(runs[0], RevisionKind::Deletion, "Ann", None);
        tracker.add(runs[3], RevisionKind::Deletion, "Ann", None);
        let deletions: Vec<_> = tracker
            .revision_groups(&arena)
            .into_iter()
            .filter(|g| g.revision_type == RevisionType::Deletion)
            .collect();
        // "a" and "d" are not adjacent
        assert_eq!(deletions.len(), 2);
    }
}
