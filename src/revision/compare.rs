//! Document comparison producing tracked changes
//!
//! Blocks (paragraphs, tables, block tags) are aligned by longest common
//! subsequence over their text. Changed paragraph pairs are diffed again
//! at word or character level, so the original document ends up carrying
//! the revisions that turn it into the revised one.

use chrono::{DateTime, Utc};

use super::edit::trackable_subtree;
use super::{FormatChange, RevisionKind, RevisionTracker};
use crate::error::{Error, Result};
use crate::node::{NodeArena, NodeData, NodeId, NodeKind, Run, RunContent};

/// Token size of inline differences
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompareGranularity {
    Character,
    #[default]
    Word,
}

/// Options for [`compare`]
#[derive(Clone, Debug, Default)]
pub struct CompareOptions {
    pub granularity: CompareGranularity,
    /// Report text changes only
    pub ignore_formatting: bool,
}

impl CompareOptions {
    /// Set the token size
    pub fn with_granularity(mut self, granularity: CompareGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Skip format-change revisions
    pub fn with_ignore_formatting(mut self, ignore: bool) -> Self {
        self.ignore_formatting = ignore;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DiffOp {
    Equal(usize, usize),
    Delete(usize),
    Insert(usize),
}

/// Edit script from `a` to `b`.
///
/// The common prefix and suffix are matched directly; the middle is
/// aligned with Hirschberg's divide and conquer LCS, so memory stays
/// linear in the input. Within a changed stretch deletions come first.
pub(crate) fn diff<T: PartialEq>(a: &[T], b: &[T]) -> Vec<DiffOp> {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let a_mid = &a[prefix..a.len() - suffix];
    let b_mid = &b[prefix..b.len() - suffix];

    let mut ops: Vec<DiffOp> = (0..prefix).map(|i| DiffOp::Equal(i, i)).collect();
    let mut middle = Vec::with_capacity(a_mid.len() + b_mid.len());
    align(a_mid, b_mid, prefix, prefix, &mut middle);
    ops.extend(deletions_first(middle));
    ops.extend((0..suffix).map(|k| DiffOp::Equal(a.len() - suffix + k, b.len() - suffix + k)));
    ops
}

/// LCS lengths of `a` against every prefix of `b` (`rev` walks both
/// backwards, giving suffixes instead)
fn lcs_lengths<T: PartialEq>(a: &[T], b: &[T], rev: bool) -> Vec<u32> {
    let m = b.len();
    let at = |s: &[T], i: usize| if rev { s.len() - 1 - i } else { i };
    let mut prev = vec![0u32; m + 1];
    let mut cur = vec![0u32; m + 1];
    for i in 0..a.len() {
        let x = &a[at(a, i)];
        for j in 1..=m {
            cur[j] = if *x == b[at(b, j - 1)] {
                prev[j - 1] + 1
            } else {
                prev[j].max(cur[j - 1])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev
}

fn align<T: PartialEq>(a: &[T], b: &[T], a_off: usize, b_off: usize, ops: &mut Vec<DiffOp>) {
    if a.is_empty() {
        ops.extend((0..b.len()).map(|j| DiffOp::Insert(b_off + j)));
        return;
    }
    if b.is_empty() {
        ops.extend((0..a.len()).map(|i| DiffOp::Delete(a_off + i)));
        return;
    }
    if a.len() == 1 {
        match b.iter().position(|y| *y == a[0]) {
            Some(j) => {
                ops.extend((0..j).map(|k| DiffOp::Insert(b_off + k)));
                ops.push(DiffOp::Equal(a_off, b_off + j));
                ops.extend((j + 1..b.len()).map(|k| DiffOp::Insert(b_off + k)));
            }
            None => {
                ops.push(DiffOp::Delete(a_off));
                ops.extend((0..b.len()).map(|k| DiffOp::Insert(b_off + k)));
            }
        }
        return;
    }

    let mid = a.len() / 2;
    let head = lcs_lengths(&a[..mid], b, false);
    let tail = lcs_lengths(&a[mid..], b, true);
    let m = b.len();
    let split = (0..=m)
        .max_by_key(|&k| (head[k] + tail[m - k], std::cmp::Reverse(k)))
        .unwrap_or(0);
    align(&a[..mid], &b[..split], a_off, b_off, ops);
    align(&a[mid..], &b[split..], a_off + mid, b_off + split, ops);
}

/// Reorder each run of edits so its deletions precede its insertions
fn deletions_first(ops: Vec<DiffOp>) -> Vec<DiffOp> {
    let mut out = Vec::with_capacity(ops.len());
    let mut inserts = Vec::new();
    for op in ops {
        match op {
            DiffOp::Insert(_) => inserts.push(op),
            DiffOp::Delete(_) => out.push(op),
            DiffOp::Equal(..) => {
                out.append(&mut inserts);
                out.push(op);
            }
        }
    }
    out.append(&mut inserts);
    out
}

/// Body-level blocks of every section, in order
fn blocks(arena: &NodeArena) -> Vec<NodeId> {
    arena
        .child_nodes(arena.root(), NodeKind::Body, true)
        .iter()
        .flat_map(|body| arena.children(body).to_vec())
        .collect()
}

fn block_key(arena: &NodeArena, node: NodeId) -> String {
    let kind = arena.kind(node).map(|k| format!("{:?}", k)).unwrap_or_default();
    format!("{}\u{0}{}", kind, arena.range_text(node))
}

fn is_paragraph(arena: &NodeArena, node: NodeId) -> bool {
    arena.kind(node).ok() == Some(NodeKind::Paragraph)
}

/// Inline diff unit: a word, a separator character, or one non-text item
struct Atom {
    key: String,
    content: RunContent,
    run: usize,
}

fn tokenize(text: &str, granularity: CompareGranularity) -> Vec<String> {
    match granularity {
        CompareGranularity::Character => text.chars().map(String::from).collect(),
        CompareGranularity::Word => {
            let mut tokens = Vec::new();
            let mut word = String::new();
            for c in text.chars() {
                if c.is_alphanumeric() {
                    word.push(c);
                } else {
                    if !word.is_empty() {
                        tokens.push(std::mem::take(&mut word));
                    }
                    tokens.push(c.to_string());
                }
            }
            if !word.is_empty() {
                tokens.push(word);
            }
            tokens
        }
    }
}

fn atoms(runs: &[&Run], granularity: CompareGranularity) -> Vec<Atom> {
    let mut out = Vec::new();
    for (index, run) in runs.iter().enumerate() {
        for content in &run.content {
            match content {
                RunContent::Text(text) => {
                    for token in tokenize(text, granularity) {
                        out.push(Atom {
                            content: RunContent::Text(token.clone()),
                            key: token,
                            run: index,
                        });
                    }
                }
                other => out.push(Atom {
                    key: format!("{:?}", other),
                    content: other.clone(),
                    run: index,
                }),
            }
        }
    }
    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Segment {
    Equal { old: usize, new: usize },
    Deleted { old: usize },
    Inserted { new: usize },
}

fn push_content(contents: &mut Vec<RunContent>, content: RunContent) {
    if let (Some(RunContent::Text(last)), RunContent::Text(next)) = (contents.last_mut(), &content) {
        last.push_str(next);
        return;
    }
    contents.push(content);
}

/// Runs of a paragraph when every child is a plain run
fn plain_runs(arena: &NodeArena, paragraph: NodeId) -> Option<Vec<&Run>> {
    arena
        .children(paragraph)
        .iter()
        .map(|c| arena.run(*c).ok())
        .collect::<Option<Vec<_>>>()
        .filter(|runs| {
            runs.iter().all(|r| {
                r.content
                    .iter()
                    .all(|c| !matches!(c, RunContent::Unknown(_)))
            })
        })
}

struct Comparer<'a> {
    original: &'a mut NodeArena,
    tracker: &'a mut RevisionTracker,
    revised: &'a NodeArena,
    author: &'a str,
    date: Option<DateTime<Utc>>,
    options: &'a CompareOptions,
    /// Last original block placed, insertions go after it
    cursor: Option<NodeId>,
}

impl Comparer<'_> {
    fn mark(&mut self, node: NodeId, kind: RevisionKind) {
        self.tracker.add(node, kind, self.author, self.date);
    }

    fn mark_subtree(&mut self, node: NodeId, kind: &RevisionKind) {
        for n in trackable_subtree(self.original, node) {
            self.mark(n, kind.clone());
        }
    }

    fn delete_block(&mut self, node: NodeId) {
        self.mark_subtree(node, &RevisionKind::Deletion);
        self.cursor = Some(node);
    }

    fn insert_block(&mut self, revised_node: NodeId) -> Result<()> {
        let copy = self.original.import_node(self.revised, revised_node, true)?;
        match self.cursor.and_then(|c| self.original.parent(c).map(|p| (c, p))) {
            Some((cursor, parent)) => self.original.insert_after(parent, copy, cursor)?,
            None => {
                let root = self.original.root();
                let existing = self.original.child_nodes(root, NodeKind::Body, true).first();
                let body = match existing {
                    Some(body) => body,
                    None => {
                        self.original.ensure_minimum(root)?;
                        self.original
                            .child_nodes(root, NodeKind::Body, true)
                            .first()
                            .ok_or_else(|| Error::InvalidDocument("no body".into()))?
                    }
                };
                self.original.insert_at(body, 0, copy)?;
            }
        }
        self.mark_subtree(copy, &RevisionKind::Insertion);
        self.cursor = Some(copy);
        Ok(())
    }

    /// Diff two paragraphs in place; falls back to delete + insert when
    /// either holds more than plain runs
    fn paragraph_pair(&mut self, old_p: NodeId, new_p: NodeId) -> Result<()> {
        let Some(new_runs) = plain_runs(self.revised, new_p) else {
            self.delete_block(old_p);
            return self.insert_block(new_p);
        };
        let Some(old_runs) = plain_runs(self.original, old_p) else {
            self.delete_block(old_p);
            return self.insert_block(new_p);
        };
        let old_runs: Vec<Run> = old_runs.into_iter().cloned().collect();
        let new_runs: Vec<Run> = new_runs.into_iter().cloned().collect();
        self.cursor = Some(old_p);

        if !self.options.ignore_formatting {
            let old = self.original.paragraph(old_p)?;
            let new = self.revised.paragraph(new_p)?;
            if old.style != new.style || old.format != new.format {
                let previous = FormatChange::Paragraph {
                    style: old.style.clone(),
                    format: old.format.clone(),
                };
                let (style, format) = (new.style.clone(), new.format.clone());
                let p = self.original.paragraph_mut(old_p)?;
                p.style = style;
                p.format = format;
                self.mark(old_p, RevisionKind::FormatChange(previous));
            }
        }

        let old_refs: Vec<&Run> = old_runs.iter().collect();
        let new_refs: Vec<&Run> = new_runs.iter().collect();
        let old_atoms = atoms(&old_refs, self.options.granularity);
        let new_atoms = atoms(&new_refs, self.options.granularity);
        let old_keys: Vec<&str> = old_atoms.iter().map(|a| a.key.as_str()).collect();
        let new_keys: Vec<&str> = new_atoms.iter().map(|a| a.key.as_str()).collect();

        let mut segments: Vec<(Segment, Vec<RunContent>)> = Vec::new();
        for op in diff(&old_keys, &new_keys) {
            let (segment, content) = match op {
                DiffOp::Equal(i, j) => (
                    Segment::Equal {
                        old: old_atoms[i].run,
                        new: new_atoms[j].run,
                    },
                    old_atoms[i].content.clone(),
                ),
                DiffOp::Delete(i) => (
                    Segment::Deleted {
                        old: old_atoms[i].run,
                    },
                    old_atoms[i].content.clone(),
                ),
                DiffOp::Insert(j) => (
                    Segment::Inserted {
                        new: new_atoms[j].run,
                    },
                    new_atoms[j].content.clone(),
                ),
            };
            match segments.last_mut() {
                Some((last, contents)) if *last == segment => push_content(contents, content),
                _ => segments.push((segment, vec![content])),
            }
        }

        let format_differs = |old: usize, new: usize| {
            !self.options.ignore_formatting
                && (old_runs[old].style != new_runs[new].style
                    || old_runs[old].format != new_runs[new].format)
        };
        let unchanged = segments.iter().all(|(segment, _)| match *segment {
            Segment::Equal { old, new } => !format_differs(old, new),
            _ => false,
        });
        if unchanged {
            return Ok(());
        }

        let mut rebuilt: Vec<(Run, Option<RevisionKind>)> = Vec::new();
        for (segment, content) in segments {
            let (mut run, revision) = match segment {
                Segment::Equal { old, new } if format_differs(old, new) => {
                    let previous = FormatChange::Run {
                        style: old_runs[old].style.clone(),
                        format: old_runs[old].format.clone(),
                    };
                    let mut run = old_runs[old].clone();
                    run.style = new_runs[new].style.clone();
                    run.format = new_runs[new].format.clone();
                    (run, Some(RevisionKind::FormatChange(previous)))
                }
                Segment::Equal { old, .. } => (old_runs[old].clone(), None),
                Segment::Deleted { old } => {
                    (old_runs[old].clone(), Some(RevisionKind::Deletion))
                }
                Segment::Inserted { new } => {
                    (new_runs[new].clone(), Some(RevisionKind::Insertion))
                }
            };
            run.content = content;
            rebuilt.push((run, revision));
        }

        self.original.remove_all_children(old_p)?;
        for (run, revision) in rebuilt {
            let node = self.original.create_with(NodeData::Run(run), Some(old_p))?;
            if let Some(kind) = revision {
                self.mark(node, kind);
            }
        }
        Ok(())
    }
}

/// Record in `original` the revisions that turn it into `revised`.
///
/// After accepting them the original reads like `revised`; after rejecting
/// them it is unchanged. Documents with pending revisions cannot be
/// compared.
pub fn compare(
    original: &mut NodeArena,
    original_revisions: &mut RevisionTracker,
    revised: &NodeArena,
    revised_revisions: &RevisionTracker,
    author: &str,
    date: Option<DateTime<Utc>>,
    options: &CompareOptions,
) -> Result<()> {
    if !original_revisions.is_empty() || !revised_revisions.is_empty() {
        return Err(Error::IncomparableState(
            "both documents must have no pending revisions".into(),
        ));
    }

    let old_blocks = blocks(original);
    let new_blocks = blocks(revised);
    let old_keys: Vec<String> = old_blocks.iter().map(|b| block_key(original, *b)).collect();
    let new_keys: Vec<String> = new_blocks.iter().map(|b| block_key(revised, *b)).collect();
    let ops = diff(&old_keys, &new_keys);
    log::debug!(
        "comparing {} blocks against {} blocks",
        old_blocks.len(),
        new_blocks.len()
    );

    let mut comparer = Comparer {
        original,
        tracker: original_revisions,
        revised,
        author,
        date,
        options,
        cursor: None,
    };

    let mut deleted: Vec<NodeId> = Vec::new();
    let mut inserted: Vec<NodeId> = Vec::new();
    for op in ops {
        match op {
            DiffOp::Delete(i) => deleted.push(old_blocks[i]),
            DiffOp::Insert(j) => inserted.push(new_blocks[j]),
            DiffOp::Equal(i, j) => {
                flush_gap(&mut comparer, &mut deleted, &mut inserted)?;
                let (old, new) = (old_blocks[i], new_blocks[j]);
                if !comparer.options.ignore_formatting
                    && is_paragraph(comparer.original, old)
                    && is_paragraph(revised, new)
                {
                    comparer.paragraph_pair(old, new)?;
                }
                comparer.cursor = Some(old);
            }
        }
    }
    flush_gap(&mut comparer, &mut deleted, &mut inserted)?;
    Ok(())
}

/// Pair deleted and inserted paragraphs in order; everything else is a
/// whole-block deletion or insertion
fn flush_gap(
    comparer: &mut Comparer<'_>,
    deleted: &mut Vec<NodeId>,
    inserted: &mut Vec<NodeId>,
) -> Result<()> {
    let (mut di, mut ii) = (0, 0);
    while di < deleted.len() || ii < inserted.len() {
        match (deleted.get(di).copied(), inserted.get(ii).copied()) {
            (Some(old), Some(new))
                if is_paragraph(comparer.original, old) && is_paragraph(comparer.revised, new) =>
            {
                comparer.paragraph_pair(old, new)?;
                di += 1;
                ii += 1;
            }
            (Some(old), _) => {
                comparer.delete_block(old);
                di += 1;
            }
            (None, Some(new)) => {
                comparer.insert_block(new)?;
                ii += 1;
            }
            (None, None) => break,
        }
    }
    deleted.clear();
    inserted.clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::RunFormat;
    use crate::revision::{RevisionType, RevisionView};
    use pretty_assertions::assert_eq;

    fn document(paragraphs: &[&[&str]]) -> NodeArena {
        let mut arena = NodeArena::new();
        let root = arena.root();
        let section = arena.create(NodeKind::Section, Some(root)).unwrap();
        let body = arena.create(NodeKind::Body, Some(section)).unwrap();
        for runs in paragraphs {
            let p = arena.create(NodeKind::Paragraph, Some(body)).unwrap();
            for text in *runs {
                arena
                    .create_with(NodeData::Run(Run::new(*text)), Some(p))
                    .unwrap();
            }
        }
        arena
    }

    fn compare_texts(original: &[&[&str]], revised: &[&[&str]], options: &CompareOptions) {
        let mut a = document(original);
        let b = document(revised);
        let before = a.text(a.root());
        let expected = b.text(b.root());
        let mut tracker = RevisionTracker::new();

        compare(&mut a, &mut tracker, &b, &RevisionTracker::new(), "Cmp", None, options)
            .unwrap();
        assert!(!tracker.is_empty());
        assert_eq!(tracker.text_in_view(&a, RevisionView::Original).unwrap(), before);
        assert_eq!(tracker.text_in_view(&a, RevisionView::Final).unwrap(), expected);
    }

    #[test]
    fn test_diff_script() {
        let ops = diff(&["a", "b", "c"], &["a", "x", "c"]);
        assert_eq!(
            ops,
            vec![
                DiffOp::Equal(0, 0),
                DiffOp::Delete(1),
                DiffOp::Insert(1),
                DiffOp::Equal(2, 2)
            ]
        );
        assert_eq!(diff::<&str>(&[], &["a"]), vec![DiffOp::Insert(0)]);
    }

    #[test]
    fn test_diff_finds_longest_alignment() {
        let a: Vec<char> = "ABCBDAB".chars().collect();
        let b: Vec<char> = "BDCABA".chars().collect();
        let ops = diff(&a, &b);

        let count = |f: fn(&DiffOp) -> bool| ops.iter().filter(|op| f(op)).count();
        assert_eq!(count(|op| matches!(op, DiffOp::Equal(..))), 4);
        assert_eq!(count(|op| matches!(op, DiffOp::Delete(_))), 3);

        let mut rebuilt = Vec::new();
        for op in &ops {
            match *op {
                DiffOp::Equal(i, j) => {
                    assert_eq!(a[i], b[j]);
                    rebuilt.push(a[i]);
                }
                DiffOp::Insert(j) => rebuilt.push(b[j]),
                DiffOp::Delete(_) => {}
            }
        }
        assert_eq!(rebuilt, b);
    }

    #[test]
    fn test_tokenize_words() {
        assert_eq!(
            tokenize("The quick, fox", CompareGranularity::Word),
            vec!["The", " ", "quick", ",", " ", "fox"]
        );
        assert_eq!(tokenize("ab", CompareGranularity::Character), vec!["a", "b"]);
    }

    #[test]
    fn test_word_level_changes() {
        compare_texts(
            &[&["The quick brown fox"], &["unchanged"]],
            &[&["The slow brown fox jumps"], &["unchanged"]],
            &CompareOptions::default(),
        );
    }

    #[test]
    fn test_block_insertions_and_deletions() {
        compare_texts(
            &[&["one"], &["two"], &["three"]],
            &[&["zero"], &["one"], &["three"], &["four"]],
            &CompareOptions::default(),
        );
    }

    #[test]
    fn test_character_granularity() {
        compare_texts(
            &[&["colour"]],
            &[&["color"]],
            &CompareOptions::default().with_granularity(CompareGranularity::Character),
        );
    }

    #[test]
    fn test_format_only_change() {
        let mut a = document(&[&["same"]]);
        let mut b = document(&[&["same"]]);
        let run = b.child_nodes(b.root(), NodeKind::Run, true).first().unwrap();
        b.run_mut(run).unwrap().format = RunFormat::default().with_bold(true);

        let mut tracker = RevisionTracker::new();
        let options = CompareOptions::default();
        compare(&mut a, &mut tracker, &b, &RevisionTracker::new(), "Cmp", None, &options)
            .unwrap();
        assert_eq!(tracker.len(), 1);
        assert_eq!(
            tracker.revisions()[0].kind.revision_type(),
            RevisionType::FormatChange
        );

        tracker.reject_all(&mut a).unwrap();
        let run = a.child_nodes(a.root(), NodeKind::Run, true).first().unwrap();
        assert_eq!(a.run(run).unwrap().format, RunFormat::default());

        let mut ignoring = RevisionTracker::new();
        let options = CompareOptions::default().with_ignore_formatting(true);
        compare(&mut a, &mut ignoring, &b, &RevisionTracker::new(), "Cmp", None, &options)
            .unwrap();
        assert!(ignoring.is_empty());
    }

    #[test]
    fn test_pending_revisions_block_comparison() {
        let mut a = document(&[&["x"]]);
        let b = document(&[&["y"]]);
        let mut tracker = RevisionTracker::new();
        let p = a.child_nodes(a.root(), NodeKind::Paragraph, true).first().unwrap();
        tracker.add(p, RevisionKind::Insertion, "Ann", None);

        let result = compare(
            &mut a,
            &mut tracker,
            &b,
            &RevisionTracker::new(),
            "Cmp",
            None,
            &CompareOptions::default(),
        );
        assert!(matches!(result, Err(Error::IncomparableState(_))));
    }
}
