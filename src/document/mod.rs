//! Document facade - the public surface over the node tree

mod fields;
mod import;
mod sdt;

pub use fields::{merge_field_name, Field, MergeRegion, RegionScope};
pub use import::{ImportFormatMode, ImportOptions};

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::codec::{
    self, Compliance, CustomXmlPart, DocumentXml, LoadOptions, SaveOptions,
};
use crate::error::{Error, Result};
use crate::format::{ParagraphFormat, RunFormat};
use crate::node::{
    Comment, KindFilter, NodeArena, NodeCollection, NodeData, NodeId, NodeKind, Paragraph, Run,
    Section,
};
use crate::numbering::{update_list_labels, ListLabelOptions, Numbering};
use crate::opc::Package;
use crate::revision::{
    compare, CompareOptions, RevisionGroup, RevisionTracker, RevisionView,
};
use crate::style::{
    expand_table_styles_to_direct_formatting, global_defaults, FormatDefaults, ResolvedStyle,
    StyleResolver, StyleSheet,
};
use crate::table;
use crate::warning::WarningSink;
use crate::xml::RawXmlElement;

/// A word-processing document
#[derive(Clone, Debug)]
pub struct Document {
    pub(crate) arena: NodeArena,
    pub(crate) revisions: RevisionTracker,
    pub(crate) styles: StyleSheet,
    pub(crate) numbering: Numbering,
    pub(crate) custom_xml: Vec<CustomXmlPart>,
    /// Loaded package; parts the model does not own are written back as is
    pub(crate) package: Package,
    pub(crate) compliance: Compliance,
    pub(crate) document_xml: DocumentXml,
    pub(crate) comments_declarations: Vec<(String, String)>,
    /// Snapshot of the process-wide defaults
    pub(crate) defaults: Arc<FormatDefaults>,
    pub(crate) list_options: ListLabelOptions,
}

/// US Letter, one inch margins
fn default_section_properties() -> RawXmlElement {
    RawXmlElement::new("w:sectPr")
        .with_child(
            RawXmlElement::new("w:pgSz")
                .with_attr("w:w", "12240")
                .with_attr("w:h", "15840"),
        )
        .with_child(
            RawXmlElement::new("w:pgMar")
                .with_attr("w:top", "1440")
                .with_attr("w:right", "1440")
                .with_attr("w:bottom", "1440")
                .with_attr("w:left", "1440")
                .with_attr("w:header", "720")
                .with_attr("w:footer", "720")
                .with_attr("w:gutter", "0"),
        )
        .with_child(RawXmlElement::new("w:cols").with_attr("w:space", "720"))
        .with_child(RawXmlElement::new("w:docGrid").with_attr("w:linePitch", "360"))
}

impl Document {
    /// Create a new empty document: one section holding one empty paragraph
    pub fn new() -> Self {
        let mut document = Document::from_parts(
            NodeArena::new(),
            RevisionTracker::new(),
            StyleSheet::with_builtin_styles(),
            Numbering::new(),
            Package::new(),
        );
        if let Err(e) = document.init_blank() {
            log::warn!("could not build the blank document: {}", e);
        }
        document
    }

    fn init_blank(&mut self) -> Result<()> {
        let root = self.arena.root();
        self.arena.ensure_minimum(root)?;
        if let Some(section) = self.arena.first_child(root) {
            *self.arena.section_mut(section)? = Section {
                properties: Some(default_section_properties()),
            };
        }
        Ok(())
    }

    pub(crate) fn from_parts(
        arena: NodeArena,
        revisions: RevisionTracker,
        styles: StyleSheet,
        numbering: Numbering,
        package: Package,
    ) -> Self {
        Document {
            arena,
            revisions,
            styles,
            numbering,
            custom_xml: Vec::new(),
            package,
            compliance: Compliance::default(),
            document_xml: DocumentXml::default(),
            comments_declarations: Vec::new(),
            defaults: global_defaults(),
            list_options: ListLabelOptions::default(),
        }
    }

    // === Loading and saving ===

    /// Open a document from a file path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Open a document from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        codec::decode(bytes, &LoadOptions::default())
    }

    /// Open a document from bytes with options (passwords)
    pub fn load(bytes: &[u8], options: &LoadOptions) -> Result<Self> {
        codec::decode(bytes, options)
    }

    /// Like [`Document::load`], reporting problems to `warnings`
    pub fn load_with_warnings(
        bytes: &[u8],
        options: &LoadOptions,
        warnings: &mut dyn WarningSink,
    ) -> Result<Self> {
        codec::decode_with_warnings(bytes, options, warnings)
    }

    /// Save the document to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Save the document to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        codec::encode(self, &SaveOptions::default())
    }

    /// Save the document to bytes with options (compliance)
    pub fn to_bytes_with(&self, options: &SaveOptions) -> Result<Vec<u8>> {
        codec::encode(self, options)
    }

    /// Like [`Document::to_bytes_with`], reporting changed content to `warnings`
    pub fn to_bytes_with_warnings(
        &self,
        options: &SaveOptions,
        warnings: &mut dyn WarningSink,
    ) -> Result<Vec<u8>> {
        codec::encode_with_warnings(self, options, warnings)
    }

    // === Parts ===

    /// The node tree
    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    /// The node tree for direct editing.
    ///
    /// Edits made here bypass revision tracking and cache refresh; call
    /// [`Document::update_list_labels`] afterwards.
    pub fn arena_mut(&mut self) -> &mut NodeArena {
        &mut self.arena
    }

    /// The document root
    pub fn root(&self) -> NodeId {
        self.arena.root()
    }

    pub fn styles(&self) -> &StyleSheet {
        &self.styles
    }

    pub fn styles_mut(&mut self) -> &mut StyleSheet {
        &mut self.styles
    }

    pub fn numbering(&self) -> &Numbering {
        &self.numbering
    }

    pub fn numbering_mut(&mut self) -> &mut Numbering {
        &mut self.numbering
    }

    /// Pending revisions
    pub fn revisions(&self) -> &RevisionTracker {
        &self.revisions
    }

    /// Compliance detected on load
    pub fn compliance(&self) -> Compliance {
        self.compliance
    }

    /// The underlying package as last loaded
    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Formatting defaults this document resolves against
    pub fn defaults(&self) -> &FormatDefaults {
        &self.defaults
    }

    /// Use an isolated defaults registry instead of the process-wide one
    pub fn set_defaults(&mut self, defaults: Arc<FormatDefaults>) {
        self.defaults = defaults;
    }

    pub fn list_options(&self) -> &ListLabelOptions {
        &self.list_options
    }

    /// Change list label options and recompute labels
    pub fn set_list_options(&mut self, options: ListLabelOptions) -> Result<()> {
        self.list_options = options;
        self.update_list_labels()
    }

    // === Navigation ===

    /// Matching descendants of the root in document order
    pub fn child_nodes(&self, filter: impl Into<KindFilter>, recursive: bool) -> NodeCollection<'_> {
        self.arena.child_nodes(self.arena.root(), filter, recursive)
    }

    /// Sections in order
    pub fn sections(&self) -> Vec<NodeId> {
        self.arena.children_of_kind(self.arena.root(), NodeKind::Section)
    }

    /// Body of the last section, where new content goes
    pub fn last_body(&self) -> Option<NodeId> {
        let section = self.sections().pop()?;
        self.arena.children_of_kind(section, NodeKind::Body).pop()
    }

    /// Body paragraphs in document order, comment content excluded
    pub fn paragraphs(&self) -> Vec<NodeId> {
        self.child_nodes(NodeKind::Paragraph, true)
            .iter()
            .filter(|p| self.arena.ancestor(*p, NodeKind::Comment).is_none())
            .collect()
    }

    /// Tables in document order, nested tables included
    pub fn tables(&self) -> Vec<NodeId> {
        self.child_nodes(NodeKind::Table, true).to_vec()
    }

    /// Comments in document order
    pub fn comments(&self) -> Vec<NodeId> {
        self.child_nodes(NodeKind::Comment, true).to_vec()
    }

    /// Visible text, paragraphs separated by newlines
    pub fn text(&self) -> String {
        self.arena.text(self.arena.root())
    }

    /// Text with control characters for fields, paragraph and cell ends
    pub fn range_text(&self, node: NodeId) -> String {
        self.arena.range_text(node)
    }

    /// Cached list label of a paragraph
    pub fn list_label(&self, paragraph: NodeId) -> Result<Option<&str>> {
        Ok(self.arena.paragraph(paragraph)?.list_label.as_deref())
    }

    // === Editing ===

    /// Give a container its minimal valid children
    pub fn ensure_minimum(&mut self) -> Result<()> {
        let root = self.arena.root();
        self.arena.ensure_minimum(root)
    }

    /// Append a paragraph holding `text` to the last body
    pub fn add_paragraph(&mut self, text: &str) -> Result<NodeId> {
        if self.last_body().is_none() {
            self.ensure_minimum()?;
        }
        let body = self
            .last_body()
            .ok_or_else(|| Error::InvalidDocument("document has no body".into()))?;
        let paragraph = self.arena.create_with(NodeData::Paragraph(Paragraph::default()), None)?;
        if !text.is_empty() {
            self.arena
                .create_with(NodeData::Run(Run::new(text)), Some(paragraph))?;
        }
        let index = self.arena.children(body).len();
        self.insert_node(body, index, paragraph)?;
        Ok(paragraph)
    }

    /// Append a run holding `text` to a paragraph
    pub fn add_run(&mut self, paragraph: NodeId, text: &str) -> Result<NodeId> {
        let run = self.arena.create_with(NodeData::Run(Run::new(text)), None)?;
        let index = self.arena.children(paragraph).len();
        self.insert_node(paragraph, index, run)?;
        Ok(run)
    }

    /// Append a `rows` x `cols` table to the last body
    pub fn add_table(&mut self, rows: usize, cols: usize) -> Result<NodeId> {
        if self.last_body().is_none() {
            self.ensure_minimum()?;
        }
        let body = self
            .last_body()
            .ok_or_else(|| Error::InvalidDocument("document has no body".into()))?;
        let table = self.arena.create(NodeKind::Table, None)?;
        for _ in 0..rows.max(1) {
            let row = self.arena.create(NodeKind::Row, Some(table))?;
            for _ in 0..cols.max(1) {
                let cell = self.arena.create(NodeKind::Cell, Some(row))?;
                self.arena.create(NodeKind::Paragraph, Some(cell))?;
            }
        }
        self.arena.table_mut(table)?.grid = vec![9360 / cols.max(1) as i32; cols.max(1)];
        let index = self.arena.children(body).len();
        self.insert_node(body, index, table)?;
        Ok(table)
    }

    /// Anchor a new comment at the end of a paragraph
    pub fn add_comment(
        &mut self,
        paragraph: NodeId,
        author: &str,
        date: Option<DateTime<Utc>>,
        text: &str,
    ) -> Result<NodeId> {
        self.arena.paragraph(paragraph)?;
        let next_id = self
            .comments()
            .iter()
            .filter_map(|c| self.arena.comment(*c).ok())
            .filter_map(|c| c.id.parse::<u32>().ok())
            .max()
            .map(|id| id + 1)
            .unwrap_or(0);
        let comment = self.arena.create_with(
            NodeData::Comment(Comment {
                id: next_id.to_string(),
                author: author.to_string(),
                date,
                ..Default::default()
            }),
            None,
        )?;
        let content = self.arena.create(NodeKind::Paragraph, Some(comment))?;
        self.arena
            .create_with(NodeData::Run(Run::new(text)), Some(content))?;
        self.arena.append_child(paragraph, comment)?;
        Ok(comment)
    }

    /// Attach `node` under `parent` at `index`; records insertions while
    /// tracking
    pub fn insert_node(&mut self, parent: NodeId, index: usize, node: NodeId) -> Result<()> {
        self.arena.insert_at(parent, index, node)?;
        self.revisions.track_insertion(&self.arena, node);
        self.after_edit(Some(node))
    }

    /// Remove `node`; while tracking it is marked deleted instead
    pub fn remove_node(&mut self, node: NodeId) -> Result<()> {
        let table = self.enclosing_table(node);
        self.revisions.remove_node(&mut self.arena, node)?;
        if let Some(table) = table {
            table::normalize_merges(&mut self.arena, table)?;
        }
        self.after_edit(None)
    }

    /// Replace a run's text; returns the run now holding it
    pub fn set_run_text(&mut self, run: NodeId, text: &str) -> Result<NodeId> {
        let run = self.revisions.replace_run_text(&mut self.arena, run, text)?;
        self.after_edit(None)?;
        Ok(run)
    }

    /// Set a run's character style and direct formatting
    pub fn set_run_format(
        &mut self,
        run: NodeId,
        style: Option<String>,
        format: RunFormat,
    ) -> Result<()> {
        self.revisions
            .set_run_format(&mut self.arena, run, style, format)
    }

    /// Set a paragraph's style and direct formatting
    pub fn set_paragraph_format(
        &mut self,
        paragraph: NodeId,
        style: Option<String>,
        format: ParagraphFormat,
    ) -> Result<()> {
        self.revisions
            .set_paragraph_format(&mut self.arena, paragraph, style, format)?;
        self.after_edit(None)
    }

    /// Move `node` under `parent` at `index`; returns the node at the
    /// destination (a marked copy while tracking)
    pub fn move_node(&mut self, node: NodeId, parent: NodeId, index: usize) -> Result<NodeId> {
        let source_table = self.enclosing_table(node);
        let moved = self
            .revisions
            .move_node(&mut self.arena, node, parent, index)?;
        if let Some(table) = source_table {
            table::normalize_merges(&mut self.arena, table)?;
        }
        self.after_edit(Some(moved))?;
        Ok(moved)
    }

    /// Change a cell's preferred width and repair merges
    pub fn set_cell_width(&mut self, cell: NodeId, width: Option<i32>) -> Result<()> {
        self.arena.cell_mut(cell)?.format.width = width;
        self.after_edit(Some(cell))
    }

    fn enclosing_table(&self, node: NodeId) -> Option<NodeId> {
        match self.arena.kind(node).ok()? {
            NodeKind::Table => Some(node),
            NodeKind::Row | NodeKind::Cell => self.arena.ancestor(node, NodeKind::Table),
            _ => None,
        }
    }

    /// Refresh what an edit may have invalidated
    fn after_edit(&mut self, touched: Option<NodeId>) -> Result<()> {
        if let Some(table) = touched.and_then(|n| self.enclosing_table(n)) {
            table::normalize_merges(&mut self.arena, table)?;
        }
        self.update_list_labels()
    }

    // === Styles, tables and lists ===

    /// Effective formatting of a node
    pub fn resolved_style(&self, node: NodeId) -> ResolvedStyle {
        StyleResolver::new(&self.arena, &self.styles, &self.defaults).resolve(node)
    }

    /// Bake a table's style into direct formatting
    pub fn expand_table_styles_to_direct_formatting(&mut self, table: NodeId) -> Result<()> {
        expand_table_styles_to_direct_formatting(&mut self.arena, &self.styles, &self.defaults, table)
    }

    pub fn convert_to_horizontally_merged_cells(&mut self, table: NodeId) -> Result<()> {
        table::convert_to_horizontally_merged_cells(&mut self.arena, table)
    }

    pub fn convert_to_merged_cells_by_width(&mut self, table: NodeId) -> Result<()> {
        table::convert_to_merged_cells_by_width(&mut self.arena, table)
    }

    /// Recompute the cached label of every list paragraph
    pub fn update_list_labels(&mut self) -> Result<()> {
        update_list_labels(&mut self.arena, &self.numbering, &self.styles, &self.list_options)
    }

    // === Revisions ===

    /// Record edits as revisions. `date = None` suppresses timestamps.
    pub fn start_tracking(&mut self, author: &str, date: Option<DateTime<Utc>>) {
        self.revisions.start_tracking(author, date);
    }

    pub fn stop_tracking(&mut self) {
        self.revisions.stop_tracking();
    }

    pub fn accept_all_revisions(&mut self) -> Result<()> {
        self.revisions.accept_all(&mut self.arena)?;
        self.update_list_labels()
    }

    pub fn reject_all_revisions(&mut self) -> Result<()> {
        self.revisions.reject_all(&mut self.arena)?;
        self.update_list_labels()
    }

    pub fn accept_revision(&mut self, id: u32) -> Result<()> {
        self.revisions.accept(&mut self.arena, id)?;
        self.update_list_labels()
    }

    pub fn reject_revision(&mut self, id: u32) -> Result<()> {
        self.revisions.reject(&mut self.arena, id)?;
        self.update_list_labels()
    }

    /// Text as if every revision were accepted or rejected
    pub fn text_in_view(&self, view: RevisionView) -> Result<String> {
        self.revisions.text_in_view(&self.arena, view)
    }

    pub fn revision_groups(&self) -> Vec<RevisionGroup> {
        self.revisions.revision_groups(&self.arena)
    }

    /// Record in this document the revisions that turn it into `revised`
    pub fn compare(
        &mut self,
        revised: &Document,
        author: &str,
        date: Option<DateTime<Utc>>,
        options: &CompareOptions,
    ) -> Result<()> {
        compare(
            &mut self.arena,
            &mut self.revisions,
            &revised.arena,
            &revised.revisions,
            author,
            date,
            options,
        )?;
        self.update_list_labels()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_document_structure() {
        let doc = Document::new();
        let kinds: Vec<NodeKind> = doc
            .child_nodes(KindFilter::Any, true)
            .iter()
            .map(|n| doc.arena().kind(n).unwrap())
            .collect();
        assert_eq!(
            kinds,
            vec![NodeKind::Section, NodeKind::Body, NodeKind::Paragraph]
        );
        let section = doc.sections()[0];
        assert!(doc.arena().section(section).unwrap().properties.is_some());
    }

    #[test]
    fn test_add_content_and_text() {
        let mut doc = Document::new();
        let p = doc.add_paragraph("Hello").unwrap();
        doc.add_run(p, ", World").unwrap();
        let table = doc.add_table(2, 3).unwrap();
        assert_eq!(doc.text(), "\nHello, World\n\n\n\n\n\n");
        assert_eq!(doc.arena().children(table).len(), 2);
        assert_eq!(doc.tables(), vec![table]);
    }

    #[test]
    fn test_tracked_insert_then_reject() {
        let mut doc = Document::new();
        doc.add_paragraph("Keep").unwrap();
        doc.start_tracking("Ann", None);
        let p = doc.add_paragraph("Added").unwrap();
        assert!(doc.revisions().len() >= 2);
        assert_eq!(doc.text_in_view(RevisionView::Original).unwrap(), "\nKeep");

        doc.reject_all_revisions().unwrap();
        assert!(doc.revisions().is_empty());
        assert_eq!(doc.text(), "\nKeep");
        assert!(doc.arena().parent(p).is_none());
    }

    #[test]
    fn test_tracked_text_replacement_accept() {
        let mut doc = Document::new();
        let p = doc.add_paragraph("").unwrap();
        let run = doc.add_run(p, "old").unwrap();
        doc.start_tracking("Ann", None);
        let new_run = doc.set_run_text(run, "new").unwrap();
        assert_ne!(run, new_run);
        assert_eq!(doc.text_in_view(RevisionView::Original).unwrap(), "\nold");
        assert_eq!(doc.text_in_view(RevisionView::Final).unwrap(), "\nnew");

        doc.accept_all_revisions().unwrap();
        assert_eq!(doc.text(), "\nnew");
        assert_eq!(doc.revisions().len(), 0);
    }

    #[test]
    fn test_comment_round_trip() {
        let mut doc = Document::new();
        let p = doc.add_paragraph("Commented").unwrap();
        doc.add_comment(p, "Bob", None, "Look here").unwrap();

        let reread = Document::from_bytes(&doc.to_bytes().unwrap()).unwrap();
        let comments = reread.comments();
        assert_eq!(comments.len(), 1);
        let comment = reread.arena().comment(comments[0]).unwrap();
        assert_eq!(comment.author, "Bob");
        assert_eq!(reread.arena().text(comments[0]), "Look here");
        assert_eq!(reread.paragraphs().len(), 2);
    }
}
