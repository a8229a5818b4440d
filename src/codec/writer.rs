//! Node arena into document.xml and comments.xml

use std::collections::HashMap;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::props::{
    cell_props_element, empty, paragraph_change_element, paragraph_props_element,
    revision_element_name, row_props_element, run_change_element, run_props_element,
    sdt_props_element, table_props_element, Attribution,
};
use crate::error::Result;
use crate::node::{BreakType, NodeArena, NodeData, NodeId, NodeKind, RunContent, SdtType};
use crate::revision::{FormatChange, Revision, RevisionKind, RevisionTracker};
use crate::warning::{WarningInfo, WarningKind, WarningSink};
use crate::xml::{
    document_namespaces, is_extension_attr, root_start, strip_extension_attrs, RawXmlElement,
    RawXmlNode,
};

type XmlWriter = Writer<Vec<u8>>;

/// Serializes one document tree
pub(crate) struct BodyWriter<'a> {
    arena: &'a NodeArena,
    revisions: HashMap<NodeId, Vec<&'a Revision>>,
    /// Write Word 2010+ markup
    extensions: bool,
    next_id: u32,
    /// Comments in reference order, written to comments.xml
    comments: Vec<NodeId>,
    warnings: &'a mut dyn WarningSink,
    /// One entry per open field: `true` while inside its code
    fields: Vec<bool>,
}

fn needs_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace)
        || text.ends_with(char::is_whitespace)
        || text.contains("  ")
}

impl<'a> BodyWriter<'a> {
    pub fn new(
        arena: &'a NodeArena,
        tracker: &'a RevisionTracker,
        extensions: bool,
        warnings: &'a mut dyn WarningSink,
    ) -> Self {
        let mut revisions: HashMap<NodeId, Vec<&Revision>> = HashMap::new();
        for revision in tracker.revisions() {
            revisions.entry(revision.node).or_default().push(revision);
        }
        BodyWriter {
            arena,
            revisions,
            extensions,
            next_id: 1,
            comments: Vec::new(),
            warnings,
            fields: Vec::new(),
        }
    }

    fn warn(&mut self, kind: WarningKind, description: impl Into<String>) {
        let info = WarningInfo::new(kind, description);
        log::debug!("{}", info);
        self.warnings.warning(info);
    }

    fn next_revision_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn revisions_of(&self, node: NodeId) -> Vec<&'a Revision> {
        self.revisions.get(&node).cloned().unwrap_or_default()
    }

    fn attrs(&self, attrs: &[(String, String)]) -> Vec<(String, String)> {
        attrs
            .iter()
            .filter(|(k, _)| self.extensions || !is_extension_attr(k))
            .cloned()
            .collect()
    }

    fn start<'n>(&self, name: &'n str, attrs: &[(String, String)]) -> BytesStart<'n> {
        let mut start = BytesStart::new(name);
        for (k, v) in self.attrs(attrs) {
            start.push_attribute((k.as_str(), v.as_str()));
        }
        start
    }

    /// Write preserved or generated markup, dropping extensions when needed
    fn raw(&self, w: &mut XmlWriter, node: &RawXmlNode) -> Result<()> {
        if self.extensions {
            node.write_to(w)
        } else {
            strip_extension_attrs(node).write_to(w)
        }
    }

    fn element(&self, w: &mut XmlWriter, element: RawXmlElement) -> Result<()> {
        self.raw(w, &RawXmlNode::Element(element))
    }

    // === document.xml ===

    /// Whole document.xml
    pub fn write_document(
        &mut self,
        declarations: &[(String, String)],
        extra: &[RawXmlNode],
    ) -> Result<Vec<u8>> {
        let mut w = Writer::new(Vec::new());
        w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        let ours = document_namespaces(self.extensions);
        w.write_event(Event::Start(root_start("w:document", &ours, declarations)))?;
        for node in extra {
            self.raw(&mut w, node)?;
        }
        w.write_event(Event::Start(BytesStart::new("w:body")))?;
        self.write_body(&mut w)?;
        w.write_event(Event::End(BytesEnd::new("w:body")))?;
        w.write_event(Event::End(BytesEnd::new("w:document")))?;
        Ok(w.into_inner())
    }

    fn write_body(&mut self, w: &mut XmlWriter) -> Result<()> {
        let arena = self.arena;
        let sections = arena.children_of_kind(arena.root(), NodeKind::Section);
        for (index, &section) in sections.iter().enumerate() {
            let properties = arena.section(section)?.properties.as_ref();
            let blocks: Vec<NodeId> = arena
                .children_of_kind(section, NodeKind::Body)
                .into_iter()
                .flat_map(|body| arena.children(body).iter().copied())
                .collect();

            if index + 1 == sections.len() {
                for &block in &blocks {
                    self.write_block(w, block, None)?;
                }
                if let Some(properties) = properties {
                    self.element(w, properties.clone())?;
                }
                continue;
            }

            // every section but the last ends in a paragraph holding its sectPr
            let properties = properties.cloned().unwrap_or_else(|| empty("w:sectPr"));
            let carrier = blocks
                .last()
                .copied()
                .filter(|&b| arena.kind(b).ok() == Some(NodeKind::Paragraph));
            for &block in &blocks {
                if Some(block) != carrier {
                    self.write_block(w, block, None)?;
                }
            }
            match carrier {
                Some(paragraph) => self.write_paragraph(w, paragraph, Some(&properties))?,
                None => {
                    let ppr = RawXmlElement::new("w:pPr").with_child(properties);
                    self.element(w, RawXmlElement::new("w:p").with_child(ppr))?;
                }
            }
        }
        Ok(())
    }

    fn write_block(
        &mut self,
        w: &mut XmlWriter,
        node: NodeId,
        section: Option<&RawXmlElement>,
    ) -> Result<()> {
        let arena = self.arena;
        match arena.data(node)? {
            NodeData::Paragraph(_) => self.write_paragraph(w, node, section),
            NodeData::Table(_) => self.write_table(w, node),
            NodeData::StructuredDocumentTag(_) => self.write_sdt(w, node, false),
            NodeData::Foreign(raw) => self.raw(w, raw),
            other => {
                let kind = other.kind();
                self.warn(
                    WarningKind::DataLoss,
                    format!("{:?} node at block level not written", kind),
                );
                Ok(())
            }
        }
    }

    // === Paragraphs ===

    fn write_paragraph(
        &mut self,
        w: &mut XmlWriter,
        node: NodeId,
        section: Option<&RawXmlElement>,
    ) -> Result<()> {
        let arena = self.arena;
        let paragraph = arena.paragraph(node)?;

        let mut marks = Vec::new();
        let mut change = None;
        for revision in self.revisions_of(node) {
            let who = Attribution::new(revision.author.clone(), revision.date);
            match &revision.kind {
                RevisionKind::FormatChange(FormatChange::Paragraph { style, format }) => {
                    let id = self.next_revision_id();
                    change = Some(paragraph_change_element(&who, id, style.as_deref(), format));
                }
                RevisionKind::FormatChange(FormatChange::Run { .. }) => {}
                kind => {
                    if let Some(name) = revision_element_name(kind) {
                        let id = self.next_revision_id();
                        marks.push(who.element(name, id));
                    }
                }
            }
        }

        let mut extra: Vec<RawXmlElement> = Vec::new();
        extra.extend(run_props_element(None, &paragraph.mark_format, marks));
        extra.extend(section.cloned());
        extra.extend(change);
        let ppr = paragraph_props_element(paragraph.style.as_deref(), &paragraph.format, extra);

        let children = arena.children(node);
        let start = self.start("w:p", &paragraph.attrs);
        if ppr.is_none() && children.is_empty() {
            w.write_event(Event::Empty(start))?;
            return Ok(());
        }
        w.write_event(Event::Start(start))?;
        if let Some(ppr) = ppr {
            self.element(w, ppr)?;
        }
        for &child in children {
            self.write_inline(w, child)?;
        }
        w.write_event(Event::End(BytesEnd::new("w:p")))?;
        Ok(())
    }

    /// Wrapper element of a content revision on an inline node
    fn content_wrapper(&mut self, node: NodeId) -> Option<(RawXmlElement, bool)> {
        let revision = self
            .revisions_of(node)
            .into_iter()
            .find(|r| revision_element_name(&r.kind).is_some())?;
        let name = revision_element_name(&revision.kind)?;
        let id = self.next_revision_id();
        let who = Attribution::new(revision.author.clone(), revision.date);
        let deleted = matches!(revision.kind, RevisionKind::Deletion | RevisionKind::MoveFrom);
        Some((who.element(name, id), deleted))
    }

    /// `w:rPrChange` for a formatting revision on an inline node
    fn run_change(&mut self, node: NodeId) -> Option<RawXmlElement> {
        let revision = self.revisions_of(node).into_iter().find(|r| {
            matches!(r.kind, RevisionKind::FormatChange(FormatChange::Run { .. }))
        })?;
        let RevisionKind::FormatChange(FormatChange::Run { style, format }) = &revision.kind else {
            return None;
        };
        let id = self.next_revision_id();
        let who = Attribution::new(revision.author.clone(), revision.date);
        Some(run_change_element(&who, id, style.as_deref(), format))
    }

    fn write_inline(&mut self, w: &mut XmlWriter, node: NodeId) -> Result<()> {
        let arena = self.arena;
        let wrapper = match arena.kind(node)? {
            kind if kind.is_inline() => self.content_wrapper(node),
            _ => None,
        };
        let deleted = wrapper.as_ref().map(|(_, d)| *d).unwrap_or(false);
        if let Some((element, _)) = &wrapper {
            w.write_event(Event::Start(self.start(&element.name, &element.attributes)))?;
        }

        match arena.data(node)? {
            NodeData::Run(_) => self.write_run(w, node, deleted)?,
            NodeData::FieldStart(_) | NodeData::FieldSeparator(_) | NodeData::FieldEnd(_) => {
                self.write_field_char(w, node)?
            }
            NodeData::Shape(shape) => {
                let change = self.run_change(node);
                let rpr = run_props_element(None, &shape.format, change.into_iter().collect());
                w.write_event(Event::Start(BytesStart::new("w:r")))?;
                if let Some(rpr) = rpr {
                    self.element(w, rpr)?;
                }
                if let Some(xml) = &shape.xml {
                    self.element(w, xml.clone())?;
                }
                w.write_event(Event::End(BytesEnd::new("w:r")))?;
            }
            NodeData::StructuredDocumentTag(_) => self.write_sdt(w, node, true)?,
            NodeData::Comment(comment) => {
                let rpr = run_props_element(
                    comment.reference_style.as_deref(),
                    &comment.reference_format,
                    Vec::new(),
                );
                w.write_event(Event::Start(BytesStart::new("w:r")))?;
                if let Some(rpr) = rpr {
                    self.element(w, rpr)?;
                }
                self.element(w, empty("w:commentReference").with_attr("w:id", comment.id.clone()))?;
                w.write_event(Event::End(BytesEnd::new("w:r")))?;
                self.comments.push(node);
            }
            NodeData::Foreign(raw) => self.raw(w, raw)?,
            other => {
                let kind = other.kind();
                self.warn(
                    WarningKind::DataLoss,
                    format!("{:?} node inside a paragraph not written", kind),
                );
            }
        }

        if let Some((element, _)) = wrapper {
            w.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
        }
        Ok(())
    }

    fn write_run(&mut self, w: &mut XmlWriter, node: NodeId, deleted: bool) -> Result<()> {
        let arena = self.arena;
        let run = arena.run(node)?;
        let change = self.run_change(node);
        let rpr = run_props_element(run.style.as_deref(), &run.format, change.into_iter().collect());
        let in_code = self.fields.last().copied().unwrap_or(false);

        w.write_event(Event::Start(self.start("w:r", &run.attrs)))?;
        if let Some(rpr) = rpr {
            self.element(w, rpr)?;
        }
        for content in &run.content {
            match content {
                RunContent::Text(text) => {
                    let name = match (in_code, deleted) {
                        (false, false) => "w:t",
                        (false, true) => "w:delText",
                        (true, false) => "w:instrText",
                        (true, true) => "w:delInstrText",
                    };
                    let mut start = BytesStart::new(name);
                    if needs_preserve(text) {
                        start.push_attribute(("xml:space", "preserve"));
                    }
                    w.write_event(Event::Start(start))?;
                    w.write_event(Event::Text(BytesText::new(text)))?;
                    w.write_event(Event::End(BytesEnd::new(name)))?;
                }
                RunContent::Tab => w.write_event(Event::Empty(BytesStart::new("w:tab")))?,
                RunContent::Break(BreakType::TextWrapping) => {
                    w.write_event(Event::Empty(BytesStart::new("w:br")))?
                }
                RunContent::Break(kind) => {
                    let mut br = BytesStart::new("w:br");
                    let value = if *kind == BreakType::Page { "page" } else { "column" };
                    br.push_attribute(("w:type", value));
                    w.write_event(Event::Empty(br))?;
                }
                RunContent::CarriageReturn => w.write_event(Event::Empty(BytesStart::new("w:cr")))?,
                RunContent::SoftHyphen => {
                    w.write_event(Event::Empty(BytesStart::new("w:softHyphen")))?
                }
                RunContent::NoBreakHyphen => {
                    w.write_event(Event::Empty(BytesStart::new("w:noBreakHyphen")))?
                }
                RunContent::Unknown(raw) => self.raw(w, raw)?,
            }
        }
        w.write_event(Event::End(BytesEnd::new("w:r")))?;
        Ok(())
    }

    fn write_field_char(&mut self, w: &mut XmlWriter, node: NodeId) -> Result<()> {
        let arena = self.arena;
        let kind = arena.kind(node)?;
        let field = arena.field_char(node)?;
        let field_type = match kind {
            NodeKind::FieldStart => {
                self.fields.push(true);
                "begin"
            }
            NodeKind::FieldSeparator => {
                if let Some(top) = self.fields.last_mut() {
                    *top = false;
                }
                "separate"
            }
            _ => {
                self.fields.pop();
                "end"
            }
        };
        let change = self.run_change(node);
        let rpr = run_props_element(None, &field.format, change.into_iter().collect());

        let mut element = RawXmlElement::new("w:fldChar").with_attr("w:fldCharType", field_type);
        element.attributes.extend(field.attrs.iter().cloned());
        element.children = field.children.clone();
        element.self_closing = true;

        w.write_event(Event::Start(BytesStart::new("w:r")))?;
        if let Some(rpr) = rpr {
            self.element(w, rpr)?;
        }
        self.element(w, element)?;
        w.write_event(Event::End(BytesEnd::new("w:r")))?;
        Ok(())
    }

    // === Structured document tags ===

    fn write_sdt(&mut self, w: &mut XmlWriter, node: NodeId, inline: bool) -> Result<()> {
        let arena = self.arena;
        let mut sdt = arena.sdt(node)?.clone();
        let extension_type = matches!(
            sdt.sdt_type,
            SdtType::Checkbox | SdtType::RepeatingSection | SdtType::RepeatingSectionItem
        );
        if extension_type && !self.extensions {
            self.warn(
                WarningKind::MinorFormattingLoss,
                format!("{:?} content control written as rich text", sdt.sdt_type),
            );
            sdt.sdt_type = SdtType::RichText;
            sdt.type_attrs.clear();
            sdt.type_extra.clear();
            sdt.checked = None;
        }

        w.write_event(Event::Start(BytesStart::new("w:sdt")))?;
        self.element(w, sdt_props_element(&sdt))?;
        if let Some(end) = &sdt.end_properties {
            self.element(w, end.clone())?;
        }
        w.write_event(Event::Start(BytesStart::new("w:sdtContent")))?;
        for &child in arena.children(node) {
            if inline {
                self.write_inline(w, child)?;
            } else {
                self.write_block(w, child, None)?;
            }
        }
        w.write_event(Event::End(BytesEnd::new("w:sdtContent")))?;
        w.write_event(Event::End(BytesEnd::new("w:sdt")))?;
        Ok(())
    }

    // === Tables ===

    fn write_table(&mut self, w: &mut XmlWriter, node: NodeId) -> Result<()> {
        let arena = self.arena;
        let table = arena.table(node)?;
        let tblpr = table_props_element(table.style.as_deref(), &table.format, self.extensions)
            .unwrap_or_else(|| empty("w:tblPr"));

        w.write_event(Event::Start(BytesStart::new("w:tbl")))?;
        self.element(w, tblpr)?;

        let mut grid = RawXmlElement::new("w:tblGrid");
        if table.grid.is_empty() {
            let columns = crate::table::grid_column_count(arena, node)?;
            for _ in 0..columns {
                grid = grid.with_child(empty("w:gridCol"));
            }
        } else {
            for width in &table.grid {
                grid = grid.with_child(empty("w:gridCol").with_attr("w:w", width.to_string()));
            }
        }
        self.element(w, grid)?;

        for &child in arena.children(node) {
            match arena.data(child)? {
                NodeData::Row(_) => self.write_row(w, child)?,
                NodeData::Foreign(raw) => self.raw(w, raw)?,
                _ => {}
            }
        }
        w.write_event(Event::End(BytesEnd::new("w:tbl")))?;
        Ok(())
    }

    fn write_row(&mut self, w: &mut XmlWriter, node: NodeId) -> Result<()> {
        let arena = self.arena;
        let row = arena.row(node)?;

        let mut marks = Vec::new();
        for revision in self.revisions_of(node) {
            if let RevisionKind::Insertion | RevisionKind::Deletion = revision.kind {
                if let Some(name) = revision_element_name(&revision.kind) {
                    let id = self.next_revision_id();
                    let who = Attribution::new(revision.author.clone(), revision.date);
                    marks.push(who.element(name, id));
                }
            }
        }
        let trpr = row_props_element(&row.format, marks);

        // w:tblPrEx precedes w:trPr
        let (exceptions, rest): (Vec<NodeId>, Vec<NodeId>) =
            arena.children(node).iter().copied().partition(|&child| {
                matches!(
                    arena.foreign(child),
                    Ok(RawXmlNode::Element(e)) if e.local_name() == "tblPrEx"
                )
            });

        w.write_event(Event::Start(self.start("w:tr", &row.attrs)))?;
        for child in exceptions {
            self.raw(w, arena.foreign(child)?)?;
        }
        if let Some(trpr) = trpr {
            self.element(w, trpr)?;
        }
        for child in rest {
            match arena.data(child)? {
                NodeData::Cell(_) => self.write_cell(w, child)?,
                NodeData::Foreign(raw) => self.raw(w, raw)?,
                _ => {}
            }
        }
        w.write_event(Event::End(BytesEnd::new("w:tr")))?;
        Ok(())
    }

    fn write_cell(&mut self, w: &mut XmlWriter, node: NodeId) -> Result<()> {
        let arena = self.arena;
        let cell = arena.cell(node)?;
        w.write_event(Event::Start(BytesStart::new("w:tc")))?;
        if let Some(tcpr) = cell_props_element(&cell.format) {
            self.element(w, tcpr)?;
        }
        let mut has_block = false;
        for &child in arena.children(node) {
            has_block |= matches!(
                arena.kind(child)?,
                NodeKind::Paragraph | NodeKind::Table | NodeKind::StructuredDocumentTag
            );
            self.write_block(w, child, None)?;
        }
        if !has_block {
            // a cell must end in a paragraph
            w.write_event(Event::Empty(BytesStart::new("w:p")))?;
        }
        w.write_event(Event::End(BytesEnd::new("w:tc")))?;
        Ok(())
    }

    // === comments.xml ===

    /// comments.xml for the comments referenced so far; `None` when there are none
    pub fn write_comments(&mut self, declarations: &[(String, String)]) -> Result<Option<Vec<u8>>> {
        if self.comments.is_empty() {
            return Ok(None);
        }
        let arena = self.arena;
        let comments = std::mem::take(&mut self.comments);
        let mut w = Writer::new(Vec::new());
        w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        let ours = document_namespaces(self.extensions);
        w.write_event(Event::Start(root_start("w:comments", &ours, declarations)))?;

        for node in comments {
            let comment = arena.comment(node)?;
            let mut start = BytesStart::new("w:comment");
            start.push_attribute(("w:id", comment.id.as_str()));
            start.push_attribute(("w:author", comment.author.as_str()));
            let date = comment.date.as_ref().map(super::props::format_date);
            if let Some(date) = &date {
                start.push_attribute(("w:date", date.as_str()));
            }
            if let Some(initials) = &comment.initials {
                start.push_attribute(("w:initials", initials.as_str()));
            }
            w.write_event(Event::Start(start))?;
            self.fields.clear();
            for &child in arena.children(node) {
                self.write_paragraph(&mut w, child, None)?;
            }
            w.write_event(Event::End(BytesEnd::new("w:comment")))?;
        }

        w.write_event(Event::End(BytesEnd::new("w:comments")))?;
        Ok(Some(w.into_inner()))
    }
}
