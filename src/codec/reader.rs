//! document.xml and comments.xml into the node arena

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::props::{
    attr, local_name, parse_date, read_cell_props, read_paragraph_props, read_row_props,
    read_run_props, read_sdt_props, read_table_props, revision_kind_for, val_element,
    Attribution,
};
use crate::error::{Error, Result};
use crate::format::RunFormat;
use crate::node::{
    BreakType, Cell, Comment, FieldChar, NodeArena, NodeData, NodeId, NodeKind, Paragraph, Row,
    Run, RunContent, Sdt, Shape, Table,
};
use crate::revision::{is_trackable, FormatChange, RevisionKind, RevisionTracker};
use crate::warning::{WarningInfo, WarningKind, WarningSink};
use crate::xml::{collect_attrs, RawXmlElement, RawXmlNode};

type XmlReader<'x> = Reader<&'x [u8]>;

/// Parts of `w:document` outside the body
#[derive(Clone, Debug, Default)]
pub(crate) struct DocumentXml {
    /// Attributes of the root element (namespace declarations, conformance)
    pub declarations: Vec<(String, String)>,
    /// Children of `w:document` before the body (w:background, ...)
    pub extra: Vec<RawXmlNode>,
}

/// Enclosing `w:ins`/`w:del`/`w:moveFrom`/`w:moveTo`
struct Mark {
    kind: RevisionKind,
    who: Attribution,
    /// The wrapper start tag, reused for content that cannot carry a revision
    element: RawXmlElement,
}

/// Builds the node tree of one document
pub(crate) struct BodyReader<'w> {
    arena: NodeArena,
    revisions: RevisionTracker,
    warnings: &'w mut dyn WarningSink,
    /// Comments by id, detached until their reference is read
    comments: HashMap<String, NodeId>,
    marks: Vec<Mark>,
}

fn element_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_string()
}

fn local(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Run formatting with the character style folded into the preserved markup,
/// for nodes that have no style slot of their own
fn format_with_style(style: Option<String>, mut format: RunFormat) -> RunFormat {
    if let Some(style) = style {
        format
            .unknown
            .insert(0, RawXmlNode::Element(val_element("w:rStyle", style)));
    }
    format
}

impl<'w> BodyReader<'w> {
    pub fn new(warnings: &'w mut dyn WarningSink) -> Self {
        BodyReader {
            arena: NodeArena::new(),
            revisions: RevisionTracker::new(),
            warnings,
            comments: HashMap::new(),
            marks: Vec::new(),
        }
    }

    /// The tree and the revisions read so far
    pub fn into_parts(self) -> (NodeArena, RevisionTracker) {
        (self.arena, self.revisions)
    }

    fn warn(&mut self, kind: WarningKind, description: impl Into<String>) {
        let info = WarningInfo::new(kind, description);
        log::debug!("{}", info);
        self.warnings.warning(info);
    }

    // === Comments ===

    /// Read comments.xml ahead of the body; returns the root attributes
    pub fn read_comments(&mut self, xml: &str) -> Result<Vec<(String, String)>> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);
        let mut declarations = Vec::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"comments" => declarations = collect_attrs(&e),
                    b"comment" => self.read_comment(&mut reader, &e)?,
                    _ => {
                        RawXmlElement::from_reader(&mut reader, &e)?;
                        self.warn(WarningKind::DataLoss, "unknown element in comments part");
                    }
                },
                Event::Empty(e) if e.local_name().as_ref() == b"comment" => {
                    self.comment_node(&e)?;
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        log::debug!("comments: {} read", self.comments.len());
        Ok(declarations)
    }

    fn comment_node(&mut self, start: &BytesStart) -> Result<NodeId> {
        let attrs = collect_attrs(start);
        let find = |name: &str| {
            attrs
                .iter()
                .find(|(k, _)| local_name(k) == name)
                .map(|(_, v)| v.clone())
        };
        let comment = Comment {
            id: find("id").unwrap_or_default(),
            author: find("author").unwrap_or_default(),
            initials: find("initials"),
            date: find("date").as_deref().and_then(parse_date),
            ..Default::default()
        };
        let id = comment.id.clone();
        let node = self.arena.create_with(NodeData::Comment(comment), None)?;
        self.comments.insert(id, node);
        Ok(node)
    }

    fn read_comment(&mut self, reader: &mut XmlReader, start: &BytesStart) -> Result<()> {
        let comment = self.comment_node(start)?;
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    if e.local_name().as_ref() == b"p" {
                        self.read_paragraph(reader, &e, comment, false)?;
                    } else {
                        let name = element_name(&e);
                        RawXmlElement::from_reader(reader, &e)?;
                        self.warn(
                            WarningKind::DataLoss,
                            format!("<{}> in a comment is not supported", name),
                        );
                    }
                }
                Event::Empty(e) if e.local_name().as_ref() == b"p" => {
                    let paragraph = Paragraph {
                        attrs: collect_attrs(&e),
                        ..Default::default()
                    };
                    self.arena
                        .create_with(NodeData::Paragraph(paragraph), Some(comment))?;
                }
                Event::End(_) => break,
                Event::Eof => return Err(Error::InvalidDocument("Unexpected EOF in comment".into())),
                _ => {}
            }
            buf.clear();
        }
        Ok(())
    }

    /// Warn about comments no reference pointed at; they are dropped
    pub fn finish(&mut self) {
        let mut dangling: Vec<String> = self
            .comments
            .iter()
            .filter(|(_, node)| self.arena.parent(**node).is_none())
            .map(|(id, _)| id.clone())
            .collect();
        dangling.sort();
        for id in dangling {
            self.warn(
                WarningKind::DataLoss,
                format!("comment {} has no reference in the document", id),
            );
        }
    }

    // === Document and body ===

    /// Read document.xml
    pub fn read_document(&mut self, xml: &str) -> Result<DocumentXml> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut document = DocumentXml::default();
        let mut in_root = false;
        let mut found_body = false;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) if !in_root => {
                    if e.local_name().as_ref() != b"document" {
                        return Err(Error::InvalidDocument(format!(
                            "unexpected root element <{}>",
                            element_name(&e)
                        )));
                    }
                    document.declarations = collect_attrs(&e);
                    in_root = true;
                }
                Event::Start(e) if e.local_name().as_ref() == b"body" => {
                    self.read_body(&mut reader)?;
                    found_body = true;
                }
                Event::Empty(e) if e.local_name().as_ref() == b"body" => {
                    self.start_section()?;
                    found_body = true;
                }
                Event::Start(e) => {
                    let raw = RawXmlElement::from_reader(&mut reader, &e)?;
                    document.extra.push(RawXmlNode::Element(raw));
                }
                Event::Empty(e) if in_root => {
                    document
                        .extra
                        .push(RawXmlNode::Element(RawXmlElement::from_empty(&e)));
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !found_body {
            return Err(Error::InvalidDocument("Missing w:body element".into()));
        }
        self.finish();
        Ok(document)
    }

    fn start_section(&mut self) -> Result<(NodeId, NodeId)> {
        let root = self.arena.root();
        let section = self.arena.create(NodeKind::Section, Some(root))?;
        let body = self.arena.create(NodeKind::Body, Some(section))?;
        Ok((section, body))
    }

    fn set_section_properties(&mut self, section: NodeId, properties: RawXmlElement) -> Result<()> {
        self.arena.section_mut(section)?.properties = Some(properties);
        Ok(())
    }

    fn read_body(&mut self, reader: &mut XmlReader) -> Result<()> {
        let (mut section, mut body) = self.start_section()?;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) if e.local_name().as_ref() == b"sectPr" => {
                    let raw = RawXmlElement::from_reader(reader, &e)?;
                    self.set_section_properties(section, raw)?;
                }
                Event::Empty(e) if e.local_name().as_ref() == b"sectPr" => {
                    self.set_section_properties(section, RawXmlElement::from_empty(&e))?;
                }
                Event::Start(e) => {
                    if let Some(properties) = self.read_block(reader, &e, body, true)? {
                        // a paragraph-level sectPr closes the section
                        self.set_section_properties(section, properties)?;
                        (section, body) = self.start_section()?;
                    }
                }
                Event::Empty(e) => self.read_empty_block(&e, body)?,
                Event::Text(t) => {
                    let text = t.unescape()?;
                    if !is_blank(&text) {
                        self.arena
                            .create_with(NodeData::Foreign(RawXmlNode::Text(text.to_string())), Some(body))?;
                    }
                }
                Event::End(_) => break,
                Event::Eof => return Err(Error::InvalidDocument("Unexpected EOF in body".into())),
                _ => {}
            }
            buf.clear();
        }

        let sections = self.arena.children_of_kind(self.arena.root(), NodeKind::Section);
        if sections.len() > 1
            && self.arena.section(section)?.properties.is_none()
            && self.arena.children(body).is_empty()
        {
            self.arena.remove(section)?;
        }
        Ok(())
    }

    /// Read a block-level element; returns the section properties a
    /// top-level paragraph carried
    fn read_block(
        &mut self,
        reader: &mut XmlReader,
        start: &BytesStart,
        parent: NodeId,
        top: bool,
    ) -> Result<Option<RawXmlElement>> {
        match start.local_name().as_ref() {
            b"p" => return self.read_paragraph(reader, start, parent, top),
            b"tbl" => self.read_table(reader, parent)?,
            b"sdt" => self.read_sdt(reader, start, parent)?,
            _ => {
                let raw = RawXmlElement::from_reader(reader, start)?;
                self.arena
                    .create_with(NodeData::Foreign(RawXmlNode::Element(raw)), Some(parent))?;
            }
        }
        Ok(None)
    }

    fn read_empty_block(&mut self, start: &BytesStart, parent: NodeId) -> Result<()> {
        let data = match start.local_name().as_ref() {
            b"p" => NodeData::Paragraph(Paragraph {
                attrs: collect_attrs(start),
                ..Default::default()
            }),
            _ => NodeData::Foreign(RawXmlNode::Element(RawXmlElement::from_empty(start))),
        };
        self.arena.create_with(data, Some(parent))?;
        Ok(())
    }

    // === Paragraphs and inline content ===

    fn read_paragraph(
        &mut self,
        reader: &mut XmlReader,
        start: &BytesStart,
        parent: NodeId,
        top: bool,
    ) -> Result<Option<RawXmlElement>> {
        let paragraph = Paragraph {
            attrs: collect_attrs(start),
            ..Default::default()
        };
        let p = self
            .arena
            .create_with(NodeData::Paragraph(paragraph), Some(parent))?;
        let mut section = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) if e.local_name().as_ref() == b"pPr" => {
                    let raw = RawXmlElement::from_reader(reader, &e)?;
                    section = self.apply_paragraph_props(p, &raw, top)?;
                }
                Event::Empty(e) if e.local_name().as_ref() == b"pPr" => {}
                Event::Start(e) => self.read_inline(reader, &e, p)?,
                Event::Empty(e) => self.read_empty_inline(&e, p)?,
                Event::End(_) => break,
                Event::Eof => {
                    return Err(Error::InvalidDocument("Unexpected EOF in paragraph".into()))
                }
                _ => {}
            }
            buf.clear();
        }
        Ok(section)
    }

    fn apply_paragraph_props(
        &mut self,
        p: NodeId,
        raw: &RawXmlElement,
        top: bool,
    ) -> Result<Option<RawXmlElement>> {
        let mut props = read_paragraph_props(raw, true);
        for (kind, who) in props.mark.marks.drain(..) {
            self.revisions.add(p, kind, who.author, who.date);
        }
        if let Some((who, style, format)) = props.change.take() {
            let kind = RevisionKind::FormatChange(FormatChange::Paragraph { style, format });
            self.revisions.add(p, kind, who.author, who.date);
        }
        let section = match props.section.take() {
            Some(section) if top => Some(section),
            Some(section) => {
                props.format.unknown.push(RawXmlNode::Element(section));
                None
            }
            None => None,
        };
        let paragraph = self.arena.paragraph_mut(p)?;
        paragraph.style = props.style;
        paragraph.format = props.format;
        paragraph.mark_format = props.mark.format;
        Ok(section)
    }

    /// Create an inline node, attributing it to the enclosing revision mark
    fn add_inline(&mut self, data: NodeData, parent: NodeId) -> Result<NodeId> {
        let data = match (data, self.marks.last()) {
            (NodeData::Foreign(raw), Some(mark)) => {
                let mut wrapper = mark.element.clone();
                wrapper.self_closing = false;
                wrapper.children.push(raw);
                NodeData::Foreign(RawXmlNode::Element(wrapper))
            }
            (data, _) => data,
        };
        let kind = data.kind();
        let node = self.arena.create_with(data, Some(parent))?;
        if let Some(mark) = self.marks.last() {
            if is_trackable(kind) {
                let (kind, who) = (mark.kind.clone(), mark.who.clone());
                self.revisions.add(node, kind, who.author, who.date);
            }
        }
        Ok(node)
    }

    fn read_inline(&mut self, reader: &mut XmlReader, start: &BytesStart, parent: NodeId) -> Result<()> {
        let name = local(start);
        match name.as_str() {
            "r" => self.read_run(reader, start, parent),
            "fldSimple" => self.read_simple_field(reader, start, parent),
            "sdt" => self.read_sdt(reader, start, parent),
            _ => match revision_kind_for(&name) {
                Some(kind) => self.read_marked(reader, start, parent, kind),
                None => {
                    let raw = RawXmlElement::from_reader(reader, start)?;
                    self.add_inline(NodeData::Foreign(RawXmlNode::Element(raw)), parent)?;
                    Ok(())
                }
            },
        }
    }

    fn read_empty_inline(&mut self, start: &BytesStart, parent: NodeId) -> Result<()> {
        let data = match start.local_name().as_ref() {
            b"r" => NodeData::Run(Run {
                attrs: collect_attrs(start),
                ..Default::default()
            }),
            b"fldSimple" => {
                let empty = RawXmlElement::from_empty(start);
                return self.simple_field(&empty.attributes, parent, |_, _| Ok(()));
            }
            _ => NodeData::Foreign(RawXmlNode::Element(RawXmlElement::from_empty(start))),
        };
        self.add_inline(data, parent)?;
        Ok(())
    }

    /// Content of a `w:ins`/`w:del`/`w:moveFrom`/`w:moveTo` wrapper
    fn read_marked(
        &mut self,
        reader: &mut XmlReader,
        start: &BytesStart,
        parent: NodeId,
        kind: RevisionKind,
    ) -> Result<()> {
        let mut element = RawXmlElement::from_empty(start);
        element.self_closing = false;
        self.marks.push(Mark {
            kind,
            who: Attribution::from_start(start),
            element,
        });
        let mut buf = Vec::new();
        let result = loop {
            let event = match reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(e) => break Err(e.into()),
            };
            let step = match event {
                Event::Start(e) => self.read_inline(reader, &e, parent),
                Event::Empty(e) => self.read_empty_inline(&e, parent),
                Event::End(_) => break Ok(()),
                Event::Eof => break Err(Error::InvalidDocument("Unexpected EOF in revision".into())),
                _ => Ok(()),
            };
            if let Err(e) = step {
                break Err(e);
            }
            buf.clear();
        };
        self.marks.pop();
        result
    }

    /// `w:fldSimple` as start, code run, separator, result and end
    fn read_simple_field(
        &mut self,
        reader: &mut XmlReader,
        start: &BytesStart,
        parent: NodeId,
    ) -> Result<()> {
        let attrs = collect_attrs(start);
        self.simple_field(&attrs, parent, |this, parent| {
            let mut buf = Vec::new();
            loop {
                match reader.read_event_into(&mut buf)? {
                    Event::Start(e) => this.read_inline(reader, &e, parent)?,
                    Event::Empty(e) => this.read_empty_inline(&e, parent)?,
                    Event::End(_) => break,
                    Event::Eof => {
                        return Err(Error::InvalidDocument("Unexpected EOF in field".into()))
                    }
                    _ => {}
                }
                buf.clear();
            }
            Ok(())
        })
    }

    fn simple_field(
        &mut self,
        attrs: &[(String, String)],
        parent: NodeId,
        result: impl FnOnce(&mut Self, NodeId) -> Result<()>,
    ) -> Result<()> {
        let instr = attrs
            .iter()
            .find(|(k, _)| local_name(k) == "instr")
            .map(|(_, v)| v.clone())
            .unwrap_or_default();
        let field = FieldChar {
            attrs: attrs
                .iter()
                .filter(|(k, _)| local_name(k) != "instr")
                .cloned()
                .collect(),
            ..Default::default()
        };
        self.add_inline(NodeData::FieldStart(field), parent)?;
        self.add_inline(NodeData::Run(Run::new(instr)), parent)?;
        self.add_inline(NodeData::FieldSeparator(FieldChar::default()), parent)?;
        result(self, parent)?;
        self.add_inline(NodeData::FieldEnd(FieldChar::default()), parent)?;
        Ok(())
    }

    fn read_run(&mut self, reader: &mut XmlReader, start: &BytesStart, parent: NodeId) -> Result<()> {
        let raw = RawXmlElement::from_reader(reader, start)?;
        let mut style = None;
        let mut format = RunFormat::default();
        let mut change = None;
        let mut content: Vec<RunContent> = Vec::new();
        let mut created: Vec<NodeId> = Vec::new();

        for child in &raw.children {
            let RawXmlNode::Element(e) = child else {
                continue;
            };
            match e.local_name() {
                "rPr" => {
                    let props = read_run_props(e, true);
                    style = props.style;
                    format = props.format;
                    change = props.change;
                }
                "t" | "delText" | "instrText" | "delInstrText" => {
                    content.push(RunContent::Text(e.text()));
                }
                "tab" => content.push(RunContent::Tab),
                "br" => content.push(read_break(e)),
                "cr" => content.push(RunContent::CarriageReturn),
                "softHyphen" => content.push(RunContent::SoftHyphen),
                "noBreakHyphen" => content.push(RunContent::NoBreakHyphen),
                "fldChar" | "drawing" | "pict" | "object" | "commentReference" => {
                    if !content.is_empty() {
                        let run = Run {
                            style: style.clone(),
                            format: format.clone(),
                            content: std::mem::take(&mut content),
                            attrs: raw.attributes.clone(),
                        };
                        created.push(self.add_inline(NodeData::Run(run), parent)?);
                    }
                    let styled = format_with_style(style.clone(), format.clone());
                    match e.local_name() {
                        "fldChar" => created.push(self.field_char(e, styled, parent)?),
                        "commentReference" => {
                            if !self.attach_comment(e, style.clone(), format.clone(), parent)? {
                                content.push(RunContent::Unknown(child.clone()));
                            }
                        }
                        _ => {
                            let shape = Shape {
                                format: styled,
                                xml: Some(e.clone()),
                            };
                            created.push(self.add_inline(NodeData::Shape(shape), parent)?);
                        }
                    }
                }
                _ => content.push(RunContent::Unknown(child.clone())),
            }
        }

        if !content.is_empty() || created.is_empty() {
            let run = Run {
                style,
                format,
                content,
                attrs: raw.attributes.clone(),
            };
            created.push(self.add_inline(NodeData::Run(run), parent)?);
        }

        if let Some((who, style, format)) = change {
            for node in created {
                let kind = RevisionKind::FormatChange(FormatChange::Run {
                    style: style.clone(),
                    format: format.clone(),
                });
                self.revisions.add(node, kind, who.author.clone(), who.date);
            }
        }
        Ok(())
    }

    fn field_char(&mut self, e: &RawXmlElement, format: RunFormat, parent: NodeId) -> Result<NodeId> {
        let field = FieldChar {
            format,
            attrs: e
                .attributes
                .iter()
                .filter(|(k, _)| local_name(k) != "fldCharType")
                .cloned()
                .collect(),
            children: e.children.clone(),
        };
        let data = match attr(e, "fldCharType") {
            Some("begin") => NodeData::FieldStart(field),
            Some("separate") => NodeData::FieldSeparator(field),
            Some("end") => NodeData::FieldEnd(field),
            other => {
                self.warn(
                    WarningKind::InvalidMarkup,
                    format!("field character of type {:?}", other),
                );
                NodeData::Foreign(RawXmlNode::Element(e.clone()))
            }
        };
        self.add_inline(data, parent)
    }

    /// Move a comment next to its reference; `false` when it cannot be placed
    fn attach_comment(
        &mut self,
        e: &RawXmlElement,
        style: Option<String>,
        format: RunFormat,
        parent: NodeId,
    ) -> Result<bool> {
        let id = attr(e, "id").unwrap_or_default().to_string();
        let Some(&comment) = self.comments.get(&id) else {
            self.warn(
                WarningKind::UnresolvedReference,
                format!("reference to missing comment {}", id),
            );
            return Ok(false);
        };
        if self.arena.parent(comment).is_some() {
            self.warn(
                WarningKind::InvalidMarkup,
                format!("comment {} is referenced more than once", id),
            );
            return Ok(false);
        }
        let paragraph = if self.arena.kind(parent)? == NodeKind::Paragraph {
            Some(parent)
        } else {
            self.arena.ancestor(parent, NodeKind::Paragraph)
        };
        let Some(paragraph) = paragraph else {
            return Ok(false);
        };
        let data = self.arena.comment_mut(comment)?;
        data.reference_style = style;
        data.reference_format = format;
        self.arena.append_child(paragraph, comment)?;
        Ok(true)
    }

    // === Structured document tags ===

    fn read_sdt(&mut self, reader: &mut XmlReader, start: &BytesStart, parent: NodeId) -> Result<()> {
        let parent_kind = self.arena.kind(parent)?;
        if matches!(parent_kind, NodeKind::Table | NodeKind::Row) {
            let raw = RawXmlElement::from_reader(reader, start)?;
            self.arena
                .create_with(NodeData::Foreign(RawXmlNode::Element(raw)), Some(parent))?;
            return Ok(());
        }
        let inline = parent_kind == NodeKind::Paragraph || self.arena.is_inline_sdt(parent);
        let sdt = self
            .arena
            .create_with(NodeData::StructuredDocumentTag(Sdt::default()), Some(parent))?;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"sdtPr" => {
                        let raw = RawXmlElement::from_reader(reader, &e)?;
                        let props = read_sdt_props(&raw);
                        let data = self.arena.sdt_mut(sdt)?;
                        let end_properties = data.end_properties.take();
                        *data = Sdt {
                            end_properties,
                            ..props
                        };
                    }
                    b"sdtEndPr" => {
                        let raw = RawXmlElement::from_reader(reader, &e)?;
                        self.arena.sdt_mut(sdt)?.end_properties = Some(raw);
                    }
                    b"sdtContent" => self.read_sdt_content(reader, sdt, inline)?,
                    _ => {
                        let name = element_name(&e);
                        RawXmlElement::from_reader(reader, &e)?;
                        self.warn(WarningKind::DataLoss, format!("<{}> in w:sdt dropped", name));
                    }
                },
                Event::Empty(e) if e.local_name().as_ref() == b"sdtEndPr" => {
                    self.arena.sdt_mut(sdt)?.end_properties = Some(RawXmlElement::from_empty(&e));
                }
                Event::End(_) => break,
                Event::Eof => return Err(Error::InvalidDocument("Unexpected EOF in sdt".into())),
                _ => {}
            }
            buf.clear();
        }
        Ok(())
    }

    fn read_sdt_content(&mut self, reader: &mut XmlReader, sdt: NodeId, inline: bool) -> Result<()> {
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) if inline => self.read_inline(reader, &e, sdt)?,
                Event::Empty(e) if inline => self.read_empty_inline(&e, sdt)?,
                Event::Start(e) => {
                    if self.read_block(reader, &e, sdt, false)?.is_some() {
                        self.warn(
                            WarningKind::MinorFormattingLoss,
                            "section break inside a content control ignored",
                        );
                    }
                }
                Event::Empty(e) => self.read_empty_block(&e, sdt)?,
                Event::End(_) => break,
                Event::Eof => {
                    return Err(Error::InvalidDocument("Unexpected EOF in sdtContent".into()))
                }
                _ => {}
            }
            buf.clear();
        }
        Ok(())
    }

    // === Tables ===

    fn read_table(&mut self, reader: &mut XmlReader, parent: NodeId) -> Result<()> {
        let table = self
            .arena
            .create_with(NodeData::Table(Table::default()), Some(parent))?;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"tblPr" => {
                        let raw = RawXmlElement::from_reader(reader, &e)?;
                        let (style, format) = read_table_props(&raw);
                        let data = self.arena.table_mut(table)?;
                        data.style = style;
                        data.format = format;
                    }
                    b"tblGrid" => {
                        let raw = RawXmlElement::from_reader(reader, &e)?;
                        let grid = raw
                            .elements()
                            .filter(|c| c.local_name() == "gridCol")
                            .map(|c| attr(c, "w").and_then(|w| w.parse().ok()).unwrap_or(0))
                            .collect();
                        self.arena.table_mut(table)?.grid = grid;
                    }
                    b"tr" => self.read_row(reader, &e, table)?,
                    b"sdt" => self.read_sdt(reader, &e, table)?,
                    _ => {
                        let raw = RawXmlElement::from_reader(reader, &e)?;
                        self.arena
                            .create_with(NodeData::Foreign(RawXmlNode::Element(raw)), Some(table))?;
                    }
                },
                Event::Empty(e) => match e.local_name().as_ref() {
                    b"tblPr" | b"tblGrid" => {}
                    b"tr" => {
                        self.arena.create(NodeKind::Row, Some(table))?;
                    }
                    _ => {
                        let raw = RawXmlElement::from_empty(&e);
                        self.arena
                            .create_with(NodeData::Foreign(RawXmlNode::Element(raw)), Some(table))?;
                    }
                },
                Event::End(_) => break,
                Event::Eof => return Err(Error::InvalidDocument("Unexpected EOF in table".into())),
                _ => {}
            }
            buf.clear();
        }
        Ok(())
    }

    fn read_row(&mut self, reader: &mut XmlReader, start: &BytesStart, table: NodeId) -> Result<()> {
        let row = Row {
            attrs: collect_attrs(start),
            ..Default::default()
        };
        let row = self.arena.create_with(NodeData::Row(row), Some(table))?;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"trPr" => {
                        let raw = RawXmlElement::from_reader(reader, &e)?;
                        let props = read_row_props(&raw);
                        for (kind, who) in props.marks {
                            self.revisions.add(row, kind, who.author, who.date);
                        }
                        self.arena.row_mut(row)?.format = props.format;
                    }
                    b"tc" => self.read_cell(reader, row)?,
                    b"sdt" => self.read_sdt(reader, &e, row)?,
                    _ => {
                        let raw = RawXmlElement::from_reader(reader, &e)?;
                        self.arena
                            .create_with(NodeData::Foreign(RawXmlNode::Element(raw)), Some(row))?;
                    }
                },
                Event::Empty(e) => match e.local_name().as_ref() {
                    b"trPr" => {}
                    b"tc" => {
                        let cell = self.arena.create(NodeKind::Cell, Some(row))?;
                        self.warn(WarningKind::InvalidMarkup, "table cell without a paragraph");
                        self.arena.create(NodeKind::Paragraph, Some(cell))?;
                    }
                    _ => {
                        let raw = RawXmlElement::from_empty(&e);
                        self.arena
                            .create_with(NodeData::Foreign(RawXmlNode::Element(raw)), Some(row))?;
                    }
                },
                Event::End(_) => break,
                Event::Eof => return Err(Error::InvalidDocument("Unexpected EOF in row".into())),
                _ => {}
            }
            buf.clear();
        }
        Ok(())
    }

    fn read_cell(&mut self, reader: &mut XmlReader, row: NodeId) -> Result<()> {
        let cell = self
            .arena
            .create_with(NodeData::Cell(Cell::default()), Some(row))?;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) if e.local_name().as_ref() == b"tcPr" => {
                    let raw = RawXmlElement::from_reader(reader, &e)?;
                    self.arena.cell_mut(cell)?.format = read_cell_props(&raw);
                }
                Event::Empty(e) if e.local_name().as_ref() == b"tcPr" => {}
                Event::Start(e) => {
                    self.read_block(reader, &e, cell, false)?;
                }
                Event::Empty(e) => self.read_empty_block(&e, cell)?,
                Event::End(_) => break,
                Event::Eof => return Err(Error::InvalidDocument("Unexpected EOF in cell".into())),
                _ => {}
            }
            buf.clear();
        }
        Ok(())
    }
}

/// `w:br`; breaks with `w:clear` or other extras stay verbatim
fn read_break(e: &RawXmlElement) -> RunContent {
    let kind = match (attr(e, "type"), e.attributes.len()) {
        (None, 0) => Some(BreakType::TextWrapping),
        (Some("page"), 1) => Some(BreakType::Page),
        (Some("column"), 1) => Some(BreakType::Column),
        _ => None,
    };
    match kind {
        Some(kind) => RunContent::Break(kind),
        None => RunContent::Unknown(RawXmlNode::Element(e.clone())),
    }
}
