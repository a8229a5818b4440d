//! Kind-specific node payloads

use super::NodeKind;
use crate::format::{CellFormat, ParagraphFormat, RowFormat, RunFormat, TableFormat};
use crate::xml::{RawXmlElement, RawXmlNode};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Payload of a node; the variant is the node's kind
#[derive(Clone, Debug, PartialEq)]
pub enum NodeData {
    Document,
    Section(Section),
    Body,
    Paragraph(Paragraph),
    Run(Run),
    Table(Table),
    Row(Row),
    Cell(Cell),
    FieldStart(FieldChar),
    FieldSeparator(FieldChar),
    FieldEnd(FieldChar),
    StructuredDocumentTag(Sdt),
    Shape(Shape),
    Comment(Comment),
    /// Unrecognized content kept verbatim
    Foreign(RawXmlNode),
}

impl NodeData {
    /// Empty payload for a kind
    pub fn new(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Document => NodeData::Document,
            NodeKind::Section => NodeData::Section(Section::default()),
            NodeKind::Body => NodeData::Body,
            NodeKind::Paragraph => NodeData::Paragraph(Paragraph::default()),
            NodeKind::Run => NodeData::Run(Run::default()),
            NodeKind::Table => NodeData::Table(Table::default()),
            NodeKind::Row => NodeData::Row(Row::default()),
            NodeKind::Cell => NodeData::Cell(Cell::default()),
            NodeKind::FieldStart => NodeData::FieldStart(FieldChar::default()),
            NodeKind::FieldSeparator => NodeData::FieldSeparator(FieldChar::default()),
            NodeKind::FieldEnd => NodeData::FieldEnd(FieldChar::default()),
            NodeKind::StructuredDocumentTag => NodeData::StructuredDocumentTag(Sdt::default()),
            NodeKind::Shape => NodeData::Shape(Shape::default()),
            NodeKind::Comment => NodeData::Comment(Comment::default()),
            NodeKind::Foreign => NodeData::Foreign(RawXmlNode::Text(String::new())),
        }
    }

    /// The kind tag of this payload
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Document => NodeKind::Document,
            NodeData::Section(_) => NodeKind::Section,
            NodeData::Body => NodeKind::Body,
            NodeData::Paragraph(_) => NodeKind::Paragraph,
            NodeData::Run(_) => NodeKind::Run,
            NodeData::Table(_) => NodeKind::Table,
            NodeData::Row(_) => NodeKind::Row,
            NodeData::Cell(_) => NodeKind::Cell,
            NodeData::FieldStart(_) => NodeKind::FieldStart,
            NodeData::FieldSeparator(_) => NodeKind::FieldSeparator,
            NodeData::FieldEnd(_) => NodeKind::FieldEnd,
            NodeData::StructuredDocumentTag(_) => NodeKind::StructuredDocumentTag,
            NodeData::Shape(_) => NodeKind::Shape,
            NodeData::Comment(_) => NodeKind::Comment,
            NodeData::Foreign(_) => NodeKind::Foreign,
        }
    }
}

impl NodeData {
    /// Call `f` on each outermost verbatim XML element kept on this node
    pub(crate) fn visit_raw_mut(&mut self, f: &mut dyn FnMut(&mut RawXmlElement)) {
        fn each(list: &mut [RawXmlNode], f: &mut dyn FnMut(&mut RawXmlElement)) {
            for node in list {
                if let RawXmlNode::Element(e) = node {
                    f(e);
                }
            }
        }
        match self {
            NodeData::Section(s) => {
                if let Some(properties) = s.properties.as_mut() {
                    f(properties);
                }
            }
            NodeData::Paragraph(p) => {
                each(&mut p.format.unknown, f);
                each(&mut p.mark_format.unknown, f);
            }
            NodeData::Run(r) => {
                each(&mut r.format.unknown, f);
                for content in &mut r.content {
                    if let RunContent::Unknown(RawXmlNode::Element(e)) = content {
                        f(e);
                    }
                }
            }
            NodeData::Table(t) => each(&mut t.format.unknown, f),
            NodeData::Row(r) => each(&mut r.format.unknown, f),
            NodeData::Cell(c) => each(&mut c.format.unknown, f),
            NodeData::FieldStart(c) | NodeData::FieldSeparator(c) | NodeData::FieldEnd(c) => {
                each(&mut c.format.unknown, f);
                each(&mut c.children, f);
            }
            NodeData::StructuredDocumentTag(s) => {
                each(&mut s.type_extra, f);
                each(&mut s.properties, f);
                if let Some(end) = s.end_properties.as_mut() {
                    f(end);
                }
            }
            NodeData::Shape(s) => {
                each(&mut s.format.unknown, f);
                if let Some(xml) = s.xml.as_mut() {
                    f(xml);
                }
            }
            NodeData::Comment(c) => each(&mut c.reference_format.unknown, f),
            NodeData::Foreign(RawXmlNode::Element(e)) => f(e),
            NodeData::Document | NodeData::Body | NodeData::Foreign(_) => {}
        }
    }

    /// Relationship ids referenced from verbatim XML on this node
    pub(crate) fn relationship_ids(&mut self) -> Vec<String> {
        let mut ids = Vec::new();
        self.visit_raw_mut(&mut |e| collect_rel_ids(e, &mut ids));
        ids
    }

    /// Point relationship attributes at new ids; unmapped ids stay
    pub(crate) fn rename_relationship_ids(&mut self, renames: &HashMap<String, String>) {
        self.visit_raw_mut(&mut |root| {
            root.visit_mut(&mut |e| {
                for (k, v) in e.attributes.iter_mut() {
                    if !is_rel_attr(k) {
                        continue;
                    }
                    if let Some(new_id) = renames.get(v.as_str()) {
                        *v = new_id.clone();
                    }
                }
            })
        });
    }
}

/// Section (one `w:sectPr` worth of page setup)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Section {
    /// Section properties, kept verbatim
    pub properties: Option<RawXmlElement>,
}

/// Paragraph (w:p)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Paragraph {
    /// Paragraph style id
    pub style: Option<String>,
    /// Direct paragraph formatting
    pub format: ParagraphFormat,
    /// Formatting of the paragraph mark
    pub mark_format: RunFormat,
    /// Attributes of `w:p` (rsids, w14:paraId, ...)
    pub attrs: Vec<(String, String)>,
    /// Last computed list label
    pub list_label: Option<String>,
}

impl Paragraph {
    /// Paragraph with a style
    pub fn with_style(style: impl Into<String>) -> Self {
        Paragraph {
            style: Some(style.into()),
            ..Default::default()
        }
    }
}

/// Break type
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BreakType {
    #[default]
    TextWrapping,
    Page,
    Column,
}

/// Content within a run
#[derive(Clone, Debug, PartialEq)]
pub enum RunContent {
    /// Text (w:t, or w:instrText inside a field code)
    Text(String),
    /// Tab (w:tab)
    Tab,
    /// Break (w:br)
    Break(BreakType),
    /// Carriage return (w:cr)
    CarriageReturn,
    /// Soft hyphen
    SoftHyphen,
    /// Non-breaking hyphen
    NoBreakHyphen,
    /// Unknown (preserved)
    Unknown(RawXmlNode),
}

/// Run (w:r) of uniformly formatted content
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Run {
    /// Character style id
    pub style: Option<String>,
    /// Direct formatting
    pub format: RunFormat,
    /// Run content
    pub content: Vec<RunContent>,
    /// Attributes of `w:r`
    pub attrs: Vec<(String, String)>,
}

impl Run {
    /// Run holding plain text
    pub fn new(text: impl Into<String>) -> Self {
        Run {
            content: vec![RunContent::Text(text.into())],
            ..Default::default()
        }
    }

    /// Visible text of the run
    pub fn text(&self) -> String {
        let mut text = String::new();
        for content in &self.content {
            match content {
                RunContent::Text(t) => text.push_str(t),
                RunContent::Tab => text.push('\t'),
                RunContent::Break(_) | RunContent::CarriageReturn => text.push('\n'),
                RunContent::NoBreakHyphen => text.push('-'),
                RunContent::SoftHyphen | RunContent::Unknown(_) => {}
            }
        }
        text
    }

    /// Replace the content with plain text
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.content = vec![RunContent::Text(text.into())];
    }
}

/// Table (w:tbl)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    /// Table style id
    pub style: Option<String>,
    /// Direct table formatting
    pub format: TableFormat,
    /// Grid column widths in twips (w:tblGrid)
    pub grid: Vec<i32>,
}

/// Table row (w:tr)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    /// Direct row formatting
    pub format: RowFormat,
    /// Attributes of `w:tr`
    pub attrs: Vec<(String, String)>,
}

/// Table cell (w:tc)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cell {
    /// Direct cell formatting
    pub format: CellFormat,
}

/// One of the three field characters (w:fldChar)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldChar {
    /// Formatting of the run holding the field character
    pub format: RunFormat,
    /// Attributes of `w:fldChar` other than the type (dirty, fldLock)
    pub attrs: Vec<(String, String)>,
    /// Children of `w:fldChar` (form field data)
    pub children: Vec<RawXmlNode>,
}

/// Type of a structured document tag
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SdtType {
    PlainText,
    #[default]
    RichText,
    Checkbox,
    Date,
    DropDownList,
    ComboBox,
    RepeatingSection,
    RepeatingSectionItem,
    Group,
    /// Another control type, kept by its element name
    Unknown(String),
}

/// Entry of a drop-down list or combo box
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListItem {
    pub display_text: String,
    pub value: String,
}

/// Binding of an SDT to a node in a custom XML part
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XmlMapping {
    /// Store item id of the custom XML part
    pub store_item_id: String,
    /// Absolute XPath into the part
    pub xpath: String,
    /// Namespace prefix declarations used by the XPath
    pub prefix_mappings: Option<String>,
}

/// Structured document tag (w:sdt)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sdt {
    pub sdt_type: SdtType,
    /// Numeric id (w:id)
    pub id: Option<i64>,
    pub tag: Option<String>,
    pub alias: Option<String>,
    /// Checkbox state
    pub checked: Option<bool>,
    /// Date display format
    pub date_format: Option<String>,
    /// Date value (w:fullDate)
    pub full_date: Option<String>,
    /// Drop-down and combo box entries
    pub list_items: Vec<ListItem>,
    pub xml_mapping: Option<XmlMapping>,
    /// Attributes of the type element
    pub type_attrs: Vec<(String, String)>,
    /// Unrecognized children of the type element
    pub type_extra: Vec<RawXmlNode>,
    /// Unrecognized children of w:sdtPr
    pub properties: Vec<RawXmlNode>,
    /// w:sdtEndPr, kept verbatim
    pub end_properties: Option<RawXmlElement>,
}

impl Sdt {
    /// SDT of a given type
    pub fn new(sdt_type: SdtType) -> Self {
        Sdt {
            sdt_type,
            ..Default::default()
        }
    }
}

/// Drawing or VML picture inside a run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Shape {
    /// Formatting of the run holding the shape
    pub format: RunFormat,
    /// The w:drawing or w:pict element, kept verbatim
    pub xml: Option<RawXmlElement>,
}

fn collect_rel_ids(element: &RawXmlElement, out: &mut Vec<String>) {
    for (k, v) in &element.attributes {
        if is_rel_attr(k) && !out.contains(v) {
            out.push(v.clone());
        }
    }
    for child in element.elements() {
        collect_rel_ids(child, out);
    }
}

/// `r:embed`, `r:id`, `r:link` and friends
fn is_rel_attr(name: &str) -> bool {
    matches!(name, "r:embed" | "r:id" | "r:link" | "r:pict" | "r:dm" | "r:lo" | "r:qs" | "r:cs")
}

/// Comment anchored at a position in a paragraph
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Comment {
    /// Comment id (w:id), unique within a document
    pub id: String,
    pub author: String,
    pub initials: Option<String>,
    pub date: Option<DateTime<Utc>>,
    /// Formatting of the reference run
    pub reference_format: RunFormat,
    /// Character style of the reference run
    pub reference_style: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn drawing(embed: &str) -> RawXmlElement {
        RawXmlElement::new("w:drawing").with_child(
            RawXmlElement::new("wp:inline")
                .with_child(RawXmlElement::new("a:blip").with_attr("r:embed", embed)),
        )
    }

    #[test]
    fn test_relationship_ids_in_shape_and_foreign() {
        let mut shape = NodeData::Shape(Shape {
            xml: Some(drawing("rId9")),
            ..Default::default()
        });
        assert_eq!(shape.relationship_ids(), vec!["rId9".to_string()]);

        let link = RawXmlElement::new("w:hyperlink").with_attr("r:id", "rId8");
        let mut foreign = NodeData::Foreign(RawXmlNode::Element(link));
        assert_eq!(foreign.relationship_ids(), vec!["rId8".to_string()]);
        assert!(NodeData::Body.relationship_ids().is_empty());
    }

    #[test]
    fn test_rename_relationship_ids() {
        let mut shape = NodeData::Shape(Shape {
            xml: Some(drawing("rId9")),
            ..Default::default()
        });
        let renames = HashMap::from([("rId9".to_string(), "rId4".to_string())]);
        shape.rename_relationship_ids(&renames);
        assert_eq!(shape.relationship_ids(), vec!["rId4".to_string()]);
    }
}
