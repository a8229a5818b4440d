//! Formatting property containers (`w:rPr`, `w:pPr`, `w:tblPr`, `w:trPr`,
//! `w:tcPr`, `w:sdtPr`)
//!
//! A container is read whole into a [`RawXmlElement`] and interpreted child
//! by child. Children and attributes without a field stay in the format's
//! `unknown` list. On write, generated and preserved children are merged
//! back in schema order, and a preserved element named like a generated one
//! contributes its leftover attributes.

use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::events::BytesStart;

use crate::format::{
    CellFormat, CellMerge, NumberingRef, ParagraphFormat, RowFormat, RunFormat, TableFormat,
    TableLook,
};
use crate::node::{ListItem, Sdt, SdtType, XmlMapping};
use crate::revision::RevisionKind;
use crate::xml::{collect_attrs, RawXmlElement, RawXmlNode};

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Parse a `w:date` value
pub(crate) fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|n| n.and_utc())
        })
}

/// Format a timestamp for `w:date`
pub(crate) fn format_date(date: &DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Author and timestamp of a revision element
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Attribution {
    pub author: String,
    pub date: Option<DateTime<Utc>>,
}

impl Attribution {
    pub fn new(author: impl Into<String>, date: Option<DateTime<Utc>>) -> Self {
        Attribution {
            author: author.into(),
            date,
        }
    }

    pub fn from_attrs(attrs: &[(String, String)]) -> Self {
        let find = |local: &str| {
            attrs
                .iter()
                .find(|(k, _)| local_name(k) == local)
                .map(|(_, v)| v.as_str())
        };
        Attribution {
            author: find("author").unwrap_or_default().to_string(),
            date: find("date").and_then(parse_date),
        }
    }

    pub fn from_start(e: &BytesStart) -> Self {
        Self::from_attrs(&collect_attrs(e))
    }

    /// Revision element (`w:ins`, `w:rPrChange`, ...) carrying this attribution
    pub fn element(&self, name: &str, id: u32) -> RawXmlElement {
        let mut e = RawXmlElement::new(name)
            .with_attr("w:id", id.to_string())
            .with_attr("w:author", self.author.clone());
        if let Some(date) = &self.date {
            e = e.with_attr("w:date", format_date(date));
        }
        e.self_closing = true;
        e
    }
}

/// Revision kind of a `w:ins`/`w:del`/`w:moveFrom`/`w:moveTo` element
pub(crate) fn revision_kind_for(local: &str) -> Option<RevisionKind> {
    match local {
        "ins" => Some(RevisionKind::Insertion),
        "del" => Some(RevisionKind::Deletion),
        "moveFrom" => Some(RevisionKind::MoveFrom),
        "moveTo" => Some(RevisionKind::MoveTo),
        _ => None,
    }
}

/// Element name of a content revision; format changes have none
pub(crate) fn revision_element_name(kind: &RevisionKind) -> Option<&'static str> {
    match kind {
        RevisionKind::Insertion => Some("w:ins"),
        RevisionKind::Deletion => Some("w:del"),
        RevisionKind::MoveFrom => Some("w:moveFrom"),
        RevisionKind::MoveTo => Some("w:moveTo"),
        RevisionKind::FormatChange(_) => None,
    }
}

// === Attribute helpers ===

pub(crate) fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

pub(crate) fn attr<'a>(e: &'a RawXmlElement, local: &str) -> Option<&'a str> {
    e.attributes
        .iter()
        .find(|(k, _)| local_name(k) == local)
        .map(|(_, v)| v.as_str())
}

pub(crate) fn val(e: &RawXmlElement) -> Option<&str> {
    attr(e, "val")
}

fn parsed<T: std::str::FromStr>(e: &RawXmlElement, local: &str) -> Option<T> {
    attr(e, local).and_then(|v| v.trim().parse().ok())
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(String::from)
}

fn toggle(e: &RawXmlElement) -> bool {
    !matches!(val(e), Some("0" | "false" | "off"))
}

fn significant(node: &RawXmlNode) -> bool {
    !matches!(node, RawXmlNode::Text(t) if t.trim().is_empty())
}

/// What is left of `e` once the `known` attributes are taken out
fn push_leftover(unknown: &mut Vec<RawXmlNode>, e: &RawXmlElement, known: &[&str]) {
    let attributes: Vec<(String, String)> = e
        .attributes
        .iter()
        .filter(|(k, _)| !known.contains(&local_name(k)))
        .cloned()
        .collect();
    if attributes.is_empty() && e.children.is_empty() {
        return;
    }
    unknown.push(RawXmlNode::Element(RawXmlElement {
        name: e.name.clone(),
        attributes,
        children: e.children.clone(),
        self_closing: e.self_closing,
    }));
}

pub(crate) fn empty(name: &str) -> RawXmlElement {
    let mut e = RawXmlElement::new(name);
    e.self_closing = true;
    e
}

pub(crate) fn val_element(name: &str, value: impl Into<String>) -> RawXmlElement {
    empty(name).with_attr("w:val", value)
}

fn toggle_element(name: &str, on: bool) -> RawXmlElement {
    let e = empty(name);
    if on {
        e
    } else {
        e.with_attr("w:val", "0")
    }
}

/// Container holding generated and preserved children in schema order
pub(crate) fn assemble(
    name: &str,
    order: &[&str],
    mut generated: Vec<RawXmlElement>,
    unknown: &[RawXmlNode],
) -> Option<RawXmlElement> {
    let rank = |local: &str| order.iter().position(|o| *o == local).unwrap_or(order.len());
    let mut children: Vec<(usize, RawXmlNode)> = Vec::new();
    for node in unknown {
        match node {
            RawXmlNode::Element(e) => {
                if let Some(g) = generated.iter_mut().find(|g| g.name == e.name) {
                    for (k, v) in &e.attributes {
                        if g.attr(k).is_none() {
                            g.attributes.push((k.clone(), v.clone()));
                        }
                    }
                    g.children.extend(e.children.iter().cloned());
                    continue;
                }
                children.push((rank(e.local_name()), node.clone()));
            }
            other => children.push((order.len() + 1, other.clone())),
        }
    }
    children.extend(
        generated
            .into_iter()
            .map(|g| (rank(g.local_name()), RawXmlNode::Element(g))),
    );
    if children.is_empty() {
        return None;
    }
    children.sort_by_key(|(r, _)| *r);
    let mut container = RawXmlElement::new(name);
    container.children = children.into_iter().map(|(_, n)| n).collect();
    Some(container)
}

// === w:rPr ===

const RPR_ORDER: &[&str] = &[
    "ins", "del", "moveFrom", "moveTo", "rStyle", "rFonts", "b", "bCs", "i", "iCs", "caps",
    "smallCaps", "strike", "dstrike", "outline", "shadow", "emboss", "imprint", "noProof",
    "snapToGrid", "vanish", "webHidden", "color", "spacing", "w", "kern", "position", "sz",
    "szCs", "highlight", "u", "effect", "bdr", "shd", "fitText", "vertAlign", "rtl", "cs", "em",
    "lang", "eastAsianLayout", "specVanish", "oMath", "rPrChange",
];

/// Interpreted `w:rPr`
#[derive(Clone, Debug, Default)]
pub(crate) struct RunProps {
    pub style: Option<String>,
    pub format: RunFormat,
    /// Paragraph mark revisions (`w:ins`, `w:del`, ...)
    pub marks: Vec<(RevisionKind, Attribution)>,
    /// Previous formatting (`w:rPrChange`)
    pub change: Option<(Attribution, Option<String>, RunFormat)>,
}

/// Interpret a `w:rPr`; with `track_changes` off, `w:rPrChange` is kept raw
pub(crate) fn read_run_props(rpr: &RawXmlElement, track_changes: bool) -> RunProps {
    let mut props = RunProps::default();
    for node in &rpr.children {
        let RawXmlNode::Element(e) = node else {
            if significant(node) {
                props.format.unknown.push(node.clone());
            }
            continue;
        };
        let f = &mut props.format;
        match e.local_name() {
            "rStyle" => props.style = owned(val(e)),
            "rFonts" => {
                f.font = owned(attr(e, "ascii"));
                f.font_east_asia = owned(attr(e, "eastAsia"));
                push_leftover(&mut f.unknown, e, &["ascii", "eastAsia"]);
            }
            "b" => f.bold = Some(toggle(e)),
            "i" => f.italic = Some(toggle(e)),
            "caps" => f.caps = Some(toggle(e)),
            "smallCaps" => f.small_caps = Some(toggle(e)),
            "strike" => f.strike = Some(toggle(e)),
            "dstrike" => f.double_strike = Some(toggle(e)),
            "vanish" => f.hidden = Some(toggle(e)),
            "color" => {
                f.color = owned(val(e));
                push_leftover(&mut f.unknown, e, &["val"]);
            }
            "sz" => f.size = parsed(e, "val"),
            "highlight" => f.highlight = owned(val(e)),
            "u" => {
                f.underline = Some(val(e).unwrap_or("single").to_string());
                push_leftover(&mut f.unknown, e, &["val"]);
            }
            "vertAlign" => f.vertical_align = owned(val(e)),
            "rPrChange" if track_changes => {
                let previous = e
                    .elements()
                    .find(|c| c.local_name() == "rPr")
                    .map(|c| read_run_props(c, false))
                    .unwrap_or_default();
                props.change = Some((
                    Attribution::from_attrs(&e.attributes),
                    previous.style,
                    previous.format,
                ));
            }
            local => match revision_kind_for(local) {
                Some(kind) => props
                    .marks
                    .push((kind, Attribution::from_attrs(&e.attributes))),
                None => f.unknown.push(node.clone()),
            },
        }
    }
    props
}

/// Build a `w:rPr`; `extra` holds revision elements. `None` when empty.
pub(crate) fn run_props_element(
    style: Option<&str>,
    format: &RunFormat,
    extra: Vec<RawXmlElement>,
) -> Option<RawXmlElement> {
    let mut out = extra;
    if let Some(style) = style {
        out.push(val_element("w:rStyle", style));
    }
    if format.font.is_some() || format.font_east_asia.is_some() {
        let mut e = empty("w:rFonts");
        if let Some(font) = &format.font {
            e = e.with_attr("w:ascii", font.clone());
        }
        if let Some(font) = &format.font_east_asia {
            e = e.with_attr("w:eastAsia", font.clone());
        }
        out.push(e);
    }
    for (name, value) in [
        ("w:b", format.bold),
        ("w:i", format.italic),
        ("w:caps", format.caps),
        ("w:smallCaps", format.small_caps),
        ("w:strike", format.strike),
        ("w:dstrike", format.double_strike),
        ("w:vanish", format.hidden),
    ] {
        if let Some(on) = value {
            out.push(toggle_element(name, on));
        }
    }
    if let Some(color) = &format.color {
        out.push(val_element("w:color", color.clone()));
    }
    if let Some(size) = format.size {
        out.push(val_element("w:sz", size.to_string()));
    }
    if let Some(highlight) = &format.highlight {
        out.push(val_element("w:highlight", highlight.clone()));
    }
    if let Some(underline) = &format.underline {
        out.push(val_element("w:u", underline.clone()));
    }
    if let Some(align) = &format.vertical_align {
        out.push(val_element("w:vertAlign", align.clone()));
    }
    assemble("w:rPr", RPR_ORDER, out, &format.unknown)
}

/// `w:rPrChange` holding the previous run formatting
pub(crate) fn run_change_element(
    who: &Attribution,
    id: u32,
    style: Option<&str>,
    format: &RunFormat,
) -> RawXmlElement {
    let mut change = who.element("w:rPrChange", id);
    change.self_closing = false;
    let previous = run_props_element(style, format, Vec::new()).unwrap_or_else(|| empty("w:rPr"));
    change.with_child(previous)
}

// === w:pPr ===

const PPR_ORDER: &[&str] = &[
    "pStyle",
    "keepNext",
    "keepLines",
    "pageBreakBefore",
    "framePr",
    "widowControl",
    "numPr",
    "suppressLineNumbers",
    "pBdr",
    "shd",
    "tabs",
    "suppressAutoHyphens",
    "kinsoku",
    "wordWrap",
    "overflowPunct",
    "topLinePunct",
    "autoSpaceDE",
    "autoSpaceDN",
    "bidi",
    "adjustRightInd",
    "snapToGrid",
    "spacing",
    "ind",
    "contextualSpacing",
    "mirrorIndents",
    "suppressOverlap",
    "jc",
    "textDirection",
    "textAlignment",
    "textboxTightWrap",
    "outlineLvl",
    "divId",
    "cnfStyle",
    "rPr",
    "sectPr",
    "pPrChange",
];

/// Interpreted `w:pPr`
#[derive(Clone, Debug, Default)]
pub(crate) struct ParagraphProps {
    pub style: Option<String>,
    pub format: ParagraphFormat,
    /// Paragraph mark properties
    pub mark: RunProps,
    /// Section break carried by the paragraph
    pub section: Option<RawXmlElement>,
    /// Previous formatting (`w:pPrChange`)
    pub change: Option<(Attribution, Option<String>, ParagraphFormat)>,
}

/// Interpret a `w:pPr`
pub(crate) fn read_paragraph_props(ppr: &RawXmlElement, track_changes: bool) -> ParagraphProps {
    let mut props = ParagraphProps::default();
    for node in &ppr.children {
        let RawXmlNode::Element(e) = node else {
            if significant(node) {
                props.format.unknown.push(node.clone());
            }
            continue;
        };
        let f = &mut props.format;
        match e.local_name() {
            "pStyle" => props.style = owned(val(e)),
            "keepNext" => f.keep_next = Some(toggle(e)),
            "keepLines" => f.keep_lines = Some(toggle(e)),
            "pageBreakBefore" => f.page_break_before = Some(toggle(e)),
            "numPr" => {
                let child = |local: &str| e.elements().find(|c| c.local_name() == local);
                let level = child("ilvl").and_then(|c| parsed(c, "val")).unwrap_or(0);
                match child("numId").and_then(|c| parsed::<u32>(c, "val")) {
                    Some(num_id) => f.numbering = Some(NumberingRef::new(num_id, level)),
                    None => f.unknown.push(node.clone()),
                }
            }
            "spacing" => {
                f.spacing_before = parsed(e, "before");
                f.spacing_after = parsed(e, "after");
                f.spacing_line = parsed(e, "line");
                f.line_rule = owned(attr(e, "lineRule"));
                push_leftover(
                    &mut f.unknown,
                    e,
                    &["before", "after", "line", "lineRule"],
                );
            }
            "ind" => {
                f.indent_left = parsed(e, "left").or_else(|| parsed(e, "start"));
                f.indent_right = parsed(e, "right").or_else(|| parsed(e, "end"));
                f.indent_first_line = parsed(e, "firstLine");
                f.indent_hanging = parsed(e, "hanging");
                push_leftover(
                    &mut f.unknown,
                    e,
                    &["left", "start", "right", "end", "firstLine", "hanging"],
                );
            }
            "jc" => f.justification = owned(val(e)),
            "outlineLvl" => f.outline_level = parsed(e, "val"),
            "rPr" => {
                let mut mark = read_run_props(e, false);
                if let Some(style) = mark.style.take() {
                    mark.format
                        .unknown
                        .insert(0, RawXmlNode::Element(val_element("w:rStyle", style)));
                }
                props.mark = mark;
            }
            "sectPr" => props.section = Some(e.clone()),
            "pPrChange" if track_changes => {
                let previous = e
                    .elements()
                    .find(|c| c.local_name() == "pPr")
                    .map(|c| read_paragraph_props(c, false))
                    .unwrap_or_default();
                props.change = Some((
                    Attribution::from_attrs(&e.attributes),
                    previous.style,
                    previous.format,
                ));
            }
            _ => f.unknown.push(node.clone()),
        }
    }
    props
}

/// Build a `w:pPr`; `extra` holds the mark `w:rPr`, `w:sectPr` and
/// `w:pPrChange`. `None` when empty.
pub(crate) fn paragraph_props_element(
    style: Option<&str>,
    format: &ParagraphFormat,
    extra: Vec<RawXmlElement>,
) -> Option<RawXmlElement> {
    let mut out = extra;
    if let Some(style) = style {
        out.push(val_element("w:pStyle", style));
    }
    for (name, value) in [
        ("w:keepNext", format.keep_next),
        ("w:keepLines", format.keep_lines),
        ("w:pageBreakBefore", format.page_break_before),
    ] {
        if let Some(on) = value {
            out.push(toggle_element(name, on));
        }
    }
    if let Some(numbering) = &format.numbering {
        out.push(
            RawXmlElement::new("w:numPr")
                .with_child(val_element("w:ilvl", numbering.level.to_string()))
                .with_child(val_element("w:numId", numbering.num_id.to_string())),
        );
    }
    if format.spacing_before.is_some()
        || format.spacing_after.is_some()
        || format.spacing_line.is_some()
        || format.line_rule.is_some()
    {
        let mut e = empty("w:spacing");
        if let Some(v) = format.spacing_before {
            e = e.with_attr("w:before", v.to_string());
        }
        if let Some(v) = format.spacing_after {
            e = e.with_attr("w:after", v.to_string());
        }
        if let Some(v) = format.spacing_line {
            e = e.with_attr("w:line", v.to_string());
        }
        if let Some(v) = &format.line_rule {
            e = e.with_attr("w:lineRule", v.clone());
        }
        out.push(e);
    }
    if format.indent_left.is_some()
        || format.indent_right.is_some()
        || format.indent_first_line.is_some()
        || format.indent_hanging.is_some()
    {
        let mut e = empty("w:ind");
        if let Some(v) = format.indent_left {
            e = e.with_attr("w:left", v.to_string());
        }
        if let Some(v) = format.indent_right {
            e = e.with_attr("w:right", v.to_string());
        }
        if let Some(v) = format.indent_first_line {
            e = e.with_attr("w:firstLine", v.to_string());
        }
        if let Some(v) = format.indent_hanging {
            e = e.with_attr("w:hanging", v.to_string());
        }
        out.push(e);
    }
    if let Some(jc) = &format.justification {
        out.push(val_element("w:jc", jc.clone()));
    }
    if let Some(level) = format.outline_level {
        out.push(val_element("w:outlineLvl", level.to_string()));
    }
    assemble("w:pPr", PPR_ORDER, out, &format.unknown)
}

/// `w:pPrChange` holding the previous paragraph formatting
pub(crate) fn paragraph_change_element(
    who: &Attribution,
    id: u32,
    style: Option<&str>,
    format: &ParagraphFormat,
) -> RawXmlElement {
    let mut change = who.element("w:pPrChange", id);
    change.self_closing = false;
    let previous =
        paragraph_props_element(style, format, Vec::new()).unwrap_or_else(|| empty("w:pPr"));
    change.with_child(previous)
}

// === w:tblPr ===

const TBLPR_ORDER: &[&str] = &[
    "tblStyle",
    "tblpPr",
    "tblOverlap",
    "bidiVisual",
    "tblStyleRowBandSize",
    "tblStyleColBandSize",
    "tblW",
    "jc",
    "tblCellSpacing",
    "tblInd",
    "tblBorders",
    "shd",
    "tblLayout",
    "tblCellMar",
    "tblLook",
    "tblCaption",
    "tblDescription",
    "tblPrChange",
];

const LOOK_FLAGS: [&str; 6] = [
    "firstRow",
    "lastRow",
    "firstColumn",
    "lastColumn",
    "noHBand",
    "noVBand",
];

/// Width in twips when the element measures in twips (`w:type="dxa"`)
fn twips_width(e: &RawXmlElement) -> Option<i32> {
    match attr(e, "type") {
        None | Some("dxa") => parsed(e, "w"),
        Some(_) => None,
    }
}

fn read_look(e: &RawXmlElement) -> TableLook {
    if let Some(bits) = val(e).and_then(|v| u16::from_str_radix(v, 16).ok()) {
        return TableLook::from_bits(bits);
    }
    let flag = |name: &str| matches!(attr(e, name), Some("1" | "true" | "on"));
    TableLook {
        first_row: flag("firstRow"),
        last_row: flag("lastRow"),
        first_column: flag("firstColumn"),
        last_column: flag("lastColumn"),
        no_horizontal_band: flag("noHBand"),
        no_vertical_band: flag("noVBand"),
    }
}

/// Interpret a `w:tblPr` into the table style id and formatting
pub(crate) fn read_table_props(tblpr: &RawXmlElement) -> (Option<String>, TableFormat) {
    let mut style = None;
    let mut f = TableFormat::default();
    for node in &tblpr.children {
        let RawXmlNode::Element(e) = node else {
            if significant(node) {
                f.unknown.push(node.clone());
            }
            continue;
        };
        match e.local_name() {
            "tblStyle" => style = owned(val(e)),
            "tblW" => match twips_width(e) {
                Some(w) => {
                    f.width = Some(w);
                    push_leftover(&mut f.unknown, e, &["w", "type"]);
                }
                None => f.unknown.push(node.clone()),
            },
            "jc" => f.justification = owned(val(e)),
            "tblStyleRowBandSize" => f.row_band_size = parsed(e, "val"),
            "tblStyleColBandSize" => f.column_band_size = parsed(e, "val"),
            "tblLook" => f.look = Some(read_look(e)),
            _ => f.unknown.push(node.clone()),
        }
    }
    (style, f)
}

/// Build a `w:tblPr`. Individual look flags are written for ISO output only.
pub(crate) fn table_props_element(
    style: Option<&str>,
    format: &TableFormat,
    extensions: bool,
) -> Option<RawXmlElement> {
    let mut out = Vec::new();
    if let Some(style) = style {
        out.push(val_element("w:tblStyle", style));
    }
    if let Some(size) = format.row_band_size {
        out.push(val_element("w:tblStyleRowBandSize", size.to_string()));
    }
    if let Some(size) = format.column_band_size {
        out.push(val_element("w:tblStyleColBandSize", size.to_string()));
    }
    if let Some(width) = format.width {
        out.push(
            empty("w:tblW")
                .with_attr("w:w", width.to_string())
                .with_attr("w:type", "dxa"),
        );
    }
    if let Some(jc) = &format.justification {
        out.push(val_element("w:jc", jc.clone()));
    }
    if let Some(look) = &format.look {
        let mut e = val_element("w:tblLook", format!("{:04X}", look.bits()));
        if extensions {
            let flags = [
                look.first_row,
                look.last_row,
                look.first_column,
                look.last_column,
                look.no_horizontal_band,
                look.no_vertical_band,
            ];
            for (name, on) in LOOK_FLAGS.iter().zip(flags) {
                e = e.with_attr(format!("w:{}", name), if on { "1" } else { "0" });
            }
        }
        out.push(e);
    }
    assemble("w:tblPr", TBLPR_ORDER, out, &format.unknown)
}

// === w:trPr ===

const TRPR_ORDER: &[&str] = &[
    "cnfStyle",
    "divId",
    "gridBefore",
    "gridAfter",
    "wBefore",
    "wAfter",
    "cantSplit",
    "trHeight",
    "tblHeader",
    "tblCellSpacing",
    "jc",
    "hidden",
    "ins",
    "del",
    "trPrChange",
];

/// Interpreted `w:trPr`
#[derive(Clone, Debug, Default)]
pub(crate) struct RowProps {
    pub format: RowFormat,
    /// Row insertion or deletion
    pub marks: Vec<(RevisionKind, Attribution)>,
}

pub(crate) fn read_row_props(trpr: &RawXmlElement) -> RowProps {
    let mut props = RowProps::default();
    for node in &trpr.children {
        let RawXmlNode::Element(e) = node else {
            if significant(node) {
                props.format.unknown.push(node.clone());
            }
            continue;
        };
        let f = &mut props.format;
        match e.local_name() {
            "trHeight" => {
                f.height = parsed(e, "val");
                f.height_rule = owned(attr(e, "hRule"));
                push_leftover(&mut f.unknown, e, &["val", "hRule"]);
            }
            "tblHeader" => f.header = Some(toggle(e)),
            "cantSplit" => f.cant_split = Some(toggle(e)),
            local @ ("ins" | "del") => {
                if let Some(kind) = revision_kind_for(local) {
                    props
                        .marks
                        .push((kind, Attribution::from_attrs(&e.attributes)));
                }
            }
            _ => f.unknown.push(node.clone()),
        }
    }
    props
}

/// Build a `w:trPr`; `extra` holds row revision elements
pub(crate) fn row_props_element(
    format: &RowFormat,
    extra: Vec<RawXmlElement>,
) -> Option<RawXmlElement> {
    let mut out = extra;
    if let Some(on) = format.cant_split {
        out.push(toggle_element("w:cantSplit", on));
    }
    if format.height.is_some() || format.height_rule.is_some() {
        let mut e = empty("w:trHeight");
        if let Some(h) = format.height {
            e = e.with_attr("w:val", h.to_string());
        }
        if let Some(rule) = &format.height_rule {
            e = e.with_attr("w:hRule", rule.clone());
        }
        out.push(e);
    }
    if let Some(on) = format.header {
        out.push(toggle_element("w:tblHeader", on));
    }
    assemble("w:trPr", TRPR_ORDER, out, &format.unknown)
}

// === w:tcPr ===

const TCPR_ORDER: &[&str] = &[
    "cnfStyle",
    "tcW",
    "gridSpan",
    "hMerge",
    "vMerge",
    "tcBorders",
    "shd",
    "noWrap",
    "tcMar",
    "textDirection",
    "tcFitText",
    "vAlign",
    "hideMark",
    "headers",
    "cellIns",
    "cellDel",
    "cellMerge",
    "tcPrChange",
];

fn read_merge(e: &RawXmlElement) -> CellMerge {
    match val(e) {
        Some("restart") => CellMerge::First,
        _ => CellMerge::Previous,
    }
}

pub(crate) fn read_cell_props(tcpr: &RawXmlElement) -> CellFormat {
    let mut f = CellFormat::default();
    for node in &tcpr.children {
        let RawXmlNode::Element(e) = node else {
            if significant(node) {
                f.unknown.push(node.clone());
            }
            continue;
        };
        match e.local_name() {
            "tcW" => match twips_width(e) {
                Some(w) => {
                    f.width = Some(w);
                    push_leftover(&mut f.unknown, e, &["w", "type"]);
                }
                None => f.unknown.push(node.clone()),
            },
            "gridSpan" => f.grid_span = parsed(e, "val"),
            "hMerge" => f.horizontal_merge = read_merge(e),
            "vMerge" => f.vertical_merge = read_merge(e),
            "shd" => {
                f.shading = owned(attr(e, "fill"));
                push_leftover(&mut f.unknown, e, &["fill"]);
            }
            "vAlign" => f.vertical_align = owned(val(e)),
            _ => f.unknown.push(node.clone()),
        }
    }
    f
}

fn merge_element(name: &str, merge: CellMerge) -> Option<RawXmlElement> {
    match merge {
        CellMerge::None => None,
        CellMerge::First => Some(val_element(name, "restart")),
        CellMerge::Previous => Some(empty(name)),
    }
}

pub(crate) fn cell_props_element(format: &CellFormat) -> Option<RawXmlElement> {
    let mut out = Vec::new();
    if let Some(width) = format.width {
        out.push(
            empty("w:tcW")
                .with_attr("w:w", width.to_string())
                .with_attr("w:type", "dxa"),
        );
    }
    if let Some(span) = format.grid_span {
        out.push(val_element("w:gridSpan", span.to_string()));
    }
    out.extend(merge_element("w:hMerge", format.horizontal_merge));
    out.extend(merge_element("w:vMerge", format.vertical_merge));
    if let Some(fill) = &format.shading {
        out.push(empty("w:shd").with_attr("w:fill", fill.clone()));
    }
    if let Some(align) = &format.vertical_align {
        out.push(val_element("w:vAlign", align.clone()));
    }
    let mut tcpr = assemble("w:tcPr", TCPR_ORDER, out, &format.unknown)?;
    // w:val is required on w:shd
    tcpr.visit_mut(&mut |e| {
        if e.local_name() == "shd" && attr(e, "val").is_none() {
            e.attributes.insert(0, ("w:val".to_string(), "clear".to_string()));
        }
    });
    Some(tcpr)
}

// === w:sdtPr ===

const SDTPR_ORDER: &[&str] = &[
    "rPr",
    "alias",
    "tag",
    "id",
    "lock",
    "placeholder",
    "temporary",
    "showingPlcHdr",
    "dataBinding",
    "label",
    "tabIndex",
];

fn sdt_type_for(name: &str) -> Option<SdtType> {
    let ty = match local_name(name) {
        "text" => SdtType::PlainText,
        "richText" => SdtType::RichText,
        "checkbox" => SdtType::Checkbox,
        "date" => SdtType::Date,
        "dropDownList" => SdtType::DropDownList,
        "comboBox" => SdtType::ComboBox,
        "repeatingSection" => SdtType::RepeatingSection,
        "repeatingSectionItem" => SdtType::RepeatingSectionItem,
        "group" => SdtType::Group,
        "docPartObj" | "docPartList" | "picture" | "equation" | "citation" | "bibliography" => {
            SdtType::Unknown(name.to_string())
        }
        _ => return None,
    };
    Some(ty)
}

fn sdt_type_name(ty: &SdtType) -> Option<&str> {
    match ty {
        SdtType::PlainText => Some("w:text"),
        SdtType::RichText => None,
        SdtType::Checkbox => Some("w14:checkbox"),
        SdtType::Date => Some("w:date"),
        SdtType::DropDownList => Some("w:dropDownList"),
        SdtType::ComboBox => Some("w:comboBox"),
        SdtType::RepeatingSection => Some("w15:repeatingSection"),
        SdtType::RepeatingSectionItem => Some("w15:repeatingSectionItem"),
        SdtType::Group => Some("w:group"),
        SdtType::Unknown(name) => Some(name.as_str()),
    }
}

/// Interpret a `w:sdtPr`
pub(crate) fn read_sdt_props(sdtpr: &RawXmlElement) -> Sdt {
    let mut sdt = Sdt::default();
    for node in &sdtpr.children {
        let RawXmlNode::Element(e) = node else {
            if significant(node) {
                sdt.properties.push(node.clone());
            }
            continue;
        };
        match e.local_name() {
            "id" => sdt.id = parsed(e, "val"),
            "tag" => sdt.tag = owned(val(e)),
            "alias" => sdt.alias = owned(val(e)),
            "dataBinding" => {
                sdt.xml_mapping = Some(XmlMapping {
                    store_item_id: attr(e, "storeItemID").unwrap_or_default().to_string(),
                    xpath: attr(e, "xpath").unwrap_or_default().to_string(),
                    prefix_mappings: owned(attr(e, "prefixMappings")),
                })
            }
            _ => match sdt_type_for(&e.name) {
                // the default type; an explicit element is kept as written
                Some(SdtType::RichText) | None => sdt.properties.push(node.clone()),
                Some(ty) => read_sdt_type(&mut sdt, ty, e),
            },
        }
    }
    sdt
}

fn read_sdt_type(sdt: &mut Sdt, ty: SdtType, e: &RawXmlElement) {
    sdt.type_attrs = e.attributes.clone();
    for child in e.elements() {
        let known = match (&ty, child.local_name()) {
            (SdtType::Checkbox, "checked") => {
                sdt.checked = Some(toggle(child));
                true
            }
            (SdtType::Date, "dateFormat") => {
                sdt.date_format = owned(val(child));
                true
            }
            (SdtType::DropDownList | SdtType::ComboBox, "listItem") => {
                sdt.list_items.push(ListItem {
                    display_text: attr(child, "displayText").unwrap_or_default().to_string(),
                    value: attr(child, "value").unwrap_or_default().to_string(),
                });
                true
            }
            _ => false,
        };
        if !known {
            sdt.type_extra.push(RawXmlNode::Element(child.clone()));
        }
    }
    if ty == SdtType::Date {
        sdt.full_date = owned(attr(e, "fullDate"));
        sdt.type_attrs.retain(|(k, _)| local_name(k) != "fullDate");
    }
    sdt.sdt_type = ty;
}

/// Build a `w:sdtPr`
pub(crate) fn sdt_props_element(sdt: &Sdt) -> RawXmlElement {
    let mut out = Vec::new();
    if let Some(alias) = &sdt.alias {
        out.push(val_element("w:alias", alias.clone()));
    }
    if let Some(tag) = &sdt.tag {
        out.push(val_element("w:tag", tag.clone()));
    }
    if let Some(id) = sdt.id {
        out.push(val_element("w:id", id.to_string()));
    }
    if let Some(mapping) = &sdt.xml_mapping {
        let mut e = empty("w:dataBinding");
        if let Some(prefixes) = &mapping.prefix_mappings {
            e = e.with_attr("w:prefixMappings", prefixes.clone());
        }
        out.push(
            e.with_attr("w:xpath", mapping.xpath.clone())
                .with_attr("w:storeItemID", mapping.store_item_id.clone()),
        );
    }
    let properties: Vec<RawXmlNode> = sdt
        .properties
        .iter()
        .filter(|n| {
            sdt.sdt_type == SdtType::RichText
                || !matches!(n, RawXmlNode::Element(e) if e.local_name() == "richText")
        })
        .cloned()
        .collect();
    let mut sdtpr = assemble("w:sdtPr", SDTPR_ORDER, out, &properties)
        .unwrap_or_else(|| RawXmlElement::new("w:sdtPr"));
    if let Some(name) = sdt_type_name(&sdt.sdt_type) {
        let mut ty = empty(name);
        ty.attributes = sdt.type_attrs.clone();
        match &sdt.sdt_type {
            SdtType::Checkbox => {
                if let Some(checked) = sdt.checked {
                    ty = ty.with_child(val_element("w14:checked", if checked { "1" } else { "0" }));
                }
            }
            SdtType::Date => {
                if let Some(date) = &sdt.full_date {
                    ty.attributes.push(("w:fullDate".into(), date.clone()));
                }
                if let Some(format) = &sdt.date_format {
                    ty = ty.with_child(val_element("w:dateFormat", format.clone()));
                }
            }
            SdtType::DropDownList | SdtType::ComboBox => {
                for item in &sdt.list_items {
                    ty = ty.with_child(
                        empty("w:listItem")
                            .with_attr("w:displayText", item.display_text.clone())
                            .with_attr("w:value", item.value.clone()),
                    );
                }
            }
            _ => {}
        }
        ty.children.extend(sdt.type_extra.iter().cloned());
        sdtpr = sdtpr.with_child(ty);
    }
    sdtpr
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quick_xml::events::Event;
    use quick_xml::{Reader, Writer};

    fn parse(xml: &str) -> RawXmlElement {
        let mut reader = Reader::from_str(xml);
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf).unwrap() {
                Event::Start(e) => return RawXmlElement::from_reader(&mut reader, &e).unwrap(),
                Event::Empty(e) => return RawXmlElement::from_empty(&e),
                Event::Eof => panic!("no element"),
                _ => {}
            }
            buf.clear();
        }
    }

    fn render(e: &RawXmlElement) -> String {
        let mut writer = Writer::new(Vec::new());
        e.write_to(&mut writer).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn test_run_props_roundtrip_keeps_unknown_in_order() {
        let xml = r#"<w:rPr><w:rStyle w:val="Strong"/><w:rFonts w:ascii="Arial" w:hAnsi="Arial"/><w:b/><w:noProof/><w:sz w:val="28"/><w:lang w:val="en-US"/></w:rPr>"#;
        let props = read_run_props(&parse(xml), true);
        assert_eq!(props.style.as_deref(), Some("Strong"));
        assert_eq!(props.format.font.as_deref(), Some("Arial"));
        assert_eq!(props.format.bold, Some(true));
        assert_eq!(props.format.size, Some(28));

        let out = run_props_element(props.style.as_deref(), &props.format, Vec::new()).unwrap();
        assert_eq!(render(&out), xml);
    }

    #[test]
    fn test_paragraph_props_numbering_and_section() {
        let xml = r#"<w:pPr><w:pStyle w:val="List"/><w:numPr><w:ilvl w:val="1"/><w:numId w:val="3"/></w:numPr><w:spacing w:after="120" w:beforeAutospacing="1"/><w:rPr><w:ins w:id="1" w:author="A" w:date="2024-01-02T03:04:05Z"/></w:rPr><w:sectPr/></w:pPr>"#;
        let props = read_paragraph_props(&parse(xml), true);
        assert_eq!(props.format.numbering, Some(NumberingRef::new(3, 1)));
        assert_eq!(props.format.spacing_after, Some(120));
        assert!(props.section.is_some());
        assert_eq!(props.mark.marks.len(), 1);
        assert_eq!(props.mark.marks[0].1.author, "A");
        assert!(props.mark.marks[0].1.date.is_some());

        let out = paragraph_props_element(props.style.as_deref(), &props.format, Vec::new())
            .unwrap();
        assert_eq!(
            render(&out),
            r#"<w:pPr><w:pStyle w:val="List"/><w:numPr><w:ilvl w:val="1"/><w:numId w:val="3"/></w:numPr><w:spacing w:after="120" w:beforeAutospacing="1"/></w:pPr>"#
        );
    }

    #[test]
    fn test_cell_props_merge_flags_and_shading() {
        let xml = r#"<w:tcPr><w:tcW w:w="2000" w:type="dxa"/><w:vMerge w:val="restart"/><w:shd w:val="clear" w:color="auto" w:fill="FF0000"/></w:tcPr>"#;
        let format = read_cell_props(&parse(xml));
        assert_eq!(format.width, Some(2000));
        assert_eq!(format.vertical_merge, CellMerge::First);
        assert_eq!(format.shading.as_deref(), Some("FF0000"));
        assert_eq!(render(&cell_props_element(&format).unwrap()), xml.replace(
            r#"<w:shd w:val="clear" w:color="auto" w:fill="FF0000"/>"#,
            r#"<w:shd w:fill="FF0000" w:val="clear" w:color="auto"/>"#,
        ));

        let fresh = CellFormat::default().with_shading("00FF00");
        assert_eq!(
            render(&cell_props_element(&fresh).unwrap()),
            r#"<w:tcPr><w:shd w:val="clear" w:fill="00FF00"/></w:tcPr>"#
        );
    }

    #[test]
    fn test_table_look_both_forms() {
        let (style, format) =
            read_table_props(&parse(r#"<w:tblPr><w:tblStyle w:val="Grid"/><w:tblLook w:firstRow="1" w:noVBand="1"/></w:tblPr>"#));
        assert_eq!(style.as_deref(), Some("Grid"));
        let look = format.look.unwrap();
        assert!(look.first_row);
        assert!(look.no_vertical_band);

        let ecma = table_props_element(style.as_deref(), &format, false).unwrap();
        assert_eq!(
            render(&ecma),
            r#"<w:tblPr><w:tblStyle w:val="Grid"/><w:tblLook w:val="0420"/></w:tblPr>"#
        );
    }

    #[test]
    fn test_sdt_props() {
        let xml = r#"<w:sdtPr><w:alias w:val="Pick"/><w:id w:val="7"/><w:dataBinding w:xpath="/root[1]/a[1]" w:storeItemID="{X}"/><w:dropDownList><w:listItem w:displayText="One" w:value="1"/></w:dropDownList></w:sdtPr>"#;
        let sdt = read_sdt_props(&parse(xml));
        assert_eq!(sdt.sdt_type, SdtType::DropDownList);
        assert_eq!(sdt.id, Some(7));
        assert_eq!(sdt.list_items.len(), 1);
        assert_eq!(sdt.xml_mapping.as_ref().unwrap().store_item_id, "{X}");
        assert_eq!(render(&sdt_props_element(&sdt)), xml);
    }

    #[test]
    fn test_dates() {
        let date = parse_date("2024-05-06T07:08:09Z").unwrap();
        assert_eq!(format_date(&date), "2024-05-06T07:08:09Z");
        assert!(parse_date("2024-05-06T07:08:09").is_some());
        assert!(parse_date("yesterday").is_none());
    }
}
