//! Level definitions for numbering

use crate::error::Result;
use crate::xml::{
    collect_attrs, get_w_attr, get_w_val, is_extension_attr, parse_bool, write_val, RawXmlElement,
    RawXmlNode,
};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::io::BufRead;

use super::format::NumberFormat;

/// Level definition (w:lvl)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Level {
    /// Level index (0-8)
    pub ilvl: u8,
    /// Start value
    pub start: Option<u32>,
    /// Number format
    pub num_fmt: Option<NumberFormat>,
    /// Label template with zero-based placeholders (`%0.`, `%0.%1.`)
    pub level_text: Option<String>,
    /// Level justification
    pub lvl_jc: Option<String>,
    /// Render every referenced level as decimal (w:isLgl)
    pub is_legal: bool,
    /// Linked paragraph style (w:pStyle)
    pub paragraph_style: Option<String>,
    /// Paragraph properties for this level
    pub p_pr: Option<LevelParagraphProperties>,
    /// Run properties for this level
    pub r_pr: Option<LevelRunProperties>,
    /// Attributes other than w:ilvl (w:tplc, w15:tentative, ...)
    pub attrs: Vec<(String, String)>,
    /// Unknown children (preserved)
    pub unknown_children: Vec<RawXmlNode>,
}

/// Level override (w:lvlOverride)
#[derive(Clone, Debug, PartialEq)]
pub struct LevelOverride {
    /// Level index
    pub ilvl: u8,
    /// Start override
    pub start_override: Option<u32>,
    /// Level definition override
    pub lvl: Option<Level>,
}

/// Simplified paragraph properties for numbering levels
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LevelParagraphProperties {
    /// Left indentation (twips)
    pub ind_left: Option<i32>,
    /// Hanging indentation (twips)
    pub ind_hanging: Option<i32>,
    /// Children other than w:ind (preserved)
    pub unknown_children: Vec<RawXmlNode>,
}

/// Run properties for numbering levels, kept opaque
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LevelRunProperties {
    pub unknown_children: Vec<RawXmlNode>,
}

impl Level {
    /// Create a new level with the given index
    pub fn new(ilvl: u8) -> Self {
        Level {
            ilvl,
            start: Some(1),
            ..Default::default()
        }
    }

    /// Set the number format
    pub fn with_format(mut self, fmt: NumberFormat) -> Self {
        self.num_fmt = Some(fmt);
        self
    }

    /// Set the label template (zero-based placeholders)
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.level_text = Some(text.into());
        self
    }

    /// Set the start value
    pub fn with_start(mut self, start: u32) -> Self {
        self.start = Some(start);
        self
    }

    /// Set the justification
    pub fn with_justification(mut self, jc: impl Into<String>) -> Self {
        self.lvl_jc = Some(jc.into());
        self
    }

    /// Set the hanging indent
    pub fn with_indent(mut self, left: i32, hanging: i32) -> Self {
        self.p_pr = Some(LevelParagraphProperties {
            ind_left: Some(left),
            ind_hanging: Some(hanging),
            unknown_children: Vec::new(),
        });
        self
    }

    /// Number format, decimal when unset
    pub fn format(&self) -> NumberFormat {
        self.num_fmt.clone().unwrap_or(NumberFormat::Decimal)
    }

    /// Whether two levels render the same labels
    pub fn same_definition(&self, other: &Level) -> bool {
        self.ilvl == other.ilvl
            && self.start.unwrap_or(0) == other.start.unwrap_or(0)
            && self.format() == other.format()
            && self.level_text == other.level_text
            && self.is_legal == other.is_legal
            && self.paragraph_style == other.paragraph_style
            && self.p_pr == other.p_pr
    }

    pub(crate) fn from_reader<R: BufRead>(
        reader: &mut Reader<R>,
        start: &BytesStart,
    ) -> Result<Self> {
        let mut level = Level {
            ilvl: get_w_attr(start, "ilvl")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            attrs: collect_attrs(start)
                .into_iter()
                .filter(|(k, _)| k != "w:ilvl")
                .collect(),
            ..Default::default()
        };

        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => match e.name().local_name().as_ref() {
                    b"pPr" => {
                        level.p_pr = Some(LevelParagraphProperties::from_reader(reader)?);
                    }
                    b"rPr" => {
                        level.r_pr = Some(LevelRunProperties::from_reader(reader)?);
                    }
                    _ => {
                        let raw = RawXmlElement::from_reader(reader, &e)?;
                        level.unknown_children.push(RawXmlNode::Element(raw));
                    }
                },
                Event::Empty(e) => match e.name().local_name().as_ref() {
                    b"start" => {
                        level.start = get_w_val(&e).and_then(|v| v.parse().ok());
                    }
                    b"numFmt" => {
                        level.num_fmt = get_w_val(&e).map(|v| NumberFormat::from_name(&v));
                    }
                    b"lvlText" => {
                        level.level_text = get_w_val(&e).map(|v| template_from_ooxml(&v));
                    }
                    b"lvlJc" => {
                        level.lvl_jc = get_w_val(&e);
                    }
                    b"isLgl" => {
                        level.is_legal = parse_bool(&e);
                    }
                    b"pStyle" => {
                        level.paragraph_style = get_w_val(&e);
                    }
                    b"pPr" => {
                        level.p_pr = Some(LevelParagraphProperties::default());
                    }
                    b"rPr" => {
                        level.r_pr = Some(LevelRunProperties::default());
                    }
                    _ => {
                        level
                            .unknown_children
                            .push(RawXmlNode::Element(RawXmlElement::from_empty(&e)));
                    }
                },
                Event::End(e) => {
                    if e.name().local_name().as_ref() == b"lvl" {
                        break;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(level)
    }

    pub(crate) fn write_to<W: std::io::Write>(
        &self,
        writer: &mut Writer<W>,
        extensions: bool,
    ) -> Result<()> {
        let mut start = BytesStart::new("w:lvl");
        start.push_attribute(("w:ilvl", self.ilvl.to_string().as_str()));
        for (k, v) in &self.attrs {
            if extensions || !is_extension_attr(k) {
                start.push_attribute((k.as_str(), v.as_str()));
            }
        }
        writer.write_event(Event::Start(start))?;

        if let Some(s) = self.start {
            write_val(writer, "w:start", &s.to_string())?;
        }
        if let Some(fmt) = &self.num_fmt {
            write_val(writer, "w:numFmt", fmt.as_str())?;
        }
        if let Some(style) = &self.paragraph_style {
            write_val(writer, "w:pStyle", style)?;
        }
        if self.is_legal {
            writer.write_event(Event::Empty(BytesStart::new("w:isLgl")))?;
        }
        if let Some(txt) = &self.level_text {
            write_val(writer, "w:lvlText", &template_to_ooxml(txt))?;
        }
        if let Some(jc) = &self.lvl_jc {
            write_val(writer, "w:lvlJc", jc)?;
        }
        if let Some(p_pr) = &self.p_pr {
            p_pr.write_to(writer)?;
        }
        if let Some(r_pr) = &self.r_pr {
            r_pr.write_to(writer)?;
        }
        for child in &self.unknown_children {
            child.write_to(writer)?;
        }

        writer.write_event(Event::End(BytesEnd::new("w:lvl")))?;
        Ok(())
    }
}

/// `%1`-style placeholders to `%0`-style
pub(crate) fn template_from_ooxml(template: &str) -> String {
    shift_placeholders(template, false)
}

/// `%0`-style placeholders to `%1`-style
pub(crate) fn template_to_ooxml(template: &str) -> String {
    shift_placeholders(template, true)
}

fn shift_placeholders(template: &str, up: bool) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if c != '%' {
            continue;
        }
        if let Some(digit) = chars.peek().and_then(|d| d.to_digit(10)) {
            chars.next();
            let shifted = if up { digit + 1 } else { digit.saturating_sub(1) };
            out.push_str(&shifted.to_string());
        }
    }
    out
}

impl LevelOverride {
    pub(crate) fn from_reader<R: BufRead>(
        reader: &mut Reader<R>,
        start: &BytesStart,
    ) -> Result<Self> {
        let mut lvl_override = LevelOverride {
            ilvl: get_w_attr(start, "ilvl")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            start_override: None,
            lvl: None,
        };

        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    if e.name().local_name().as_ref() == b"lvl" {
                        lvl_override.lvl = Some(Level::from_reader(reader, &e)?);
                    } else {
                        crate::xml::skip_element(reader, &e)?;
                    }
                }
                Event::Empty(e) => {
                    if e.name().local_name().as_ref() == b"startOverride" {
                        lvl_override.start_override =
                            get_w_val(&e).and_then(|v| v.parse().ok());
                    }
                }
                Event::End(e) => {
                    if e.name().local_name().as_ref() == b"lvlOverride" {
                        break;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(lvl_override)
    }

    pub(crate) fn write_to<W: std::io::Write>(
        &self,
        writer: &mut Writer<W>,
        extensions: bool,
    ) -> Result<()> {
        let mut start = BytesStart::new("w:lvlOverride");
        start.push_attribute(("w:ilvl", self.ilvl.to_string().as_str()));
        writer.write_event(Event::Start(start))?;

        if let Some(s) = self.start_override {
            write_val(writer, "w:startOverride", &s.to_string())?;
        }
        if let Some(lvl) = &self.lvl {
            lvl.write_to(writer, extensions)?;
        }

        writer.write_event(Event::End(BytesEnd::new("w:lvlOverride")))?;
        Ok(())
    }
}

impl LevelParagraphProperties {
    pub(crate) fn from_reader<R: BufRead>(reader: &mut Reader<R>) -> Result<Self> {
        let mut props = LevelParagraphProperties::default();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    let raw = RawXmlElement::from_reader(reader, &e)?;
                    props.unknown_children.push(RawXmlNode::Element(raw));
                }
                Event::Empty(e) => {
                    if e.name().local_name().as_ref() == b"ind" {
                        props.ind_left = get_w_attr(&e, "left")
                            .or_else(|| get_w_attr(&e, "start"))
                            .and_then(|v| v.parse().ok());
                        props.ind_hanging = get_w_attr(&e, "hanging").and_then(|v| v.parse().ok());
                    } else {
                        props
                            .unknown_children
                            .push(RawXmlNode::Element(RawXmlElement::from_empty(&e)));
                    }
                }
                Event::End(e) => {
                    if e.name().local_name().as_ref() == b"pPr" {
                        break;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(props)
    }

    pub(crate) fn write_to<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.write_event(Event::Start(BytesStart::new("w:pPr")))?;

        for child in &self.unknown_children {
            child.write_to(writer)?;
        }
        if self.ind_left.is_some() || self.ind_hanging.is_some() {
            let mut ind = BytesStart::new("w:ind");
            if let Some(left) = self.ind_left {
                ind.push_attribute(("w:left", left.to_string().as_str()));
            }
            if let Some(hanging) = self.ind_hanging {
                ind.push_attribute(("w:hanging", hanging.to_string().as_str()));
            }
            writer.write_event(Event::Empty(ind))?;
        }

        writer.write_event(Event::End(BytesEnd::new("w:pPr")))?;
        Ok(())
    }
}

impl LevelRunProperties {
    pub(crate) fn from_reader<R: BufRead>(reader: &mut Reader<R>) -> Result<Self> {
        let mut props = LevelRunProperties::default();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    let raw = RawXmlElement::from_reader(reader, &e)?;
                    props.unknown_children.push(RawXmlNode::Element(raw));
                }
                Event::Empty(e) => {
                    props
                        .unknown_children
                        .push(RawXmlNode::Element(RawXmlElement::from_empty(&e)));
                }
                Event::End(e) => {
                    if e.name().local_name().as_ref() == b"rPr" {
                        break;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(props)
    }

    pub(crate) fn write_to<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.write_event(Event::Start(BytesStart::new("w:rPr")))?;

        for child in &self.unknown_children {
            child.write_to(writer)?;
        }

        writer.write_event(Event::End(BytesEnd::new("w:rPr")))?;
        Ok(())
    }
}
