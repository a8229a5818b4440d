//! Abstract numbering definitions

use crate::error::Result;
use crate::xml::{collect_attrs, get_w_attr, get_w_val, write_val, RawXmlElement, RawXmlNode};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use std::io::BufRead;

use super::format::NumberFormat;
use super::level::Level;
use crate::xml::is_extension_attr;

/// Abstract numbering definition (w:abstractNum)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AbstractNum {
    /// Abstract numbering ID
    pub abstract_num_id: u32,
    /// Multi-level type
    pub multi_level_type: Option<String>,
    /// Level definitions by index
    pub levels: BTreeMap<u8, Level>,
    /// Keep counting across section breaks (w15:restartNumberingAfterBreak="0").
    ///
    /// `None` defers to the document-wide option.
    pub restart_numbering_after_break: Option<bool>,
    /// Defines the list style with this id (w:styleLink)
    pub style_link: Option<String>,
    /// Takes its levels from the list style with this id (w:numStyleLink)
    pub num_style_link: Option<String>,
    /// Other attributes (w15:restartNumberingAfterBreak excluded)
    pub attrs: Vec<(String, String)>,
    /// Unknown children (preserved)
    pub unknown_children: Vec<RawXmlNode>,
}

const RESTART_ATTR: &str = "w15:restartNumberingAfterBreak";

impl AbstractNum {
    /// Create a new abstract numbering definition
    pub fn new(id: u32) -> Self {
        AbstractNum {
            abstract_num_id: id,
            multi_level_type: Some("hybridMultilevel".to_string()),
            ..Default::default()
        }
    }

    /// Add a level to this abstract numbering
    pub fn add_level(&mut self, level: Level) {
        self.levels.insert(level.ilvl, level);
    }

    /// Builder form of [`AbstractNum::add_level`]
    pub fn with_level(mut self, level: Level) -> Self {
        self.add_level(level);
        self
    }

    /// Create a simple bullet list definition
    pub fn bullet_list(id: u32) -> Self {
        Self::new(id).with_level(
            Level::new(0)
                .with_format(NumberFormat::Bullet)
                .with_text("•")
                .with_justification("left")
                .with_indent(720, 360),
        )
    }

    /// Create a simple decimal numbered list definition
    pub fn decimal_list(id: u32) -> Self {
        Self::new(id).with_level(
            Level::new(0)
                .with_format(NumberFormat::Decimal)
                .with_text("%0.")
                .with_justification("left")
                .with_indent(720, 360),
        )
    }

    /// Create a Chinese numbered list definition (一、二、三)
    pub fn chinese_list(id: u32) -> Self {
        Self::new(id).with_level(
            Level::new(0)
                .with_format(NumberFormat::ChineseCounting)
                .with_text("%0、")
                .with_justification("left")
                .with_indent(720, 360),
        )
    }

    /// Nine-level outline: `1.`, `1.1.`, `1.1.1.` ...
    pub fn outline_list(id: u32) -> Self {
        let mut abs = Self::new(id);
        abs.multi_level_type = Some("multilevel".to_string());
        for ilvl in 0..9u8 {
            let template: String = (0..=ilvl).map(|l| format!("%{}.", l)).collect();
            abs.add_level(
                Level::new(ilvl)
                    .with_format(NumberFormat::Decimal)
                    .with_text(template)
                    .with_justification("left")
                    .with_indent(432 + 432 * i32::from(ilvl), 432),
            );
        }
        abs
    }

    /// Same levels and list flags, ignoring the id
    pub fn same_definition(&self, other: &AbstractNum) -> bool {
        self.levels.len() == other.levels.len()
            && self
                .levels
                .values()
                .zip(other.levels.values())
                .all(|(a, b)| a.same_definition(b))
            && self.restart_numbering_after_break == other.restart_numbering_after_break
            && self.num_style_link == other.num_style_link
    }

    pub(crate) fn from_reader<R: BufRead>(
        reader: &mut Reader<R>,
        start: &BytesStart,
    ) -> Result<Self> {
        let mut abs_num = AbstractNum {
            abstract_num_id: get_w_attr(start, "abstractNumId")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            ..Default::default()
        };
        for (key, value) in collect_attrs(start) {
            if key == RESTART_ATTR {
                abs_num.restart_numbering_after_break =
                    Some(matches!(value.as_str(), "1" | "true" | "on"));
            } else if !key.ends_with("abstractNumId") {
                abs_num.attrs.push((key, value));
            }
        }

        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    if e.name().local_name().as_ref() == b"lvl" {
                        abs_num.add_level(Level::from_reader(reader, &e)?);
                    } else {
                        let raw = RawXmlElement::from_reader(reader, &e)?;
                        abs_num.unknown_children.push(RawXmlNode::Element(raw));
                    }
                }
                Event::Empty(e) => match e.name().local_name().as_ref() {
                    b"multiLevelType" => abs_num.multi_level_type = get_w_val(&e),
                    b"styleLink" => abs_num.style_link = get_w_val(&e),
                    b"numStyleLink" => abs_num.num_style_link = get_w_val(&e),
                    _ => {
                        abs_num
                            .unknown_children
                            .push(RawXmlNode::Element(RawXmlElement::from_empty(&e)));
                    }
                },
                Event::End(e) => {
                    if e.name().local_name().as_ref() == b"abstractNum" {
                        break;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(abs_num)
    }

    pub(crate) fn write_to<W: std::io::Write>(
        &self,
        writer: &mut Writer<W>,
        extensions: bool,
    ) -> Result<()> {
        let mut start = BytesStart::new("w:abstractNum");
        start.push_attribute(("w:abstractNumId", self.abstract_num_id.to_string().as_str()));
        if extensions {
            if let Some(restart) = self.restart_numbering_after_break {
                start.push_attribute((RESTART_ATTR, if restart { "1" } else { "0" }));
            }
        }
        for (k, v) in &self.attrs {
            if extensions || !is_extension_attr(k) {
                start.push_attribute((k.as_str(), v.as_str()));
            }
        }
        writer.write_event(Event::Start(start))?;

        // Unknown children first: w:nsid and w:tmpl precede multiLevelType
        for child in &self.unknown_children {
            child.write_to(writer)?;
        }
        if let Some(mlt) = &self.multi_level_type {
            write_val(writer, "w:multiLevelType", mlt)?;
        }
        if let Some(link) = &self.style_link {
            write_val(writer, "w:styleLink", link)?;
        }
        if let Some(link) = &self.num_style_link {
            write_val(writer, "w:numStyleLink", link)?;
        }
        for level in self.levels.values() {
            level.write_to(writer, extensions)?;
        }

        writer.write_event(Event::End(BytesEnd::new("w:abstractNum")))?;
        Ok(())
    }
}
