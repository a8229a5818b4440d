//! List numbering (numbering.xml)
//!
//! [`Numbering`] holds the list definitions of a document. Label templates
//! are kept with zero-based placeholders (`%0.%1.`); the XML layer converts
//! to and from the one-based form stored in OOXML. [`update_list_labels`]
//! computes the visible label of every list paragraph.

mod abstract_num;
mod format;
mod labels;
mod level;
mod merge;
mod num;

pub use abstract_num::AbstractNum;
pub use format::NumberFormat;
pub use labels::{compute_list_labels, effective_numbering, update_list_labels, ListLabelOptions};
pub use level::{Level, LevelOverride, LevelParagraphProperties, LevelRunProperties};
pub use merge::import_lists;
pub use num::Num;

use crate::error::{Error, Result};
use crate::xml::{minimal_document_namespaces, root_declarations, root_start, RawXmlElement, RawXmlNode};
use quick_xml::events::{BytesDecl, BytesEnd, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;

/// Numbering definitions from numbering.xml
#[derive(Clone, Debug, Default)]
pub struct Numbering {
    /// Abstract numbering definitions
    pub abstract_nums: BTreeMap<u32, AbstractNum>,
    /// Numbering instances
    pub nums: BTreeMap<u32, Num>,
    /// Unknown children (w:numPicBullet, w:numIdMacAtCleanup, ...)
    pub unknown_children: Vec<RawXmlNode>,
    /// Namespace declarations of the loaded part
    pub root_declarations: Vec<(String, String)>,
}

impl Numbering {
    /// Create a new empty numbering definitions
    pub fn new() -> Self {
        Numbering::default()
    }

    /// Whether there are no list instances
    pub fn is_empty(&self) -> bool {
        self.nums.is_empty() && self.abstract_nums.is_empty()
    }

    /// Parse numbering.xml content
    pub fn from_xml(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut numbering = Numbering::default();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => match e.name().local_name().as_ref() {
                    b"abstractNum" => {
                        let abs_num = AbstractNum::from_reader(&mut reader, &e)?;
                        numbering.abstract_nums.insert(abs_num.abstract_num_id, abs_num);
                    }
                    b"num" => {
                        let num = Num::from_reader(&mut reader, &e)?;
                        numbering.nums.insert(num.num_id, num);
                    }
                    b"numbering" => {
                        numbering.root_declarations = root_declarations(&e);
                    }
                    _ => {
                        let raw = RawXmlElement::from_reader(&mut reader, &e)?;
                        numbering.unknown_children.push(RawXmlNode::Element(raw));
                    }
                },
                Event::Empty(e) => {
                    if e.name().local_name().as_ref() != b"numbering" {
                        numbering
                            .unknown_children
                            .push(RawXmlNode::Element(RawXmlElement::from_empty(&e)));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        log::debug!(
            "numbering: {} abstract definitions, {} instances",
            numbering.abstract_nums.len(),
            numbering.nums.len()
        );
        Ok(numbering)
    }

    /// Serialize to XML with Word 2010+ extensions
    pub fn to_xml(&self) -> Result<String> {
        self.to_xml_with(true)
    }

    /// Serialize to XML; `extensions = false` drops w14/w15 markup
    pub fn to_xml_with(&self, extensions: bool) -> Result<String> {
        let mut buffer = Vec::new();
        let mut writer = Writer::new(&mut buffer);

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

        let ours = minimal_document_namespaces(extensions);
        let preserved: Vec<(String, String)> = if extensions {
            self.root_declarations.clone()
        } else {
            Vec::new()
        };
        writer.write_event(Event::Start(root_start("w:numbering", &ours, &preserved)))?;

        // numPicBullet must precede abstractNum
        let (pic_bullets, trailing): (Vec<_>, Vec<_>) =
            self.unknown_children.iter().partition(|child| {
                matches!(child, RawXmlNode::Element(e) if e.local_name() == "numPicBullet")
            });
        for child in pic_bullets {
            child.write_to(&mut writer)?;
        }
        for abs_num in self.abstract_nums.values() {
            abs_num.write_to(&mut writer, extensions)?;
        }
        for num in self.nums.values() {
            num.write_to(&mut writer, extensions)?;
        }
        for child in trailing {
            child.write_to(&mut writer)?;
        }

        writer.write_event(Event::End(BytesEnd::new("w:numbering")))?;

        String::from_utf8(buffer).map_err(|e| Error::InvalidDocument(e.to_string()))
    }

    /// Abstract definition of a list instance, following w:numStyleLink
    pub fn abstract_for(&self, num_id: u32) -> Option<&AbstractNum> {
        let num = self.nums.get(&num_id)?;
        let abs_num = self.abstract_nums.get(&num.abstract_num_id)?;
        match &abs_num.num_style_link {
            Some(link) if abs_num.levels.is_empty() => self
                .abstract_nums
                .values()
                .find(|a| a.style_link.as_deref() == Some(link.as_str()))
                .or(Some(abs_num)),
            _ => Some(abs_num),
        }
    }

    /// Effective level definition for a numId and level (overrides applied)
    pub fn get_level(&self, num_id: u32, level: u8) -> Option<&Level> {
        let num = self.nums.get(&num_id)?;
        if let Some(lvl) = num.level_override(level).and_then(|o| o.lvl.as_ref()) {
            return Some(lvl);
        }
        self.abstract_for(num_id)?.levels.get(&level)
    }

    /// Get the format for a specific numId and level
    pub fn get_format(&self, num_id: u32, level: u8) -> Option<&NumberFormat> {
        self.get_level(num_id, level)?.num_fmt.as_ref()
    }

    /// Check if a numId represents a bullet list
    pub fn is_bullet_list(&self, num_id: u32) -> bool {
        self.get_format(num_id, 0)
            .map(|fmt| fmt.is_bullet())
            .unwrap_or(false)
    }

    /// Get level text (zero-based placeholders) for a specific numId and level
    pub fn get_level_text(&self, num_id: u32, level: u8) -> Option<&str> {
        self.get_level(num_id, level)?.level_text.as_deref()
    }

    /// First counter value of a level: the instance's start override, else
    /// the level's start, else 0
    pub fn start_value(&self, num_id: u32, level: u8) -> u32 {
        let num = self.nums.get(&num_id);
        if let Some(start) = num
            .and_then(|n| n.level_override(level))
            .and_then(|o| o.start_override)
        {
            return start;
        }
        self.get_level(num_id, level)
            .and_then(|l| l.start)
            .unwrap_or(0)
    }

    /// Section-break restart flag of the instance's definition
    pub fn restart_after_break(&self, num_id: u32) -> Option<bool> {
        self.abstract_for(num_id)?.restart_numbering_after_break
    }

    fn next_abstract_id(&self) -> u32 {
        self.abstract_nums
            .keys()
            .next_back()
            .map(|id| id + 1)
            .unwrap_or(0)
    }

    /// numId 0 means "no list" in paragraph properties
    fn next_num_id(&self) -> u32 {
        self.nums
            .keys()
            .next_back()
            .map(|id| id + 1)
            .unwrap_or(1)
            .max(1)
    }

    /// Add a bullet list definition and return the numId
    pub fn add_bullet_list(&mut self) -> u32 {
        self.add_abstract_num(AbstractNum::bullet_list(0))
    }

    /// Add a decimal numbered list definition and return the numId
    pub fn add_decimal_list(&mut self) -> u32 {
        self.add_abstract_num(AbstractNum::decimal_list(0))
    }

    /// Add a Chinese numbered list definition (一、二、三) and return the numId
    pub fn add_chinese_list(&mut self) -> u32 {
        self.add_abstract_num(AbstractNum::chinese_list(0))
    }

    /// Add a nine-level outline list and return the numId
    pub fn add_outline_list(&mut self) -> u32 {
        self.add_abstract_num(AbstractNum::outline_list(0))
    }

    /// Add a custom abstract numbering definition under a fresh id and
    /// return the numId of a new instance of it
    pub fn add_abstract_num(&mut self, mut abs_num: AbstractNum) -> u32 {
        let abs_id = self.next_abstract_id();
        abs_num.abstract_num_id = abs_id;
        self.abstract_nums.insert(abs_id, abs_num);
        self.add_num(Num::new(0, abs_id))
    }

    /// Add a list instance under a fresh numId and return it
    pub fn add_num(&mut self, mut num: Num) -> u32 {
        let num_id = self.next_num_id();
        num.num_id = num_id;
        self.nums.insert(num_id, num);
        num_id
    }

    /// New instance of an existing list that starts counting again
    pub fn restart_list(&mut self, num_id: u32) -> Result<u32> {
        let num = self
            .nums
            .get(&num_id)
            .ok_or_else(|| Error::MissingReference(format!("numId {}", num_id)))?;
        let levels: Vec<u8> = self
            .abstract_for(num_id)
            .map(|a| a.levels.keys().copied().collect())
            .unwrap_or_default();
        let mut restarted = Num::new(0, num.abstract_num_id);
        for ilvl in levels {
            restarted.level_overrides.push(LevelOverride {
                ilvl,
                start_override: Some(self.start_value(num_id, ilvl)),
                lvl: None,
            });
        }
        Ok(self.add_num(restarted))
    }
}
