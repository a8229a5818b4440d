//! `.rels` entries: typed links from a part (or the package) to targets

use crate::error::{Error, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use std::io::Write;

const NS_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Relationship type URIs this crate reads or writes
pub mod rel_types {
    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    pub const STYLES: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
    pub const NUMBERING: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering";
    pub const COMMENTS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments";
    pub const HEADER: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header";
    pub const IMAGE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
    pub const HYPERLINK: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
    pub const THEME: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";
    pub const CUSTOM_XML: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/customXml";
    pub const CUSTOM_XML_PROPS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/customXmlProps";
}

/// Whether a target lives inside the package
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TargetMode {
    #[default]
    Internal,
    /// A URL outside the package (hyperlinks, linked pictures)
    External,
}

/// One `<Relationship>` element
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relationship {
    /// `rIdN`, unique within its `.rels` entry
    pub id: String,
    pub rel_type: String,
    /// Relative to the source part's directory when internal
    pub target: String,
    pub target_mode: TargetMode,
}

/// Relationships of one source, keyed by id
#[derive(Clone, Debug)]
pub struct Relationships {
    items: BTreeMap<String, Relationship>,
    /// Lowest number `add` tries next
    next_id: u32,
}

impl Default for Relationships {
    fn default() -> Self {
        Relationships {
            items: BTreeMap::new(),
            next_id: 1,
        }
    }
}

/// Numeric suffix of an `rIdN` identifier
fn id_number(id: &str) -> Option<u32> {
    id.strip_prefix("rId").and_then(|n| n.parse().ok())
}

fn parse_relationship(element: &BytesStart) -> Result<Relationship> {
    let mut id = None;
    let mut rel_type = None;
    let mut target = None;
    let mut target_mode = TargetMode::Internal;

    for attr in element.attributes() {
        let attr = attr?;
        let value = attr
            .unescape_value()
            .map(|v| v.to_string())
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).to_string());
        match attr.key.local_name().as_ref() {
            b"Id" => id = Some(value),
            b"Type" => rel_type = Some(value),
            b"Target" => target = Some(value),
            b"TargetMode" if value == "External" => target_mode = TargetMode::External,
            _ => {}
        }
    }

    let missing = |attr: &str| Error::MissingAttribute {
        element: "Relationship".into(),
        attr: attr.into(),
    };
    Ok(Relationship {
        id: id.ok_or_else(|| missing("Id"))?,
        rel_type: rel_type.ok_or_else(|| missing("Type"))?,
        target: target.ok_or_else(|| missing("Target"))?,
        target_mode,
    })
}

impl Relationships {
    pub fn new() -> Self {
        Relationships::default()
    }

    /// Parse the XML of a `.rels` entry
    pub fn from_xml(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut rels = Relationships::new();
        loop {
            match reader.read_event()? {
                Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"Relationship" => {
                    let rel = parse_relationship(&e)?;
                    rels.items.insert(rel.id.clone(), rel);
                }
                Event::Eof => break,
                _ => {}
            }
        }
        rels.next_id = rels.items.keys().filter_map(|id| id_number(id)).max().unwrap_or(0) + 1;
        Ok(rels)
    }

    /// Write the `.rels` XML, ids in numeric order (rId2 before rId10)
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut xml = Writer::new(writer);
        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        let mut root = BytesStart::new("Relationships");
        root.push_attribute(("xmlns", NS_RELATIONSHIPS));
        xml.write_event(Event::Start(root))?;

        for rel in self.sorted() {
            let mut element = BytesStart::new("Relationship");
            element.push_attribute(("Id", rel.id.as_str()));
            element.push_attribute(("Type", rel.rel_type.as_str()));
            element.push_attribute(("Target", rel.target.as_str()));
            if rel.target_mode == TargetMode::External {
                element.push_attribute(("TargetMode", "External"));
            }
            xml.write_event(Event::Empty(element))?;
        }

        xml.write_event(Event::End(BytesEnd::new("Relationships")))?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.get(id)
    }

    /// First relationship of a type
    pub fn by_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.items.values().find(|r| r.rel_type == rel_type)
    }

    pub fn all_by_type(&self, rel_type: &str) -> Vec<&Relationship> {
        self.items
            .values()
            .filter(|r| r.rel_type == rel_type)
            .collect()
    }

    /// Relationship of a type pointing at `target`
    pub fn find(&self, rel_type: &str, target: &str) -> Option<&Relationship> {
        self.items
            .values()
            .find(|r| r.rel_type == rel_type && r.target == target)
    }

    /// Add an internal relationship under a fresh id; returns the id
    pub fn add(&mut self, rel_type: &str, target: &str) -> String {
        let id = self.fresh_id();
        self.add_with_id(&id, rel_type, target, TargetMode::Internal);
        id
    }

    /// Add an external relationship under a fresh id; returns the id
    pub fn add_external(&mut self, rel_type: &str, target: &str) -> String {
        let id = self.fresh_id();
        self.add_with_id(&id, rel_type, target, TargetMode::External);
        id
    }

    /// Insert or replace the relationship with `id`
    pub fn add_with_id(&mut self, id: &str, rel_type: &str, target: &str, mode: TargetMode) {
        self.items.insert(
            id.to_string(),
            Relationship {
                id: id.to_string(),
                rel_type: rel_type.to_string(),
                target: target.to_string(),
                target_mode: mode,
            },
        );
    }

    pub fn remove(&mut self, id: &str) -> Option<Relationship> {
        self.items.remove(id)
    }

    /// Relationships ordered by their numeric id suffix
    pub fn sorted(&self) -> Vec<&Relationship> {
        let mut rels: Vec<&Relationship> = self.items.values().collect();
        rels.sort_by_key(|r| (id_number(&r.id).unwrap_or(u32::MAX), r.id.clone()));
        rels
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Next `rIdN` not taken, explicit ids included
    fn fresh_id(&mut self) -> String {
        loop {
            let id = format!("rId{}", self.next_id);
            self.next_id += 1;
            if !self.items.contains_key(&id) {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
  <Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com?a=1&amp;b=2" TargetMode="External"/>
</Relationships>"#;

    fn to_xml(rels: &Relationships) -> String {
        let mut buf = Vec::new();
        rels.write_to(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_parse() {
        let rels = Relationships::from_xml(PACKAGE_RELS).unwrap();
        assert_eq!(rels.len(), 2);

        let doc = rels.by_type(rel_types::OFFICE_DOCUMENT).unwrap();
        assert_eq!(doc.target, "word/document.xml");
        assert_eq!(doc.target_mode, TargetMode::Internal);

        let link = rels.get("rId7").unwrap();
        assert_eq!(link.target, "https://example.com?a=1&b=2");
        assert_eq!(link.target_mode, TargetMode::External);
        assert_eq!(link.rel_type, rel_types::HYPERLINK);
    }

    #[test]
    fn test_missing_target_is_an_error() {
        let xml = r#"<Relationships><Relationship Id="rId1" Type="t"/></Relationships>"#;
        let err = Relationships::from_xml(xml).unwrap_err();
        assert!(matches!(err, Error::MissingAttribute { .. }));
    }

    #[test]
    fn test_round_trip() {
        let mut rels = Relationships::new();
        rels.add(rel_types::STYLES, "styles.xml");
        rels.add_external(rel_types::HYPERLINK, "https://example.com");

        let reread = Relationships::from_xml(&to_xml(&rels)).unwrap();
        assert_eq!(reread.len(), 2);
        assert_eq!(reread.get("rId2").unwrap().target_mode, TargetMode::External);
        assert_eq!(reread.find(rel_types::STYLES, "styles.xml").unwrap().id, "rId1");
    }

    #[test]
    fn test_written_in_numeric_order() {
        let mut rels = Relationships::new();
        for i in 0..11 {
            rels.add(rel_types::IMAGE, &format!("media/image{}.png", i));
        }
        let ids: Vec<&str> = rels.sorted().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids[1], "rId2");
        assert_eq!(ids[10], "rId11");
        let xml = to_xml(&rels);
        assert!(xml.find("\"rId2\"").unwrap() < xml.find("\"rId10\"").unwrap());
    }

    #[test]
    fn test_ids_continue_after_parsed_ones() {
        let mut rels = Relationships::from_xml(PACKAGE_RELS).unwrap();
        assert_eq!(rels.add(rel_types::STYLES, "styles.xml"), "rId8");
    }

    #[test]
    fn test_auto_id_skips_explicit_ids() {
        let mut rels = Relationships::new();
        rels.add_with_id("rId1", rel_types::HEADER, "header1.xml", TargetMode::Internal);
        rels.add_with_id("rId2", rel_types::HEADER, "header2.xml", TargetMode::Internal);

        let id = rels.add(rel_types::STYLES, "styles.xml");
        assert_eq!(id, "rId3");
        assert_eq!(rels.get("rId1").unwrap().rel_type, rel_types::HEADER);
    }
}
