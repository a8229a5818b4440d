//! XML utilities and raw element preservation for round-trip support

mod namespace;
mod raw;

pub use namespace::*;
pub use raw::{RawXmlElement, RawXmlNode};

use crate::error::Result;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::io::BufRead;

/// Unescaped attribute value, falling back to the raw bytes
fn attr_value(attr: &Attribute) -> String {
    attr.unescape_value()
        .map(|v| v.to_string())
        .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).to_string())
}

/// All attributes of an element as unescaped (name, value) pairs
pub fn collect_attrs(element: &BytesStart) -> Vec<(String, String)> {
    element
        .attributes()
        .filter_map(|a| a.ok())
        .map(|a| {
            (
                String::from_utf8_lossy(a.key.as_ref()).to_string(),
                attr_value(&a),
            )
        })
        .collect()
}

/// Helper to get attribute value from BytesStart
pub fn get_attr(element: &BytesStart, name: &str) -> Option<String> {
    element
        .attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref() == name.as_bytes())
        .map(|a| attr_value(&a))
}

/// Get a WordprocessingML attribute, with or without the `w:` prefix
pub fn get_w_attr(element: &BytesStart, local: &str) -> Option<String> {
    element
        .attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.local_name().as_ref() == local.as_bytes())
        .map(|a| attr_value(&a))
}

/// Helper to get w:val attribute (common in OOXML)
pub fn get_w_val(element: &BytesStart) -> Option<String> {
    get_w_attr(element, "val")
}

/// Parse a boolean value from OOXML (handles "1", "true", "on", or missing val)
pub fn parse_bool(element: &BytesStart) -> bool {
    match get_w_val(element) {
        None => true, // No val attribute means true (e.g., <w:b/>)
        Some(v) => matches!(v.as_str(), "1" | "true" | "on"),
    }
}

/// Write `<name w:val="value"/>`
pub fn write_val<W: std::io::Write>(writer: &mut Writer<W>, name: &str, value: &str) -> Result<()> {
    let mut elem = BytesStart::new(name);
    elem.push_attribute(("w:val", value));
    writer.write_event(Event::Empty(elem))?;
    Ok(())
}

/// Skip an element and all its children
pub fn skip_element<R: BufRead>(reader: &mut Reader<R>, start: &BytesStart) -> Result<()> {
    let target = start.name().as_ref().to_vec();
    let mut depth = 1;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == target.as_slice() => depth += 1,
            Event::End(e) if e.name().as_ref() == target.as_slice() => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Event::Eof => {
                return Err(crate::error::Error::InvalidDocument(
                    "Unexpected EOF while skipping element".into(),
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// Word 2010+ attribute prefixes, dropped from ECMA-376 output
pub fn is_extension_attr(name: &str) -> bool {
    name.starts_with("w14:") || name.starts_with("w15:") || name.starts_with("w16")
}

/// Copy of a preserved node without Word 2010+ attributes
pub fn strip_extension_attrs(node: &RawXmlNode) -> RawXmlNode {
    let mut node = node.clone();
    if let RawXmlNode::Element(e) = &mut node {
        e.visit_mut(&mut |el| el.attributes.retain(|(k, _)| !is_extension_attr(k)));
    }
    node
}

/// Namespace declarations (`xmlns:*`, `mc:Ignorable`) on a part's root element
pub fn root_declarations(element: &BytesStart) -> Vec<(String, String)> {
    collect_attrs(element)
        .into_iter()
        .filter(|(k, _)| k.starts_with("xmlns") || k == "mc:Ignorable")
        .collect()
}

/// Build a root start tag from our declarations plus preserved ones.
///
/// Preserved declarations win so foreign prefixes keep resolving.
pub fn root_start<'a>(
    name: &'a str,
    ours: &[(&str, &str)],
    preserved: &[(String, String)],
) -> BytesStart<'a> {
    let mut start = BytesStart::new(name);
    let mut seen: Vec<&str> = Vec::new();
    for (k, v) in preserved {
        start.push_attribute((k.as_str(), v.as_str()));
        seen.push(k.as_str());
    }
    for (k, v) in ours {
        if !seen.contains(k) {
            start.push_attribute((*k, *v));
        }
    }
    start
}
