//! Custom XML data parts (customXml/itemN.xml) and the XPath subset used
//! by SDT mappings

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Error, Result};
use crate::opc::{
    rel_types, well_known, Package, Part, PartUri, TargetMode, CUSTOM_XML_PROPERTIES, XML,
};
use crate::xml::{get_w_attr, RawXmlElement, DS};

/// One custom XML data part
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomXmlPart {
    /// Store item id, `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}`
    pub id: String,
    /// The XML document, as stored
    pub data: Vec<u8>,
    /// Schema URIs listed in the part's properties
    pub schemas: Vec<String>,
}

impl CustomXmlPart {
    /// Part with a store item id derived from its content
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        CustomXmlPart {
            id: store_item_id(&data, 0),
            data,
            schemas: Vec::new(),
        }
    }

    /// Part with an explicit store item id
    pub fn with_id(id: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        CustomXmlPart {
            id: id.into(),
            data: data.into(),
            schemas: Vec::new(),
        }
    }

    /// Value at `xpath`, or `None` when nothing matches
    pub fn evaluate(&self, xpath: &str) -> Result<Option<String>> {
        let xml = std::str::from_utf8(&self.data)?;
        select(xml, xpath)
    }
}

fn fnv1a(seed: u64, bytes: &[u8]) -> u64 {
    let mut hash = seed;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// GUID-like id derived from content, stable across runs
pub(crate) fn store_item_id(data: &[u8], salt: usize) -> String {
    let salt = (salt as u64).to_le_bytes();
    let high = fnv1a(fnv1a(0xcbf2_9ce4_8422_2325, &salt), data);
    let low = fnv1a(fnv1a(0x6c62_272e_07bb_0142, data), &salt);
    format!(
        "{{{:08X}-{:04X}-{:04X}-{:04X}-{:012X}}}",
        high >> 32,
        (high >> 16) & 0xFFFF,
        high & 0xFFFF,
        low >> 48,
        low & 0xFFFF_FFFF_FFFF
    )
}

/// Store item ids compare case-insensitively and with or without braces
pub(crate) fn same_store_item_id(a: &str, b: &str) -> bool {
    let strip = |s: &str| s.trim_matches(|c| c == '{' || c == '}').to_ascii_uppercase();
    strip(a) == strip(b)
}

// === XPath subset ===

#[derive(Debug, PartialEq)]
struct Step {
    name: String,
    index: usize,
}

fn strip_prefix(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// `/a[1]/b[2]/@c`: absolute, child steps with optional positions, an
/// optional trailing attribute; prefixes are ignored
fn parse_xpath(xpath: &str) -> Result<(Vec<Step>, Option<String>)> {
    let invalid = || Error::MissingReference(format!("unsupported XPath '{}'", xpath));
    let rest = xpath.trim().strip_prefix('/').ok_or_else(invalid)?;
    let mut steps = Vec::new();
    let mut attribute = None;

    for segment in rest.split('/') {
        if attribute.is_some() || segment.is_empty() {
            return Err(invalid());
        }
        if let Some(name) = segment.strip_prefix('@') {
            attribute = Some(strip_prefix(name).to_string());
            continue;
        }
        let (name, index) = match segment.split_once('[') {
            Some((name, predicate)) => {
                let index = predicate
                    .strip_suffix(']')
                    .and_then(|n| n.trim().parse::<usize>().ok())
                    .filter(|n| *n > 0)
                    .ok_or_else(invalid)?;
                (name, index)
            }
            None => (segment, 1),
        };
        steps.push(Step {
            name: strip_prefix(name).to_string(),
            index,
        });
    }

    if steps.is_empty() {
        return Err(invalid());
    }
    Ok((steps, attribute))
}

fn select(xml: &str, xpath: &str) -> Result<Option<String>> {
    let (steps, attribute) = parse_xpath(xpath)?;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let root = loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => break RawXmlElement::from_reader(&mut reader, &e)?,
            Event::Empty(e) => break RawXmlElement::from_empty(&e),
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    };

    let mut current = &root;
    let (first, rest) = steps.split_at(1);
    if strip_prefix(&current.name) != first[0].name || first[0].index != 1 {
        return Ok(None);
    }
    for step in rest {
        let next = current
            .elements()
            .filter(|e| strip_prefix(&e.name) == step.name)
            .nth(step.index - 1);
        match next {
            Some(e) => current = e,
            None => return Ok(None),
        }
    }

    Ok(match attribute {
        Some(name) => current
            .attributes
            .iter()
            .find(|(k, _)| !k.starts_with("xmlns") && strip_prefix(k) == name)
            .map(|(_, v)| v.clone()),
        None => Some(current.text()),
    })
}

// === Package parts ===

fn item_index(uri: &PartUri) -> Option<usize> {
    uri.as_str()
        .strip_prefix("/customXml/item")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

/// Custom XML parts of a package, in item order
pub(crate) fn read_parts(package: &Package) -> Result<Vec<CustomXmlPart>> {
    let mut items: Vec<(usize, &PartUri)> = package
        .part_uris()
        .filter_map(|uri| item_index(uri).map(|i| (i, uri)))
        .collect();
    items.sort();

    let mut parts = Vec::new();
    for (index, uri) in items {
        let Some(part) = package.part(uri) else {
            continue;
        };
        let props = package.related_part(uri, rel_types::CUSTOM_XML_PROPS);
        let (id, schemas) = match props {
            Some(props) => read_props(props.data_as_str()?)?,
            None => (None, Vec::new()),
        };
        let id = id.unwrap_or_else(|| {
            log::debug!("{} has no store item id, deriving one", uri);
            store_item_id(part.data(), index)
        });
        parts.push(CustomXmlPart {
            id,
            data: part.data().to_vec(),
            schemas,
        });
    }
    Ok(parts)
}

fn read_props(xml: &str) -> Result<(Option<String>, Vec<String>)> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut id = None;
    let mut schemas = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"datastoreItem" => id = get_w_attr(&e, "itemID"),
                b"schemaRef" => schemas.extend(get_w_attr(&e, "uri")),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok((id, schemas))
}

fn write_props(part: &CustomXmlPart) -> Result<Vec<u8>> {
    let mut w = Writer::new(Vec::new());
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("no"))))?;
    let mut root = BytesStart::new("ds:datastoreItem");
    root.push_attribute(("ds:itemID", part.id.as_str()));
    root.push_attribute(("xmlns:ds", DS));
    w.write_event(Event::Start(root))?;
    if part.schemas.is_empty() {
        w.write_event(Event::Empty(BytesStart::new("ds:schemaRefs")))?;
    } else {
        w.write_event(Event::Start(BytesStart::new("ds:schemaRefs")))?;
        for uri in &part.schemas {
            let mut schema = BytesStart::new("ds:schemaRef");
            schema.push_attribute(("ds:uri", uri.as_str()));
            w.write_event(Event::Empty(schema))?;
        }
        w.write_event(Event::End(BytesEnd::new("ds:schemaRefs")))?;
    }
    w.write_event(Event::End(BytesEnd::new("ds:datastoreItem")))?;
    Ok(w.into_inner())
}

/// Replace the package's custom XML parts with `parts`, numbered from 1
pub(crate) fn write_parts(
    package: &mut Package,
    main: &PartUri,
    parts: &[CustomXmlPart],
) -> Result<()> {
    let stale: Vec<PartUri> = package
        .part_uris()
        .filter(|uri| uri.as_str().starts_with("/customXml/"))
        .cloned()
        .collect();
    for uri in stale {
        package.remove_part(&uri);
    }
    if let Some(main_part) = package.part_mut(main) {
        let rels = main_part.ensure_relationships();
        let ids: Vec<String> = rels
            .all_by_type(rel_types::CUSTOM_XML)
            .into_iter()
            .map(|r| r.id.clone())
            .collect();
        for id in ids {
            rels.remove(&id);
        }
    }

    for (i, custom) in parts.iter().enumerate() {
        let item_uri = well_known::custom_xml_item(i + 1);
        let props_uri = well_known::custom_xml_props(i + 1);

        package.add_part(Part::new(
            props_uri.clone(),
            CUSTOM_XML_PROPERTIES,
            write_props(custom)?,
        ));
        let mut item = Part::new(item_uri.clone(), XML, custom.data.clone());
        item.ensure_relationships().add_with_id(
            "rId1",
            rel_types::CUSTOM_XML_PROPS,
            &props_uri.relative_from(&item_uri),
            TargetMode::Internal,
        );
        package.add_part(item);

        if let Some(main_part) = package.part_mut(main) {
            main_part
                .ensure_relationships()
                .add(rel_types::CUSTOM_XML, &item_uri.relative_from(main));
        }
    }
    Ok(())
}
