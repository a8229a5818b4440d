//! `[Content_Types].xml`: media types by extension and by part name

use crate::error::{Error, Result};
use crate::opc::PartUri;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use std::io::Write;

const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

pub const RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";
pub const XML: &str = "application/xml";
pub const MAIN_DOCUMENT: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
pub const MACRO_DOCUMENT: &str = "application/vnd.ms-word.document.macroEnabled.main+xml";
pub const TEMPLATE_DOCUMENT: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.template.main+xml";
pub const STYLES: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml";
pub const NUMBERING: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml";
pub const COMMENTS: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.comments+xml";
pub const CUSTOM_XML_PROPERTIES: &str =
    "application/vnd.openxmlformats-officedocument.customXmlProperties+xml";

/// Media type table of a package.
///
/// Overrides win over extension defaults. Both maps are ordered so the
/// written XML does not depend on insertion order.
#[derive(Clone, Debug, Default)]
pub struct ContentTypes {
    /// Lowercase extension -> media type
    defaults: BTreeMap<String, String>,
    overrides: BTreeMap<PartUri, String>,
}

fn required_attr(element: &BytesStart, name: &str) -> Result<String> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            return Ok(String::from_utf8_lossy(&attr.value).into_owned());
        }
    }
    Err(Error::MissingAttribute {
        element: String::from_utf8_lossy(element.name().as_ref()).into_owned(),
        attr: name.to_string(),
    })
}

impl ContentTypes {
    /// Table with the defaults Word writes: rels, xml and common images
    pub fn new() -> Self {
        let mut types = ContentTypes::default();
        types.add_default("rels", RELATIONSHIPS);
        types.add_default("xml", XML);
        for (ext, media) in [
            ("png", "image/png"),
            ("jpeg", "image/jpeg"),
            ("jpg", "image/jpeg"),
            ("gif", "image/gif"),
            ("bmp", "image/bmp"),
        ] {
            types.add_default(ext, media);
        }
        types
    }

    pub fn from_xml(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut types = ContentTypes::default();
        loop {
            match reader.read_event()? {
                Event::Empty(e) | Event::Start(e) => match e.local_name().as_ref() {
                    b"Default" => {
                        let ext = required_attr(&e, "Extension")?;
                        types.add_default(&ext, &required_attr(&e, "ContentType")?);
                    }
                    b"Override" => {
                        let uri = PartUri::new(&required_attr(&e, "PartName")?)?;
                        types.add_override(&uri, &required_attr(&e, "ContentType")?);
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(types)
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut xml = Writer::new(writer);
        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        let mut root = BytesStart::new("Types");
        root.push_attribute(("xmlns", NS_CONTENT_TYPES));
        xml.write_event(Event::Start(root))?;

        for (ext, media) in &self.defaults {
            let mut element = BytesStart::new("Default");
            element.push_attribute(("Extension", ext.as_str()));
            element.push_attribute(("ContentType", media.as_str()));
            xml.write_event(Event::Empty(element))?;
        }
        for (uri, media) in &self.overrides {
            let mut element = BytesStart::new("Override");
            element.push_attribute(("PartName", uri.as_str()));
            element.push_attribute(("ContentType", media.as_str()));
            xml.write_event(Event::Empty(element))?;
        }

        xml.write_event(Event::End(BytesEnd::new("Types")))?;
        Ok(())
    }

    pub fn add_default(&mut self, extension: &str, content_type: &str) {
        self.defaults
            .insert(extension.to_lowercase(), content_type.to_string());
    }

    pub fn add_override(&mut self, uri: &PartUri, content_type: &str) {
        self.overrides.insert(uri.clone(), content_type.to_string());
    }

    pub fn remove_override(&mut self, uri: &PartUri) -> Option<String> {
        self.overrides.remove(uri)
    }

    /// Media type of a part: its override, else its extension default
    pub fn get(&self, uri: &PartUri) -> Option<&str> {
        if let Some(media) = self.overrides.get(uri) {
            return Some(media);
        }
        let ext = uri.extension()?.to_lowercase();
        self.defaults.get(&ext).map(String::as_str)
    }
}
