//! One entry of a package

use crate::opc::{PartUri, Relationships};

/// Bytes stored under a part name, with the relationships that originate
/// from it
#[derive(Clone, Debug)]
pub struct Part {
    uri: PartUri,
    content_type: String,
    data: Vec<u8>,
    /// Contents of the part's `_rels/*.rels` entry
    relationships: Option<Relationships>,
}

impl Part {
    pub fn new(uri: PartUri, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Part {
            uri,
            content_type: content_type.into(),
            data,
            relationships: None,
        }
    }

    pub fn uri(&self) -> &PartUri {
        &self.uri
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The bytes as UTF-8 text (XML parts)
    pub fn data_as_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.data)
    }

    pub fn relationships(&self) -> Option<&Relationships> {
        self.relationships.as_ref()
    }

    pub fn set_relationships(&mut self, rels: Relationships) {
        self.relationships = Some(rels);
    }

    /// Relationships of the part, created empty on first use
    pub fn ensure_relationships(&mut self) -> &mut Relationships {
        self.relationships.get_or_insert_with(Relationships::new)
    }
}
