//! Part names

use crate::error::{Error, Result};
use std::fmt;

/// Absolute name of a part inside a package, such as `/word/document.xml`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartUri {
    path: String,
}

impl PartUri {
    /// Normalize `path` to a leading `/` and no trailing `/`.
    ///
    /// Empty names and names with empty segments are rejected.
    pub fn new(path: &str) -> Result<Self> {
        let trimmed = path.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(Error::InvalidPartUri(format!("'{}': empty name", path)));
        }
        let path = match trimmed.strip_prefix('/') {
            Some(_) => trimmed.to_string(),
            None => format!("/{}", trimmed),
        };
        if path.contains("//") {
            return Err(Error::InvalidPartUri(format!("'{}': empty segment", path)));
        }
        Ok(PartUri { path })
    }

    fn from_static(path: &str) -> Self {
        PartUri {
            path: path.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Last segment of the name
    pub fn file_name(&self) -> Option<&str> {
        self.path.rsplit('/').next().filter(|name| !name.is_empty())
    }

    /// Text after the last dot of the file name
    pub fn extension(&self) -> Option<&str> {
        self.file_name()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
    }

    /// Directory holding the part; `None` at the package root
    pub fn parent(&self) -> Option<PartUri> {
        match self.path.rfind('/')? {
            0 => None,
            pos => Some(PartUri::from_static(&self.path[..pos])),
        }
    }

    /// Name of the `.rels` entry for relationships originating here
    /// (`/word/document.xml` -> `/word/_rels/document.xml.rels`)
    pub fn relationships_uri(&self) -> PartUri {
        let dir = self.parent().map(|p| p.path).unwrap_or_default();
        let name = self.file_name().unwrap_or_default();
        PartUri {
            path: format!("{}/_rels/{}.rels", dir, name),
        }
    }

    /// Resolve a relationship target relative to this part.
    ///
    /// Targets starting with `/` are taken as absolute; `.` and `..`
    /// segments are folded.
    pub fn resolve(&self, relative: &str) -> Result<PartUri> {
        if relative.starts_with('/') {
            return PartUri::new(relative);
        }
        let dir = self.parent().map(|p| p.path).unwrap_or_default();
        let mut segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
        for segment in relative.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                s => segments.push(s),
            }
        }
        PartUri::new(&segments.join("/"))
    }

    /// Relative reference from the directory of `base` to this part.
    ///
    /// For base `/word/document.xml` and `/customXml/item1.xml`, returns
    /// `../customXml/item1.xml`
    pub fn relative_from(&self, base: &PartUri) -> String {
        let base_dir = base.parent().map(|p| p.path).unwrap_or_default();
        let base_parts: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
        let target_parts: Vec<&str> = self.path.split('/').filter(|s| !s.is_empty()).collect();

        let common = base_parts
            .iter()
            .zip(target_parts.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let mut segments: Vec<&str> = Vec::new();
        for _ in common..base_parts.len() {
            segments.push("..");
        }
        segments.extend(&target_parts[common..]);
        segments.join("/")
    }
}

impl fmt::Display for PartUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl std::str::FromStr for PartUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        PartUri::new(s)
    }
}

/// Default names of the parts this crate writes
pub mod well_known {
    use super::PartUri;

    pub fn document() -> PartUri {
        PartUri::from_static("/word/document.xml")
    }

    pub fn styles() -> PartUri {
        PartUri::from_static("/word/styles.xml")
    }

    pub fn numbering() -> PartUri {
        PartUri::from_static("/word/numbering.xml")
    }

    pub fn comments() -> PartUri {
        PartUri::from_static("/word/comments.xml")
    }

    /// `/customXml/itemN.xml`, numbered from 1
    pub fn custom_xml_item(index: usize) -> PartUri {
        PartUri {
            path: format!("/customXml/item{}.xml", index),
        }
    }

    /// `/customXml/itemPropsN.xml`, numbered from 1
    pub fn custom_xml_props(index: usize) -> PartUri {
        PartUri {
            path: format!("/customXml/itemProps{}.xml", index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn uri(path: &str) -> PartUri {
        PartUri::new(path).unwrap()
    }

    #[test]
    fn test_normalization() {
        assert_eq!(uri("word/document.xml").as_str(), "/word/document.xml");
        assert_eq!(uri(" /word/media/ ").as_str(), "/word/media");
        assert!(PartUri::new("").is_err());
        assert!(PartUri::new("/").is_err());
        assert!(PartUri::new("/word//document.xml").is_err());
    }

    #[test]
    fn test_name_pieces() {
        let doc = uri("/word/document.xml");
        assert_eq!(doc.file_name(), Some("document.xml"));
        assert_eq!(doc.extension(), Some("xml"));
        assert_eq!(uri("/word/media/blob").extension(), None);
        assert_eq!(doc.parent().unwrap().as_str(), "/word");
        assert_eq!(uri("/document.xml").parent(), None);
    }

    #[test]
    fn test_relationships_uri() {
        assert_eq!(
            uri("/word/document.xml").relationships_uri().as_str(),
            "/word/_rels/document.xml.rels"
        );
        assert_eq!(
            uri("/customXml/item1.xml").relationships_uri().as_str(),
            "/customXml/_rels/item1.xml.rels"
        );
    }

    #[test]
    fn test_resolve() {
        let doc = uri("/word/document.xml");
        assert_eq!(doc.resolve("styles.xml").unwrap(), uri("/word/styles.xml"));
        assert_eq!(doc.resolve("./media/a.png").unwrap(), uri("/word/media/a.png"));
        assert_eq!(doc.resolve("../customXml/item1.xml").unwrap(), uri("/customXml/item1.xml"));
        assert_eq!(doc.resolve("/word/numbering.xml").unwrap(), uri("/word/numbering.xml"));
    }

    #[test]
    fn test_relative_from() {
        let base = uri("/word/document.xml");
        let styles = uri("/word/styles.xml");
        let item = uri("/customXml/item1.xml");
        assert_eq!(styles.relative_from(&base), "styles.xml");
        assert_eq!(item.relative_from(&base), "../customXml/item1.xml");
        assert_eq!(base.resolve(&item.relative_from(&base)).unwrap(), item);
    }
}
