//! ZIP container of a DOCX file
//!
//! A package is read completely into memory. Writing is deterministic:
//! entries go out in part-name order with a fixed timestamp.

use crate::error::{Error, Result};
use crate::opc::relationships::rel_types;
use crate::opc::{ContentTypes, Part, PartUri, Relationships, TargetMode};
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek, Write};
use zip::read::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::{CompressionMethod, DateTime};

const CONTENT_TYPES_ENTRY: &str = "[Content_Types].xml";
const PACKAGE_RELS_ENTRY: &str = "_rels/.rels";

/// Parts, package relationships and content types of one file
#[derive(Clone, Debug)]
pub struct Package {
    parts: BTreeMap<PartUri, Part>,
    /// `/_rels/.rels`
    relationships: Relationships,
    content_types: ContentTypes,
}

fn read_entry<R: Read>(file: &mut R) -> Result<String> {
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

impl Package {
    /// Empty package with the usual default content types
    pub fn new() -> Self {
        Package {
            parts: BTreeMap::new(),
            relationships: Relationships::new(),
            content_types: ContentTypes::new(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }

    /// Read every entry of a ZIP archive.
    ///
    /// Fails with [`Error::MissingPart`] when `[Content_Types].xml` is
    /// absent. Parts without a content type are read as
    /// `application/octet-stream`.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let content_types = match archive.by_name(CONTENT_TYPES_ENTRY) {
            Ok(mut file) => ContentTypes::from_xml(&read_entry(&mut file)?)?,
            Err(_) => return Err(Error::MissingPart(CONTENT_TYPES_ENTRY.into())),
        };
        let mut package = Package {
            content_types,
            ..Package::new()
        };

        // Part relationships are attached once every part is known
        let mut part_rels: Vec<(PartUri, Relationships)> = Vec::new();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let name = file.name().to_string();
            if name.ends_with('/') || name == CONTENT_TYPES_ENTRY {
                continue;
            }
            if name == PACKAGE_RELS_ENTRY {
                package.relationships = Relationships::from_xml(&read_entry(&mut file)?)?;
                continue;
            }
            if let Some((dir, file_name)) = name.rsplit_once("_rels/") {
                if let Some(source) = file_name.strip_suffix(".rels") {
                    let source = PartUri::new(&format!("/{}{}", dir, source))?;
                    part_rels.push((source, Relationships::from_xml(&read_entry(&mut file)?)?));
                    continue;
                }
            }

            let uri = PartUri::new(&format!("/{}", name))?;
            let content_type = package
                .content_types
                .get(&uri)
                .unwrap_or("application/octet-stream")
                .to_string();
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            package.parts.insert(uri.clone(), Part::new(uri, content_type, data));
        }

        for (source, rels) in part_rels {
            match package.parts.get_mut(&source) {
                Some(part) => part.set_relationships(rels),
                None => log::debug!("dropping relationships of missing part {}", source),
            }
        }
        log::trace!("read package with {} parts", package.parts.len());
        Ok(package)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_to(Cursor::new(&mut buf))?;
        Ok(buf)
    }

    /// Write the package as a ZIP archive; the same package always
    /// produces the same bytes
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let mut zip = ZipWriter::new(writer);
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());

        zip.start_file(CONTENT_TYPES_ENTRY, options)?;
        self.content_types.write_to(&mut zip)?;
        if !self.relationships.is_empty() {
            zip.start_file(PACKAGE_RELS_ENTRY, options)?;
            self.relationships.write_to(&mut zip)?;
        }

        for (uri, part) in &self.parts {
            zip.start_file(uri.as_str().trim_start_matches('/'), options)?;
            zip.write_all(part.data())?;

            if let Some(rels) = part.relationships().filter(|r| !r.is_empty()) {
                let rels_uri = uri.relationships_uri();
                zip.start_file(rels_uri.as_str().trim_start_matches('/'), options)?;
                rels.write_to(&mut zip)?;
            }
        }
        zip.finish()?;
        Ok(())
    }

    pub fn part(&self, uri: &PartUri) -> Option<&Part> {
        self.parts.get(uri)
    }

    pub fn part_mut(&mut self, uri: &PartUri) -> Option<&mut Part> {
        self.parts.get_mut(uri)
    }

    /// Add a part to the package, replacing any part with the same URI.
    ///
    /// Relationships of a replaced part are kept unless the new part
    /// brings its own.
    pub fn add_part(&mut self, mut part: Part) {
        let uri = part.uri().clone();
        self.content_types.add_override(&uri, part.content_type());
        if part.relationships().is_none() {
            if let Some(rels) = self.parts.get(&uri).and_then(|p| p.relationships()) {
                part.set_relationships(rels.clone());
            }
        }
        self.parts.insert(uri, part);
    }

    pub fn remove_part(&mut self, uri: &PartUri) -> Option<Part> {
        self.content_types.remove_override(uri);
        self.parts.remove(uri)
    }

    pub fn part_uris(&self) -> impl Iterator<Item = &PartUri> {
        self.parts.keys()
    }

    pub fn parts(&self) -> impl Iterator<Item = (&PartUri, &Part)> {
        self.parts.iter()
    }

    /// Package-level relationships
    pub fn relationships(&self) -> &Relationships {
        &self.relationships
    }

    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    /// Target of the package's officeDocument relationship
    pub fn main_document_part(&self) -> Option<&Part> {
        let rel = self.relationships.by_type(rel_types::OFFICE_DOCUMENT)?;
        let uri = PartUri::new(&rel.target).ok()?;
        self.parts.get(&uri)
    }

    /// Resolve the target of a part's relationship of the given type
    pub fn related_part(&self, source: &PartUri, rel_type: &str) -> Option<&Part> {
        let rels = self.parts.get(source)?.relationships()?;
        let rel = rels.by_type(rel_type)?;
        let uri = source.resolve(&rel.target).ok()?;
        self.parts.get(&uri)
    }

    /// Add a package-level relationship; returns its id
    pub fn add_relationship(&mut self, rel_type: &str, target: &str) -> String {
        self.relationships.add(rel_type, target)
    }

    /// Copy a part of `source`, and every internal part it relates to,
    /// into this package.
    ///
    /// Returns the URI of the copy. A part already present with the same
    /// bytes is reused; a different part at the same URI makes the copy
    /// take a fresh name. `copied` maps source URIs to copies across calls.
    pub fn import_part(
        &mut self,
        source: &Package,
        uri: &PartUri,
        copied: &mut BTreeMap<PartUri, PartUri>,
    ) -> Result<PartUri> {
        if let Some(done) = copied.get(uri) {
            return Ok(done.clone());
        }
        let part = source
            .part(uri)
            .ok_or_else(|| Error::PartNotFound(uri.to_string()))?;

        let target = match self.parts.get(uri) {
            None => uri.clone(),
            Some(existing) if existing.data() == part.data() => {
                copied.insert(uri.clone(), uri.clone());
                return Ok(uri.clone());
            }
            Some(_) => self.fresh_uri(uri)?,
        };
        copied.insert(uri.clone(), target.clone());
        log::debug!("importing part {} as {}", uri, target);

        let mut copy = Part::new(target.clone(), part.content_type(), part.data().to_vec());
        if let Some(rels) = part.relationships() {
            let mut new_rels = Relationships::new();
            for rel in rels.sorted() {
                let mut rel_target = rel.target.clone();
                if rel.target_mode == TargetMode::Internal {
                    let related = uri.resolve(&rel.target)?;
                    if source.part(&related).is_some() {
                        let imported = self.import_part(source, &related, copied)?;
                        rel_target = imported.relative_from(&target);
                    }
                }
                new_rels.add_with_id(&rel.id, &rel.rel_type, &rel_target, rel.target_mode);
            }
            copy.set_relationships(new_rels);
        }
        self.add_part(copy);
        Ok(target)
    }

    /// `/dir/name_N.ext` for the first N no part uses
    fn fresh_uri(&self, uri: &PartUri) -> Result<PartUri> {
        let path = uri.as_str();
        let (stem, ext) = match uri.extension() {
            Some(ext) => (&path[..path.len() - ext.len() - 1], format!(".{}", ext)),
            None => (path, String::new()),
        };
        let mut n = 1;
        loop {
            let candidate = PartUri::new(&format!("{}_{}{}", stem, n, ext))?;
            if !self.parts.contains_key(&candidate) {
                return Ok(candidate);
            }
            n += 1;
        }
    }
}

impl Default for Package {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc::{MAIN_DOCUMENT, STYLES};
    use pretty_assertions::assert_eq;

    fn main_part(data: &[u8]) -> Part {
        Part::new(
            PartUri::new("/word/document.xml").unwrap(),
            MAIN_DOCUMENT,
            data.to_vec(),
        )
    }

    #[test]
    fn test_empty_package_round_trip() {
        let bytes = Package::new().to_bytes().unwrap();
        let pkg = Package::from_bytes(&bytes).unwrap();
        assert_eq!(pkg.part_uris().count(), 0);
        assert!(pkg.relationships().is_empty());
    }

    #[test]
    fn test_missing_content_types() {
        let mut buf = Vec::new();
        let mut zip = ZipWriter::new(Cursor::new(&mut buf));
        zip.start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<doc/>").unwrap();
        zip.finish().unwrap();

        let err = Package::from_bytes(&buf).unwrap_err();
        assert!(matches!(err, Error::MissingPart(_)));
    }

    #[test]
    fn test_round_trip_with_related_parts() {
        let mut pkg = Package::new();
        let mut doc = main_part(b"<?xml version=\"1.0\"?><document/>");
        doc.ensure_relationships().add(rel_types::STYLES, "styles.xml");
        pkg.add_part(doc);
        pkg.add_part(Part::new(
            PartUri::new("/word/styles.xml").unwrap(),
            STYLES,
            b"<styles/>".to_vec(),
        ));
        pkg.add_relationship(rel_types::OFFICE_DOCUMENT, "word/document.xml");

        let reread = Package::from_bytes(&pkg.to_bytes().unwrap()).unwrap();
        let main = reread.main_document_part().unwrap();
        assert_eq!(main.content_type(), MAIN_DOCUMENT);
        let styles = reread.related_part(main.uri(), rel_types::STYLES).unwrap();
        assert_eq!(styles.data(), b"<styles/>");
    }

    #[test]
    fn test_bytes_are_stable() {
        let mut pkg = Package::new();
        pkg.add_part(main_part(b"<doc/>"));
        pkg.add_relationship(rel_types::OFFICE_DOCUMENT, "word/document.xml");

        assert_eq!(pkg.to_bytes().unwrap(), pkg.to_bytes().unwrap());
    }

    #[test]
    fn test_replacing_part_keeps_relationships() {
        let mut pkg = Package::new();
        let mut part = main_part(b"<a/>");
        part.ensure_relationships().add(rel_types::THEME, "theme/theme1.xml");
        pkg.add_part(part);

        pkg.add_part(main_part(b"<b/>"));
        let part = pkg.part(&PartUri::new("/word/document.xml").unwrap()).unwrap();
        assert_eq!(part.data(), b"<b/>");
        assert!(part.relationships().unwrap().by_type(rel_types::THEME).is_some());
    }

    #[test]
    fn test_import_part_renames_on_clash() {
        let header_uri = PartUri::new("/word/header1.xml").unwrap();
        let image_uri = PartUri::new("/word/media/image1.png").unwrap();

        let mut source = Package::new();
        let mut header = Part::new(header_uri.clone(), "application/xml", b"<hdr/>".to_vec());
        header.ensure_relationships().add_with_id(
            "rId1",
            rel_types::IMAGE,
            "media/image1.png",
            TargetMode::Internal,
        );
        source.add_part(header);
        source.add_part(Part::new(image_uri.clone(), "image/png", b"new".to_vec()));

        let mut dest = Package::new();
        dest.add_part(Part::new(image_uri.clone(), "image/png", b"old".to_vec()));

        let mut copied = BTreeMap::new();
        let copy = dest.import_part(&source, &header_uri, &mut copied).unwrap();
        assert_eq!(copy, header_uri);

        let renamed = PartUri::new("/word/media/image1_1.png").unwrap();
        assert_eq!(dest.part(&renamed).unwrap().data(), b"new");
        assert_eq!(dest.part(&image_uri).unwrap().data(), b"old");
        let rel = dest
            .part(&copy)
            .unwrap()
            .relationships()
            .unwrap()
            .get("rId1")
            .unwrap()
            .clone();
        assert_eq!(rel.target, "media/image1_1.png");
        assert_eq!(dest.content_types().get(&renamed), Some("image/png"));

        // A second import reuses what the first one copied
        let again = dest.import_part(&source, &header_uri, &mut copied).unwrap();
        assert_eq!(again, header_uri);
        assert_eq!(dest.part_uris().count(), 3);
    }
}
