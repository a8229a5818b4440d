//! DOCX encode and decode
//!
//! `decode` turns package bytes into a [`Document`]; `encode` writes one
//! back. Parts the model does not own (headers, footers, media, theme,
//! settings, ...) are carried through untouched.

mod custom_xml;
mod props;
mod reader;
mod styles;
mod writer;

pub use custom_xml::CustomXmlPart;

pub(crate) use custom_xml::same_store_item_id;
pub(crate) use reader::DocumentXml;

use std::fmt;
use std::sync::Arc;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::numbering::{update_list_labels, Numbering};
use crate::opc::{rel_types, well_known, Package, Part, PartUri};
use crate::style::StyleSheet;
use crate::warning::{IgnoreWarnings, WarningInfo, WarningKind, WarningSink};
use crate::xml::{document_namespaces, W_STRICT};

use reader::BodyReader;
use writer::BodyWriter;

/// OOXML flavour of a package
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Compliance {
    /// ECMA-376 1st edition: no Word 2010+ extensions
    Ecma376_2006,
    /// ISO/IEC 29500 transitional
    #[default]
    Iso29500Transitional,
    /// ISO/IEC 29500 strict; read only
    Iso29500Strict,
}

/// Decrypts password-protected packages.
///
/// The library does not implement the encryption schemes itself; callers
/// that need them plug one in through [`LoadOptions::with_decryptor`].
pub trait PackageDecryptor: Send + Sync {
    /// Plain package bytes, or [`Error::InvalidPassword`]
    fn decrypt(&self, encrypted: &[u8], password: &str) -> Result<Vec<u8>>;
}

/// Options for [`decode`]
#[derive(Clone, Default)]
pub struct LoadOptions {
    pub password: Option<String>,
    pub decryptor: Option<Arc<dyn PackageDecryptor>>,
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("decryptor", &self.decryptor.is_some())
            .finish()
    }
}

impl LoadOptions {
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_decryptor(mut self, decryptor: Arc<dyn PackageDecryptor>) -> Self {
        self.decryptor = Some(decryptor);
        self
    }
}

/// Options for [`encode`]
#[derive(Clone, Debug, Default)]
pub struct SaveOptions {
    pub compliance: Compliance,
}

impl SaveOptions {
    pub fn with_compliance(mut self, compliance: Compliance) -> Self {
        self.compliance = compliance;
        self
    }
}

/// Compound File Binary signature; encrypted OOXML lives in one
const OLE_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Decode package bytes
pub fn decode(bytes: &[u8], options: &LoadOptions) -> Result<Document> {
    decode_with_warnings(bytes, options, &mut IgnoreWarnings)
}

/// Decode package bytes, reporting problems to `warnings`
pub fn decode_with_warnings(
    bytes: &[u8],
    options: &LoadOptions,
    warnings: &mut dyn WarningSink,
) -> Result<Document> {
    if bytes.starts_with(&OLE_SIGNATURE) {
        let password = options.password.as_deref().ok_or(Error::PasswordRequired)?;
        let decryptor = options.decryptor.as_ref().ok_or(Error::InvalidPassword)?;
        let plain = decryptor.decrypt(bytes, password)?;
        if plain.starts_with(&OLE_SIGNATURE) {
            return Err(Error::CorruptPackage("decrypted data is still encrypted".into()));
        }
        return decode_package(&plain, warnings).map_err(Error::into_corrupt);
    }
    decode_package(bytes, warnings).map_err(Error::into_corrupt)
}

fn detect_compliance(declarations: &[(String, String)]) -> Compliance {
    if declarations.iter().any(|(_, v)| v == W_STRICT) {
        Compliance::Iso29500Strict
    } else if declarations.iter().any(|(k, _)| k == "xmlns:mc") {
        Compliance::Iso29500Transitional
    } else {
        Compliance::Ecma376_2006
    }
}

fn decode_package(bytes: &[u8], warnings: &mut dyn WarningSink) -> Result<Document> {
    let package = Package::from_bytes(bytes)?;
    let main = package
        .main_document_part()
        .ok_or_else(|| Error::CorruptPackage("main document part not found".into()))?;
    let main_uri = main.uri().clone();
    log::debug!("decoding {}", main_uri);

    let mut reader = BodyReader::new(warnings);
    let comments_declarations = match package.related_part(&main_uri, rel_types::COMMENTS) {
        Some(part) => reader.read_comments(part.data_as_str()?)?,
        None => Vec::new(),
    };
    let document_xml = reader.read_document(main.data_as_str()?)?;
    reader.finish();
    let (arena, revisions) = reader.into_parts();

    let styles = match package.related_part(&main_uri, rel_types::STYLES) {
        Some(part) => styles::read_styles(part.data_as_str()?)?,
        None => StyleSheet::new(),
    };
    let numbering = match package.related_part(&main_uri, rel_types::NUMBERING) {
        Some(part) => Numbering::from_xml(part.data_as_str()?)?,
        None => Numbering::new(),
    };
    let custom_xml = custom_xml::read_parts(&package)?;
    let compliance = detect_compliance(&document_xml.declarations);

    let mut document = Document::from_parts(arena, revisions, styles, numbering, package);
    document.custom_xml = custom_xml;
    document.compliance = compliance;
    document.document_xml = document_xml;
    document.comments_declarations = comments_declarations;
    update_list_labels(
        &mut document.arena,
        &document.numbering,
        &document.styles,
        &document.list_options,
    )?;
    for sdt in document.dangling_xml_mappings() {
        warnings.warning(WarningInfo::new(
            WarningKind::UnresolvedReference,
            format!("SDT {} maps to a missing custom XML part", sdt),
        ));
    }
    log::debug!(
        "decoded {} nodes, {} revisions, {} custom XML parts",
        document.arena.len(),
        document.revisions.len(),
        document.custom_xml.len()
    );
    Ok(document)
}

/// Encode a document into package bytes
pub fn encode(document: &Document, options: &SaveOptions) -> Result<Vec<u8>> {
    encode_with_warnings(document, options, &mut IgnoreWarnings)
}

/// Encode a document, reporting content changed for the output format
pub fn encode_with_warnings(
    document: &Document,
    options: &SaveOptions,
    warnings: &mut dyn WarningSink,
) -> Result<Vec<u8>> {
    let extensions = match options.compliance {
        Compliance::Iso29500Strict => {
            return Err(Error::UnsupportedCompliance(
                "ISO/IEC 29500 strict output is not supported".into(),
            ))
        }
        Compliance::Ecma376_2006 => false,
        Compliance::Iso29500Transitional => true,
    };
    if document.compliance == Compliance::Iso29500Strict {
        warnings.warning(WarningInfo::new(
            WarningKind::MinorFormattingLoss,
            "strict document written as transitional",
        ));
    }

    let mut package = document.package.clone();
    let main_uri = package
        .main_document_part()
        .map(|p| p.uri().clone())
        .unwrap_or_else(well_known::document);
    let main_type = package
        .part(&main_uri)
        .map(|p| p.content_type().to_string())
        .unwrap_or_else(|| crate::opc::MAIN_DOCUMENT.to_string());

    let (document_xml, comments_xml) = {
        let mut writer = BodyWriter::new(&document.arena, &document.revisions, extensions, warnings);
        let declarations = preserved_declarations(&document.document_xml.declarations, extensions);
        let xml = writer.write_document(&declarations, &document.document_xml.extra)?;
        let comments_declarations = preserved_declarations(&document.comments_declarations, extensions);
        (xml, writer.write_comments(&comments_declarations)?)
    };

    package.add_part(Part::new(main_uri.clone(), main_type, document_xml));
    if package.main_document_part().is_none() {
        let target = main_uri.as_str().trim_start_matches('/').to_string();
        package.add_relationship(rel_types::OFFICE_DOCUMENT, &target);
    }

    let styles_declarations = preserved_declarations(&document.styles.root_declarations, extensions);
    let styles_xml = styles::write_styles(&document.styles, &styles_declarations, extensions)?;
    put_related(
        &mut package,
        &main_uri,
        rel_types::STYLES,
        well_known::styles(),
        crate::opc::STYLES,
        Some(styles_xml),
    )?;

    let numbering_xml = if document.numbering.is_empty() {
        None
    } else {
        Some(document.numbering.to_xml_with(extensions)?.into_bytes())
    };
    put_related(
        &mut package,
        &main_uri,
        rel_types::NUMBERING,
        well_known::numbering(),
        crate::opc::NUMBERING,
        numbering_xml,
    )?;
    put_related(
        &mut package,
        &main_uri,
        rel_types::COMMENTS,
        well_known::comments(),
        crate::opc::COMMENTS,
        comments_xml,
    )?;

    custom_xml::write_parts(&mut package, &main_uri, &document.custom_xml)?;
    package.to_bytes()
}

/// Preserved root declarations that do not clash with the ones we write.
///
/// `mc:Ignorable` is kept when extensions are on since it may list more
/// prefixes than ours.
fn preserved_declarations(
    declarations: &[(String, String)],
    extensions: bool,
) -> Vec<(String, String)> {
    let ours = document_namespaces(true);
    declarations
        .iter()
        .filter(|(k, _)| {
            if k == "mc:Ignorable" {
                return extensions;
            }
            !ours.iter().any(|(name, _)| name == k)
        })
        .cloned()
        .collect()
}

/// Write (or with `None`, remove) the part the main document relates to
/// with `rel_type`
fn put_related(
    package: &mut Package,
    main: &PartUri,
    rel_type: &str,
    default_uri: PartUri,
    content_type: &str,
    data: Option<Vec<u8>>,
) -> Result<()> {
    let existing = package
        .part(main)
        .and_then(|p| p.relationships())
        .and_then(|rels| rels.by_type(rel_type))
        .map(|rel| (rel.id.clone(), rel.target.clone()));

    match (data, existing) {
        (Some(data), Some((_, target))) => {
            let uri = main.resolve(&target)?;
            let content_type = package
                .part(&uri)
                .map(|p| p.content_type().to_string())
                .unwrap_or_else(|| content_type.to_string());
            package.add_part(Part::new(uri, content_type, data));
        }
        (Some(data), None) => {
            let target = default_uri.relative_from(main);
            package.add_part(Part::new(default_uri, content_type, data));
            if let Some(part) = package.part_mut(main) {
                part.ensure_relationships().add(rel_type, &target);
            }
        }
        (None, Some((id, target))) => {
            let uri = main.resolve(&target)?;
            log::debug!("dropping empty part {}", uri);
            package.remove_part(&uri);
            if let Some(part) = package.part_mut(main) {
                part.ensure_relationships().remove(&id);
            }
        }
        (None, None) => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warning::CollectingWarningSink;
    use pretty_assertions::assert_eq;

    struct Xor;

    impl PackageDecryptor for Xor {
        fn decrypt(&self, encrypted: &[u8], password: &str) -> Result<Vec<u8>> {
            if password != "secret" {
                return Err(Error::InvalidPassword);
            }
            Ok(encrypted[OLE_SIGNATURE.len()..].iter().map(|b| b ^ 0x5A).collect())
        }
    }

    fn encrypted(plain: &[u8]) -> Vec<u8> {
        let mut bytes = OLE_SIGNATURE.to_vec();
        bytes.extend(plain.iter().map(|b| b ^ 0x5A));
        bytes
    }

    #[test]
    fn test_compliance_detection() {
        let decl = |k: &str, v: &str| vec![(k.to_string(), v.to_string())];
        assert_eq!(
            detect_compliance(&decl("xmlns:w", W_STRICT)),
            Compliance::Iso29500Strict
        );
        assert_eq!(
            detect_compliance(&decl("xmlns:mc", crate::xml::MC)),
            Compliance::Iso29500Transitional
        );
        assert_eq!(
            detect_compliance(&decl("xmlns:w", crate::xml::W)),
            Compliance::Ecma376_2006
        );
    }

    #[test]
    fn test_password_outcomes() {
        let plain = encode(&Document::new(), &SaveOptions::default()).unwrap();
        let bytes = encrypted(&plain);

        let err = decode(&bytes, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, Error::PasswordRequired));

        let no_decryptor = LoadOptions::default().with_password("secret");
        assert!(matches!(decode(&bytes, &no_decryptor), Err(Error::InvalidPassword)));

        let wrong = LoadOptions::default()
            .with_password("guess")
            .with_decryptor(Arc::new(Xor));
        let err = decode(&bytes, &wrong).unwrap_err();
        assert!(err.is_password_error());

        let right = wrong.with_password("secret");
        let document = decode(&bytes, &right).unwrap();
        assert_eq!(document.arena().len(), Document::new().arena().len());
    }

    #[test]
    fn test_corrupt_package() {
        let err = decode(b"not a zip", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, Error::CorruptPackage(_)));
    }

    #[test]
    fn test_strict_output_rejected() {
        let options = SaveOptions::default().with_compliance(Compliance::Iso29500Strict);
        let err = encode(&Document::new(), &options).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCompliance(_)));
    }

    #[test]
    fn test_encode_is_stable_and_parts_are_present() {
        let document = Document::new();
        let first = encode(&document, &SaveOptions::default()).unwrap();
        let second = encode(&document, &SaveOptions::default()).unwrap();
        assert_eq!(first, second);

        let package = Package::from_bytes(&first).unwrap();
        let main = package.main_document_part().unwrap();
        assert_eq!(main.uri().as_str(), "/word/document.xml");
        assert!(package.related_part(main.uri(), rel_types::STYLES).is_some());
        assert!(package.related_part(main.uri(), rel_types::COMMENTS).is_none());
    }

    #[test]
    fn test_ecma_output_drops_extension_namespaces() {
        let mut sink = CollectingWarningSink::new();
        let options = SaveOptions::default().with_compliance(Compliance::Ecma376_2006);
        let bytes = encode_with_warnings(&Document::new(), &options, &mut sink).unwrap();
        let package = Package::from_bytes(&bytes).unwrap();
        let xml = package.main_document_part().unwrap().data_as_str().unwrap();
        assert!(!xml.contains("xmlns:w14"));
        assert!(!xml.contains("mc:Ignorable"));

        let reread = decode(&bytes, &LoadOptions::default()).unwrap();
        assert_eq!(reread.compliance(), Compliance::Ecma376_2006);
    }
}
