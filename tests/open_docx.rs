//! Integration test: decode and encode DOCX packages

use linch_docx_dom::opc::{rel_types, well_known, Part, PartUri, TargetMode, MAIN_DOCUMENT, NUMBERING, STYLES};
use linch_docx_dom::{
    CollectingWarningSink, Compliance, CustomXmlPart, Document, Error, LoadOptions, NodeKind,
    Package, RevisionView, SaveOptions, WarningKind,
};
use pretty_assertions::assert_eq;

const HEADER_CT: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml";

const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006"><w:body><w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Title</w:t></w:r></w:p><w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>First</w:t></w:r></w:p><w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>Second</w:t></w:r></w:p><w:p><w:bookmarkStart w:id="0" w:name="mark"/><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">Bold </w:t></w:r><w:bookmarkEnd w:id="0"/><w:ins w:id="5" w:author="Ann"><w:r><w:t>added</w:t></w:r></w:ins></w:p><w:sectPr><w:headerReference w:type="default" r:id="rId2"/><w:pgSz w:w="12240" w:h="15840"/></w:sectPr></w:body></w:document>"#;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:rPr><w:b/><w:sz w:val="32"/></w:rPr></w:style></w:styles>"#;

const NUMBERING_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:abstractNum w:abstractNumId="0"><w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="decimal"/><w:lvlText w:val="%1."/></w:lvl></w:abstractNum><w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num></w:numbering>"#;

const HEADER_XML: &str = r#"<?xml version="1.0"?><w:hdr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:p><w:r><w:t>Header</w:t></w:r></w:p></w:hdr>"#;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A small package written the way Word lays one out
fn build_package() -> Vec<u8> {
    let mut package = Package::new();
    let mut main = Part::new(well_known::document(), MAIN_DOCUMENT, DOCUMENT.as_bytes().to_vec());
    let rels = main.ensure_relationships();
    rels.add_with_id("rId1", rel_types::STYLES, "styles.xml", TargetMode::Internal);
    rels.add_with_id("rId2", rel_types::HEADER, "header1.xml", TargetMode::Internal);
    rels.add_with_id("rId3", rel_types::NUMBERING, "numbering.xml", TargetMode::Internal);
    package.add_part(main);
    package.add_part(Part::new(well_known::styles(), STYLES, STYLES_XML.as_bytes().to_vec()));
    package.add_part(Part::new(
        well_known::numbering(),
        NUMBERING,
        NUMBERING_XML.as_bytes().to_vec(),
    ));
    package.add_part(Part::new(
        PartUri::new("/word/header1.xml").unwrap(),
        HEADER_CT,
        HEADER_XML.as_bytes().to_vec(),
    ));
    package.add_relationship(rel_types::OFFICE_DOCUMENT, "word/document.xml");
    package.to_bytes().unwrap()
}

fn labels(doc: &Document) -> Vec<Option<String>> {
    doc.paragraphs()
        .into_iter()
        .map(|p| doc.list_label(p).unwrap().map(String::from))
        .collect()
}

#[test]
fn test_decode_package() {
    init_logger();
    let doc = Document::from_bytes(&build_package()).unwrap();

    assert_eq!(doc.compliance(), Compliance::Iso29500Transitional);
    assert_eq!(doc.text(), "Title\nFirst\nSecond\nBold added");
    assert_eq!(
        doc.text_in_view(RevisionView::Original).unwrap(),
        "Title\nFirst\nSecond\nBold "
    );
    assert_eq!(doc.revisions().len(), 1);
    assert_eq!(doc.revisions().revisions()[0].author, "Ann");

    let paragraphs = doc.paragraphs();
    let title = doc.arena().paragraph(paragraphs[0]).unwrap();
    assert_eq!(title.style.as_deref(), Some("Heading1"));
    assert_eq!(doc.resolved_style(paragraphs[0]).run.size, Some(32));
    assert_eq!(
        labels(&doc),
        vec![None, Some("1.".into()), Some("2.".into()), None]
    );
    assert_eq!(doc.child_nodes(NodeKind::Foreign, true).count(), 2);
}

#[test]
fn test_round_trip_preserves_model_and_parts() {
    init_logger();
    let original = Document::from_bytes(&build_package()).unwrap();
    let bytes = original.to_bytes().unwrap();
    let reread = Document::from_bytes(&bytes).unwrap();

    assert_eq!(reread.text(), original.text());
    assert_eq!(labels(&reread), labels(&original));
    assert_eq!(reread.revisions().len(), 1);
    let styles: Vec<Option<String>> = reread
        .paragraphs()
        .into_iter()
        .map(|p| reread.arena().paragraph(p).unwrap().style.clone())
        .collect();
    assert_eq!(styles[0].as_deref(), Some("Heading1"));
    assert!(reread.styles().get("Heading1").is_some());

    // Parts the model does not own pass through untouched
    let package = Package::from_bytes(&bytes).unwrap();
    let header = package
        .part(&PartUri::new("/word/header1.xml").unwrap())
        .unwrap();
    assert_eq!(header.data(), HEADER_XML.as_bytes());
    let xml = package.main_document_part().unwrap().data_as_str().unwrap();
    assert!(xml.contains(r#"<w:bookmarkStart w:id="0" w:name="mark"/>"#));
    assert!(xml.contains(r#"<w:headerReference w:type="default" r:id="rId2"/>"#));
}

const LINKED_DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><w:body><w:p><w:r><w:drawing><wp:inline><a:graphic><a:graphicData><a:blip r:embed="rId9"/></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p><w:p><w:hyperlink r:id="rId8"><w:r><w:t>site</w:t></w:r></w:hyperlink></w:p></w:body></w:document>"#;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";

/// A document holding an embedded picture and an external hyperlink
fn build_linked_package() -> Vec<u8> {
    let mut package = Package::new();
    let mut main = Part::new(
        well_known::document(),
        MAIN_DOCUMENT,
        LINKED_DOCUMENT.as_bytes().to_vec(),
    );
    let rels = main.ensure_relationships();
    rels.add_with_id("rId1", rel_types::STYLES, "styles.xml", TargetMode::Internal);
    rels.add_with_id("rId8", rel_types::HYPERLINK, "https://example.com/", TargetMode::External);
    rels.add_with_id("rId9", rel_types::IMAGE, "media/image1.png", TargetMode::Internal);
    package.add_part(main);
    package.add_part(Part::new(well_known::styles(), STYLES, STYLES_XML.as_bytes().to_vec()));
    package.add_part(Part::new(
        PartUri::new("/word/media/image1.png").unwrap(),
        "image/png",
        PNG.to_vec(),
    ));
    package.add_relationship(rel_types::OFFICE_DOCUMENT, "word/document.xml");
    package.to_bytes().unwrap()
}

/// Value of the first `name="..."` attribute in `xml`
fn attr_value<'a>(xml: &'a str, name: &str) -> &'a str {
    let pattern = format!("{}=\"", name);
    let start = xml.find(&pattern).unwrap() + pattern.len();
    let end = xml[start..].find('"').unwrap();
    &xml[start..start + end]
}

#[test]
fn test_append_brings_picture_and_hyperlink_targets() {
    init_logger();
    let source = Document::from_bytes(&build_linked_package()).unwrap();
    let mut dest = Document::new();
    dest.add_paragraph("Cover").unwrap();
    dest.append_document(&source, &Default::default()).unwrap();
    dest.append_document(&source, &Default::default()).unwrap();

    let bytes = dest.to_bytes().unwrap();
    let package = Package::from_bytes(&bytes).unwrap();
    let main = package.main_document_part().unwrap();
    let rels = main.relationships().unwrap();
    let xml = main.data_as_str().unwrap();

    let image = rels.get(attr_value(xml, "r:embed")).unwrap();
    assert_eq!(image.rel_type, rel_types::IMAGE);
    assert_eq!(image.target_mode, TargetMode::Internal);
    let media = main.uri().resolve(&image.target).unwrap();
    assert_eq!(package.part(&media).unwrap().data(), PNG);

    let link = rels.get(attr_value(xml, "r:id")).unwrap();
    assert_eq!(link.rel_type, rel_types::HYPERLINK);
    assert_eq!(link.target_mode, TargetMode::External);
    assert_eq!(link.target, "https://example.com/");

    // Imported ids do not take the slot of the styles relationship
    let styles = rels.by_type(rel_types::STYLES).unwrap();
    assert_ne!(styles.id, image.id);
    assert_ne!(styles.id, link.id);

    // The second append reuses the identical picture
    let pictures = package
        .part_uris()
        .filter(|u| u.extension() == Some("png"))
        .count();
    assert_eq!(pictures, 1);
    assert_eq!(rels.all_by_type(rel_types::IMAGE).len(), 1);

    let reread = Document::from_bytes(&bytes).unwrap();
    assert_eq!(reread.child_nodes(NodeKind::Shape, true).count(), 2);
}

#[test]
fn test_append_brings_header_part() {
    init_logger();
    let source = Document::from_bytes(&build_package()).unwrap();
    let mut dest = Document::new();
    dest.append_document(&source, &Default::default()).unwrap();

    let package = Package::from_bytes(&dest.to_bytes().unwrap()).unwrap();
    let main = package.main_document_part().unwrap();
    let xml = main.data_as_str().unwrap();
    let header_id = attr_value(xml, "r:id");
    let rel = main.relationships().unwrap().get(header_id).unwrap();
    assert_eq!(rel.rel_type, rel_types::HEADER);
    let header = main.uri().resolve(&rel.target).unwrap();
    assert_eq!(package.part(&header).unwrap().data(), HEADER_XML.as_bytes());
    assert_eq!(package.content_types().get(&header), Some(HEADER_CT));
}

#[test]
fn test_encoding_is_stable() {
    let doc = Document::from_bytes(&build_package()).unwrap();
    let first = doc.to_bytes().unwrap();
    let second = doc.to_bytes().unwrap();
    assert_eq!(first, second);

    let third = Document::from_bytes(&first).unwrap().to_bytes().unwrap();
    assert_eq!(first, third);
}

#[test]
fn test_new_document_round_trip() {
    let mut doc = Document::new();
    let num_id = doc.numbering_mut().add_decimal_list();
    let p = doc.add_paragraph("Item").unwrap();
    let mut format = doc.arena().paragraph(p).unwrap().format.clone();
    format.numbering = Some(linch_docx_dom::format::NumberingRef::new(num_id, 0));
    doc.set_paragraph_format(p, Some("Normal".into()), format).unwrap();
    doc.add_table(2, 2).unwrap();

    let bytes = doc.to_bytes().unwrap();
    assert_eq!(&bytes[0..2], b"PK");

    let reread = Document::from_bytes(&bytes).unwrap();
    assert_eq!(reread.text(), doc.text());
    assert_eq!(reread.tables().len(), 1);
    assert_eq!(labels(&reread), labels(&doc));
    assert_eq!(reread.list_label(reread.paragraphs()[1]).unwrap(), Some("1."));
}

#[test]
fn test_custom_xml_and_mapping_survive() {
    let mut doc = Document::new();
    let id = doc.add_custom_xml_part(CustomXmlPart::new(
        r#"<?xml version="1.0"?><order><number>42</number></order>"#,
    ));
    let body = doc.last_body().unwrap();
    let sdt = doc
        .arena_mut()
        .create(NodeKind::StructuredDocumentTag, Some(body))
        .unwrap();
    doc.set_xml_mapping(sdt, &id, "/order/number").unwrap();

    let reread = Document::from_bytes(&doc.to_bytes().unwrap()).unwrap();
    assert_eq!(reread.custom_xml_parts().len(), 1);
    assert_eq!(reread.custom_xml_parts()[0].id, id);
    let sdt = reread.structured_document_tags()[0];
    let mapping = reread.arena().sdt(sdt).unwrap().xml_mapping.clone().unwrap();
    assert_eq!(mapping.xpath, "/order/number");
    assert_eq!(reread.arena().text(sdt), "42");
}

#[test]
fn test_dangling_mapping_warns_on_load() {
    let mut doc = Document::new();
    let id = doc.add_custom_xml_part(CustomXmlPart::new("<a><b>1</b></a>"));
    let body = doc.last_body().unwrap();
    let sdt = doc
        .arena_mut()
        .create(NodeKind::StructuredDocumentTag, Some(body))
        .unwrap();
    doc.set_xml_mapping(sdt, &id, "/a/b").unwrap();
    doc.remove_custom_xml_part(&id);

    let mut warnings = CollectingWarningSink::new();
    let bytes = doc.to_bytes().unwrap();
    Document::load_with_warnings(&bytes, &LoadOptions::default(), &mut warnings).unwrap();
    assert!(warnings.contains(WarningKind::UnresolvedReference));
}

#[test]
fn test_failures_are_typed() {
    let err = Document::from_bytes(b"not a zip").unwrap_err();
    assert!(matches!(err, Error::CorruptPackage(_)));

    let mut package = Package::new();
    package.add_relationship(rel_types::OFFICE_DOCUMENT, "word/document.xml");
    let err = Document::from_bytes(&package.to_bytes().unwrap()).unwrap_err();
    assert!(matches!(err, Error::CorruptPackage(_)));

    let options = SaveOptions::default().with_compliance(Compliance::Iso29500Strict);
    let err = Document::new().to_bytes_with(&options).unwrap_err();
    assert!(matches!(err, Error::UnsupportedCompliance(_)));
}
