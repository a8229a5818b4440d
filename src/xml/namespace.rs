//! XML namespaces used in OOXML

/// WordprocessingML main namespace
pub const W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
/// WordprocessingML main namespace in ISO 29500 Strict packages
pub const W_STRICT: &str = "http://purl.oclc.org/ooxml/wordprocessingml/main";
/// Relationships namespace
pub const R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
/// Drawing namespace
pub const WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
/// DrawingML main namespace
pub const A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
/// Pictures namespace
pub const PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
/// Markup compatibility namespace
pub const MC: &str = "http://schemas.openxmlformats.org/markup-compatibility/2006";
/// Word 2010 extensions
pub const W14: &str = "http://schemas.microsoft.com/office/word/2010/wordml";
/// Word 2012 extensions
pub const W15: &str = "http://schemas.microsoft.com/office/word/2012/wordml";
/// Custom XML data store namespace
pub const DS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/customXml";
/// Content Types namespace
pub const CT: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
/// Package Relationships namespace
pub const PR: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Namespace declarations for document.xml, comments.xml and friends
pub fn document_namespaces(extensions: bool) -> Vec<(&'static str, &'static str)> {
    let mut ns = vec![
        ("xmlns:w", W),
        ("xmlns:r", R),
        ("xmlns:wp", WP),
        ("xmlns:a", A),
        ("xmlns:pic", PIC),
    ];
    if extensions {
        ns.push(("xmlns:mc", MC));
        ns.push(("xmlns:w14", W14));
        ns.push(("xmlns:w15", W15));
        ns.push(("mc:Ignorable", "w14 w15"));
    }
    ns
}

/// Minimal namespace declarations for styles.xml and numbering.xml
pub fn minimal_document_namespaces(extensions: bool) -> Vec<(&'static str, &'static str)> {
    let mut ns = vec![("xmlns:w", W), ("xmlns:r", R)];
    if extensions {
        ns.push(("xmlns:mc", MC));
        ns.push(("xmlns:w14", W14));
        ns.push(("xmlns:w15", W15));
        ns.push(("mc:Ignorable", "w14 w15"));
    }
    ns
}
