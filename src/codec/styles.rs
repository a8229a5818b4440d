//! styles.xml

use quick_xml::events::{BytesDecl, BytesEnd, Event};
use quick_xml::{Reader, Writer};

use super::props::{
    assemble, attr, cell_props_element, empty, paragraph_props_element, read_cell_props,
    read_paragraph_props, read_row_props, read_run_props, read_table_props, row_props_element,
    run_props_element, table_props_element, val, val_element,
};
use crate::error::Result;
use crate::style::{ConditionalStyle, Style, StyleSheet, StyleType, TableRegion};
use crate::xml::{
    collect_attrs, minimal_document_namespaces, root_start, strip_extension_attrs, RawXmlElement,
    RawXmlNode,
};

const STYLE_ORDER: &[&str] = &[
    "name",
    "aliases",
    "basedOn",
    "next",
    "link",
    "autoRedefine",
    "hidden",
    "uiPriority",
    "semiHidden",
    "unhideWhenUsed",
    "qFormat",
    "locked",
    "personal",
    "personalCompose",
    "personalReply",
    "rsid",
    "pPr",
    "rPr",
    "tblPr",
    "trPr",
    "tcPr",
    "tblStylePr",
];

const CONDITIONAL_ORDER: &[&str] = &["pPr", "rPr", "tblPr", "trPr", "tcPr"];

fn is_on(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true" | "on"))
}

/// Parse styles.xml
pub(crate) fn read_styles(xml: &str) -> Result<StyleSheet> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut sheet = StyleSheet::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"styles" => {
                sheet.root_declarations = collect_attrs(&e);
            }
            Event::Start(e) => {
                let raw = RawXmlElement::from_reader(&mut reader, &e)?;
                read_root_child(&mut sheet, raw);
            }
            Event::Empty(e) if e.local_name().as_ref() != b"styles" => {
                read_root_child(&mut sheet, RawXmlElement::from_empty(&e));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    log::debug!("styles: {} read", sheet.len());
    Ok(sheet)
}

fn read_root_child(sheet: &mut StyleSheet, raw: RawXmlElement) {
    match raw.local_name() {
        "docDefaults" => {
            for holder in raw.elements() {
                for props in holder.elements() {
                    match props.local_name() {
                        "rPr" => sheet.doc_defaults.run_format = read_run_props(props, false).format,
                        "pPr" => {
                            sheet.doc_defaults.paragraph_format =
                                read_paragraph_props(props, false).format
                        }
                        _ => {}
                    }
                }
            }
        }
        "style" => sheet.add(read_style(&raw)),
        _ => sheet.unknown.push(RawXmlNode::Element(raw)),
    }
}

fn read_style(raw: &RawXmlElement) -> Style {
    let mut style = Style {
        id: attr(raw, "styleId").unwrap_or_default().to_string(),
        style_type: StyleType::parse(attr(raw, "type").unwrap_or("paragraph")),
        is_default: is_on(attr(raw, "default")),
        custom: is_on(attr(raw, "customStyle")),
        ..Default::default()
    };
    for node in &raw.children {
        let RawXmlNode::Element(e) = node else {
            continue;
        };
        match e.local_name() {
            "name" => style.name = val(e).map(String::from),
            "basedOn" => style.based_on = val(e).map(String::from),
            "next" => style.next = val(e).map(String::from),
            "rPr" => style.run_format = read_run_props(e, false).format,
            "pPr" => style.paragraph_format = read_paragraph_props(e, false).format,
            "tblPr" => style.table_format = read_table_props(e).1,
            "trPr" => style.row_format = read_row_props(e).format,
            "tcPr" => style.cell_format = read_cell_props(e),
            "tblStylePr" => match attr(e, "type").and_then(TableRegion::parse) {
                Some(region) => style.conditional.set(region, read_conditional(e)),
                None => style.unknown.push(node.clone()),
            },
            _ => style.unknown.push(node.clone()),
        }
    }
    style
}

fn read_conditional(raw: &RawXmlElement) -> ConditionalStyle {
    let mut conditional = ConditionalStyle::default();
    for node in &raw.children {
        let RawXmlNode::Element(e) = node else {
            continue;
        };
        match e.local_name() {
            "rPr" => conditional.run_format = read_run_props(e, false).format,
            "pPr" => conditional.paragraph_format = read_paragraph_props(e, false).format,
            "tblPr" => conditional.table_format = read_table_props(e).1,
            "trPr" => conditional.row_format = read_row_props(e).format,
            "tcPr" => conditional.cell_format = read_cell_props(e),
            _ => conditional.unknown.push(node.clone()),
        }
    }
    conditional
}

/// Serialize styles.xml
pub(crate) fn write_styles(
    sheet: &StyleSheet,
    declarations: &[(String, String)],
    extensions: bool,
) -> Result<Vec<u8>> {
    let mut w = Writer::new(Vec::new());
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    let ours = minimal_document_namespaces(extensions);
    w.write_event(Event::Start(root_start("w:styles", &ours, declarations)))?;

    let mut defaults = RawXmlElement::new("w:docDefaults");
    let mut run_default = RawXmlElement::new("w:rPrDefault");
    run_default.children.extend(
        run_props_element(None, &sheet.doc_defaults.run_format, Vec::new())
            .map(RawXmlNode::Element),
    );
    let mut paragraph_default = RawXmlElement::new("w:pPrDefault");
    paragraph_default.children.extend(
        paragraph_props_element(None, &sheet.doc_defaults.paragraph_format, Vec::new())
            .map(RawXmlNode::Element),
    );
    defaults = defaults.with_child(run_default).with_child(paragraph_default);
    write_raw(&mut w, &RawXmlNode::Element(defaults), extensions)?;

    for node in &sheet.unknown {
        write_raw(&mut w, node, extensions)?;
    }
    for style in sheet.iter() {
        write_raw(&mut w, &RawXmlNode::Element(style_element(style, extensions)), extensions)?;
    }

    w.write_event(Event::End(BytesEnd::new("w:styles")))?;
    Ok(w.into_inner())
}

fn write_raw(w: &mut Writer<Vec<u8>>, node: &RawXmlNode, extensions: bool) -> Result<()> {
    if extensions {
        node.write_to(w)
    } else {
        strip_extension_attrs(node).write_to(w)
    }
}

fn style_element(style: &Style, extensions: bool) -> RawXmlElement {
    let mut out = Vec::new();
    if let Some(name) = &style.name {
        out.push(val_element("w:name", name.clone()));
    }
    if let Some(based_on) = &style.based_on {
        out.push(val_element("w:basedOn", based_on.clone()));
    }
    if let Some(next) = &style.next {
        out.push(val_element("w:next", next.clone()));
    }
    out.extend(paragraph_props_element(None, &style.paragraph_format, Vec::new()));
    out.extend(run_props_element(None, &style.run_format, Vec::new()));
    out.extend(table_props_element(None, &style.table_format, extensions));
    out.extend(row_props_element(&style.row_format, Vec::new()));
    out.extend(cell_props_element(&style.cell_format));
    for (region, conditional) in style.conditional.iter() {
        let mut parts = Vec::new();
        parts.extend(paragraph_props_element(None, &conditional.paragraph_format, Vec::new()));
        parts.extend(run_props_element(None, &conditional.run_format, Vec::new()));
        parts.extend(table_props_element(None, &conditional.table_format, extensions));
        parts.extend(row_props_element(&conditional.row_format, Vec::new()));
        parts.extend(cell_props_element(&conditional.cell_format));
        let mut element = assemble("w:tblStylePr", CONDITIONAL_ORDER, parts, &conditional.unknown)
            .unwrap_or_else(|| empty("w:tblStylePr"));
        element.attributes.push(("w:type".into(), region.as_str().into()));
        out.push(element);
    }

    let mut element = assemble("w:style", STYLE_ORDER, out, &style.unknown)
        .unwrap_or_else(|| empty("w:style"));
    let mut attributes = vec![("w:type".to_string(), style.style_type.as_str().to_string())];
    if style.is_default {
        attributes.push(("w:default".into(), "1".into()));
    }
    if style.custom {
        attributes.push(("w:customStyle".into(), "1".into()));
    }
    attributes.push(("w:styleId".into(), style.id.clone()));
    element.attributes = attributes;
    element
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:docDefaults>
    <w:rPrDefault><w:rPr><w:sz w:val="22"/><w:lang w:val="en-US"/></w:rPr></w:rPrDefault>
    <w:pPrDefault><w:pPr><w:spacing w:after="160"/></w:pPr></w:pPrDefault>
  </w:docDefaults>
  <w:latentStyles w:defLockedState="0"/>
  <w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style>
  <w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:keepNext/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:sz w:val="32"/></w:rPr></w:style>
  <w:style w:type="table" w:styleId="Grid"><w:name w:val="Grid"/><w:tblStylePr w:type="firstRow"><w:rPr><w:b/></w:rPr><w:tcPr><w:shd w:val="clear" w:fill="DDDDDD"/></w:tcPr></w:tblStylePr></w:style>
</w:styles>"#;

    #[test]
    fn test_read_styles() {
        let sheet = read_styles(STYLES).unwrap();
        assert_eq!(sheet.len(), 3);
        assert_eq!(sheet.doc_defaults.run_format.size, Some(22));
        assert_eq!(sheet.doc_defaults.paragraph_format.spacing_after, Some(160));
        assert_eq!(sheet.unknown.len(), 1);

        let normal = sheet.default_style(StyleType::Paragraph).unwrap();
        assert_eq!(normal.id, "Normal");
        assert_eq!(normal.unknown.len(), 1);

        let heading = sheet.get("Heading1").unwrap();
        assert_eq!(heading.based_on.as_deref(), Some("Normal"));
        assert_eq!(heading.paragraph_format.outline_level, Some(0));
        assert_eq!(heading.run_format.size, Some(32));

        let grid = sheet.get("Grid").unwrap();
        let first_row = grid.conditional.get(TableRegion::FirstRow).unwrap();
        assert_eq!(first_row.cell_format.shading.as_deref(), Some("DDDDDD"));
    }

    #[test]
    fn test_write_styles_is_stable() {
        let sheet = read_styles(STYLES).unwrap();
        let first = write_styles(&sheet, &sheet.root_declarations, true).unwrap();
        let reread = read_styles(std::str::from_utf8(&first).unwrap()).unwrap();
        let second = write_styles(&reread, &reread.root_declarations, true).unwrap();
        assert_eq!(first, second);

        let xml = String::from_utf8(first).unwrap();
        assert!(xml.contains(
            r#"<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:keepNext/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:sz w:val="32"/></w:rPr></w:style>"#
        ));
        assert!(xml.contains(r#"<w:tblStylePr w:type="firstRow">"#));
    }
}
