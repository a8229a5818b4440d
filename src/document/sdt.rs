//! Custom XML parts and SDT data binding

use super::Document;
use crate::codec::{same_store_item_id, CustomXmlPart};
use crate::error::{Error, Result};
use crate::node::{NodeData, NodeId, NodeKind, Run, SdtType, XmlMapping};
use crate::warning::{IgnoreWarnings, WarningInfo, WarningKind, WarningSink};

impl Document {
    /// Custom XML parts in package order
    pub fn custom_xml_parts(&self) -> &[CustomXmlPart] {
        &self.custom_xml
    }

    /// Part with the given store item id (braces and case ignored)
    pub fn custom_xml_part(&self, store_item_id: &str) -> Option<&CustomXmlPart> {
        self.custom_xml
            .iter()
            .find(|p| same_store_item_id(&p.id, store_item_id))
    }

    /// Add a part, replacing one with the same store item id; returns the id
    pub fn add_custom_xml_part(&mut self, part: CustomXmlPart) -> String {
        let id = part.id.clone();
        match self
            .custom_xml
            .iter_mut()
            .find(|p| same_store_item_id(&p.id, &id))
        {
            Some(existing) => *existing = part,
            None => self.custom_xml.push(part),
        }
        id
    }

    pub fn remove_custom_xml_part(&mut self, store_item_id: &str) -> Option<CustomXmlPart> {
        let index = self
            .custom_xml
            .iter()
            .position(|p| same_store_item_id(&p.id, store_item_id))?;
        Some(self.custom_xml.remove(index))
    }

    /// Structured document tags in document order
    pub fn structured_document_tags(&self) -> Vec<NodeId> {
        self.child_nodes(NodeKind::StructuredDocumentTag, true)
            .to_vec()
    }

    /// Bind an SDT to `xpath` in a custom XML part and show the bound value.
    ///
    /// Fails with [`Error::MissingReference`] when no part has the id or the
    /// XPath is not supported.
    pub fn set_xml_mapping(&mut self, sdt: NodeId, store_item_id: &str, xpath: &str) -> Result<()> {
        self.arena.sdt(sdt)?;
        let part = self.custom_xml_part(store_item_id).ok_or_else(|| {
            Error::MissingReference(format!("custom XML part {}", store_item_id))
        })?;
        let value = part.evaluate(xpath)?;
        let store_item_id = part.id.clone();

        self.arena.sdt_mut(sdt)?.xml_mapping = Some(XmlMapping {
            store_item_id,
            xpath: xpath.to_string(),
            prefix_mappings: None,
        });
        if let Some(value) = value {
            self.show_mapped_value(sdt, &value)?;
        }
        Ok(())
    }

    /// SDTs whose mapping names a missing custom XML part
    pub fn dangling_xml_mappings(&self) -> Vec<NodeId> {
        self.structured_document_tags()
            .into_iter()
            .filter(|n| {
                self.arena
                    .sdt(*n)
                    .ok()
                    .and_then(|s| s.xml_mapping.as_ref())
                    .map(|m| self.custom_xml_part(&m.store_item_id).is_none())
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Refresh every mapped SDT from its custom XML part; returns how many
    /// were updated. Unresolved mappings are logged.
    pub fn update_mapped_content(&mut self) -> Result<usize> {
        self.update_mapped_content_with_warnings(&mut IgnoreWarnings)
    }

    /// Like [`Document::update_mapped_content`], reporting unresolved
    /// mappings to `warnings`
    pub fn update_mapped_content_with_warnings(
        &mut self,
        warnings: &mut dyn WarningSink,
    ) -> Result<usize> {
        let mut updated = 0;
        for sdt in self.structured_document_tags() {
            let Some(mapping) = self.arena.sdt(sdt)?.xml_mapping.clone() else {
                continue;
            };
            let Some(part) = self.custom_xml_part(&mapping.store_item_id) else {
                warnings.warning(WarningInfo::new(
                    WarningKind::UnresolvedReference,
                    format!("SDT {} maps to missing part {}", sdt, mapping.store_item_id),
                ));
                continue;
            };
            match part.evaluate(&mapping.xpath) {
                Ok(Some(value)) => {
                    self.show_mapped_value(sdt, &value)?;
                    updated += 1;
                }
                Ok(None) => warnings.warning(WarningInfo::new(
                    WarningKind::UnresolvedReference,
                    format!("SDT {}: nothing at {}", sdt, mapping.xpath),
                )),
                Err(e) => warnings.warning(WarningInfo::new(
                    WarningKind::UnresolvedReference,
                    format!("SDT {}: {}", sdt, e),
                )),
            }
        }
        log::debug!("{} mapped SDTs updated", updated);
        Ok(updated)
    }

    fn show_mapped_value(&mut self, sdt: NodeId, value: &str) -> Result<()> {
        let data = self.arena.sdt_mut(sdt)?;
        let text = match data.sdt_type {
            SdtType::Checkbox => {
                let checked = matches!(value.trim(), "true" | "1");
                data.checked = Some(checked);
                return Ok(());
            }
            SdtType::Date => {
                data.full_date = Some(value.to_string());
                value.to_string()
            }
            SdtType::DropDownList | SdtType::ComboBox => data
                .list_items
                .iter()
                .find(|item| item.value == value)
                .map(|item| item.display_text.clone())
                .unwrap_or_else(|| value.to_string()),
            _ => value.to_string(),
        };
        self.set_sdt_text(sdt, &text)
    }

    /// Replace the content of an SDT with plain text.
    ///
    /// Keeps the first paragraph and the formatting of the first run.
    pub fn set_sdt_text(&mut self, sdt: NodeId, text: &str) -> Result<()> {
        self.arena.sdt(sdt)?;
        let first_run = self
            .arena
            .child_nodes(sdt, NodeKind::Run, true)
            .first()
            .and_then(|r| self.arena.run(r).ok())
            .map(|r| (r.style.clone(), r.format.clone()));
        let mut run = Run::new(text);
        if let Some((style, format)) = first_run {
            run.style = style;
            run.format = format;
        }

        let target = if self.arena.is_inline_sdt(sdt) {
            sdt
        } else {
            let paragraph = match self.arena.children_of_kind(sdt, NodeKind::Paragraph).first() {
                Some(&p) => p,
                None if self.arena.children(sdt).is_empty() => {
                    self.arena.create(NodeKind::Paragraph, Some(sdt))?
                }
                None => {
                    return Err(Error::InvalidChild(format!(
                        "{} does not hold paragraphs",
                        sdt
                    )))
                }
            };
            for child in self.arena.children(sdt).to_vec() {
                if child != paragraph {
                    self.revisions.forget_subtree(&self.arena, child);
                    self.arena.remove(child)?;
                }
            }
            paragraph
        };
        for child in self.arena.children(target).to_vec() {
            self.revisions.forget_subtree(&self.arena, child);
            self.arena.remove(child)?;
        }
        self.arena.create_with(NodeData::Run(run), Some(target))?;
        self.update_list_labels()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Sdt;
    use crate::warning::CollectingWarningSink;
    use pretty_assertions::assert_eq;

    const DATA: &str = r#"<?xml version="1.0"?><customer><name>Ada</name><vip>true</vip></customer>"#;

    fn block_sdt(doc: &mut Document, sdt_type: SdtType) -> NodeId {
        let body = doc.last_body().unwrap();
        let sdt = doc
            .arena_mut()
            .create_with(NodeData::StructuredDocumentTag(Sdt::new(sdt_type)), Some(body))
            .unwrap();
        let p = doc.arena_mut().create(NodeKind::Paragraph, Some(sdt)).unwrap();
        doc.arena_mut()
            .create_with(NodeData::Run(Run::new("placeholder")), Some(p))
            .unwrap();
        sdt
    }

    #[test]
    fn test_mapping_shows_value() {
        let mut doc = Document::new();
        let id = doc.add_custom_xml_part(CustomXmlPart::new(DATA));
        let sdt = block_sdt(&mut doc, SdtType::PlainText);

        doc.set_xml_mapping(sdt, &id.to_lowercase(), "/customer/name").unwrap();
        assert_eq!(doc.arena().text(sdt), "Ada");
        let mapping = doc.arena().sdt(sdt).unwrap().xml_mapping.clone().unwrap();
        assert_eq!(mapping.store_item_id, id);
    }

    #[test]
    fn test_checkbox_mapping() {
        let mut doc = Document::new();
        let id = doc.add_custom_xml_part(CustomXmlPart::new(DATA));
        let sdt = block_sdt(&mut doc, SdtType::Checkbox);
        doc.set_xml_mapping(sdt, &id, "/customer/vip").unwrap();
        assert_eq!(doc.arena().sdt(sdt).unwrap().checked, Some(true));
    }

    #[test]
    fn test_mapping_to_unknown_part() {
        let mut doc = Document::new();
        let sdt = block_sdt(&mut doc, SdtType::PlainText);
        let err = doc
            .set_xml_mapping(sdt, "{00000000-0000-0000-0000-000000000000}", "/a")
            .unwrap_err();
        assert!(matches!(err, Error::MissingReference(_)));
    }

    #[test]
    fn test_update_warns_on_dangling_mapping() {
        let mut doc = Document::new();
        let id = doc.add_custom_xml_part(CustomXmlPart::new(DATA));
        let sdt = block_sdt(&mut doc, SdtType::PlainText);
        doc.set_xml_mapping(sdt, &id, "/customer/name").unwrap();
        doc.remove_custom_xml_part(&id).unwrap();
        assert_eq!(doc.dangling_xml_mappings(), vec![sdt]);

        let mut warnings = CollectingWarningSink::new();
        let updated = doc.update_mapped_content_with_warnings(&mut warnings).unwrap();
        assert_eq!(updated, 0);
        assert!(warnings.contains(WarningKind::UnresolvedReference));
        assert_eq!(doc.arena().text(sdt), "Ada");
    }
}
