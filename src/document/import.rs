//! Bringing content from another document

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::Document;
use crate::codec::same_store_item_id;
use crate::error::{Error, Result};
use crate::node::{KindFilter, NodeData, NodeId};
use crate::numbering::import_lists;
use crate::opc::{rel_types, well_known, Part, PartUri, TargetMode, MAIN_DOCUMENT};
use crate::style::StyleSheet;

/// How clashing style ids are settled on import
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ImportFormatMode {
    /// The destination definition wins; imported content may change look
    #[default]
    UseDestinationStyles,
    /// A differing source definition is copied under a fresh id
    KeepSourceFormatting,
}

/// Options for [`Document::append_document`] and [`Document::import_node`]
#[derive(Clone, Debug, Default)]
pub struct ImportOptions {
    pub format_mode: ImportFormatMode,
    /// Copy every incoming list instead of reusing equal destination lists
    pub keep_source_numbering: bool,
}

impl ImportOptions {
    pub fn with_format_mode(mut self, mode: ImportFormatMode) -> Self {
        self.format_mode = mode;
        self
    }

    pub fn with_keep_source_numbering(mut self, keep: bool) -> Self {
        self.keep_source_numbering = keep;
        self
    }
}

/// Style ids referenced from a subtree
fn referenced_styles(source: &Document, node: NodeId) -> BTreeSet<String> {
    let arena = &source.arena;
    let mut ids = BTreeSet::new();
    let nodes = std::iter::once(node).chain(arena.child_nodes(node, KindFilter::Any, true));
    for n in nodes {
        let style = match arena.data(n) {
            Ok(NodeData::Paragraph(p)) => p.style.clone(),
            Ok(NodeData::Run(r)) => r.style.clone(),
            Ok(NodeData::Table(t)) => t.style.clone(),
            Ok(NodeData::Comment(c)) => c.reference_style.clone(),
            _ => None,
        };
        ids.extend(style);
    }
    ids
}

/// Close a set of style ids over `based_on` and `next`
fn with_dependencies(styles: &StyleSheet, mut ids: BTreeSet<String>) -> BTreeSet<String> {
    let mut pending: Vec<String> = ids.iter().cloned().collect();
    while let Some(id) = pending.pop() {
        let Some(style) = styles.get(&id) else {
            continue;
        };
        for dep in [&style.based_on, &style.next].into_iter().flatten() {
            if ids.insert(dep.clone()) {
                pending.push(dep.clone());
            }
        }
    }
    ids
}

/// Id, list and relationship remapping for one import
struct ImportContext {
    styles: HashMap<String, String>,
    lists: HashMap<u32, u32>,
    /// Source relationship id of the main part to the destination id
    relationships: HashMap<String, String>,
    /// Source part to its copy in the destination package
    parts: BTreeMap<PartUri, PartUri>,
}

impl ImportContext {
    fn style(&self, id: &Option<String>) -> Option<String> {
        id.as_ref()
            .map(|id| self.styles.get(id).cloned().unwrap_or_else(|| id.clone()))
    }
}

impl Document {
    /// Copy styles and lists the subtrees at `roots` need from `source`
    fn prepare_import(
        &mut self,
        source: &Document,
        roots: &[NodeId],
        options: &ImportOptions,
    ) -> ImportContext {
        let lists = import_lists(
            &mut self.numbering,
            &source.numbering,
            options.keep_source_numbering,
        );

        let mut referenced = BTreeSet::new();
        for &root in roots {
            referenced.extend(referenced_styles(source, root));
        }
        let needed = with_dependencies(&source.styles, referenced);
        let mut renames = HashMap::new();
        let mut copies = Vec::new();
        for id in &needed {
            let Some(style) = source.styles.get(id) else {
                continue;
            };
            match self.styles.get(id) {
                None => copies.push(style.clone()),
                Some(existing) => {
                    let keep = options.format_mode == ImportFormatMode::KeepSourceFormatting
                        && !existing.same_definition(style);
                    if keep {
                        let new_id = self.styles.unique_id(id);
                        log::debug!("import: style '{}' copied as '{}'", id, new_id);
                        renames.insert(id.clone(), new_id.clone());
                        let mut copy = style.clone();
                        copy.id = new_id;
                        copy.is_default = false;
                        copies.push(copy);
                    }
                }
            }
        }

        let context = ImportContext {
            styles: renames,
            lists,
            relationships: HashMap::new(),
            parts: BTreeMap::new(),
        };
        for mut style in copies {
            style.based_on = context.style(&style.based_on);
            style.next = context.style(&style.next);
            if let Some(numbering) = style.paragraph_format.numbering.as_mut() {
                if let Some(&mapped) = context.lists.get(&numbering.num_id) {
                    numbering.num_id = mapped;
                }
            }
            self.styles.add(style);
        }
        context
    }

    /// Main document part of the package, added when missing
    fn ensure_main_part(&mut self) -> PartUri {
        if let Some(main) = self.package.main_document_part() {
            return main.uri().clone();
        }
        let uri = well_known::document();
        if self.package.part(&uri).is_none() {
            self.package
                .add_part(Part::new(uri.clone(), MAIN_DOCUMENT, Vec::new()));
        }
        self.package
            .add_relationship(rel_types::OFFICE_DOCUMENT, uri.as_str().trim_start_matches('/'));
        uri
    }

    /// Copy the main-part relationships `nodes` refer to, with their
    /// target parts, and record the destination ids in `context`
    fn import_relationships(
        &mut self,
        source: &Document,
        nodes: &[NodeId],
        context: &mut ImportContext,
    ) -> Result<()> {
        let mut ids: Vec<String> = Vec::new();
        for &n in nodes {
            for id in self.arena.data_mut(n)?.relationship_ids() {
                if !context.relationships.contains_key(&id) && !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        if ids.is_empty() {
            return Ok(());
        }

        let source_main = source.package.main_document_part();
        let source_rels = source_main.and_then(|p| p.relationships());
        let dest_main = self.ensure_main_part();
        for id in ids {
            let (Some(main), Some(rel)) = (source_main, source_rels.and_then(|r| r.get(&id)))
            else {
                log::warn!("import: relationship {} not found in source", id);
                continue;
            };
            let target = match rel.target_mode {
                TargetMode::External => rel.target.clone(),
                TargetMode::Internal => {
                    let uri = main.uri().resolve(&rel.target)?;
                    if source.package.part(&uri).is_none() {
                        log::warn!("import: relationship {} targets missing part {}", id, uri);
                        continue;
                    }
                    self.package
                        .import_part(&source.package, &uri, &mut context.parts)?
                        .relative_from(&dest_main)
                }
            };

            let rels = self
                .package
                .part_mut(&dest_main)
                .ok_or_else(|| Error::PartNotFound(dest_main.to_string()))?
                .ensure_relationships();
            let existing = rels
                .find(&rel.rel_type, &target)
                .filter(|r| r.target_mode == rel.target_mode)
                .map(|r| r.id.clone());
            let new_id = match (existing, rel.target_mode) {
                (Some(existing), _) => existing,
                (None, TargetMode::External) => rels.add_external(&rel.rel_type, &target),
                (None, TargetMode::Internal) => rels.add(&rel.rel_type, &target),
            };
            log::debug!("import: relationship {} -> {} ({})", id, new_id, target);
            context.relationships.insert(id, new_id);
        }
        Ok(())
    }

    /// Rewrite style, list, relationship and comment references of
    /// imported nodes
    fn rewrite_imported(
        &mut self,
        source: &Document,
        copy: NodeId,
        context: &mut ImportContext,
    ) -> Result<()> {
        let mut next_comment = self
            .comments()
            .iter()
            .filter(|c| !self.arena.is_ancestor_or_self(copy, **c))
            .filter_map(|c| self.arena.comment(*c).ok())
            .filter_map(|c| c.id.parse::<u32>().ok())
            .max()
            .map(|id| id + 1)
            .unwrap_or(0);

        let nodes: Vec<NodeId> = std::iter::once(copy)
            .chain(self.arena.child_nodes(copy, KindFilter::Any, true))
            .collect();
        self.import_relationships(source, &nodes, context)?;

        for n in nodes {
            let data = self.arena.data_mut(n)?;
            data.rename_relationship_ids(&context.relationships);
            match data {
                NodeData::Paragraph(p) => {
                    p.style = context.style(&p.style);
                    if let Some(numbering) = p.format.numbering.as_mut() {
                        if let Some(&mapped) = context.lists.get(&numbering.num_id) {
                            numbering.num_id = mapped;
                        }
                    }
                }
                NodeData::Run(r) => r.style = context.style(&r.style),
                NodeData::Table(t) => t.style = context.style(&t.style),
                NodeData::Comment(c) => {
                    c.reference_style = context.style(&c.reference_style);
                    c.id = next_comment.to_string();
                    next_comment += 1;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Copy a node of `source` into this document, detached.
    ///
    /// Styles, lists and related parts (images, hyperlink targets) it
    /// references come along; insert the copy with
    /// [`Document::insert_node`].
    pub fn import_node(
        &mut self,
        source: &Document,
        node: NodeId,
        options: &ImportOptions,
    ) -> Result<NodeId> {
        let mut context = self.prepare_import(source, &[node], options);
        let mut map = HashMap::new();
        let copy = self
            .arena
            .import_node_mapped(&source.arena, node, true, &mut map)?;
        self.revisions.import_from(&source.revisions, &map);
        self.rewrite_imported(source, copy, &mut context)?;
        Ok(copy)
    }

    /// Append every section of `source` after the last section.
    ///
    /// Styles and lists are mapped once for the whole source, so a list
    /// running across sections stays one list.
    pub fn append_document(&mut self, source: &Document, options: &ImportOptions) -> Result<()> {
        let sections = source.sections();
        if sections.is_empty() {
            return Err(Error::InvalidChild("source document has no sections".into()));
        }
        log::debug!("appending {} sections", sections.len());
        let mut context = self.prepare_import(source, &sections, options);
        let root = self.arena.root();
        for section in sections {
            let mut map = HashMap::new();
            let copy = self
                .arena
                .import_node_mapped(&source.arena, section, true, &mut map)?;
            self.revisions.import_from(&source.revisions, &map);
            self.rewrite_imported(source, copy, &mut context)?;
            self.arena.append_child(root, copy)?;
            self.revisions.track_insertion(&self.arena, copy);
        }

        for part in &source.custom_xml {
            if !self
                .custom_xml
                .iter()
                .any(|p| same_store_item_id(&p.id, &part.id))
            {
                self.custom_xml.push(part.clone());
            }
        }
        self.update_list_labels()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{NumberingRef, ParagraphFormat, RunFormat};
    use crate::node::NodeKind;
    use crate::style::{Style, StyleType};
    use pretty_assertions::assert_eq;

    fn document_with_heading(size: u32) -> (Document, NodeId) {
        let mut doc = Document::new();
        doc.styles_mut().add(
            Style::new("Custom", StyleType::Paragraph)
                .with_based_on("Normal")
                .with_run_format(RunFormat {
                    size: Some(size),
                    ..Default::default()
                }),
        );
        let p = doc.add_paragraph("Heading text").unwrap();
        doc.arena_mut().paragraph_mut(p).unwrap().style = Some("Custom".into());
        (doc, p)
    }

    #[test]
    fn test_append_uses_destination_styles() {
        let (mut dest, _) = document_with_heading(40);
        let (source, _) = document_with_heading(20);
        let before = dest.styles().len();

        dest.append_document(&source, &ImportOptions::default()).unwrap();
        assert_eq!(dest.sections().len(), 2);
        assert_eq!(dest.styles().len(), before);
        assert_eq!(dest.styles().get("Custom").unwrap().run_format.size, Some(40));
    }

    #[test]
    fn test_append_keeps_source_formatting() {
        let (mut dest, _) = document_with_heading(40);
        let (source, _) = document_with_heading(20);
        let options =
            ImportOptions::default().with_format_mode(ImportFormatMode::KeepSourceFormatting);

        dest.append_document(&source, &options).unwrap();
        let copied = dest.styles().get("Custom_0").unwrap();
        assert_eq!(copied.run_format.size, Some(20));

        let last = *dest.paragraphs().last().unwrap();
        let p = dest.arena().paragraph(last).unwrap();
        assert_eq!(p.style.as_deref(), Some("Custom_0"));
        assert_eq!(dest.resolved_style(last).run.size, Some(20));
    }

    #[test]
    fn test_import_node_remaps_lists() {
        let mut source = Document::new();
        let num_id = source.numbering_mut().add_decimal_list();
        let p = source.add_paragraph("Item").unwrap();
        source
            .set_paragraph_format(
                p,
                None,
                ParagraphFormat {
                    numbering: Some(NumberingRef::new(num_id, 0)),
                    ..Default::default()
                },
            )
            .unwrap();

        let mut dest = Document::new();
        dest.numbering_mut().add_bullet_list();
        let options = ImportOptions::default().with_keep_source_numbering(true);
        let copy = dest.import_node(&source, p, &options).unwrap();
        let body = dest.last_body().unwrap();
        dest.insert_node(body, 1, copy).unwrap();

        let numbering = dest.arena().paragraph(copy).unwrap().format.numbering.unwrap();
        assert_ne!(numbering.num_id, num_id);
        assert!(!dest.numbering().is_bullet_list(numbering.num_id));
        assert_eq!(dest.list_label(copy).unwrap(), Some("1."));
    }

    #[test]
    fn test_import_renumbers_comments() {
        let mut dest = Document::new();
        let p = dest.add_paragraph("Dest").unwrap();
        dest.add_comment(p, "A", None, "first").unwrap();

        let mut source = Document::new();
        let sp = source.add_paragraph("Source").unwrap();
        source.add_comment(sp, "B", None, "second").unwrap();

        dest.append_document(&source, &ImportOptions::default()).unwrap();
        let ids: Vec<String> = dest
            .comments()
            .iter()
            .map(|c| dest.arena().comment(*c).unwrap().id.clone())
            .collect();
        assert_eq!(ids, vec!["0".to_string(), "1".to_string()]);
        assert_eq!(dest.arena().kind(dest.comments()[1]).unwrap(), NodeKind::Comment);
    }
}
