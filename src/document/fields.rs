//! Complex fields and mail merge regions

use std::collections::{HashMap, HashSet};

use super::Document;
use crate::error::{Error, Result};
use crate::node::{KindFilter, NodeData, NodeId, NodeKind, Run};

const TABLE_START: &str = "TableStart:";
const TABLE_END: &str = "TableEnd:";

/// A complex field: start, optional separator, end
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub start: NodeId,
    pub separator: Option<NodeId>,
    pub end: NodeId,
    /// Instruction text between start and separator
    pub code: String,
    /// Displayed text between separator and end
    pub result: String,
}

impl Field {
    /// First word of the code, upper-cased (`MERGEFIELD`, `PAGE`, ...)
    pub fn field_type(&self) -> String {
        self.code
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_uppercase()
    }

    /// Name of a MERGEFIELD
    pub fn merge_field_name(&self) -> Option<String> {
        merge_field_name(&self.code)
    }
}

/// Field name of a `MERGEFIELD` code, quotes removed.
///
/// ```
/// use linch_docx_dom::document::merge_field_name;
///
/// assert_eq!(merge_field_name(" MERGEFIELD  Name \\* MERGEFORMAT "), Some("Name".into()));
/// assert_eq!(merge_field_name("MERGEFIELD \"First Name\""), Some("First Name".into()));
/// assert_eq!(merge_field_name("PAGE"), None);
/// ```
pub fn merge_field_name(code: &str) -> Option<String> {
    let code = code.trim_start();
    let keyword = code.split_whitespace().next()?;
    if !keyword.eq_ignore_ascii_case("MERGEFIELD") {
        return None;
    }
    let rest = code[keyword.len()..].trim_start();
    let name = match rest.strip_prefix('"') {
        Some(quoted) => quoted.split('"').next()?,
        None => rest.split_whitespace().next()?,
    };
    (!name.is_empty()).then(|| name.to_string())
}

/// Which nodes a region repeats
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionScope {
    /// Rows `first..=last` of a table
    Rows {
        table: NodeId,
        first: NodeId,
        last: NodeId,
    },
    /// Block nodes `first..=last` of a container
    Blocks {
        container: NodeId,
        first: NodeId,
        last: NodeId,
    },
}

/// Content between `TableStart:Name` and `TableEnd:Name` merge fields
#[derive(Clone, Debug, PartialEq)]
pub struct MergeRegion {
    pub name: String,
    pub start_field: NodeId,
    pub end_field: NodeId,
    pub scope: RegionScope,
}

impl RegionScope {
    fn container(&self) -> NodeId {
        match *self {
            RegionScope::Rows { table, .. } => table,
            RegionScope::Blocks { container, .. } => container,
        }
    }

    fn bounds(&self) -> (NodeId, NodeId) {
        match *self {
            RegionScope::Rows { first, last, .. } | RegionScope::Blocks { first, last, .. } => {
                (first, last)
            }
        }
    }
}

#[derive(Default)]
struct OpenField {
    order: usize,
    start: Option<NodeId>,
    separator: Option<NodeId>,
    code: String,
    result: String,
}

impl Document {
    /// Complex fields in document order of their starts
    pub fn fields(&self) -> Vec<Field> {
        let arena = &self.arena;
        let mut open: Vec<OpenField> = Vec::new();
        let mut done: Vec<(usize, Field)> = Vec::new();
        let mut order = 0;

        for node in arena.child_nodes(arena.root(), KindFilter::Any, true) {
            match arena.data(node) {
                Ok(NodeData::FieldStart(_)) => {
                    open.push(OpenField {
                        order,
                        start: Some(node),
                        ..Default::default()
                    });
                    order += 1;
                }
                Ok(NodeData::FieldSeparator(_)) => {
                    if let Some(top) = open.last_mut() {
                        top.separator = Some(node);
                    }
                }
                Ok(NodeData::FieldEnd(_)) => {
                    let Some(field) = open.pop() else {
                        log::debug!("field end {} without a start", node);
                        continue;
                    };
                    if let Some(start) = field.start {
                        done.push((
                            field.order,
                            Field {
                                start,
                                separator: field.separator,
                                end: node,
                                code: field.code,
                                result: field.result,
                            },
                        ));
                    }
                }
                Ok(NodeData::Run(run)) => {
                    let text = run.text();
                    for field in &mut open {
                        if field.separator.is_none() {
                            field.code.push_str(&text);
                        } else {
                            field.result.push_str(&text);
                        }
                    }
                }
                _ => {}
            }
        }

        done.sort_by_key(|(order, _)| *order);
        done.into_iter().map(|(_, field)| field).collect()
    }

    /// Replace the displayed result of the field starting at `start`.
    ///
    /// The new text takes the formatting of the first old result run.
    pub fn set_field_result(&mut self, start: NodeId, text: &str) -> Result<()> {
        let field = self
            .fields()
            .into_iter()
            .find(|f| f.start == start)
            .ok_or_else(|| Error::MissingReference(format!("no field starts at {}", start)))?;
        let parent = self
            .arena
            .parent(field.end)
            .ok_or_else(|| Error::InvalidChild(format!("{} is detached", field.end)))?;

        let old: Vec<NodeId> = match field.separator {
            Some(separator) => {
                if self.arena.parent(separator) != Some(parent) {
                    return Err(Error::InvalidChild(
                        "field result spans paragraphs".into(),
                    ));
                }
                let from = self.arena.index_in_parent(separator).unwrap_or(0) + 1;
                let to = self.arena.index_in_parent(field.end).unwrap_or(from);
                self.arena.children(parent)[from..to].to_vec()
            }
            None => Vec::new(),
        };

        let mut run = Run::new(text);
        if let Some(format) = old
            .iter()
            .find_map(|n| self.arena.run(*n).ok())
            .map(|r| (r.style.clone(), r.format.clone()))
        {
            run.style = format.0;
            run.format = format.1;
        } else if let Ok(start) = self.arena.field_char(start) {
            run.format = start.format.clone();
        }

        for node in old {
            self.revisions.remove_node(&mut self.arena, node)?;
        }
        if field.separator.is_none() {
            let separator = self.arena.create(NodeKind::FieldSeparator, None)?;
            if let Ok(start) = self.arena.field_char(start) {
                let format = start.format.clone();
                if let NodeData::FieldSeparator(sep) = self.arena.data_mut(separator)? {
                    sep.format = format;
                }
            }
            self.arena.insert_before(parent, separator, field.end)?;
            self.revisions.track_insertion(&self.arena, separator);
        }
        let new_run = self.arena.create_with(NodeData::Run(run), None)?;
        self.arena.insert_before(parent, new_run, field.end)?;
        self.revisions.track_insertion(&self.arena, new_run);
        Ok(())
    }

    /// Mail merge regions in document order.
    ///
    /// Fails with [`Error::AmbiguousMerge`] on unbalanced markers or
    /// duplicate region names.
    pub fn mail_merge_regions(&self) -> Result<Vec<MergeRegion>> {
        let mut stack: Vec<(String, NodeId)> = Vec::new();
        let mut regions = Vec::new();
        let mut seen = HashSet::new();

        for field in self.fields() {
            let Some(name) = field.merge_field_name() else {
                continue;
            };
            if let Some(region) = name.strip_prefix(TABLE_START) {
                stack.push((region.to_string(), field.start));
            } else if let Some(region) = name.strip_prefix(TABLE_END) {
                let (open, start) = stack.pop().ok_or_else(|| {
                    Error::AmbiguousMerge(format!("TableEnd:{} without TableStart", region))
                })?;
                if open != region {
                    return Err(Error::AmbiguousMerge(format!(
                        "TableEnd:{} closes region '{}'",
                        region, open
                    )));
                }
                if !seen.insert(open.clone()) {
                    return Err(Error::AmbiguousMerge(format!(
                        "region '{}' appears more than once",
                        open
                    )));
                }
                let scope = self.region_scope(start, field.end)?;
                regions.push(MergeRegion {
                    name: open,
                    start_field: start,
                    end_field: field.end,
                    scope,
                });
            }
        }
        if let Some((name, _)) = stack.pop() {
            return Err(Error::AmbiguousMerge(format!(
                "TableStart:{} is never closed",
                name
            )));
        }
        Ok(regions)
    }

    fn region_scope(&self, start: NodeId, end: NodeId) -> Result<RegionScope> {
        let arena = &self.arena;
        let first_row = arena.ancestor(start, NodeKind::Row);
        let last_row = arena.ancestor(end, NodeKind::Row);
        if let (Some(first), Some(last)) = (first_row, last_row) {
            let table = arena.parent(first);
            if table.is_some() && table == arena.parent(last) {
                if let Some(table) = table {
                    return Ok(RegionScope::Rows { table, first, last });
                }
            }
        }

        let p1 = arena
            .ancestor(start, NodeKind::Paragraph)
            .ok_or_else(|| Error::AmbiguousMerge(format!("{} is outside a paragraph", start)))?;
        let p2 = arena
            .ancestor(end, NodeKind::Paragraph)
            .ok_or_else(|| Error::AmbiguousMerge(format!("{} is outside a paragraph", end)))?;
        let container = arena
            .ancestors(p1)
            .find(|a| arena.is_ancestor_or_self(*a, p2))
            .ok_or_else(|| Error::AmbiguousMerge("region markers share no container".into()))?;
        let block_under = |node: NodeId| {
            std::iter::once(node)
                .chain(arena.ancestors(node))
                .find(|n| arena.parent(*n) == Some(container))
        };
        match (block_under(p1), block_under(p2)) {
            (Some(first), Some(last)) => Ok(RegionScope::Blocks {
                container,
                first,
                last,
            }),
            _ => Err(Error::AmbiguousMerge("region markers share no container".into())),
        }
    }

    /// Repeat the region `name` so it appears `copies` times.
    ///
    /// The original is the first instance; zero copies removes it. Returns
    /// the top-level nodes of each instance.
    pub fn duplicate_region(&mut self, name: &str, copies: usize) -> Result<Vec<Vec<NodeId>>> {
        let region = self
            .mail_merge_regions()?
            .into_iter()
            .find(|r| r.name == name)
            .ok_or_else(|| {
                Error::MissingReference(format!("no mail merge region '{}'", name))
            })?;
        let container = region.scope.container();
        let (first, last) = region.scope.bounds();
        let from = self.arena.index_in_parent(first).unwrap_or(0);
        let to = self.arena.index_in_parent(last).unwrap_or(from);
        let nodes = self.arena.children(container)[from..=to].to_vec();

        if copies == 0 {
            for node in nodes {
                self.revisions.remove_node(&mut self.arena, node)?;
            }
            self.after_edit(Some(container))?;
            return Ok(Vec::new());
        }

        let mut instances = vec![nodes.clone()];
        let mut insert_at = to + 1;
        for _ in 1..copies {
            let mut instance = Vec::with_capacity(nodes.len());
            for &node in &nodes {
                let mut map = HashMap::new();
                let copy = self.arena.clone_node_mapped(node, &mut map)?;
                self.arena.insert_at(container, insert_at, copy)?;
                self.revisions.track_insertion(&self.arena, copy);
                insert_at += 1;
                instance.push(copy);
            }
            instances.push(instance);
        }
        log::debug!("region '{}' repeated {} times", name, copies);
        self.after_edit(Some(container))?;
        Ok(instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::FieldChar;
    use pretty_assertions::assert_eq;

    fn add_field(doc: &mut Document, paragraph: NodeId, code: &str, result: &str) -> NodeId {
        let arena = doc.arena_mut();
        let start = arena
            .create_with(NodeData::FieldStart(FieldChar::default()), Some(paragraph))
            .unwrap();
        arena
            .create_with(NodeData::Run(Run::new(code)), Some(paragraph))
            .unwrap();
        arena
            .create_with(NodeData::FieldSeparator(FieldChar::default()), Some(paragraph))
            .unwrap();
        arena
            .create_with(NodeData::Run(Run::new(result)), Some(paragraph))
            .unwrap();
        arena
            .create_with(NodeData::FieldEnd(FieldChar::default()), Some(paragraph))
            .unwrap();
        start
    }

    #[test]
    fn test_fields_and_result() {
        let mut doc = Document::new();
        let p = doc.add_paragraph("Dear ").unwrap();
        let start = add_field(&mut doc, p, " MERGEFIELD Name ", "«Name»");

        let fields = doc.fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_type(), "MERGEFIELD");
        assert_eq!(fields[0].merge_field_name().as_deref(), Some("Name"));
        assert_eq!(fields[0].result, "«Name»");

        doc.set_field_result(start, "Ada").unwrap();
        assert_eq!(doc.fields()[0].result, "Ada");
        assert_eq!(doc.arena().text(p), "Dear Ada");
    }

    #[test]
    fn test_nested_field_code() {
        let mut doc = Document::new();
        let p = doc.add_paragraph("").unwrap();
        let arena = doc.arena_mut();
        for data in [
            NodeData::FieldStart(FieldChar::default()),
            NodeData::Run(Run::new("IF ")),
            NodeData::FieldStart(FieldChar::default()),
            NodeData::Run(Run::new("PAGE")),
            NodeData::FieldSeparator(FieldChar::default()),
            NodeData::Run(Run::new("2")),
            NodeData::FieldEnd(FieldChar::default()),
            NodeData::Run(Run::new(" > 1")),
            NodeData::FieldEnd(FieldChar::default()),
        ] {
            arena.create_with(data, Some(p)).unwrap();
        }

        let fields = doc.fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].code, "IF PAGE2 > 1");
        assert_eq!(fields[0].separator, None);
        assert_eq!(fields[1].code, "PAGE");
        assert_eq!(fields[1].result, "2");
    }

    #[test]
    fn test_duplicate_block_region() {
        let mut doc = Document::new();
        let open = doc.add_paragraph("").unwrap();
        add_field(&mut doc, open, "MERGEFIELD TableStart:Items", "");
        doc.add_paragraph("row").unwrap();
        let close = doc.add_paragraph("").unwrap();
        add_field(&mut doc, close, "MERGEFIELD TableEnd:Items", "");

        let regions = doc.mail_merge_regions().unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].name, "Items");

        let instances = doc.duplicate_region("Items", 3).unwrap();
        assert_eq!(instances.len(), 3);
        assert!(instances.iter().all(|i| i.len() == 3));
        assert_eq!(doc.paragraphs().len(), 10);

        // Copies repeat the markers, so the name is no longer unique
        assert!(matches!(
            doc.mail_merge_regions(),
            Err(Error::AmbiguousMerge(_))
        ));
    }

    #[test]
    fn test_duplicate_table_rows() {
        let mut doc = Document::new();
        let table = doc.add_table(3, 1).unwrap();
        let rows = doc.arena().children(table).to_vec();
        let first = doc.arena().child_nodes(rows[1], NodeKind::Paragraph, true).first().unwrap();
        add_field(&mut doc, first, "MERGEFIELD TableStart:Orders", "");
        add_field(&mut doc, first, "MERGEFIELD TableEnd:Orders", "");

        let regions = doc.mail_merge_regions().unwrap();
        assert!(matches!(regions[0].scope, RegionScope::Rows { .. }));

        doc.duplicate_region("Orders", 0).unwrap();
        assert_eq!(doc.arena().children(table).len(), 2);
    }

    #[test]
    fn test_unbalanced_region() {
        let mut doc = Document::new();
        let p = doc.add_paragraph("").unwrap();
        add_field(&mut doc, p, "MERGEFIELD TableEnd:Lost", "");
        assert!(matches!(
            doc.mail_merge_regions(),
            Err(Error::AmbiguousMerge(_))
        ));
        assert!(matches!(
            doc.duplicate_region("Other", 1),
            Err(Error::AmbiguousMerge(_))
        ));
    }
}
