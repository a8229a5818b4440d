//! Effective formatting of a node

use super::{ConditionalStyle, FormatDefaults, Style, StyleSheet, StyleType, TableRegion};
use crate::error::Result;
use crate::format::{CellFormat, ParagraphFormat, RowFormat, RunFormat, TableFormat, TableLook};
use crate::node::{NodeArena, NodeData, NodeId, NodeKind};

/// Fully merged formatting of a node
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedStyle {
    pub run: RunFormat,
    pub paragraph: ParagraphFormat,
    pub table: TableFormat,
    pub row: RowFormat,
    pub cell: CellFormat,
    /// Effective paragraph style id
    pub paragraph_style: Option<String>,
    /// Effective character style id
    pub character_style: Option<String>,
    /// Effective table style id
    pub table_style: Option<String>,
}

impl ResolvedStyle {
    fn apply_style(&mut self, style: &Style) {
        self.run.merge(&style.run_format);
        self.paragraph.merge(&style.paragraph_format);
        self.table.merge(&style.table_format);
        self.row.merge(&style.row_format);
        self.cell.merge(&style.cell_format);
    }

    fn apply_conditional(&mut self, cond: &ConditionalStyle) {
        self.run.merge(&cond.run_format);
        self.paragraph.merge(&cond.paragraph_format);
        self.table.merge(&cond.table_format);
        self.row.merge(&cond.row_format);
        self.cell.merge(&cond.cell_format);
    }
}

/// The nodes that contribute formatting to a target node
#[derive(Default)]
struct Context {
    inline: Option<NodeId>,
    paragraph: Option<NodeId>,
    cell: Option<NodeId>,
    row: Option<NodeId>,
    table: Option<NodeId>,
}

/// Resolves effective formatting against a style sheet.
///
/// Layers, lowest priority first: process defaults, document defaults,
/// table style, paragraph style chain, character style chain, table
/// conditional formats, direct formatting. Resolution never fails;
/// unknown style ids contribute nothing.
pub struct StyleResolver<'a> {
    arena: &'a NodeArena,
    styles: &'a StyleSheet,
    defaults: &'a FormatDefaults,
}

impl<'a> StyleResolver<'a> {
    /// Create a resolver
    pub fn new(arena: &'a NodeArena, styles: &'a StyleSheet, defaults: &'a FormatDefaults) -> Self {
        StyleResolver {
            arena,
            styles,
            defaults,
        }
    }

    fn context(&self, node: NodeId) -> Context {
        let mut ctx = Context::default();
        let kind = match self.arena.kind(node) {
            Ok(kind) => kind,
            Err(_) => return ctx,
        };
        match kind {
            k if k.is_inline() => {
                ctx.inline = Some(node);
                ctx.paragraph = self.arena.ancestor(node, NodeKind::Paragraph);
            }
            NodeKind::Paragraph => ctx.paragraph = Some(node),
            NodeKind::Cell => ctx.cell = Some(node),
            NodeKind::Row => ctx.row = Some(node),
            NodeKind::Table => ctx.table = Some(node),
            _ => {}
        }
        let anchor = ctx.paragraph.unwrap_or(node);
        if ctx.cell.is_none() && ctx.row.is_none() && ctx.table.is_none() {
            ctx.cell = self.arena.ancestor(anchor, NodeKind::Cell);
        }
        if let Some(cell) = ctx.cell {
            ctx.row = self.arena.parent(cell);
        }
        if let Some(row) = ctx.row {
            ctx.table = self.arena.parent(row);
        }
        ctx
    }

    fn table_style_id(&self, table: NodeId) -> Option<String> {
        let explicit = self.arena.table(table).ok().and_then(|t| t.style.clone());
        explicit.or_else(|| {
            self.styles
                .default_style(StyleType::Table)
                .map(|s| s.id.clone())
        })
    }

    fn paragraph_style_id(&self, paragraph: NodeId) -> Option<String> {
        let explicit = self
            .arena
            .paragraph(paragraph)
            .ok()
            .and_then(|p| p.style.clone());
        explicit.or_else(|| {
            self.styles
                .default_style(StyleType::Paragraph)
                .map(|s| s.id.clone())
        })
    }

    fn table_format(&self, table: NodeId, style: Option<&str>) -> TableFormat {
        let mut format = TableFormat::default();
        if let Some(id) = style {
            for s in self.styles.chain(id) {
                format.merge(&s.table_format);
            }
        }
        if let Ok(t) = self.arena.table(table) {
            format.merge(&t.format);
        }
        format
    }

    /// Table regions a cell belongs to, lowest priority first
    pub fn table_regions(&self, cell: NodeId) -> Vec<TableRegion> {
        let Some(row) = self.arena.parent(cell) else {
            return Vec::new();
        };
        let Some(table) = self.arena.parent(row) else {
            return Vec::new();
        };
        let style = self.table_style_id(table);
        let format = self.table_format(table, style.as_deref());
        let look = format.look.unwrap_or_default();

        let rows = self.arena.children_of_kind(table, NodeKind::Row);
        let cells = self.arena.children_of_kind(row, NodeKind::Cell);
        let (Some(r), Some(c)) = (
            rows.iter().position(|x| *x == row),
            cells.iter().position(|x| *x == cell),
        ) else {
            return Vec::new();
        };
        regions_for(
            r,
            rows.len(),
            c,
            cells.len(),
            &look,
            format.row_band_size.unwrap_or(1).max(1) as usize,
            format.column_band_size.unwrap_or(1).max(1) as usize,
        )
    }

    /// Only the layers a table style contributes to a node
    fn table_contribution(&self, ctx: &Context) -> ResolvedStyle {
        let mut r = ResolvedStyle::default();
        let Some(table) = ctx.table else {
            return r;
        };
        let Some(style_id) = self.table_style_id(table) else {
            return r;
        };
        let chain = self.styles.chain(&style_id);
        for s in &chain {
            r.apply_style(s);
        }
        if let Some(cell) = ctx.cell {
            for region in self.table_regions(cell) {
                for s in &chain {
                    if let Some(cond) = s.conditional.get(region) {
                        r.apply_conditional(cond);
                    }
                }
            }
        }
        r
    }

    /// Effective formatting of a node
    pub fn resolve(&self, node: NodeId) -> ResolvedStyle {
        let ctx = self.context(node);
        let mut r = ResolvedStyle::default();

        r.run.merge(&self.defaults.run_format());
        r.paragraph.merge(&self.defaults.paragraph_format());
        r.run.merge(&self.styles.doc_defaults.run_format);
        r.paragraph.merge(&self.styles.doc_defaults.paragraph_format);

        let table_chain = ctx
            .table
            .and_then(|t| self.table_style_id(t))
            .map(|id| {
                r.table_style = Some(id.clone());
                self.styles.chain(&id)
            })
            .unwrap_or_default();
        for s in &table_chain {
            r.apply_style(s);
        }

        if let Some(paragraph) = ctx.paragraph {
            if let Some(id) = self.paragraph_style_id(paragraph) {
                for s in self.styles.chain(&id) {
                    r.paragraph.merge(&s.paragraph_format);
                    r.run.merge(&s.run_format);
                }
                r.paragraph_style = Some(id);
            }
        }

        if let Some(inline) = ctx.inline {
            if let Ok(run) = self.arena.run(inline) {
                if let Some(id) = &run.style {
                    for s in self.styles.chain(id) {
                        r.run.merge(&s.run_format);
                    }
                    r.character_style = Some(id.clone());
                }
            }
        }

        if let Some(cell) = ctx.cell {
            for region in self.table_regions(cell) {
                for s in &table_chain {
                    if let Some(cond) = s.conditional.get(region) {
                        r.apply_conditional(cond);
                    }
                }
            }
        }

        if let Some(table) = ctx.table {
            if let Ok(t) = self.arena.table(table) {
                r.table.merge(&t.format);
            }
        }
        if let Some(row) = ctx.row {
            if let Ok(row) = self.arena.row(row) {
                r.row.merge(&row.format);
            }
        }
        if let Some(cell) = ctx.cell {
            if let Ok(cell) = self.arena.cell(cell) {
                r.cell.merge(&cell.format);
            }
        }
        if let Some(paragraph) = ctx.paragraph {
            if let Ok(p) = self.arena.paragraph(paragraph) {
                r.paragraph.merge(&p.format);
                if ctx.inline.is_none() {
                    r.run.merge(&p.mark_format);
                }
            }
        }
        if let Some(inline) = ctx.inline {
            if let Some(format) = self.arena.inline_format(inline) {
                r.run.merge(format);
            }
        }
        r
    }
}

fn regions_for(
    row: usize,
    row_count: usize,
    col: usize,
    col_count: usize,
    look: &TableLook,
    row_band: usize,
    col_band: usize,
) -> Vec<TableRegion> {
    let mut regions = Vec::new();
    let first_row = look.first_row && row == 0;
    let last_row = look.last_row && row + 1 == row_count;
    let first_col = look.first_column && col == 0;
    let last_col = look.last_column && col + 1 == col_count;

    if !look.no_vertical_band && !first_col && !last_col {
        let offset = if look.first_column { 1 } else { 0 };
        let band = col.saturating_sub(offset) / col_band;
        regions.push(if band % 2 == 0 {
            TableRegion::OddColumnBand
        } else {
            TableRegion::EvenColumnBand
        });
    }
    if !look.no_horizontal_band && !first_row && !last_row {
        let offset = if look.first_row { 1 } else { 0 };
        let band = row.saturating_sub(offset) / row_band;
        regions.push(if band % 2 == 0 {
            TableRegion::OddRowBand
        } else {
            TableRegion::EvenRowBand
        });
    }
    if last_col {
        regions.push(TableRegion::LastColumn);
    }
    if first_col {
        regions.push(TableRegion::FirstColumn);
    }
    if last_row {
        regions.push(TableRegion::LastRow);
    }
    if first_row {
        regions.push(TableRegion::FirstRow);
    }
    if first_row && first_col {
        regions.push(TableRegion::TopLeftCell);
    }
    if first_row && last_col {
        regions.push(TableRegion::TopRightCell);
    }
    if last_row && first_col {
        regions.push(TableRegion::BottomLeftCell);
    }
    if last_row && last_col {
        regions.push(TableRegion::BottomRightCell);
    }
    regions.sort_by_key(|r| r.priority());
    regions
}

/// Bake everything a table's style contributes into direct formatting.
///
/// For each property the table style (base or conditional) sets, the
/// resolved value is written to the cell, paragraph and run direct
/// formatting. Direct formatting already present is kept. Running it twice
/// changes nothing.
pub fn expand_table_styles_to_direct_formatting(
    arena: &mut NodeArena,
    styles: &StyleSheet,
    defaults: &FormatDefaults,
    table: NodeId,
) -> Result<()> {
    arena.table(table)?;

    enum Update {
        Cell(CellFormat),
        Paragraph(ParagraphFormat),
        Inline(RunFormat),
    }

    let mut updates: Vec<(NodeId, Update)> = Vec::new();
    {
        let resolver = StyleResolver::new(arena, styles, defaults);
        for row in arena.children_of_kind(table, NodeKind::Row) {
            for cell in arena.children_of_kind(row, NodeKind::Cell) {
                let cell_ctx = resolver.context(cell);
                let contrib = resolver.table_contribution(&cell_ctx);
                let resolved = resolver.resolve(cell);
                let mut format = resolved.cell.restricted_to(&contrib.cell);
                format.merge(&arena.cell(cell)?.format);
                updates.push((cell, Update::Cell(format)));

                for paragraph in arena.child_nodes(cell, NodeKind::Paragraph, true) {
                    // Paragraphs of nested tables follow their own table style
                    if arena.ancestor(paragraph, NodeKind::Table) != Some(table) {
                        continue;
                    }
                    let ctx = resolver.context(paragraph);
                    let contrib = resolver.table_contribution(&ctx);
                    let resolved = resolver.resolve(paragraph);
                    let mut format = resolved.paragraph.restricted_to(&contrib.paragraph);
                    format.merge(&arena.paragraph(paragraph)?.format);
                    updates.push((paragraph, Update::Paragraph(format)));

                    for &inline in arena.children(paragraph) {
                        let Some(direct) = arena.inline_format(inline) else {
                            continue;
                        };
                        let resolved = resolver.resolve(inline);
                        let mut format = resolved.run.restricted_to(&contrib.run);
                        format.merge(direct);
                        updates.push((inline, Update::Inline(format)));
                    }
                }
            }
        }
    }

    for (node, update) in updates {
        match (arena.data_mut(node)?, update) {
            (NodeData::Cell(c), Update::Cell(f)) => c.format = f,
            (NodeData::Paragraph(p), Update::Paragraph(f)) => p.format = f,
            (NodeData::Run(r), Update::Inline(f)) => r.format = f,
            (NodeData::FieldStart(c), Update::Inline(f))
            | (NodeData::FieldSeparator(c), Update::Inline(f))
            | (NodeData::FieldEnd(c), Update::Inline(f)) => c.format = f,
            (NodeData::Shape(s), Update::Inline(f)) => s.format = f,
            _ => {}
        }
    }
    Ok(())
}
