//! Cell merge normalization
//!
//! Word stores a horizontally merged range either as one wide cell
//! (`w:gridSpan`, or a width covering several grid columns) or as a run of
//! cells flagged `First`, `Previous`, `Previous`, ... The functions here
//! convert between the two and repair broken flag runs after edits.

use crate::error::Result;
use crate::format::{CellFormat, CellMerge};
use crate::node::{NodeArena, NodeData, NodeId, NodeKind};

/// Tolerance when matching a cell width against grid columns, twips
pub const MERGE_WIDTH_EPSILON: i32 = 20;

/// Number of grid columns: the declared grid or the widest row
pub fn grid_column_count(arena: &NodeArena, table: NodeId) -> Result<usize> {
    let declared = arena.table(table)?.grid.len();
    let widest = arena
        .children_of_kind(table, NodeKind::Row)
        .into_iter()
        .map(|row| {
            arena
                .children_of_kind(row, NodeKind::Cell)
                .into_iter()
                .map(|c| arena.cell(c).map(|c| c.format.span() as usize).unwrap_or(1))
                .sum::<usize>()
        })
        .max()
        .unwrap_or(0);
    Ok(declared.max(widest))
}

fn cells_of(arena: &NodeArena, row: NodeId) -> Vec<NodeId> {
    arena.children_of_kind(row, NodeKind::Cell)
}

fn format_of(arena: &NodeArena, cell: NodeId) -> CellFormat {
    arena
        .cell(cell)
        .map(|c| c.format.clone())
        .unwrap_or_default()
}

/// Grid columns a cell covers, from `grid_span` or its width
fn span_from_width(grid: &[i32], start: usize, width: i32, cells_after: usize) -> usize {
    let mut sum: i32 = 0;
    for (k, col) in grid.iter().enumerate().skip(start) {
        sum = sum.saturating_add(*col);
        let span = k - start + 1;
        if grid.len() - (k + 1) < cells_after {
            break;
        }
        if sum.abs_diff(width) <= MERGE_WIDTH_EPSILON.unsigned_abs() {
            return span;
        }
        if sum > width.saturating_add(MERGE_WIDTH_EPSILON) {
            break;
        }
    }
    1
}

/// Split wide cells into `First` + `Previous` runs.
///
/// Only rows with fewer physical cells than grid columns and no merge
/// flags are touched.
pub fn convert_to_horizontally_merged_cells(arena: &mut NodeArena, table: NodeId) -> Result<()> {
    let grid = arena.table(table)?.grid.clone();
    let columns = grid_column_count(arena, table)?;

    for row in arena.children_of_kind(table, NodeKind::Row) {
        let cells = cells_of(arena, row);
        if cells.len() >= columns {
            continue;
        }
        if cells
            .iter()
            .any(|c| format_of(arena, *c).horizontal_merge != CellMerge::None)
        {
            continue;
        }

        let mut col = 0;
        for (i, &cell) in cells.iter().enumerate() {
            let format = format_of(arena, cell);
            let cells_after = cells.len() - i - 1;
            let span = match (format.grid_span, format.width) {
                (Some(s), _) if s > 1 => s as usize,
                (_, Some(w)) if !grid.is_empty() => span_from_width(&grid, col, w, cells_after),
                _ => 1,
            };
            if span > 1 {
                split_cell(arena, row, cell, &format, &grid, col, span)?;
            }
            col += span;
        }
    }
    log::debug!("converted {} to horizontally merged cells", table);
    Ok(())
}

fn split_cell(
    arena: &mut NodeArena,
    row: NodeId,
    cell: NodeId,
    format: &CellFormat,
    grid: &[i32],
    col: usize,
    span: usize,
) -> Result<()> {
    let total = format.width;
    let width_at = |k: usize| -> Option<i32> {
        grid.get(col + k)
            .copied()
            .or_else(|| total.map(|w| w / span as i32))
    };

    let mut first = format.clone();
    first.grid_span = None;
    first.horizontal_merge = CellMerge::First;
    first.width = width_at(0);
    arena.cell_mut(cell)?.format = first;

    let mut anchor = cell;
    for k in 1..span {
        let mut rest = format.clone();
        rest.grid_span = None;
        rest.horizontal_merge = CellMerge::Previous;
        rest.width = width_at(k);
        let new_cell = arena.create_with(
            NodeData::Cell(crate::node::Cell { format: rest }),
            None,
        )?;
        arena.create(NodeKind::Paragraph, Some(new_cell))?;
        arena.insert_after(row, new_cell, anchor)?;
        anchor = new_cell;
    }
    Ok(())
}

/// Whether a cell holds nothing but one empty paragraph
fn is_blank_cell(arena: &NodeArena, cell: NodeId) -> bool {
    match arena.children(cell) {
        [] => true,
        [only] => {
            arena.kind(*only).ok() == Some(NodeKind::Paragraph) && arena.children(*only).is_empty()
        }
        _ => false,
    }
}

/// Collapse `First` + `Previous` runs into single wide cells.
///
/// The surviving cell's width is the sum of the run and its `grid_span`
/// the run length; content of the dropped cells moves into it in order.
/// Rows that also use `grid_span` are left untouched.
pub fn convert_to_merged_cells_by_width(arena: &mut NodeArena, table: NodeId) -> Result<()> {
    arena.table(table)?;
    for row in arena.children_of_kind(table, NodeKind::Row) {
        let cells = cells_of(arena, row);
        let formats: Vec<CellFormat> = cells.iter().map(|c| format_of(arena, *c)).collect();
        if formats.iter().any(|f| f.span() > 1) {
            continue;
        }

        let mut i = 0;
        while i < cells.len() {
            if formats[i].horizontal_merge == CellMerge::None {
                i += 1;
                continue;
            }
            let mut end = i + 1;
            while end < cells.len() && formats[end].horizontal_merge == CellMerge::Previous {
                end += 1;
            }
            if end - i > 1 {
                collapse_run(arena, &cells[i..end], &formats[i..end])?;
            } else {
                arena.cell_mut(cells[i])?.format.horizontal_merge = CellMerge::None;
            }
            i = end;
        }
    }
    log::debug!("converted {} to merged cells by width", table);
    Ok(())
}

fn collapse_run(arena: &mut NodeArena, cells: &[NodeId], formats: &[CellFormat]) -> Result<()> {
    let survivor = cells[0];
    let width = formats
        .iter()
        .try_fold(0i32, |sum, f| f.width.map(|w| sum.saturating_add(w)));

    for &dropped in &cells[1..] {
        if !is_blank_cell(arena, dropped) {
            for child in arena.children(dropped).to_vec() {
                arena.append_child(survivor, child)?;
            }
        }
        arena.remove(dropped)?;
    }

    let format = &mut arena.cell_mut(survivor)?.format;
    format.horizontal_merge = CellMerge::None;
    format.grid_span = Some(cells.len() as u32);
    if width.is_some() {
        format.width = width;
    }
    Ok(())
}

/// Repair merge flags after cells were added, removed or resized.
///
/// An orphaned `Previous` (nothing to continue) starts a new range; a
/// `First` with no `Previous` after it is cleared. Both directions.
pub fn normalize_merges(arena: &mut NodeArena, table: NodeId) -> Result<()> {
    arena.table(table)?;
    let rows = arena.children_of_kind(table, NodeKind::Row);

    // Horizontal
    for &row in &rows {
        let cells = cells_of(arena, row);
        let mut previous = CellMerge::None;
        for &cell in &cells {
            let format = &mut arena.cell_mut(cell)?.format;
            if format.horizontal_merge == CellMerge::Previous && previous == CellMerge::None {
                format.horizontal_merge = CellMerge::First;
            }
            previous = format.horizontal_merge;
        }
        for (i, &cell) in cells.iter().enumerate() {
            let next = cells
                .get(i + 1)
                .map(|c| format_of(arena, *c).horizontal_merge)
                .unwrap_or(CellMerge::None);
            let format = &mut arena.cell_mut(cell)?.format;
            if format.horizontal_merge == CellMerge::First && next != CellMerge::Previous {
                format.horizontal_merge = CellMerge::None;
            }
        }
    }

    // Vertical, matching cells by grid column
    let layout: Vec<Vec<(usize, NodeId)>> = rows
        .iter()
        .map(|&row| {
            let mut col = 0;
            cells_of(arena, row)
                .into_iter()
                .map(|cell| {
                    let start = col;
                    col += format_of(arena, cell).span() as usize;
                    (start, cell)
                })
                .collect()
        })
        .collect();
    let cell_at = |r: usize, col: usize| -> Option<NodeId> {
        layout
            .get(r)?
            .iter()
            .find(|(start, _)| *start == col)
            .map(|(_, c)| *c)
    };

    for (r, row_cells) in layout.iter().enumerate() {
        for &(col, cell) in row_cells {
            let above = if r == 0 { None } else { cell_at(r - 1, col) };
            let above_merge = above
                .map(|c| format_of(arena, c).vertical_merge)
                .unwrap_or(CellMerge::None);
            let format = &mut arena.cell_mut(cell)?.format;
            if format.vertical_merge == CellMerge::Previous && above_merge == CellMerge::None {
                format.vertical_merge = CellMerge::First;
            }
        }
    }
    for (r, row_cells) in layout.iter().enumerate() {
        for &(col, cell) in row_cells {
            let below_merge = cell_at(r + 1, col)
                .map(|c| format_of(arena, c).vertical_merge)
                .unwrap_or(CellMerge::None);
            let format = &mut arena.cell_mut(cell)?.format;
            if format.vertical_merge == CellMerge::First && below_merge != CellMerge::Previous {
                format.vertical_merge = CellMerge::None;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Cell, Run};
    use pretty_assertions::assert_eq;

    fn table_with_rows(rows: &[Vec<CellFormat>], grid: Vec<i32>) -> (NodeArena, NodeId) {
        let mut arena = NodeArena::new();
        let root = arena.root();
        arena.ensure_minimum(root).unwrap();
        let body = arena.child_nodes(root, NodeKind::Body, true).first().unwrap();
        let table = arena.create(NodeKind::Table, Some(body)).unwrap();
        arena.table_mut(table).unwrap().grid = grid;
        for (r, formats) in rows.iter().enumerate() {
            let row = arena.create(NodeKind::Row, Some(table)).unwrap();
            for (c, format) in formats.iter().enumerate() {
                let cell = arena
                    .create_with(
                        NodeData::Cell(Cell {
                            format: format.clone(),
                        }),
                        Some(row),
                    )
                    .unwrap();
                let p = arena.create(NodeKind::Paragraph, Some(cell)).unwrap();
                arena
                    .create_with(NodeData::Run(Run::new(format!("{}{}", r, c))), Some(p))
                    .unwrap();
            }
        }
        (arena, table)
    }

    fn widths(arena: &NodeArena, row: NodeId) -> Vec<Option<i32>> {
        cells_of(arena, row)
            .into_iter()
            .map(|c| arena.cell(c).unwrap().format.width)
            .collect()
    }

    #[test]
    fn test_wide_cell_is_split_by_width() {
        let (mut arena, table) = table_with_rows(
            &[vec![
                CellFormat::default().with_width(2010),
                CellFormat::default().with_width(1000),
            ]],
            vec![1000, 1000, 1000],
        );
        convert_to_horizontally_merged_cells(&mut arena, table).unwrap();

        let row = arena.first_child(table).unwrap();
        let cells = cells_of(&arena, row);
        assert_eq!(cells.len(), 3);
        let merges: Vec<_> = cells
            .iter()
            .map(|c| arena.cell(*c).unwrap().format.horizontal_merge)
            .collect();
        assert_eq!(
            merges,
            vec![CellMerge::First, CellMerge::Previous, CellMerge::None]
        );
        assert_eq!(widths(&arena, row), vec![Some(1000), Some(1000), Some(1000)]);
        assert_eq!(arena.text(row), "00\n\n01");
    }

    #[test]
    fn test_span_from_huge_widths() {
        assert_eq!(span_from_width(&[1000, i32::MAX], 0, i32::MAX - 5, 0), 2);
        assert_eq!(span_from_width(&[i32::MAX, i32::MAX, 1000], 0, 1000, 0), 1);
        assert_eq!(span_from_width(&[1000, 1000, i32::MAX], 0, 2000, 0), 2);
    }

    #[test]
    fn test_merge_conversions_invert_each_other() {
        let (mut arena, table) = table_with_rows(
            &[vec![
                CellFormat {
                    width: Some(3000),
                    grid_span: Some(3),
                    ..Default::default()
                },
                CellFormat::default().with_width(1000),
            ]],
            vec![1000, 1000, 1000, 1000],
        );
        let row = arena.first_child(table).unwrap();
        let before_text = arena.text(row);

        convert_to_horizontally_merged_cells(&mut arena, table).unwrap();
        assert_eq!(cells_of(&arena, row).len(), 4);

        convert_to_merged_cells_by_width(&mut arena, table).unwrap();
        let cells = cells_of(&arena, row);
        assert_eq!(cells.len(), 2);
        assert_eq!(widths(&arena, row), vec![Some(3000), Some(1000)]);
        assert_eq!(arena.cell(cells[0]).unwrap().format.grid_span, Some(3));
        assert_eq!(arena.text(row), before_text);
    }

    #[test]
    fn test_normalize_repairs_orphans_and_lone_firsts() {
        let previous = CellFormat {
            horizontal_merge: CellMerge::Previous,
            ..Default::default()
        };
        let first = CellFormat {
            horizontal_merge: CellMerge::First,
            ..Default::default()
        };
        let (mut arena, table) = table_with_rows(
            &[
                vec![previous.clone(), previous.clone(), first.clone()],
                vec![
                    CellFormat {
                        vertical_merge: CellMerge::Previous,
                        ..Default::default()
                    },
                    CellFormat::default(),
                    CellFormat::default(),
                ],
            ],
            vec![],
        );
        normalize_merges(&mut arena, table).unwrap();

        let rows = arena.children_of_kind(table, NodeKind::Row);
        let row0: Vec<_> = cells_of(&arena, rows[0])
            .iter()
            .map(|c| arena.cell(*c).unwrap().format.horizontal_merge)
            .collect();
        assert_eq!(
            row0,
            vec![CellMerge::First, CellMerge::Previous, CellMerge::None]
        );

        // Orphaned vertical continuation with nothing below becomes unmerged
        let below = cells_of(&arena, rows[1])[0];
        assert_eq!(
            arena.cell(below).unwrap().format.vertical_merge,
            CellMerge::None
        );
    }
}
