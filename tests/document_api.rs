//! Integration test: Document API

use linch_docx_dom::format::{CellFormat, CellMerge, NumberingRef, ParagraphFormat, RunFormat, TableFormat, TableLook};
use linch_docx_dom::node::Run;
use linch_docx_dom::numbering::{AbstractNum, Level, ListLabelOptions, NumberFormat};
use linch_docx_dom::style::{ConditionalStyle, Style, StyleType, TableRegion};
use linch_docx_dom::{
    CompareGranularity, CompareOptions, Document, Error, ImportFormatMode, ImportOptions,
    KindFilter, NodeArena, NodeData, NodeId, NodeKind, RevisionView,
};
use pretty_assertions::assert_eq;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn list_item(doc: &mut Document, text: &str, num_id: u32, level: u8) -> NodeId {
    let p = doc.add_paragraph(text).unwrap();
    doc.set_paragraph_format(
        p,
        None,
        ParagraphFormat {
            numbering: Some(NumberingRef::new(num_id, level)),
            ..Default::default()
        },
    )
    .unwrap();
    p
}

fn cell_formats(doc: &Document, table: NodeId) -> Vec<CellFormat> {
    doc.arena()
        .child_nodes(table, NodeKind::Cell, true)
        .iter()
        .map(|c| doc.arena().cell(c).unwrap().format.clone())
        .collect()
}

#[test]
fn test_ensure_minimum_on_empty_arena() {
    let mut arena = NodeArena::new();
    let root = arena.root();
    arena.ensure_minimum(root).unwrap();

    let nodes = arena.child_nodes(root, KindFilter::Any, true).to_vec();
    assert_eq!(nodes.len(), 3);
    let kinds: Vec<NodeKind> = nodes.iter().map(|n| arena.kind(*n).unwrap()).collect();
    assert_eq!(kinds, vec![NodeKind::Section, NodeKind::Body, NodeKind::Paragraph]);
    assert_eq!(arena.children(root), &[nodes[0]]);
    assert_eq!(arena.children(nodes[0]), &[nodes[1]]);
    assert_eq!(arena.children(nodes[1]), &[nodes[2]]);
}

#[test]
fn test_illegal_child_leaves_tree_untouched() {
    let mut doc = Document::new();
    let body = doc.last_body().unwrap();
    let before = doc.arena().len();
    let err = doc.arena_mut().create(NodeKind::Row, Some(body)).unwrap_err();
    assert!(matches!(err, Error::InvalidChild(_)));
    assert_eq!(doc.arena().len(), before);

    let p = doc.paragraphs()[0];
    let err = doc.arena().table(p).unwrap_err();
    assert!(matches!(err, Error::WrongKind { .. }));
}

#[test]
fn test_list_counters_across_levels() {
    init_logger();
    let mut doc = Document::new();
    let num_id = doc.numbering_mut().add_abstract_num(
        AbstractNum::new(0)
            .with_level(Level::new(0).with_format(NumberFormat::Decimal).with_text("%0."))
            .with_level(Level::new(1).with_format(NumberFormat::Decimal).with_text("%0.%1")),
    );

    let items = [
        list_item(&mut doc, "a", num_id, 0),
        list_item(&mut doc, "b", num_id, 1),
        list_item(&mut doc, "c", num_id, 1),
        list_item(&mut doc, "d", num_id, 0),
        list_item(&mut doc, "e", num_id, 1),
    ];
    let labels: Vec<Option<&str>> = items.iter().map(|p| doc.list_label(*p).unwrap()).collect();
    assert_eq!(
        labels,
        vec![Some("1."), Some("1.1"), Some("1.2"), Some("2."), Some("2.1")]
    );

    // Removing an item renumbers the rest
    doc.remove_node(items[1]).unwrap();
    assert_eq!(doc.list_label(items[2]).unwrap(), Some("1.1"));
}

#[test]
fn test_style_priority_direct_cell_shading_wins() {
    let mut doc = Document::new();
    let mut grid = Style::new("Grid", StyleType::Table);
    grid.table_format.look = Some(TableLook {
        first_row: true,
        ..Default::default()
    });
    grid.conditional.set(
        TableRegion::FirstRow,
        ConditionalStyle {
            cell_format: CellFormat::default().with_shading("C1"),
            ..Default::default()
        },
    );
    doc.styles_mut().add(grid);

    let table = doc.add_table(2, 2).unwrap();
    doc.arena_mut().table_mut(table).unwrap().style = Some("Grid".into());
    let cells = doc.arena().child_nodes(table, NodeKind::Cell, true).to_vec();
    doc.arena_mut().cell_mut(cells[0]).unwrap().format.shading = Some("C2".into());

    assert_eq!(doc.resolved_style(cells[0]).cell.shading.as_deref(), Some("C2"));
    assert_eq!(doc.resolved_style(cells[1]).cell.shading.as_deref(), Some("C1"));
    assert_eq!(doc.resolved_style(cells[2]).cell.shading, None);
}

#[test]
fn test_expand_table_styles_is_idempotent() {
    let mut doc = Document::new();
    let mut grid = Style::new("Grid", StyleType::Table).with_run_format(RunFormat {
        size: Some(18),
        ..Default::default()
    });
    grid.table_format = TableFormat {
        look: Some(TableLook {
            first_row: true,
            ..Default::default()
        }),
        ..Default::default()
    };
    grid.conditional.set(
        TableRegion::FirstRow,
        ConditionalStyle {
            cell_format: CellFormat::default().with_shading("DDDDDD"),
            ..Default::default()
        },
    );
    doc.styles_mut().add(grid);
    let table = doc.add_table(2, 2).unwrap();
    doc.arena_mut().table_mut(table).unwrap().style = Some("Grid".into());

    doc.expand_table_styles_to_direct_formatting(table).unwrap();
    let once = cell_formats(&doc, table);
    assert_eq!(once[0].shading.as_deref(), Some("DDDDDD"));
    assert_eq!(once[2].shading, None);

    doc.expand_table_styles_to_direct_formatting(table).unwrap();
    assert_eq!(cell_formats(&doc, table), once);
}

#[test]
fn test_merge_conversions_restore_widths() {
    let mut doc = Document::new();
    let table = doc.add_table(1, 2).unwrap();
    doc.arena_mut().table_mut(table).unwrap().grid = vec![1000, 1000, 1000];
    let cells = doc.arena().child_nodes(table, NodeKind::Cell, true).to_vec();
    doc.arena_mut().cell_mut(cells[0]).unwrap().format = CellFormat {
        width: Some(2000),
        grid_span: Some(2),
        ..Default::default()
    };
    doc.arena_mut().cell_mut(cells[1]).unwrap().format.width = Some(1000);

    doc.convert_to_horizontally_merged_cells(table).unwrap();
    let split = cell_formats(&doc, table);
    assert_eq!(split.len(), 3);
    assert_eq!(split[0].horizontal_merge, CellMerge::First);
    assert_eq!(split[1].horizontal_merge, CellMerge::Previous);

    doc.convert_to_merged_cells_by_width(table).unwrap();
    let merged = cell_formats(&doc, table);
    assert_eq!(merged.len(), 2);
    let widths: Vec<i32> = merged.iter().map(|c| c.width.unwrap_or(0)).collect();
    assert!((widths[0] - 2000).abs() <= 20);
    assert!((widths[1] - 1000).abs() <= 20);
}

#[test]
fn test_removing_first_cell_repairs_merge() {
    let mut doc = Document::new();
    let table = doc.add_table(1, 3).unwrap();
    let cells = doc.arena().child_nodes(table, NodeKind::Cell, true).to_vec();
    doc.arena_mut().cell_mut(cells[0]).unwrap().format.horizontal_merge = CellMerge::First;
    doc.arena_mut().cell_mut(cells[1]).unwrap().format.horizontal_merge = CellMerge::Previous;

    doc.remove_node(cells[0]).unwrap();
    let formats = cell_formats(&doc, table);
    assert_eq!(formats.len(), 2);
    assert_ne!(formats[0].horizontal_merge, CellMerge::Previous);
}

#[test]
fn test_revision_symmetry() {
    init_logger();
    let mut doc = Document::new();
    let p = doc.add_paragraph("").unwrap();
    let keep = doc.add_run(p, "Keep ").unwrap();
    let gone = doc.add_run(p, "remove ").unwrap();
    let change = doc.add_run(p, "old").unwrap();
    let before = doc.text();

    doc.start_tracking("Reviewer", None);
    doc.remove_node(gone).unwrap();
    doc.set_run_text(change, "new").unwrap();
    doc.set_run_format(
        keep,
        None,
        RunFormat {
            bold: Some(true),
            ..Default::default()
        },
    )
    .unwrap();
    doc.add_paragraph("Added").unwrap();
    doc.stop_tracking();

    let after = doc.text_in_view(RevisionView::Final).unwrap();
    assert_eq!(after, "\nKeep new\nAdded");
    assert_eq!(doc.text_in_view(RevisionView::Original).unwrap(), before);
    assert!(!doc.revision_groups().is_empty());

    let mut rejected = doc.clone();
    rejected.reject_all_revisions().unwrap();
    assert_eq!(rejected.text(), before);
    assert_eq!(rejected.revisions().len(), 0);
    assert_eq!(rejected.arena().run(keep).unwrap().format.bold, None);

    doc.accept_all_revisions().unwrap();
    assert_eq!(doc.text(), after);
    assert_eq!(doc.revisions().len(), 0);
    assert_eq!(doc.arena().run(keep).unwrap().format.bold, Some(true));
}

#[test]
fn test_compare_documents() {
    let mut original = Document::new();
    original.add_paragraph("The quick brown fox").unwrap();
    original.add_paragraph("jumps over").unwrap();
    let mut revised = Document::new();
    revised.add_paragraph("The slow brown fox").unwrap();
    revised.add_paragraph("jumps over").unwrap();
    revised.add_paragraph("the lazy dog").unwrap();

    let options = CompareOptions::default().with_granularity(CompareGranularity::Word);
    original.compare(&revised, "Cmp", None, &options).unwrap();
    assert!(!original.revisions().is_empty());

    let mut rejected = original.clone();
    rejected.reject_all_revisions().unwrap();
    assert_eq!(rejected.text(), "\nThe quick brown fox\njumps over");

    original.accept_all_revisions().unwrap();
    assert_eq!(original.text(), revised.text());

    // Pending revisions make a document incomparable
    let mut tracked = Document::new();
    tracked.start_tracking("A", None);
    tracked.add_paragraph("x").unwrap();
    let err = tracked.compare(&revised, "Cmp", None, &options).unwrap_err();
    assert!(matches!(err, Error::IncomparableState(_)));
}

#[test]
fn test_append_document_continues_content() {
    let mut dest = Document::new();
    dest.add_paragraph("First").unwrap();
    let mut source = Document::new();
    source.add_paragraph("Second").unwrap();

    dest.append_document(&source, &Default::default()).unwrap();
    assert_eq!(dest.sections().len(), 2);
    assert_eq!(dest.text(), "\nFirst\n\nSecond");
}

/// Source with a second section whose body receives later paragraphs
fn start_second_section(doc: &mut Document) {
    let root = doc.arena().root();
    let section = doc.arena_mut().create(NodeKind::Section, Some(root)).unwrap();
    doc.arena_mut().ensure_minimum(section).unwrap();
}

#[test]
fn test_append_keeps_list_running_across_sections() {
    init_logger();
    let continuous = ListLabelOptions::default().with_restart_lists_at_each_section(false);
    let mut source = Document::new();
    source.set_list_options(continuous.clone()).unwrap();
    let num_id = source.numbering_mut().add_decimal_list();
    list_item(&mut source, "One", num_id, 0);
    start_second_section(&mut source);
    list_item(&mut source, "Two", num_id, 0);
    assert_eq!(source.sections().len(), 2);

    let mut dest = Document::new();
    dest.set_list_options(continuous).unwrap();
    let lists_before = dest.numbering().nums.len();
    let options = ImportOptions::default().with_keep_source_numbering(true);
    dest.append_document(&source, &options).unwrap();

    let labels: Vec<String> = dest
        .paragraphs()
        .into_iter()
        .filter_map(|p| dest.list_label(p).unwrap().map(String::from))
        .collect();
    assert_eq!(labels, vec!["1.".to_string(), "2.".to_string()]);
    assert_eq!(dest.numbering().nums.len(), lists_before + 1);
}

#[test]
fn test_append_copies_clashing_style_once() {
    init_logger();
    let custom = |size| {
        Style::new("Custom", StyleType::Paragraph)
            .with_based_on("Normal")
            .with_run_format(RunFormat {
                size: Some(size),
                ..Default::default()
            })
    };
    let mut source = Document::new();
    source.styles_mut().add(custom(20));
    let first = source.add_paragraph("Intro").unwrap();
    source.arena_mut().paragraph_mut(first).unwrap().style = Some("Custom".into());
    start_second_section(&mut source);
    let second = source.add_paragraph("Outro").unwrap();
    source.arena_mut().paragraph_mut(second).unwrap().style = Some("Custom".into());

    let mut dest = Document::new();
    dest.styles_mut().add(custom(40));
    let before = dest.styles().len();
    let options = ImportOptions::default().with_format_mode(ImportFormatMode::KeepSourceFormatting);
    dest.append_document(&source, &options).unwrap();

    assert_eq!(dest.styles().len(), before + 1);
    assert!(dest.styles().get("Custom_1").is_none());
    let styled: Vec<Option<String>> = dest
        .paragraphs()
        .into_iter()
        .filter(|p| !dest.arena().text(*p).is_empty())
        .map(|p| dest.arena().paragraph(p).unwrap().style.clone())
        .collect();
    assert_eq!(styled, vec![Some("Custom_0".to_string()), Some("Custom_0".to_string())]);
}

#[test]
fn test_move_node_while_tracking() {
    let mut doc = Document::new();
    let a = doc.add_paragraph("A").unwrap();
    doc.add_paragraph("B").unwrap();
    let body = doc.last_body().unwrap();
    let run = doc.arena().first_child(a).unwrap();

    doc.start_tracking("Mover", None);
    let target = doc.paragraphs()[2];
    let moved = doc.move_node(run, target, 1).unwrap();
    assert_ne!(moved, run);
    assert_eq!(doc.text_in_view(RevisionView::Final).unwrap(), "\n\nBA");

    doc.reject_all_revisions().unwrap();
    assert_eq!(doc.text(), "\nA\nB");
    assert_eq!(doc.arena().children(body).len(), 3);
}

#[test]
fn test_run_payload_is_value_copied_on_clone() {
    let mut doc = Document::new();
    let p = doc.add_paragraph("text").unwrap();
    let copy = doc.arena_mut().clone_node(p, true).unwrap();
    let copied_run = doc.arena().first_child(copy).unwrap();
    if let NodeData::Run(run) = doc.arena_mut().data_mut(copied_run).unwrap() {
        *run = Run::new("changed");
    }
    assert_eq!(doc.arena().text(p), "text");
    assert_eq!(doc.arena().text(copy), "changed");
}
