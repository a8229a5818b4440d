//! List label computation

use std::collections::BTreeMap;

use super::{NumberFormat, Numbering};
use crate::error::Result;
use crate::format::NumberingRef;
use crate::node::{NodeArena, NodeId, NodeKind};
use crate::style::{StyleSheet, StyleType};

/// Deepest list level
const MAX_LEVEL: u8 = 8;

/// Options for [`update_list_labels`]
#[derive(Clone, Debug)]
pub struct ListLabelOptions {
    /// Reset counters at each section boundary, unless a list definition
    /// says otherwise
    pub restart_lists_at_each_section: bool,
}

impl Default for ListLabelOptions {
    fn default() -> Self {
        ListLabelOptions {
            restart_lists_at_each_section: true,
        }
    }
}

impl ListLabelOptions {
    /// Set the section restart behavior
    pub fn with_restart_lists_at_each_section(mut self, restart: bool) -> Self {
        self.restart_lists_at_each_section = restart;
        self
    }
}

/// List membership of a paragraph: direct formatting first, then its style
/// chain (or the default paragraph style). `numId` 0 means no list.
pub fn effective_numbering(
    arena: &NodeArena,
    styles: &StyleSheet,
    paragraph: NodeId,
) -> Option<NumberingRef> {
    let p = arena.paragraph(paragraph).ok()?;
    let numbering = p.format.numbering.or_else(|| {
        let style = p
            .style
            .as_deref()
            .or_else(|| styles.default_style(StyleType::Paragraph).map(|s| s.id.as_str()))?;
        styles.paragraph_numbering(style)
    })?;
    if numbering.is_none() {
        None
    } else {
        Some(numbering)
    }
}

struct Counters<'a> {
    numbering: &'a Numbering,
    values: BTreeMap<(u32, u8), u32>,
}

impl Counters<'_> {
    fn advance(&mut self, num_id: u32, level: u8) {
        let start = self.numbering.start_value(num_id, level);
        self.values
            .entry((num_id, level))
            .and_modify(|v| *v += 1)
            .or_insert(start);
        self.values
            .retain(|&(n, l), _| n != num_id || l <= level);
    }

    fn value(&self, num_id: u32, level: u8) -> u32 {
        self.values
            .get(&(num_id, level))
            .copied()
            .unwrap_or_else(|| self.numbering.start_value(num_id, level))
    }

    fn section_break(&mut self, options: &ListLabelOptions) {
        let numbering = self.numbering;
        self.values.retain(|&(num_id, _), _| {
            !numbering
                .restart_after_break(num_id)
                .unwrap_or(options.restart_lists_at_each_section)
        });
    }

    fn render(&self, num_id: u32, level: u8) -> String {
        let Some(lvl) = self.numbering.get_level(num_id, level) else {
            return String::new();
        };
        let Some(template) = lvl.level_text.as_deref() else {
            return String::new();
        };

        let mut out = String::new();
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            let Some(referenced) = chars.peek().and_then(|d| d.to_digit(10)) else {
                out.push(c);
                continue;
            };
            chars.next();
            let referenced = referenced as u8;
            if referenced > level {
                continue;
            }
            let format = if lvl.is_legal {
                NumberFormat::Decimal
            } else {
                self.numbering
                    .get_level(num_id, referenced)
                    .map(|l| l.format())
                    .unwrap_or(NumberFormat::Decimal)
            };
            out.push_str(&format.format(self.value(num_id, referenced)));
        }
        out
    }
}

/// Label of every paragraph in document order; `None` for paragraphs that
/// are not list items. Paragraphs inside comments are not numbered.
pub fn compute_list_labels(
    arena: &NodeArena,
    numbering: &Numbering,
    styles: &StyleSheet,
    options: &ListLabelOptions,
) -> Vec<(NodeId, Option<String>)> {
    let mut counters = Counters {
        numbering,
        values: BTreeMap::new(),
    };
    let mut labels = Vec::new();
    let sections = arena.child_nodes(arena.root(), NodeKind::Section, false);

    for (index, section) in sections.iter().enumerate() {
        if index > 0 {
            counters.section_break(options);
        }
        for paragraph in arena.child_nodes(section, NodeKind::Paragraph, true) {
            if arena.ancestor(paragraph, NodeKind::Comment).is_some() {
                continue;
            }
            let label = effective_numbering(arena, styles, paragraph)
                .filter(|n| numbering.nums.contains_key(&n.num_id))
                .map(|n| {
                    let level = n.level.min(MAX_LEVEL);
                    counters.advance(n.num_id, level);
                    counters.render(n.num_id, level)
                });
            labels.push((paragraph, label));
        }
    }

    labels
}

/// Recompute and cache the label of every list paragraph
pub fn update_list_labels(
    arena: &mut NodeArena,
    numbering: &Numbering,
    styles: &StyleSheet,
    options: &ListLabelOptions,
) -> Result<()> {
    let labels = compute_list_labels(arena, numbering, styles, options);
    log::trace!("updating {} paragraph labels", labels.len());
    for (paragraph, label) in labels {
        arena.paragraph_mut(paragraph)?.list_label = label;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ParagraphFormat;
    use crate::node::{NodeData, Paragraph};
    use crate::numbering::{AbstractNum, Level};
    use crate::style::Style;
    use pretty_assertions::assert_eq;

    fn document(levels: &[(u32, u8)], sections: usize) -> NodeArena {
        let mut arena = NodeArena::new();
        let root = arena.root();
        for _ in 0..sections {
            let section = arena.create(NodeKind::Section, Some(root)).unwrap();
            let body = arena.create(NodeKind::Body, Some(section)).unwrap();
            for &(num_id, level) in levels {
                let p = Paragraph {
                    format: ParagraphFormat::default().with_numbering(num_id, level),
                    ..Default::default()
                };
                arena.create_with(NodeData::Paragraph(p), Some(body)).unwrap();
            }
        }
        arena
    }

    fn two_level(template: &str) -> Numbering {
        let mut numbering = Numbering::new();
        numbering.add_abstract_num(
            AbstractNum::new(0)
                .with_level(Level::new(0).with_text(template))
                .with_level(Level::new(1).with_text(template)),
        );
        numbering
    }

    fn labels(arena: &NodeArena, numbering: &Numbering, options: &ListLabelOptions) -> Vec<String> {
        compute_list_labels(arena, numbering, &StyleSheet::new(), options)
            .into_iter()
            .map(|(_, l)| l.unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_nested_counters() {
        let numbering = two_level("%0.%1");
        let arena = document(&[(1, 0), (1, 1), (1, 1), (1, 0), (1, 1)], 1);

        assert_eq!(
            labels(&arena, &numbering, &ListLabelOptions::default()),
            vec!["1.", "1.1", "1.2", "2.", "2.1"]
        );
    }

    #[test]
    fn test_section_restart() {
        let numbering = two_level("%0.");
        let arena = document(&[(1, 0), (1, 0)], 2);

        assert_eq!(
            labels(&arena, &numbering, &ListLabelOptions::default()),
            vec!["1.", "2.", "1.", "2."]
        );
        let continuing = ListLabelOptions::default().with_restart_lists_at_each_section(false);
        assert_eq!(
            labels(&arena, &numbering, &continuing),
            vec!["1.", "2.", "3.", "4."]
        );
    }

    #[test]
    fn test_definition_flag_overrides_option() {
        let mut numbering = two_level("%0.");
        for abs in numbering.abstract_nums.values_mut() {
            abs.restart_numbering_after_break = Some(false);
        }
        let arena = document(&[(1, 0)], 2);

        assert_eq!(
            labels(&arena, &numbering, &ListLabelOptions::default()),
            vec!["1.", "2."]
        );
    }

    #[test]
    fn test_style_numbering_and_bullets() {
        let mut numbering = Numbering::new();
        let bullets = numbering.add_bullet_list();
        let mut styles = StyleSheet::with_builtin_styles();
        styles.add(
            Style::new("ListBullet", StyleType::Paragraph).with_paragraph_format(
                ParagraphFormat::default().with_numbering(bullets, 0),
            ),
        );

        let mut arena = NodeArena::new();
        let root = arena.root();
        arena.ensure_minimum(root).unwrap();
        let body = arena.child_nodes(root, NodeKind::Body, true).first().unwrap();
        let item = arena
            .create_with(
                NodeData::Paragraph(Paragraph::with_style("ListBullet")),
                Some(body),
            )
            .unwrap();

        update_list_labels(&mut arena, &numbering, &styles, &ListLabelOptions::default())
            .unwrap();
        assert_eq!(arena.paragraph(item).unwrap().list_label.as_deref(), Some("•"));
        let first = arena.first_child(body).unwrap();
        assert_eq!(arena.paragraph(first).unwrap().list_label, None);
    }

    #[test]
    fn test_legal_numbering_forces_decimal() {
        let mut numbering = Numbering::new();
        let mut outer = Level::new(0)
            .with_format(NumberFormat::UpperRoman)
            .with_text("%0.");
        outer.start = Some(2);
        let mut inner = Level::new(1)
            .with_format(NumberFormat::Decimal)
            .with_text("%0.%1");
        inner.is_legal = true;
        numbering.add_abstract_num(AbstractNum::new(0).with_level(outer).with_level(inner));
        let arena = document(&[(1, 0), (1, 1)], 1);

        assert_eq!(
            labels(&arena, &numbering, &ListLabelOptions::default()),
            vec!["II.", "2.1"]
        );
    }
}
