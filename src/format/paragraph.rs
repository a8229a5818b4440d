//! Paragraph formatting (w:pPr)

use super::sparse_format;
use crate::xml::RawXmlNode;

/// Reference from a paragraph to a list instance and level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NumberingRef {
    /// List instance id (`w:numId`); 0 removes list membership
    pub num_id: u32,
    /// Level index, 0-8
    pub level: u8,
}

impl NumberingRef {
    /// Create a new reference
    pub fn new(num_id: u32, level: u8) -> Self {
        Self { num_id, level }
    }

    /// `w:numId="0"` explicitly turns numbering off
    pub fn is_none(&self) -> bool {
        self.num_id == 0
    }
}

/// Paragraph formatting
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParagraphFormat {
    /// Justification ("left", "center", "right", "both", ...)
    pub justification: Option<String>,
    /// Space before, twips
    pub spacing_before: Option<u32>,
    /// Space after, twips
    pub spacing_after: Option<u32>,
    /// Line spacing (240ths of a line or twips, see `line_rule`)
    pub spacing_line: Option<u32>,
    /// Line spacing rule ("auto", "exact", "atLeast")
    pub line_rule: Option<String>,
    /// Left indent, twips
    pub indent_left: Option<i32>,
    /// Right indent, twips
    pub indent_right: Option<i32>,
    /// First line indent, twips
    pub indent_first_line: Option<i32>,
    /// Hanging indent, twips
    pub indent_hanging: Option<i32>,
    /// Keep with next
    pub keep_next: Option<bool>,
    /// Keep lines together
    pub keep_lines: Option<bool>,
    /// Page break before
    pub page_break_before: Option<bool>,
    /// Outline level (0-9)
    pub outline_level: Option<u8>,
    /// List membership
    pub numbering: Option<NumberingRef>,
    /// Unrecognized children (preserved)
    pub unknown: Vec<RawXmlNode>,
}

sparse_format!(ParagraphFormat {
    options: [
        justification,
        spacing_before,
        spacing_after,
        spacing_line,
        line_rule,
        indent_left,
        indent_right,
        indent_first_line,
        indent_hanging,
        keep_next,
        keep_lines,
        page_break_before,
        outline_level,
        numbering,
    ]
});

impl ParagraphFormat {
    /// Set justification
    pub fn with_justification(mut self, jc: impl Into<String>) -> Self {
        self.justification = Some(jc.into());
        self
    }

    /// Set space after in twips
    pub fn with_spacing_after(mut self, twips: u32) -> Self {
        self.spacing_after = Some(twips);
        self
    }

    /// Put the paragraph in a list
    pub fn with_numbering(mut self, num_id: u32, level: u8) -> Self {
        self.numbering = Some(NumberingRef::new(num_id, level));
        self
    }
}
