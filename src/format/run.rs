//! Character formatting (w:rPr)

use super::sparse_format;
use crate::xml::RawXmlNode;

/// Run formatting
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunFormat {
    /// Bold
    pub bold: Option<bool>,
    /// Italic
    pub italic: Option<bool>,
    /// Underline type ("single", "double", "none", ...)
    pub underline: Option<String>,
    /// Strike-through
    pub strike: Option<bool>,
    /// Double strike-through
    pub double_strike: Option<bool>,
    /// All caps
    pub caps: Option<bool>,
    /// Small caps
    pub small_caps: Option<bool>,
    /// Hidden text
    pub hidden: Option<bool>,
    /// Font size in half-points (24 = 12pt)
    pub size: Option<u32>,
    /// Color (RGB hex or "auto")
    pub color: Option<String>,
    /// Highlight color name
    pub highlight: Option<String>,
    /// ASCII font
    pub font: Option<String>,
    /// East Asian font
    pub font_east_asia: Option<String>,
    /// Vertical alignment ("superscript", "subscript", "baseline")
    pub vertical_align: Option<String>,
    /// Unrecognized children (preserved)
    pub unknown: Vec<RawXmlNode>,
}

sparse_format!(RunFormat {
    options: [
        bold,
        italic,
        underline,
        strike,
        double_strike,
        caps,
        small_caps,
        hidden,
        size,
        color,
        highlight,
        font,
        font_east_asia,
        vertical_align,
    ]
});

impl RunFormat {
    /// Font size in points
    pub fn size_pt(&self) -> Option<f32> {
        self.size.map(|s| s as f32 / 2.0)
    }

    /// Set bold
    pub fn with_bold(mut self, bold: bool) -> Self {
        self.bold = Some(bold);
        self
    }

    /// Set italic
    pub fn with_italic(mut self, italic: bool) -> Self {
        self.italic = Some(italic);
        self
    }

    /// Set size in half-points
    pub fn with_size(mut self, half_points: u32) -> Self {
        self.size = Some(half_points);
        self
    }

    /// Set color
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Set ASCII font
    pub fn with_font(mut self, font: impl Into<String>) -> Self {
        self.font = Some(font.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merge_overrides_set_properties_only() {
        let mut base = RunFormat::default().with_bold(true).with_size(20);
        let over = RunFormat::default().with_size(28).with_color("FF0000");
        base.merge(&over);

        assert_eq!(base.bold, Some(true));
        assert_eq!(base.size, Some(28));
        assert_eq!(base.color.as_deref(), Some("FF0000"));
    }

    #[test]
    fn test_restricted_to_mask() {
        let full = RunFormat::default().with_bold(true).with_size(20).with_font("Arial");
        let mask = RunFormat::default().with_size(1);
        let restricted = full.restricted_to(&mask);

        assert_eq!(restricted, RunFormat::default().with_size(20));
        assert!(RunFormat::default().is_empty());
        assert!(!restricted.is_empty());
    }
}
