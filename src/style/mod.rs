//! Styles and style resolution
//!
//! A [`StyleSheet`] is the model of `styles.xml`. [`StyleResolver`] merges
//! defaults, style chains, table conditional formats and direct formatting
//! into one [`ResolvedStyle`].

mod conditional;
mod defaults;
mod resolver;

pub use conditional::{ConditionalStyle, ConditionalStyles, TableRegion};
pub use defaults::{global_defaults, reset_global_defaults, set_global_defaults, FormatDefaults};
pub use resolver::{expand_table_styles_to_direct_formatting, ResolvedStyle, StyleResolver};

use crate::format::{
    CellFormat, NumberingRef, ParagraphFormat, RowFormat, RunFormat, TableFormat,
};
use crate::xml::RawXmlNode;

/// Style type (w:style/@w:type)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StyleType {
    #[default]
    Paragraph,
    Character,
    Table,
    List,
}

impl StyleType {
    /// OOXML attribute value
    pub fn as_str(self) -> &'static str {
        match self {
            StyleType::Paragraph => "paragraph",
            StyleType::Character => "character",
            StyleType::Table => "table",
            StyleType::List => "numbering",
        }
    }

    /// Parse the OOXML attribute value
    pub fn parse(value: &str) -> Self {
        match value {
            "character" => StyleType::Character,
            "table" => StyleType::Table,
            "numbering" => StyleType::List,
            _ => StyleType::Paragraph,
        }
    }
}

/// A named set of formatting overrides
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Style {
    /// Style id, referenced by pStyle/rStyle/tblStyle
    pub id: String,
    /// Display name
    pub name: Option<String>,
    pub style_type: StyleType,
    /// Parent style id
    pub based_on: Option<String>,
    /// Style for the following paragraph
    pub next: Option<String>,
    /// Default style of its type
    pub is_default: bool,
    /// User-defined (w:customStyle)
    pub custom: bool,
    pub run_format: RunFormat,
    pub paragraph_format: ParagraphFormat,
    pub table_format: TableFormat,
    pub row_format: RowFormat,
    pub cell_format: CellFormat,
    /// Table conditional formats
    pub conditional: ConditionalStyles,
    /// Unrecognized children (qFormat, uiPriority, rsid, ...)
    pub unknown: Vec<RawXmlNode>,
}

impl Style {
    /// Create an empty style
    pub fn new(id: impl Into<String>, style_type: StyleType) -> Self {
        let id = id.into();
        Style {
            name: Some(id.clone()),
            id,
            style_type,
            ..Default::default()
        }
    }

    /// Set the parent style
    pub fn with_based_on(mut self, id: impl Into<String>) -> Self {
        self.based_on = Some(id.into());
        self
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the character formatting
    pub fn with_run_format(mut self, format: RunFormat) -> Self {
        self.run_format = format;
        self
    }

    /// Set the paragraph formatting
    pub fn with_paragraph_format(mut self, format: ParagraphFormat) -> Self {
        self.paragraph_format = format;
        self
    }

    /// Mark as the default style of its type
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Same formatting and inheritance, ignoring the id
    pub fn same_definition(&self, other: &Style) -> bool {
        let mut a = self.clone();
        a.id = other.id.clone();
        a.name = other.name.clone();
        a == *other
    }
}

/// Document defaults (w:docDefaults)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocDefaults {
    pub run_format: RunFormat,
    pub paragraph_format: ParagraphFormat,
}

/// All styles of a document (styles.xml)
#[derive(Clone, Debug, Default)]
pub struct StyleSheet {
    styles: Vec<Style>,
    /// Document defaults
    pub doc_defaults: DocDefaults,
    /// Unrecognized root children (w:latentStyles, ...)
    pub unknown: Vec<RawXmlNode>,
    /// Namespace declarations of the loaded part
    pub root_declarations: Vec<(String, String)>,
}

/// Upper bound on `based_on` chain length; longer chains are cycles
const MAX_CHAIN: usize = 64;

impl StyleSheet {
    /// Create an empty style sheet
    pub fn new() -> Self {
        Self::default()
    }

    /// Style sheet with the built-in defaults every document needs
    pub fn with_builtin_styles() -> Self {
        let mut sheet = StyleSheet::new();
        sheet.add(Style::new("Normal", StyleType::Paragraph).as_default());
        sheet.add(
            Style::new("DefaultParagraphFont", StyleType::Character)
                .with_name("Default Paragraph Font")
                .as_default(),
        );
        sheet.add(
            Style::new("TableNormal", StyleType::Table)
                .with_name("Normal Table")
                .as_default(),
        );
        sheet
    }

    /// Look up a style by id
    pub fn get(&self, id: &str) -> Option<&Style> {
        self.styles.iter().find(|s| s.id == id)
    }

    /// Look up a style by id for editing
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Style> {
        self.styles.iter_mut().find(|s| s.id == id)
    }

    /// Whether a style id exists
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Add a style, replacing one with the same id
    pub fn add(&mut self, style: Style) {
        match self.styles.iter_mut().find(|s| s.id == style.id) {
            Some(existing) => *existing = style,
            None => self.styles.push(style),
        }
    }

    /// Remove a style by id
    pub fn remove(&mut self, id: &str) -> Option<Style> {
        let index = self.styles.iter().position(|s| s.id == id)?;
        Some(self.styles.remove(index))
    }

    /// All styles in file order
    pub fn iter(&self) -> impl Iterator<Item = &Style> {
        self.styles.iter()
    }

    /// Number of styles
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    /// Whether there are no styles
    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Default style of a type
    pub fn default_style(&self, style_type: StyleType) -> Option<&Style> {
        self.styles
            .iter()
            .find(|s| s.is_default && s.style_type == style_type)
    }

    /// A style and its ancestors, root first.
    ///
    /// Unknown ids yield an empty chain; a `based_on` cycle is cut at the
    /// first repeated style.
    pub fn chain(&self, id: &str) -> Vec<&Style> {
        let mut chain: Vec<&Style> = Vec::new();
        let mut next = Some(id);
        while let Some(current) = next {
            let Some(style) = self.get(current) else {
                break;
            };
            if chain.iter().any(|s| s.id == style.id) || chain.len() >= MAX_CHAIN {
                log::debug!("based_on cycle cut at style '{}'", style.id);
                break;
            }
            chain.push(style);
            next = style.based_on.as_deref();
        }
        chain.reverse();
        chain
    }

    /// List membership inherited from a paragraph style chain
    pub fn paragraph_numbering(&self, id: &str) -> Option<NumberingRef> {
        self.chain(id)
            .into_iter()
            .rev()
            .find_map(|s| s.paragraph_format.numbering)
    }

    /// A free id derived from `base`: `base_0`, `base_1`, ...
    pub fn unique_id(&self, base: &str) -> String {
        (0..)
            .map(|n| format!("{}_{}", base, n))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_chain_is_root_first() {
        let mut sheet = StyleSheet::new();
        sheet.add(Style::new("Normal", StyleType::Paragraph));
        sheet.add(Style::new("Heading1", StyleType::Paragraph).with_based_on("Normal"));
        sheet.add(Style::new("Title", StyleType::Paragraph).with_based_on("Heading1"));

        let ids: Vec<_> = sheet.chain("Title").iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec!["Normal", "Heading1", "Title"]);
        assert!(sheet.chain("Missing").is_empty());
    }

    #[test]
    fn test_chain_cuts_cycles() {
        let mut sheet = StyleSheet::new();
        sheet.add(Style::new("A", StyleType::Paragraph).with_based_on("B"));
        sheet.add(Style::new("B", StyleType::Paragraph).with_based_on("A"));

        let ids: Vec<_> = sheet.chain("A").iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec!["B", "A"]);
    }

    #[test]
    fn test_unique_id() {
        let mut sheet = StyleSheet::with_builtin_styles();
        assert_eq!(sheet.unique_id("Normal"), "Normal_0");
        sheet.add(Style::new("Normal_0", StyleType::Paragraph));
        assert_eq!(sheet.unique_id("Normal"), "Normal_1");
    }

    #[test]
    fn test_same_definition_ignores_id() {
        let a = Style::new("A", StyleType::Paragraph)
            .with_run_format(RunFormat::default().with_bold(true));
        let mut b = a.clone();
        b.id = "B".into();
        assert!(a.same_definition(&b));
        b.run_format.bold = Some(false);
        assert!(!a.same_definition(&b));
    }
}
