//! Process-wide formatting defaults
//!
//! Documents take an `Arc` snapshot of the registry when they are created.
//! [`set_global_defaults`] and [`reset_global_defaults`] only affect
//! documents created afterwards and must not race with document creation.

use crate::format::{ParagraphFormat, RunFormat};
use once_cell::sync::Lazy;
use std::sync::{Arc, RwLock};

/// Lowest-priority formatting, below a document's own defaults
#[derive(Clone, Debug, PartialEq)]
pub struct FormatDefaults {
    /// Default font name
    pub font_name: String,
    /// Default font size in half-points
    pub font_size: u32,
    /// Default space after paragraphs, twips
    pub spacing_after: u32,
    /// Default line spacing, 240ths of a line
    pub line_spacing: u32,
}

impl Default for FormatDefaults {
    fn default() -> Self {
        FormatDefaults {
            font_name: "Times New Roman".to_string(),
            font_size: 24,
            spacing_after: 0,
            line_spacing: 240,
        }
    }
}

impl FormatDefaults {
    /// Character layer of the defaults
    pub fn run_format(&self) -> RunFormat {
        RunFormat {
            font: Some(self.font_name.clone()),
            size: Some(self.font_size),
            bold: Some(false),
            italic: Some(false),
            ..Default::default()
        }
    }

    /// Paragraph layer of the defaults
    pub fn paragraph_format(&self) -> ParagraphFormat {
        ParagraphFormat {
            spacing_after: Some(self.spacing_after),
            spacing_line: Some(self.line_spacing),
            line_rule: Some("auto".to_string()),
            ..Default::default()
        }
    }
}

static GLOBAL_DEFAULTS: Lazy<RwLock<Arc<FormatDefaults>>> =
    Lazy::new(|| RwLock::new(Arc::new(FormatDefaults::default())));

/// Current process-wide defaults
pub fn global_defaults() -> Arc<FormatDefaults> {
    let guard = GLOBAL_DEFAULTS
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    Arc::clone(&guard)
}

/// Replace the process-wide defaults
pub fn set_global_defaults(defaults: FormatDefaults) {
    let mut guard = GLOBAL_DEFAULTS
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = Arc::new(defaults);
}

/// Restore the built-in process-wide defaults
pub fn reset_global_defaults() {
    set_global_defaults(FormatDefaults::default());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_layers() {
        let defaults = FormatDefaults::default();
        assert_eq!(defaults.run_format().size, Some(24));
        assert_eq!(
            defaults.run_format().font.as_deref(),
            Some("Times New Roman")
        );
        assert_eq!(defaults.paragraph_format().spacing_after, Some(0));
    }
}
