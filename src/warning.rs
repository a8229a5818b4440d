//! Structured warnings raised while loading and saving

use std::fmt;

/// What kind of problem a warning reports
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WarningKind {
    /// Content was dropped because it is not supported
    DataLoss,
    /// Content was changed to fit the model or the output format
    MinorFormattingLoss,
    /// A reference points nowhere (dangling XML mapping, missing style, ...)
    UnresolvedReference,
    /// Markup that does not follow the schema but could be read
    InvalidMarkup,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WarningKind::DataLoss => "data loss",
            WarningKind::MinorFormattingLoss => "minor formatting loss",
            WarningKind::UnresolvedReference => "unresolved reference",
            WarningKind::InvalidMarkup => "invalid markup",
        };
        f.write_str(name)
    }
}

/// One warning
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WarningInfo {
    pub kind: WarningKind,
    pub description: String,
}

impl WarningInfo {
    /// Create a warning
    pub fn new(kind: WarningKind, description: impl Into<String>) -> Self {
        WarningInfo {
            kind,
            description: description.into(),
        }
    }
}

impl fmt::Display for WarningInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.description)
    }
}

/// Receiver of warnings during decode and encode
pub trait WarningSink {
    fn warning(&mut self, info: WarningInfo);
}

/// Keeps every warning
#[derive(Clone, Debug, Default)]
pub struct CollectingWarningSink {
    pub warnings: Vec<WarningInfo>,
}

impl CollectingWarningSink {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any warning of `kind` was received
    pub fn contains(&self, kind: WarningKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }
}

impl WarningSink for CollectingWarningSink {
    fn warning(&mut self, info: WarningInfo) {
        self.warnings.push(info);
    }
}

/// Logs warnings and otherwise drops them
#[derive(Clone, Copy, Debug, Default)]
pub struct IgnoreWarnings;

impl WarningSink for IgnoreWarnings {
    fn warning(&mut self, info: WarningInfo) {
        log::debug!("ignored warning: {}", info);
    }
}
