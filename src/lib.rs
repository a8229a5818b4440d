//! # linch-docx-dom
//!
//! An editable document model for DOCX files.
//!
//! ## Features
//!
//! - Typed node tree (sections, paragraphs, runs, tables, fields, SDTs, comments)
//! - Style resolution with table conditional formatting
//! - List numbering labels and list merging across documents
//! - Tracked changes: record, accept, reject, compare
//! - Mail merge regions and custom XML data binding
//! - Round-trip preservation (unknown elements are kept intact)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use linch_docx_dom::{Document, RevisionView};
//!
//! // Open a document
//! let mut doc = Document::open("example.docx")?;
//!
//! // Read paragraphs
//! for p in doc.paragraphs() {
//!     println!("{}", doc.arena().text(p));
//! }
//!
//! // Edit with change tracking
//! doc.start_tracking("Reviewer", None);
//! doc.add_paragraph("Hello World!")?;
//! println!("{}", doc.text_in_view(RevisionView::Original)?);
//! doc.save("output.docx")?;
//! ```

pub mod codec;
pub mod document;
pub mod error;
pub mod format;
pub mod node;
pub mod numbering;
pub mod opc;
pub mod revision;
pub mod style;
pub mod table;
pub mod warning;
pub mod xml;

pub use codec::{Compliance, CustomXmlPart, LoadOptions, PackageDecryptor, SaveOptions};
pub use document::{
    Document, Field, ImportFormatMode, ImportOptions, MergeRegion, RegionScope,
};
pub use error::{Error, Result};
pub use node::{KindFilter, NodeArena, NodeData, NodeId, NodeKind};
pub use opc::{Package, Part, PartUri};
pub use revision::{CompareGranularity, CompareOptions, RevisionTracker, RevisionView};
pub use style::{FormatDefaults, ResolvedStyle, StyleSheet};
pub use warning::{CollectingWarningSink, WarningInfo, WarningKind, WarningSink};
