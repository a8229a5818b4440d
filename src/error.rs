//! Error types for linch-docx-dom

use crate::node::NodeKind;
use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML encoding error: {0}")]
    XmlEncoding(#[from] quick_xml::encoding::EncodingError),

    #[error("XML attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Missing required part: {0}")]
    MissingPart(String),

    #[error("Invalid part URI: {0}")]
    InvalidPartUri(String),

    #[error("Missing attribute '{attr}' on element '{element}'")]
    MissingAttribute { element: String, attr: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Part not found: {0}")]
    PartNotFound(String),

    /// A structural edit would break the node tree rules
    #[error("Invalid child: {0}")]
    InvalidChild(String),

    /// A kind-specific accessor was used on a node of another kind
    #[error("Wrong node kind: expected {expected:?}, found {found:?}")]
    WrongKind { expected: NodeKind, found: NodeKind },

    #[error("Node not found: {0}")]
    NodeNotFound(u32),

    /// The package bytes are not a readable DOCX package
    #[error("Corrupt package: {0}")]
    CorruptPackage(String),

    #[error("Unsupported compliance: {0}")]
    UnsupportedCompliance(String),

    #[error("The package is encrypted and a password is required")]
    PasswordRequired,

    #[error("The password is incorrect")]
    InvalidPassword,

    /// Comparison attempted on a document with unresolved revisions
    #[error("Documents cannot be compared: {0}")]
    IncomparableState(String),

    #[error("Ambiguous merge: {0}")]
    AmbiguousMerge(String),

    #[error("Missing reference: {0}")]
    MissingReference(String),
}

impl Error {
    /// Whether retrying the load with a different password can succeed
    pub fn is_password_error(&self) -> bool {
        matches!(self, Error::PasswordRequired | Error::InvalidPassword)
    }

    /// Fold low-level parse failures into [`Error::CorruptPackage`].
    ///
    /// Errors that already carry a caller-visible meaning pass through.
    pub(crate) fn into_corrupt(self) -> Error {
        match self {
            Error::Zip(e) => Error::CorruptPackage(format!("zip: {}", e)),
            Error::Xml(e) => Error::CorruptPackage(format!("xml: {}", e)),
            Error::XmlEncoding(e) => Error::CorruptPackage(format!("xml encoding: {}", e)),
            Error::XmlAttr(e) => Error::CorruptPackage(format!("xml attribute: {}", e)),
            Error::Utf8(e) => Error::CorruptPackage(format!("utf-8: {}", e)),
            Error::Io(e) => Error::CorruptPackage(format!("io: {}", e)),
            Error::MissingPart(p) => Error::CorruptPackage(format!("missing part {}", p)),
            Error::InvalidPartUri(p) => Error::CorruptPackage(format!("bad part name {}", p)),
            Error::MissingAttribute { element, attr } => {
                Error::CorruptPackage(format!("missing '{}' on <{}>", attr, element))
            }
            Error::InvalidDocument(msg) => Error::CorruptPackage(msg),
            Error::InvalidChild(msg) => Error::CorruptPackage(format!("invalid structure: {}", msg)),
            other => other,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_errors_are_retryable() {
        assert!(Error::PasswordRequired.is_password_error());
        assert!(Error::InvalidPassword.is_password_error());
        assert!(!Error::CorruptPackage("x".into()).is_password_error());
    }

    #[test]
    fn test_into_corrupt_keeps_typed_errors() {
        let err = Error::InvalidDocument("Missing w:body element".into()).into_corrupt();
        assert!(matches!(err, Error::CorruptPackage(_)));

        let err = Error::PasswordRequired.into_corrupt();
        assert!(matches!(err, Error::PasswordRequired));
    }
}
