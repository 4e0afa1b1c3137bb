//! Error types for OOXML operations.
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, OoxmlError>;

/// Errors raised while reading, changing or writing document parts.
#[derive(Error, Debug)]
pub enum OoxmlError {
    /// XML parsing error
    #[error("XML error: {0}")]
    Xml(String),

    /// Part not found in the package
    #[error("Missing part: {0}")]
    PartNotFound(String),

    /// Invalid format
    #[error("Malformed part: {0}")]
    InvalidFormat(String),

    /// A node could not be located where the parent index recorded it
    #[error("Structural corruption: {0}")]
    StructuralCorruption(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// ZIP container error
    #[error("Package error: {0}")]
    Zip(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<quick_xml::Error> for OoxmlError {
    fn from(err: quick_xml::Error) -> Self {
        OoxmlError::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for OoxmlError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        OoxmlError::Xml(err.to_string())
    }
}

impl From<std::str::Utf8Error> for OoxmlError {
    fn from(err: std::str::Utf8Error) -> Self {
        OoxmlError::InvalidFormat(format!("part is not valid UTF-8: {}", err))
    }
}

#[cfg(feature = "package")]
impl From<zip::result::ZipError> for OoxmlError {
    fn from(err: zip::result::ZipError) -> Self {
        OoxmlError::Zip(err.to_string())
    }
}
