//! XML namespaces that the translation pipeline cares about.
use std::sync::Arc;

/// WordprocessingML main namespace.
pub const WORD: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
/// Office Math Markup Language namespace.
pub const MATH: &str = "http://schemas.openxmlformats.org/officeDocument/2006/math";
/// WordprocessingML drawing namespace.
pub const WORD_DRAWING: &str =
    "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
/// Markup compatibility namespace (`mc:AlternateContent`).
pub const MARKUP_COMPAT: &str = "http://schemas.openxmlformats.org/markup-compatibility/2006";
/// The reserved `xml` namespace.
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

/// A resolved namespace.
///
/// The namespaces referenced by the pipeline are dedicated variants so that
/// matching is a cheap enum comparison. Anything else keeps its URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ns {
    /// No namespace (unprefixed attribute, or no default namespace in scope)
    None,
    /// `w:` WordprocessingML
    Word,
    /// `m:` Office Math
    Math,
    /// `wp:` WordprocessingML drawing
    WordDrawing,
    /// `mc:` markup compatibility
    MarkupCompat,
    /// `xml:` reserved namespace
    Xml,
    /// Any other namespace URI
    Other(Arc<str>),
}

impl Ns {
    /// Map a namespace URI to its variant.
    pub fn from_uri(uri: &str) -> Self {
        match uri {
            WORD => Self::Word,
            MATH => Self::Math,
            WORD_DRAWING => Self::WordDrawing,
            MARKUP_COMPAT => Self::MarkupCompat,
            XML => Self::Xml,
            "" => Self::None,
            other => Self::Other(Arc::from(other)),
        }
    }

    /// The namespace URI, or an empty string for [`Ns::None`].
    pub fn uri(&self) -> &str {
        match self {
            Self::None => "",
            Self::Word => WORD,
            Self::Math => MATH,
            Self::WordDrawing => WORD_DRAWING,
            Self::MarkupCompat => MARKUP_COMPAT,
            Self::Xml => XML,
            Self::Other(uri) => uri,
        }
    }

    /// The prefix conventionally bound to this namespace in Word documents.
    pub fn conventional_prefix(&self) -> Option<&'static str> {
        match self {
            Self::Word => Some("w"),
            Self::Math => Some("m"),
            Self::WordDrawing => Some("wp"),
            Self::MarkupCompat => Some("mc"),
            Self::Xml => Some("xml"),
            Self::None | Self::Other(_) => None,
        }
    }
}

/// Split a qualified name into `(prefix, local)`.
#[inline]
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_round_trip() {
        for ns in [Ns::Word, Ns::Math, Ns::WordDrawing, Ns::MarkupCompat, Ns::Xml] {
            assert_eq!(Ns::from_uri(ns.uri()), ns);
        }
        assert_eq!(Ns::from_uri("urn:custom").uri(), "urn:custom");
    }

    #[test]
    fn test_split_qname() {
        assert_eq!(split_qname("w:rPr"), (Some("w"), "rPr"));
        assert_eq!(split_qname("rPr"), (None, "rPr"));
    }
}
