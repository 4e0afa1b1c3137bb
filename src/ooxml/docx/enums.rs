//! Enumerations for Word style sheets.
use std::fmt;

/// The `w:type` of a `w:style`, after the VBA `WdStyleType`.
///
/// Only paragraph and character styles contribute to the formatting of
/// text runs; table and numbering styles are parsed but never resolved.
///
/// ```
/// use pomelo::ooxml::docx::WdStyleType;
///
/// let ty = WdStyleType::from_xml("numbering").unwrap_or_default();
/// assert_eq!(ty, WdStyleType::List);
/// assert!(!ty.formats_text());
/// assert_eq!(WdStyleType::from_xml("bogus"), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WdStyleType {
    /// Assumed when `w:type` is missing
    #[default]
    Paragraph,
    Character,
    Table,
    /// `w:type="numbering"`
    List,
}

impl WdStyleType {
    const ALL: [(Self, &'static str); 4] = [
        (Self::Paragraph, "paragraph"),
        (Self::Character, "character"),
        (Self::Table, "table"),
        (Self::List, "numbering"),
    ];

    /// Value of the `w:type` attribute.
    pub fn to_xml(self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(ty, _)| *ty == self)
            .map_or("paragraph", |(_, name)| name)
    }

    /// Parse a `w:type` attribute value.
    pub fn from_xml(value: &str) -> Option<Self> {
        Self::ALL.iter().find(|(_, name)| *name == value).map(|(ty, _)| *ty)
    }

    /// Whether run properties declared by styles of this type reach text
    /// runs through `w:pStyle` or `w:rStyle`.
    #[inline]
    pub fn formats_text(self) -> bool {
        matches!(self, Self::Paragraph | Self::Character)
    }
}

impl fmt::Display for WdStyleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_xml())
    }
}
