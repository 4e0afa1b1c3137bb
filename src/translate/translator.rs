//! The text-to-text translation collaborator.
use crate::translate::error::Result;
use crate::translate::protocol::Tokens;

/// What a translator is told about one paragraph blob.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnitContext {
    /// Part the paragraph comes from, such as `word/document.xml`
    pub part: String,
    /// Index of the paragraph within its part, in document order
    pub paragraph: usize,
    /// Separator and placeholder tokens used in the blob
    pub tokens: Tokens,
    /// Number of segments joined in the blob
    pub segments: usize,
    /// Number of placeholders in the blob
    pub placeholders: usize,
    /// Source language label, if configured
    pub source_lang: Option<String>,
    /// Target language label, if configured
    pub target_lang: Option<String>,
}

impl UnitContext {
    /// Separators the translated text must contain.
    #[inline]
    pub fn expected_separators(&self) -> usize {
        self.segments.saturating_sub(1)
    }
}

/// One paragraph blob to translate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationUnit {
    /// Serialized paragraph text
    pub text: String,
    /// Protocol and provenance details
    pub context: UnitContext,
}

impl TranslationUnit {
    /// Create a unit with a default context for a single-segment blob.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: UnitContext {
                segments: 1,
                ..UnitContext::default()
            },
        }
    }

    /// Attach a context.
    pub fn with_context(mut self, context: UnitContext) -> Self {
        self.context = context;
        self
    }
}

/// Translates one blob at a time.
///
/// Implementations may block; [`translate_batch`](crate::translate::translate_batch)
/// calls them from worker threads, so they must be `Sync`. Returning the
/// input unchanged is allowed and means "leave untranslated".
pub trait Translator: Sync {
    /// Translate `unit.text`, keeping every separator and placeholder token
    /// in place.
    fn translate(&self, unit: &TranslationUnit) -> Result<String>;
}

impl<F> Translator for F
where
    F: Fn(&TranslationUnit) -> Result<String> + Sync,
{
    fn translate(&self, unit: &TranslationUnit) -> Result<String> {
        self(unit)
    }
}

/// A translator that hands every blob back unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator;

impl Translator for IdentityTranslator {
    fn translate(&self, unit: &TranslationUnit) -> Result<String> {
        Ok(unit.text.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_translator_echoes() {
        let unit = TranslationUnit::new("x");
        assert_eq!(IdentityTranslator.translate(&unit).unwrap(), "x");
    }

    #[test]
    fn test_closure_is_a_translator() {
        let upper = |unit: &TranslationUnit| -> Result<String> { Ok(unit.text.to_uppercase()) };
        let unit = TranslationUnit::new("hello");
        assert_eq!(upper.translate(&unit).unwrap(), "HELLO");
        assert_eq!(unit.context.expected_separators(), 0);
    }
}
