//! Translating one document part end to end.
use crate::ooxml::docx::materialize::materialize;
use crate::ooxml::docx::reconstruct::rebuild;
use crate::ooxml::docx::resolve::StyleResolver;
use crate::ooxml::docx::segment::{ParagraphStructure, segment};
use crate::ooxml::docx::typography::apply_typography;
use crate::ooxml::error::Result;
use crate::ooxml::xml::{Ns, ParentIndex, XmlTree};
use crate::translate::batch::{BatchOutcome, UnitStatus, translate_batch};
use crate::translate::config::TranslateOptions;
use crate::translate::protocol::{Alignment, deserialize};
use crate::translate::translator::{TranslationUnit, Translator, UnitContext};
use std::fmt;

/// Parts that hold paragraph markup, besides numbered headers and footers.
const FIXED_PARTS: &[&str] = &[
    "word/document.xml",
    "word/footnotes.xml",
    "word/endnotes.xml",
    "word/comments.xml",
    "word/glossary/document.xml",
];

/// Whether `name` is a part whose paragraphs get translated.
///
/// # Examples
///
/// ```
/// use pomelo::ooxml::docx::is_translatable_part;
///
/// assert!(is_translatable_part("word/document.xml"));
/// assert!(is_translatable_part("/word/header2.xml"));
/// assert!(!is_translatable_part("word/styles.xml"));
/// assert!(!is_translatable_part("word/_rels/header1.xml.rels"));
/// ```
pub fn is_translatable_part(name: &str) -> bool {
    let name = name.trim_start_matches('/');
    if FIXED_PARTS.contains(&name) {
        return true;
    }
    let Some(file) = name.strip_prefix("word/") else {
        return false;
    };
    !file.contains('/')
        && file.ends_with(".xml")
        && (file.starts_with("header") || file.starts_with("footer"))
}

/// What happened to one part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartReport {
    /// Part name
    pub part: String,
    /// Paragraphs found, nested ones included
    pub paragraphs: usize,
    /// Paragraphs sent to the translator
    pub translatable: usize,
    /// Paragraphs rebuilt with translated text
    pub translated: usize,
    /// Paragraphs the translator handed back unchanged
    pub unchanged: usize,
    /// Paragraphs whose translation failed; their original text is kept
    pub failed: usize,
    /// Paragraphs whose tokens came back wrong but could still be aligned
    pub mismatches: usize,
    /// Paragraphs rebuilt from their original text because alignment failed
    pub fallbacks: usize,
    /// Rebuilt paragraphs that could not be put back into the tree
    pub corruptions: usize,
    /// Set when the part could not be processed at all
    pub fatal: Option<String>,
}

impl PartReport {
    fn new(part: &str) -> Self {
        Self {
            part: part.to_string(),
            ..Self::default()
        }
    }
}

impl fmt::Display for PartReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} paragraphs, {} translated, {} unchanged, {} failed, {} mismatched, {} fallbacks, {} corrupt",
            self.part,
            self.paragraphs,
            self.translated,
            self.unchanged,
            self.failed,
            self.mismatches,
            self.fallbacks,
            self.corruptions
        )
    }
}

/// Translates document parts with one translator and one set of options.
pub struct PartTranslator<'t> {
    translator: &'t dyn Translator,
    options: TranslateOptions,
    resolver: Option<StyleResolver>,
}

impl<'t> PartTranslator<'t> {
    /// Create a part translator without style information.
    pub fn new(translator: &'t dyn Translator, options: TranslateOptions) -> Self {
        Self {
            translator,
            options,
            resolver: None,
        }
    }

    /// Use `resolver` for style materialization and size lookups.
    pub fn with_styles(mut self, resolver: StyleResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// The options in use.
    #[inline]
    pub fn options(&self) -> &TranslateOptions {
        &self.options
    }

    /// Translate a part, returning its new bytes.
    ///
    /// Never fails: a part that cannot be parsed, or in which nothing
    /// changed, is returned byte for byte.
    pub fn translate_part(&self, name: &str, bytes: &[u8]) -> Vec<u8> {
        self.translate_part_with_report(name, bytes).0
    }

    /// [`PartTranslator::translate_part`] plus a summary of what happened.
    pub fn translate_part_with_report(&self, name: &str, bytes: &[u8]) -> (Vec<u8>, PartReport) {
        let mut report = PartReport::new(name);
        if !is_translatable_part(name) {
            tracing::debug!(part = name, "part has no paragraph markup, skipped");
            return (bytes.to_vec(), report);
        }
        match self.process(name, bytes, &mut report) {
            Ok(Some(out)) => (out, report),
            Ok(None) => (bytes.to_vec(), report),
            Err(err) => {
                tracing::error!(target: "pomelo::audit", part = name, error = %err, "part left untouched");
                report.fatal = Some(err.to_string());
                (bytes.to_vec(), report)
            },
        }
    }

    /// Returns `None` when the part did not change.
    fn process(&self, name: &str, bytes: &[u8], report: &mut PartReport) -> Result<Option<Vec<u8>>> {
        let mut tree = XmlTree::parse(bytes)?;
        let root = tree.root();
        let mut modified = false;

        if self.options.materialize_styles {
            match &self.resolver {
                Some(resolver) => {
                    let stats = materialize(&mut tree, root, resolver);
                    modified |= stats.runs_processed + stats.math_runs > 0;
                },
                None => tracing::debug!(part = name, "no style sheet, materialization skipped"),
            }
        }
        if !self.options.typography.is_noop() {
            let stats = apply_typography(&mut tree, root, self.resolver.as_ref(), &self.options.typography);
            modified |= stats.runs_styled + stats.math_aligned > 0
                || (self.options.typography.line_spacing.is_some() && stats.paragraphs > 0);
        }

        let tokens = self.options.tokens();
        let paragraphs = tree.descendants_named(root, &Ns::Word, "p");
        report.paragraphs = paragraphs.len();

        let structures: Vec<(usize, ParagraphStructure)> = paragraphs
            .iter()
            .enumerate()
            .map(|(i, p)| (i, segment(&tree, *p, &tokens)))
            .filter(|(_, s)| s.is_translatable())
            .collect();
        report.translatable = structures.len();

        let units: Vec<TranslationUnit> = structures
            .iter()
            .map(|(i, s)| TranslationUnit {
                text: s.blob.clone(),
                context: UnitContext {
                    part: name.to_string(),
                    paragraph: *i,
                    tokens: s.tokens.clone(),
                    segments: s.segments.len(),
                    placeholders: s.placeholder_count(),
                    source_lang: self.options.source_lang.clone(),
                    target_lang: self.options.target_lang.clone(),
                },
            })
            .collect();
        let outcomes = translate_batch(self.translator, &units, &self.options.batch_options());

        let mut index = ParentIndex::build(&tree);
        for ((i, structure), outcome) in structures.iter().zip(&outcomes) {
            if !self.apply(&mut tree, &mut index, *i, structure, outcome, report) {
                continue;
            }
            modified = true;
        }

        tracing::info!(target: "pomelo::audit", "{}", report);
        if !modified {
            return Ok(None);
        }
        Ok(Some(tree.to_bytes()))
    }

    /// Rebuild one paragraph from its outcome and swap it in. Returns
    /// whether the tree changed.
    fn apply(
        &self,
        tree: &mut XmlTree,
        index: &mut ParentIndex,
        position: usize,
        structure: &ParagraphStructure,
        outcome: &BatchOutcome,
        report: &mut PartReport,
    ) -> bool {
        if outcome.is_failure() {
            report.failed += 1;
            return false;
        }
        if outcome.text == structure.blob {
            if outcome.status != UnitStatus::Skipped {
                report.unchanged += 1;
            }
            return false;
        }

        let aligned = deserialize(&outcome.text, &structure.pieces(), &structure.tokens);
        match aligned.alignment {
            Alignment::Exact => {},
            Alignment::PlaceholderMismatch | Alignment::Collapsed => report.mismatches += 1,
            Alignment::Fallback => report.fallbacks += 1,
        }

        let rebuilt = rebuild(tree, structure, &aligned.texts);
        match index.replace(tree, structure.paragraph, rebuilt) {
            Ok(()) => {
                if aligned.alignment.is_translated() {
                    report.translated += 1;
                }
                true
            },
            Err(err) => {
                report.corruptions += 1;
                tracing::error!(
                    target: "pomelo::audit",
                    part = %report.part,
                    paragraph = position,
                    error = %err,
                    "rebuilt paragraph could not be put back"
                );
                false
            },
        }
    }
}
