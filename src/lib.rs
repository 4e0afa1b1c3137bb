//! Pomelo - format-preserving translation of Word (.docx) documents
//!
//! Paragraphs are translated as flat strings while their formatting,
//! images, formulas, fields and hyperlinks survive untouched.
//!
//! # How it works
//!
//! - Style inheritance is resolved and written out as direct run formatting
//! - Each paragraph is split into segments: runs with identical formatting
//!   are merged, non-text content becomes a placeholder
//! - Segments are joined with a separator and sent to a [`Translator`] on
//!   a bounded worker pool
//! - The translation is split back and the paragraph rebuilt; when the
//!   translator mangles the tokens, original text fills the gaps
//!
//! # Example
//!
//! ```
//! use pomelo::ooxml::docx::PartTranslator;
//! use pomelo::translate::{TranslateOptions, TranslationUnit};
//!
//! let xml = br#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Hello</w:t></w:r></w:p></w:body></w:document>"#;
//! let greet = |unit: &TranslationUnit| -> pomelo::translate::error::Result<String> {
//!     Ok(unit.text.replace("Hello", "Bonjour"))
//! };
//! let parts = PartTranslator::new(&greet, TranslateOptions::default());
//! let out = parts.translate_part("word/document.xml", xml);
//! assert!(String::from_utf8(out).unwrap().contains("Bonjour"));
//! ```
//!
//! # Logging
//!
//! Diagnostics go through `tracing`. Merge decisions, token mismatches,
//! fallbacks and per-part summaries use the `pomelo::audit` target so they
//! can be routed to their own sink. The library installs no subscriber.
pub mod common;
pub mod ooxml;
pub mod translate;

pub use ooxml::{OoxmlError, Result};
pub use translate::{TranslateOptions, Translator};

#[cfg(feature = "package")]
pub use ooxml::docx::{DocxPackage, translate_docx};
