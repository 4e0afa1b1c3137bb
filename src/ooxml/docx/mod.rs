//! Word (.docx) translation support.
//!
//! The pieces, in the order a part goes through them:
//! - [`StyleResolver`]: style inheritance flattened into run properties
//! - [`materialize()`]: style references written out as direct formatting
//! - [`apply_typography`]: target-language fonts, sizes and spacing
//! - [`segment()`]: a paragraph split into text groups, opaque nodes and hyperlinks
//! - [`rebuild`]: a paragraph rebuilt from segments and translated texts
//! - [`PartTranslator`]: all of the above for one part, around a [`Translator`](crate::translate::Translator)
//!
//! # Example
//!
//! ```rust,no_run
//! use pomelo::ooxml::docx::translate_docx;
//! use pomelo::translate::{TranslateOptions, TranslationUnit};
//!
//! let upper = |unit: &TranslationUnit| -> pomelo::translate::error::Result<String> {
//!     Ok(unit.text.to_uppercase())
//! };
//! let reports = translate_docx("in.docx", "out.docx", &upper, &TranslateOptions::default(), None)?;
//! for report in reports {
//!     println!("{}", report);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
pub mod enums;
pub mod fonts;
pub(crate) mod markup;
pub mod materialize;
#[cfg(feature = "package")]
pub mod package;
pub mod pipeline;
pub mod properties;
pub mod reconstruct;
pub mod resolve;
pub mod segment;
pub mod styles;
pub mod typography;

pub use enums::WdStyleType;
pub use fonts::{FONT_TABLE_PART, MODERN_FONT_TABLE};
pub use materialize::{MaterializeStats, materialize};
#[cfg(feature = "package")]
pub use package::{DocxPackage, translate_docx, translate_package};
pub use pipeline::{PartReport, PartTranslator, is_translatable_part};
pub use properties::{RunProperties, equivalent};
pub use reconstruct::rebuild;
pub use resolve::{NORMAL_STYLE, StyleResolver};
pub use segment::{ParagraphStructure, Segment, Slot, consistent_properties, segment};
pub use styles::{Style, StyleSheet};
pub use typography::{SizePreset, TypographyOptions, TypographyStats, apply_typography};
