//! The flat-text translation boundary.
//!
//! Paragraphs cross it as single strings: segments joined by a separator,
//! non-text content replaced by a placeholder (see [`protocol`]). The
//! [`Translator`] collaborator turns one such string into another, and
//! [`translate_batch`] runs many of them on a bounded worker pool.
pub mod batch;
pub mod config;
pub mod error;
pub mod guard;
pub mod protocol;
pub mod translator;

pub use batch::{BatchOptions, BatchOutcome, UnitStatus, translate_batch, translate_unit};
pub use config::TranslateOptions;
pub use error::TranslateError;
pub use protocol::{Aligned, Alignment, Piece, Tokens};
pub use translator::{IdentityTranslator, TranslationUnit, Translator, UnitContext};
