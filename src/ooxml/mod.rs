//! Office Open XML support: a lossless XML model and the Word-specific
//! translation passes built on it.
pub mod docx;
pub mod error;
pub mod xml;

pub use error::{OoxmlError, Result};
