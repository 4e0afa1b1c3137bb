//! Utilities shared across the crate.
pub mod text;
pub mod xml;

pub use text::{excerpt, is_meaningful_text};
