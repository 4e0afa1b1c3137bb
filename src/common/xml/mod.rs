//! XML helpers shared by the document model and the writers.
mod escape;

pub use escape::{escape_attr, escape_text, unescape_xml};
