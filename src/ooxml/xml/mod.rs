//! Lossless, editable XML trees for document parts.
mod index;
pub mod ns;
mod parse;
mod tree;
mod write;

pub use index::ParentIndex;
pub use ns::Ns;
pub use tree::{Attribute, Element, Node, NodeId, OwnedElement, OwnedNode, XmlTree};
