//! Explicit child-to-parent map for an [`XmlTree`].
use super::tree::{NodeId, XmlTree};
use crate::ooxml::error::{OoxmlError, Result};

/// Maps every attached node to its parent element and position.
///
/// Built once per document pass. Nodes allocated after the build (fresh
/// copies, rebuilt paragraphs) are unknown to the index.
#[derive(Debug, Clone)]
pub struct ParentIndex {
    slots: Vec<Option<(NodeId, usize)>>,
}

impl ParentIndex {
    /// Walk the tree from its root and record every parent/position pair.
    pub fn build(tree: &XmlTree) -> Self {
        let mut slots = vec![None; tree.len()];
        let mut stack = vec![tree.root()];
        while let Some(parent) = stack.pop() {
            for (pos, child) in tree.children(parent).iter().enumerate() {
                slots[child.index()] = Some((parent, pos));
                stack.push(*child);
            }
        }
        Self { slots }
    }

    /// Parent element of `id`.
    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slot(id).map(|(parent, _)| parent)
    }

    /// Position of `id` among its parent's children.
    #[inline]
    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.slot(id).map(|(_, pos)| pos)
    }

    #[inline]
    fn slot(&self, id: NodeId) -> Option<(NodeId, usize)> {
        self.slots.get(id.index()).copied().flatten()
    }

    /// Put `new` where `old` was recorded.
    ///
    /// The index itself is updated so `new` takes over the slot.
    ///
    /// # Errors
    ///
    /// [`OoxmlError::StructuralCorruption`] when `old` is not indexed or its
    /// parent no longer holds it at the recorded position.
    pub fn replace(&mut self, tree: &mut XmlTree, old: NodeId, new: NodeId) -> Result<()> {
        let (parent, pos) = self.slot(old).ok_or_else(|| {
            OoxmlError::StructuralCorruption(format!("node {} has no recorded parent", old.0))
        })?;
        if !tree.replace_child_at(parent, pos, old, new) {
            return Err(OoxmlError::StructuralCorruption(format!(
                "node {} is no longer child {} of node {}",
                old.0, pos, parent.0
            )));
        }
        if let Some(slot) = self.slots.get_mut(old.index()) {
            *slot = None;
        }
        if new.index() >= self.slots.len() {
            self.slots.resize(new.index() + 1, None);
        }
        self.slots[new.index()] = Some((parent, pos));
        Ok(())
    }
}
