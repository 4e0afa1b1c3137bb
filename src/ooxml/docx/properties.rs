//! Run-property sets (`w:rPr` contents) and their structural comparison.
use crate::ooxml::docx::markup::rpr_rank;
use crate::ooxml::xml::{Attribute, Ns, NodeId, OwnedElement, OwnedNode, XmlTree};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// An ordered set of run properties, keyed by element name.
///
/// Each entry is a detached copy of one child of a `w:rPr` element
/// (`w:b`, `w:sz`, `w:rFonts`, ...). The set never holds two entries with
/// the same `(namespace, local name)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunProperties {
    props: SmallVec<[OwnedElement; 8]>,
}

impl RunProperties {
    /// Create an empty set.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the child elements of a `w:rPr` node.
    pub fn from_element(tree: &XmlTree, rpr: NodeId) -> Self {
        let mut out = Self::new();
        for child in tree.child_elements(rpr) {
            if let Some(prop) = tree.snapshot(child) {
                out.set(prop);
            }
        }
        out
    }

    /// Read the child elements of a detached `w:rPr` snapshot.
    pub fn from_owned(rpr: &OwnedElement) -> Self {
        let mut out = Self::new();
        for child in rpr.child_elements() {
            out.set(child.clone());
        }
        out
    }

    /// Number of properties.
    #[inline]
    pub fn len(&self) -> usize {
        self.props.len()
    }

    /// Whether the set holds no property at all.
    ///
    /// See [`RunProperties::is_visually_empty`] for the weaker check used
    /// when comparing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// Properties in declaration order.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, OwnedElement> {
        self.props.iter()
    }

    /// Look up a property by namespace and local name.
    pub fn get(&self, ns: &Ns, local: &str) -> Option<&OwnedElement> {
        self.props.iter().find(|p| p.is(ns, local))
    }

    /// Whether a property with this name is present.
    #[inline]
    pub fn contains(&self, ns: &Ns, local: &str) -> bool {
        self.get(ns, local).is_some()
    }

    /// Insert a property, replacing an existing one of the same name in place.
    pub fn set(&mut self, prop: OwnedElement) {
        match self
            .props
            .iter_mut()
            .find(|p| p.ns == prop.ns && p.local_name() == prop.local_name())
        {
            Some(existing) => *existing = prop,
            None => self.props.push(prop),
        }
    }

    /// Remove a property, returning it if present.
    pub fn remove(&mut self, ns: &Ns, local: &str) -> Option<OwnedElement> {
        let pos = self.props.iter().position(|p| p.is(ns, local))?;
        Some(self.props.remove(pos))
    }

    /// Layer `upper` over `self`: every property `upper` declares wins, every
    /// property it leaves out keeps the value from `self`.
    pub fn overlay(&mut self, upper: &RunProperties) {
        for prop in upper.iter() {
            self.set(prop.clone());
        }
    }

    /// Non-mutating form of [`RunProperties::overlay`].
    pub fn overlaid(&self, upper: &RunProperties) -> RunProperties {
        let mut out = self.clone();
        out.overlay(upper);
        out
    }

    /// Font size in half-points (`w:sz/@w:val`).
    pub fn size(&self) -> Option<u32> {
        self.get(&Ns::Word, "sz")
            .and_then(|sz| sz.attr(&Ns::Word, "val"))
            .and_then(|v| v.trim().parse().ok())
    }

    /// Whether the set carries no visible formatting once presentation-only
    /// attributes are ignored.
    pub fn is_visually_empty(&self) -> bool {
        self.normalized().is_empty()
    }

    /// Write the set as a new, detached `w:rPr` element of `tree`, children
    /// in schema order.
    pub fn to_element(&self, tree: &mut XmlTree) -> NodeId {
        let rpr = tree.new_element(Ns::Word, "rPr");
        let mut ordered: Vec<&OwnedElement> = self.iter().collect();
        ordered.sort_by_key(|p| rpr_rank(&p.ns, p.local_name()));
        for prop in ordered {
            let child = tree.graft(prop);
            tree.append_child(rpr, child);
        }
        rpr
    }

    /// Overwrite the `w:rPr` child of `run` (a `w:r`, or an `m:r` where it
    /// sits after `m:rPr`). A missing element is created in front of the
    /// run content; an empty set removes the element instead.
    pub fn write_to_run(&self, tree: &mut XmlTree, run: NodeId) {
        let existing = tree.find_child(run, &Ns::Word, "rPr");
        if self.is_empty() {
            if let Some(old) = existing {
                tree.remove_child(run, old);
            }
            return;
        }
        let rpr = self.to_element(tree);
        let children = tree.children(run);
        match existing.and_then(|old| children.iter().position(|c| *c == old).map(|pos| (old, pos))) {
            Some((old, pos)) => {
                tree.replace_child_at(run, pos, old, rpr);
            },
            None => {
                let pos = children
                    .iter()
                    .take_while(|c| tree.is(**c, &Ns::Math, "rPr"))
                    .count();
                tree.insert_child(run, pos, rpr);
            },
        }
    }

    /// Build a WordprocessingML property element such as `<w:sz w:val="24"/>`.
    pub fn word_prop(local: &str, attrs: &[(&str, &str)]) -> OwnedElement {
        OwnedElement {
            name: format!("w:{}", local),
            ns: Ns::Word,
            attrs: attrs
                .iter()
                .map(|(name, value)| Attribute::new(format!("w:{}", name), Ns::Word, value))
                .collect(),
            children: Vec::new(),
        }
    }

    fn normalized(&self) -> BTreeMap<(Ns, String), NormalizedNode> {
        let mut out = BTreeMap::new();
        for prop in self.iter() {
            let mut node = NormalizedNode::from_owned(prop);
            if prop.is(&Ns::Word, "rFonts") {
                node.attrs.remove(&(Ns::Word, "hint".to_string()));
                if node.attrs.is_empty() && node.children.is_empty() {
                    tracing::trace!(target: "pomelo::audit", "ignoring rFonts that only carries a hint");
                    continue;
                }
            }
            out.insert((prop.ns.clone(), prop.local_name().to_string()), node);
        }
        out
    }
}

impl FromIterator<OwnedElement> for RunProperties {
    fn from_iter<I: IntoIterator<Item = OwnedElement>>(iter: I) -> Self {
        let mut out = Self::new();
        for prop in iter {
            out.set(prop);
        }
        out
    }
}

/// Order-insensitive form of a property subtree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct NormalizedNode {
    attrs: BTreeMap<(Ns, String), String>,
    children: Vec<(Ns, String, NormalizedNode)>,
    text: String,
}

impl NormalizedNode {
    fn from_owned(e: &OwnedElement) -> Self {
        let attrs = e
            .attrs
            .iter()
            .filter(|a| !a.is_namespace_decl())
            .map(|a| ((a.ns().clone(), a.local_name().to_string()), a.value().into_owned()))
            .collect();
        let mut children = Vec::new();
        let mut text = String::new();
        for child in &e.children {
            match child {
                OwnedNode::Element(c) => children.push((
                    c.ns.clone(),
                    c.local_name().to_string(),
                    NormalizedNode::from_owned(c),
                )),
                OwnedNode::Text(raw) => text.push_str(raw.trim()),
                OwnedNode::Raw(_) => {},
            }
        }
        children.sort();
        Self {
            attrs,
            children,
            text,
        }
    }
}

/// Decide whether two runs' formatting is the same for merging purposes.
///
/// `None` stands for a run without `w:rPr`. Two missing sets are equal; a
/// missing set equals a present one only when the latter is visually empty.
/// Otherwise both sets are compared structurally, ignoring property order
/// and the `w:hint` attribute of `w:rFonts`.
pub fn equivalent(a: Option<&RunProperties>, b: Option<&RunProperties>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(p), None) | (None, Some(p)) => p.is_visually_empty(),
        (Some(a), Some(b)) => a.normalized() == b.normalized(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(xml: &str) -> RunProperties {
        let doc = format!(
            r#"<w:rPr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">{}</w:rPr>"#,
            xml
        );
        let tree = XmlTree::parse(doc.as_bytes()).unwrap();
        RunProperties::from_element(&tree, tree.root())
    }

    #[test]
    fn test_hint_is_ignored() {
        let a = props(r#"<w:rFonts w:ascii="Arial" w:hint="eastAsia"/><w:b/>"#);
        let b = props(r#"<w:b/><w:rFonts w:ascii="Arial"/>"#);
        assert!(equivalent(Some(&a), Some(&b)));
    }

    #[test]
    fn test_hint_only_fonts_equal_absent() {
        let a = props(r#"<w:rFonts w:hint="eastAsia"/>"#);
        assert!(a.is_visually_empty());
        assert!(equivalent(Some(&a), None));
        assert!(equivalent(None, Some(&RunProperties::new())));
        assert!(!equivalent(Some(&props("<w:i/>")), None));
    }

    #[test]
    fn test_visible_difference_is_detected() {
        let a = props(r#"<w:color w:val="FF0000"/>"#);
        let b = props(r#"<w:color w:val="00FF00"/>"#);
        assert!(!equivalent(Some(&a), Some(&b)));
        assert!(!equivalent(Some(&props("<w:b/>")), Some(&props("<w:b/><w:i/>"))));
    }

    #[test]
    fn test_overlay_replaces_in_place() {
        let mut base = props(r#"<w:b/><w:sz w:val="24"/><w:color w:val="000000"/>"#);
        base.overlay(&props(r#"<w:i/><w:sz w:val="32"/>"#));
        let names: Vec<_> = base.iter().map(|p| p.local_name().to_string()).collect();
        assert_eq!(names, ["b", "sz", "color", "i"]);
        assert_eq!(base.size(), Some(32));
    }

    #[test]
    fn test_write_to_run_inserts_first() {
        let xml = r#"<w:r xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:t>x</w:t></w:r>"#;
        let mut tree = XmlTree::parse(xml.as_bytes()).unwrap();
        let run = tree.root();
        let p: RunProperties = [RunProperties::word_prop("sz", &[("val", "20")])]
            .into_iter()
            .collect();
        p.write_to_run(&mut tree, run);
        assert_eq!(
            String::from_utf8(tree.to_bytes()).unwrap(),
            r#"<w:r xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:rPr><w:sz w:val="20"/></w:rPr><w:t>x</w:t></w:r>"#
        );
    }
}
