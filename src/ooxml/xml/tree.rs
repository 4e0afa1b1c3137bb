//! Arena-backed XML tree used for in-place editing of document parts.
//!
//! Nodes live in a single `Vec` and are addressed by [`NodeId`]. Elements own
//! an ordered list of child ids; there are no parent back-references (see
//! [`ParentIndex`](super::ParentIndex) for the explicit reverse map).
//! Character data is stored in its raw, still-escaped form so that content the
//! pipeline never touches is written back byte-for-byte.
use super::ns::{Ns, split_qname};
use crate::common::xml::{escape_attr, escape_text, unescape_xml};
use std::borrow::Cow;
use std::collections::HashMap;

/// Handle to a node inside an [`XmlTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// An attribute with its resolved namespace and raw (escaped) value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    name: String,
    ns: Ns,
    raw_value: String,
}

impl Attribute {
    /// Create an attribute from an unescaped value.
    pub fn new(name: impl Into<String>, ns: Ns, value: &str) -> Self {
        Self {
            name: name.into(),
            ns,
            raw_value: escape_attr(value),
        }
    }

    pub(crate) fn from_raw(name: String, ns: Ns, raw_value: String) -> Self {
        Self {
            name,
            ns,
            raw_value,
        }
    }

    /// Qualified name as written in the source (`w:val`).
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Local part of the name (`val`).
    #[inline]
    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    /// Resolved namespace.
    #[inline]
    pub fn ns(&self) -> &Ns {
        &self.ns
    }

    /// Unescaped value.
    #[inline]
    pub fn value(&self) -> Cow<'_, str> {
        unescape_xml(&self.raw_value)
    }

    /// Raw value exactly as it appears between the quotes.
    #[inline]
    pub fn raw_value(&self) -> &str {
        &self.raw_value
    }

    /// Whether this is a namespace declaration (`xmlns` or `xmlns:*`).
    #[inline]
    pub fn is_namespace_decl(&self) -> bool {
        self.name == "xmlns" || self.name.starts_with("xmlns:")
    }

    #[inline]
    fn matches(&self, ns: &Ns, local: &str) -> bool {
        &self.ns == ns && self.local_name() == local
    }
}

/// An element node.
#[derive(Debug, Clone)]
pub struct Element {
    name: String,
    ns: Ns,
    attrs: Vec<Attribute>,
    children: Vec<NodeId>,
}

impl Element {
    pub(crate) fn new(name: String, ns: Ns, attrs: Vec<Attribute>) -> Self {
        Self {
            name,
            ns,
            attrs,
            children: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn push_child(&mut self, id: NodeId) {
        self.children.push(id);
    }

    /// Qualified name (`w:r`).
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Local name (`r`).
    #[inline]
    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    /// Resolved namespace.
    #[inline]
    pub fn ns(&self) -> &Ns {
        &self.ns
    }

    /// Check namespace and local name at once.
    #[inline]
    pub fn is(&self, ns: &Ns, local: &str) -> bool {
        &self.ns == ns && self.local_name() == local
    }

    /// All attributes in source order.
    #[inline]
    pub fn attrs(&self) -> &[Attribute] {
        &self.attrs
    }

    /// Look up an attribute value by namespace and local name.
    pub fn attr(&self, ns: &Ns, local: &str) -> Option<Cow<'_, str>> {
        self.attrs
            .iter()
            .find(|a| a.matches(ns, local))
            .map(Attribute::value)
    }

    /// Child node ids in document order.
    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// A single node of the tree.
#[derive(Debug, Clone)]
pub enum Node {
    /// Element with attributes and children
    Element(Element),
    /// Raw (escaped) character data, entity references included
    Text(String),
    /// Comment, CDATA, processing instruction, declaration or doctype,
    /// kept verbatim
    Raw(String),
}

/// A detached copy of an element subtree.
///
/// Snapshots carry no [`NodeId`]s, so they can be stored outside of the tree
/// they were taken from (style sheets keep their run properties this way) and
/// grafted into a different tree later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedElement {
    /// Qualified name
    pub name: String,
    /// Resolved namespace
    pub ns: Ns,
    /// Attributes
    pub attrs: Vec<Attribute>,
    /// Children
    pub children: Vec<OwnedNode>,
}

/// A node of an [`OwnedElement`] subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnedNode {
    /// Nested element
    Element(OwnedElement),
    /// Raw character data
    Text(String),
    /// Verbatim markup
    Raw(String),
}

impl OwnedElement {
    /// Local name (`b`, `rFonts`).
    #[inline]
    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    /// Check namespace and local name at once.
    #[inline]
    pub fn is(&self, ns: &Ns, local: &str) -> bool {
        &self.ns == ns && self.local_name() == local
    }

    /// Look up an attribute value by namespace and local name.
    pub fn attr(&self, ns: &Ns, local: &str) -> Option<Cow<'_, str>> {
        self.attrs
            .iter()
            .find(|a| a.matches(ns, local))
            .map(Attribute::value)
    }

    /// Child elements, skipping text and raw nodes.
    pub fn child_elements(&self) -> impl Iterator<Item = &OwnedElement> {
        self.children.iter().filter_map(|c| match c {
            OwnedNode::Element(e) => Some(e),
            _ => None,
        })
    }
}

/// An editable XML document.
#[derive(Debug, Clone)]
pub struct XmlTree {
    nodes: Vec<Node>,
    /// Prolog, root element and epilog in document order
    top: Vec<NodeId>,
    root: NodeId,
    /// Prefixes declared on the root element, first declaration wins
    prefixes: HashMap<Ns, String>,
}

impl XmlTree {
    pub(crate) fn from_parts(
        nodes: Vec<Node>,
        top: Vec<NodeId>,
        root: NodeId,
        prefixes: HashMap<Ns, String>,
    ) -> Self {
        Self {
            nodes,
            top,
            root,
            prefixes,
        }
    }

    /// The document element.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Top-level nodes (declaration, comments, root element).
    #[inline]
    pub(crate) fn top_level(&self) -> &[NodeId] {
        &self.top
    }

    /// Number of nodes ever allocated, detached ones included.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A parsed tree always has a root element.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Access a node.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Access a node as an element.
    #[inline]
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.index()] {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.index()] {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Whether `id` is an element with the given namespace and local name.
    #[inline]
    pub fn is(&self, id: NodeId, ns: &Ns, local: &str) -> bool {
        self.element(id).is_some_and(|e| e.is(ns, local))
    }

    /// Children of `id`; empty for text and raw nodes.
    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.element(id).map_or(&[], Element::children)
    }

    /// Element children of `id`.
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| matches!(self.node(*c), Node::Element(_)))
    }

    /// First direct child element matching `ns`/`local`.
    pub fn find_child(&self, id: NodeId, ns: &Ns, local: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|c| self.is(*c, ns, local))
    }

    /// All descendants of `id` in document (pre-)order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Descendant elements matching `ns`/`local`, in document order.
    pub fn descendants_named(&self, id: NodeId, ns: &Ns, local: &str) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|d| self.is(*d, ns, local))
            .collect()
    }

    /// First descendant element matching `ns`/`local`.
    pub fn find_descendant(&self, id: NodeId, ns: &Ns, local: &str) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            if self.is(next, ns, local) {
                return Some(next);
            }
            stack.extend(self.children(next).iter().rev().copied());
        }
        None
    }

    /// Attribute value of element `id`.
    pub fn attr(&self, id: NodeId, ns: &Ns, local: &str) -> Option<Cow<'_, str>> {
        self.element(id).and_then(|e| e.attr(ns, local))
    }

    /// Concatenated, unescaped character data below `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.node(id) {
            Node::Text(raw) => out.push_str(&unescape_xml(raw)),
            Node::Element(e) => {
                for child in e.children() {
                    self.collect_text(*child, out);
                }
            },
            Node::Raw(_) => {},
        }
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Prefix used in this document for `ns`.
    ///
    /// Falls back to the conventional Word prefix when the root element does
    /// not declare the namespace.
    pub fn prefix_for(&self, ns: &Ns) -> Option<&str> {
        self.prefixes
            .get(ns)
            .map(String::as_str)
            .or_else(|| ns.conventional_prefix())
    }

    fn qualify(&self, ns: &Ns, local: &str) -> String {
        match self.prefix_for(ns) {
            Some("") | None => local.to_string(),
            Some(prefix) => format!("{}:{}", prefix, local),
        }
    }

    /// Allocate a new, detached element.
    pub fn new_element(&mut self, ns: Ns, local: &str) -> NodeId {
        let name = self.qualify(&ns, local);
        self.push(Node::Element(Element::new(name, ns, Vec::new())))
    }

    /// Allocate a detached text node from an unescaped value.
    pub fn new_text(&mut self, value: &str) -> NodeId {
        self.push(Node::Text(escape_text(value)))
    }

    /// Append `child` to the children of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(e) = self.element_mut(parent) {
            e.children.push(child);
        }
    }

    /// Insert `child` at `pos` (clamped to the child count).
    pub fn insert_child(&mut self, parent: NodeId, pos: usize, child: NodeId) {
        if let Some(e) = self.element_mut(parent) {
            let pos = pos.min(e.children.len());
            e.children.insert(pos, child);
        }
    }

    /// Detach `child` from `parent`. Returns whether it was found.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        match self.element_mut(parent) {
            Some(e) => match e.children.iter().position(|c| *c == child) {
                Some(pos) => {
                    e.children.remove(pos);
                    true
                },
                None => false,
            },
            None => false,
        }
    }

    /// Detach every child of `parent`.
    pub fn clear_children(&mut self, parent: NodeId) {
        if let Some(e) = self.element_mut(parent) {
            e.children.clear();
        }
    }

    /// Swap the child at `pos` of `parent` for `new`, if it currently is `expected`.
    pub(crate) fn replace_child_at(
        &mut self,
        parent: NodeId,
        pos: usize,
        expected: NodeId,
        new: NodeId,
    ) -> bool {
        match self.element_mut(parent) {
            Some(e) if e.children.get(pos) == Some(&expected) => {
                e.children[pos] = new;
                true
            },
            _ => false,
        }
    }

    /// Set (or overwrite) an attribute from an unescaped value.
    pub fn set_attr(&mut self, id: NodeId, ns: Ns, local: &str, value: &str) {
        let name = self.qualify(&ns, local);
        if let Some(e) = self.element_mut(id) {
            match e.attrs.iter_mut().find(|a| a.matches(&ns, local)) {
                Some(existing) => existing.raw_value = escape_attr(value),
                None => e.attrs.push(Attribute::new(name, ns, value)),
            }
        }
    }

    /// Remove an attribute. Returns whether it was present.
    pub fn remove_attr(&mut self, id: NodeId, ns: &Ns, local: &str) -> bool {
        match self.element_mut(id) {
            Some(e) => {
                let before = e.attrs.len();
                e.attrs.retain(|a| !a.matches(ns, local));
                before != e.attrs.len()
            },
            None => false,
        }
    }

    /// Replace the content of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, value: &str) {
        let text = self.new_text(value);
        if let Some(e) = self.element_mut(id) {
            e.children.clear();
            e.children.push(text);
        }
    }

    /// Copy element `id` with its attributes but without children.
    pub fn shallow_copy(&mut self, id: NodeId) -> Option<NodeId> {
        let e = self.element(id)?;
        let copy = Element::new(e.name.clone(), e.ns.clone(), e.attrs.clone());
        Some(self.push(Node::Element(copy)))
    }

    /// Copy the subtree rooted at `id` into fresh nodes of this tree.
    pub fn deep_copy(&mut self, id: NodeId) -> NodeId {
        let copied = match self.node(id).clone() {
            Node::Element(mut e) => {
                e.children = e.children.into_iter().map(|c| self.deep_copy(c)).collect();
                Node::Element(e)
            },
            other => other,
        };
        self.push(copied)
    }

    /// Take a detached copy of the element subtree at `id`.
    pub fn snapshot(&self, id: NodeId) -> Option<OwnedElement> {
        let e = self.element(id)?;
        let children = e
            .children
            .iter()
            .filter_map(|c| match self.node(*c) {
                Node::Element(_) => self.snapshot(*c).map(OwnedNode::Element),
                Node::Text(raw) => Some(OwnedNode::Text(raw.clone())),
                Node::Raw(raw) => Some(OwnedNode::Raw(raw.clone())),
            })
            .collect();
        Some(OwnedElement {
            name: e.name.clone(),
            ns: e.ns.clone(),
            attrs: e.attrs.clone(),
            children,
        })
    }

    /// Copy a snapshot into this tree as a detached subtree.
    ///
    /// Names are re-prefixed to match this document's declarations. A
    /// namespace this document does not declare gets a local `xmlns:*`
    /// declaration on the grafted element so the output stays well-formed.
    pub fn graft(&mut self, owned: &OwnedElement) -> NodeId {
        let (name, mut extra_decls) = self.retarget(&owned.name, &owned.ns);
        let mut attrs = Vec::with_capacity(owned.attrs.len());
        for attr in &owned.attrs {
            if attr.is_namespace_decl() || attr.ns == Ns::None {
                attrs.push(attr.clone());
                continue;
            }
            let (attr_name, decls) = self.retarget(&attr.name, &attr.ns);
            extra_decls.extend(decls);
            attrs.push(Attribute::from_raw(
                attr_name,
                attr.ns.clone(),
                attr.raw_value.clone(),
            ));
        }
        for decl in extra_decls {
            if !attrs.iter().any(|a| a.name == decl.name) {
                attrs.push(decl);
            }
        }

        let mut element = Element::new(name, owned.ns.clone(), attrs);
        for child in &owned.children {
            let id = match child {
                OwnedNode::Element(e) => self.graft(e),
                OwnedNode::Text(raw) => self.push(Node::Text(raw.clone())),
                OwnedNode::Raw(raw) => self.push(Node::Raw(raw.clone())),
            };
            element.children.push(id);
        }
        self.push(Node::Element(element))
    }

    /// Rename `qname` to this document's prefix for `ns`, returning any
    /// namespace declaration the new name needs.
    fn retarget(&self, qname: &str, ns: &Ns) -> (String, Vec<Attribute>) {
        let (src_prefix, local) = split_qname(qname);
        if *ns == Ns::Xml || *ns == Ns::None {
            return (qname.to_string(), Vec::new());
        }
        match self.prefixes.get(ns) {
            Some(prefix) if prefix.is_empty() => (local.to_string(), Vec::new()),
            Some(prefix) => (format!("{}:{}", prefix, local), Vec::new()),
            None => match src_prefix {
                Some(prefix) => {
                    let decl = Attribute::new(format!("xmlns:{}", prefix), Ns::None, ns.uri());
                    (qname.to_string(), vec![decl])
                },
                None => {
                    let decl = Attribute::new("xmlns", Ns::None, ns.uri());
                    (qname.to_string(), vec![decl])
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>A &amp; B</w:t></w:r></w:p></w:body></w:document>"#;

    #[test]
    fn test_text_content_unescapes() {
        let tree = XmlTree::parse(DOC.as_bytes()).unwrap();
        assert_eq!(tree.text_content(tree.root()), "A & B");
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let mut tree = XmlTree::parse(DOC.as_bytes()).unwrap();
        let t = tree.find_descendant(tree.root(), &Ns::Word, "t").unwrap();
        let copy = tree.deep_copy(t);
        tree.set_text(copy, "changed");
        assert_eq!(tree.text_content(t), "A & B");
        assert_eq!(tree.text_content(copy), "changed");
    }

    #[test]
    fn test_new_element_uses_document_prefix() {
        let xml = r#"<x:document xmlns:x="http://schemas.openxmlformats.org/wordprocessingml/2006/main"/>"#;
        let mut tree = XmlTree::parse(xml.as_bytes()).unwrap();
        let r = tree.new_element(Ns::Word, "r");
        assert_eq!(tree.element(r).unwrap().name(), "x:r");
    }

    #[test]
    fn test_graft_declares_unknown_namespace() {
        let styles = r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:w14="http://schemas.microsoft.com/office/word/2010/wordml"><w14:ligatures w14:val="all"/></w:styles>"#;
        let src = XmlTree::parse(styles.as_bytes()).unwrap();
        let lig = src.child_elements(src.root()).next().unwrap();
        let snap = src.snapshot(lig).unwrap();

        let mut dst = XmlTree::parse(DOC.as_bytes()).unwrap();
        let grafted = dst.graft(&snap);
        let e = dst.element(grafted).unwrap();
        assert_eq!(e.name(), "w14:ligatures");
        assert!(e.attrs().iter().any(|a| a.name() == "xmlns:w14"));
    }

    #[test]
    fn test_set_and_remove_attr() {
        let mut tree = XmlTree::parse(DOC.as_bytes()).unwrap();
        let t = tree.find_descendant(tree.root(), &Ns::Word, "t").unwrap();
        tree.set_attr(t, Ns::Xml, "space", "preserve");
        assert_eq!(tree.attr(t, &Ns::Xml, "space").as_deref(), Some("preserve"));
        assert_eq!(tree.element(t).unwrap().attrs()[0].name(), "xml:space");
        assert!(tree.remove_attr(t, &Ns::Xml, "space"));
        assert!(tree.attr(t, &Ns::Xml, "space").is_none());
    }
}
