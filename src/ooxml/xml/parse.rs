//! Building an [`XmlTree`] from part bytes.
use super::ns::{Ns, split_qname};
use super::tree::{Attribute, Element, Node, NodeId, XmlTree};
use crate::common::xml::unescape_xml;
use crate::ooxml::error::{OoxmlError, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;

/// In-scope prefix bindings, one frame per open element.
#[derive(Default)]
struct NsScopes {
    frames: Vec<Vec<(String, Ns)>>,
}

impl NsScopes {
    fn push(&mut self, frame: Vec<(String, Ns)>) {
        self.frames.push(frame);
    }

    fn pop(&mut self) {
        self.frames.pop();
    }

    /// Resolve `prefix` (empty for the default namespace).
    fn resolve(&self, prefix: &str) -> Option<Ns> {
        if prefix == "xml" {
            return Some(Ns::Xml);
        }
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| p == prefix)
            .map(|(_, ns)| ns.clone())
    }
}

impl XmlTree {
    /// Parse an XML part.
    ///
    /// The input must be UTF-8 (the only encoding Word writes for package
    /// parts). Everything except element tags is kept as raw source text, so
    /// writing the tree back reproduces comments, entity references and
    /// whitespace exactly.
    ///
    /// # Errors
    ///
    /// Returns [`OoxmlError::InvalidFormat`] for non-UTF-8 input or a missing
    /// root element, and [`OoxmlError::Xml`] for malformed markup.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let source = std::str::from_utf8(bytes)?;
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text(false);

        let mut nodes: Vec<Node> = Vec::with_capacity(bytes.len() / 16);
        let mut top: Vec<NodeId> = Vec::new();
        let mut open: Vec<NodeId> = Vec::with_capacity(32);
        let mut scopes = NsScopes::default();
        let mut root: Option<NodeId> = None;
        let mut prefixes: HashMap<Ns, String> = HashMap::new();

        loop {
            let start = reader.buffer_position() as usize;
            let event = reader.read_event()?;
            let end = reader.buffer_position() as usize;

            match event {
                Event::Start(e) => {
                    let element = open_element(&e, &mut scopes)?;
                    let id = attach(&mut nodes, &mut top, &open, Node::Element(element));
                    if open.is_empty() {
                        record_root(&mut root, &mut prefixes, &nodes, id)?;
                    }
                    open.push(id);
                },
                Event::Empty(e) => {
                    let element = open_element(&e, &mut scopes)?;
                    scopes.pop();
                    let id = attach(&mut nodes, &mut top, &open, Node::Element(element));
                    if open.is_empty() {
                        record_root(&mut root, &mut prefixes, &nodes, id)?;
                    }
                },
                Event::End(_) => {
                    open.pop();
                    scopes.pop();
                },
                Event::Text(_) | Event::GeneralRef(_) => {
                    push_text(&mut nodes, &mut top, &open, &source[start..end]);
                },
                Event::Eof => break,
                _ => {
                    attach(
                        &mut nodes,
                        &mut top,
                        &open,
                        Node::Raw(source[start..end].to_string()),
                    );
                },
            }
        }

        if !open.is_empty() {
            return Err(OoxmlError::Xml(format!(
                "unexpected end of document: {} element(s) left open",
                open.len()
            )));
        }
        let root = root.ok_or_else(|| OoxmlError::InvalidFormat("no root element".to_string()))?;
        Ok(XmlTree::from_parts(nodes, top, root, prefixes))
    }
}

fn open_element(e: &BytesStart<'_>, scopes: &mut NsScopes) -> Result<Element> {
    let name = std::str::from_utf8(e.name().as_ref())?.to_string();

    let mut raw_attrs: Vec<(String, String)> = Vec::new();
    let mut frame: Vec<(String, Ns)> = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = std::str::from_utf8(&attr.value)?.to_string();
        if key == "xmlns" {
            frame.push((String::new(), Ns::from_uri(&unescape_xml(&value))));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            frame.push((prefix.to_string(), Ns::from_uri(&unescape_xml(&value))));
        }
        raw_attrs.push((key, value));
    }
    scopes.push(frame);

    let ns = match split_qname(&name).0 {
        Some(prefix) => scopes.resolve(prefix).unwrap_or_else(|| unbound(prefix)),
        None => scopes.resolve("").unwrap_or(Ns::None),
    };

    let attrs = raw_attrs
        .into_iter()
        .map(|(key, value)| {
            let attr_ns = match split_qname(&key) {
                (Some("xmlns"), _) => Ns::None,
                (Some(prefix), _) => scopes.resolve(prefix).unwrap_or_else(|| unbound(prefix)),
                (None, _) => Ns::None,
            };
            Attribute::from_raw(key, attr_ns, value)
        })
        .collect();

    Ok(Element::new(name, ns, attrs))
}

/// Placeholder namespace for a prefix with no binding in scope.
fn unbound(prefix: &str) -> Ns {
    tracing::debug!(prefix, "unbound namespace prefix");
    Ns::Other(format!("urn:unbound:{}", prefix).into())
}

fn record_root(
    root: &mut Option<NodeId>,
    prefixes: &mut HashMap<Ns, String>,
    nodes: &[Node],
    id: NodeId,
) -> Result<()> {
    if root.is_some() {
        return Err(OoxmlError::Xml("multiple root elements".to_string()));
    }
    *root = Some(id);
    if let Node::Element(e) = &nodes[id.index()] {
        for attr in e.attrs() {
            let prefix = match attr.name() {
                "xmlns" => "",
                other => match other.strip_prefix("xmlns:") {
                    Some(p) => p,
                    None => continue,
                },
            };
            prefixes
                .entry(Ns::from_uri(&attr.value()))
                .or_insert_with(|| prefix.to_string());
        }
    }
    Ok(())
}

fn attach(nodes: &mut Vec<Node>, top: &mut Vec<NodeId>, open: &[NodeId], node: Node) -> NodeId {
    let id = NodeId(nodes.len() as u32);
    nodes.push(node);
    match open.last() {
        Some(parent) => {
            if let Node::Element(e) = &mut nodes[parent.index()] {
                e.push_child(id);
            }
        },
        None => top.push(id),
    }
    id
}

/// Text and entity-reference events arrive in pieces; coalesce them.
fn push_text(nodes: &mut Vec<Node>, top: &mut Vec<NodeId>, open: &[NodeId], raw: &str) {
    if raw.is_empty() {
        return;
    }
    let last_child = match open.last() {
        Some(parent) => match &nodes[parent.index()] {
            Node::Element(e) => e.children().last().copied(),
            _ => None,
        },
        None => top.last().copied(),
    };
    if let Some(last) = last_child
        && let Node::Text(existing) = &mut nodes[last.index()]
    {
        existing.push_str(raw);
        return;
    }
    attach(nodes, top, open, Node::Text(raw.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolves_namespaces() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:m="http://schemas.openxmlformats.org/officeDocument/2006/math"><w:body><m:oMath><m:r><m:t>x</m:t></m:r></m:oMath></w:body></w:document>"#;
        let tree = XmlTree::parse(xml.as_bytes()).unwrap();
        assert!(tree.is(tree.root(), &Ns::Word, "document"));
        assert!(tree.find_descendant(tree.root(), &Ns::Math, "oMath").is_some());
        assert_eq!(tree.top_level().len(), 3);
    }

    #[test]
    fn test_default_namespace_applies_to_unprefixed_elements() {
        let xml = r#"<document xmlns="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><p/></document>"#;
        let tree = XmlTree::parse(xml.as_bytes()).unwrap();
        assert!(tree.find_child(tree.root(), &Ns::Word, "p").is_some());
    }

    #[test]
    fn test_entity_references_coalesce_into_one_text_node() {
        let xml = r#"<a>x &amp; y &#x4E2D;</a>"#;
        let tree = XmlTree::parse(xml.as_bytes()).unwrap();
        assert_eq!(tree.children(tree.root()).len(), 1);
        assert_eq!(tree.text_content(tree.root()), "x & y 中");
    }

    #[test]
    fn test_rejects_unclosed_and_empty_documents() {
        assert!(XmlTree::parse(b"<a><b></b>").is_err());
        assert!(XmlTree::parse(b"   ").is_err());
        assert!(XmlTree::parse(&[0xff, 0xfe, 0x00]).is_err());
    }
}
