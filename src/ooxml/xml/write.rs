//! Serializing an [`XmlTree`] back to bytes.
use super::tree::{Node, NodeId, XmlTree};

impl XmlTree {
    /// Serialize the whole document, prolog and epilog included.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::with_capacity(self.len() * 16);
        for id in self.top_level() {
            self.write_node(*id, &mut out);
        }
        out.into_bytes()
    }

    /// Serialize a single subtree. Mostly useful for diagnostics.
    pub fn to_xml_string(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match self.node(id) {
            Node::Text(raw) | Node::Raw(raw) => out.push_str(raw),
            Node::Element(e) => {
                out.push('<');
                out.push_str(e.name());
                for attr in e.attrs() {
                    let raw = attr.raw_value();
                    // Values read from single-quoted source may hold a bare '"'.
                    let quote = if raw.contains('"') { '\'' } else { '"' };
                    out.push(' ');
                    out.push_str(attr.name());
                    out.push('=');
                    out.push(quote);
                    out.push_str(raw);
                    out.push(quote);
                }
                if e.children().is_empty() {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                for child in e.children() {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(e.name());
                out.push('>');
            },
        }
    }
}
