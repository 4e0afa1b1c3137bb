//! Shared WordprocessingML vocabulary and small tree helpers.
use crate::ooxml::xml::{Ns, NodeId, XmlTree};
use phf::{Map, Set, phf_map, phf_set};

/// Run children that make a run opaque: the run is carried through verbatim
/// and never merged with its neighbours.
pub(crate) static OPAQUE_RUN_CHILDREN: Set<&'static str> = phf_set! {
    "fldChar",
    "instrText",
    "delInstrText",
    "drawing",
    "object",
    "pict",
    "footnoteReference",
    "endnoteReference",
    "commentReference",
    "annotationRef",
    "footnoteRef",
    "endnoteRef",
    "separator",
    "continuationSeparator",
    "sym",
    "ruby",
    "fldSimple",
};

/// In-run layout marks and the character each one stands for in segment
/// text. The marks themselves travel with the segment and are put back
/// where the translation has the character.
static LAYOUT_MARKS: Map<&'static str, char> = phf_map! {
    "tab" => '\t',
    "ptab" => '\t',
    "br" => '\n',
    "cr" => '\n',
    "noBreakHyphen" => '\u{2011}',
    "softHyphen" => '\u{00AD}',
};

/// Character a layout mark element stands for, if `id` is one.
pub(crate) fn layout_mark_char(tree: &XmlTree, id: NodeId) -> Option<char> {
    let e = tree.element(id)?;
    match e.ns() {
        Ns::Word => LAYOUT_MARKS.get(e.local_name()).copied(),
        _ => None,
    }
}

/// Element written for a mark character the translation added.
pub(crate) fn layout_mark_element(c: char) -> Option<&'static str> {
    match c {
        '\t' => Some("tab"),
        '\n' => Some("br"),
        '\u{2011}' => Some("noBreakHyphen"),
        '\u{00AD}' => Some("softHyphen"),
        _ => None,
    }
}

/// Run children that neither carry text nor block merging.
pub(crate) static IGNORABLE_RUN_CHILDREN: Set<&'static str> = phf_set! {
    "rPr",
    "lastRenderedPageBreak",
};

/// Position of each `w:rPr` child in the schema sequence (`CT_RPr`).
static RPR_ORDER: Map<&'static str, u8> = phf_map! {
    "rStyle" => 0,
    "rFonts" => 1,
    "b" => 2,
    "bCs" => 3,
    "i" => 4,
    "iCs" => 5,
    "caps" => 6,
    "smallCaps" => 7,
    "strike" => 8,
    "dstrike" => 9,
    "outline" => 10,
    "shadow" => 11,
    "emboss" => 12,
    "imprint" => 13,
    "noProof" => 14,
    "snapToGrid" => 15,
    "vanish" => 16,
    "webHidden" => 17,
    "color" => 18,
    "spacing" => 19,
    "w" => 20,
    "kern" => 21,
    "position" => 22,
    "sz" => 23,
    "szCs" => 24,
    "highlight" => 25,
    "u" => 26,
    "effect" => 27,
    "bdr" => 28,
    "shd" => 29,
    "fitText" => 30,
    "vertAlign" => 31,
    "rtl" => 32,
    "cs" => 33,
    "em" => 34,
    "lang" => 35,
    "eastAsianLayout" => 36,
    "specVanish" => 37,
    "oMath" => 38,
};

/// Position of each `w:pPr` child in the schema sequence (`CT_PPr`).
static PPR_ORDER: Map<&'static str, u8> = phf_map! {
    "pStyle" => 0,
    "keepNext" => 1,
    "keepLines" => 2,
    "pageBreakBefore" => 3,
    "framePr" => 4,
    "widowControl" => 5,
    "numPr" => 6,
    "suppressLineNumbers" => 7,
    "pBdr" => 8,
    "shd" => 9,
    "tabs" => 10,
    "suppressAutoHyphens" => 11,
    "kinsoku" => 12,
    "wordWrap" => 13,
    "overflowPunct" => 14,
    "topLinePunct" => 15,
    "autoSpaceDE" => 16,
    "autoSpaceDN" => 17,
    "bidi" => 18,
    "adjustRightInd" => 19,
    "snapToGrid" => 20,
    "spacing" => 21,
    "ind" => 22,
    "contextualSpacing" => 23,
    "mirrorIndents" => 24,
    "suppressOverlap" => 25,
    "jc" => 26,
    "textDirection" => 27,
    "textAlignment" => 28,
    "textboxTightWrap" => 29,
    "outlineLvl" => 30,
    "divId" => 31,
    "cnfStyle" => 32,
    "rPr" => 33,
    "sectPr" => 34,
    "pPrChange" => 35,
};

/// Sort key of a run property. Extension elements go after the schema ones,
/// and `w:rPrChange` always comes last.
pub(crate) fn rpr_rank(ns: &Ns, local: &str) -> u8 {
    match ns {
        Ns::Word if local == "rPrChange" => u8::MAX,
        Ns::Word => RPR_ORDER.get(local).copied().unwrap_or(100),
        _ => 200,
    }
}

pub(crate) fn ppr_rank(ns: &Ns, local: &str) -> u8 {
    match ns {
        Ns::Word => PPR_ORDER.get(local).copied().unwrap_or(100),
        _ => 200,
    }
}

/// Insert `child` into `parent` in front of the first sibling that ranks
/// after it.
pub(crate) fn insert_ranked(tree: &mut XmlTree, parent: NodeId, child: NodeId, rank: fn(&Ns, &str) -> u8) {
    let key = match tree.element(child) {
        Some(e) => rank(e.ns(), e.local_name()),
        None => return,
    };
    let pos = tree
        .children(parent)
        .iter()
        .position(|c| {
            tree.element(*c)
                .is_some_and(|e| rank(e.ns(), e.local_name()) > key)
        })
        .unwrap_or(tree.children(parent).len());
    tree.insert_child(parent, pos, child);
}

/// The `w:pPr` of a paragraph, created as its first child when missing.
pub(crate) fn ensure_paragraph_properties(tree: &mut XmlTree, p: NodeId) -> NodeId {
    if let Some(ppr) = tree.find_child(p, &Ns::Word, "pPr") {
        return ppr;
    }
    let ppr = tree.new_element(Ns::Word, "pPr");
    tree.insert_child(p, 0, ppr);
    ppr
}

/// Runs that belong to `p` itself: direct children and runs inside
/// hyperlinks, smart tags or content controls, but not runs of paragraphs
/// nested in text boxes.
pub(crate) fn own_runs(tree: &XmlTree, p: NodeId, ns: &Ns) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = tree.children(p).iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        let Some(e) = tree.element(id) else {
            continue;
        };
        if e.is(&Ns::Word, "p") {
            continue;
        }
        if e.is(ns, "r") {
            out.push(id);
        }
        stack.extend(e.children().iter().rev().copied());
    }
    out
}

/// Whether `id` is a `w:` element named `local`.
#[inline]
pub(crate) fn is_w(tree: &XmlTree, id: NodeId, local: &str) -> bool {
    tree.is(id, &Ns::Word, local)
}

/// Text of a run: its `w:t` contents, with layout marks as their characters.
pub(crate) fn run_text(tree: &XmlTree, run: NodeId) -> String {
    let mut out = String::new();
    for child in tree.children(run) {
        if is_w(tree, *child, "t") {
            out.push_str(&tree.text_content(*child));
        } else if let Some(c) = layout_mark_char(tree, *child) {
            out.push(c);
        }
    }
    out
}

/// Layout mark children of a run, in order.
pub(crate) fn layout_marks(tree: &XmlTree, run: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    tree.children(run)
        .iter()
        .copied()
        .filter(move |c| layout_mark_char(tree, *c).is_some())
}

/// Concatenated text of the `m:t` children of a math run.
pub(crate) fn math_run_text(tree: &XmlTree, run: NodeId) -> String {
    let mut out = String::new();
    for child in tree.children(run) {
        if tree.is(*child, &Ns::Math, "t") {
            out.push_str(&tree.text_content(*child));
        }
    }
    out
}

/// Whether a run holds anything that must not be rewritten.
pub(crate) fn is_opaque_run(tree: &XmlTree, run: NodeId) -> bool {
    tree.child_elements(run).any(|c| {
        let Some(e) = tree.element(c) else {
            return false;
        };
        let local = e.local_name();
        match e.ns() {
            Ns::Word if local == "t" || IGNORABLE_RUN_CHILDREN.contains(local) || LAYOUT_MARKS.contains_key(local) => {
                false
            },
            Ns::Word if OPAQUE_RUN_CHILDREN.contains(local) => true,
            Ns::Word => {
                tracing::debug!(element = local, "unrecognized run child kept verbatim");
                true
            },
            // mc:AlternateContent and extension content
            _ => true,
        }
    })
}

/// Style identifier of a paragraph (`w:pPr/w:pStyle/@w:val`).
pub(crate) fn paragraph_style(tree: &XmlTree, p: NodeId) -> Option<String> {
    let ppr = tree.find_child(p, &Ns::Word, "pPr")?;
    let style = tree.find_child(ppr, &Ns::Word, "pStyle")?;
    tree.attr(style, &Ns::Word, "val").map(|v| v.into_owned())
}

/// Character style identifier of a run (`w:rPr/w:rStyle/@w:val`).
pub(crate) fn run_style(tree: &XmlTree, run: NodeId) -> Option<String> {
    let rpr = tree.find_child(run, &Ns::Word, "rPr")?;
    let style = tree.find_child(rpr, &Ns::Word, "rStyle")?;
    tree.attr(style, &Ns::Word, "val").map(|v| v.into_owned())
}

/// Set the text of a `w:t`, marking it space-preserving when it has
/// leading or trailing whitespace.
pub(crate) fn set_run_text(tree: &mut XmlTree, t: NodeId, text: &str) {
    tree.set_text(t, text);
    if needs_space_preserve(text) {
        tree.set_attr(t, Ns::Xml, "space", "preserve");
    }
}

#[inline]
pub(crate) fn needs_space_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpr_rank_orders_schema_elements() {
        assert!(rpr_rank(&Ns::Word, "rFonts") < rpr_rank(&Ns::Word, "b"));
        assert!(rpr_rank(&Ns::Word, "sz") < rpr_rank(&Ns::Word, "lang"));
        assert!(rpr_rank(&Ns::Word, "oMath") < rpr_rank(&Ns::Word, "rPrChange"));
        assert!(rpr_rank(&Ns::Word, "unknown") < rpr_rank(&Ns::Other("urn:x".into()), "glow"));
    }

    #[test]
    fn test_insert_ranked_keeps_schema_order() {
        let xml = r#"<w:pPr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:pStyle w:val="a"/><w:jc w:val="left"/></w:pPr>"#;
        let mut tree = XmlTree::parse(xml.as_bytes()).unwrap();
        let ppr = tree.root();
        let spacing = tree.new_element(Ns::Word, "spacing");
        insert_ranked(&mut tree, ppr, spacing, ppr_rank);
        let sect = tree.new_element(Ns::Word, "sectPr");
        insert_ranked(&mut tree, ppr, sect, ppr_rank);
        let names: Vec<_> = tree
            .child_elements(ppr)
            .map(|c| tree.element(c).unwrap().local_name().to_string())
            .collect();
        assert_eq!(names, ["pStyle", "spacing", "jc", "sectPr"]);
    }

    #[test]
    fn test_own_runs_skip_nested_paragraphs() {
        let xml = r#"<w:p xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:r><w:t>a</w:t></w:r><w:hyperlink><w:r><w:t>b</w:t></w:r></w:hyperlink><w:r><w:pict><w:txbxContent><w:p><w:r><w:t>inner</w:t></w:r></w:p></w:txbxContent></w:pict></w:r></w:p>"#;
        let tree = XmlTree::parse(xml.as_bytes()).unwrap();
        let runs = own_runs(&tree, tree.root(), &Ns::Word);
        assert_eq!(runs.len(), 3);
        assert!(runs.iter().all(|r| run_text(&tree, *r) != "inner"));
    }

    #[test]
    fn test_opaque_run_detection() {
        let xml = r#"<w:p xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:r><w:rPr/><w:lastRenderedPageBreak/><w:t>a</w:t></w:r><w:r><w:fldChar w:fldCharType="begin"/></w:r></w:p>"#;
        let tree = XmlTree::parse(xml.as_bytes()).unwrap();
        let runs: Vec<_> = tree.child_elements(tree.root()).collect();
        assert!(!is_opaque_run(&tree, runs[0]));
        assert!(is_opaque_run(&tree, runs[1]));
        assert_eq!(run_text(&tree, runs[0]), "a");
    }

    #[test]
    fn test_layout_marks_are_text() {
        let xml = r#"<w:p xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:r><w:t>a</w:t><w:br/><w:t>b</w:t><w:tab/><w:softHyphen/></w:r></w:p>"#;
        let tree = XmlTree::parse(xml.as_bytes()).unwrap();
        let run = tree.child_elements(tree.root()).next().unwrap();
        assert!(!is_opaque_run(&tree, run));
        assert_eq!(run_text(&tree, run), "a\nb\t\u{00AD}");
        assert_eq!(layout_marks(&tree, run).count(), 3);
        assert_eq!(layout_mark_element('\n'), Some("br"));
        assert_eq!(layout_mark_element('x'), None);
    }

    #[test]
    fn test_space_preserve_rule() {
        assert!(needs_space_preserve(" a"));
        assert!(needs_space_preserve("a "));
        assert!(!needs_space_preserve("a b"));
        assert!(!needs_space_preserve(""));
    }
}
