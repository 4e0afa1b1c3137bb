//! Rebuilding a paragraph from its segments and translated texts.
use crate::ooxml::docx::markup::{is_w, layout_mark_char, layout_mark_element, layout_marks, set_run_text};
use crate::ooxml::docx::segment::{ParagraphStructure, Segment, Slot};
use crate::ooxml::xml::{NodeId, Ns, XmlTree};

/// Build a replacement for `structure.paragraph` from `texts`.
///
/// `texts` holds one entry per segment; missing entries fall back to the
/// segment's original text. The new paragraph keeps the original's
/// attributes and a copy of its `w:pPr`. Non-text segments and passthrough
/// children are re-attached as the original nodes, so content nested in
/// them (text boxes) stays addressable. The result is detached; the caller
/// swaps it in.
pub fn rebuild(tree: &mut XmlTree, structure: &ParagraphStructure, texts: &[String]) -> NodeId {
    let paragraph = tree
        .shallow_copy(structure.paragraph)
        .unwrap_or_else(|| tree.new_element(Ns::Word, "p"));

    if let Some(ppr) = structure.properties {
        let copy = tree.deep_copy(ppr);
        tree.append_child(paragraph, copy);
    }

    if texts.len() < structure.segments.len() {
        tracing::debug!(
            target: "pomelo::audit",
            expected = structure.segments.len(),
            got = texts.len(),
            "missing translated texts, originals used"
        );
    }

    for slot in &structure.layout {
        let index = match *slot {
            Slot::Passthrough(node) => {
                tree.append_child(paragraph, node);
                continue;
            },
            Slot::Segment(index) => index,
        };
        let Some(segment) = structure.segments.get(index) else {
            continue;
        };
        let text = texts
            .get(index)
            .map(String::as_str)
            .unwrap_or_else(|| segment.original_text());

        match segment {
            Segment::TextRunGroup { properties, marks, .. } => {
                let run = tree.new_element(Ns::Word, "r");
                if let Some(props) = properties.as_ref().filter(|p| !p.is_empty()) {
                    let rpr = props.to_element(tree);
                    tree.append_child(run, rpr);
                }
                fill_run(tree, run, text, marks);
                tree.append_child(paragraph, run);
            },
            Segment::NonText { node } => tree.append_child(paragraph, *node),
            Segment::Hyperlink { node, .. } => {
                let link = tree.deep_copy(*node);
                collapse_hyperlink(tree, link, text);
                tree.append_child(paragraph, link);
            },
        }
    }

    paragraph
}

/// Append `text` to `run` as `w:t` chunks split at layout mark characters.
///
/// Each mark character takes the first unused node of `marks` that stands
/// for it, or a new element when none is left. Marks the text no longer
/// mentions are appended after the text.
fn fill_run(tree: &mut XmlTree, run: NodeId, text: &str, marks: &[NodeId]) {
    let mut unused: Vec<NodeId> = marks.to_vec();
    let mut chunk = String::new();
    let mut wrote = false;

    for c in text.chars() {
        let Some(local) = layout_mark_element(c) else {
            chunk.push(c);
            continue;
        };
        wrote |= flush_text(tree, run, &mut chunk);
        let mark = match unused.iter().position(|m| layout_mark_char(tree, *m) == Some(c)) {
            Some(pos) => unused.remove(pos),
            None => tree.new_element(Ns::Word, local),
        };
        tree.append_child(run, mark);
        wrote = true;
    }
    wrote |= flush_text(tree, run, &mut chunk);

    if !unused.is_empty() {
        tracing::debug!(
            target: "pomelo::audit",
            marks = unused.len(),
            "layout marks missing from the translation, kept at the end of the run"
        );
        wrote = true;
    }
    for mark in unused {
        tree.append_child(run, mark);
    }
    if !wrote {
        let t = tree.new_element(Ns::Word, "t");
        tree.append_child(run, t);
    }
}

/// Returns whether a `w:t` was written.
fn flush_text(tree: &mut XmlTree, run: NodeId, chunk: &mut String) -> bool {
    if chunk.is_empty() {
        return false;
    }
    let t = tree.new_element(Ns::Word, "t");
    set_run_text(tree, t, chunk);
    tree.append_child(run, t);
    chunk.clear();
    true
}

/// Put `text` into the first text run of a hyperlink and drop every other
/// run that carries text. Runs without text (fields, images) stay.
fn collapse_hyperlink(tree: &mut XmlTree, link: NodeId, text: &str) {
    let text_runs: Vec<NodeId> = tree
        .descendants_named(link, &Ns::Word, "r")
        .into_iter()
        .filter(|r| tree.find_child(*r, &Ns::Word, "t").is_some())
        .collect();
    let Some((&first, rest)) = text_runs.split_first() else {
        return;
    };
    let marks: Vec<NodeId> = text_runs.iter().flat_map(|r| layout_marks(tree, *r)).collect();

    let stale: Vec<NodeId> = tree
        .children(first)
        .iter()
        .copied()
        .filter(|c| is_w(tree, *c, "t") || layout_mark_char(tree, *c).is_some())
        .collect();
    for child in stale {
        tree.remove_child(first, child);
    }

    let mut holders = vec![link];
    holders.extend(tree.descendants(link));
    for holder in holders {
        let doomed: Vec<NodeId> = tree
            .children(holder)
            .iter()
            .copied()
            .filter(|c| rest.contains(c))
            .collect();
        for run in doomed {
            tree.remove_child(holder, run);
        }
    }

    fill_run(tree, first, text, &marks);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::docx::properties::{RunProperties, equivalent};
    use crate::ooxml::docx::segment::segment;
    use crate::translate::protocol::{Tokens, deserialize};

    fn paragraph(body: &str) -> XmlTree {
        let xml = format!(
            r#"<w:body xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:p w14:paraId="1A2B" xmlns:w14="http://schemas.microsoft.com/office/word/2010/wordml">{}</w:p></w:body>"#,
            body
        );
        XmlTree::parse(xml.as_bytes()).unwrap()
    }

    fn translate(tree: &mut XmlTree, translated: &str) -> NodeId {
        let p = tree.find_child(tree.root(), &Ns::Word, "p").unwrap();
        let s = segment(tree, p, &Tokens::default());
        let aligned = deserialize(translated, &s.pieces(), &s.tokens);
        rebuild(tree, &s, &aligned.texts)
    }

    fn runs(tree: &XmlTree, p: NodeId) -> Vec<NodeId> {
        tree.child_elements(p).filter(|c| tree.is(*c, &Ns::Word, "r")).collect()
    }

    #[test]
    fn test_single_run() {
        let mut tree = paragraph(r#"<w:r><w:t>Hello</w:t></w:r>"#);
        let p = translate(&mut tree, "Bonjour");
        let rs = runs(&tree, p);
        assert_eq!(rs.len(), 1);
        assert_eq!(tree.text_content(rs[0]), "Bonjour");
        assert!(tree.find_child(rs[0], &Ns::Word, "rPr").is_none());
        assert_eq!(tree.element(p).unwrap().attrs().len(), 2);
    }

    #[test]
    fn test_bold_runs_merge_into_one() {
        let mut tree = paragraph(
            r#"<w:r><w:rPr><w:b/></w:rPr><w:t>A</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>BC</w:t></w:r>"#,
        );
        let p = translate(&mut tree, "XYZ");
        let rs = runs(&tree, p);
        assert_eq!(rs.len(), 1);
        assert_eq!(tree.text_content(rs[0]), "XYZ");
        let rpr = tree.find_child(rs[0], &Ns::Word, "rPr").unwrap();
        assert!(RunProperties::from_element(&tree, rpr).contains(&Ns::Word, "b"));
    }

    #[test]
    fn test_image_is_kept_between_translated_runs() {
        let mut tree = paragraph(
            r#"<w:r><w:t>Start</w:t></w:r><w:r><w:drawing><wp:inline xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing"/></w:drawing></w:r><w:r><w:t>End</w:t></w:r>"#,
        );
        let old_p = tree.find_child(tree.root(), &Ns::Word, "p").unwrap();
        let image_run = tree.children(old_p)[1];
        let p = translate(&mut tree, "Début【SEG】<placeholder>【SEG】Fin");
        let kids = tree.children(p).to_vec();
        assert_eq!(kids.len(), 3);
        assert_eq!(tree.text_content(kids[0]), "Début");
        assert_eq!(kids[1], image_run);
        assert_eq!(tree.text_content(kids[2]), "Fin");
    }

    #[test]
    fn test_hyperlink_collapses_to_one_text_run() {
        let mut tree = paragraph(
            r#"<w:hyperlink w:anchor="x"><w:r><w:t>click </w:t></w:r><w:r><w:fldChar w:fldCharType="begin"/></w:r><w:r><w:t>here</w:t></w:r></w:hyperlink>"#,
        );
        let p = translate(&mut tree, "cliquez ici ");
        let link = tree.find_child(p, &Ns::Word, "hyperlink").unwrap();
        let inner = runs(&tree, link);
        assert_eq!(inner.len(), 2);
        assert_eq!(tree.text_content(link), "cliquez ici ");
        let t = tree.find_descendant(link, &Ns::Word, "t").unwrap();
        assert_eq!(tree.attr(t, &Ns::Xml, "space").as_deref(), Some("preserve"));
        assert_eq!(tree.attr(link, &Ns::Word, "anchor").as_deref(), Some("x"));
    }

    fn child_names(tree: &XmlTree, run: NodeId) -> Vec<String> {
        tree.child_elements(run)
            .filter_map(|c| tree.element(c).map(|e| e.local_name().to_string()))
            .collect()
    }

    #[test]
    fn test_break_inside_run_survives_translation() {
        let mut tree = paragraph(r#"<w:r><w:t>Hello</w:t><w:br w:type="page"/><w:t>world</w:t></w:r>"#);
        let p = translate(&mut tree, "Bonjour\nmonde");
        let rs = runs(&tree, p);
        assert_eq!(rs.len(), 1);
        assert_eq!(child_names(&tree, rs[0]), ["t", "br", "t"]);
        assert_eq!(tree.text_content(rs[0]), "Bonjourmonde");
        let br = tree.find_child(rs[0], &Ns::Word, "br").unwrap();
        assert_eq!(tree.attr(br, &Ns::Word, "type").as_deref(), Some("page"));
    }

    #[test]
    fn test_moved_and_dropped_marks() {
        let mut tree = paragraph(r#"<w:r><w:tab/><w:t>a</w:t><w:softHyphen/><w:t>b</w:t></w:r>"#);
        let p = translate(&mut tree, "x\ty\nz");
        let rs = runs(&tree, p);
        assert_eq!(child_names(&tree, rs[0]), ["t", "tab", "t", "br", "t", "softHyphen"]);
    }

    #[test]
    fn test_mark_only_run_keeps_its_mark() {
        let mut tree = paragraph(r#"<w:r><w:rPr><w:b/></w:rPr><w:t>Title</w:t></w:r><w:r><w:br/></w:r>"#);
        let old_p = tree.find_child(tree.root(), &Ns::Word, "p").unwrap();
        let s = segment(&tree, old_p, &Tokens::default());
        let p = rebuild(&mut tree, &s, &["Titre".to_string(), "\n".to_string()]);
        let rs = runs(&tree, p);
        assert_eq!(rs.len(), 2);
        assert_eq!(child_names(&tree, rs[1]), ["br"]);
    }

    #[test]
    fn test_hyperlink_keeps_break_marks() {
        let mut tree = paragraph(
            r#"<w:hyperlink w:anchor="x"><w:r><w:t>one</w:t><w:br/></w:r><w:r><w:t>two</w:t></w:r></w:hyperlink>"#,
        );
        let p = translate(&mut tree, "un\ndeux");
        let link = tree.find_child(p, &Ns::Word, "hyperlink").unwrap();
        let inner = runs(&tree, link);
        assert_eq!(inner.len(), 1);
        assert_eq!(child_names(&tree, inner[0]), ["t", "br", "t"]);
        assert_eq!(tree.text_content(link), "undeux");
    }

    #[test]
    fn test_identity_translation_reproduces_structure() {
        let body = r#"<w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:i/></w:rPr><w:t>One</w:t></w:r><w:bookmarkStart w:id="0" w:name="m"/><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve"> two </w:t></w:r><w:r><w:t>three</w:t></w:r>"#;
        let mut tree = paragraph(body);
        let old_p = tree.find_child(tree.root(), &Ns::Word, "p").unwrap();
        let s = segment(&tree, old_p, &Tokens::default());
        let blob = s.blob.clone();
        let p = translate(&mut tree, &blob);

        let old_runs = runs(&tree, old_p);
        let new_runs = runs(&tree, p);
        assert_eq!(old_runs.len(), new_runs.len());
        for (old, new) in old_runs.iter().zip(&new_runs) {
            assert_eq!(tree.text_content(*old), tree.text_content(*new));
            let props = |r: NodeId| {
                tree.find_child(r, &Ns::Word, "rPr")
                    .map(|rpr| RunProperties::from_element(&tree, rpr))
            };
            assert!(equivalent(props(*old).as_ref(), props(*new).as_ref()));
        }
        assert_eq!(tree.children(old_p).len(), tree.children(p).len());
        assert_eq!(
            tree.to_xml_string(tree.children(old_p)[0]),
            tree.to_xml_string(tree.children(p)[0])
        );
    }

    #[test]
    fn test_missing_separator_still_fills_every_segment() {
        let mut tree = paragraph(
            r#"<w:r><w:rPr><w:b/></w:rPr><w:t>One</w:t></w:r><w:r><w:t>Two</w:t></w:r><w:r><w:rPr><w:i/></w:rPr><w:t>Three</w:t></w:r>"#,
        );
        let p = translate(&mut tree, "Un【SEG】Deux Trois");
        let texts: Vec<String> = runs(&tree, p).iter().map(|r| tree.text_content(*r)).collect();
        assert_eq!(texts, ["One", "Two", "Three"]);
    }

    #[test]
    fn test_short_text_list_uses_originals() {
        let mut tree = paragraph(r#"<w:r><w:rPr><w:b/></w:rPr><w:t>A</w:t></w:r><w:r><w:t>B</w:t></w:r>"#);
        let old_p = tree.find_child(tree.root(), &Ns::Word, "p").unwrap();
        let s = segment(&tree, old_p, &Tokens::default());
        let p = rebuild(&mut tree, &s, &["X".to_string()]);
        let texts: Vec<String> = runs(&tree, p).iter().map(|r| tree.text_content(*r)).collect();
        assert_eq!(texts, ["X", "B"]);
    }
}
