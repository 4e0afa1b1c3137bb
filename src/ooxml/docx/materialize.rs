//! Flattening style references into direct run formatting.
//!
//! After this pass every translatable run carries its effective formatting
//! literally, so segmentation and reconstruction only ever look at direct
//! `w:rPr` contents.
use crate::common::is_meaningful_text;
use crate::ooxml::docx::markup::{is_w, math_run_text, own_runs, paragraph_style, run_style, run_text};
use crate::ooxml::docx::properties::RunProperties;
use crate::ooxml::docx::resolve::StyleResolver;
use crate::ooxml::xml::{Ns, NodeId, XmlTree};

/// Counters reported by [`materialize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeStats {
    /// Runs seen (direct `w:r` children of paragraphs)
    pub runs_found: usize,
    /// Runs with meaningful text whose formatting was flattened
    pub runs_processed: usize,
    /// Runs that referenced a character style
    pub runs_with_style: usize,
    /// Math runs flattened
    pub math_runs: usize,
}

/// Flatten paragraph-style and character-style formatting into every run
/// with meaningful text below `root`.
///
/// For each run the layers are, from weakest to strongest: the paragraph
/// style, the run's character style, the run's own direct formatting. The
/// `w:rStyle` reference is removed afterwards, which makes the pass
/// idempotent. Math runs (`m:r`) get the same treatment on their `w:rPr`.
pub fn materialize(tree: &mut XmlTree, root: NodeId, resolver: &StyleResolver) -> MaterializeStats {
    let mut stats = MaterializeStats::default();

    for p in tree.descendants_named(root, &Ns::Word, "p") {
        let base = match paragraph_style(tree, p) {
            Some(id) => {
                let resolved = resolver.resolve(&id).cloned();
                if resolved.is_none() {
                    tracing::debug!(target: "pomelo::audit", style = %id, "paragraph style has no run properties");
                }
                resolved.unwrap_or_default()
            },
            None => RunProperties::new(),
        };

        let runs: Vec<NodeId> = tree
            .children(p)
            .iter()
            .copied()
            .filter(|c| is_w(tree, *c, "r"))
            .collect();
        for run in runs {
            stats.runs_found += 1;
            if !is_meaningful_text(&run_text(tree, run)) {
                continue;
            }
            stats.runs_processed += 1;
            if flatten_run(tree, run, &base, resolver) {
                stats.runs_with_style += 1;
            }
        }

        for run in own_runs(tree, p, &Ns::Math) {
            if !is_meaningful_text(&math_run_text(tree, run)) {
                continue;
            }
            stats.math_runs += 1;
            flatten_run(tree, run, &base, resolver);
        }
    }

    tracing::info!(
        target: "pomelo::audit",
        runs_found = stats.runs_found,
        runs_processed = stats.runs_processed,
        runs_with_style = stats.runs_with_style,
        math_runs = stats.math_runs,
        "materialized styles"
    );
    stats
}

/// Returns whether the run referenced a character style.
fn flatten_run(tree: &mut XmlTree, run: NodeId, base: &RunProperties, resolver: &StyleResolver) -> bool {
    let style_id = run_style(tree, run);
    let mut direct = tree
        .find_child(run, &Ns::Word, "rPr")
        .map(|rpr| RunProperties::from_element(tree, rpr))
        .unwrap_or_default();
    direct.remove(&Ns::Word, "rStyle");

    let mut merged = base.clone();
    if let Some(id) = &style_id {
        match resolver.resolve(id) {
            Some(style) => merged.overlay(style),
            None => tracing::warn!(target: "pomelo::audit", style = %id, "character style could not be resolved"),
        }
    }
    merged.overlay(&direct);
    merged.remove(&Ns::Word, "rStyle");
    merged.write_to_run(tree, run);
    style_id.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLES: &str = r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:style w:type="paragraph" w:styleId="Normal"><w:rPr><w:sz w:val="24"/></w:rPr></w:style>
  <w:style w:type="paragraph" w:styleId="Heading1"><w:basedOn w:val="Normal"/><w:rPr><w:b/><w:sz w:val="32"/></w:rPr></w:style>
  <w:style w:type="character" w:styleId="Emphasis"><w:rPr><w:i/><w:color w:val="FF0000"/></w:rPr></w:style>
</w:styles>"#;

    fn doc(body: &str) -> XmlTree {
        let xml = format!(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:m="http://schemas.openxmlformats.org/officeDocument/2006/math"><w:body>{}</w:body></w:document>"#,
            body
        );
        XmlTree::parse(xml.as_bytes()).unwrap()
    }

    fn first_rpr(tree: &XmlTree, local_ns: &Ns, local: &str) -> RunProperties {
        let run = tree.find_descendant(tree.root(), local_ns, local).unwrap();
        let rpr = tree.find_child(run, &Ns::Word, "rPr").unwrap();
        RunProperties::from_element(tree, rpr)
    }

    #[test]
    fn test_three_layers_are_flattened() {
        let resolver = StyleResolver::from_styles_xml(STYLES.as_bytes()).unwrap();
        let mut tree = doc(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:rPr><w:rStyle w:val="Emphasis"/><w:color w:val="0000FF"/></w:rPr><w:t>Title</w:t></w:r></w:p>"#,
        );
        let root = tree.root();
        let stats = materialize(&mut tree, root, &resolver);
        assert_eq!(stats.runs_processed, 1);
        assert_eq!(stats.runs_with_style, 1);

        let props = first_rpr(&tree, &Ns::Word, "r");
        assert!(props.contains(&Ns::Word, "b"));
        assert!(props.contains(&Ns::Word, "i"));
        assert!(!props.contains(&Ns::Word, "rStyle"));
        assert_eq!(props.size(), Some(32));
        let color = props.get(&Ns::Word, "color").unwrap();
        assert_eq!(color.attr(&Ns::Word, "val").as_deref(), Some("0000FF"));
    }

    #[test]
    fn test_materialize_is_idempotent() {
        let resolver = StyleResolver::from_styles_xml(STYLES.as_bytes()).unwrap();
        let mut tree = doc(
            r#"<w:p><w:pPr><w:pStyle w:val="Normal"/></w:pPr><w:r><w:rPr><w:rStyle w:val="Emphasis"/></w:rPr><w:t>Hi</w:t></w:r><w:r><w:t> </w:t></w:r></w:p>"#,
        );
        let root = tree.root();
        materialize(&mut tree, root, &resolver);
        let once = tree.to_bytes();
        materialize(&mut tree, root, &resolver);
        assert_eq!(tree.to_bytes(), once);
    }

    #[test]
    fn test_whitespace_runs_are_left_alone() {
        let resolver = StyleResolver::from_styles_xml(STYLES.as_bytes()).unwrap();
        let mut tree = doc(r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t> - </w:t></w:r></w:p>"#);
        let root = tree.root();
        let before = tree.to_bytes();
        let stats = materialize(&mut tree, root, &resolver);
        assert_eq!(stats.runs_found, 1);
        assert_eq!(stats.runs_processed, 0);
        assert_eq!(tree.to_bytes(), before);
    }

    #[test]
    fn test_math_run_gets_word_properties_after_math_properties() {
        let resolver = StyleResolver::from_styles_xml(STYLES.as_bytes()).unwrap();
        let mut tree = doc(
            r#"<w:p><w:pPr><w:pStyle w:val="Normal"/></w:pPr><m:oMath><m:r><m:rPr><m:sty m:val="p"/></m:rPr><m:t>x</m:t></m:r></m:oMath></w:p>"#,
        );
        let root = tree.root();
        let stats = materialize(&mut tree, root, &resolver);
        assert_eq!(stats.math_runs, 1);

        let mr = tree.find_descendant(root, &Ns::Math, "r").unwrap();
        let kids = tree.children(mr);
        assert!(tree.is(kids[0], &Ns::Math, "rPr"));
        assert!(tree.is(kids[1], &Ns::Word, "rPr"));
        assert_eq!(first_rpr(&tree, &Ns::Math, "r").size(), Some(24));
    }

    #[test]
    fn test_text_box_math_uses_its_own_paragraph_style() {
        let resolver = StyleResolver::from_styles_xml(STYLES.as_bytes()).unwrap();
        let mut tree = doc(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:pict><w:txbxContent><w:p><w:pPr><w:pStyle w:val="Normal"/></w:pPr><m:oMath><m:r><m:t>y</m:t></m:r></m:oMath></w:p></w:txbxContent></w:pict></w:r></w:p>"#,
        );
        let root = tree.root();
        let stats = materialize(&mut tree, root, &resolver);
        assert_eq!(stats.math_runs, 1);

        let props = first_rpr(&tree, &Ns::Math, "r");
        assert_eq!(props.size(), Some(24));
        assert!(!props.contains(&Ns::Word, "b"));
    }
}
