//! Target-language typography: fonts, languages, font sizes, line spacing
//! and alignment of display formulas.
//!
//! Runs in place after materialization, when every run carries its
//! formatting literally.
use crate::common::is_meaningful_text;
use crate::ooxml::docx::markup::{
    ensure_paragraph_properties, insert_ranked, math_run_text, own_runs, paragraph_style, ppr_rank,
    run_text,
};
use crate::ooxml::docx::properties::RunProperties;
use crate::ooxml::docx::resolve::StyleResolver;
use crate::ooxml::xml::{NodeId, Ns, XmlTree};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Built-in font size maps, in half-points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizePreset {
    /// Chinese sizes to their usual English equivalents
    ZhToEn,
    /// Inverse of [`SizePreset::ZhToEn`]
    EnToZh,
    /// Chinese sizes to smaller English sizes, for text that grows in translation
    CompactZhToEn,
    /// Inverse of [`SizePreset::CompactZhToEn`]
    CompactEnToZh,
}

const ZH_TO_EN: [(u32, u32); 4] = [(32, 36), (28, 32), (24, 24), (21, 22)];
const COMPACT_ZH_TO_EN: [(u32, u32); 4] = [(32, 27), (28, 23), (24, 20), (21, 16)];

impl SizePreset {
    /// The size map of this preset.
    pub fn map(self) -> BTreeMap<u32, u32> {
        match self {
            Self::ZhToEn => ZH_TO_EN.into_iter().collect(),
            Self::EnToZh => ZH_TO_EN.into_iter().map(|(a, b)| (b, a)).collect(),
            Self::CompactZhToEn => COMPACT_ZH_TO_EN.into_iter().collect(),
            Self::CompactEnToZh => COMPACT_ZH_TO_EN.into_iter().map(|(a, b)| (b, a)).collect(),
        }
    }
}

/// Typography settings applied to translated paragraphs.
///
/// Every field is optional; the default changes nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypographyOptions {
    /// Font for Latin text (`w:ascii`, `w:hAnsi`)
    pub latin_font: Option<String>,
    /// Font for East Asian text (`w:eastAsia`)
    pub east_asia_font: Option<String>,
    /// Language tag for Latin text, such as `en-US`
    pub latin_lang: Option<String>,
    /// Language tag for East Asian text, such as `zh-CN`
    pub east_asia_lang: Option<String>,
    /// Built-in size map
    pub size_preset: Option<SizePreset>,
    /// Explicit size map in half-points; entries win over the preset
    pub size_map: BTreeMap<u32, u32>,
    /// Exact line spacing in 240ths of a line (`w:spacing/@w:line`)
    pub line_spacing: Option<u32>,
    /// Give display-formula paragraphs the formula's own alignment
    pub align_math_paragraphs: bool,
}

impl TypographyOptions {
    /// Whether applying these options would leave every document unchanged.
    pub fn is_noop(&self) -> bool {
        self.fonts().is_none()
            && self.langs().is_none()
            && self.size_preset.is_none()
            && self.size_map.is_empty()
            && self.line_spacing.is_none()
            && !self.align_math_paragraphs
    }

    /// The preset merged with the explicit map.
    pub fn effective_size_map(&self) -> BTreeMap<u32, u32> {
        let mut map = self.size_preset.map(SizePreset::map).unwrap_or_default();
        map.extend(self.size_map.iter().map(|(k, v)| (*k, *v)));
        map
    }

    // Fonts and languages are only forced when both halves are given.
    fn fonts(&self) -> Option<(&str, &str)> {
        Some((self.latin_font.as_deref()?, self.east_asia_font.as_deref()?))
    }

    fn langs(&self) -> Option<(&str, &str)> {
        Some((self.latin_lang.as_deref()?, self.east_asia_lang.as_deref()?))
    }
}

/// Counters reported by [`apply_typography`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypographyStats {
    /// Paragraphs visited
    pub paragraphs: usize,
    /// Runs (text and math) whose properties were rewritten
    pub runs_styled: usize,
    /// Paragraphs whose font size was mapped
    pub sizes_mapped: usize,
    /// Paragraphs that received a formula alignment
    pub math_aligned: usize,
}

/// Apply `options` to every paragraph below `root`.
///
/// A paragraph's source size is the first `w:sz` found on its runs, then
/// the size of its paragraph style, then the document default size. When
/// the size map has an entry for it, every styled run of the paragraph
/// gets the mapped size.
pub fn apply_typography(
    tree: &mut XmlTree,
    root: NodeId,
    resolver: Option<&StyleResolver>,
    options: &TypographyOptions,
) -> TypographyStats {
    let mut stats = TypographyStats::default();
    if options.is_noop() {
        return stats;
    }
    let size_map = options.effective_size_map();

    for p in tree.descendants_named(root, &Ns::Word, "p") {
        stats.paragraphs += 1;

        if options.align_math_paragraphs && align_math_paragraph(tree, p) {
            stats.math_aligned += 1;
        }
        if let Some(line) = options.line_spacing {
            set_line_spacing(tree, p, line);
        }

        let runs = own_runs(tree, p, &Ns::Word);
        let new_size = source_size(tree, p, &runs, resolver).and_then(|from| {
            let to = size_map.get(&from).copied();
            match to {
                Some(to) => tracing::debug!(target: "pomelo::audit", from, to, "mapping font size"),
                None if !size_map.is_empty() => {
                    tracing::trace!(target: "pomelo::audit", size = from, "size not in map, kept");
                },
                None => {},
            }
            to
        });
        if new_size.is_some() {
            stats.sizes_mapped += 1;
        }

        for run in runs {
            if !is_meaningful_text(&run_text(tree, run)) {
                continue;
            }
            restyle_run(tree, run, options, new_size);
            stats.runs_styled += 1;
        }

        for run in own_runs(tree, p, &Ns::Math) {
            if !is_meaningful_text(&math_run_text(tree, run)) {
                continue;
            }
            let own_size = tree
                .find_child(run, &Ns::Word, "rPr")
                .and_then(|rpr| RunProperties::from_element(tree, rpr).size())
                .and_then(|size| size_map.get(&size).copied());
            restyle_run(tree, run, options, own_size.or(new_size));
            stats.runs_styled += 1;
        }
    }

    tracing::info!(
        target: "pomelo::audit",
        paragraphs = stats.paragraphs,
        runs_styled = stats.runs_styled,
        sizes_mapped = stats.sizes_mapped,
        math_aligned = stats.math_aligned,
        "applied typography"
    );
    stats
}

fn source_size(
    tree: &XmlTree,
    p: NodeId,
    runs: &[NodeId],
    resolver: Option<&StyleResolver>,
) -> Option<u32> {
    let direct = runs.iter().find_map(|run| {
        tree.find_child(*run, &Ns::Word, "rPr")
            .and_then(|rpr| RunProperties::from_element(tree, rpr).size())
    });
    direct.or_else(|| {
        let resolver = resolver?;
        paragraph_style(tree, p)
            .and_then(|id| resolver.size_for(&id))
            .or_else(|| resolver.default_size())
    })
}

fn restyle_run(tree: &mut XmlTree, run: NodeId, options: &TypographyOptions, size: Option<u32>) {
    let mut props = tree
        .find_child(run, &Ns::Word, "rPr")
        .map(|rpr| RunProperties::from_element(tree, rpr))
        .unwrap_or_default();

    if let Some((latin, east_asia)) = options.fonts() {
        props.set(RunProperties::word_prop(
            "rFonts",
            &[
                ("ascii", latin),
                ("hAnsi", latin),
                ("eastAsia", east_asia),
                ("hint", "eastAsia"),
            ],
        ));
    }
    if let Some((latin, east_asia)) = options.langs() {
        props.set(RunProperties::word_prop(
            "lang",
            &[("val", latin), ("eastAsia", east_asia)],
        ));
    }
    if let Some(size) = size {
        let value = size.to_string();
        props.set(RunProperties::word_prop("sz", &[("val", &value)]));
        props.set(RunProperties::word_prop("szCs", &[("val", &value)]));
    }
    props.write_to_run(tree, run);
}

fn set_line_spacing(tree: &mut XmlTree, p: NodeId, line: u32) {
    let ppr = ensure_paragraph_properties(tree, p);
    let spacing = match tree.find_child(ppr, &Ns::Word, "spacing") {
        Some(spacing) => spacing,
        None => {
            let spacing = tree.new_element(Ns::Word, "spacing");
            insert_ranked(tree, ppr, spacing, ppr_rank);
            spacing
        },
    };
    tree.set_attr(spacing, Ns::Word, "line", &line.to_string());
    tree.set_attr(spacing, Ns::Word, "lineRule", "auto");
}

/// Copy the `m:jc` of a display formula to a paragraph that has no `w:jc`.
/// Returns whether the paragraph changed.
fn align_math_paragraph(tree: &mut XmlTree, p: NodeId) -> bool {
    let Some(math_para) = tree.find_child(p, &Ns::Math, "oMathPara") else {
        return false;
    };
    let Some(value) = tree
        .find_child(math_para, &Ns::Math, "oMathParaPr")
        .and_then(|pr| tree.find_child(pr, &Ns::Math, "jc"))
        .map(|jc| tree.attr(jc, &Ns::Math, "val").map(|v| v.into_owned()))
    else {
        return false;
    };
    let existing = tree
        .find_child(p, &Ns::Word, "pPr")
        .and_then(|ppr| tree.find_child(ppr, &Ns::Word, "jc"));
    if existing.is_some() {
        return false;
    }

    let alignment = match value.as_deref() {
        Some("left") => "left",
        Some("right") => "right",
        _ => "center",
    };
    let ppr = ensure_paragraph_properties(tree, p);
    let jc = tree.new_element(Ns::Word, "jc");
    tree.set_attr(jc, Ns::Word, "val", alignment);
    insert_ranked(tree, ppr, jc, ppr_rank);
    tracing::debug!(target: "pomelo::audit", alignment, "paragraph aligned like its formula");
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> XmlTree {
        let xml = format!(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:m="http://schemas.openxmlformats.org/officeDocument/2006/math"><w:body>{}</w:body></w:document>"#,
            body
        );
        XmlTree::parse(xml.as_bytes()).unwrap()
    }

    fn props_of(tree: &XmlTree, run: NodeId) -> RunProperties {
        let rpr = tree.find_child(run, &Ns::Word, "rPr").unwrap();
        RunProperties::from_element(tree, rpr)
    }

    #[test]
    fn test_presets_invert() {
        assert_eq!(SizePreset::ZhToEn.map()[&21], 22);
        assert_eq!(SizePreset::EnToZh.map()[&22], 21);
        assert_eq!(SizePreset::CompactEnToZh.map()[&16], 21);
    }

    #[test]
    fn test_explicit_map_overrides_preset() {
        let options = TypographyOptions {
            size_preset: Some(SizePreset::ZhToEn),
            size_map: BTreeMap::from([(24, 26)]),
            ..Default::default()
        };
        let map = options.effective_size_map();
        assert_eq!(map[&24], 26);
        assert_eq!(map[&32], 36);
    }

    #[test]
    fn test_fonts_langs_and_size_are_forced() {
        let mut tree = doc(
            r#"<w:p><w:r><w:rPr><w:b/><w:sz w:val="32"/></w:rPr><w:t>标题</w:t></w:r><w:r><w:t>续</w:t></w:r><w:r><w:t> </w:t></w:r></w:p>"#,
        );
        let options = TypographyOptions {
            latin_font: Some("Times New Roman".into()),
            east_asia_font: Some("宋体".into()),
            latin_lang: Some("en-US".into()),
            east_asia_lang: Some("zh-CN".into()),
            size_preset: Some(SizePreset::ZhToEn),
            ..Default::default()
        };
        let root = tree.root();
        let stats = apply_typography(&mut tree, root, None, &options);
        assert_eq!(stats.runs_styled, 2);
        assert_eq!(stats.sizes_mapped, 1);

        let p = tree.find_descendant(root, &Ns::Word, "p").unwrap();
        let runs = own_runs(&tree, p, &Ns::Word);
        for run in &runs[..2] {
            let props = props_of(&tree, *run);
            assert_eq!(props.size(), Some(36));
            let fonts = props.get(&Ns::Word, "rFonts").unwrap();
            assert_eq!(fonts.attr(&Ns::Word, "eastAsia").as_deref(), Some("宋体"));
            let lang = props.get(&Ns::Word, "lang").unwrap();
            assert_eq!(lang.attr(&Ns::Word, "val").as_deref(), Some("en-US"));
        }
        assert!(props_of(&tree, runs[0]).contains(&Ns::Word, "b"));
        assert!(tree.find_child(runs[2], &Ns::Word, "rPr").is_none());
    }

    #[test]
    fn test_size_falls_back_to_paragraph_style() {
        let styles = r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:styleId="Heading1"><w:rPr><w:sz w:val="28"/></w:rPr></w:style></w:styles>"#;
        let resolver = StyleResolver::from_styles_xml(styles.as_bytes()).unwrap();
        let mut tree = doc(r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>一</w:t></w:r></w:p>"#);
        let options = TypographyOptions {
            size_preset: Some(SizePreset::ZhToEn),
            ..Default::default()
        };
        let root = tree.root();
        apply_typography(&mut tree, root, Some(&resolver), &options);
        let run = tree.find_descendant(root, &Ns::Word, "r").unwrap();
        assert_eq!(props_of(&tree, run).size(), Some(32));
    }

    #[test]
    fn test_line_spacing_and_math_alignment() {
        let mut tree = doc(
            r#"<w:p><m:oMathPara><m:oMathParaPr><m:jc m:val="centerGroup"/></m:oMathParaPr><m:oMath><m:r><m:t>x</m:t></m:r></m:oMath></m:oMathPara></w:p><w:p><w:pPr><w:jc w:val="right"/></w:pPr><m:oMathPara><m:oMathParaPr><m:jc m:val="left"/></m:oMathParaPr></m:oMathPara></w:p>"#,
        );
        let options = TypographyOptions {
            line_spacing: Some(360),
            align_math_paragraphs: true,
            ..Default::default()
        };
        let root = tree.root();
        let stats = apply_typography(&mut tree, root, None, &options);
        assert_eq!(stats.math_aligned, 1);

        let ps = tree.descendants_named(root, &Ns::Word, "p");
        let ppr = tree.find_child(ps[0], &Ns::Word, "pPr").unwrap();
        let kids: Vec<_> = tree.child_elements(ppr).collect();
        assert!(tree.is(kids[0], &Ns::Word, "spacing"));
        assert_eq!(tree.attr(kids[0], &Ns::Word, "line").as_deref(), Some("360"));
        assert_eq!(tree.attr(kids[1], &Ns::Word, "val").as_deref(), Some("center"));

        let ppr = tree.find_child(ps[1], &Ns::Word, "pPr").unwrap();
        let jc = tree.find_child(ppr, &Ns::Word, "jc").unwrap();
        assert_eq!(tree.attr(jc, &Ns::Word, "val").as_deref(), Some("right"));
    }

    #[test]
    fn test_default_options_change_nothing() {
        let mut tree = doc(r#"<w:p><w:r><w:t>Hello</w:t></w:r></w:p>"#);
        let before = tree.to_bytes();
        let root = tree.root();
        let stats = apply_typography(&mut tree, root, None, &TypographyOptions::default());
        assert_eq!(stats, TypographyStats::default());
        assert_eq!(tree.to_bytes(), before);
    }
}
