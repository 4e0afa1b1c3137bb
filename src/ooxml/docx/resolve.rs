//! Style inheritance resolution.
use crate::ooxml::docx::properties::RunProperties;
use crate::ooxml::docx::styles::StyleSheet;
use crate::ooxml::error::Result;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Canonical identifier of the base paragraph style.
pub const NORMAL_STYLE: &str = "Normal";

/// Resolves style identifiers to inheritance-flattened run properties.
///
/// Every style is resolved once at construction; afterwards the resolver is
/// read-only and can be shared between worker threads.
#[derive(Debug, Clone, Default)]
pub struct StyleResolver {
    sheet: StyleSheet,
    resolved: HashMap<String, RunProperties>,
}

impl StyleResolver {
    /// Build a resolver over a parsed style sheet.
    pub fn new(sheet: StyleSheet) -> Self {
        let resolved = sheet
            .iter()
            .filter(|style| style.style_type().formats_text())
            .filter_map(|style| {
                resolve_chain(&sheet, style.style_id())
                    .map(|props| (style.style_id().to_string(), props))
            })
            .collect();
        Self { sheet, resolved }
    }

    /// Parse `word/styles.xml` and build a resolver over it.
    ///
    /// # Errors
    ///
    /// Fails when the part is not well-formed XML.
    pub fn from_styles_xml(bytes: &[u8]) -> Result<Self> {
        StyleSheet::parse(bytes).map(Self::new)
    }

    /// The underlying style sheet.
    #[inline]
    pub fn sheet(&self) -> &StyleSheet {
        &self.sheet
    }

    /// Fully merged run properties of `style_id`.
    ///
    /// Returns `None` when the style is unknown or no style of its chain
    /// declares run properties.
    #[inline]
    pub fn resolve(&self, style_id: &str) -> Option<&RunProperties> {
        self.resolved.get(style_id)
    }

    /// Resolved font size of a style, in half-points.
    pub fn size_for(&self, style_id: &str) -> Option<u32> {
        self.resolve(style_id).and_then(RunProperties::size)
    }

    /// Size of the `Normal` chain, falling back to the document defaults.
    pub fn default_size(&self) -> Option<u32> {
        self.size_for(NORMAL_STYLE)
            .or_else(|| self.sheet.doc_defaults().size())
    }

    /// Resolved sizes of every style that has one.
    pub fn all_sizes(&self) -> BTreeMap<&str, u32> {
        self.resolved
            .iter()
            .filter_map(|(id, props)| props.size().map(|sz| (id.as_str(), sz)))
            .collect()
    }

    /// UI name of a style.
    pub fn style_name(&self, style_id: &str) -> Option<&str> {
        self.sheet.get_by_id(style_id).and_then(|s| s.name())
    }

    /// Inheritance chain of `style_id`, leaf first.
    ///
    /// The walk stops at a style without parent, at an unknown parent (which
    /// is still listed), or before revisiting a style.
    pub fn style_chain<'a>(&'a self, style_id: &'a str) -> Vec<&'a str> {
        let mut chain = vec![style_id];
        let mut seen: HashSet<&str> = HashSet::from([style_id]);
        let mut current = style_id;
        while let Some(parent) = self.sheet.get_by_id(current).and_then(|s| s.based_on()) {
            if !seen.insert(parent) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }
}

/// Walk the `basedOn` chain from `style_id` and fold it root-most first.
fn resolve_chain(sheet: &StyleSheet, style_id: &str) -> Option<RunProperties> {
    let mut stack: Vec<&RunProperties> = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut current = Some(style_id);

    while let Some(id) = current {
        if !visited.insert(id) {
            tracing::warn!(
                target: "pomelo::audit",
                style = style_id,
                at = id,
                "style inheritance cycle, chain cut"
            );
            break;
        }
        let Some(style) = sheet.get_by_id(id) else {
            if id != style_id {
                tracing::debug!(style = style_id, missing = id, "basedOn points to an unknown style");
            }
            break;
        };
        if let Some(props) = style.run_properties() {
            stack.push(props);
        }
        current = style.based_on();
    }

    if stack.is_empty() {
        return None;
    }
    let mut merged = RunProperties::new();
    for props in stack.into_iter().rev() {
        merged.overlay(props);
    }
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::docx::enums::WdStyleType;
    use crate::ooxml::docx::styles::Style;
    use proptest::prelude::*;

    fn prop(local: &str, val: Option<&str>) -> crate::ooxml::xml::OwnedElement {
        match val {
            Some(v) => RunProperties::word_prop(local, &[("val", v)]),
            None => RunProperties::word_prop(local, &[]),
        }
    }

    fn style(id: &str, based_on: Option<&str>, props: Vec<crate::ooxml::xml::OwnedElement>) -> Style {
        Style::new(id, WdStyleType::Paragraph, based_on, Some(props.into_iter().collect()))
    }

    #[test]
    fn test_emphasis_inherits_normal_size() {
        let sheet: StyleSheet = [
            style("Normal", None, vec![prop("sz", Some("24"))]),
            Style::new(
                "Emphasis",
                WdStyleType::Character,
                Some("Normal"),
                Some([prop("i", None)].into_iter().collect()),
            ),
        ]
        .into_iter()
        .collect();
        let resolver = StyleResolver::new(sheet);
        let emphasis = resolver.resolve("Emphasis").unwrap();
        assert_eq!(emphasis.len(), 2);
        assert!(emphasis.get(&crate::ooxml::xml::Ns::Word, "i").is_some());
        assert_eq!(emphasis.size(), Some(24));
        assert_eq!(resolver.default_size(), Some(24));
    }

    #[test]
    fn test_cycle_is_cut() {
        let sheet: StyleSheet = [
            style("A", Some("B"), vec![prop("b", None)]),
            style("B", Some("A"), vec![prop("sz", Some("30"))]),
        ]
        .into_iter()
        .collect();
        let resolver = StyleResolver::new(sheet);
        assert_eq!(resolver.size_for("A"), Some(30));
        assert_eq!(resolver.style_chain("A"), ["A", "B"]);
    }

    #[test]
    fn test_unknown_and_empty_chains() {
        let sheet: StyleSheet = [
            Style::new("Plain", WdStyleType::Paragraph, Some("Missing"), None),
            style("Child", Some("Missing"), vec![prop("u", Some("single"))]),
        ]
        .into_iter()
        .collect();
        let resolver = StyleResolver::new(sheet);
        assert!(resolver.resolve("Nope").is_none());
        assert!(resolver.resolve("Plain").is_none());
        assert_eq!(resolver.resolve("Child").map(RunProperties::len), Some(1));
        assert_eq!(resolver.style_chain("Child"), ["Child", "Missing"]);
        assert_eq!(resolver.default_size(), None);
    }

    #[test]
    fn test_all_sizes() {
        let sheet: StyleSheet = [
            style("Normal", None, vec![prop("sz", Some("21"))]),
            style("Title", Some("Normal"), vec![prop("sz", Some("44"))]),
            style("Quote", Some("Normal"), vec![prop("i", None)]),
        ]
        .into_iter()
        .collect();
        let resolver = StyleResolver::new(sheet);
        let sizes = resolver.all_sizes();
        assert_eq!(sizes.get("Title"), Some(&44));
        assert_eq!(sizes.get("Quote"), Some(&21));
    }

    fn arb_props() -> impl Strategy<Value = Vec<crate::ooxml::xml::OwnedElement>> {
        let locals = ["b", "i", "u", "sz", "color"];
        proptest::collection::vec((0..locals.len(), 0u8..4), 0..5).prop_map(move |items| {
            items
                .into_iter()
                .map(|(k, v)| prop(locals[k], Some(&v.to_string())))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_resolution_is_associative(a in arb_props(), b in arb_props(), c in arb_props()) {
            let a_own: RunProperties = a.iter().cloned().collect();
            let sheet: StyleSheet = [
                style("C", None, c),
                style("B", Some("C"), b),
                style("A", Some("B"), a),
            ]
            .into_iter()
            .collect();
            let resolver = StyleResolver::new(sheet);

            let expected = resolver.resolve("B").map(|bc| bc.overlaid(&a_own)).unwrap_or_else(|| a_own.clone());
            prop_assert_eq!(resolver.resolve("A"), Some(&expected));
        }
    }
}
