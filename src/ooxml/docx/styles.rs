//! Styles - the style sheet of a Word document (`word/styles.xml`).
use crate::ooxml::docx::enums::WdStyleType;
use crate::ooxml::docx::properties::RunProperties;
use crate::ooxml::error::Result;
use crate::ooxml::xml::{Ns, NodeId, XmlTree};
use smallvec::SmallVec;

/// The styles declared in a document's style sheet.
///
/// Read once when a document is opened and never modified afterwards.
///
/// # Examples
///
/// ```
/// use pomelo::ooxml::docx::{StyleSheet, WdStyleType};
///
/// let xml = br#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
///   <w:style w:type="character" w:styleId="Strong">
///     <w:name w:val="Strong"/><w:basedOn w:val="DefaultParagraphFont"/>
///     <w:rPr><w:b/></w:rPr>
///   </w:style>
/// </w:styles>"#;
/// let sheet = StyleSheet::parse(xml)?;
/// let strong = sheet.get_by_id("Strong").unwrap();
/// assert_eq!(strong.style_type(), WdStyleType::Character);
/// assert_eq!(strong.based_on(), Some("DefaultParagraphFont"));
/// # Ok::<(), pomelo::ooxml::OoxmlError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    styles: SmallVec<[Style; 32]>,
    defaults: RunProperties,
}

impl StyleSheet {
    /// Parse a `w:styles` part.
    ///
    /// # Errors
    ///
    /// Fails only when the part is not well-formed XML.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let tree = XmlTree::parse(bytes)?;
        let root = tree.root();
        let mut styles = SmallVec::new();

        for child in tree.child_elements(root) {
            if tree.is(child, &Ns::Word, "style") {
                match Style::from_element(&tree, child) {
                    Some(style) => styles.push(style),
                    None => tracing::debug!("skipping style without w:styleId"),
                }
            }
        }

        let defaults = tree
            .find_child(root, &Ns::Word, "docDefaults")
            .and_then(|d| tree.find_child(d, &Ns::Word, "rPrDefault"))
            .and_then(|d| tree.find_child(d, &Ns::Word, "rPr"))
            .map(|rpr| RunProperties::from_element(&tree, rpr))
            .unwrap_or_default();

        tracing::debug!(count = styles.len(), "parsed style sheet");
        Ok(Self { styles, defaults })
    }

    /// Get the number of styles.
    #[inline]
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    /// Whether the sheet declares no style at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Iterate over all styles in declaration order.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Style> {
        self.styles.iter()
    }

    /// Look a style up by `w:styleId`.
    pub fn get_by_id(&self, style_id: &str) -> Option<&Style> {
        self.styles.iter().find(|s| s.style_id == style_id)
    }

    /// Get a style by its UI name.
    pub fn get_by_name(&self, name: &str) -> Option<&Style> {
        self.styles.iter().find(|s| s.name.as_deref() == Some(name))
    }

    /// The style flagged as default for `style_type`.
    pub fn get_default(&self, style_type: WdStyleType) -> Option<&Style> {
        self.styles
            .iter()
            .find(|s| s.is_default && s.style_type == style_type)
    }

    /// Run properties from `w:docDefaults/w:rPrDefault`.
    #[inline]
    pub fn doc_defaults(&self) -> &RunProperties {
        &self.defaults
    }
}

impl FromIterator<Style> for StyleSheet {
    fn from_iter<I: IntoIterator<Item = Style>>(iter: I) -> Self {
        Self {
            styles: iter.into_iter().collect(),
            defaults: RunProperties::new(),
        }
    }
}

/// A single `<w:style>` definition.
#[derive(Debug, Clone)]
pub struct Style {
    /// `w:styleId`, never empty
    style_id: String,
    /// UI-visible name
    name: Option<String>,
    /// `w:type`
    style_type: WdStyleType,
    /// `w:default`
    is_default: bool,
    /// `w:basedOn` target
    based_on: Option<String>,
    /// Directly declared run properties; `None` without a `w:rPr`
    run_properties: Option<RunProperties>,
}

impl Style {
    /// Create a style by hand.
    pub fn new(
        style_id: impl Into<String>,
        style_type: WdStyleType,
        based_on: Option<&str>,
        run_properties: Option<RunProperties>,
    ) -> Self {
        Self {
            style_id: style_id.into(),
            name: None,
            style_type,
            is_default: false,
            based_on: based_on.map(str::to_string),
            run_properties,
        }
    }

    fn from_element(tree: &XmlTree, id: NodeId) -> Option<Self> {
        let style_id = tree.attr(id, &Ns::Word, "styleId")?.into_owned();
        let style_type = tree
            .attr(id, &Ns::Word, "type")
            .and_then(|v| WdStyleType::from_xml(&v))
            .unwrap_or_default();
        let is_default = tree
            .attr(id, &Ns::Word, "default")
            .is_some_and(|v| v == "1" || v == "true");
        let child_val = |local: &str| {
            tree.find_child(id, &Ns::Word, local)
                .and_then(|c| tree.attr(c, &Ns::Word, "val"))
                .map(|v| v.into_owned())
        };
        let run_properties = tree
            .find_child(id, &Ns::Word, "rPr")
            .map(|rpr| RunProperties::from_element(tree, rpr));

        Some(Self {
            name: child_val("name"),
            based_on: child_val("basedOn"),
            style_id,
            style_type,
            is_default,
            run_properties,
        })
    }

    /// The `w:styleId`.
    #[inline]
    pub fn style_id(&self) -> &str {
        &self.style_id
    }

    /// Get the style name.
    ///
    /// `None` without a `w:name`.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Get the style type.
    #[inline]
    pub fn style_type(&self) -> WdStyleType {
        self.style_type
    }

    /// Whether `w:default` marks this style as the default of its type.
    #[inline]
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// Parent style named by `w:basedOn`.
    #[inline]
    pub fn based_on(&self) -> Option<&str> {
        self.based_on.as_deref()
    }

    /// Run properties declared by this style itself, not inherited ones.
    #[inline]
    pub fn run_properties(&self) -> Option<&RunProperties> {
        self.run_properties.as_ref()
    }
}
