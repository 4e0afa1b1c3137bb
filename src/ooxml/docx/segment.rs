//! Splitting a paragraph into translatable segments.
use crate::common::{excerpt, is_meaningful_text};
use crate::ooxml::docx::markup::{is_opaque_run, is_w, layout_marks, run_text};
use crate::ooxml::docx::properties::{RunProperties, equivalent};
use crate::ooxml::xml::{Node, NodeId, Ns, XmlTree};
use crate::translate::protocol::{self, Piece, Tokens};
use phf::{Set, phf_set};
use smallvec::{SmallVec, smallvec};

/// Paragraph children that are carried through as opaque segments.
static OPAQUE_PARAGRAPH_CHILDREN: Set<&'static str> = phf_set! {
    "drawing",
    "object",
    "pict",
};

/// Zero-width markers that are kept in place without a warning.
static KNOWN_MARKERS: Set<&'static str> = phf_set! {
    "bookmarkStart",
    "bookmarkEnd",
    "proofErr",
    "permStart",
    "permEnd",
    "commentRangeStart",
    "commentRangeEnd",
    "moveFromRangeStart",
    "moveFromRangeEnd",
    "moveToRangeStart",
    "moveToRangeEnd",
};

/// One unit of a segmented paragraph.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Consecutive runs with equivalent formatting, merged
    TextRunGroup {
        /// Concatenated text of the runs
        text: String,
        /// Formatting shared by the runs; `None` when the first run has no `w:rPr`
        properties: Option<RunProperties>,
        /// The merged runs, in order
        runs: SmallVec<[NodeId; 4]>,
        /// Tabs, breaks and hyphen marks of the runs, in order; `text`
        /// holds their characters
        marks: SmallVec<[NodeId; 2]>,
    },
    /// Content that is never translated (math, drawings, fields)
    NonText {
        /// The original node
        node: NodeId,
    },
    /// A `w:hyperlink`, translated as a single unit
    Hyperlink {
        /// Concatenated text of the inner runs
        text: String,
        /// Formatting of the inner runs
        properties: Option<RunProperties>,
        /// The original hyperlink node
        node: NodeId,
    },
}

impl Segment {
    /// Original text of a text-bearing segment; empty for [`Segment::NonText`].
    pub fn original_text(&self) -> &str {
        match self {
            Self::TextRunGroup { text, .. } | Self::Hyperlink { text, .. } => text,
            Self::NonText { .. } => "",
        }
    }

    /// Whether the segment is sent as text rather than as a placeholder.
    #[inline]
    pub fn is_text(&self) -> bool {
        !matches!(self, Self::NonText { .. })
    }

    fn piece(&self) -> Piece<'_> {
        match self {
            Self::NonText { .. } => Piece::Opaque,
            _ => Piece::Text(self.original_text()),
        }
    }
}

/// Position of one original paragraph child in the rebuilt paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Emit segment `n`
    Segment(usize),
    /// Re-insert this unrecognized child unchanged
    Passthrough(NodeId),
}

/// A segmented paragraph, ready to be translated and rebuilt.
#[derive(Debug, Clone)]
pub struct ParagraphStructure {
    /// The original `w:p`
    pub paragraph: NodeId,
    /// Its `w:pPr`, if any
    pub properties: Option<NodeId>,
    /// The segments, in document order
    pub segments: Vec<Segment>,
    /// Output order of segments and passthrough children
    pub layout: Vec<Slot>,
    /// Segment texts joined by the separator, non-text segments as placeholder
    pub blob: String,
    /// Tokens used in `blob`
    pub tokens: Tokens,
}

impl ParagraphStructure {
    /// Whether some segment carries meaningful text.
    pub fn is_translatable(&self) -> bool {
        self.segments
            .iter()
            .any(|s| s.is_text() && is_meaningful_text(s.original_text()))
    }

    /// Number of non-text segments, i.e. placeholders in the blob.
    pub fn placeholder_count(&self) -> usize {
        self.segments.iter().filter(|s| !s.is_text()).count()
    }

    /// Segments as protocol pieces.
    pub fn pieces(&self) -> Vec<Piece<'_>> {
        self.segments.iter().map(Segment::piece).collect()
    }

    /// Per-segment original texts (placeholders for non-text segments).
    pub fn original_texts(&self) -> Vec<String> {
        protocol::originals(&self.pieces(), &self.tokens)
    }
}

/// Segment a `w:p`.
///
/// `tokens` are the preferred separator and placeholder; a numbered variant
/// is used instead when the paragraph text already contains one of them.
pub fn segment(tree: &XmlTree, paragraph: NodeId, tokens: &Tokens) -> ParagraphStructure {
    let mut segments: Vec<Segment> = Vec::new();
    let mut layout: Vec<Slot> = Vec::new();
    let mut properties = None;

    let children = tree.children(paragraph);
    let mut i = 0;
    while i < children.len() {
        let child = children[i];
        i += 1;

        let Some(e) = tree.element(child) else {
            match tree.node(child) {
                // Whitespace between elements is insignificant in w:p.
                Node::Text(raw) if raw.trim().is_empty() => {},
                _ => layout.push(Slot::Passthrough(child)),
            }
            continue;
        };
        let local = e.local_name();

        match e.ns() {
            Ns::Word if local == "pPr" && properties.is_none() => properties = Some(child),
            Ns::Word if local == "r" => {
                if is_opaque_run(tree, child) {
                    push_segment(&mut segments, &mut layout, Segment::NonText { node: child });
                    continue;
                }
                let mut runs: SmallVec<[NodeId; 4]> = smallvec![child];
                while let Some(next) = children.get(i).copied() {
                    if !is_w(tree, next, "r") || is_opaque_run(tree, next) {
                        break;
                    }
                    runs.push(next);
                    if consistent_properties(tree, &runs).is_none() {
                        runs.pop();
                        tracing::debug!(
                            target: "pomelo::audit",
                            text = %excerpt(&run_text(tree, next), 30),
                            "formatting differs, run group closed"
                        );
                        break;
                    }
                    i += 1;
                }
                let shared = group_properties(tree, &runs);
                let text: String = runs.iter().map(|r| run_text(tree, *r)).collect();
                let marks = runs.iter().flat_map(|r| layout_marks(tree, *r)).collect();
                if runs.len() > 1 {
                    tracing::debug!(
                        target: "pomelo::audit",
                        runs = runs.len(),
                        text = %excerpt(&text, 40),
                        "merged runs"
                    );
                }
                push_segment(
                    &mut segments,
                    &mut layout,
                    Segment::TextRunGroup {
                        text,
                        properties: shared,
                        runs,
                        marks,
                    },
                );
            },
            Ns::Word if local == "hyperlink" => {
                let runs: Vec<NodeId> = tree
                    .descendants_named(child, &Ns::Word, "r")
                    .into_iter()
                    .filter(|r| tree.find_child(*r, &Ns::Word, "t").is_some())
                    .collect();
                let text: String = runs.iter().map(|r| run_text(tree, *r)).collect();
                let shared = if runs.is_empty() {
                    None
                } else {
                    group_properties(tree, &runs)
                };
                push_segment(
                    &mut segments,
                    &mut layout,
                    Segment::Hyperlink {
                        text,
                        properties: shared,
                        node: child,
                    },
                );
            },
            Ns::Word if OPAQUE_PARAGRAPH_CHILDREN.contains(local) => {
                push_segment(&mut segments, &mut layout, Segment::NonText { node: child });
            },
            Ns::Math if local == "oMath" || local == "oMathPara" => {
                push_segment(&mut segments, &mut layout, Segment::NonText { node: child });
            },
            Ns::MarkupCompat if local == "AlternateContent" => {
                push_segment(&mut segments, &mut layout, Segment::NonText { node: child });
            },
            Ns::Word if KNOWN_MARKERS.contains(local) => layout.push(Slot::Passthrough(child)),
            _ => {
                tracing::warn!(
                    target: "pomelo::audit",
                    element = e.name(),
                    "unhandled paragraph child kept untranslated"
                );
                layout.push(Slot::Passthrough(child));
            },
        }
    }

    let tokens = tokens.avoiding(segments.iter().map(Segment::original_text));
    let pieces: Vec<Piece<'_>> = segments.iter().map(Segment::piece).collect();
    let blob = protocol::serialize(&pieces, &tokens);

    ParagraphStructure {
        paragraph,
        properties,
        segments,
        layout,
        blob,
        tokens,
    }
}

fn push_segment(segments: &mut Vec<Segment>, layout: &mut Vec<Slot>, segment: Segment) {
    layout.push(Slot::Segment(segments.len()));
    segments.push(segment);
}

fn direct_properties(tree: &XmlTree, run: NodeId) -> Option<RunProperties> {
    tree.find_child(run, &Ns::Word, "rPr")
        .map(|rpr| RunProperties::from_element(tree, rpr))
}

/// Representative formatting of `runs`, if they all share the same one.
///
/// The outer `Option` is `None` when the runs are inconsistent; the inner
/// one is `None` when the first run has no `w:rPr`.
pub fn consistent_properties(tree: &XmlTree, runs: &[NodeId]) -> Option<Option<RunProperties>> {
    let (first, rest) = runs.split_first()?;
    let first_props = direct_properties(tree, *first);
    for run in rest {
        let props = direct_properties(tree, *run);
        if !equivalent(first_props.as_ref(), props.as_ref()) {
            return None;
        }
    }
    Some(first_props)
}

/// Formatting for a group believed consistent. Falls back to the first
/// run's own properties when it is not.
fn group_properties(tree: &XmlTree, runs: &[NodeId]) -> Option<RunProperties> {
    match consistent_properties(tree, runs) {
        Some(props) => props,
        None => {
            tracing::warn!(
                target: "pomelo::audit",
                runs = runs.len(),
                "inconsistent formatting in merged runs, using the first run's"
            );
            runs.first().and_then(|r| direct_properties(tree, *r))
        },
    }
}
