//! The separator/placeholder protocol used to send several segments through
//! one flat text-to-text translation call.
//!
//! A paragraph's segments are joined with a separator token; segments that
//! must not be translated (images, formulas, fields) appear as a placeholder
//! token. The translator is expected to hand both tokens back verbatim, in
//! the same number and order.
use crate::common::{excerpt, is_meaningful_text};
use memchr::memmem;
use std::ops::Range;

/// Default segment separator.
pub const DEFAULT_SEPARATOR: &str = "【SEG】";
/// Default stand-in for non-text content.
pub const DEFAULT_PLACEHOLDER: &str = "<placeholder>";

/// Upper bound on numbered token variants tried when avoiding collisions.
const MAX_TOKEN_VARIANTS: usize = 64;

/// A separator/placeholder pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tokens {
    separator: String,
    placeholder: String,
}

impl Default for Tokens {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR, DEFAULT_PLACEHOLDER)
    }
}

impl Tokens {
    /// Create a token pair.
    pub fn new(separator: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            placeholder: placeholder.into(),
        }
    }

    /// The separator token.
    #[inline]
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// The placeholder token.
    #[inline]
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Pick a variant of these tokens that occurs in none of `texts`.
    ///
    /// Variants number the token before its last character (`【SEG2】`,
    /// `<placeholder2>`). When every variant collides, the last one tried is
    /// returned and a warning is logged.
    pub fn avoiding<'a, I>(&self, texts: I) -> Tokens
    where
        I: IntoIterator<Item = &'a str>,
        I::IntoIter: Clone,
    {
        let texts = texts.into_iter();
        let separator = pick_variant(&self.separator, |candidate| {
            texts.clone().any(|t| t.contains(candidate))
        });
        let placeholder = pick_variant(&self.placeholder, |candidate| {
            candidate.contains(separator.as_str())
                || separator.contains(candidate)
                || texts.clone().any(|t| !placeholder_spans(t, candidate).is_empty())
        });
        Tokens {
            separator,
            placeholder,
        }
    }

    /// Count separator occurrences in `text`.
    pub fn count_separators(&self, text: &str) -> usize {
        memmem::find_iter(text.as_bytes(), self.separator.as_bytes()).count()
    }

    /// Count placeholder occurrences in `text`, tolerating whitespace just
    /// inside the token's brackets (`< placeholder >`).
    pub fn count_placeholders(&self, text: &str) -> usize {
        placeholder_spans(text, &self.placeholder).len()
    }

    /// Remove every separator and placeholder from `text`.
    pub fn strip(&self, text: &str) -> String {
        let without_placeholders = remove_spans(text, &placeholder_spans(text, &self.placeholder));
        without_placeholders.replace(self.separator.as_str(), "")
    }

    fn strip_placeholders(&self, text: &str) -> String {
        remove_spans(text, &placeholder_spans(text, &self.placeholder))
    }
}

fn pick_variant(token: &str, collides: impl Fn(&str) -> bool) -> String {
    if !collides(token) {
        return token.to_string();
    }
    let split = token.char_indices().last().map_or(0, |(idx, _)| idx);
    let (head, tail) = token.split_at(split);
    let mut candidate = token.to_string();
    for n in 2..MAX_TOKEN_VARIANTS + 2 {
        candidate = format!("{}{}{}", head, n, tail);
        if !collides(&candidate) {
            tracing::debug!(target: "pomelo::audit", token, chosen = %candidate, "token collides with document text");
            return candidate;
        }
    }
    tracing::warn!(target: "pomelo::audit", token, "no collision-free token variant found");
    candidate
}

/// Byte ranges of placeholder occurrences in `text`.
///
/// A placeholder that starts and ends with a non-alphanumeric character
/// (like `<placeholder>`) also matches with whitespace between those
/// characters and the core.
fn placeholder_spans(text: &str, placeholder: &str) -> Vec<Range<usize>> {
    let mut chars = placeholder.chars();
    let (Some(open), Some(close)) = (chars.next(), chars.next_back()) else {
        return memmem::find_iter(text.as_bytes(), placeholder.as_bytes())
            .map(|start| start..start + placeholder.len())
            .collect();
    };
    let core = placeholder[open.len_utf8()..placeholder.len() - close.len_utf8()].trim();
    if open.is_alphanumeric() || close.is_alphanumeric() || core.is_empty() {
        return memmem::find_iter(text.as_bytes(), placeholder.as_bytes())
            .map(|start| start..start + placeholder.len())
            .collect();
    }

    let mut spans: Vec<Range<usize>> = Vec::new();
    for found in memmem::find_iter(text.as_bytes(), core.as_bytes()) {
        let before = text[..found].trim_end();
        let after_core = found + core.len();
        let after = &text[after_core..];
        let after_trimmed = after.trim_start();
        if !before.ends_with(open) || !after_trimmed.starts_with(close) {
            continue;
        }
        let start = before.len() - open.len_utf8();
        let end = after_core + (after.len() - after_trimmed.len()) + close.len_utf8();
        if spans.last().is_some_and(|prev| prev.end > start) {
            continue;
        }
        spans.push(start..end);
    }
    spans
}

fn remove_spans(text: &str, spans: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        out.push_str(&text[cursor..span.start]);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// One entry of a serialized paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece<'a> {
    /// Translatable text, with its original content
    Text(&'a str),
    /// Non-text content, sent as the placeholder
    Opaque,
}

/// Join pieces with the separator, opaque ones as the placeholder.
///
/// # Examples
///
/// ```
/// use pomelo::translate::protocol::{Piece, Tokens, serialize};
///
/// let blob = serialize(&[Piece::Text("Start"), Piece::Opaque, Piece::Text("End")], &Tokens::default());
/// assert_eq!(blob, "Start【SEG】<placeholder>【SEG】End");
/// ```
pub fn serialize(pieces: &[Piece<'_>], tokens: &Tokens) -> String {
    let mut out = String::new();
    for (i, piece) in pieces.iter().enumerate() {
        if i > 0 {
            out.push_str(tokens.separator());
        }
        match piece {
            Piece::Text(text) => out.push_str(text),
            Piece::Opaque => out.push_str(tokens.placeholder()),
        }
    }
    out
}

/// How a translated blob was matched back to its pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Alignment {
    /// Separator and placeholder counts as sent
    Exact,
    /// Separators as sent, placeholders not; stray placeholders dropped
    PlaceholderMismatch,
    /// Separators lost, but one piece carries all the text, so it gets the
    /// whole translation
    Collapsed,
    /// Could not align; every piece keeps its original text
    Fallback,
}

impl Alignment {
    /// Whether any translated text made it into the result.
    #[inline]
    pub fn is_translated(self) -> bool {
        !matches!(self, Self::Fallback)
    }
}

/// Result of [`deserialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aligned {
    /// One text per piece; opaque pieces hold the placeholder
    pub texts: Vec<String>,
    /// How the texts were obtained
    pub alignment: Alignment,
    /// Separators found in the translated blob
    pub found_separators: usize,
    /// Placeholders found in the translated blob
    pub found_placeholders: usize,
}

/// Split a translated blob back into one text per piece.
///
/// Never fails: when the translator broke the protocol the result degrades
/// as described by [`Alignment`], and the mismatch is logged.
pub fn deserialize(translated: &str, pieces: &[Piece<'_>], tokens: &Tokens) -> Aligned {
    let expected_separators = pieces.len().saturating_sub(1);
    let expected_placeholders = pieces.iter().filter(|p| matches!(p, Piece::Opaque)).count();
    let found_separators = tokens.count_separators(translated);
    let found_placeholders = tokens.count_placeholders(translated);
    let aligned = |texts, alignment| Aligned {
        texts,
        alignment,
        found_separators,
        found_placeholders,
    };

    if pieces.is_empty() {
        return aligned(Vec::new(), Alignment::Exact);
    }

    if found_separators == expected_separators {
        let parts: Vec<&str> = translated.split(tokens.separator()).collect();
        let in_place = pieces.iter().zip(&parts).all(|(piece, part)| match piece {
            Piece::Text(_) => tokens.count_placeholders(part) == 0,
            Piece::Opaque => tokens.count_placeholders(part) == 1 && !is_meaningful_text(&tokens.strip_placeholders(part)),
        });
        if found_placeholders == expected_placeholders && in_place {
            let texts = pieces
                .iter()
                .zip(&parts)
                .map(|(piece, part)| match piece {
                    Piece::Text(_) => (*part).to_string(),
                    Piece::Opaque => tokens.placeholder().to_string(),
                })
                .collect();
            return aligned(texts, Alignment::Exact);
        }

        tracing::warn!(
            target: "pomelo::audit",
            expected = expected_placeholders,
            found = found_placeholders,
            translated = %excerpt(translated, 80),
            "placeholders missing, duplicated or moved"
        );
        return aligned(
            realign_placeholders(&parts, pieces, tokens),
            Alignment::PlaceholderMismatch,
        );
    }

    tracing::warn!(
        target: "pomelo::audit",
        expected = expected_separators,
        found = found_separators,
        translated = %excerpt(translated, 80),
        "separator count mismatch"
    );

    let mut bearing = pieces
        .iter()
        .enumerate()
        .filter(|(_, p)| matches!(p, Piece::Text(t) if is_meaningful_text(t)));
    if let (Some((only, _)), None) = (bearing.next(), bearing.next()) {
        let texts = pieces
            .iter()
            .enumerate()
            .map(|(i, piece)| match piece {
                Piece::Text(_) if i == only => tokens.strip(translated).trim().to_string(),
                Piece::Text(original) => (*original).to_string(),
                Piece::Opaque => tokens.placeholder().to_string(),
            })
            .collect();
        return aligned(texts, Alignment::Collapsed);
    }

    aligned(originals(pieces, tokens), Alignment::Fallback)
}

/// Per-piece original texts, the fallback when nothing can be aligned.
pub fn originals(pieces: &[Piece<'_>], tokens: &Tokens) -> Vec<String> {
    pieces
        .iter()
        .map(|piece| match piece {
            Piece::Text(original) => (*original).to_string(),
            Piece::Opaque => tokens.placeholder().to_string(),
        })
        .collect()
}

/// Keep text slots by position, drop stray placeholders, and move any text
/// that landed in an opaque slot to the nearest preceding text slot.
fn realign_placeholders(parts: &[&str], pieces: &[Piece<'_>], tokens: &Tokens) -> Vec<String> {
    let mut texts: Vec<String> = Vec::with_capacity(pieces.len());
    let mut orphan = String::new();
    for (piece, part) in pieces.iter().zip(parts) {
        match piece {
            Piece::Text(_) => {
                let mut text = std::mem::take(&mut orphan);
                text.push_str(&tokens.strip_placeholders(part));
                texts.push(text);
            },
            Piece::Opaque => {
                let stray = tokens.strip_placeholders(part);
                if is_meaningful_text(&stray) {
                    let target = pieces[..texts.len()]
                        .iter()
                        .rposition(|p| matches!(p, Piece::Text(_)));
                    match target {
                        Some(idx) => texts[idx].push_str(&stray),
                        None => orphan.push_str(&stray),
                    }
                }
                texts.push(tokens.placeholder().to_string());
            },
        }
    }
    if !orphan.is_empty() {
        tracing::debug!(target: "pomelo::audit", text = %excerpt(&orphan, 40), "text after last opaque slot had no home");
    }
    texts
}
