use aho_corasick::{AhoCorasick, MatchKind};
use once_cell::sync::Lazy;
use std::borrow::Cow;

// Attribute values need quotes escaped as well
static ATTR_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(["&", "<", ">", "\"", "'"])
        .expect("Failed to build XML attribute escaper")
});

static TEXT_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(["&", "<", ">"])
        .expect("Failed to build XML text escaper")
});

/// Escape a string for use inside a double-quoted attribute value.
///
/// # Examples
///
/// ```
/// use pomelo::common::xml::escape_attr;
/// assert_eq!(escape_attr("a & \"b\""), "a &amp; &quot;b&quot;");
/// ```
#[inline]
pub fn escape_attr(s: &str) -> String {
    ATTR_ESCAPER.replace_all(s, &["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"])
}

/// Escape a string for use as element character data.
///
/// Quotes are left alone; Word itself writes them unescaped inside `<w:t>`.
///
/// # Examples
///
/// ```
/// use pomelo::common::xml::escape_text;
/// assert_eq!(escape_text("<a href=\"x\"> & b"), "&lt;a href=\"x\"&gt; &amp; b");
/// ```
#[inline]
pub fn escape_text(s: &str) -> String {
    TEXT_ESCAPER.replace_all(s, &["&amp;", "&lt;", "&gt;"])
}

static NAMED_ENTITIES: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"])
        .expect("Failed to build XML unescaper")
});

/// Unescape XML character data or attribute values.
///
/// Decodes the five predefined entities and decimal/hexadecimal character
/// references. Unknown or malformed references are left unchanged.
///
/// # Examples
///
/// ```
/// use pomelo::common::xml::unescape_xml;
/// assert_eq!(unescape_xml("&lt;a &amp; b&gt;"), "<a & b>");
/// assert_eq!(unescape_xml("&#65;&#x42;"), "AB");
/// assert_eq!(unescape_xml("&amp;lt;"), "&lt;");
/// assert_eq!(unescape_xml("&invalid;"), "&invalid;");
/// ```
pub fn unescape_xml(s: &str) -> Cow<'_, str> {
    if memchr::memchr(b'&', s.as_bytes()).is_none() {
        return Cow::Borrowed(s);
    }
    let decoded = decode_char_refs(s);
    let named = NAMED_ENTITIES.replace_all(&decoded, &["&", "<", ">", "\"", "'"]);
    Cow::Owned(named)
}

/// Decode `&#NN;` and `&#xHH;` references, leaving everything else as-is.
///
/// A decoded `&` is re-encoded as `&amp;` so the named-entity pass that
/// follows cannot decode the same text twice.
fn decode_char_refs(s: &str) -> Cow<'_, str> {
    if !s.contains("&#") {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(idx) = rest.find("&#") {
        out.push_str(&rest[..idx]);
        let candidate = &rest[idx + 2..];
        let decoded = candidate.find(';').and_then(|end| {
            let body = &candidate[..end];
            let code = match body.strip_prefix('x').or_else(|| body.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => body.parse::<u32>().ok(),
            };
            code.and_then(char::from_u32).map(|c| (c, end))
        });
        match decoded {
            Some(('&', end)) => {
                out.push_str("&amp;");
                rest = &candidate[end + 1..];
            },
            Some((c, end)) => {
                out.push(c);
                rest = &candidate[end + 1..];
            },
            None => {
                out.push_str("&#");
                rest = candidate;
            },
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}
