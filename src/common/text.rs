//! Plain-text predicates used when deciding what is worth translating.

/// Check whether a string carries translatable content.
///
/// A string is meaningful when it contains at least one alphanumeric
/// character; whitespace, punctuation and symbols alone are not.
///
/// # Examples
///
/// ```
/// use pomelo::common::is_meaningful_text;
/// assert!(is_meaningful_text("  Hello "));
/// assert!(is_meaningful_text("第一章"));
/// assert!(!is_meaningful_text(" -- ; "));
/// assert!(!is_meaningful_text(""));
/// ```
#[inline]
pub fn is_meaningful_text(s: &str) -> bool {
    s.chars().any(char::is_alphanumeric)
}

/// Return at most `max_chars` characters of `s` for log messages.
///
/// Truncation happens on a character boundary and is marked with `…`.
pub fn excerpt(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let mut out = String::with_capacity(idx + 3);
            out.push_str(&s[..idx]);
            out.push('…');
            out
        },
        None => s.to_string(),
    }
}
