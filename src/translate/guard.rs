//! Response hygiene: cleaning wrapped replies and spotting refusals.
use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use once_cell::sync::Lazy;

/// Replies at least this many characters long are never taken for refusals.
const REFUSAL_MAX_CHARS: usize = 50;

static REFUSAL_PATTERNS: &[&str] = &[
    "抱歉",
    "对不起",
    "无法处理",
    "不能",
    "无法翻译",
    "无法完成",
    "不支持",
    "无法提供",
    "sorry",
    "i cannot",
    "i can't",
    "unable to",
    "i'm unable",
    "cannot assist",
    "can't assist",
    "cannot help",
    "can't help",
    "i apologize",
];

static REFUSAL_MATCHER: Lazy<Option<AhoCorasick>> = Lazy::new(|| {
    AhoCorasickBuilder::new()
        .ascii_case_insensitive(true)
        .match_kind(MatchKind::LeftmostFirst)
        .build(REFUSAL_PATTERNS)
        .ok()
});

/// Characters a translator tends to wrap a reply in.
const WRAPPING_CHARS: &[char] = &['"', '\'', '“', '”', '‘', '’', '`'];

/// Strip decoration the translator added around `response`.
///
/// Code fences and wrapping quotes are removed unless `source` has them
/// too. Leading and trailing whitespace is replaced by the source's own, so
/// a segment that starts with a space keeps it.
///
/// # Examples
///
/// ```
/// use pomelo::translate::guard::clean_response;
///
/// assert_eq!(clean_response(" plain", "\"simple\"\n"), " simple");
/// assert_eq!(clean_response("\"quoted\"", "« \"cité\" »"), "« \"cité\" »");
/// ```
pub fn clean_response(source: &str, response: &str) -> String {
    let mut core = response.trim();

    if !source.trim_start().starts_with("```")
        && let Some(inner) = strip_code_fence(core)
    {
        core = inner.trim();
    }

    let source_core = source.trim();
    loop {
        let before = core;
        if let Some(c) = core.chars().next()
            && WRAPPING_CHARS.contains(&c)
            && !source_core.starts_with(c)
        {
            core = core[c.len_utf8()..].trim_start();
        }
        if let Some(c) = core.chars().next_back()
            && WRAPPING_CHARS.contains(&c)
            && !source_core.ends_with(c)
        {
            core = core[..core.len() - c.len_utf8()].trim_end();
        }
        if core == before {
            break;
        }
    }

    let lead = &source[..source.len() - source.trim_start().len()];
    let trail = &source[source.trim_end().len()..];
    if core.is_empty() {
        return String::new();
    }
    let mut out = String::with_capacity(lead.len() + core.len() + trail.len());
    out.push_str(lead);
    out.push_str(core);
    out.push_str(trail);
    out
}

fn strip_code_fence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("```")?;
    let rest = rest.strip_suffix("```")?;
    // Drop an info string such as ```text
    match rest.find('\n') {
        Some(nl) if !rest[..nl].contains(char::is_whitespace) => Some(&rest[nl + 1..]),
        _ => Some(rest),
    }
}

/// Whether `response` reads like a refusal rather than a translation.
///
/// Only short replies qualify, and a pattern that already occurs in the
/// source text ("Sorry for the delay") does not count.
pub fn is_refusal(source: &str, response: &str) -> bool {
    let response = response.trim();
    if response.is_empty() || response.chars().count() >= REFUSAL_MAX_CHARS {
        return false;
    }
    let Some(matcher) = REFUSAL_MATCHER.as_ref() else {
        return false;
    };
    let source_lower = source.to_lowercase();
    let refusal = matcher
        .find_iter(response)
        .map(|m| REFUSAL_PATTERNS[m.pattern().as_usize()])
        .find(|pattern| !source_lower.contains(pattern));
    if let Some(pattern) = refusal {
        tracing::warn!(target: "pomelo::audit", pattern, response, "refusal detected");
        return true;
    }
    false
}

/// Whether `response` repeats any of the prompt `markers`.
pub fn echoes_instructions(response: &str, markers: &[String]) -> bool {
    markers.iter().any(|m| !m.is_empty() && response.contains(m.as_str()))
}
