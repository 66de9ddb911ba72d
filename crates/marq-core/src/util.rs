//! Shared text helpers used by rules and the serializer.

/// Tags treated as block-level when prettifying output and detecting raw HTML blocks.
const BLOCK_LEVEL_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "body",
    "canvas",
    "center",
    "colgroup",
    "dd",
    "details",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hgroup",
    "hr",
    "html",
    "iframe",
    "legend",
    "li",
    "main",
    "map",
    "math",
    "menu",
    "nav",
    "noscript",
    "object",
    "ol",
    "output",
    "p",
    "pre",
    "progress",
    "script",
    "section",
    "style",
    "summary",
    "table",
    "tbody",
    "td",
    "textarea",
    "tfoot",
    "th",
    "thead",
    "tr",
    "ul",
    "video",
];

/// Whether `tag` is a block-level element.
#[must_use]
pub fn is_block_level(tag: &str) -> bool {
    BLOCK_LEVEL_TAGS
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(tag))
}

/// Escape special HTML characters in text content.
///
/// # Examples
///
/// ```
/// use marq_core::escape_html;
///
/// assert_eq!(escape_html("a < b & c"), "a &lt; b &amp; c");
/// assert_eq!(escape_html(r#"say "hi""#), "say &quot;hi&quot;");
/// ```
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            _ => result.push(ch),
        }
    }
    result
}

/// Remove one level of `width`-column indentation from the leading lines of `text`.
///
/// Consumes lines while they are indented by at least `width` spaces or blank.
/// Returns the dedented lines and the remaining (unconsumed) lines.
pub(crate) fn detab(text: &str, width: usize) -> (String, String) {
    let indent = " ".repeat(width);
    let lines: Vec<&str> = text.split('\n').collect();
    let mut dedented = Vec::with_capacity(lines.len());
    for line in &lines {
        if let Some(stripped) = line.strip_prefix(indent.as_str()) {
            dedented.push(stripped);
        } else if line.trim().is_empty() {
            dedented.push("");
        } else {
            break;
        }
    }
    let rest = lines[dedented.len()..].join("\n");
    (dedented.join("\n"), rest)
}

/// Remove `level` indentation steps from every line that carries them.
pub(crate) fn loose_detab(text: &str, width: usize, level: usize) -> String {
    let indent = " ".repeat(width * level);
    text.split('\n')
        .map(|line| line.strip_prefix(indent.as_str()).unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Byte index of the character boundary following `index`.
pub(crate) fn next_boundary(text: &str, index: usize) -> usize {
    text[index..]
        .chars()
        .next()
        .map_or(text.len(), |ch| index + ch.len_utf8())
}

/// Character immediately before byte `index`, if any.
pub(crate) fn char_before(text: &str, index: usize) -> Option<char> {
    text[..index].chars().next_back()
}

/// Character starting at byte `index`, if any.
pub(crate) fn char_at(text: &str, index: usize) -> Option<char> {
    text.get(index..).and_then(|rest| rest.chars().next())
}

/// Normalize a link reference label: lowercase with collapsed whitespace.
pub(crate) fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
