//! Links, images, references and autolinks.

use std::sync::LazyLock;

use regex::Regex;

use super::text::ESCAPED_CHARS;
use super::{Fragment, InlineContext, InlineMatch, InlinePattern, find_char};
use crate::context::LinkReference;
use crate::stash::AMP_PLACEHOLDER;
use crate::tree::Element;
use crate::util::{char_at, char_before};

static AUTOLINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<((?:[Ff]|[Hh][Tt])[Tt][Pp][Ss]?://[^<>]*)>").expect("invalid autolink regex")
});

static AUTOMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<([^<> !]+@[^@<> ]+)>").expect("invalid automail regex")
});

/// Index of the `]` matching the `[` at `open`, honoring nesting and escapes.
fn matching_bracket(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut escaped = false;
    for (offset, ch) in text[open..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn skip_whitespace(text: &str, from: usize) -> usize {
    text[from..]
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map_or(text.len(), |(offset, _)| from + offset)
}

/// Destination of an inline link.
struct Target {
    url: String,
    title: Option<String>,
    end: usize,
}

/// Parse `(url "title")` starting at the `(` at `paren`.
fn parse_target(text: &str, paren: usize) -> Option<Target> {
    let mut pos = skip_whitespace(text, paren + 1);
    let url = if char_at(text, pos) == Some('<') {
        let close = find_char(text, pos + 1, '>')?;
        let url = &text[pos + 1..close];
        pos = close + 1;
        url
    } else {
        let begin = pos;
        let mut depth = 0usize;
        for (offset, ch) in text[begin..].char_indices() {
            pos = begin + offset;
            match ch {
                '(' => depth += 1,
                ')' if depth == 0 => break,
                ')' => depth -= 1,
                c if c.is_whitespace() => break,
                _ => {}
            }
            pos = begin + offset + ch.len_utf8();
        }
        &text[begin..pos]
    };

    pos = skip_whitespace(text, pos);
    let title = match char_at(text, pos)? {
        ')' => None,
        quote @ ('"' | '\'') => {
            let open = pos + 1;
            let close = text[open..]
                .match_indices(quote)
                .map(|(offset, _)| open + offset)
                .find(|&at| char_at(text, skip_whitespace(text, at + 1)) == Some(')'))?;
            pos = skip_whitespace(text, close + 1);
            Some(text[open..close].to_owned())
        }
        _ => return None,
    };

    Some(Target {
        url: url.trim().to_owned(),
        title,
        end: pos + 1,
    })
}

/// Parse the `[id]` (optionally after one space or newline) following a label.
///
/// Returns the id and the end of the match.
fn reference_id(text: &str, from: usize) -> Option<(&str, usize)> {
    let mut pos = from;
    if matches!(char_at(text, pos), Some(' ' | '\n')) {
        pos += 1;
    }
    if char_at(text, pos) != Some('[') {
        return None;
    }
    let close = find_char(text, pos + 1, ']')?;
    let id = &text[pos + 1..close];
    (!id.contains('[')).then_some((id, close + 1))
}

/// Drop backslashes in front of escapable characters.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\'
            && let Some(&next) = chars.peek()
            && ESCAPED_CHARS.contains(&next)
        {
            out.push(next);
            chars.next();
        } else {
            out.push(ch);
        }
    }
    out
}

fn anchor(content: Fragment, url: &str, title: Option<&str>) -> Element {
    let mut element = content.into_element("a");
    element.attrs.set("href", url);
    if let Some(title) = title {
        element.attrs.set("title", title);
    }
    element
}

fn image(src: &str, title: Option<&str>, alt: &str) -> Element {
    let mut element = Element::new("img").with_attr("src", src);
    if let Some(title) = title {
        element.attrs.set("title", title);
    }
    element.attrs.set("alt", unescape(alt));
    element
}

/// A `[` that is not the start of an image.
fn find_link_open(text: &str, from: usize) -> Option<usize> {
    let mut pos = from;
    loop {
        let at = find_char(text, pos, '[')?;
        if char_before(text, at) != Some('!') {
            return Some(at);
        }
        pos = at + 1;
    }
}

fn find_image_open(text: &str, from: usize) -> Option<usize> {
    text.get(from..)?.find("![").map(|at| from + at)
}

/// Resolve `[label][id]` style references at `open`.
fn lookup_reference(
    text: &str,
    open: usize,
    cx: &InlineContext<'_, '_>,
    explicit_id: bool,
) -> Option<(LinkReference, usize, usize)> {
    let close = matching_bracket(text, open)?;
    let label = &text[open + 1..close];
    let (id, end) = if explicit_id {
        let (id, end) = reference_id(text, close + 1)?;
        (if id.is_empty() { label } else { id }, end)
    } else {
        (label, close + 1)
    };
    let reference = cx.reference(id)?.clone();
    Some((reference, close, end))
}

/// `[text](url "title")`.
#[derive(Debug, Default)]
pub struct LinkPattern;

impl InlinePattern for LinkPattern {
    fn find(&self, text: &str, from: usize) -> Option<usize> {
        find_link_open(text, from)
    }

    fn apply(
        &self,
        text: &str,
        start: usize,
        cx: &mut InlineContext<'_, '_>,
    ) -> Option<InlineMatch> {
        let close = matching_bracket(text, start)?;
        if char_at(text, close + 1) != Some('(') {
            return None;
        }
        let target = parse_target(text, close + 1)?;
        let content = cx.parse(&text[start + 1..close]);
        let element = anchor(content, &target.url, target.title.as_deref());
        Some(InlineMatch::element(target.end, element))
    }
}

/// `![alt](src "title")`.
#[derive(Debug, Default)]
pub struct ImageLinkPattern;

impl InlinePattern for ImageLinkPattern {
    fn find(&self, text: &str, from: usize) -> Option<usize> {
        find_image_open(text, from)
    }

    fn apply(
        &self,
        text: &str,
        start: usize,
        _cx: &mut InlineContext<'_, '_>,
    ) -> Option<InlineMatch> {
        let open = start + 1;
        let close = matching_bracket(text, open)?;
        if char_at(text, close + 1) != Some('(') {
            return None;
        }
        let target = parse_target(text, close + 1)?;
        let element = image(&target.url, target.title.as_deref(), &text[open + 1..close]);
        Some(InlineMatch::element(target.end, element))
    }
}

/// `[text][id]` and `[text][]`.
#[derive(Debug, Default)]
pub struct ReferencePattern;

impl InlinePattern for ReferencePattern {
    fn find(&self, text: &str, from: usize) -> Option<usize> {
        find_link_open(text, from)
    }

    fn apply(
        &self,
        text: &str,
        start: usize,
        cx: &mut InlineContext<'_, '_>,
    ) -> Option<InlineMatch> {
        let (reference, close, end) = lookup_reference(text, start, cx, true)?;
        let content = cx.parse(&text[start + 1..close]);
        let element = anchor(content, &reference.url, reference.title.as_deref());
        Some(InlineMatch::element(end, element))
    }
}

/// `![alt][id]`.
#[derive(Debug, Default)]
pub struct ImageReferencePattern;

impl InlinePattern for ImageReferencePattern {
    fn find(&self, text: &str, from: usize) -> Option<usize> {
        find_image_open(text, from)
    }

    fn apply(
        &self,
        text: &str,
        start: usize,
        cx: &mut InlineContext<'_, '_>,
    ) -> Option<InlineMatch> {
        let open = start + 1;
        let (reference, close, end) = lookup_reference(text, open, cx, true)?;
        let element = image(
            &reference.url,
            reference.title.as_deref(),
            &text[open + 1..close],
        );
        Some(InlineMatch::element(end, element))
    }
}

/// `[text]` where `text` names a defined reference.
#[derive(Debug, Default)]
pub struct ShortReferencePattern;

impl InlinePattern for ShortReferencePattern {
    fn find(&self, text: &str, from: usize) -> Option<usize> {
        find_link_open(text, from)
    }

    fn apply(
        &self,
        text: &str,
        start: usize,
        cx: &mut InlineContext<'_, '_>,
    ) -> Option<InlineMatch> {
        let (reference, close, end) = lookup_reference(text, start, cx, false)?;
        let content = cx.parse(&text[start + 1..close]);
        let element = anchor(content, &reference.url, reference.title.as_deref());
        Some(InlineMatch::element(end, element))
    }
}

/// `![alt]` where `alt` names a defined reference.
#[derive(Debug, Default)]
pub struct ShortImageReferencePattern;

impl InlinePattern for ShortImageReferencePattern {
    fn find(&self, text: &str, from: usize) -> Option<usize> {
        find_image_open(text, from)
    }

    fn apply(
        &self,
        text: &str,
        start: usize,
        cx: &mut InlineContext<'_, '_>,
    ) -> Option<InlineMatch> {
        let open = start + 1;
        let (reference, close, end) = lookup_reference(text, open, cx, false)?;
        let element = image(
            &reference.url,
            reference.title.as_deref(),
            &text[open + 1..close],
        );
        Some(InlineMatch::element(end, element))
    }
}

/// `<http://example.com>`.
#[derive(Debug, Default)]
pub struct AutolinkPattern;

impl InlinePattern for AutolinkPattern {
    fn find(&self, text: &str, from: usize) -> Option<usize> {
        find_char(text, from, '<')
    }

    fn apply(
        &self,
        text: &str,
        start: usize,
        _cx: &mut InlineContext<'_, '_>,
    ) -> Option<InlineMatch> {
        let caps = AUTOLINK_RE.captures(&text[start..])?;
        let url = caps.get(1)?.as_str();
        let element = Element::new("a")
            .with_attr("href", url)
            .with_text(url)
            .into_atomic();
        Some(InlineMatch::element(start + caps.get(0)?.end(), element))
    }
}

/// `<user@example.com>`, written out as numeric character references.
#[derive(Debug, Default)]
pub struct AutomailPattern;

fn obfuscate(text: &str) -> String {
    text.chars()
        .map(|c| format!("{AMP_PLACEHOLDER}#{};", u32::from(c)))
        .collect()
}

impl InlinePattern for AutomailPattern {
    fn find(&self, text: &str, from: usize) -> Option<usize> {
        find_char(text, from, '<')
    }

    fn apply(
        &self,
        text: &str,
        start: usize,
        _cx: &mut InlineContext<'_, '_>,
    ) -> Option<InlineMatch> {
        let caps = AUTOMAIL_RE.captures(&text[start..])?;
        let raw = caps.get(1)?.as_str();
        let email = raw.strip_prefix("mailto:").unwrap_or(raw);
        let element = Element::new("a")
            .with_attr("href", obfuscate(&format!("mailto:{email}")))
            .with_text(obfuscate(email))
            .into_atomic();
        Some(InlineMatch::element(start + caps.get(0)?.end(), element))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{render, render_with};
    use super::*;
    use pretty_assertions::assert_eq;

    const REFS: &[(&str, &str, Option<&str>)] = &[("id", "/u", Some("T")), ("Plain", "/p", None)];

    #[test]
    fn test_inline_link_with_title() {
        assert_eq!(
            render(r#"[text](http://x.com "T")"#),
            r#"<a href="http://x.com" title="T">text</a>"#
        );
    }

    #[test]
    fn test_link_label_is_parsed() {
        assert_eq!(render("[*em*](/u)"), r#"<a href="/u"><em>em</em></a>"#);
    }

    #[test]
    fn test_link_label_with_nested_brackets() {
        assert_eq!(render("[a [b] c](/u)"), r#"<a href="/u">a [b] c</a>"#);
    }

    #[test]
    fn test_link_url_with_parentheses() {
        assert_eq!(
            render("[w](https://en.wikipedia.org/wiki/A_(b))"),
            r#"<a href="https://en.wikipedia.org/wiki/A_(b)">w</a>"#
        );
    }

    #[test]
    fn test_link_angle_url() {
        assert_eq!(render("[a](<has space>)"), r#"<a href="has space">a</a>"#);
    }

    #[test]
    fn test_image() {
        assert_eq!(
            render(r#"![alt \*x\*](/i.png 'pic')"#),
            r#"<img src="/i.png" title="pic" alt="alt *x*" />"#
        );
    }

    #[test]
    fn test_broken_link_is_literal() {
        assert_eq!(render("[a](b"), "[a](b");
    }

    #[test]
    fn test_references() {
        assert_eq!(
            render_with("[x][id] and [id] and ![img][ID]", REFS),
            r#"<a href="/u" title="T">x</a> and <a href="/u" title="T">id</a> and <img src="/u" title="T" alt="img" />"#
        );
    }

    #[test]
    fn test_empty_reference_id_uses_label() {
        assert_eq!(render_with("[plain][]", REFS), r#"<a href="/p">plain</a>"#);
    }

    #[test]
    fn test_undefined_reference_is_literal() {
        assert_eq!(render_with("[x][nope] ![y]", REFS), "[x][nope] ![y]");
    }

    #[test]
    fn test_autolink() {
        assert_eq!(
            render("<http://a.com/?a=1&b=2>"),
            r#"<a href="http://a.com/?a=1&amp;b=2">http://a.com/?a=1&amp;b=2</a>"#
        );
    }

    #[test]
    fn test_automail_obfuscated() {
        let entities = |s: &str| -> String { s.chars().map(|c| format!("&#{};", u32::from(c))).collect() };
        let expected = format!(
            r#"<a href="{}">{}</a>"#,
            entities("mailto:me@x.io"),
            entities("me@x.io")
        );
        assert_eq!(render("<me@x.io>"), expected);
    }

    #[test]
    fn test_matching_bracket_skips_escapes() {
        assert_eq!(matching_bracket(r"[a\]b]", 0), Some(5));
        assert_eq!(matching_bracket("[a", 0), None);
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"a\*b\q"), r"a*b\q");
    }
}
