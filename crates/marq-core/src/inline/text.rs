//! Escapes, entities, inline HTML and hard line breaks.

use std::sync::LazyLock;

use regex::Regex;

use super::{InlineContext, InlineMatch, InlinePattern, find_char};
use crate::tree::Element;
use crate::util::escape_html;

/// Characters a backslash makes literal.
pub const ESCAPED_CHARS: &[char] = &[
    '\\', '`', '*', '_', '{', '}', '[', ']', '(', ')', '>', '#', '+', '-', '.', '!',
];

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^&(?:#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z0-9]+);").expect("invalid entity regex")
});

static HTML_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<(?:/?[a-zA-Z][^<>@ ]*(?: [^<>]*)?|!--[\s\S]*?--)>").expect("invalid html regex")
});

static LINE_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {2,}\n").expect("invalid line break regex"));

/// `\*` and friends: the character is stashed so no later pattern sees it.
#[derive(Debug, Default)]
pub struct EscapePattern;

impl InlinePattern for EscapePattern {
    fn find(&self, text: &str, from: usize) -> Option<usize> {
        find_char(text, from, '\\')
    }

    fn apply(
        &self,
        text: &str,
        start: usize,
        cx: &mut InlineContext<'_, '_>,
    ) -> Option<InlineMatch> {
        let escaped = text[start + 1..].chars().next()?;
        if !ESCAPED_CHARS.contains(&escaped) {
            return None;
        }
        let marker = cx.stash().store(escape_html(&escaped.to_string()));
        Some(InlineMatch::text(start + 1 + escaped.len_utf8(), marker))
    }
}

/// Named and numeric character references, passed through untouched.
#[derive(Debug, Default)]
pub struct EntityPattern;

impl InlinePattern for EntityPattern {
    fn find(&self, text: &str, from: usize) -> Option<usize> {
        find_char(text, from, '&')
    }

    fn apply(
        &self,
        text: &str,
        start: usize,
        cx: &mut InlineContext<'_, '_>,
    ) -> Option<InlineMatch> {
        let found = ENTITY_RE.find(&text[start..])?;
        let marker = cx.stash().store(found.as_str());
        Some(InlineMatch::text(start + found.end(), marker))
    }
}

/// Inline HTML tags and comments, passed through untouched.
#[derive(Debug, Default)]
pub struct HtmlPattern;

impl InlinePattern for HtmlPattern {
    fn find(&self, text: &str, from: usize) -> Option<usize> {
        find_char(text, from, '<')
    }

    fn apply(
        &self,
        text: &str,
        start: usize,
        cx: &mut InlineContext<'_, '_>,
    ) -> Option<InlineMatch> {
        let found = HTML_RE.find(&text[start..])?;
        let marker = cx.stash().store(found.as_str());
        Some(InlineMatch::text(start + found.end(), marker))
    }
}

/// Two or more spaces before a newline.
#[derive(Debug, Default)]
pub struct LineBreakPattern;

impl InlinePattern for LineBreakPattern {
    fn find(&self, text: &str, from: usize) -> Option<usize> {
        LINE_BREAK_RE.find_at(text, from).map(|m| m.start())
    }

    fn apply(
        &self,
        text: &str,
        start: usize,
        _cx: &mut InlineContext<'_, '_>,
    ) -> Option<InlineMatch> {
        let found = LINE_BREAK_RE.find(&text[start..]).filter(|m| m.start() == 0)?;
        Some(InlineMatch::element(start + found.end(), Element::new("br")))
    }
}
