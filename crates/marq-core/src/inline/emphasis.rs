//! Emphasis and strong emphasis.
//!
//! Delimiter runs are matched by scanning rather than by regex: a run of one to
//! three delimiters opens when followed by non-whitespace and closes at the
//! first run of the wanted length that is not preceded by whitespace. Nested
//! spans are skipped while scanning, so `*a *b* c*` closes at the last `*`.

use std::collections::HashMap;

use super::{Fragment, InlineContext, InlineMatch, InlinePattern};
use crate::util::{char_at, char_before};

/// Nested spans skipped while looking for a closer before giving up.
const MAX_SKIP_DEPTH: usize = 32;

/// Whether the character at `at` is preceded by an odd number of backslashes.
fn is_escaped(text: &str, at: usize) -> bool {
    text[..at].bytes().rev().take_while(|&b| b == b'\\').count() % 2 == 1
}

/// `*em*`, `**strong**` and `***combined***` for one delimiter character.
#[derive(Debug, Clone, Copy)]
pub struct EmphasisPattern {
    delimiter: char,
}

impl EmphasisPattern {
    /// Pattern for `*`.
    #[must_use]
    pub fn asterisk() -> Self {
        Self { delimiter: '*' }
    }

    /// Pattern for `_`, which never opens or closes inside a word.
    #[must_use]
    pub fn underscore() -> Self {
        Self { delimiter: '_' }
    }

    fn word_bound(self) -> bool {
        self.delimiter == '_'
    }

    fn run_len(self, text: &str, at: usize) -> usize {
        text[at..].chars().take_while(|&c| c == self.delimiter).count()
    }

    fn can_open(self, text: &str, at: usize, len: usize) -> bool {
        let next_ok = char_at(text, at + len).is_some_and(|c| !c.is_whitespace());
        let prev_ok =
            !self.word_bound() || char_before(text, at).is_none_or(|c| !c.is_alphanumeric());
        next_ok && prev_ok
    }

    fn can_close(self, text: &str, at: usize, len: usize) -> bool {
        let prev_ok = char_before(text, at).is_some_and(|c| !c.is_whitespace());
        let next_ok =
            !self.word_bound() || char_at(text, at + len).is_none_or(|c| !c.is_alphanumeric());
        prev_ok && next_ok
    }

    /// First closing run after `from` whose length satisfies `wanted`.
    fn find_closer(self, text: &str, from: usize, wanted: &dyn Fn(usize) -> bool) -> Option<usize> {
        self.scan_closer(text, from, wanted, 0, &mut HashMap::new())
    }

    /// Closer scan. Backslash-escaped delimiters are skipped. Nested spans
    /// are skipped too; the closer of each nested opener is looked up once
    /// and kept in `nested`, keyed by opener offset and run length.
    fn scan_closer(
        self,
        text: &str,
        from: usize,
        wanted: &dyn Fn(usize) -> bool,
        depth: usize,
        nested: &mut HashMap<(usize, usize), Option<usize>>,
    ) -> Option<usize> {
        let mut pos = from;
        while let Some(offset) = text.get(pos..)?.find(self.delimiter) {
            let at = pos + offset;
            if is_escaped(text, at) {
                pos = at + 1;
                continue;
            }
            let len = self.run_len(text, at);
            let closes = at > from && self.can_close(text, at, len);
            if closes && wanted(len) {
                return Some(at);
            }
            pos = at + len;
            if !closes && depth < MAX_SKIP_DEPTH && self.can_open(text, at, len) {
                let end = match nested.get(&(at, len)) {
                    Some(end) => *end,
                    None => {
                        let end =
                            self.scan_closer(text, at + len, &|l| l == len, depth + 1, nested);
                        nested.insert((at, len), end);
                        end
                    }
                };
                if let Some(end) = end {
                    pos = end + len;
                }
            }
        }
        None
    }

    fn wrap(tag: &str, fragment: Fragment) -> Fragment {
        let mut outer = Fragment::default();
        outer.push_element(fragment.into_element(tag));
        outer
    }

    fn triple(
        self,
        text: &str,
        body: usize,
        cx: &mut InlineContext<'_, '_>,
    ) -> Option<InlineMatch> {
        let first = self.find_closer(text, body, &|l| (1..=3).contains(&l))?;
        let inner = &text[body..first];
        match self.run_len(text, first) {
            3 => {
                let em = Self::wrap("em", cx.parse(inner));
                Some(InlineMatch::element(first + 3, em.into_element("strong")))
            }
            1 => {
                let rest = first + 1;
                let second = self.find_closer(text, rest, &|l| l == 2)?;
                let mut content = Self::wrap("em", cx.parse(inner));
                content.extend(cx.parse(&text[rest..second]));
                Some(InlineMatch::element(second + 2, content.into_element("strong")))
            }
            _ => {
                let rest = first + 2;
                let second = self.find_closer(text, rest, &|l| l == 1)?;
                let mut content = Self::wrap("strong", cx.parse(inner));
                content.extend(cx.parse(&text[rest..second]));
                Some(InlineMatch::element(second + 1, content.into_element("em")))
            }
        }
    }
}

impl InlinePattern for EmphasisPattern {
    fn find(&self, text: &str, from: usize) -> Option<usize> {
        let mut pos = from;
        loop {
            let at = pos + text.get(pos..)?.find(self.delimiter)?;
            let bounded =
                !self.word_bound() || char_before(text, at).is_none_or(|c| !c.is_alphanumeric());
            if bounded && !is_escaped(text, at) {
                return Some(at);
            }
            pos = at + 1;
        }
    }

    fn apply(
        &self,
        text: &str,
        start: usize,
        cx: &mut InlineContext<'_, '_>,
    ) -> Option<InlineMatch> {
        let len = self.run_len(text, start);
        if !(1..=3).contains(&len) || !self.can_open(text, start, len) {
            return None;
        }
        let body = start + len;
        if len == 3 {
            return self.triple(text, body, cx);
        }
        let close = self.find_closer(text, body, &|l| l == len)?;
        let tag = if len == 1 { "em" } else { "strong" };
        let element = cx.parse(&text[body..close]).into_element(tag);
        Some(InlineMatch::element(close + len, element))
    }
}

/// Keeps a lone run of one to three `*` or `_` between whitespace literal.
#[derive(Debug, Default)]
pub struct NotStrongPattern;

impl NotStrongPattern {
    fn lone_run(text: &str, at: usize) -> Option<usize> {
        let delimiter = char_at(text, at).filter(|c| matches!(c, '*' | '_'))?;
        if char_before(text, at).is_some_and(|c| !c.is_whitespace()) {
            return None;
        }
        let len = text[at..].chars().take_while(|&c| c == delimiter).count();
        let after_ok = char_at(text, at + len).is_none_or(char::is_whitespace);
        ((1..=3).contains(&len) && after_ok).then_some(len)
    }
}

impl InlinePattern for NotStrongPattern {
    fn find(&self, text: &str, from: usize) -> Option<usize> {
        text[from..]
            .char_indices()
            .map(|(offset, _)| from + offset)
            .find(|&at| Self::lone_run(text, at).is_some())
    }

    fn apply(
        &self,
        text: &str,
        start: usize,
        _cx: &mut InlineContext<'_, '_>,
    ) -> Option<InlineMatch> {
        let len = Self::lone_run(text, start)?;
        Some(InlineMatch::text(start + len, &text[start..start + len]))
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::super::test_support::render;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_em_and_strong() {
        assert_eq!(render("*em* and **strong**"), "<em>em</em> and <strong>strong</strong>");
    }

    #[test]
    fn test_triple_run() {
        assert_eq!(render("***both***"), "<strong><em>both</em></strong>");
    }

    #[test]
    fn test_triple_em_closes_first() {
        assert_eq!(render("***a* b**"), "<strong><em>a</em> b</strong>");
    }

    #[test]
    fn test_triple_strong_closes_first() {
        assert_eq!(render("***a** b*"), "<em><strong>a</strong> b</em>");
    }

    #[test]
    fn test_nested_strong_inside_em() {
        assert_eq!(
            render("*a **b** c*"),
            "<em>a <strong>b</strong> c</em>"
        );
    }

    #[test]
    fn test_nested_em_skipped_when_closing() {
        assert_eq!(render("*a *b* c*"), "<em>a <em>b</em> c</em>");
    }

    #[test]
    fn test_unbalanced_run_keeps_extra_delimiter() {
        assert_eq!(render("**a*"), "*<em>a</em>");
    }

    #[test]
    fn test_opener_followed_by_space() {
        assert_eq!(render("a * b *"), "a * b *");
    }

    #[test]
    fn test_underscore_emphasis() {
        assert_eq!(render("_a_ and __b__"), "<em>a</em> and <strong>b</strong>");
    }

    #[test]
    fn test_underscore_inside_words() {
        assert_eq!(render("snake_case_name"), "snake_case_name");
        assert_eq!(render("_snake_case_"), "<em>snake_case</em>");
    }

    #[test]
    fn test_mixed_delimiters() {
        assert_eq!(render("**bold _it_**"), "<strong>bold <em>it</em></strong>");
    }

    #[test]
    fn test_long_run_is_literal() {
        assert_eq!(render("****"), "****");
    }

    #[test]
    fn test_lone_runs_stay_literal() {
        assert_eq!(render("a ** b __ c"), "a ** b __ c");
    }

    #[test]
    fn test_escaped_delimiter_does_not_close() {
        assert_eq!(render(r"*a\*b*"), "<em>a*b</em>");
        assert_eq!(render(r"**a\**b**"), "<strong>a**b</strong>");
    }

    #[test]
    fn test_escaped_delimiter_does_not_open() {
        assert_eq!(render(r"\*a*"), "*a*");
        assert_eq!(render(r"\\*a*"), r"\<em>a</em>");
    }

    #[test]
    fn test_many_unclosed_openers_stay_literal() {
        let text = "*a ".repeat(400);
        let started = Instant::now();
        assert_eq!(render(&text), text.trim_end());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
