//! Inline pattern matching.
//!
//! Text runs inside the block tree are scanned left to right. At every step the
//! leftmost candidate across all registered patterns wins; patterns that find a
//! candidate at the same position are tried in priority order. A pattern may
//! decline a candidate, in which case it is asked for its next candidate after
//! that position. Replacement content is never re-scanned unless a pattern
//! calls [`InlineContext::parse`] on it.

mod code;
mod emphasis;
mod links;
mod text;

pub use code::BacktickPattern;
pub use emphasis::{EmphasisPattern, NotStrongPattern};
pub use links::{
    AutolinkPattern, AutomailPattern, ImageLinkPattern, ImageReferencePattern, LinkPattern,
    ReferencePattern, ShortImageReferencePattern, ShortReferencePattern,
};
pub use text::{EntityPattern, EscapePattern, HtmlPattern, LineBreakPattern};

use crate::context::{Context, LinkReference};
use crate::registry::Registry;
use crate::stash::Stash;
use crate::tree::Element;
use crate::util::{normalize_label, next_boundary};

/// A rule that recognizes one inline construct.
pub trait InlinePattern: Send + Sync {
    /// Byte offset of the first candidate at or after `from`.
    ///
    /// Candidates are cheap guesses; [`apply`](Self::apply) makes the final call.
    fn find(&self, text: &str, from: usize) -> Option<usize>;

    /// Try to match at `start`, returning the replacement and the match end.
    ///
    /// Returning `None` declines the candidate.
    fn apply(&self, text: &str, start: usize, cx: &mut InlineContext<'_, '_>)
    -> Option<InlineMatch>;
}

/// Replacement produced by a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineNode {
    /// A new element. Its tail is ignored.
    Element(Element),
    /// Plain text, typically a stash marker.
    Text(String),
}

/// A successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineMatch {
    /// Byte offset just past the matched text.
    pub end: usize,
    /// What replaces the matched text.
    pub node: InlineNode,
}

impl InlineMatch {
    /// Match producing an element.
    #[must_use]
    pub fn element(end: usize, element: Element) -> Self {
        Self {
            end,
            node: InlineNode::Element(element),
        }
    }

    /// Match producing plain text.
    #[must_use]
    pub fn text(end: usize, text: impl Into<String>) -> Self {
        Self {
            end,
            node: InlineNode::Text(text.into()),
        }
    }
}

/// Mixed content: leading text followed by elements carrying their own tails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    /// Text before the first element.
    pub text: Option<String>,
    /// Elements in order.
    pub children: Vec<Element>,
}

impl Fragment {
    /// Fragment holding only `text`.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut fragment = Self::default();
        fragment.push_text(text);
        fragment
    }

    /// Append text after the current content.
    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.children.last_mut() {
            Some(last) => last.append_tail("", text),
            None => match &mut self.text {
                Some(existing) => existing.push_str(text),
                None => self.text = Some(text.to_owned()),
            },
        }
    }

    /// Append an element after the current content.
    pub fn push_element(&mut self, mut element: Element) {
        element.tail = None;
        self.children.push(element);
    }

    /// Append a pattern's replacement.
    pub fn push_node(&mut self, node: InlineNode) {
        match node {
            InlineNode::Element(element) => self.push_element(element),
            InlineNode::Text(text) => self.push_text(&text),
        }
    }

    /// Append another fragment.
    pub fn extend(&mut self, other: Fragment) {
        if let Some(text) = other.text {
            self.push_text(&text);
        }
        self.children.extend(other.children);
    }

    /// Wrap the content in a new `tag` element.
    #[must_use]
    pub fn into_element(self, tag: &str) -> Element {
        let mut element = Element::new(tag);
        element.text = self.text;
        element.children = self.children;
        element
    }
}

/// Matching state handed to patterns.
pub struct InlineContext<'a, 'c> {
    cx: &'c mut Context<'a>,
    depth: usize,
}

impl<'a, 'c> InlineContext<'a, 'c> {
    /// Start matching at depth zero.
    pub fn new(cx: &'c mut Context<'a>) -> Self {
        Self { cx, depth: 0 }
    }

    /// Conversion stash.
    pub fn stash(&mut self) -> &mut Stash {
        &mut self.cx.stash
    }

    /// Link reference defined under `label`.
    #[must_use]
    pub fn reference(&self, label: &str) -> Option<&LinkReference> {
        self.cx.references.get(&normalize_label(label))
    }

    /// Current nesting depth of [`parse`](Self::parse) calls.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Run every pattern over `text`.
    ///
    /// Past the inline depth budget the text comes back unchanged.
    pub fn parse(&mut self, text: &str) -> Fragment {
        if self.depth >= self.cx.settings().max_inline_depth {
            self.cx.note_inline_budget();
            return Fragment::from_text(text);
        }
        self.depth += 1;
        let fragment = self.scan(text);
        self.depth -= 1;
        fragment
    }

    fn scan(&mut self, text: &str) -> Fragment {
        let patterns: Vec<(&str, &dyn InlinePattern)> = self
            .cx
            .patterns()
            .iter()
            .map(|(name, pattern)| (name, pattern.as_ref()))
            .collect();
        // Per pattern: `None` = not searched yet, `Some(None)` = exhausted.
        let mut candidates: Vec<Option<Option<usize>>> = vec![None; patterns.len()];
        let mut fragment = Fragment::default();
        let mut cursor = 0;

        loop {
            let mut best: Option<(usize, usize)> = None;
            for (index, (_, pattern)) in patterns.iter().enumerate() {
                let stale = match candidates[index] {
                    None => true,
                    Some(Some(at)) => at < cursor,
                    Some(None) => false,
                };
                if stale {
                    candidates[index] = Some(find_from(*pattern, text, cursor));
                }
                if let Some(Some(at)) = candidates[index]
                    && best.is_none_or(|(best_at, _)| at < best_at)
                {
                    best = Some((at, index));
                }
            }
            let Some((start, index)) = best else {
                break;
            };

            let (name, pattern) = patterns[index];
            match pattern.apply(text, start, self) {
                Some(found) if found.end > start && found.end <= text.len() => {
                    tracing::trace!(pattern = name, start, end = found.end, "Inline match");
                    fragment.push_text(&text[cursor..start]);
                    fragment.push_node(found.node);
                    cursor = found.end;
                }
                _ => {
                    candidates[index] = Some(find_from(pattern, text, next_boundary(text, start)));
                }
            }
        }

        fragment.push_text(&text[cursor..]);
        fragment
    }
}

fn find_from(pattern: &dyn InlinePattern, text: &str, from: usize) -> Option<usize> {
    if from >= text.len() {
        return None;
    }
    pattern.find(text, from).filter(|&at| at >= from)
}

/// The default inline pattern set.
#[must_use]
pub fn builtin_patterns() -> Registry<Box<dyn InlinePattern>> {
    let mut registry: Registry<Box<dyn InlinePattern>> = Registry::new();
    registry.insert("backtick", Box::new(BacktickPattern), 190.0);
    registry.insert("escape", Box::new(EscapePattern), 180.0);
    registry.insert("reference", Box::new(ReferencePattern), 170.0);
    registry.insert("link", Box::new(LinkPattern), 160.0);
    registry.insert("image_link", Box::new(ImageLinkPattern), 150.0);
    registry.insert("image_reference", Box::new(ImageReferencePattern), 140.0);
    registry.insert("short_reference", Box::new(ShortReferencePattern), 130.0);
    registry.insert("short_image_ref", Box::new(ShortImageReferencePattern), 125.0);
    registry.insert("autolink", Box::new(AutolinkPattern), 120.0);
    registry.insert("automail", Box::new(AutomailPattern), 110.0);
    registry.insert("linebreak", Box::new(LineBreakPattern), 100.0);
    registry.insert("html", Box::new(HtmlPattern), 90.0);
    registry.insert("entity", Box::new(EntityPattern), 80.0);
    registry.insert("not_strong", Box::new(NotStrongPattern), 70.0);
    registry.insert("em_strong", Box::new(EmphasisPattern::asterisk()), 60.0);
    registry.insert("em_strong2", Box::new(EmphasisPattern::underscore()), 50.0);
    registry
}

/// Byte offset of the first occurrence of `needle` at or after `from`.
pub(crate) fn find_char(text: &str, from: usize, needle: char) -> Option<usize> {
    text.get(from..)?.find(needle).map(|at| from + at)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::context::Settings;
    use crate::postprocessors::{AmpSubstitutePostprocessor, Postprocessor, UnstashPostprocessor};
    use crate::serializer::serialize;

    /// Parse `text` with the built-in patterns and render the result as a string.
    pub(crate) fn render(text: &str) -> String {
        render_with(text, &[])
    }

    /// Like [`render`], with link references defined.
    pub(crate) fn render_with(text: &str, refs: &[(&str, &str, Option<&str>)]) -> String {
        let settings = Settings::default();
        let patterns = builtin_patterns();
        let mut cx = Context::new(&settings, &patterns);
        for (label, url, title) in refs {
            cx.references.insert(
                normalize_label(label),
                LinkReference {
                    url: (*url).to_owned(),
                    title: title.map(str::to_owned),
                },
            );
        }
        let fragment = InlineContext::new(&mut cx).parse(text);
        let html = serialize(&fragment.into_element("div"), settings.output_format);
        let html = AmpSubstitutePostprocessor.run(&html, &mut cx);
        UnstashPostprocessor.run(&html, &mut cx)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::render;
    use super::*;
    use crate::context::Settings;
    use pretty_assertions::assert_eq;

    /// Matches `x` and declines `y`.
    struct Letter;

    impl InlinePattern for Letter {
        fn find(&self, text: &str, from: usize) -> Option<usize> {
            text[from..].find(['x', 'y']).map(|at| from + at)
        }

        fn apply(
            &self,
            text: &str,
            start: usize,
            _cx: &mut InlineContext<'_, '_>,
        ) -> Option<InlineMatch> {
            text[start..]
                .starts_with('x')
                .then(|| InlineMatch::element(start + 1, Element::new("b")))
        }
    }

    #[test]
    fn test_fragment_text_goes_to_last_tail() {
        let mut fragment = Fragment::from_text("a");
        fragment.push_element(Element::new("em").with_tail("dropped"));
        fragment.push_text("b");
        fragment.push_text("c");
        assert_eq!(fragment.text.as_deref(), Some("a"));
        assert_eq!(fragment.children[0].tail.as_deref(), Some("bc"));
    }

    #[test]
    fn test_declined_candidate_moves_on() {
        let settings = Settings::default();
        let mut patterns: Registry<Box<dyn InlinePattern>> = Registry::new();
        patterns.insert("letter", Box::new(Letter), 1.0);
        let mut cx = Context::new(&settings, &patterns);

        let fragment = InlineContext::new(&mut cx).parse("aybxc");

        assert_eq!(fragment.text.as_deref(), Some("ayb"));
        assert_eq!(fragment.children.len(), 1);
        assert_eq!(fragment.children[0].tail.as_deref(), Some("c"));
    }

    #[test]
    fn test_no_patterns_returns_text() {
        let settings = Settings::default();
        let patterns = Registry::new();
        let mut cx = Context::new(&settings, &patterns);
        let fragment = InlineContext::new(&mut cx).parse("plain");
        assert_eq!(fragment, Fragment::from_text("plain"));
    }

    #[test]
    fn test_depth_budget_keeps_literal_text() {
        let settings = Settings {
            max_inline_depth: 2,
            ..Settings::default()
        };
        let patterns = builtin_patterns();
        let mut cx = Context::new(&settings, &patterns);

        let fragment = InlineContext::new(&mut cx).parse("*a **b *c* b** a*");
        let em = &fragment.children[0];
        let strong = &em.children[0];

        assert_eq!(em.tag, "em");
        assert_eq!(strong.tag, "strong");
        assert_eq!(strong.text.as_deref(), Some("b *c* b"));
        assert!(strong.children.is_empty());
    }

    #[test]
    fn test_leftmost_match_wins() {
        assert_eq!(render("a `*b*` *c*"), "a <code>*b*</code> <em>c</em>");
    }

    #[test]
    fn test_escape_outranks_emphasis() {
        assert_eq!(render(r"\*not emphasis\*"), "*not emphasis*");
    }

    #[test]
    fn test_sibling_emphasis() {
        assert_eq!(render("*a* *b*"), "<em>a</em> <em>b</em>");
    }

    #[test]
    fn test_builtin_priority_order() {
        let patterns = builtin_patterns();
        let names: Vec<_> = patterns.names().collect();
        assert_eq!(names.first(), Some(&"backtick"));
        assert_eq!(names.last(), Some(&"em_strong2"));
        assert_eq!(patterns.len(), 16);
    }
}
