//! Code spans.

use super::{InlineContext, InlineMatch, InlinePattern};
use crate::tree::Element;
use crate::util::char_before;

/// `` `code` ``: a backtick run closed by a run of the same length.
///
/// The content is trimmed and marked atomic, so nothing inside it is matched.
#[derive(Debug, Default)]
pub struct BacktickPattern;

fn run_len(text: &str, at: usize) -> usize {
    text[at..].bytes().take_while(|&b| b == b'`').count()
}

impl InlinePattern for BacktickPattern {
    fn find(&self, text: &str, from: usize) -> Option<usize> {
        let mut pos = from;
        loop {
            let at = pos + text.get(pos..)?.find('`')?;
            if char_before(text, at) != Some('`') {
                return Some(at);
            }
            pos = at + run_len(text, at);
        }
    }

    fn apply(
        &self,
        text: &str,
        start: usize,
        _cx: &mut InlineContext<'_, '_>,
    ) -> Option<InlineMatch> {
        let len = run_len(text, start);
        let body = start + len;
        let mut pos = body;
        while let Some(offset) = text[pos..].find('`') {
            let at = pos + offset;
            let close_len = run_len(text, at);
            if close_len == len && at > body {
                let content = text[body..at].trim();
                let code = Element::new("code").with_text(content).into_atomic();
                return Some(InlineMatch::element(at + len, code));
            }
            pos = at + close_len;
        }
        None
    }
}
