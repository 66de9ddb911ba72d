//! Block quotes.

use std::sync::LazyLock;

use regex::Regex;

use super::{BlockParser, BlockRule, BlockState, Blocks, single};
use crate::tree::Element;

static QUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\n)[ ]{0,3}>[ ]?(.*)").expect("invalid quote regex"));

static QUOTE_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ ]{0,3}>[ ]?(.*)").expect("invalid quote line regex"));

/// Strip one level of `>` from a line.
fn clean(line: &str) -> &str {
    if line.trim() == ">" {
        return "";
    }
    QUOTE_LINE_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map_or(line, |m| m.as_str())
}

/// `> quoted` lines, parsed recursively inside a `blockquote`.
///
/// A quote directly after another quote continues it. Lines before the first
/// `>` in the block are parsed first, as their own block.
#[derive(Debug, Default)]
pub struct BlockQuoteRule;

impl BlockRule for BlockQuoteRule {
    fn test(&self, _parser: &BlockParser<'_, '_>, _parent: &Element, block: &str) -> bool {
        QUOTE_RE.is_match(block)
    }

    fn run(
        &self,
        parser: &mut BlockParser<'_, '_>,
        parent: &mut Element,
        blocks: &mut Blocks,
    ) -> bool {
        let Some(block) = blocks.pop_front() else {
            return false;
        };
        let Some(found) = QUOTE_RE.find(&block) else {
            blocks.push_front(block);
            return false;
        };

        let before = &block[..found.start()];
        if !before.is_empty() {
            parser.parse_blocks(parent, single(before));
        }
        let quoted = block[found.start()..]
            .split('\n')
            .map(clean)
            .collect::<Vec<_>>()
            .join("\n");

        let quote = if parent.last_child_is(&["blockquote"]) {
            let last = parent.children.len() - 1;
            &mut parent.children[last]
        } else {
            parent.push_new("blockquote")
        };
        parser.state.set(BlockState::BlockQuote);
        parser.parse_chunk(quote, &quoted);
        parser.state.reset();
        true
    }
}
