//! Headings and thematic breaks.

use std::sync::LazyLock;

use regex::Regex;

use super::{BlockParser, BlockRule, Blocks, single};
use crate::tree::Element;

static HASH_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\n)(#{1,6})((?:\\.|[^\\\n])*?)#*(?:\n|$)").expect("invalid header regex")
});

static SETEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\n]*\n[=-]+[ ]*(?:\n|$)").expect("invalid setext regex"));

/// `# Heading` through `###### Heading`, anywhere in a block.
///
/// Lines before the heading are parsed first; lines after it go back into the
/// queue.
#[derive(Debug, Default)]
pub struct HashHeaderRule;

impl BlockRule for HashHeaderRule {
    fn test(&self, _parser: &BlockParser<'_, '_>, _parent: &Element, block: &str) -> bool {
        HASH_HEADER_RE.is_match(block)
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
        let Some(caps) = HASH_HEADER_RE.captures(&block) else {
            blocks.push_front(block);
            return false;
        };
        let (Some(whole), Some(level), Some(title)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            blocks.push_front(block);
            return false;
        };

        let before = &block[..whole.start()];
        if !before.is_empty() {
            parser.parse_blocks(parent, single(before));
        }
        parent.push_new(format!("h{}", level.len())).text = Some(title.as_str().trim().to_owned());
        let after = &block[whole.end()..];
        if !after.is_empty() {
            blocks.push_front(after.to_owned());
        }
        true
    }
}

/// A line underlined with `=` (level 1) or `-` (level 2).
#[derive(Debug, Default)]
pub struct SetextHeaderRule;

impl BlockRule for SetextHeaderRule {
    fn test(&self, _parser: &BlockParser<'_, '_>, _parent: &Element, block: &str) -> bool {
        SETEXT_RE.is_match(block)
    }

    fn run(
        &self,
        _parser: &mut BlockParser<'_, '_>,
        parent: &mut Element,
        blocks: &mut Blocks,
    ) -> bool {
        let Some(block) = blocks.pop_front() else {
            return false;
        };
        let lines: Vec<&str> = block.split('\n').collect();
        let level = if lines[1].starts_with('=') { 1 } else { 2 };
        parent.push_new(format!("h{level}")).text = Some(lines[0].trim().to_owned());
        if lines.len() > 2 {
            blocks.push_front(lines[2..].join("\n"));
        }
        true
    }
}

/// Whether `line` is a thematic break: three or more `-`, `_` or `*`, at most
/// two spaces apart, indented by at most three spaces.
fn is_rule_line(line: &str) -> bool {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return false;
    }
    let body = line[indent..].trim_end_matches(' ');
    let Some(marker) = body.chars().next().filter(|c| matches!(c, '-' | '_' | '*')) else {
        return false;
    };
    let mut count = 0;
    let mut gap = 0;
    for ch in body.chars() {
        if ch == marker {
            count += 1;
            gap = 0;
        } else if ch == ' ' && gap < 2 {
            gap += 1;
        } else {
            return false;
        }
    }
    count >= 3
}

/// Thematic breaks, splitting the surrounding block.
#[derive(Debug, Default)]
pub struct HorizontalRuleRule;

impl BlockRule for HorizontalRuleRule {
    fn test(&self, _parser: &BlockParser<'_, '_>, _parent: &Element, block: &str) -> bool {
        block.split('\n').any(is_rule_line)
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
        let lines: Vec<&str> = block.split('\n').collect();
        let Some(index) = lines.iter().position(|l| is_rule_line(l)) else {
            blocks.push_front(block);
            return false;
        };

        let before = lines[..index].join("\n");
        let before = before.trim_end_matches('\n');
        if !before.is_empty() {
            parser.parse_blocks(parent, single(before));
        }
        parent.push_new("hr");
        let after = lines[index + 1..].join("\n");
        let after = after.trim_start_matches('\n');
        if !after.is_empty() {
            blocks.push_front(after.to_owned());
        }
        true
    }
}
