//! Link reference definitions and the paragraph catch-all.

use std::sync::LazyLock;

use regex::Regex;

use super::{BlockParser, BlockRule, BlockState, Blocks};
use crate::context::LinkReference;
use crate::tree::Element;
use crate::util::normalize_label;

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^[ ]{0,3}\[([^\[\]]*)\]:[ ]*\n?[ ]*(\S+)[ ]*(?:\n[ ]*)?(?:"(.*)"[ ]*|'(.*)'[ ]*|\((.*)\)[ ]*)?$"#,
    )
    .expect("invalid reference regex")
});

/// `[id]: url "title"` lines, collected into the conversion's reference table.
///
/// Any other content in the block is put back as separate blocks.
#[derive(Debug, Default)]
pub struct ReferenceRule;

impl BlockRule for ReferenceRule {
    fn test(&self, _parser: &BlockParser<'_, '_>, _parent: &Element, block: &str) -> bool {
        block.contains("]:")
    }

    fn run(
        &self,
        parser: &mut BlockParser<'_, '_>,
        _parent: &mut Element,
        blocks: &mut Blocks,
    ) -> bool {
        let Some(block) = blocks.pop_front() else {
            return false;
        };
        let Some(caps) = REFERENCE_RE.captures(&block) else {
            blocks.push_front(block);
            return false;
        };
        let (Some(whole), Some(label), Some(url)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            blocks.push_front(block);
            return false;
        };

        let url = url.as_str();
        let url = url.strip_prefix('<').unwrap_or(url);
        let url = url.strip_suffix('>').unwrap_or(url);
        let title = caps
            .get(3)
            .or_else(|| caps.get(4))
            .or_else(|| caps.get(5))
            .map(|m| m.as_str().to_owned());
        let id = normalize_label(label.as_str());
        tracing::trace!(id = %id, "Link reference defined");
        parser.context().references.insert(
            id,
            LinkReference {
                url: url.to_owned(),
                title,
            },
        );

        let after = &block[whole.end()..];
        if !after.trim().is_empty() {
            blocks.push_front(after.trim_start_matches('\n').to_owned());
        }
        let before = &block[..whole.start()];
        if !before.trim().is_empty() {
            blocks.push_front(before.trim_end_matches('\n').to_owned());
        }
        true
    }
}

/// Catch-all: anything left becomes a paragraph.
///
/// Inside a tight list item the text attaches to the item itself, or to the
/// tail of its last child.
#[derive(Debug, Default)]
pub struct ParagraphRule;

impl BlockRule for ParagraphRule {
    fn test(&self, _parser: &BlockParser<'_, '_>, _parent: &Element, _block: &str) -> bool {
        true
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
        if block.trim().is_empty() {
            return true;
        }
        if !parser.state.is_state(BlockState::List) {
            parent.push_new("p").text = Some(block.trim_start().to_owned());
            return true;
        }

        match parent.last_child_mut() {
            Some(sibling) => match &mut sibling.tail {
                Some(tail) if !tail.is_empty() => {
                    tail.push('\n');
                    tail.push_str(&block);
                }
                _ => sibling.tail = Some(format!("\n{block}")),
            },
            None => match &mut parent.text {
                Some(text) if !text.is_empty() => {
                    text.push('\n');
                    text.push_str(&block);
                }
                _ => parent.text = Some(block.trim_start().to_owned()),
            },
        }
        true
    }
}
