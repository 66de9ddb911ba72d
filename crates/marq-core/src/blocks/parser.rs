//! Block builder: turns the document into a tree of block elements.

use std::collections::VecDeque;

use super::BlockRule;
use crate::context::{Context, Settings};
use crate::registry::Registry;
use crate::tree::Element;

/// Pending blocks; the front is the block being matched.
pub type Blocks = VecDeque<String>;

/// Build a queue holding one block.
#[must_use]
pub fn single(block: impl Into<String>) -> Blocks {
    VecDeque::from([block.into()])
}

/// Parser states rules push while recursing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// Inside a tight list item: text attaches to the item.
    List,
    /// Inside the first block of a loose list item.
    LooseList,
    /// Content was already detabbed by the indent rule.
    Detabbed,
    /// Inside a block quote.
    BlockQuote,
    /// State owned by an extension rule.
    Custom(&'static str),
}

/// Stack of [`BlockState`]s.
#[derive(Debug, Default)]
pub struct BuilderState {
    stack: Vec<BlockState>,
}

impl BuilderState {
    /// Enter `state`.
    pub fn set(&mut self, state: BlockState) {
        self.stack.push(state);
    }

    /// Leave the current state.
    pub fn reset(&mut self) {
        self.stack.pop();
    }

    /// Whether the innermost state is `state`.
    #[must_use]
    pub fn is_state(&self, state: BlockState) -> bool {
        self.stack.last() == Some(&state)
    }

    /// Number of active states.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Whether no state is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

/// Runs block rules over blocks of text.
///
/// A document is split into blocks on blank lines. For the front block, rules
/// are tried in priority order; the first whose `test` accepts it and whose
/// `run` does not decline consumes it. Rules recurse through
/// [`parse_chunk`](Self::parse_chunk) and [`parse_blocks`](Self::parse_blocks)
/// to fill nested containers.
pub struct BlockParser<'p, 'a> {
    rules: &'a Registry<Box<dyn BlockRule>>,
    cx: &'p mut Context<'a>,
    /// Active parser states.
    pub state: BuilderState,
    depth: usize,
}

impl<'p, 'a> BlockParser<'p, 'a> {
    /// Create a parser using `rules`.
    pub fn new(rules: &'a Registry<Box<dyn BlockRule>>, cx: &'p mut Context<'a>) -> Self {
        Self {
            rules,
            cx,
            state: BuilderState::default(),
            depth: 0,
        }
    }

    /// Converter settings.
    #[must_use]
    pub fn settings(&self) -> &'a Settings {
        self.cx.settings()
    }

    /// Conversion context.
    pub fn context(&mut self) -> &mut Context<'a> {
        &mut *self.cx
    }

    /// Build the root element for a whole document.
    pub fn parse_document(&mut self, lines: &[String]) -> Element {
        let mut root = Element::new(self.settings().root_tag.as_str());
        self.parse_chunk(&mut root, &lines.join("\n"));
        root
    }

    /// Split `text` on blank lines and parse the blocks into `parent`.
    pub fn parse_chunk(&mut self, parent: &mut Element, text: &str) {
        let blocks = text.split("\n\n").map(str::to_owned).collect();
        self.parse_blocks(parent, blocks);
    }

    /// Parse `blocks` into `parent` until none remain.
    pub fn parse_blocks(&mut self, parent: &mut Element, mut blocks: Blocks) {
        if self.depth >= self.settings().max_nesting_depth {
            self.cx.note_nesting_budget();
            for block in blocks {
                if !block.trim().is_empty() {
                    parent.push_new("p").text = Some(block.trim_start().to_owned());
                }
            }
            return;
        }

        self.depth += 1;
        let rules = self.rules;
        while let Some(front) = blocks.front() {
            let front = front.clone();
            let pending = blocks.len();
            let handled = rules.iter().any(|(name, rule)| {
                if !rule.test(self, parent, &front) {
                    return false;
                }
                let accepted = rule.run(self, parent, &mut blocks);
                if accepted {
                    tracing::trace!(rule = name, "Block rule matched");
                }
                accepted
            });
            let unchanged = blocks.len() == pending && blocks.front() == Some(&front);
            if handled && unchanged {
                tracing::warn!(block = %front, "Block rule accepted a block without consuming it");
            }
            if unchanged {
                blocks.pop_front();
                if !front.trim().is_empty() {
                    parent.push_new("p").text = Some(front.trim_start().to_owned());
                }
            }
        }
        self.depth -= 1;
    }
}
