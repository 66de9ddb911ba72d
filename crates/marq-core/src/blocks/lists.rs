//! Ordered and unordered lists, and indented list continuations.

use std::sync::LazyLock;

use regex::Regex;

use super::{BlockParser, BlockRule, BlockState, Blocks, LIST_TAGS, single};
use crate::tree::Element;
use crate::util::loose_detab;

/// Leading spaces of `line`.
fn indent_width(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// Whether `element` carries non-empty text.
fn has_text(element: &Element) -> bool {
    element.text.as_deref().is_some_and(|t| !t.is_empty())
}

/// Move the text of `item` into a leading paragraph.
fn wrap_item_text(item: &mut Element) {
    if let Some(text) = item.text.take().filter(|t| !t.is_empty()) {
        item.children.insert(0, Element::new("p").with_text(text));
    }
}

/// Follow child indices from `root`.
fn descend<'e>(root: &'e mut Element, path: &[usize]) -> &'e mut Element {
    path.iter()
        .fold(root, |node, &index| &mut node.children[index])
}

/// Blocks indented under a list item: nested lists and further paragraphs.
#[derive(Debug, Default)]
pub struct ListIndentRule;

impl ListIndentRule {
    /// Indentation level the block belongs to and the path to its container.
    fn level(parser: &BlockParser<'_, '_>, parent: &Element, block: &str) -> (usize, Vec<usize>) {
        let tab = parser.settings().tab_length;
        let indent_level = indent_width(block) / tab;
        let mut level = usize::from(parser.state.is_state(BlockState::List));
        let mut path = Vec::new();
        let mut node = parent;
        while indent_level > level {
            let Some(child) = node.last_child() else {
                break;
            };
            let is_list = LIST_TAGS.contains(&child.tag.as_str());
            if !is_list && child.tag != "li" {
                break;
            }
            if is_list {
                level += 1;
            }
            path.push(node.children.len() - 1);
            node = child;
        }
        (level, path)
    }
}

impl BlockRule for ListIndentRule {
    fn test(&self, parser: &BlockParser<'_, '_>, parent: &Element, block: &str) -> bool {
        block.starts_with(&" ".repeat(parser.settings().tab_length))
            && !parser.state.is_state(BlockState::Detabbed)
            && (parent.tag == "li" || parent.last_child_is(LIST_TAGS))
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
        let (level, path) = Self::level(parser, parent, &block);
        let block = loose_detab(&block, parser.settings().tab_length, level);

        parser.state.set(BlockState::Detabbed);
        if parent.tag == "li" {
            if parent.last_child_is(LIST_TAGS) {
                let last = parent.children.len() - 1;
                parser.parse_blocks(&mut parent.children[last], single(block));
            } else {
                parser.parse_blocks(parent, single(block));
            }
        } else {
            let sibling = descend(parent, &path);
            if sibling.tag == "li" {
                parser.parse_blocks(sibling, single(block));
            } else if sibling.last_child_is(&["li"]) {
                let last = sibling.children.len() - 1;
                let item = &mut sibling.children[last];
                wrap_item_text(item);
                parser.parse_chunk(item, &block);
            } else {
                let item = sibling.push_new("li");
                parser.parse_blocks(item, single(block));
            }
        }
        parser.state.reset();
        true
    }
}

static ORDERED_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^( *)\d+\.[ ]+(.*)").expect("invalid ordered list regex"));

static UNORDERED_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^( *)[*+-][ ]+(.*)").expect("invalid unordered list regex"));

static CHILD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^( *)((\d+)\.|[*+-])[ ]+(.*)").expect("invalid list item regex")
});

static NESTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^( +)(?:\d+\.|[*+-])[ ]+").expect("invalid nested item regex"));

/// `1.` ordered lists or `*`/`+`/`-` unordered lists.
///
/// Item markers may be indented by less than one tab stop. Items of an
/// existing list that follow a blank line make the list loose.
#[derive(Debug)]
pub struct ListRule {
    tag: &'static str,
    start: &'static LazyLock<Regex>,
}

impl ListRule {
    /// Rule for `1.` lists.
    #[must_use]
    pub fn ordered() -> Self {
        Self {
            tag: "ol",
            start: &ORDERED_START_RE,
        }
    }

    /// Rule for `*`, `+` and `-` lists.
    #[must_use]
    pub fn unordered() -> Self {
        Self {
            tag: "ul",
            start: &UNORDERED_START_RE,
        }
    }

    fn starts_item(&self, line: &str, tab: usize) -> bool {
        self.start
            .captures(line)
            .and_then(|caps| caps.get(1))
            .is_some_and(|indent| indent.len() < tab)
    }

    /// Split a block into item texts, plus the number of the first item.
    fn items(&self, block: &str, tab: usize) -> (Vec<String>, Option<String>) {
        let mut items: Vec<String> = Vec::new();
        let mut start = None;
        let indent = " ".repeat(tab);
        for line in block.split('\n') {
            let child = CHILD_RE
                .captures(line)
                .filter(|caps| caps.get(1).is_some_and(|m| m.len() < tab));
            if let Some(caps) = child {
                if items.is_empty() && self.tag == "ol" {
                    start = caps.get(3).map(|m| m.as_str().to_owned());
                }
                items.push(caps.get(4).map_or("", |m| m.as_str()).to_owned());
                continue;
            }
            let nested = NESTED_RE
                .captures(line)
                .and_then(|caps| caps.get(1))
                .is_some_and(|m| (tab..tab * 2).contains(&m.len()));
            match items.last_mut() {
                Some(last) if !nested || last.starts_with(&indent) => {
                    last.push('\n');
                    last.push_str(line);
                }
                _ => items.push(line.to_owned()),
            }
        }
        (items, start)
    }
}

impl BlockRule for ListRule {
    fn test(&self, parser: &BlockParser<'_, '_>, _parent: &Element, block: &str) -> bool {
        self.starts_item(block, parser.settings().tab_length)
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
        let settings = parser.settings();
        let tab = settings.tab_length;
        let (items, start) = self.items(&block, tab);
        let mut items = items.into_iter();

        let list: &mut Element = if parent.last_child_is(LIST_TAGS) {
            let last = parent.children.len() - 1;
            let list = &mut parent.children[last];
            // Joining an existing list makes it loose.
            if let Some(item) = list.last_child_mut() {
                if has_text(item) {
                    wrap_item_text(item);
                }
                let dangling = item
                    .last_child_mut()
                    .and_then(|child| child.tail.take())
                    .filter(|tail| !tail.is_empty());
                if let Some(tail) = dangling {
                    item.push_new("p").text = Some(tail.trim_start().to_owned());
                }
            }
            if let Some(first) = items.next() {
                let item = list.push_new("li");
                parser.state.set(BlockState::LooseList);
                parser.parse_blocks(item, single(first));
                parser.state.reset();
            }
            list
        } else if LIST_TAGS.contains(&parent.tag.as_str()) {
            parent
        } else {
            let list = parent.push_new(self.tag);
            if !settings.lazy_ol
                && let Some(start) = start.filter(|s| s != "1")
            {
                list.attrs.set("start", start);
            }
            list
        };

        parser.state.set(BlockState::List);
        let indent = " ".repeat(tab);
        for item in items {
            if item.starts_with(&indent)
                && let Some(last) = list.last_child_mut()
            {
                parser.parse_blocks(last, single(item));
            } else {
                let li = list.push_new("li");
                parser.parse_blocks(li, single(item));
            }
        }
        parser.state.reset();
        true
    }
}
