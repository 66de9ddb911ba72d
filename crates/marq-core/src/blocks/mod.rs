//! Block rules and the parser that drives them.

mod code;
mod headers;
mod lists;
mod paragraph;
mod parser;
mod quote;

pub use code::{CodeBlockRule, EmptyBlockRule};
pub use headers::{HashHeaderRule, HorizontalRuleRule, SetextHeaderRule};
pub use lists::{ListIndentRule, ListRule};
pub use paragraph::{ParagraphRule, ReferenceRule};
pub use parser::{BlockParser, BlockState, Blocks, BuilderState, single};
pub use quote::BlockQuoteRule;

use crate::registry::Registry;
use crate::tree::Element;

/// A rule that recognizes one block construct.
pub trait BlockRule: Send + Sync {
    /// Whether this rule wants to handle `block` inside `parent`.
    fn test(&self, parser: &BlockParser<'_, '_>, parent: &Element, block: &str) -> bool;

    /// Consume the front of `blocks` into `parent`.
    ///
    /// Returning `false` declines; the block must then be left in place.
    fn run(&self, parser: &mut BlockParser<'_, '_>, parent: &mut Element, blocks: &mut Blocks)
    -> bool;
}

/// List container tags.
pub(crate) const LIST_TAGS: &[&str] = &["ol", "ul"];

/// Whether `element` is a `pre` holding a `code` child.
pub(crate) fn is_code_block(element: &Element) -> bool {
    element.tag == "pre" && element.children.first().is_some_and(|c| c.tag == "code")
}

/// The default block rule set.
#[must_use]
pub fn builtin_rules() -> Registry<Box<dyn BlockRule>> {
    let mut registry: Registry<Box<dyn BlockRule>> = Registry::new();
    registry.insert("empty", Box::new(EmptyBlockRule), 100.0);
    registry.insert("indent", Box::new(ListIndentRule), 90.0);
    registry.insert("code", Box::new(CodeBlockRule), 80.0);
    registry.insert("hashheader", Box::new(HashHeaderRule), 70.0);
    registry.insert("setextheader", Box::new(SetextHeaderRule), 60.0);
    registry.insert("hr", Box::new(HorizontalRuleRule), 50.0);
    registry.insert("olist", Box::new(ListRule::ordered()), 40.0);
    registry.insert("ulist", Box::new(ListRule::unordered()), 30.0);
    registry.insert("quote", Box::new(BlockQuoteRule), 20.0);
    registry.insert("reference", Box::new(ReferenceRule), 15.0);
    registry.insert("paragraph", Box::new(ParagraphRule), 10.0);
    registry
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::context::{Context, Settings};
    use crate::serializer::serialize;

    /// Build the block tree for `text` and render it without inline processing.
    pub(crate) fn blocks_html(text: &str) -> String {
        blocks_html_with(text, &Settings::default())
    }

    /// Like [`blocks_html`] with explicit settings.
    pub(crate) fn blocks_html_with(text: &str, settings: &Settings) -> String {
        let patterns = Registry::new();
        let rules = builtin_rules();
        let mut cx = Context::new(settings, &patterns);
        let lines: Vec<String> = text.split('\n').map(str::to_owned).collect();
        let root = BlockParser::new(&rules, &mut cx).parse_document(&lines);
        serialize(&root, settings.output_format)
    }
}
