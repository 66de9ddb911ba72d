//! Blank blocks and indented code blocks.

use super::{BlockParser, BlockRule, Blocks, is_code_block};
use crate::tree::Element;
use crate::util::detab;

/// Empty blocks, or blocks opening with a blank line.
///
/// Blank lines that follow a code block are kept inside it.
#[derive(Debug, Default)]
pub struct EmptyBlockRule;

impl BlockRule for EmptyBlockRule {
    fn test(&self, _parser: &BlockParser<'_, '_>, _parent: &Element, block: &str) -> bool {
        block.is_empty() || block.starts_with('\n')
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
        let filler = if block.is_empty() {
            "\n\n"
        } else {
            let rest = &block[1..];
            if !rest.is_empty() {
                blocks.push_front(rest.to_owned());
            }
            "\n"
        };
        if let Some(pre) = parent.last_child_mut().filter(|c| is_code_block(c))
            && let Some(code) = pre.children.first_mut()
        {
            code.append_text("", filler);
        }
        true
    }
}

/// Blocks indented by one tab stop become `pre > code`.
///
/// A code block directly after another merges into it, so blank lines inside
/// code survive the split into blocks.
#[derive(Debug, Default)]
pub struct CodeBlockRule;

impl BlockRule for CodeBlockRule {
    fn test(&self, parser: &BlockParser<'_, '_>, _parent: &Element, block: &str) -> bool {
        block.starts_with(&" ".repeat(parser.settings().tab_length))
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
        let (code_text, rest) = detab(&block, parser.settings().tab_length);
        let code_text = code_text.trim_end();

        match parent.last_child_mut().filter(|c| is_code_block(c)) {
            Some(pre) => {
                if let Some(code) = pre.children.first_mut() {
                    code.append_text("\n", &format!("{code_text}\n"));
                }
            }
            None => {
                let code = Element::new("code")
                    .with_text(format!("{code_text}\n"))
                    .into_atomic();
                parent.push_new("pre").push(code);
            }
        }

        if !rest.is_empty() {
            blocks.push_front(rest);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::blocks_html;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_code_block() {
        assert_eq!(
            blocks_html("    let x = 1;\n    x < 2"),
            "<pre><code>let x = 1;\nx &lt; 2\n</code></pre>"
        );
    }

    #[test]
    fn test_blank_lines_kept_inside_code() {
        assert_eq!(
            blocks_html("    a\n\n\n    b"),
            "<pre><code>a\n\n\nb\n</code></pre>"
        );
    }

    #[test]
    fn test_unindented_tail_parsed_separately() {
        assert_eq!(
            blocks_html("    code\ntext"),
            "<pre><code>code\n</code></pre><p>text</p>"
        );
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(blocks_html(""), "");
        assert_eq!(blocks_html("\n\n\n"), "");
    }
}
