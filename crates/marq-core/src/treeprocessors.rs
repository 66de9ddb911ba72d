//! Whole-tree rewriters that run after the block builder.

use std::sync::LazyLock;

use regex::Regex;

use crate::context::Context;
use crate::error::ConvertError;
use crate::inline::{Fragment, InlineContext};
use crate::tree::Element;
use crate::util::is_block_level;

static TAG_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9]*(?:[-:_.][A-Za-z0-9]+)*$").expect("invalid tag name regex")
});

/// Rewrites the element tree in place.
pub trait TreeProcessor: Send + Sync {
    /// Transform the tree rooted at `root`.
    fn run(&self, root: &mut Element, cx: &mut Context<'_>) -> Result<(), ConvertError>;
}

/// Runs the inline patterns over every text and tail in the tree.
///
/// Only elements present before the pass are visited; elements produced by
/// patterns are final.
#[derive(Debug, Default)]
pub struct InlineProcessor;

impl InlineProcessor {
    fn process(element: &mut Element, icx: &mut InlineContext<'_, '_>) {
        let original = std::mem::take(&mut element.children);
        let mut fragment = match element.text.take() {
            Some(text) if !element.atomic => icx.parse(&text),
            text => Fragment {
                text,
                children: Vec::new(),
            },
        };
        for mut child in original {
            let tail = child.tail.take();
            Self::process(&mut child, icx);
            fragment.push_element(child);
            if let Some(tail) = tail {
                if element.atomic {
                    fragment.push_text(&tail);
                } else {
                    fragment.extend(icx.parse(&tail));
                }
            }
        }
        element.text = fragment.text;
        element.children = fragment.children;
    }
}

impl TreeProcessor for InlineProcessor {
    fn run(&self, root: &mut Element, cx: &mut Context<'_>) -> Result<(), ConvertError> {
        let mut icx = InlineContext::new(cx);
        Self::process(root, &mut icx);
        Ok(())
    }
}

/// Adds newlines between block-level elements and after line breaks, and
/// trims trailing blank lines from code blocks.
#[derive(Debug, Default)]
pub struct PrettifyProcessor;

impl PrettifyProcessor {
    fn blank(text: Option<&String>) -> bool {
        text.is_none_or(|t| t.trim().is_empty())
    }

    fn prettify(element: &mut Element) {
        if is_block_level(&element.tag) && element.tag != "code" && element.tag != "pre" {
            let first_is_block = element
                .children
                .first()
                .is_some_and(|c| is_block_level(&c.tag));
            if Self::blank(element.text.as_ref()) && first_is_block {
                element.text = Some("\n".to_owned());
            }
            for child in &mut element.children {
                if is_block_level(&child.tag) {
                    Self::prettify(child);
                }
            }
        }
        if Self::blank(element.tail.as_ref()) {
            element.tail = Some("\n".to_owned());
        }
    }
}

impl TreeProcessor for PrettifyProcessor {
    fn run(&self, root: &mut Element, _cx: &mut Context<'_>) -> Result<(), ConvertError> {
        Self::prettify(root);
        root.walk_mut(&mut |element| match element.tag.as_str() {
            "br" => {
                element.tail = Some(match element.tail.take() {
                    Some(tail) if !tail.trim().is_empty() => format!("\n{tail}"),
                    _ => "\n".to_owned(),
                });
            }
            "pre" => {
                if let Some(code) = element.children.first_mut()
                    && code.tag == "code"
                    && code.children.is_empty()
                    && let Some(text) = &code.text
                {
                    code.text = Some(format!("{}\n", text.trim_end()));
                }
            }
            _ => {}
        });
        Ok(())
    }
}

/// Check that a tree processor left a well-formed tree.
///
/// The root tag must be unchanged and every tag must be a valid element name.
pub fn validate_tree(root: &Element, root_tag: &str, stage: &str) -> Result<(), ConvertError> {
    if root.tag != root_tag {
        return Err(ConvertError::InvariantViolation(format!(
            "tree processor `{stage}` replaced root <{root_tag}> with <{}>",
            root.tag
        )));
    }
    if let Some(bad) = root
        .descendants()
        .into_iter()
        .find(|e| !TAG_NAME_RE.is_match(&e.tag))
    {
        return Err(ConvertError::InvariantViolation(format!(
            "tree processor `{stage}` produced invalid tag name {:?}",
            bad.tag
        )));
    }
    Ok(())
}
