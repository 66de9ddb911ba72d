//! String rewriters that run on the serialized output.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::context::Context;
use crate::stash::{AMP_PLACEHOLDER, contains_marker};

/// Matches a marker, optionally as the sole content of a paragraph.
static UNSTASH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(<p>)?\x02raw:(\d+)\x03(</p>)?").expect("invalid unstash regex")
});

/// Stashed content can itself contain markers; bound the re-expansion.
const MAX_UNSTASH_PASSES: usize = 8;

/// Rewrites the serialized document.
pub trait Postprocessor: Send + Sync {
    /// Transform `text`, returning the new output.
    fn run(&self, text: &str, cx: &mut Context<'_>) -> String;
}

/// Turns the `&` placeholder of obfuscated output back into `&`.
#[derive(Debug, Default)]
pub struct AmpSubstitutePostprocessor;

impl Postprocessor for AmpSubstitutePostprocessor {
    fn run(&self, text: &str, _cx: &mut Context<'_>) -> String {
        text.replace(AMP_PLACEHOLDER, "&")
    }
}

/// Swaps every stash marker for its stored content.
///
/// A block entry whose marker is the whole content of a paragraph replaces
/// the paragraph itself. Markers with no entry are dropped with a warning.
#[derive(Debug, Default)]
pub struct UnstashPostprocessor;

impl UnstashPostprocessor {
    fn replace_once(text: &str, cx: &mut Context<'_>) -> String {
        UNSTASH_RE
            .replace_all(text, |caps: &Captures<'_>| {
                let open = caps.get(1).map_or("", |m| m.as_str());
                let close = caps.get(3).map_or("", |m| m.as_str());
                let Some(index) = caps.get(2).and_then(|m| m.as_str().parse::<usize>().ok())
                else {
                    return format!("{open}{close}");
                };
                match cx.stash.retrieve_index(index) {
                    Some((raw, true)) if !open.is_empty() && !close.is_empty() => raw.to_owned(),
                    Some((raw, _)) => format!("{open}{raw}{close}"),
                    None => {
                        tracing::warn!(index, "Dropping marker with no stash entry");
                        format!("{open}{close}")
                    }
                }
            })
            .into_owned()
    }
}

impl Postprocessor for UnstashPostprocessor {
    fn run(&self, text: &str, cx: &mut Context<'_>) -> String {
        let mut output = Self::replace_once(text, cx);
        let mut passes = 1;
        while contains_marker(&output) && passes < MAX_UNSTASH_PASSES {
            output = Self::replace_once(&output, cx);
            passes += 1;
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Settings;
    use crate::registry::Registry;
    use crate::stash::marker_for;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_inline_entry_stays_in_paragraph() {
        let settings = Settings::default();
        let patterns = Registry::new();
        let mut cx = Context::new(&settings, &patterns);
        let marker = cx.stash.store("<b>x</b>");

        let out = UnstashPostprocessor.run(&format!("<p>{marker}</p>"), &mut cx);

        assert_eq!(out, "<p><b>x</b></p>");
    }

    #[test]
    fn test_block_entry_replaces_paragraph() {
        let settings = Settings::default();
        let patterns = Registry::new();
        let mut cx = Context::new(&settings, &patterns);
        let marker = cx.stash.store_block("<div>raw</div>");

        let out = UnstashPostprocessor.run(&format!("<p>{marker}</p>\n<p>a</p>"), &mut cx);

        assert_eq!(out, "<div>raw</div>\n<p>a</p>");
        let stats = cx.stash.stats();
        assert_eq!(stats.stored, stats.retrieved);
    }

    #[test]
    fn test_unknown_marker_dropped() {
        let settings = Settings::default();
        let patterns = Registry::new();
        let mut cx = Context::new(&settings, &patterns);

        let out = UnstashPostprocessor.run(&format!("a{}b", marker_for(9)), &mut cx);

        assert_eq!(out, "ab");
    }

    #[test]
    fn test_nested_markers_expanded() {
        let settings = Settings::default();
        let patterns = Registry::new();
        let mut cx = Context::new(&settings, &patterns);
        let inner = cx.stash.store("&amp;");
        let outer = cx.stash.store(format!("[{inner}]"));

        let out = UnstashPostprocessor.run(&outer, &mut cx);

        assert_eq!(out, "[&amp;]");
    }

    #[test]
    fn test_amp_substitute() {
        let settings = Settings::default();
        let patterns = Registry::new();
        let mut cx = Context::new(&settings, &patterns);
        let text = format!("{AMP_PLACEHOLDER}#64;");
        assert_eq!(AmpSubstitutePostprocessor.run(&text, &mut cx), "&#64;");
    }
}
