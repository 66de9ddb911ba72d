//! Line-oriented rewriters that run before the block builder.
//!
//! Every built-in preprocessor is idempotent: feeding its output back in
//! yields the same lines.

use crate::context::Context;
use crate::stash::{MARKER_END, MARKER_START};
use crate::util::is_block_level;

/// Rewrites source lines before tree construction.
pub trait Preprocessor: Send + Sync {
    /// Transform `lines`, returning the new line sequence.
    fn run(&self, lines: Vec<String>, cx: &mut Context<'_>) -> Vec<String>;
}

/// Normalizes line endings, tabs and whitespace-only lines.
///
/// Also strips the control characters used by stash markers, so markers
/// cannot be forged from source text.
#[derive(Debug, Default)]
pub struct NormalizeWhitespace;

impl Preprocessor for NormalizeWhitespace {
    fn run(&self, lines: Vec<String>, cx: &mut Context<'_>) -> Vec<String> {
        let tab_length = cx.settings().tab_length;
        lines
            .iter()
            .flat_map(|line| {
                line.replace("\r\n", "\n")
                    .split(['\r', '\n'])
                    .map(str::to_owned)
                    .collect::<Vec<_>>()
            })
            .map(|line| {
                let cleaned: String = line
                    .chars()
                    .filter(|&c| c != MARKER_START && c != MARKER_END)
                    .collect();
                let expanded = expand_tabs(&cleaned, tab_length);
                if expanded.trim().is_empty() {
                    String::new()
                } else {
                    expanded
                }
            })
            .collect()
    }
}

/// Replace tabs with spaces up to the next multiple of `tab_length` columns.
fn expand_tabs(line: &str, tab_length: usize) -> String {
    if !line.contains('\t') {
        return line.to_owned();
    }
    let tab_length = tab_length.max(1);
    let mut out = String::with_capacity(line.len() + tab_length);
    let mut column = 0;
    for ch in line.chars() {
        if ch == '\t' {
            let pad = tab_length - column % tab_length;
            out.extend(std::iter::repeat_n(' ', pad));
            column += pad;
        } else {
            out.push(ch);
            column += 1;
        }
    }
    out
}

/// Moves raw HTML blocks into the stash.
///
/// A block qualifies when it follows a blank line (or starts the document) and
/// its first line begins with a block-level opening tag or an HTML comment. It
/// extends to the line closing that tag, or to the next blank line when the
/// tag is never closed. The block is replaced by a single marker line framed
/// by blank lines.
#[derive(Debug, Default)]
pub struct HtmlBlockPreprocessor;

/// How a raw HTML block ends.
enum Closing {
    Tag(String),
    Comment,
}

impl Preprocessor for HtmlBlockPreprocessor {
    fn run(&self, lines: Vec<String>, cx: &mut Context<'_>) -> Vec<String> {
        let mut out = Vec::with_capacity(lines.len());
        let mut index = 0;
        while index < lines.len() {
            let at_block_start = index == 0 || lines[index - 1].trim().is_empty();
            let closing = if at_block_start {
                opening(&lines[index])
            } else {
                None
            };
            let Some(closing) = closing else {
                out.push(lines[index].clone());
                index += 1;
                continue;
            };

            let end = find_end(&lines, index, &closing);
            let raw = lines[index..=end].join("\n");
            tracing::trace!(lines = end - index + 1, "Stashing raw HTML block");
            let marker = cx.stash.store_block(raw);
            if out.last().is_some_and(|l: &String| !l.is_empty()) {
                out.push(String::new());
            }
            out.push(marker);
            out.push(String::new());
            index = end + 1;
            // Drop blank lines the marker frame already provides.
            while index < lines.len() && lines[index].trim().is_empty() {
                index += 1;
            }
        }
        if out.last().is_some_and(String::is_empty) && !lines.last().is_some_and(String::is_empty) {
            out.pop();
        }
        out
    }
}

/// If `line` opens a raw HTML block, how that block closes.
fn opening(line: &str) -> Option<Closing> {
    if line.starts_with("<!--") {
        return Some(Closing::Comment);
    }
    let rest = line.strip_prefix('<')?;
    let name: String = rest
        .chars()
        .take_while(char::is_ascii_alphanumeric)
        .collect();
    if name.is_empty() || !is_block_level(&name) {
        return None;
    }
    match rest[name.len()..].chars().next() {
        None | Some(' ' | '>' | '/') => Some(Closing::Tag(name.to_ascii_lowercase())),
        Some(_) => None,
    }
}

/// Index of the last line of the raw block starting at `start`.
fn find_end(lines: &[String], start: usize, closing: &Closing) -> usize {
    match closing {
        Closing::Comment => (start..lines.len())
            .find(|&i| lines[i].contains("-->"))
            .unwrap_or_else(|| blank_bounded_end(lines, start)),
        Closing::Tag(name) => {
            let open = format!("<{name}");
            let close = format!("</{name}>");
            let mut depth = 0usize;
            for (i, line) in lines.iter().enumerate().skip(start) {
                let lower = line.to_ascii_lowercase();
                depth += count_openings(&lower, &open);
                depth = depth.saturating_sub(lower.matches(close.as_str()).count());
                if depth == 0 || (i == start && is_self_contained(&lower)) {
                    return i;
                }
            }
            blank_bounded_end(lines, start)
        }
    }
}

/// Count `<name` occurrences that are real openings (not a longer tag name).
fn count_openings(line: &str, open: &str) -> usize {
    line.match_indices(open)
        .filter(|(i, _)| {
            line[i + open.len()..]
                .chars()
                .next()
                .is_none_or(|c| matches!(c, ' ' | '>' | '/'))
        })
        .count()
}

/// Void or self-closed single-line tags such as `<hr>` or `<div />`.
fn is_self_contained(line: &str) -> bool {
    let trimmed = line.trim_end();
    trimmed.ends_with("/>") || trimmed.starts_with("<hr")
}

/// Last line before the next blank line.
fn blank_bounded_end(lines: &[String], start: usize) -> usize {
    (start..lines.len())
        .take_while(|&i| !lines[i].trim().is_empty())
        .last()
        .unwrap_or(start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Settings;
    use crate::registry::Registry;
    use crate::stash::marker_for;
    use pretty_assertions::assert_eq;

    fn lines(text: &str) -> Vec<String> {
        text.split('\n').map(str::to_owned).collect()
    }

    fn run<P: Preprocessor>(pre: &P, text: &str) -> Vec<String> {
        let settings = Settings::default();
        let patterns = Registry::new();
        let mut cx = Context::new(&settings, &patterns);
        pre.run(lines(text), &mut cx)
    }

    #[test]
    fn test_normalize_expands_tabs() {
        assert_eq!(run(&NormalizeWhitespace, "\tcode\na\tb"), ["    code", "a   b"]);
    }

    #[test]
    fn test_expand_tabs_with_zero_width_uses_single_column() {
        assert_eq!(expand_tabs("a\tb", 0), "a b");
        assert_eq!(expand_tabs("\t\tx", 2), "    x");
    }

    #[test]
    fn test_normalize_blanks_whitespace_lines() {
        assert_eq!(run(&NormalizeWhitespace, "a\n   \nb"), ["a", "", "b"]);
    }

    #[test]
    fn test_normalize_splits_carriage_returns() {
        assert_eq!(run(&NormalizeWhitespace, "a\r\nb\rc"), ["a", "b", "c"]);
    }

    #[test]
    fn test_normalize_strips_marker_characters() {
        let forged = format!("x{}y", marker_for(0));
        assert_eq!(run(&NormalizeWhitespace, &forged), ["xraw:0y"]);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = run(&NormalizeWhitespace, "\ta\r\n  \n b\t");
        let twice = run(&NormalizeWhitespace, &once.join("\n"));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_html_block_stashed() {
        let settings = Settings::default();
        let patterns = Registry::new();
        let mut cx = Context::new(&settings, &patterns);

        let out = HtmlBlockPreprocessor.run(lines("before\n\n<div>\n*raw*\n</div>\n\nafter"), &mut cx);

        assert_eq!(out, ["before", "", &marker_for(0), "", "after"]);
        assert_eq!(cx.stash.retrieve(&marker_for(0)), Some("<div>\n*raw*\n</div>"));
    }

    #[test]
    fn test_html_block_nested_same_tag() {
        let settings = Settings::default();
        let patterns = Registry::new();
        let mut cx = Context::new(&settings, &patterns);

        let out = HtmlBlockPreprocessor.run(
            lines("<div>\n<div>inner</div>\n</div>\ntext"),
            &mut cx,
        );

        assert_eq!(out, [marker_for(0).as_str(), "", "text"]);
        assert_eq!(
            cx.stash.retrieve(&marker_for(0)),
            Some("<div>\n<div>inner</div>\n</div>")
        );
    }

    #[test]
    fn test_html_comment_block() {
        let out = run(&HtmlBlockPreprocessor, "<!-- a\nb -->\n\npara");
        assert_eq!(out, [marker_for(0).as_str(), "", "para"]);
    }

    #[test]
    fn test_inline_tag_not_stashed() {
        let out = run(&HtmlBlockPreprocessor, "<span>x</span>");
        assert_eq!(out, ["<span>x</span>"]);
    }

    #[test]
    fn test_mid_paragraph_tag_not_stashed() {
        let out = run(&HtmlBlockPreprocessor, "text\n<div>x</div>");
        assert_eq!(out, ["text", "<div>x</div>"]);
    }

    #[test]
    fn test_unclosed_block_stops_at_blank_line() {
        let out = run(&HtmlBlockPreprocessor, "<div>\nopen\n\nafter");
        assert_eq!(out, [marker_for(0).as_str(), "", "after"]);
    }

    #[test]
    fn test_html_block_is_idempotent() {
        let once = run(&HtmlBlockPreprocessor, "<table>\n</table>\n\nx");
        let twice = run(&HtmlBlockPreprocessor, &once.join("\n"));
        assert_eq!(once, twice);
    }
}
