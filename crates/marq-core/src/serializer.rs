//! Tree to markup serialization.
//!
//! Rendering is a pure function of the tree: attributes in insertion order,
//! text and attribute values escaped, `script`/`style` content written raw.

use marq_config::OutputFormat;

use crate::tree::Element;

/// Elements that never have a closing tag.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text is written without escaping.
const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

/// Whether `tag` renders without a closing tag.
#[must_use]
pub fn is_void(tag: &str) -> bool {
    VOID_TAGS.iter().any(|void| void.eq_ignore_ascii_case(tag))
}

/// Render the content of `root` (not the root element itself), trimmed.
#[must_use]
pub fn serialize(root: &Element, format: OutputFormat) -> String {
    let mut out = String::new();
    if let Some(text) = &root.text {
        escape_text_into(&mut out, text);
    }
    for child in &root.children {
        write_element(&mut out, child, format);
    }
    out.trim().to_owned()
}

/// Render `element` itself, including its tail.
#[must_use]
pub fn serialize_element(element: &Element, format: OutputFormat) -> String {
    let mut out = String::new();
    write_element(&mut out, element, format);
    out
}

fn write_element(out: &mut String, element: &Element, format: OutputFormat) {
    out.push('<');
    out.push_str(&element.tag);
    for (key, value) in element.attrs.iter() {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        escape_attr_into(out, value);
        out.push('"');
    }

    if is_void(&element.tag) {
        match format {
            OutputFormat::Xhtml => out.push_str(" />"),
            OutputFormat::Html => out.push('>'),
        }
    } else {
        out.push('>');
        if let Some(text) = &element.text {
            if RAW_TEXT_TAGS.iter().any(|t| t.eq_ignore_ascii_case(&element.tag)) {
                out.push_str(text);
            } else {
                escape_text_into(out, text);
            }
        }
        for child in &element.children {
            write_element(out, child, format);
        }
        out.push_str("</");
        out.push_str(&element.tag);
        out.push('>');
    }

    if let Some(tail) = &element.tail {
        escape_text_into(out, tail);
    }
}

fn escape_text_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr_into(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn root(children: Vec<Element>) -> Element {
        Element::new("div").with_children(children)
    }

    #[test]
    fn test_attributes_in_insertion_order() {
        let tree = root(vec![
            Element::new("p")
                .with_attr("id", "x")
                .with_attr("class", "y")
                .with_text("t"),
        ]);
        assert_eq!(
            serialize(&tree, OutputFormat::Xhtml),
            r#"<p id="x" class="y">t</p>"#
        );
    }

    #[test]
    fn test_text_and_attribute_escaping() {
        let tree = root(vec![
            Element::new("a")
                .with_attr("title", "a \"b\" & <c>\nd")
                .with_text("1 < 2 & \"q\"")
                .with_tail(" > end"),
        ]);
        assert_eq!(
            serialize(&tree, OutputFormat::Xhtml),
            r#"<a title="a &quot;b&quot; &amp; &lt;c&gt;&#10;d">1 &lt; 2 &amp; "q"</a> &gt; end"#
        );
    }

    #[test]
    fn test_void_tags_per_format() {
        let tree = root(vec![
            Element::new("p").with_text("a").with_children(vec![
                Element::new("br").with_tail("b"),
                Element::new("img").with_attr("src", "x.png"),
            ]),
        ]);
        assert_eq!(
            serialize(&tree, OutputFormat::Xhtml),
            r#"<p>a<br />b<img src="x.png" /></p>"#
        );
        assert_eq!(
            serialize(&tree, OutputFormat::Html),
            r#"<p>a<br>b<img src="x.png"></p>"#
        );
    }

    #[test]
    fn test_void_tag_drops_content() {
        let tree = root(vec![Element::new("hr").with_text("ignored")]);
        assert_eq!(serialize(&tree, OutputFormat::Html), "<hr>");
    }

    #[test]
    fn test_empty_non_void_element() {
        let tree = root(vec![Element::new("p")]);
        assert_eq!(serialize(&tree, OutputFormat::Xhtml), "<p></p>");
    }

    #[test]
    fn test_script_text_raw() {
        let tree = root(vec![Element::new("script").with_text("a < b && c")]);
        assert_eq!(
            serialize(&tree, OutputFormat::Xhtml),
            "<script>a < b && c</script>"
        );
    }

    #[test]
    fn test_serialization_is_repeatable() {
        let tree = root(vec![
            Element::new("ul").with_children(vec![Element::new("li").with_text("x").with_tail("\n")]),
        ]);
        let first = serialize(&tree, OutputFormat::Xhtml);
        let second = serialize(&tree, OutputFormat::Xhtml);
        assert_eq!(first, second);
    }

    #[test]
    fn test_serialize_element_includes_tail() {
        let element = Element::new("em").with_text("x").with_tail("!");
        assert_eq!(serialize_element(&element, OutputFormat::Xhtml), "<em>x</em>!");
    }
}
