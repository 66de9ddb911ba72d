//! Element tree produced by the block builder and refined by tree processors.
//!
//! Text interleaved between siblings lives in the `tail` of the preceding
//! sibling, so `<p>a<em>b</em>c</p>` is a `p` with text `a` and one `em`
//! child with text `b` and tail `c`.

/// Attribute map that keeps keys unique and preserves insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    items: Vec<(String, String)>,
}

impl Attributes {
    /// Create an empty attribute map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`. An existing key keeps its position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.items.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.items.push((key, value));
        }
    }

    /// Value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.items.iter().position(|(k, _)| k == key)?;
        Some(self.items.remove(index).1)
    }

    /// Pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Self::new();
        for (k, v) in iter {
            attrs.set(k, v);
        }
        attrs
    }
}

/// Node in the document tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Element tag name.
    pub tag: String,
    /// Element attributes.
    pub attrs: Attributes,
    /// Text before the first child.
    pub text: Option<String>,
    /// Text after this element, inside the parent.
    pub tail: Option<String>,
    /// Child elements in document order.
    pub children: Vec<Element>,
    /// The text is final: inline patterns never rewrite it.
    pub atomic: bool,
}

impl Element {
    /// Create a new element with the given tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Set text content.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set tail content.
    #[must_use]
    pub fn with_tail(mut self, tail: impl Into<String>) -> Self {
        self.tail = Some(tail.into());
        self
    }

    /// Add an attribute.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.set(key, value);
        self
    }

    /// Set children.
    #[must_use]
    pub fn with_children(mut self, children: Vec<Element>) -> Self {
        self.children = children;
        self
    }

    /// Mark the text as final.
    #[must_use]
    pub fn into_atomic(mut self) -> Self {
        self.atomic = true;
        self
    }

    /// Append `child` and return a mutable reference to it.
    pub fn push(&mut self, child: Element) -> &mut Element {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Append a new child with `tag` and return it.
    pub fn push_new(&mut self, tag: impl Into<String>) -> &mut Element {
        self.push(Element::new(tag))
    }

    /// Last child, if any.
    #[must_use]
    pub fn last_child(&self) -> Option<&Element> {
        self.children.last()
    }

    /// Mutable last child, if any.
    pub fn last_child_mut(&mut self) -> Option<&mut Element> {
        self.children.last_mut()
    }

    /// Whether the last child has one of `tags`.
    #[must_use]
    pub fn last_child_is(&self, tags: &[&str]) -> bool {
        self.last_child().is_some_and(|c| tags.contains(&c.tag.as_str()))
    }

    /// Whether the text is missing or blank.
    #[must_use]
    pub fn has_blank_text(&self) -> bool {
        self.text.as_deref().is_none_or(|t| t.trim().is_empty())
    }

    /// Append `extra` to the text, separated by `separator` when text exists.
    pub fn append_text(&mut self, separator: &str, extra: &str) {
        match &mut self.text {
            Some(text) => {
                text.push_str(separator);
                text.push_str(extra);
            }
            None => self.text = Some(extra.to_owned()),
        }
    }

    /// Append `extra` to the tail, separated by `separator` when a tail exists.
    pub fn append_tail(&mut self, separator: &str, extra: &str) {
        match &mut self.tail {
            Some(tail) => {
                tail.push_str(separator);
                tail.push_str(extra);
            }
            None => self.tail = Some(extra.to_owned()),
        }
    }

    /// This element and all descendants in document order.
    #[must_use]
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        collect_descendants(self, &mut out);
        out
    }

    /// Visit this element and all descendants mutably in document order.
    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut Element)) {
        visit(self);
        for child in &mut self.children {
            child.walk_mut(visit);
        }
    }

    /// Concatenated text of this element and its descendants, excluding its own tail.
    #[must_use]
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        if let Some(text) = &self.text {
            out.push_str(text);
        }
        for child in &self.children {
            out.push_str(&child.text_content());
            if let Some(tail) = &child.tail {
                out.push_str(tail);
            }
        }
        out
    }
}

fn collect_descendants<'a>(element: &'a Element, out: &mut Vec<&'a Element>) {
    out.push(element);
    for child in &element.children {
        collect_descendants(child, out);
    }
}
