//! Parsed set document
//!
//! Explicit element tree produced by the payload decoder. Every accessor
//! returns `None` (or an empty iterator) on a missing step instead of
//! faulting, so field heuristics can walk arbitrary paths safely.

use serde::Serialize;
use std::collections::BTreeMap;

/// A single markup element
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Element {
    /// Tag name
    pub name: String,
    /// Attribute values exactly as written (no type coercion)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    /// Child elements in document order; repeated siblings are all kept
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Element>,
    /// Concatenated non-whitespace text content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder helper used by fixtures and tests
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Builder helper used by fixtures and tests
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Attribute value by name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// First child with the given tag
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given tag, in document order
    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Follow a `/`-separated path of tags, taking the first match at each step
    ///
    /// An empty path yields `self`.
    pub fn find(&self, path: &str) -> Option<&Element> {
        path.split('/')
            .filter(|step| !step.is_empty())
            .try_fold(self, |node, step| node.child(step))
    }

    /// Attribute at the end of a path
    pub fn attr_at(&self, path: &str, attr: &str) -> Option<&str> {
        self.find(path).and_then(|node| node.attr(attr))
    }

    /// Every element with the given tag in this subtree, including `self`
    pub fn descendants_named<'a>(&'a self, name: &'a str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.name == name {
                found.push(node);
            }
            // Reverse so the pop order follows document order
            stack.extend(node.children.iter().rev());
        }
        found
    }

    /// Number of elements in this subtree, including `self`
    pub fn element_count(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(element) = pending.pop() {
            count += 1;
            pending.extend(element.children.iter());
        }
        count
    }
}

/// Decoded set file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedDocument {
    root: Element,
}

impl ParsedDocument {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// Root element (`Ableton` for well-formed set files)
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Path lookup relative to the root element
    pub fn find(&self, path: &str) -> Option<&Element> {
        self.root.find(path)
    }

    /// Attribute lookup relative to the root element
    pub fn attr_at(&self, path: &str, attr: &str) -> Option<&str> {
        self.root.attr_at(path, attr)
    }
}
