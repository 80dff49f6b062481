//! Headless element tree standing in for the host page's DOM
//!
//! The bridge never talks to a real DOM; it operates on this owned tree.
//! The embedder mirrors the parts of the page that carry bindings into a
//! [`Document`] and delivers native events (change, resize, removal) through
//! the bridge's entry points.
//!
//! Traversal is depth-first pre-order, which is exactly document order, so
//! scanner results are deterministic for identical structure.

use std::collections::HashMap;

use crate::types::{ElementId, InputValue};

/// One element in the tree. Elements that participate in bindings must
/// carry a unique id; purely structural elements may reuse `""`.
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub id: ElementId,
    pub classes: Vec<String>,
    pub attrs: HashMap<String, String>,
    /// Current control value, for elements backing input bindings
    pub value: Option<InputValue>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(id: impl Into<ElementId>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Builder-style class addition
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Builder-style attribute addition
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Builder-style initial value
    pub fn with_value(mut self, value: impl Into<InputValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Builder-style child addition
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Whether this element matches a class-style selector (".foo").
    /// Non-class selectors never match; selector shape is validated at
    /// binding registration.
    pub fn matches(&self, selector: &str) -> bool {
        match selector.strip_prefix('.') {
            Some(class) => self.has_class(class),
            None => false,
        }
    }

    fn find(&self, id: &str) -> Option<&Element> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Element> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    /// Remove the child subtree rooted at `id`. Returns the removed
    /// element, or `None` when no descendant carries that id.
    fn remove_descendant(&mut self, id: &str) -> Option<Element> {
        if let Some(pos) = self.children.iter().position(|c| c.id == id) {
            return Some(self.children.remove(pos));
        }
        self.children
            .iter_mut()
            .find_map(|c| c.remove_descendant(id))
    }

    fn visit<'a>(&'a self, out: &mut Vec<&'a Element>) {
        out.push(self);
        for child in &self.children {
            child.visit(out);
        }
    }
}

/// The element tree the bridge scans and mutates.
#[derive(Debug, Clone)]
pub struct Document {
    root: Element,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document with a root element whose id is `"document"`.
    pub fn new() -> Self {
        Self {
            root: Element::new("document"),
        }
    }

    /// Build a document around an existing root
    pub fn with_root(root: Element) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_id(&self) -> &str {
        &self.root.id
    }

    /// Append a child to the root
    pub fn push(&mut self, element: Element) {
        self.root.children.push(element);
    }

    /// Append a child under the element with `parent_id`. Returns false
    /// when the parent does not exist.
    pub fn push_under(&mut self, parent_id: &str, element: Element) -> bool {
        match self.root.find_mut(parent_id) {
            Some(parent) => {
                parent.children.push(element);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Element> {
        self.root.find(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.root.find_mut(id)
    }

    /// Remove the subtree rooted at `id`. The root itself cannot be removed.
    pub fn remove(&mut self, id: &str) -> Option<Element> {
        self.root.remove_descendant(id)
    }

    /// All elements in the subtree rooted at `scope_id`, in document order
    /// (depth-first pre-order), including the scope element itself.
    /// An unknown scope yields an empty vec, not an error.
    pub fn elements_in_scope(&self, scope_id: &str) -> Vec<&Element> {
        let mut out = Vec::new();
        if let Some(scope) = self.root.find(scope_id) {
            scope.visit(&mut out);
        }
        out
    }
}
