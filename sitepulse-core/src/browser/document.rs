//! Element tree used for click delegation
//!
//! Elements live in an arena and are addressed by [`ElementId`]. Element 0 is
//! the document root; every other element has exactly one parent.

use std::cell::RefCell;
use std::collections::HashMap;

/// Handle to an element in a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(usize);

#[derive(Debug)]
struct Node {
    tag: String,
    parent: Option<ElementId>,
    attributes: HashMap<String, String>,
}

/// Loading phase of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

impl ReadyState {
    /// True once the DOM can be interacted with
    pub fn is_interactive(self) -> bool {
        !matches!(self, ReadyState::Loading)
    }
}

/// In-memory document: element tree, title and referrer
#[derive(Debug)]
pub struct Document {
    nodes: RefCell<Vec<Node>>,
    title: RefCell<String>,
    referrer: String,
}

impl Document {
    pub(crate) fn new(title: String, referrer: String) -> Self {
        let root = Node {
            tag: "html".to_string(),
            parent: None,
            attributes: HashMap::new(),
        };
        Self {
            nodes: RefCell::new(vec![root]),
            title: RefCell::new(title),
            referrer,
        }
    }

    /// The root element (`<html>`)
    pub fn root(&self) -> ElementId {
        ElementId(0)
    }

    /// Append a new element under `parent`
    pub fn create_element(&self, tag: &str, parent: ElementId) -> ElementId {
        let mut nodes = self.nodes.borrow_mut();
        let id = ElementId(nodes.len());
        nodes.push(Node {
            tag: tag.to_string(),
            parent: Some(parent),
            attributes: HashMap::new(),
        });
        id
    }

    pub fn set_attribute(&self, element: ElementId, name: &str, value: &str) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(element.0) {
            node.attributes.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attribute(&self, element: ElementId, name: &str) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(element.0) {
            node.attributes.remove(name);
        }
    }

    pub fn attribute(&self, element: ElementId, name: &str) -> Option<String> {
        self.nodes
            .borrow()
            .get(element.0)
            .and_then(|node| node.attributes.get(name).cloned())
    }

    pub fn tag(&self, element: ElementId) -> Option<String> {
        self.nodes.borrow().get(element.0).map(|node| node.tag.clone())
    }

    pub fn parent(&self, element: ElementId) -> Option<ElementId> {
        self.nodes.borrow().get(element.0).and_then(|node| node.parent)
    }

    /// Nearest element, starting at `element` itself, that carries `attribute`
    pub fn closest_with_attribute(&self, element: ElementId, attribute: &str) -> Option<ElementId> {
        let nodes = self.nodes.borrow();
        let mut current = Some(element);
        while let Some(id) = current {
            let node = nodes.get(id.0)?;
            if node.attributes.contains_key(attribute) {
                return Some(id);
            }
            current = node.parent;
        }
        None
    }

    pub fn title(&self) -> String {
        self.title.borrow().clone()
    }

    pub fn set_title(&self, title: &str) {
        *self.title.borrow_mut() = title.to_string();
    }

    /// Referrer of the current document; empty when there was none
    pub fn referrer(&self) -> &str {
        &self.referrer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closest_includes_self_and_walks_ancestors() {
        let doc = Document::new(String::new(), String::new());
        let section = doc.create_element("section", doc.root());
        let button = doc.create_element("button", section);
        let icon = doc.create_element("span", button);

        doc.set_attribute(button, "data-pulse-event", "signup");

        assert_eq!(doc.closest_with_attribute(icon, "data-pulse-event"), Some(button));
        assert_eq!(doc.closest_with_attribute(button, "data-pulse-event"), Some(button));
        assert_eq!(doc.closest_with_attribute(section, "data-pulse-event"), None);
    }

    #[test]
    fn test_attributes() {
        let doc = Document::new("Home".to_string(), String::new());
        let link = doc.create_element("a", doc.root());
        doc.set_attribute(link, "href", "/about");
        assert_eq!(doc.attribute(link, "href").as_deref(), Some("/about"));
        doc.remove_attribute(link, "href");
        assert_eq!(doc.attribute(link, "href"), None);
        assert_eq!(doc.tag(link).as_deref(), Some("a"));
        assert_eq!(doc.parent(link), Some(doc.root()));
    }

    #[test]
    fn test_ready_state() {
        assert!(!ReadyState::Loading.is_interactive());
        assert!(ReadyState::Interactive.is_interactive());
        assert!(ReadyState::Complete.is_interactive());
    }
}
